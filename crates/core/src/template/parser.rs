//! Tag splitting and parsing into a node tree.

use serde_json::Value;

use super::helpers::Helper;

/// Why a template failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unclosed tag starting at byte {0}")]
    UnclosedTag(usize),

    #[error("Empty tag at byte {0}")]
    EmptyTag(usize),

    #[error("Unterminated string literal in tag at byte {0}")]
    UnterminatedString(usize),

    #[error("Unclosed parenthesis in tag at byte {0}")]
    UnclosedParen(usize),

    #[error("Unexpected '{token}' in tag at byte {offset}")]
    UnexpectedToken { token: String, offset: usize },

    #[error("Unknown helper '{0}'")]
    UnknownHelper(String),

    #[error("Helper '{helper}' expects {expected} argument(s), got {got}")]
    Arity {
        helper: &'static str,
        expected: String,
        got: usize,
    },

    #[error("Unknown block '#{0}'")]
    UnknownBlock(String),

    #[error("Block '#{0}' is never closed")]
    UnclosedBlock(&'static str),

    #[error("'/{0}' does not close an open block")]
    UnexpectedClose(String),

    #[error("'else' outside of a block")]
    StrayElse,
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Output(Expr),
    Conditional {
        cond: Expr,
        negate: bool,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    Each {
        list: Expr,
        body: Vec<Node>,
        else_branch: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Path(PathExpr),
    Literal(Value),
    Call { helper: Helper, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PathExpr {
    /// `@index` inside an `#each` body.
    Index,
    /// `this` or `this.a.b`.
    This(Vec<String>),
    /// `a.b.c`, looked up innermost scope first.
    Named(Vec<String>),
}

impl PathExpr {
    fn parse(word: &str) -> Self {
        if word == "@index" {
            return PathExpr::Index;
        }
        let mut segments = word.split('.').map(str::to_string);
        match word.split('.').next() {
            Some("this") => {
                segments.next();
                PathExpr::This(segments.collect())
            }
            _ => PathExpr::Named(segments.collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Unless,
    Each,
}

impl BlockKind {
    fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "if" => Some(BlockKind::If),
            "unless" => Some(BlockKind::Unless),
            "each" => Some(BlockKind::Each),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Unless => "unless",
            BlockKind::Each => "each",
        }
    }
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

enum Segment {
    Text(String),
    Tag { body: String, offset: usize },
}

fn split(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut consumed = 0;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Text(rest[..start].to_string()));
        }
        let inner = &rest[start + 2..];
        let end = inner
            .find("}}")
            .ok_or(TemplateError::UnclosedTag(consumed + start))?;
        segments.push(Segment::Tag {
            body: inner[..end].trim().to_string(),
            offset: consumed + start,
        });
        let advance = start + 2 + end + 2;
        rest = &rest[advance..];
        consumed += advance;
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Block structure
// ---------------------------------------------------------------------------

enum Stop {
    Eof,
    Else,
    Close(String),
}

struct Parser {
    segments: std::vec::IntoIter<Segment>,
}

impl Parser {
    fn parse_nodes(&mut self) -> Result<(Vec<Node>, Stop), TemplateError> {
        let mut nodes = Vec::new();
        while let Some(segment) = self.segments.next() {
            let (body, offset) = match segment {
                Segment::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Segment::Tag { body, offset } => (body, offset),
            };

            if body.is_empty() {
                return Err(TemplateError::EmptyTag(offset));
            }
            if body.starts_with('!') {
                continue;
            }
            if body == "else" {
                return Ok((nodes, Stop::Else));
            }
            if let Some(name) = body.strip_prefix('/') {
                return Ok((nodes, Stop::Close(name.trim().to_string())));
            }
            if let Some(open) = body.strip_prefix('#') {
                nodes.push(self.parse_block(open, offset)?);
                continue;
            }
            nodes.push(Node::Output(parse_expression(&body, offset)?));
        }
        Ok((nodes, Stop::Eof))
    }

    fn parse_block(&mut self, open: &str, offset: usize) -> Result<Node, TemplateError> {
        let (keyword, argument) = open.split_once(char::is_whitespace).unwrap_or((open, ""));
        let kind = BlockKind::parse(keyword)
            .ok_or_else(|| TemplateError::UnknownBlock(keyword.to_string()))?;
        let argument = argument.trim();
        if argument.is_empty() {
            return Err(TemplateError::EmptyTag(offset));
        }
        let expr = parse_expression(argument, offset)?;

        let (then_branch, stop) = self.parse_nodes()?;
        let else_branch = match stop {
            Stop::Else => {
                let (nodes, stop) = self.parse_nodes()?;
                expect_close(kind, stop)?;
                nodes
            }
            other => {
                expect_close(kind, other)?;
                Vec::new()
            }
        };

        Ok(match kind {
            BlockKind::If | BlockKind::Unless => Node::Conditional {
                cond: expr,
                negate: kind == BlockKind::Unless,
                then_branch,
                else_branch,
            },
            BlockKind::Each => Node::Each {
                list: expr,
                body: then_branch,
                else_branch,
            },
        })
    }
}

fn expect_close(kind: BlockKind, stop: Stop) -> Result<(), TemplateError> {
    match stop {
        Stop::Close(name) if name == kind.name() => Ok(()),
        Stop::Close(name) => Err(TemplateError::UnexpectedClose(name)),
        Stop::Else => Err(TemplateError::StrayElse),
        Stop::Eof => Err(TemplateError::UnclosedBlock(kind.name())),
    }
}

pub(crate) fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut parser = Parser {
        segments: split(source)?.into_iter(),
    };
    match parser.parse_nodes()? {
        (nodes, Stop::Eof) => Ok(nodes),
        (_, Stop::Else) => Err(TemplateError::StrayElse),
        (_, Stop::Close(name)) => Err(TemplateError::UnexpectedClose(name)),
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Literal(Value),
    Word(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Open => "(".to_string(),
            Token::Close => ")".to_string(),
            Token::Literal(v) => v.to_string(),
            Token::Word(w) => w.clone(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '-')
}

fn tokenize(body: &str, offset: usize) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == quote {
                        closed = true;
                        break;
                    }
                    text.push(ch);
                }
                if !closed {
                    return Err(TemplateError::UnterminatedString(offset));
                }
                tokens.push(Token::Literal(Value::String(text)));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, '(' | ')' | '"' | '\'') {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(classify_word(word, offset)?);
            }
        }
    }
    Ok(tokens)
}

fn classify_word(word: String, offset: usize) -> Result<Token, TemplateError> {
    match word.as_str() {
        "true" => return Ok(Token::Literal(Value::Bool(true))),
        "false" => return Ok(Token::Literal(Value::Bool(false))),
        "null" => return Ok(Token::Literal(Value::Null)),
        _ => {}
    }

    let looks_numeric = word
        .trim_start_matches('-')
        .starts_with(|c: char| c.is_ascii_digit());
    if looks_numeric {
        if let Ok(n) = word.parse::<i64>() {
            return Ok(Token::Literal(Value::from(n)));
        }
        if let Some(n) = word.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Ok(Token::Literal(Value::Number(n)));
        }
    }

    if word.chars().all(is_word_char) {
        Ok(Token::Word(word))
    } else {
        Err(TemplateError::UnexpectedToken {
            token: word,
            offset,
        })
    }
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    offset: usize,
}

impl ExprParser<'_> {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn unexpected(&self, token: &Token) -> TemplateError {
        TemplateError::UnexpectedToken {
            token: token.describe(),
            offset: self.offset,
        }
    }

    /// `helper arg...`, optionally terminated by `)` for sub-expressions.
    fn parse_call(&mut self, parenthesized: bool) -> Result<Expr, TemplateError> {
        let name = match self.next() {
            Some(Token::Word(word)) => word,
            Some(other) => return Err(self.unexpected(&other)),
            None => return Err(TemplateError::EmptyTag(self.offset)),
        };
        let helper = Helper::from_name(&name).ok_or(TemplateError::UnknownHelper(name))?;

        let mut args = Vec::new();
        loop {
            match self.peek() {
                None if parenthesized => return Err(TemplateError::UnclosedParen(self.offset)),
                None => break,
                Some(Token::Close) if parenthesized => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Close) => return Err(self.unexpected(&Token::Close)),
                Some(_) => args.push(self.parse_atom()?),
            }
        }

        helper.check_arity(args.len())?;
        Ok(Expr::Call { helper, args })
    }

    fn parse_atom(&mut self) -> Result<Expr, TemplateError> {
        match self.next() {
            Some(Token::Word(word)) => Ok(Expr::Path(PathExpr::parse(&word))),
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Open) => self.parse_call(true),
            Some(Token::Close) => Err(self.unexpected(&Token::Close)),
            None => Err(TemplateError::EmptyTag(self.offset)),
        }
    }
}

fn parse_expression(body: &str, offset: usize) -> Result<Expr, TemplateError> {
    let tokens = tokenize(body, offset)?;
    let mut parser = ExprParser {
        tokens: &tokens,
        pos: 0,
        offset,
    };

    let expr = if tokens.len() > 1 && matches!(tokens[0], Token::Word(_)) {
        parser.parse_call(false)?
    } else {
        parser.parse_atom()?
    };

    match parser.peek() {
        None => Ok(expr),
        Some(extra) => Err(parser.unexpected(extra)),
    }
}
