//! Tree-walking renderer.

use serde_json::{Map, Value};

use super::parser::{Expr, Node, PathExpr};

/// One `#each` iteration frame.
struct Scope {
    this: Value,
    index: usize,
}

struct Context<'a> {
    root: &'a Map<String, Value>,
    scopes: Vec<Scope>,
}

pub(crate) fn render(nodes: &[Node], data: &Map<String, Value>) -> String {
    let mut ctx = Context {
        root: data,
        scopes: Vec::new(),
    };
    let mut out = String::new();
    render_nodes(nodes, &mut ctx, &mut out);
    out
}

fn render_nodes(nodes: &[Node], ctx: &mut Context<'_>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output(expr) => out.push_str(&to_text(&eval(expr, ctx))),
            Node::Conditional {
                cond,
                negate,
                then_branch,
                else_branch,
            } => {
                let truthy = is_truthy(&eval(cond, ctx)) != *negate;
                let branch = if truthy { then_branch } else { else_branch };
                render_nodes(branch, ctx, out);
            }
            Node::Each {
                list,
                body,
                else_branch,
            } => {
                let items: Vec<Value> = match eval(list, ctx) {
                    Value::Array(items) => items,
                    Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
                    _ => Vec::new(),
                };
                if items.is_empty() {
                    render_nodes(else_branch, ctx, out);
                    continue;
                }
                for (index, item) in items.into_iter().enumerate() {
                    ctx.scopes.push(Scope { this: item, index });
                    render_nodes(body, ctx, out);
                    ctx.scopes.pop();
                }
            }
        }
    }
}

fn eval(expr: &Expr, ctx: &Context<'_>) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Path(path) => resolve(path, ctx),
        Expr::Call { helper, args } => {
            let values: Vec<Value> = args.iter().map(|a| eval(a, ctx)).collect();
            helper.call(&values)
        }
    }
}

fn walk<'v>(mut value: &'v Value, segments: &[String]) -> Option<&'v Value> {
    for segment in segments {
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

fn resolve(path: &PathExpr, ctx: &Context<'_>) -> Value {
    match path {
        PathExpr::Index => ctx
            .scopes
            .last()
            .map(|s| Value::from(s.index))
            .unwrap_or(Value::Null),
        PathExpr::This(segments) => match ctx.scopes.last() {
            Some(scope) => walk(&scope.this, segments).cloned().unwrap_or(Value::Null),
            None => {
                let (first, rest) = match segments.split_first() {
                    Some(split) => split,
                    None => return Value::Object(ctx.root.clone()),
                };
                ctx.root
                    .get(first)
                    .and_then(|v| walk(v, rest))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
        },
        PathExpr::Named(segments) => {
            let Some((first, rest)) = segments.split_first() else {
                return Value::Null;
            };
            let from_scope = ctx.scopes.iter().rev().find_map(|scope| match &scope.this {
                Value::Object(map) => map.get(first),
                _ => None,
            });
            from_scope
                .or_else(|| ctx.root.get(first))
                .and_then(|v| walk(v, rest))
                .cloned()
                .unwrap_or(Value::Null)
        }
    }
}

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

/// `null`, `false`, `0`, `""` and empty arrays are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Plain string form used for output. `null` renders as nothing.
pub(crate) fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric view of a number or a numeric string.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}
