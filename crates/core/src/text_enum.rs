//! Declarative helper for closed string-backed enums.
//!
//! Every enum stored in a TEXT column or sent over the wire goes through
//! [`text_enum!`], which keeps the database, serde and `FromStr`
//! representations identical.

/// Declare a fieldless enum whose variants map 1:1 onto string literals.
///
/// Generates `as_str`, an `ALL` slice in declaration order, `Display`,
/// `FromStr` (erroring with [`CoreError::Validation`](crate::error::CoreError))
/// and serde impls using the same literals.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $text:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the database / wire string representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => {
                        let valid: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        Err($crate::error::CoreError::Validation(format!(
                            "Unknown {} '{other}'. Valid values: {}",
                            stringify!($name),
                            valid.join(", ")
                        )))
                    }
                }
            }
        }
    };
}
