//! Parser for composite type expressions.

use crate::errors::{ComposeError, ComposeResult};
use std::fmt;

/// A parsed type expression.
///
/// `map[list[float]]` parses to `Map(List(Base("float")))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A named type looked up in the registry.
    Base(String),
    /// A mapping with arbitrary string keys and uniformly typed values.
    Map(Box<TypeExpr>),
    /// A sequence of uniformly typed items.
    List(Box<TypeExpr>),
}

impl TypeExpr {
    /// Parse a type name such as `float`, `map[float]` or `list[list[float]]`.
    pub fn parse(name: &str) -> ComposeResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ComposeError::MalformedTypeExpr(name.to_string()));
        }

        for (prefix, wrap) in [
            ("map[", TypeExpr::Map as fn(Box<TypeExpr>) -> TypeExpr),
            ("list[", TypeExpr::List as fn(Box<TypeExpr>) -> TypeExpr),
        ] {
            if let Some(rest) = name.strip_prefix(prefix) {
                let inner = rest
                    .strip_suffix(']')
                    .ok_or_else(|| ComposeError::MalformedTypeExpr(name.to_string()))?;
                return Ok(wrap(Box::new(Self::parse(inner)?)));
            }
        }

        // Base names may not contain bracket characters
        if name.contains('[') || name.contains(']') {
            return Err(ComposeError::MalformedTypeExpr(name.to_string()));
        }
        Ok(TypeExpr::Base(name.to_string()))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Base(name) => write!(f, "{name}"),
            TypeExpr::Map(inner) => write!(f, "map[{inner}]"),
            TypeExpr::List(inner) => write!(f, "list[{inner}]"),
        }
    }
}
