//! Structural typing for port values.
//!
//! Type names are strings. Primitive names (`float`, `string`, ...) are
//! registered validators, while `map[X]` and `list[X]` are derived
//! structurally from the inner type. A `map[X]` accepts any mapping whose
//! values all validate against `X`, independent of the key set, which is what
//! allows steps with differing species sets to share state paths.

mod expr;
mod registry;

pub use expr::TypeExpr;
pub use registry::{TypeDef, TypeRegistry};
