//! Registry of named structural types.

use crate::errors::{ComposeError, ComposeResult};
use crate::types::expr::TypeExpr;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Definition of a registered type name.
#[derive(Clone)]
pub enum TypeDef {
    /// A leaf type with a membership check and a zero value.
    Scalar {
        check: fn(&Value) -> bool,
        zero: fn() -> Value,
    },
    /// A record with a fixed set of named, typed fields.
    ///
    /// Values must be mappings containing every declared field. Additional
    /// keys are accepted so producers can attach extra metadata.
    Record { fields: Vec<(String, String)> },
    /// Another name for an existing type expression.
    Alias(String),
}

impl std::fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeDef::Scalar { .. } => f.write_str("Scalar"),
            TypeDef::Record { fields } => f.debug_struct("Record").field("fields", fields).finish(),
            TypeDef::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
        }
    }
}

/// Mapping from type names to structural validators.
///
/// The registry is constructed once at startup and passed by reference into
/// every composite and step constructor. Composites and steps only read it.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    definitions: HashMap<String, TypeDef>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the primitive types registered.
    ///
    /// Registers `float`, `integer`, `string`, `boolean` and `any`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            "float",
            TypeDef::Scalar {
                check: |v| v.as_f64().is_some(),
                zero: || Value::from(0.0),
            },
        );
        registry.register(
            "integer",
            TypeDef::Scalar {
                check: |v| v.as_i64().is_some() || v.as_u64().is_some(),
                zero: || Value::from(0),
            },
        );
        registry.register(
            "string",
            TypeDef::Scalar {
                check: Value::is_string,
                zero: || Value::from(""),
            },
        );
        registry.register(
            "boolean",
            TypeDef::Scalar {
                check: Value::is_boolean,
                zero: || Value::from(false),
            },
        );
        registry.register(
            "any",
            TypeDef::Scalar {
                check: |_| true,
                zero: || Value::Null,
            },
        );
        registry
    }

    /// Register a type definition under a name, replacing any previous one.
    pub fn register(&mut self, name: &str, definition: TypeDef) {
        self.definitions.insert(name.to_string(), definition);
    }

    /// Register a record type from `(field, type name)` pairs.
    pub fn register_record(&mut self, name: &str, fields: &[(&str, &str)]) {
        let fields = fields
            .iter()
            .map(|(field, type_name)| (field.to_string(), type_name.to_string()))
            .collect();
        self.register(name, TypeDef::Record { fields });
    }

    /// Register an alias for an existing type expression.
    pub fn register_alias(&mut self, name: &str, target: &str) {
        self.register(name, TypeDef::Alias(target.to_string()));
    }

    /// Check that every base name in a type expression is registered.
    pub fn check_known(&self, name: &str) -> ComposeResult<()> {
        self.walk_known(&TypeExpr::parse(name)?, 0)
    }

    fn walk_known(&self, expr: &TypeExpr, depth: usize) -> ComposeResult<()> {
        // An alias chain longer than the registry must contain a loop
        if depth > self.definitions.len() + 1 {
            return Err(ComposeError::MalformedTypeExpr(expr.to_string()));
        }
        match expr {
            TypeExpr::Base(name) => match self.definitions.get(name) {
                None => Err(ComposeError::UnknownType(name.clone())),
                Some(TypeDef::Alias(target)) => {
                    self.walk_known(&TypeExpr::parse(target)?, depth + 1)
                }
                Some(TypeDef::Record { fields }) => {
                    for (_, field_type) in fields {
                        self.walk_known(&TypeExpr::parse(field_type)?, depth + 1)?;
                    }
                    Ok(())
                }
                Some(TypeDef::Scalar { .. }) => Ok(()),
            },
            TypeExpr::Map(inner) | TypeExpr::List(inner) => self.walk_known(inner, depth),
        }
    }

    /// Resolve a type name to its expression with aliases expanded.
    ///
    /// Used to decide whether two declared port types refer to the same
    /// structure.
    pub fn resolve(&self, name: &str) -> ComposeResult<TypeExpr> {
        self.resolve_expr(TypeExpr::parse(name)?, 0)
    }

    fn resolve_expr(&self, expr: TypeExpr, depth: usize) -> ComposeResult<TypeExpr> {
        if depth > self.definitions.len() + 1 {
            return Err(ComposeError::MalformedTypeExpr(expr.to_string()));
        }
        match expr {
            TypeExpr::Base(name) => match self.definitions.get(&name) {
                None => Err(ComposeError::UnknownType(name)),
                Some(TypeDef::Alias(target)) => {
                    self.resolve_expr(TypeExpr::parse(target)?, depth + 1)
                }
                Some(_) => Ok(TypeExpr::Base(name)),
            },
            TypeExpr::Map(inner) => Ok(TypeExpr::Map(Box::new(
                self.resolve_expr(*inner, depth)?,
            ))),
            TypeExpr::List(inner) => Ok(TypeExpr::List(Box::new(
                self.resolve_expr(*inner, depth)?,
            ))),
        }
    }

    /// Validate a value against a type name.
    ///
    /// Returns `Ok(false)` when the value does not conform and an error only
    /// when the type name itself is unknown or malformed.
    pub fn validate(&self, name: &str, value: &Value) -> ComposeResult<bool> {
        self.validate_expr(&TypeExpr::parse(name)?, value, 0)
    }

    fn validate_expr(&self, expr: &TypeExpr, value: &Value, depth: usize) -> ComposeResult<bool> {
        if depth > self.definitions.len() + 1 {
            return Err(ComposeError::MalformedTypeExpr(expr.to_string()));
        }
        match expr {
            TypeExpr::Base(name) => match self.definitions.get(name) {
                None => Err(ComposeError::UnknownType(name.clone())),
                Some(TypeDef::Scalar { check, .. }) => Ok(check(value)),
                Some(TypeDef::Alias(target)) => {
                    self.validate_expr(&TypeExpr::parse(target)?, value, depth + 1)
                }
                Some(TypeDef::Record { fields }) => {
                    let Some(map) = value.as_object() else {
                        return Ok(false);
                    };
                    for (field, field_type) in fields {
                        let Some(field_value) = map.get(field) else {
                            return Ok(false);
                        };
                        if !self.validate_expr(
                            &TypeExpr::parse(field_type)?,
                            field_value,
                            depth + 1,
                        )? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
            },
            TypeExpr::Map(inner) => {
                let Some(map) = value.as_object() else {
                    return Ok(false);
                };
                for item in map.values() {
                    if !self.validate_expr(inner, item, depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            TypeExpr::List(inner) => {
                let Some(items) = value.as_array() else {
                    return Ok(false);
                };
                for item in items {
                    if !self.validate_expr(inner, item, depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Render a value for persistence, checking conformance first.
    pub fn render(&self, name: &str, value: &Value) -> ComposeResult<Value> {
        if self.validate(name, value)? {
            Ok(value.clone())
        } else {
            Err(ComposeError::TypeMismatch {
                type_name: name.to_string(),
                detail: short_value(value),
            })
        }
    }

    /// The default value used to seed an unwired input port.
    ///
    /// Mappings default to an empty mapping and lists to an empty list, so a
    /// step whose upstream has produced nothing yet observes an empty
    /// collection rather than a missing key.
    pub fn zero_value(&self, name: &str) -> ComposeResult<Value> {
        self.zero_expr(&TypeExpr::parse(name)?, 0)
    }

    fn zero_expr(&self, expr: &TypeExpr, depth: usize) -> ComposeResult<Value> {
        if depth > self.definitions.len() + 1 {
            return Err(ComposeError::MalformedTypeExpr(expr.to_string()));
        }
        match expr {
            TypeExpr::Base(name) => match self.definitions.get(name) {
                None => Err(ComposeError::UnknownType(name.clone())),
                Some(TypeDef::Scalar { zero, .. }) => Ok(zero()),
                Some(TypeDef::Alias(target)) => {
                    self.zero_expr(&TypeExpr::parse(target)?, depth + 1)
                }
                Some(TypeDef::Record { fields }) => {
                    let mut map = Map::new();
                    for (field, field_type) in fields {
                        map.insert(
                            field.clone(),
                            self.zero_expr(&TypeExpr::parse(field_type)?, depth + 1)?,
                        );
                    }
                    Ok(Value::Object(map))
                }
            },
            TypeExpr::Map(_) => Ok(Value::Object(Map::new())),
            TypeExpr::List(_) => Ok(Value::Array(vec![])),
        }
    }
}

fn short_value(value: &Value) -> String {
    let rendered = value.to_string();
    match rendered.char_indices().nth(120) {
        Some((cut, _)) => format!("{}...", &rendered[..cut]),
        None => rendered,
    }
}
