//! Input constraints for request bodies and query strings.

use serde_json::Value;
use std::fmt;

use crate::error::FieldViolation;

/// Error type for building constraints.
#[derive(Debug, thiserror::Error)]
pub enum ConstraintError {
    #[error("invalid JSON Schema: {0}")]
    InvalidSchema(String),
}

/// Something that can accept or reject a decoded input value.
pub trait Constraint: Send + Sync {
    /// Check `value`, returning every violation found.
    fn check(&self, value: &Value) -> Result<(), Vec<FieldViolation>>;

    /// Schema document describing accepted values, for documentation.
    fn schema(&self) -> Option<&Value> {
        None
    }
}

impl<F> Constraint for F
where
    F: Fn(&Value) -> Result<(), Vec<FieldViolation>> + Send + Sync,
{
    fn check(&self, value: &Value) -> Result<(), Vec<FieldViolation>> {
        self(value)
    }
}

/// A compiled JSON Schema.
pub struct JsonSchema {
    schema: Value,
    validator: jsonschema::Validator,
}

impl JsonSchema {
    pub fn compile(schema: Value) -> Result<Self, ConstraintError> {
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| ConstraintError::InvalidSchema(e.to_string()))?;

        Ok(Self { schema, validator })
    }
}

impl Constraint for JsonSchema {
    fn check(&self, value: &Value) -> Result<(), Vec<FieldViolation>> {
        let violations: Vec<FieldViolation> = self
            .validator
            .iter_errors(value)
            .map(|e| FieldViolation::new(pointer_segments(&e.instance_path.to_string()), e.to_string()))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn schema(&self) -> Option<&Value> {
        Some(&self.schema)
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema").field("schema", &self.schema).finish()
    }
}

/// Split a JSON pointer (`/a/0/b~1c`) into unescaped segments.
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}
