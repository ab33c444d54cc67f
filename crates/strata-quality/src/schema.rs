//! Validation against a registered JSON Schema definition.
//!
//! Definitions are compiled once per batch with the `jsonschema` crate, so
//! every keyword it supports (`minimum`, `enum`, `pattern`,
//! `additionalProperties`, local `$ref` and the rest) is enforced. Remote
//! references are not resolved.

use std::fmt;

use serde_json::Value;

/// A compiled event schema.
pub struct EventSchema {
    validator: jsonschema::Validator,
}

impl fmt::Debug for EventSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSchema").finish_non_exhaustive()
    }
}

/// A definition that is not a valid JSON Schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSchema(pub String);

impl fmt::Display for InvalidSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid schema: {}", self.0)
    }
}

impl std::error::Error for InvalidSchema {}

impl EventSchema {
    pub fn compile(definition: &Value) -> Result<Self, InvalidSchema> {
        let validator = jsonschema::validator_for(definition).map_err(|e| InvalidSchema(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Validates `instance`, returning a description of the first violation.
    pub fn validate(&self, instance: &Value) -> Result<(), String> {
        match self.validator.iter_errors(instance).next() {
            Some(error) => Err(error.to_string()),
            None => Ok(()),
        }
    }
}
