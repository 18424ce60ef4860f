use std::borrow::Cow;

use validator::{ValidationError, ValidationErrors};

/// Collects field-level failures for inputs that are checked by hand rather
/// than through `#[derive(Validate)]`.
#[derive(Debug)]
pub struct FieldErrors {
    errors: ValidationErrors,
}

impl Default for FieldErrors {
    fn default() -> Self {
        Self {
            errors: ValidationErrors::new(),
        }
    }
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, code: &'static str, message: impl Into<String>) {
        let mut error = ValidationError::new(code);
        error.message = Some(Cow::Owned(message.into()));
        self.errors.add(field, error);
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Single-field failure, for call sites that reject one value.
pub fn field_error(field: &'static str, code: &'static str, message: impl Into<String>) -> ValidationErrors {
    let mut errors = FieldErrors::new();
    errors.add(field, code, message);
    errors.errors
}
