//! JSON body validation extractor.

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::{FieldError, GateError};

/// Field-level checks run after a body deserializes.
pub trait Validate {
    fn validate(&self) -> Vec<FieldError>;
}

/// `Json<T>` that also runs [`Validate`]; rejects with 400 and per-field details.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| GateError::Validation {
                details: vec![FieldError::new("body", rejection.body_text())],
            })?;
        let details = value.validate();
        if !details.is_empty() {
            return Err(GateError::Validation { details });
        }
        Ok(ValidJson(value))
    }
}

/// Require a non-blank string no longer than `max` characters.
pub fn require_text(errors: &mut Vec<FieldError>, field: &str, value: &str, label: &str, max: usize) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(FieldError::new(field, format!("{} is required", label)));
    } else if trimmed.chars().count() > max {
        errors.push(FieldError::new(field, format!("{} cannot exceed {} characters", label, max)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_flags_blank_and_long() {
        let mut errs = Vec::new();
        require_text(&mut errs, "title", "   ", "Course title", 10);
        require_text(&mut errs, "description", "0123456789ab", "Description", 10);
        require_text(&mut errs, "ok", "fine", "Ok", 10);
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0], FieldError::new("title", "Course title is required"));
        assert_eq!(errs[1].message, "Description cannot exceed 10 characters");
    }
}
