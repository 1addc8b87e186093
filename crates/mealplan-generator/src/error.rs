//! Errors raised while producing a meal plan.

use mealplan_core::{RequestError, ValidationResult};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Transport(String),

    #[error("Generation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Malformed generation result: {0}")]
    MalformedResult(String),

    #[error("Day {day} totals {actual} calories, outside the window around {expected}")]
    CalorieBoundsViolation { day: u32, actual: f64, expected: u32 },

    #[error("Generation failed after {attempts} attempts: {last_error}")]
    GenerationExhausted {
        attempts: u32,
        #[source]
        last_error: Box<GenerationError>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
}

impl GenerationError {
    /// Attempt-level failures are retried; anything else ends the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::Transport(_)
                | GenerationError::Timeout { .. }
                | GenerationError::MalformedResult(_)
                | GenerationError::CalorieBoundsViolation { .. }
        )
    }

    /// Turn a validator verdict into the attempt error it represents.
    pub fn check_validation(result: ValidationResult) -> Result<(), GenerationError> {
        match result {
            ValidationResult::Valid => Ok(()),
            ValidationResult::InvalidStructure(reason) => Err(GenerationError::MalformedResult(reason)),
            ValidationResult::InvalidCalorieBounds { day, actual, expected } => {
                Err(GenerationError::CalorieBoundsViolation { day, actual, expected })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_mapping() {
        assert!(GenerationError::check_validation(ValidationResult::Valid).is_ok());

        let structure = GenerationError::check_validation(ValidationResult::InvalidStructure(
            "expected 3 days, got 2".to_string(),
        ));
        assert!(matches!(structure, Err(GenerationError::MalformedResult(ref r)) if r.contains("3 days")));

        let calories = GenerationError::check_validation(ValidationResult::InvalidCalorieBounds {
            day: 2,
            actual: 2100.0,
            expected: 2000,
        });
        assert!(matches!(
            calories,
            Err(GenerationError::CalorieBoundsViolation { day: 2, expected: 2000, .. })
        ));
    }

    #[test]
    fn test_exhausted_message_carries_last_error() {
        let err = GenerationError::GenerationExhausted {
            attempts: 3,
            last_error: Box::new(GenerationError::Timeout { timeout_secs: 120 }),
        };

        assert_eq!(
            err.to_string(),
            "Generation failed after 3 attempts: Generation timed out after 120 seconds"
        );
        assert!(!err.is_retryable());
        assert!(GenerationError::Transport("503".to_string()).is_retryable());
    }
}
