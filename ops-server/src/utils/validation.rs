//! Request validation helpers used by the HTTP façade

use super::{AppError, AppResult};

pub const MAX_NAME_LEN: usize = 100;

/// Required non-empty text with a maximum length
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")).with_detail("field", field));
    }
    if trimmed.len() > max_len {
        return Err(
            AppError::validation(format!("{field} exceeds {max_len} characters"))
                .with_detail("field", field),
        );
    }
    Ok(())
}

/// Party size must fit a physical table (1..=20 covers)
pub fn validate_party_size(size: i64) -> AppResult<()> {
    if !(1..=20).contains(&size) {
        return Err(
            AppError::with_message(shared::ErrorCode::ValueOutOfRange, "party_size must be 1..=20")
                .with_detail("field", "party_size"),
        );
    }
    Ok(())
}

/// Confidence values are probabilities
pub fn validate_confidence(confidence: f64) -> AppResult<()> {
    if !(0.0..=1.0).contains(&confidence) || confidence.is_nan() {
        return Err(
            AppError::with_message(shared::ErrorCode::ValueOutOfRange, "confidence must be 0..=1")
                .with_detail("field", "confidence"),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_oversized_text() {
        assert!(validate_required_text("  ", "name", 10).is_err());
        assert!(validate_required_text("abcdefghijk", "name", 10).is_err());
        assert!(validate_required_text("ok", "name", 10).is_ok());
    }

    #[test]
    fn party_size_bounds() {
        assert!(validate_party_size(0).is_err());
        assert!(validate_party_size(21).is_err());
        assert!(validate_party_size(4).is_ok());
    }

    #[test]
    fn confidence_bounds() {
        assert!(validate_confidence(-0.1).is_err());
        assert!(validate_confidence(1.1).is_err());
        assert!(validate_confidence(f64::NAN).is_err());
        assert!(validate_confidence(0.92).is_ok());
    }
}
