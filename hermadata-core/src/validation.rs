//! Field validation for user-entered registry codes.
//!
//! Validation happens client-side before a payload is submitted; the backend
//! re-validates and may still reject (e.g. uniqueness conflicts).

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// A field value that fails its format check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid value for {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

/// Microchip code: 15 digits in groups of three, dot-separated.
static CHIP_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3}\.\d{3}\.\d{3}\.\d{3}\.\d{3}$").expect("valid regex"));

/// Italian fiscal code: 6 letters, 2 digits, 1 letter, 2 digits, 1 letter,
/// 3 digits, 1 letter (upper case).
static FISCAL_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{6}\d{2}[A-Z]\d{2}[A-Z]\d{3}[A-Z]$").expect("valid regex"));

/// Check a microchip code against the `###.###.###.###.###` format.
pub fn validate_chip_code(value: &str) -> Result<(), ValidationError> {
    if CHIP_CODE_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: "chip_code",
            reason: format!("'{}' does not match ###.###.###.###.###", value),
        })
    }
}

/// Check an Italian fiscal code shape (16 characters, fixed letter/digit
/// pattern). The checksum character is not verified.
pub fn validate_fiscal_code(value: &str) -> Result<(), ValidationError> {
    if FISCAL_CODE_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: "fiscal_code",
            reason: format!("'{}' is not a well-formed fiscal code", value),
        })
    }
}
