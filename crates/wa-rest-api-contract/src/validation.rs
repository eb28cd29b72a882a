// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Validation helpers for API contract types

use crate::error::ApiContractError;
use crate::types::PairPhoneRequest;
use validator::Validate;

/// Shortest number (country code included) the platform will pair
pub const MIN_PHONE_DIGITS: usize = 7;

/// E.164 upper bound
pub const MAX_PHONE_DIGITS: usize = 15;

/// Validate a phone pairing request and return the normalized number
pub fn validate_pair_phone_request(request: &PairPhoneRequest) -> Result<String, ApiContractError> {
    request.validate()?;
    normalize_phone_number(&request.phone_number)
}

/// Normalize a phone number to the bare international digits the platform expects
///
/// Spaces, dashes, dots and parentheses are dropped, as is a single leading
/// `+`. What remains must be 7 to 15 ASCII digits.
pub fn normalize_phone_number(raw: &str) -> Result<String, ApiContractError> {
    let trimmed = raw.trim();
    let without_plus = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut digits = String::with_capacity(without_plus.len());
    for c in without_plus.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            other => {
                return Err(ApiContractError::InvalidPhoneNumber(format!(
                    "unexpected character '{}' in phone number",
                    other
                )));
            }
        }
    }

    if digits.len() < MIN_PHONE_DIGITS || digits.len() > MAX_PHONE_DIGITS {
        return Err(ApiContractError::InvalidPhoneNumber(format!(
            "phone number must contain {} to {} digits including the country code, got {}",
            MIN_PHONE_DIGITS,
            MAX_PHONE_DIGITS,
            digits.len()
        )));
    }

    if digits.starts_with('0') {
        return Err(ApiContractError::InvalidPhoneNumber(
            "phone number must start with the country code, not a trunk prefix".to_string(),
        ));
    }

    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProblemDetails;

    #[test]
    fn test_normalize_accepts_common_formats() {
        assert_eq!(normalize_phone_number("+1 (555) 010-9999").unwrap(), "15550109999");
        assert_eq!(normalize_phone_number("4915112345678").unwrap(), "4915112345678");
        assert_eq!(normalize_phone_number(" +44.20.7946.0958 ").unwrap(), "442079460958");
    }

    #[test]
    fn test_normalize_rejects_malformed_numbers() {
        for raw in ["", "+", "12345", "++15550109999", "1555abc0109", "0049151123456", "1234567890123456"] {
            assert!(
                matches!(normalize_phone_number(raw), Err(ApiContractError::InvalidPhoneNumber(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_pair_phone_request_empty() {
        let request = PairPhoneRequest {
            phone_number: String::new(),
        };
        assert!(matches!(
            validate_pair_phone_request(&request),
            Err(ApiContractError::Validation(_))
        ));
    }

    #[test]
    fn test_problem_details_serialization() {
        let problem = ProblemDetails {
            problem_type: "https://wacli.dev/errors/conflict".to_string(),
            title: "Already Authenticated".to_string(),
            status: Some(409),
            detail: "already authenticated".to_string(),
            authenticated: Some(true),
        };

        let json = serde_json::to_value(&problem).unwrap();
        assert_eq!(json["type"], "https://wacli.dev/errors/conflict");
        assert_eq!(json["status"], 409);
        assert_eq!(json["authenticated"], true);

        let back: ProblemDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back, problem);
    }
}
