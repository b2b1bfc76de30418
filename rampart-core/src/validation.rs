//! Key validation.

use std::net::IpAddr;

use crate::error::ValidationError;

/// Validate a block key as a well-formed IP address (v4 or v6).
///
/// Only mutating calls validate; lookups for a malformed key simply find
/// nothing.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::InvalidKey("empty key".to_string()));
    }

    key.parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidKey(key.to_string()))
}
