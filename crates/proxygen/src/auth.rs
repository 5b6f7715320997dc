use secrecy::ExposeSecret;

use crate::error::ApiError;
use crate::state::AppState;

/// Checks the `api_key` query parameter against the configured key.
pub fn authorize(state: &AppState, supplied: &str) -> Result<(), ApiError> {
    if constant_time_eq(supplied.as_bytes(), state.api_key.expose_secret().as_bytes()) {
        return Ok(());
    }
    tracing::warn!("unauthorized access attempt");
    Err(ApiError::unauthorized())
}

/// Constant-time byte comparison to prevent timing attacks on key validation.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_exact_bytes() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret!"));
        assert!(constant_time_eq(b"", b""));
    }
}
