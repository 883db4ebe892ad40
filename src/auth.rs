use thiserror::Error;

/// Credential rejection. The display text is part of the HTTP contract:
/// callers receive exactly this message in the 401 body.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid token")]
pub struct Unauthorized;

/// Checks presented credentials against the configured bearer token.
///
/// The comparison is an exact match on the full `Authorization` header
/// value, so scheme casing and whitespace must match `Bearer <token>`.
/// Plain string equality, not a constant-time comparison.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    expected: String,
}

impl AccessGuard {
    pub fn new(token: &str) -> Self {
        Self {
            expected: format!("Bearer {token}"),
        }
    }

    pub fn authorize(&self, presented: Option<&str>) -> Result<(), Unauthorized> {
        match presented {
            Some(value) if value == self.expected => Ok(()),
            _ => Err(Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_exact_bearer_value() {
        let guard = AccessGuard::new("s3cret");
        assert!(guard.authorize(Some("Bearer s3cret")).is_ok());
    }

    #[test]
    fn test_rejects_missing_header() {
        let guard = AccessGuard::new("s3cret");
        assert_eq!(guard.authorize(None), Err(Unauthorized));
    }

    #[test]
    fn test_rejects_wrong_token() {
        let guard = AccessGuard::new("s3cret");
        assert_eq!(guard.authorize(Some("Bearer nope")), Err(Unauthorized));
    }

    #[test]
    fn test_rejects_bare_token_without_scheme() {
        let guard = AccessGuard::new("s3cret");
        assert_eq!(guard.authorize(Some("s3cret")), Err(Unauthorized));
    }

    #[test]
    fn test_rejects_lowercase_scheme() {
        let guard = AccessGuard::new("s3cret");
        assert_eq!(guard.authorize(Some("bearer s3cret")), Err(Unauthorized));
    }

    #[test]
    fn test_error_renders_contract_message() {
        assert_eq!(Unauthorized.to_string(), "Invalid token");
    }
}
