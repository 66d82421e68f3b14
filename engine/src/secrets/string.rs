use std::fmt;

/// Credential text that formats as `[REDACTED]`
///
/// The value is only reachable through [`SecretString::expose`] and
/// [`SecretString::bearer`], which keeps every read site greppable.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Trimmed secret from an environment value; `None` when nothing is left
    pub fn non_blank(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value carrying this secret
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_never_shows_value() {
        let key = SecretString::from("sk-live-123");
        let logged = format!("{} {:?} {:?}", key, key, Some(&key));
        assert!(!logged.contains("sk-live"));
        assert_eq!(key.expose(), "sk-live-123");
        assert_eq!(key.bearer(), "Bearer sk-live-123");
    }

    #[test]
    fn test_non_blank() {
        let token = SecretString::non_blank(" tok\n").unwrap();
        assert_eq!(token.expose(), "tok");
        assert!(SecretString::non_blank("").is_none());
        assert!(SecretString::non_blank(" \t\n").is_none());
    }
}
