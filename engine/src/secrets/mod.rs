//! Secret handling
//!
//! The provider API key and the gateway bearer token are read once at startup
//! from the environment variables named in the configuration. They are held
//! as [`SecretString`] so that they never reach a log line by accident.
//!
//! [`scrub_secrets`] removes credential-shaped substrings from upstream text
//! before it is logged or returned to a caller.

pub mod string;

pub use string::SecretString;

use crate::config::Config;
use regex::Regex;
use std::sync::OnceLock;

/// Credentials loaded at startup
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Key sent to the completion service
    pub api_key: Option<SecretString>,

    /// Pre-shared token callers must present to the gateway
    pub auth_token: Option<SecretString>,
}

impl Secrets {
    /// Read both secrets from the process environment
    pub fn from_env(config: &Config) -> Self {
        Self::from_lookup(config, |key| std::env::var(key).ok())
    }

    /// Read both secrets through the given variable lookup
    ///
    /// Values are trimmed; blank ones are treated as absent.
    pub fn from_lookup<F>(config: &Config, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).and_then(SecretString::non_blank);

        Self {
            api_key: read(&config.llm.api_key_env),
            auth_token: read(&config.auth.token_env),
        }
    }
}

static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Patterns for credential formats that may be echoed back by the upstream service
fn secret_patterns() -> &'static [Regex] {
    SECRET_PATTERNS.get_or_init(|| {
        [
            // OpenAI-style keys, including sk-proj- and sk-test- variants
            r"sk-[a-zA-Z0-9\-_]{20,}",
            r"Bearer\s+[^\s]{20,}",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Replace credential-shaped substrings with `[REDACTED]`
pub fn scrub_secrets(text: &str) -> String {
    secret_patterns()
        .iter()
        .fold(text.to_string(), |acc, pattern| {
            pattern.replace_all(&acc, "[REDACTED]").into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup_reads_configured_names() {
        let mut config = Config::default();
        config.auth.token_env = "MY_TOKEN".to_string();

        let secrets = Secrets::from_lookup(&config, |key| match key {
            "OPENAI_API_KEY" => Some("sk-abc".to_string()),
            "MY_TOKEN" => Some("letmein\n".to_string()),
            _ => None,
        });

        assert_eq!(secrets.api_key.unwrap().expose(), "sk-abc");
        assert_eq!(secrets.auth_token.unwrap().expose(), "letmein");
    }

    #[test]
    fn test_blank_secret_is_absent() {
        let config = Config::default();
        let secrets = Secrets::from_lookup(&config, |_| Some("   ".to_string()));
        assert!(secrets.api_key.is_none());
        assert!(secrets.auth_token.is_none());
    }

    #[test]
    fn test_scrub_secrets() {
        let text = "Incorrect API key provided: sk-proj-abcdefghijklmnopqrstuvwxyz123";
        let scrubbed = scrub_secrets(text);
        assert!(!scrubbed.contains("sk-proj"));
        assert!(scrubbed.contains("[REDACTED]"));

        assert_eq!(scrub_secrets("context too long"), "context too long");
    }
}
