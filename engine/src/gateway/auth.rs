//! Bearer token check
//!
//! Both the configured token and the presented one are reduced to SHA-256
//! digests and compared with an XOR fold, so the comparison touches every
//! byte regardless of where the values differ or how long they are.

use crate::secrets::SecretString;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use sdk::errors::VariantError;
use sha2::{Digest, Sha256};

pub struct BearerAuth {
    expected: Option<[u8; 32]>,
}

impl BearerAuth {
    /// With no configured token every request is rejected
    pub fn new(token: Option<&SecretString>) -> Self {
        Self {
            expected: token.map(|t| digest(t.expose())),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    pub fn verify(&self, headers: &HeaderMap) -> Result<(), VariantError> {
        let expected = self.expected.as_ref().ok_or(VariantError::Auth)?;
        let presented = bearer_token(headers).ok_or(VariantError::Auth)?;

        if constant_time_eq(expected, &digest(presented)) {
            Ok(())
        } else {
            Err(VariantError::Auth)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
