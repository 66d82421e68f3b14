//! Request body parsing
//!
//! Parsed by hand from raw bytes so that every malformed body gets the same
//! `400 {"error": ...}` shape instead of a framework rejection.

use sdk::errors::VariantError;
use sdk::types::{VariantRequest, DEFAULT_VARIANT_COUNT, MAX_VARIANT_COUNT, MIN_VARIANT_COUNT};
use serde_json::Value;

pub fn parse_request(body: &[u8]) -> Result<VariantRequest, VariantError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| VariantError::Validation("request body must be valid JSON".to_string()))?;

    let object = value.as_object().ok_or_else(|| {
        VariantError::Validation("request body must be a JSON object".to_string())
    })?;

    let question = match object.get("question") {
        Some(Value::String(s)) => s.as_str(),
        _ => {
            return Err(VariantError::Validation(
                "`question` must be a non-empty string".to_string(),
            ))
        }
    };

    let num = match object.get("num") {
        None | Some(Value::Null) => i64::from(DEFAULT_VARIANT_COUNT),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.as_i64().unwrap_or(i64::MAX),
        Some(_) => {
            return Err(VariantError::Validation(format!(
                "`num` must be an integer between {} and {}",
                MIN_VARIANT_COUNT, MAX_VARIANT_COUNT
            )))
        }
    };

    VariantRequest::new(question, num)
}
