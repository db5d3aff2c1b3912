use serde::Deserialize;

use crate::error::{Error, Result};

/// Role granted by a successful `authenticate`/`authenticate_api_key` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ReadWrite,
    ReadOnly,
    #[default]
    None,
}

/// Ancillary JSON payload returned by a successful authentication. Missing
/// fields default rather than failing to parse, since the server is free to
/// omit fields it considers irrelevant to the granted role.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResult {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: Role,
}

impl AuthResult {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidResponse(format!("malformed auth result: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_payload() {
        let result = AuthResult::parse(
            br#"{"session_id":"s1","api_key":"k1","username":"alice","role":"admin"}"#,
        )
        .expect("parse");
        assert_eq!(result.session_id, "s1");
        assert_eq!(result.role, Role::Admin);
    }

    #[test]
    fn missing_fields_default() {
        let result = AuthResult::parse(br#"{}"#).expect("parse");
        assert_eq!(result.session_id, "");
        assert_eq!(result.role, Role::None);
    }

    #[test]
    fn malformed_json_is_invalid_response() {
        let err = AuthResult::parse(b"not json").unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }
}
