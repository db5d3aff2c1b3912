use serde::Deserialize;

use crate::error::{Error, Result};

/// Ancillary JSON payload describing a completed backup. Unlike
/// `AuthResult`, every field is required here — a truncated backup
/// descriptor is itself a server-side error worth surfacing distinctly.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupMetadata {
    pub backup_path: String,
    pub timestamp: i64,
    pub size_bytes: u64,
    pub vlog_count: u16,
    pub entry_count: u64,
}

impl BackupMetadata {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidResponse(format!("malformed backup metadata: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_payload() {
        let metadata = BackupMetadata::parse(
            br#"{"backup_path":"/var/backups/1","timestamp":1700000000,"size_bytes":4096,"vlog_count":3,"entry_count":128}"#,
        )
        .expect("parse");
        assert_eq!(metadata.backup_path, "/var/backups/1");
        assert_eq!(metadata.size_bytes, 4096);
    }

    #[test]
    fn missing_field_is_invalid_response() {
        let err = BackupMetadata::parse(br#"{"backup_path":"/x"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }
}
