//! Typed errors surfaced by the store, the lock controller and the control endpoint.
//!
//! Two families:
//! - `Config`: the option store rejected a read or write for one key.
//! - `MalformedRequest`: the inbound control request could not be parsed; the
//!   controller is never invoked for these.
//!
//! Daemon plumbing (config files, binding, CLI) stays on `anyhow`.

use thiserror::Error;

use crate::options::OptionKind;

/// Why the store refused a key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigFault {
    #[error("unknown option")]
    Unknown,

    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: OptionKind,
        found: &'static str,
    },

    #[error("null is not allowed")]
    NullNotAllowed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The option store rejected `key`.
    #[error("option '{key}': {fault}")]
    Config { key: String, fault: ConfigFault },

    /// The request body is missing or not shaped like `{"options": {...}}`.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl ControlError {
    pub fn unknown_option(key: impl Into<String>) -> Self {
        ControlError::Config {
            key: key.into(),
            fault: ConfigFault::Unknown,
        }
    }

    pub fn config(key: impl Into<String>, fault: ConfigFault) -> Self {
        ControlError::Config {
            key: key.into(),
            fault,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        ControlError::MalformedRequest(msg.into())
    }

    /// Stable machine-readable kind, used as the `error` field of responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlError::Config { .. } => "config_error",
            ControlError::MalformedRequest(_) => "malformed_request",
        }
    }

    /// Offending option key, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ControlError::Config { key, .. } => Some(key),
            ControlError::MalformedRequest(_) => None,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ControlError::Config { .. } => 422,
            ControlError::MalformedRequest(_) => 400,
        }
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_carries_key_and_kind() {
        let err = ControlError::unknown_option("unknown_key");
        assert_eq!(err.kind(), "config_error");
        assert_eq!(err.key(), Some("unknown_key"));
        assert_eq!(err.http_status(), 422);
        assert_eq!(err.to_string(), "option 'unknown_key': unknown option");
    }

    #[test]
    fn malformed_request_has_no_key() {
        let err = ControlError::malformed("empty body");
        assert_eq!(err.kind(), "malformed_request");
        assert!(err.key().is_none());
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn type_mismatch_message_names_both_kinds() {
        let err = ControlError::config(
            "timeout",
            ConfigFault::TypeMismatch {
                expected: OptionKind::Int,
                found: "string",
            },
        );
        assert_eq!(err.to_string(), "option 'timeout': expected int, got string");
    }
}
