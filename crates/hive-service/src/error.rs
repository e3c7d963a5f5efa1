//! Request-level error taxonomy.
//!
//! Every variant is caught at the single-request boundary and turned into
//! an `error` response; none of them stops the service loop.

use thiserror::Error;

/// Errors reported to the parent process on an `error` response.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Provider construction failed (after any declared fallback)
    #[error("{0}")]
    ProviderLoad(String),

    /// Line is not a JSON object, or not valid UTF-8
    #[error("Invalid JSON: {0}")]
    Decode(String),

    #[error("Unknown request type: {0}")]
    UnknownKind(String),

    /// Well-formed JSON with a missing or mistyped field
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request of {size} bytes exceeds the {limit} byte limit")]
    InputTooLarge { size: usize, limit: usize },

    #[error("Unsupported protocol version {requested} (supported: {supported})")]
    UnsupportedVersion { requested: u64, supported: u32 },

    /// Unexpected failure while embedding or analyzing, including panics
    #[error("Internal analysis error: {0}")]
    InternalAnalysis(String),
}

impl ServiceError {
    /// Stable machine-readable code carried on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::ProviderLoad(_) => "provider_load",
            ServiceError::Decode(_) => "decode",
            ServiceError::UnknownKind(_) => "unknown_kind",
            ServiceError::InvalidRequest(_) => "invalid_request",
            ServiceError::InputTooLarge { .. } => "input_too_large",
            ServiceError::UnsupportedVersion { .. } => "unsupported_version",
            ServiceError::InternalAnalysis(_) => "internal_analysis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_names_the_kind() {
        let err = ServiceError::UnknownKind("teleport".to_string());
        assert_eq!(err.to_string(), "Unknown request type: teleport");
        assert_eq!(err.code(), "unknown_kind");
    }

    #[test]
    fn test_provider_load_message_is_passed_through() {
        let err = ServiceError::ProviderLoad("Unknown model: acme/imaginary".to_string());
        assert_eq!(err.to_string(), "Unknown model: acme/imaginary");
        assert_eq!(err.code(), "provider_load");
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            ServiceError::ProviderLoad(String::new()),
            ServiceError::Decode(String::new()),
            ServiceError::UnknownKind(String::new()),
            ServiceError::InvalidRequest(String::new()),
            ServiceError::InputTooLarge { size: 2, limit: 1 },
            ServiceError::UnsupportedVersion {
                requested: 2,
                supported: 1,
            },
            ServiceError::InternalAnalysis(String::new()),
        ];
        let mut codes: Vec<&str> = errors.iter().map(ServiceError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
