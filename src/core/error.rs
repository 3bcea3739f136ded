use thiserror::Error;

const CAPACITY_MARKERS: &[&str] = &[
    "voice_limit_reached",
    "voice_limit",
    "quota_exceeded",
    "limit_reached",
    "too many voices",
];

/// Failures reported by an upstream provider (generation, voice or transcription).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} API error (HTTP {status}): {message}")]
    Status {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider} returned an unusable response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            ProviderError::Malformed { .. } => None,
        }
    }

    /// The requested model does not exist or rejected the request shape.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self.status(), Some(400) | Some(404))
    }

    /// Voice creation was refused because the account ran out of voice slots or quota.
    pub fn is_capacity_limited(&self) -> bool {
        match self {
            ProviderError::Status { status, message, .. } => {
                let message = message.to_lowercase();
                matches!(status, 400 | 401 | 403 | 422 | 429)
                    && CAPACITY_MARKERS.iter().any(|m| message.contains(m))
            }
            ProviderError::Malformed { .. } => false,
        }
    }
}

/// Returns the provider error wrapped in `err`, if any.
pub fn provider_error(err: &anyhow::Error) -> Option<&ProviderError> {
    err.downcast_ref::<ProviderError>()
}
