use thiserror::Error;

/// Failures surfaced by the lead ads integration.
#[derive(Debug, Error)]
pub enum LeadAdsError {
    /// The integration is switched off or missing required configuration.
    #[error("{0}")]
    Configuration(String),

    /// Verify token presented by the platform does not match ours.
    #[error("Invalid verify token")]
    Verification,

    #[error("Invalid mode")]
    InvalidMode,

    #[error("{0}")]
    Payload(String),

    #[error("Invalid signature")]
    Signature,

    /// Lead record could not be written. Logged and swallowed by ingestion.
    #[error("Failed to create lead record: {0}")]
    Persistence(String),

    /// A call to the platform API failed while (un)subscribing.
    #[error("{0}")]
    Subscription(String),

    /// A read from the platform API failed.
    #[error("{0}")]
    Platform(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    OAuth(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LeadAdsError {
    pub fn disabled() -> Self {
        Self::Configuration("Facebook Lead Ads is not enabled".to_string())
    }
}

pub type Result<T> = std::result::Result<T, LeadAdsError>;
