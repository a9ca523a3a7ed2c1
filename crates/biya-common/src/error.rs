use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("no jobs configured")]
    NoJobs,
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("upstream {url} returned status {status}")]
    UpstreamStatus { url: String, status: u16 },
    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("collection cancelled by shutdown")]
    Cancelled,
}

impl ExporterError {
    /// Short, stable classification used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) | Self::NoJobs => "config",
            Self::Upstream(_) | Self::UpstreamStatus { .. } => "upstream",
            Self::MalformedPayload(_) => "payload",
            Self::InternalError(_) | Self::Io(_) => "internal",
            Self::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
