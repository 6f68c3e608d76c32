pub type RelayResult<T> = Result<T, GatewayError>;

/// Error taxonomy shared by every crate in the workspace.
///
/// Variants carrying an upstream status preserve it so the embedding server
/// can forward the original code to the client; everything else maps to a
/// generic 5xx at the edge.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("upstream auth rejected: {0}")]
    AuthRejected(String),

    #[error("unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("no healthy provider available for {0}")]
    PoolExhausted(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("json error: {0}")]
    Json(String),
}

impl GatewayError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn unsupported_conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        GatewayError::UnsupportedConversion {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Upstream status code when one was observed.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::Upstream { status, .. } => Some(*status),
            GatewayError::AuthRejected(_) => Some(401),
            _ => None,
        }
    }

    /// Whether the adapter retry ladder may re-attempt this failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Upstream { status, .. } if *status == 429 || *status >= 500
        )
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Json(err.to_string())
    }
}
