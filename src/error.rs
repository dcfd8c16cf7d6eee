use thiserror::Error;

/// Fatal, startup-time errors: malformed descriptor, out-of-range values,
/// unknown element type, unknown concealment policy. Always reported with a
/// human-readable message and a non-zero exit; never surfaced at steady state.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("couldn't read config file {0}: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("invalid JSON in {0}: {1}")]
    Json(String, #[source] serde_json::Error),

    #[error("{0} is not a valid element type")]
    UnknownElementType(String),

    #[error("{0} is not a valid concealment policy")]
    UnknownConcealmentPolicy(String),

    #[error("element {index} ({element_type}): {reason}")]
    Element {
        index: usize,
        element_type: String,
        reason: String,
    },

    #[error("udp-params: {0}")]
    UdpParams(String),

    #[error("{0} is not a proper path for --dump-coeffs")]
    DumpPath(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
