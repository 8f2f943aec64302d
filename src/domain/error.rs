//! Domain error types.

/// Top-level error type for tickforge.
///
/// `Persistence` failures inside the signal sink are logged and swallowed;
/// everywhere else errors propagate to the caller. `Feed` errors are
/// transient by definition: the feed owns its reconnect loop and the engine
/// only republishes status.
#[derive(Debug, thiserror::Error)]
pub enum TickforgeError {
    #[error("broker authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("no historical candles for {instrument} {timeframe} in the requested range")]
    DataUnavailable {
        instrument: String,
        timeframe: String,
    },

    #[error("store error: {reason}")]
    Persistence { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("feed error: {reason}")]
    Feed { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TickforgeError> for std::process::ExitCode {
    fn from(err: &TickforgeError) -> Self {
        let code: u8 = match err {
            TickforgeError::Io(_) => 1,
            TickforgeError::ConfigParse { .. }
            | TickforgeError::ConfigMissing { .. }
            | TickforgeError::ConfigInvalid { .. } => 2,
            TickforgeError::Persistence { .. } => 3,
            TickforgeError::Authentication { .. } => 4,
            TickforgeError::DataUnavailable { .. } => 5,
            TickforgeError::Feed { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
