//! Domain error types.

/// Top-level error type for gridtrader.
#[derive(Debug, thiserror::Error)]
pub enum GridtraderError {
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

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no usable bars in {path}")]
    NoData { path: String },

    #[error("signal length {signals} does not match price series length {bars}")]
    SignalLength { bars: usize, signals: usize },

    #[error("entry would leave the position flat")]
    FlatPosition,

    #[error("position is already closed")]
    PositionClosed,

    #[error("candidate {candidate} produced no deals to summarize")]
    NoDeals { candidate: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&GridtraderError> for std::process::ExitCode {
    fn from(err: &GridtraderError) -> Self {
        let code: u8 = match err {
            GridtraderError::Io(_) => 1,
            GridtraderError::ConfigParse { .. }
            | GridtraderError::ConfigMissing { .. }
            | GridtraderError::ConfigInvalid { .. } => 2,
            GridtraderError::Data { .. } | GridtraderError::NoData { .. } => 3,
            GridtraderError::InvalidParameter { .. }
            | GridtraderError::SignalLength { .. }
            | GridtraderError::FlatPosition
            | GridtraderError::PositionClosed => 4,
            GridtraderError::NoDeals { .. } | GridtraderError::Report { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
