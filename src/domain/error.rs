//! Domain error types.
//!
//! Only construction and configuration paths fail. Numeric edge cases inside the
//! simulation, analyzers and risk engine resolve to documented defaults instead.

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum TradesimError {
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

    #[error("invalid decimal literal {input:?}: {reason}")]
    DecimalParse { input: String, reason: String },

    #[error("strategy {name} not found")]
    UnknownStrategy { name: String },

    #[error(transparent)]
    StrategySerde(#[from] serde_json::Error),

    #[error("bar period starting {start} begins before last bar period end {last_end}")]
    OutOfOrderBar { start: String, last_end: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
