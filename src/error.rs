use thiserror::Error;

/// Errors raised while reading a recording or analysing its signals.
///
/// None of these are transient: they describe either a malformed container
/// or a caller passing something outside the valid domain, so nothing in this
/// crate retries on them.
#[derive(Error, Debug)]
pub enum MeaError {
    /// A required group, table or entity is missing or malformed
    #[error("Container corrupt at {path}: {reason}")]
    ContainerCorrupt { path: String, reason: String },

    /// No channel with the requested label or storage index
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// A label or index outside the MEA60 layout
    #[error("Invalid electrode {kind}: {value}")]
    InvalidElectrode { kind: &'static str, value: i64 },

    /// A signal that cannot be reduced to one dimension
    #[error("Shape error: {0}")]
    ShapeError(String),

    /// Phase metadata asks for a digital stream the container cannot provide
    #[error("Inconsistent digital flag: {0}")]
    InconsistentDigitalFlag(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MeaError {
    pub(crate) fn corrupt(path: impl Into<String>, reason: impl Into<String>) -> Self {
        MeaError::ContainerCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MeaError>;
