use thiserror::Error;

/// Result alias used across the crate
pub type NetResult<T> = std::result::Result<T, NetError>;

/// Coarse classification of [`NetError`] used by callers to decide whether a
/// failure is the request's fault, the data's fault or the environment's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown enumeration values, malformed identifiers, bad configuration
    Validation,
    /// Training data that cannot be used as is
    Data,
    /// Store or runtime failure
    Io,
}

#[derive(Debug, Error)]
pub enum NetError {
    #[error("{0} is not a valid net type")]
    UnknownNetKind(String),

    #[error("{0} is not a supported activation function")]
    UnknownActivation(String),

    #[error("incorrectly formatted net ID ({0})")]
    MalformedId(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("the param {0} never changes in the training set, normalization won't work")]
    DegenerateLabel(String),

    #[error("not enough points to train, need at least {required} got {available}")]
    InsufficientPoints { required: usize, available: usize },

    #[error("number of inputs must match the number of neurons in the first layer, expected {expected} got {got}")]
    InputCountMismatch { expected: usize, got: usize },

    #[error("no value for {0} in the given point")]
    MissingValue(String),

    #[error("malformed point: {0}")]
    MalformedPoint(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("training queue is closed")]
    QueueClosed,

    #[error("training worker failed: {0}")]
    Worker(String),
}

impl NetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::UnknownNetKind(_)
            | NetError::UnknownActivation(_)
            | NetError::MalformedId(_)
            | NetError::InvalidTopology(_)
            | NetError::Config(_) => ErrorKind::Validation,
            NetError::DegenerateLabel(_)
            | NetError::InsufficientPoints { .. }
            | NetError::InputCountMismatch { .. }
            | NetError::MissingValue(_)
            | NetError::MalformedPoint(_) => ErrorKind::Data,
            NetError::Io(_)
            | NetError::Serialization(_)
            | NetError::Store(_)
            | NetError::QueueClosed
            | NetError::Worker(_) => ErrorKind::Io,
        }
    }
}
