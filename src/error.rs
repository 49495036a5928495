use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoldError {
    #[error("payload of {len} bytes exceeds MTU budget ({mtu})")]
    MessageTooLarge { len: usize, mtu: usize },

    #[error("stream '{0}' already exists")]
    StreamAlreadyExists(String),

    #[error("stream '{0}' not found")]
    StreamNotFound(String),

    #[error("malformed recovery request ({0})")]
    MalformedRequest(&'static str),

    #[error("recovery log I/O error: {0}")]
    LogIoError(#[from] std::io::Error),

    #[error("sequence {seq} outside recorded range [1, {last_written}]")]
    NotFound { seq: u64, last_written: u64 },

    #[error("send failed (transient): {0}")]
    SendTransient(String),

    #[error("requested range entirely beyond last transmitted sequence")]
    OutOfRange,

    #[error("submitted sequence {submitted} does not match expected next sequence {expected}")]
    SequenceMismatch { submitted: u64, expected: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MoldError>;
