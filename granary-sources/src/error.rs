use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourcesError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed sources line {line}: '{content}'")]
    Malformed { line: usize, content: String },

    #[error("invalid checksum on sources line {line}: {source}")]
    BadChecksum {
        line: usize,
        #[source]
        source: granary_utils_hash::InvalidDigestError,
    },
}

/// Helper trait for adding context to IO errors
pub trait IoErrorContext<T> {
    fn io_context(self, context: impl Into<String>) -> Result<T, SourcesError>;
}

impl<T> IoErrorContext<T> for std::io::Result<T> {
    fn io_context(self, context: impl Into<String>) -> Result<T, SourcesError> {
        self.map_err(|e| SourcesError::Io {
            context: context.into(),
            source: e,
        })
    }
}
