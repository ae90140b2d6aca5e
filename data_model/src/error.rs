/// Error taxonomy shared by both store clients.
///
/// Every operation either returns a well-formed result or fails with one of
/// these kinds. No variant is produced by local recovery or hidden retries:
/// transport failures are surfaced unchanged to the caller.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Malformed caller input, detected locally before any network call.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The archival store rejected the client-computed checksum at ingest.
    /// Not retryable without re-uploading the content.
    #[error("archive store rejected checksum {checksum}: {message}")]
    IntegrityFailure { checksum: String, message: String },

    /// Network or service level failure from either store, opaque to this
    /// layer.
    #[error(transparent)]
    Transport {
        #[from]
        source: anyhow::Error,
    },

    /// The operation is not valid for the item's current workflow state, or
    /// the job/archive id is unknown to the store.
    #[error("invalid state transition: {message}")]
    InvalidStateTransition { message: String },
}

impl StorageError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn integrity_failure(checksum: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IntegrityFailure {
            checksum: checksum.into(),
            message: message.into(),
        }
    }

    pub fn transport(source: impl Into<anyhow::Error>) -> Self {
        Self::Transport {
            source: source.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            message: message.into(),
        }
    }

    /// Identifies failed operations that can be retried as-is.
    ///
    /// Only transport failures qualify; retry policy itself belongs to the
    /// caller, not this layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Identifies failed operations that MUST not be retried without
    /// changing the request.
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(StorageError::transport(anyhow::anyhow!("connection reset")).is_retryable());
        assert!(StorageError::invalid_argument("empty name").is_permanent());
        assert!(StorageError::integrity_failure("abc123", "mismatch").is_permanent());
        assert!(StorageError::invalid_state("not fetchable").is_permanent());
    }
}
