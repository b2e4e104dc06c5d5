use thiserror::Error;

/// Error taxonomy of the pipeline.
///
/// Storage and schema failures are retried internally before they
/// surface here; everything else propagates directly with a kind and a
/// human-readable detail.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bad input; never retried
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Object storage failure that survived the retry budget
    #[error("Storage failure: {message}")]
    Storage { message: String },

    /// Text extraction failed; terminal, requires re-upload
    #[error("Extraction failed: {message}")]
    Extraction { message: String },

    /// AI output stayed malformed through retries and no fallback applied
    #[error("Generated output violated the test case schema: {message}")]
    SchemaViolation { message: String },

    /// Another generation or regeneration run holds the document's run slot
    #[error("Run already in flight: {message}")]
    RunLockConflict { message: String },

    /// Optimistic status update collision; caller re-reads and retries
    #[error("Status conflict: {message}")]
    Conflict { message: String },

    /// Unsupported export format
    #[error("Export failed: {message}")]
    Export { message: String },
}

/// Kind discriminant for callers that map errors onto a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Extraction,
    SchemaViolation,
    RunLockConflict,
    Conflict,
    Export,
}

impl PipelineError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn extraction<S: Into<String>>(message: S) -> Self {
        Self::Extraction {
            message: message.into(),
        }
    }

    pub fn schema_violation<S: Into<String>>(message: S) -> Self {
        Self::SchemaViolation {
            message: message.into(),
        }
    }

    pub fn run_lock_conflict<S: Into<String>>(message: S) -> Self {
        Self::RunLockConflict {
            message: message.into(),
        }
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn export<S: Into<String>>(message: S) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation { .. } => ErrorKind::Validation,
            PipelineError::Storage { .. } => ErrorKind::Storage,
            PipelineError::Extraction { .. } => ErrorKind::Extraction,
            PipelineError::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            PipelineError::RunLockConflict { .. } => ErrorKind::RunLockConflict,
            PipelineError::Conflict { .. } => ErrorKind::Conflict,
            PipelineError::Export { .. } => ErrorKind::Export,
        }
    }
}

impl From<crate::storage::StorageError> for PipelineError {
    fn from(err: crate::storage::StorageError) -> Self {
        PipelineError::storage(err.to_string())
    }
}

impl From<crate::extractor::ExtractionError> for PipelineError {
    fn from(err: crate::extractor::ExtractionError) -> Self {
        PipelineError::extraction(err.to_string())
    }
}

impl From<crate::audit::AuditStoreError> for PipelineError {
    fn from(err: crate::audit::AuditStoreError) -> Self {
        PipelineError::storage(format!("audit store: {}", err))
    }
}
