use std::path::PathBuf;

/// The four error kinds the pipeline can fail with. Every fatal error is one
/// of these; nothing is retried and a fatal error aborts the whole pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {message}")]
    InputValidation { message: String },

    #[error("invariant violation (this is a bug): {message}")]
    InvariantViolation { message: String },

    #[error("external tool failed: {command}\n--- stderr (tail) ---\n{stderr_tail}")]
    ExternalTool { command: String, stderr_tail: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn input_validation(message: impl Into<String>) -> Self {
        Self::InputValidation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
