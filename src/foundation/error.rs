/// Convenience result type used across the converter.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Top-level error taxonomy for show-file conversion.
///
/// Every variant is fatal for the conversion that produced it.
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    /// Malformed show-file content.
    #[error("parse error at line {line}: {msg}")]
    Parse {
        /// 1-based line number in the show file.
        line: u64,
        /// What was wrong with the line.
        msg: String,
    },

    /// Observed universe count disagrees with the configured count.
    #[error("cardinality error: {0}")]
    Cardinality(String),

    /// Backend, output or encoder lifecycle failure.
    #[error("resource error: {0}")]
    Resource(String),

    /// Malformed or unsupported video input when reading frames back.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid user-provided options.
    #[error("validation error: {0}")]
    Validation(String),

    /// The input stream failed for a reason other than clean end-of-input.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConvertError {
    /// Build a [`ConvertError::Parse`] value.
    pub fn parse(line: u64, msg: impl Into<String>) -> Self {
        Self::Parse {
            line,
            msg: msg.into(),
        }
    }

    /// Build a [`ConvertError::Cardinality`] value.
    pub fn cardinality(msg: impl Into<String>) -> Self {
        Self::Cardinality(msg.into())
    }

    /// Build a [`ConvertError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`ConvertError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`ConvertError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
