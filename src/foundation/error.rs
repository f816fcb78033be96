/// Convenience result type used across opflow.
pub type OpflowResult<T> = Result<T, OpflowError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum OpflowError {
    /// Invalid user-provided configuration or declarations.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while building or sampling keyframe tracks.
    #[error("animation error: {0}")]
    Animation(String),

    /// Errors raised while evaluating an operator or node for a frame.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Node graph wiring errors (unknown node or socket, cycles).
    #[error("graph error: {0}")]
    Graph(String),

    /// A value of the wrong runtime type was handed to a typed slot.
    #[error("type mismatch on '{property}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Name of the property or socket that rejected the value.
        property: String,
        /// Declared value type.
        expected: &'static str,
        /// Runtime type that was offered.
        found: &'static str,
    },

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OpflowError {
    /// Build an [`OpflowError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build an [`OpflowError::Animation`] value.
    pub fn animation(msg: impl Into<String>) -> Self {
        Self::Animation(msg.into())
    }

    /// Build an [`OpflowError::Evaluation`] value.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Build an [`OpflowError::Graph`] value.
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    /// Build an [`OpflowError::TypeMismatch`] value.
    pub fn type_mismatch(
        property: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            property: property.into(),
            expected,
            found,
        }
    }

    /// Build an [`OpflowError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for OpflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
