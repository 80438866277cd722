//! Error types for schema loading, document fetching and field extraction.

/// Errors raised while evaluating a single field expression.
///
/// `SelectorNotFound` and `TypeCoercion` are field-level: the materializer
/// absorbs them into defaults for optional fields. Everything else points at a
/// broken schema and always surfaces.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("no match for `{expression}`")]
    SelectorNotFound { expression: String },

    #[error("cannot convert {value:?} to {expected}")]
    TypeCoercion { value: String, expected: String },

    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("unknown variable `${0}`")]
    UnknownVariable(String),

    #[error("unknown transform `{0}`")]
    UnknownTransform(String),

    #[error("invalid arguments to `{transform}`: {reason}")]
    InvalidArgument { transform: String, reason: String },
}

impl EvalError {
    /// Create a TypeCoercion error for a value that failed to convert.
    pub fn coercion(value: impl ToString, expected: impl ToString) -> Self {
        Self::TypeCoercion {
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Whether an optional field may fall back to its default on this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SelectorNotFound { .. } | Self::TypeCoercion { .. }
        )
    }
}

/// Top-level error for every public armory operation.
#[derive(Debug, thiserror::Error)]
pub enum ArmoryError {
    /// No schema is registered for the requested entity type.
    #[error("no schema registered for entity type `{0}`")]
    SchemaNotFound(String),

    /// The schema source is malformed or inconsistent with a record shape.
    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Network or HTTP-level failure.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The response could not be turned into a usable document.
    #[error("failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },

    /// A required field could not be produced.
    #[error("cannot materialize {entity}.{field}: {source}")]
    Materialization {
        entity: String,
        field: String,
        #[source]
        source: EvalError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ArmoryError {
    pub fn schema(message: impl ToString) -> Self {
        Self::Schema(message.to_string())
    }

    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(url: &str, reason: impl ToString) -> Self {
        Self::Parse {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error is a required-field failure.
    pub fn is_materialization(&self) -> bool {
        matches!(self, Self::Materialization { .. })
    }
}
