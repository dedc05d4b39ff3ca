//! Error types for the cquery output pipeline.

/// Errors raised while resolving, aggregating or encoding query output.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// More than one `select()` branch matched the active configuration
    #[error(
        "Illegal ambiguous match on configurable attribute \"{attribute}\" in {rule}: {}",
        conditions.join(", ")
    )]
    ConfigurationAmbiguity {
        /// Label of the rule declaring the attribute
        rule: String,
        /// Attribute name
        attribute: String,
        /// Condition labels that matched
        conditions: Vec<String>,
    },

    /// `append` or `finalize` was called after the result set was finalized
    #[error("Result aggregation is closed; no further records may be appended")]
    AggregationClosed,

    /// `append` was called before `start`
    #[error("Result aggregation has not been started")]
    AggregationNotStarted,

    /// `start` was called more than once
    #[error("Result aggregation was already started")]
    AggregationAlreadyStarted,

    /// The requested output format is not recognized
    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    /// The rule does not declare the requested attribute
    #[error("Rule {rule} does not declare attribute \"{attribute}\"")]
    UnknownAttribute {
        /// Label of the rule
        rule: String,
        /// Attribute name
        attribute: String,
    },

    /// A resolved value does not fit the attribute's declared type
    #[error("Attribute \"{attribute}\" expects a {expected} value")]
    AttributeTypeMismatch {
        /// Attribute name
        attribute: String,
        /// Declared attribute type
        expected: String,
    },

    /// A rule target arrived without its rule definition
    #[error("Rule target {0} has no rule definition")]
    MissingRuleDefinition(String),

    /// Writing to the output sink failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protobuf encoding failed
    #[error("Protobuf encoding error: {0}")]
    ProtoEncode(#[from] prost::EncodeError),
}

/// Result type for output pipeline operations.
pub type OutputResult<T> = Result<T, OutputError>;
