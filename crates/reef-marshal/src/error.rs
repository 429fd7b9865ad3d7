//! Error types for field marshalling.

/// Errors that can occur while encoding or decoding a single field.
///
/// These never abort a whole record conversion in the lenient entry points:
/// the failing field is logged and left out.
#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    /// The raw value could not be converted to the target type.
    #[error("cannot convert {value:?} to {target}: {reason}")]
    Invalid {
        /// Name of the target type.
        target: &'static str,
        /// The raw field value.
        value: String,
        /// Why the conversion failed.
        reason: String,
    },

    /// The raw value does not name a variant of the target enum.
    #[error("{value:?} is not a variant of {target}")]
    UnknownVariant {
        /// Name of the target enum.
        target: &'static str,
        /// The raw field value.
        value: String,
    },

    /// The field has no write accessor.
    #[error("field `{0}` is read-only")]
    NotWritable(&'static str),

    /// JSON encoding of an array field failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MarshalError {
    pub(crate) fn invalid(target: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            target,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
