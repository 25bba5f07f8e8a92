/// Reasons a raw job record cannot be turned into a dispatchable [`Job`].
///
/// The `Display` text of each variant is what ends up in `result.error`
/// when the engine fails the record, so keep it short and stable.
///
/// [`Job`]: crate::job::Job
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("record is not an object")]
    NotAnObject,

    #[error("record has no usable id")]
    MissingId,

    #[error("missing job type")]
    MissingJobType,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unknown status '{0}'")]
    UnknownStatus(String),

    #[error("invalid timestamp in '{field}': {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}
