/// Job identifiers are opaque strings (UUIDs in practice, but never parsed).
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
