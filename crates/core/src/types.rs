/// Job identifiers are caller-supplied strings (normally the event name).
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Owner recorded when a submission or callback does not name one.
pub const PUBLIC_OWNER_ID: &str = "public";
