/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All persisted timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Local wall-clock timestamps, used where calendar-day accounting matters.
pub type LocalTimestamp = chrono::DateTime<chrono::Local>;
