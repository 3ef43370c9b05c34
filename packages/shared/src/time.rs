//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock from a Unix timestamp in milliseconds
    ///
    /// Out-of-range timestamps fall back to the Unix epoch.
    pub fn from_millis(timestamp_millis: i64) -> Self {
        Self {
            fixed_time: Utc
                .timestamp_millis_opt(timestamp_millis)
                .single()
                .unwrap_or_default(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_time
    }
}

/// Format an instant as wall-clock time (`HH:MM:SS`) in the local timezone
pub fn format_local_time(instant: DateTime<Utc>) -> String {
    format_time_at_offset(instant, *instant.with_timezone(&Local).offset())
}

/// Format an instant as wall-clock time (`HH:MM:SS`) at a fixed UTC offset
pub fn format_time_at_offset(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant.with_timezone(&offset).format("%H:%M:%S").to_string()
}
