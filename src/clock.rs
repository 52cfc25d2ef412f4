use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::warn;

/// Timestamp layout of the readings table
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Timestamp layout used in capture file names
pub const FILENAME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

pub fn format_timestamp(ts: PrimitiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| ts.to_string())
}

pub fn parse_timestamp(s: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(s, TIMESTAMP_FORMAT)
}

/// Source of wall-clock timestamps for captures and readings
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    /// Current time shifted to a fixed UTC offset
    Offset(UtcOffset),
    /// Always the same instant
    Fixed(PrimitiveDateTime),
}

impl Clock {
    /// Clock in the local time zone.
    ///
    /// The offset is looked up once; call this before any threads are
    /// spawned, otherwise the lookup may be refused and UTC is used instead.
    pub fn local() -> Self {
        match UtcOffset::current_local_offset() {
            Ok(offset) => Clock::Offset(offset),
            Err(e) => {
                warn!("Could not determine local time offset ({}), using UTC", e);
                Clock::Offset(UtcOffset::UTC)
            }
        }
    }

    pub fn utc() -> Self {
        Clock::Offset(UtcOffset::UTC)
    }

    /// Current wall-clock time, truncated to whole seconds
    pub fn now(&self) -> PrimitiveDateTime {
        match self {
            Clock::Offset(offset) => {
                let now = OffsetDateTime::now_utc().to_offset(*offset);
                let t = now.time();
                PrimitiveDateTime::new(now.date(), t.replace_nanosecond(0).unwrap_or(t))
            }
            Clock::Fixed(ts) => *ts,
        }
    }

    /// `YYYYMMDD_HHMMSS` for the current time
    pub fn filename_stamp(&self) -> String {
        let now = self.now();
        now.format(FILENAME_FORMAT)
            .unwrap_or_else(|_| now.to_string())
    }
}
