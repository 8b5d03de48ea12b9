use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::error::{AttendanceError, AttendanceResult};

/// Maps instants to the session day used as part of the ledger key.
///
/// The day is taken in one fixed reference timezone, so a session started and
/// redeemed on the same local day always agree on the key regardless of the
/// caller's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCalendar {
    offset: FixedOffset,
}

impl Default for SessionCalendar {
    fn default() -> Self {
        Self { offset: Utc.fix() }
    }
}

impl SessionCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_offset_minutes(minutes: i32) -> AttendanceResult<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
            .ok_or_else(|| AttendanceError::Config(format!("UTC offset out of range: {minutes} minutes")))
    }

    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}
