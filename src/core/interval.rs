use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Local, TimeDelta};

#[derive(Copy, Clone, Eq, PartialEq)]
#[must_use]
pub struct Interval {
    /// Inclusive.
    pub start: DateTime<Local>,

    /// Exclusive.
    pub end: DateTime<Local>,
}

impl Debug for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl Interval {
    pub const fn new(start: DateTime<Local>, end: DateTime<Local>) -> Self {
        Self { start, end }
    }

    /// One pricing hour starting at `start`.
    pub fn hour(start: DateTime<Local>) -> Self {
        Self::new(start, start + TimeDelta::hours(1))
    }

    pub const fn with_end(mut self, end: DateTime<Local>) -> Self {
        self.end = end;
        self
    }

    #[must_use]
    pub fn duration(self) -> TimeDelta {
        self.end - self.start
    }

    #[must_use]
    pub fn contains(self, other: DateTime<Local>) -> bool {
        (self.start <= other) && (other < self.end)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_hour_contains() {
        let start = Local.with_ymd_and_hms(2025, 10, 11, 12, 0, 0).unwrap();
        let interval = Interval::hour(start);
        assert_eq!(interval.duration(), TimeDelta::hours(1));
        assert!(interval.contains(start));
        assert!(interval.contains(start + TimeDelta::minutes(59)));
        assert!(!interval.contains(start + TimeDelta::hours(1)));
        assert!(!interval.contains(start - TimeDelta::seconds(1)));
    }
}
