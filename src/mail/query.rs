use chrono::{Days, NaiveDate};
use std::fmt;

/// A one-day mailbox search window with an optional sender filter.
///
/// Renders in Gmail search syntax:
/// `after:2026/02/11 before:2026/02/12 from:a@b.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    start: NaiveDate,
    sender: Option<String>,
}

impl Query {
    /// Builds the query for `start`. A blank sender means no filter.
    pub fn for_day(start: NaiveDate, sender: Option<&str>) -> Self {
        let sender = sender
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self { start, sender }
    }

    /// Day after the window (exclusive).
    pub fn end(&self) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "after:{} before:{}",
            self.start.format("%Y/%m/%d"),
            self.end().format("%Y/%m/%d")
        )?;
        if let Some(sender) = &self.sender {
            write!(f, " from:{sender}")?;
        }
        Ok(())
    }
}
