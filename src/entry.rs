use std::path::PathBuf;

use chrono::{Duration, NaiveDate, NaiveTime};

use crate::error::Error;

/// Minutes a rate-limited show's publish time is pushed back before resubmission.
pub const RESCHEDULE_MINUTES: i64 = 2;

pub fn parse_date(s: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| Error::InvalidDate(s.to_owned()))
}

pub fn parse_time(s: &str) -> Result<NaiveTime, Error> {
    NaiveTime::parse_from_str(s, "%H:%M:%S").map_err(|_| Error::InvalidTime(s.to_owned()))
}

/// Metadata shared by every show of a batch.
#[derive(Clone, Debug)]
pub struct Schedule {
    pub airdate: String,
    pub publish_date: NaiveDate,
    pub publish_time: NaiveTime,
}

/// One pending upload.
///
/// Entries are never modified once queued: a rate-limited entry is replaced by
/// the one returned from [`RequestEntry::rescheduled`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestEntry {
    pub artist: String,
    pub airdate: String,
    pub root: PathBuf,
    pub publish_date: NaiveDate,
    pub publish_time: NaiveTime,
    pub attempt: u32,
}

impl RequestEntry {
    pub fn new(artist: impl Into<String>, root: impl Into<PathBuf>, schedule: &Schedule) -> Self {
        RequestEntry {
            artist: artist.into(),
            airdate: schedule.airdate.clone(),
            root: root.into(),
            publish_date: schedule.publish_date,
            publish_time: schedule.publish_time,
            attempt: 1,
        }
    }

    /// The show folder, `root/artist`.
    pub fn folder(&self) -> PathBuf {
        self.root.join(&self.artist)
    }

    /// `{date}T{time}Z`, the literal format the upload API expects.
    pub fn publish_timestamp(&self) -> String {
        format!(
            "{}T{}Z",
            self.publish_date.format("%Y-%m-%d"),
            self.publish_time.format("%H:%M:%S")
        )
    }

    /// Same show, published `offset` later. Crossing midnight rolls the date too.
    pub fn rescheduled(&self, offset: Duration) -> Self {
        let publish_at = self.publish_date.and_time(self.publish_time) + offset;
        RequestEntry {
            publish_date: publish_at.date(),
            publish_time: publish_at.time(),
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: &str, time: &str) -> RequestEntry {
        let schedule = Schedule {
            airdate: "5th August 2021".to_owned(),
            publish_date: parse_date(date).unwrap(),
            publish_time: parse_time(time).unwrap(),
        };
        RequestEntry::new("DJ Elephant", "/shows/SHOW 2", &schedule)
    }

    fn offset() -> Duration {
        Duration::minutes(RESCHEDULE_MINUTES)
    }

    #[test]
    fn timestamp_is_literal_concatenation() {
        assert_eq!(
            entry("2021-08-23", "00:00:00").publish_timestamp(),
            "2021-08-23T00:00:00Z"
        );
    }

    #[test]
    fn reschedule_advances_two_minutes() {
        let first = entry("2021-08-23", "10:30:15");
        let next = first.rescheduled(offset());
        assert_eq!(next.publish_time, parse_time("10:32:15").unwrap());
        assert_eq!(next.publish_date, first.publish_date);
        assert_eq!(next.attempt, 2);
        assert_eq!(next.artist, first.artist);
        assert_eq!(next.root, first.root);
        // rescheduling leaves the queued entry alone
        assert_eq!(first.attempt, 1);
    }

    #[test]
    fn reschedule_wraps_past_midnight() {
        let next = entry("2021-08-23", "23:59:00").rescheduled(offset());
        assert_eq!(next.publish_time.format("%H:%M:%S").to_string(), "00:01:00");
        assert_eq!(next.publish_timestamp(), "2021-08-24T00:01:00Z");
    }

    #[test]
    fn reschedule_wraps_past_hour() {
        let next = entry("2021-08-23", "13:59:30").rescheduled(offset());
        assert_eq!(next.publish_timestamp(), "2021-08-23T14:01:30Z");
    }

    #[test]
    fn folder_joins_root_and_artist() {
        assert_eq!(
            entry("2021-08-23", "00:00:00").folder(),
            PathBuf::from("/shows/SHOW 2/DJ Elephant")
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(parse_date("23/08/2021"), Err(Error::InvalidDate(_))));
        assert!(matches!(parse_date("2021-02-30"), Err(Error::InvalidDate(_))));
        assert!(matches!(parse_time("25:00:00"), Err(Error::InvalidTime(_))));
        assert!(matches!(parse_time("12:00"), Err(Error::InvalidTime(_))));
    }
}
