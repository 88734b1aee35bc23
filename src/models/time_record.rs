use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RowVersion;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct TimeRecord {
    pub id: i64,
    pub person_id: i64,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub row_version: RowVersion,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
}

impl TimeRecord {
    /// Half-open containment: `start <= instant < end`, where an open record
    /// extends forever.
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start_date_time <= instant && self.end_date_time.is_none_or(|end| instant < end)
    }

    /// True when this record starts inside `[from, until)`; `None` is unbounded.
    pub fn starts_within(&self, from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> bool {
        from <= self.start_date_time && until.is_none_or(|until| self.start_date_time < until)
    }

    /// True when the two `[start, end)` intervals share any instant.
    pub fn overlaps(&self, other: &TimeRecord) -> bool {
        self.covers(other.start_date_time)
            || self.starts_within(other.start_date_time, other.end_date_time)
    }
}

#[derive(Debug, Clone)]
pub struct NewTimeRecord {
    pub person_id: i64,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatingTimeRecord {
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UpdatingTimeRecord {
    pub id: i64,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub row_version: RowVersion,
}

#[derive(Debug, Clone, Copy)]
pub struct DeletingTimeRecord {
    pub id: i64,
    pub row_version: RowVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeRecordReading {
    pub id: i64,
    pub person_id: i64,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub row_version: RowVersion,
}

impl From<TimeRecord> for TimeRecordReading {
    fn from(record: TimeRecord) -> Self {
        Self {
            id: record.id,
            person_id: record.person_id,
            start_date_time: record.start_date_time,
            end_date_time: record.end_date_time,
            row_version: record.row_version,
        }
    }
}
