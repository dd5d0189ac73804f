use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// School days covered by the weekly grid. Ordinal doubles as the grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

pub const DAYS: [Day; 5] = [
    Day::Monday,
    Day::Tuesday,
    Day::Wednesday,
    Day::Thursday,
    Day::Friday,
];

impl Day {
    pub fn column(self) -> usize {
        match self {
            Day::Monday => 0,
            Day::Tuesday => 1,
            Day::Wednesday => 2,
            Day::Thursday => 3,
            Day::Friday => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Day {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monday" => Ok(Day::Monday),
            "tuesday" => Ok(Day::Tuesday),
            "wednesday" => Ok(Day::Wednesday),
            "thursday" => Ok(Day::Thursday),
            "friday" => Ok(Day::Friday),
            _ => Err(ModelError::BadDay(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unrecognized day: {0}")]
    BadDay(String),
    #[error("unrecognized time: {0}")]
    BadTime(String),
    #[error("entry {id}: start {start} is not before end {end}")]
    InvertedTimes { id: String, start: String, end: String },
    #[error("entries {a} and {b} both occupy {day} {start}")]
    CellCollision {
        a: String,
        b: String,
        day: Day,
        start: String,
    },
}

/// Parse a wall-clock time at minute precision.
///
/// Backends disagree about time shape: plain "07:00", seconds-bearing
/// "07:00:00", fractional "07:00:00.000", and offset-suffixed variants all
/// denote the same grid row. Trailing Z/offsets are stripped rather than
/// applied; the grid works in wall-clock minutes.
pub fn parse_wall_minute(raw: &str) -> Result<NaiveTime, ModelError> {
    let s = raw.trim();
    let s = s.strip_suffix('Z').unwrap_or(s);
    let s = match s.rfind(['+', '-']) {
        Some(pos) if pos >= 5 => &s[..pos],
        _ => s,
    };

    for fmt in ["%H:%M", "%H:%M:%S", "%H:%M:%S%.f"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return NaiveTime::from_hms_opt(t.hour(), t.minute(), 0)
                .ok_or_else(|| ModelError::BadTime(raw.to_string()));
        }
    }
    Err(ModelError::BadTime(raw.to_string()))
}

pub fn hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Serde helper keeping wire times in the normalized "HH:MM" form.
pub mod hhmm_serde {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&super::hhmm(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(de)?;
        super::parse_wall_minute(&raw).map_err(de::Error::custom)
    }
}

/// Subject as referenced by a schedule entry. The display name drives the
/// deterministic color assignment, so it travels with the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    pub id: String,
    pub name: String,
}

/// One subject-block placement in a section's weekly schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: String,
    pub subject: SubjectRef,
    pub section_id: String,
    pub day: Day,
    #[serde(with = "hhmm_serde", rename = "startTime")]
    pub start: NaiveTime,
    #[serde(with = "hhmm_serde", rename = "endTime")]
    pub end: NaiveTime,
}

impl ScheduleEntry {
    /// Re-assert per-entry invariants after deserialization. Times arrive
    /// already minute-normalized via the serde helper.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.start >= self.end {
            return Err(ModelError::InvertedTimes {
                id: self.id.clone(),
                start: hhmm(self.start),
                end: hhmm(self.end),
            });
        }
        Ok(())
    }
}

/// A fixed row of the grid. Break rows accept no entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    pub label: String,
    #[serde(with = "hhmm_serde", rename = "startTime")]
    pub start: NaiveTime,
    #[serde(with = "hhmm_serde", rename = "endTime")]
    pub end: NaiveTime,
    #[serde(default)]
    pub is_break: bool,
}

/// Addressable cell of the grid, derived from an entry's day and start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCoordinate {
    pub day: Day,
    pub block_index: usize,
}

/// Ordered collection of one section's entries at one point in time.
///
/// `Clone` yields a fully independent copy; the edit session relies on that
/// for its working copy, so entries hold owned data only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleSnapshot {
    entries: Vec<ScheduleEntry>,
}

impl ScheduleSnapshot {
    /// Validating constructor: refuses inverted times and two entries in
    /// the same cell. Every snapshot in the daemon comes through here, so
    /// the core never holds partially-shaped data.
    pub fn new(entries: Vec<ScheduleEntry>) -> Result<Self, ModelError> {
        for e in &entries {
            e.validate()?;
        }
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if a.day == b.day && a.start == b.start {
                    return Err(ModelError::CellCollision {
                        a: a.id.clone(),
                        b: b.id.clone(),
                        day: a.day,
                        start: hhmm(a.start),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, entry_id: &str) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [ScheduleEntry] {
        &mut self.entries
    }
}
