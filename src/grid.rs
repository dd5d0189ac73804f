use chrono::NaiveTime;
use sha2::{Digest, Sha256};

use crate::model::{hhmm, Day, GridCoordinate, ScheduleEntry, ScheduleSnapshot, TimeBlock};

/// Presentation tokens handed to the renderer. The mapping from subject to
/// token is pure and stable across runs, so a subject keeps its color no
/// matter which screen draws it.
pub const PALETTE: [&str; 8] = [
    "indigo", "emerald", "amber", "rose", "sky", "violet", "teal", "orange",
];

pub fn color_for(subject_name: &str) -> &'static str {
    let digest = Sha256::digest(subject_name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let n = u64::from_be_bytes(prefix);
    PALETTE[(n % PALETTE.len() as u64) as usize]
}

/// The entry occupying `(day, start)`, if any. At most one match can exist
/// given the snapshot's cell-uniqueness invariant.
pub fn entry_at(snapshot: &ScheduleSnapshot, day: Day, start: NaiveTime) -> Option<&ScheduleEntry> {
    snapshot
        .entries()
        .iter()
        .find(|e| e.day == day && e.start == start)
}

/// Grid cell an entry renders into, or `None` when its start time matches
/// no configured block (the renderer drops such entries rather than
/// inventing a row for them).
pub fn coordinate_of(blocks: &[TimeBlock], entry: &ScheduleEntry) -> Option<GridCoordinate> {
    blocks
        .iter()
        .position(|b| !b.is_break && b.start == entry.start)
        .map(|block_index| GridCoordinate {
            day: entry.day,
            block_index,
        })
}

#[derive(Debug, thiserror::Error)]
pub enum BlockConfigError {
    #[error("block table is empty")]
    Empty,
    #[error("block {label:?}: start {start} is not before end {end}")]
    InvertedTimes {
        label: String,
        start: String,
        end: String,
    },
    #[error("block {label:?} starts at {start}, before the previous block ends at {prev_end}")]
    Overlap {
        label: String,
        start: String,
        prev_end: String,
    },
}

/// Validate a replacement block table: non-empty, each row well-formed,
/// rows strictly ascending and non-overlapping.
pub fn validate_blocks(blocks: &[TimeBlock]) -> Result<(), BlockConfigError> {
    if blocks.is_empty() {
        return Err(BlockConfigError::Empty);
    }
    for b in blocks {
        if b.start >= b.end {
            return Err(BlockConfigError::InvertedTimes {
                label: b.label.clone(),
                start: hhmm(b.start),
                end: hhmm(b.end),
            });
        }
    }
    for pair in blocks.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(BlockConfigError::Overlap {
                label: pair[1].label.clone(),
                start: hhmm(pair[1].start),
                prev_end: hhmm(pair[0].end),
            });
        }
    }
    Ok(())
}

fn block(label: &str, start: (u32, u32), end: (u32, u32), is_break: bool) -> TimeBlock {
    TimeBlock {
        label: label.to_string(),
        start: NaiveTime::from_hms_opt(start.0, start.1, 0).expect("static block table"),
        end: NaiveTime::from_hms_opt(end.0, end.1, 0).expect("static block table"),
        is_break,
    }
}

/// Block table installed at startup; `blocks.set` replaces it.
pub fn default_blocks() -> Vec<TimeBlock> {
    vec![
        block("1st period", (7, 0), (7, 45), false),
        block("2nd period", (7, 45), (8, 30), false),
        block("3rd period", (8, 30), (9, 15), false),
        block("Recess", (9, 15), (9, 45), true),
        block("4th period", (9, 45), (10, 30), false),
        block("5th period", (10, 30), (11, 15), false),
        block("6th period", (11, 15), (12, 0), false),
        block("Lunch", (12, 0), (12, 45), true),
        block("7th period", (12, 45), (13, 30), false),
        block("8th period", (13, 30), (14, 15), false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubjectRef;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("time")
    }

    fn entry(id: &str, subject: &str, day: Day, start: NaiveTime, end: NaiveTime) -> ScheduleEntry {
        ScheduleEntry {
            id: id.to_string(),
            subject: SubjectRef {
                id: format!("subj-{id}"),
                name: subject.to_string(),
            },
            section_id: "sec-1".to_string(),
            day,
            start,
            end,
        }
    }

    #[test]
    fn color_is_stable_and_in_palette() {
        let first = color_for("Mathematics");
        assert_eq!(color_for("Mathematics"), first);
        assert!(PALETTE.contains(&first));
        // Distinct names are allowed to collide, but the function must not
        // depend on call order.
        let art = color_for("Art");
        assert_eq!(color_for("Art"), art);
        assert_eq!(color_for("Mathematics"), first);
    }

    #[test]
    fn entry_at_matches_exact_cell_only() {
        let snap = ScheduleSnapshot::new(vec![
            entry("1", "Math", Day::Monday, t(7, 0), t(7, 45)),
            entry("2", "Art", Day::Tuesday, t(7, 45), t(8, 30)),
        ])
        .expect("snapshot");

        assert_eq!(entry_at(&snap, Day::Monday, t(7, 0)).map(|e| e.id.as_str()), Some("1"));
        assert!(entry_at(&snap, Day::Monday, t(7, 45)).is_none());
        assert!(entry_at(&snap, Day::Tuesday, t(7, 0)).is_none());
    }

    #[test]
    fn coordinate_skips_break_rows() {
        let blocks = default_blocks();
        // 09:15 is the recess row; an entry starting there renders nowhere.
        let stray = entry("x", "Math", Day::Monday, t(9, 15), t(9, 45));
        assert!(coordinate_of(&blocks, &stray).is_none());

        let placed = entry("y", "Math", Day::Wednesday, t(9, 45), t(10, 30));
        let coord = coordinate_of(&blocks, &placed).expect("coordinate");
        assert_eq!(coord.block_index, 4);
        assert_eq!(coord.day, Day::Wednesday);
    }

    #[test]
    fn default_block_table_is_valid() {
        validate_blocks(&default_blocks()).expect("default table");
    }

    #[test]
    fn validate_blocks_rejects_overlap_and_inversion() {
        let mut blocks = vec![
            TimeBlock {
                label: "a".into(),
                start: t(7, 0),
                end: t(8, 0),
                is_break: false,
            },
            TimeBlock {
                label: "b".into(),
                start: t(7, 30),
                end: t(8, 30),
                is_break: false,
            },
        ];
        assert!(matches!(
            validate_blocks(&blocks),
            Err(BlockConfigError::Overlap { .. })
        ));

        blocks[1].start = t(9, 0);
        blocks[1].end = t(8, 30);
        assert!(matches!(
            validate_blocks(&blocks),
            Err(BlockConfigError::InvertedTimes { .. })
        ));

        assert!(matches!(validate_blocks(&[]), Err(BlockConfigError::Empty)));
    }
}
