use chrono::NaiveTime;

use crate::model::{Day, ScheduleEntry, ScheduleSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    /// The dragged entry is not in the working copy. A correctly wired UI
    /// never produces this; the engine reports it instead of panicking.
    #[error("entry not found: {0}")]
    NotFound(String),
}

/// What a move did to the working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Source dropped on its own cell; nothing changed.
    Unchanged,
    /// Target cell was empty; only the source moved.
    Relocated,
    /// Target cell was occupied; the two entries traded places.
    Swapped { displaced_id: String },
}

/// Move `source_entry_id` to `(target_day, target_start..target_end)`,
/// swapping with whatever already occupies that cell.
///
/// The snapshot is mutated in place. Cell uniqueness is preserved: the only
/// entry that can occupy the target cell beforehand is the one being handed
/// the source's old coordinates.
pub fn apply_move(
    snapshot: &mut ScheduleSnapshot,
    source_entry_id: &str,
    target_day: Day,
    target_start: NaiveTime,
    target_end: NaiveTime,
) -> Result<MoveOutcome, MoveError> {
    let entries = snapshot.entries_mut();

    let source_idx = entries
        .iter()
        .position(|e| e.id == source_entry_id)
        .ok_or_else(|| MoveError::NotFound(source_entry_id.to_string()))?;

    if entries[source_idx].day == target_day && entries[source_idx].start == target_start {
        return Ok(MoveOutcome::Unchanged);
    }

    let target_idx = entries
        .iter()
        .position(|e| e.day == target_day && e.start == target_start && e.id != source_entry_id);

    let (old_day, old_start, old_end) = {
        let s = &entries[source_idx];
        (s.day, s.start, s.end)
    };

    {
        let s = &mut entries[source_idx];
        s.day = target_day;
        s.start = target_start;
        s.end = target_end;
    }

    match target_idx {
        Some(t_idx) => {
            let t = &mut entries[t_idx];
            t.day = old_day;
            t.start = old_start;
            t.end = old_end;
            Ok(MoveOutcome::Swapped {
                displaced_id: entries[t_idx].id.clone(),
            })
        }
        None => Ok(MoveOutcome::Relocated),
    }
}

/// Entries in `working` whose placement differs from their canonical
/// counterpart. Save submits exactly these, nothing else.
pub fn changed_entries<'a>(
    canonical: &ScheduleSnapshot,
    working: &'a ScheduleSnapshot,
) -> Vec<&'a ScheduleEntry> {
    working
        .entries()
        .iter()
        .filter(|w| match canonical.find(&w.id) {
            Some(c) => c.day != w.day || c.start != w.start || c.end != w.end,
            // Editing never introduces entries, but an unmatched id is by
            // definition changed.
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubjectRef;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("time")
    }

    fn entry(id: &str, day: Day, start: NaiveTime, end: NaiveTime) -> ScheduleEntry {
        ScheduleEntry {
            id: id.to_string(),
            subject: SubjectRef {
                id: format!("subj-{id}"),
                name: format!("Subject {id}"),
            },
            section_id: "sec-1".to_string(),
            day,
            start,
            end,
        }
    }

    fn two_entry_snapshot() -> ScheduleSnapshot {
        ScheduleSnapshot::new(vec![
            entry("1", Day::Monday, t(7, 0), t(7, 45)),
            entry("2", Day::Tuesday, t(7, 45), t(8, 30)),
        ])
        .expect("snapshot")
    }

    fn assert_unique_cells(snapshot: &ScheduleSnapshot) {
        let entries = snapshot.entries();
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                assert!(
                    a.day != b.day || a.start != b.start,
                    "{} and {} share a cell",
                    a.id,
                    b.id
                );
            }
        }
    }

    #[test]
    fn occupied_target_swaps_both_entries() {
        let mut snap = two_entry_snapshot();
        let outcome = apply_move(&mut snap, "1", Day::Tuesday, t(7, 45), t(8, 30)).expect("move");
        assert_eq!(
            outcome,
            MoveOutcome::Swapped {
                displaced_id: "2".to_string()
            }
        );

        let one = snap.find("1").expect("entry 1");
        assert_eq!((one.day, one.start, one.end), (Day::Tuesday, t(7, 45), t(8, 30)));
        let two = snap.find("2").expect("entry 2");
        assert_eq!((two.day, two.start, two.end), (Day::Monday, t(7, 0), t(7, 45)));
        // Identities stay with their entries.
        assert_eq!(one.subject.name, "Subject 1");
        assert_eq!(two.subject.name, "Subject 2");
        assert_unique_cells(&snap);
    }

    #[test]
    fn empty_target_relocates_source_only() {
        let mut snap = two_entry_snapshot();
        let outcome = apply_move(&mut snap, "1", Day::Wednesday, t(9, 0), t(9, 45)).expect("move");
        assert_eq!(outcome, MoveOutcome::Relocated);

        let one = snap.find("1").expect("entry 1");
        assert_eq!((one.day, one.start, one.end), (Day::Wednesday, t(9, 0), t(9, 45)));
        let two = snap.find("2").expect("entry 2");
        assert_eq!((two.day, two.start), (Day::Tuesday, t(7, 45)));
        assert_unique_cells(&snap);
    }

    #[test]
    fn dropping_on_own_cell_is_a_noop() {
        let mut snap = two_entry_snapshot();
        let before = snap.clone();
        let outcome = apply_move(&mut snap, "1", Day::Monday, t(7, 0), t(7, 45)).expect("move");
        assert_eq!(outcome, MoveOutcome::Unchanged);
        assert_eq!(snap, before);
    }

    #[test]
    fn unknown_source_is_an_error_not_a_panic() {
        let mut snap = two_entry_snapshot();
        let before = snap.clone();
        let err = apply_move(&mut snap, "ghost", Day::Monday, t(7, 0), t(7, 45))
            .expect_err("unknown id");
        assert!(matches!(err, MoveError::NotFound(id) if id == "ghost"));
        assert_eq!(snap, before);
    }

    #[test]
    fn move_sequences_preserve_cell_uniqueness() {
        let mut snap = ScheduleSnapshot::new(vec![
            entry("1", Day::Monday, t(7, 0), t(7, 45)),
            entry("2", Day::Tuesday, t(7, 45), t(8, 30)),
            entry("3", Day::Friday, t(8, 30), t(9, 15)),
        ])
        .expect("snapshot");

        apply_move(&mut snap, "1", Day::Tuesday, t(7, 45), t(8, 30)).expect("swap with 2");
        apply_move(&mut snap, "2", Day::Friday, t(8, 30), t(9, 15)).expect("swap with 3");
        apply_move(&mut snap, "3", Day::Thursday, t(13, 30), t(14, 15)).expect("relocate");
        apply_move(&mut snap, "1", Day::Monday, t(7, 0), t(7, 45)).expect("relocate back");
        assert_unique_cells(&snap);
        assert_eq!(snap.len(), 3);
    }

    #[test]
    fn swap_then_swap_back_restores_original_grid() {
        let mut snap = two_entry_snapshot();
        let before = snap.clone();
        apply_move(&mut snap, "1", Day::Tuesday, t(7, 45), t(8, 30)).expect("swap");
        apply_move(&mut snap, "1", Day::Monday, t(7, 0), t(7, 45)).expect("swap back");
        assert_eq!(snap, before);
    }

    #[test]
    fn changed_entries_reports_only_moved_placements() {
        let canonical = two_entry_snapshot();
        let mut working = canonical.clone();
        apply_move(&mut working, "1", Day::Wednesday, t(9, 0), t(9, 45)).expect("move");

        let changed = changed_entries(&canonical, &working);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, "1");

        let canonical_copy = canonical.clone();
        let untouched = changed_entries(&canonical, &canonical_copy);
        assert!(untouched.is_empty());
    }

    #[test]
    fn changed_entries_counts_both_halves_of_a_swap() {
        let canonical = two_entry_snapshot();
        let mut working = canonical.clone();
        apply_move(&mut working, "1", Day::Tuesday, t(7, 45), t(8, 30)).expect("swap");

        let mut ids: Vec<&str> = changed_entries(&canonical, &working)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, ["1", "2"]);
    }
}
