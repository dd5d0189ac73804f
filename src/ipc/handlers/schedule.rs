use serde_json::json;
use tracing::{debug, info, warn};

use crate::grid::{color_for, coordinate_of, entry_at};
use crate::ipc::error::{err, gateway_code, ok};
use crate::ipc::types::{AppState, Request, ScreenState};
use crate::model::{hhmm, DAYS};
use crate::session::EditSession;

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.edit_active() {
        return err(
            &req.id,
            "edit_in_progress",
            "finish or cancel the edit session before switching sections",
            None,
        );
    }
    let Some(gateway) = state.gateway.as_deref() else {
        return err(&req.id, "no_backend", "connect a backend first", None);
    };
    let Some(section_id) = req.params.get("sectionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing sectionId", None);
    };

    // On failure the previous screen stays usable; the shell shows the
    // error over whatever section was already loaded.
    let canonical = match gateway.list_by_section(section_id) {
        Ok(snapshot) => snapshot,
        Err(e) => return err(&req.id, gateway_code(&e), e.to_string(), None),
    };

    if canonical.is_empty() {
        debug!(section = section_id, "section has no schedule yet");
    }
    let stray = canonical
        .entries()
        .iter()
        .filter(|e| coordinate_of(&state.blocks, e).is_none())
        .count();
    if stray > 0 {
        // These entries exist server-side but match no row of the current
        // block table, so the grid will not show them.
        warn!(section = section_id, stray, "entries match no configured block");
    }

    info!(section = section_id, entries = canonical.len(), "section opened");
    let entries = canonical.len();
    state.screen = Some(ScreenState {
        section_id: section_id.to_string(),
        canonical,
        session: EditSession::new(),
    });
    ok(&req.id, json!({ "sectionId": section_id, "entries": entries }))
}

fn handle_grid(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(screen) = state.screen.as_ref() else {
        return err(&req.id, "no_section", "open a section first", None);
    };

    // While an edit session is open the grid reflects the working copy;
    // otherwise the canonical snapshot.
    let snapshot = screen.session.working().unwrap_or(&screen.canonical);

    let rows: Vec<serde_json::Value> = state
        .blocks
        .iter()
        .map(|block| {
            let cells: serde_json::Value = if block.is_break {
                serde_json::Value::Null
            } else {
                let mut row = vec![serde_json::Value::Null; DAYS.len()];
                for day in DAYS {
                    if let Some(e) = entry_at(snapshot, day, block.start) {
                        row[day.column()] = json!({
                            "entryId": e.id,
                            "subject": e.subject.name,
                            "color": color_for(&e.subject.name),
                            "endTime": hhmm(e.end),
                        });
                    }
                }
                row.into()
            };
            json!({
                "label": block.label,
                "startTime": hhmm(block.start),
                "endTime": hhmm(block.end),
                "isBreak": block.is_break,
                "cells": cells,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "sectionId": screen.section_id,
            "days": DAYS.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
            "editing": !screen.session.is_viewing(),
            "rows": rows,
        }),
    )
}

fn handle_generate_default(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.edit_active() {
        return err(
            &req.id,
            "edit_in_progress",
            "finish or cancel the edit session before regenerating",
            None,
        );
    }
    let Some(gateway) = state.gateway.as_deref() else {
        return err(&req.id, "no_backend", "connect a backend first", None);
    };
    let Some(screen) = state.screen.as_mut() else {
        return err(&req.id, "no_section", "open a section first", None);
    };

    let canonical = match gateway.generate_default(&screen.section_id) {
        Ok(snapshot) => snapshot,
        Err(e) => return err(&req.id, gateway_code(&e), e.to_string(), None),
    };

    info!(
        section = %screen.section_id,
        entries = canonical.len(),
        "default schedule generated"
    );
    let entries = canonical.len();
    screen.canonical = canonical;
    ok(&req.id, json!({ "entries": entries }))
}

fn handle_delete_entry(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.edit_active() {
        return err(
            &req.id,
            "edit_in_progress",
            "finish or cancel the edit session before deleting",
            None,
        );
    }
    let Some(gateway) = state.gateway.as_deref() else {
        return err(&req.id, "no_backend", "connect a backend first", None);
    };
    let Some(screen) = state.screen.as_mut() else {
        return err(&req.id, "no_section", "open a section first", None);
    };
    let Some(entry_id) = req.params.get("entryId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing entryId", None);
    };

    if let Err(e) = gateway.delete_entry(entry_id) {
        return err(&req.id, gateway_code(&e), e.to_string(), None);
    }

    // Deletion happened server-side; the screen only becomes consistent
    // again once the section is re-fetched.
    let canonical = match gateway.list_by_section(&screen.section_id) {
        Ok(snapshot) => snapshot,
        Err(e) => return err(&req.id, gateway_code(&e), e.to_string(), None),
    };

    info!(entry = entry_id, "entry deleted");
    let entries = canonical.len();
    screen.canonical = canonical;
    ok(&req.id, json!({ "entries": entries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.open" => Some(handle_open(state, req)),
        "schedule.grid" => Some(handle_grid(state, req)),
        "schedule.generateDefault" => Some(handle_generate_default(state, req)),
        "schedule.deleteEntry" => Some(handle_delete_entry(state, req)),
        _ => None,
    }
}
