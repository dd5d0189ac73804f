use serde_json::json;
use tracing::info;

use crate::engine::MoveOutcome;
use crate::gateway::GatewayError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, ScreenState};
use crate::model::Day;
use crate::session::SessionError;

/// `not_editing` when the caller skipped `edit.enter`; everything else is
/// an operation arriving while a session (or its save) is underway.
fn state_code(required: &str, actual: &str) -> &'static str {
    if required == "editing" && actual == "viewing" {
        "not_editing"
    } else {
        "edit_in_progress"
    }
}

fn session_err(id: &str, e: SessionError) -> serde_json::Value {
    match e {
        SessionError::InvalidState { required, actual } => {
            err(id, state_code(required, actual), e.to_string(), None)
        }
        SessionError::EntryNotFound(_) => err(id, "not_found", e.to_string(), None),
        SessionError::SaveFailed {
            attempted,
            failed,
            ref first_cause,
        } => {
            let code = match first_cause {
                GatewayError::Unauthorized => "session_expired",
                _ => "save_failed",
            };
            err(
                id,
                code,
                e.to_string(),
                Some(json!({ "attempted": attempted, "failed": failed })),
            )
        }
        SessionError::LoadFailed(_) => err(id, "load_failed", e.to_string(), None),
    }
}

fn handle_enter(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(screen) = state.screen.as_mut() else {
        return err(&req.id, "no_section", "open a section first", None);
    };
    match screen.session.enter_edit(&screen.canonical) {
        Ok(()) => ok(&req.id, json!({ "editState": "editing" })),
        Err(e) => session_err(&req.id, e),
    }
}

fn handle_move(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(entry_id) = req.params.get("entryId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing entryId", None);
    };
    let Some(day_raw) = req.params.get("day").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing day", None);
    };
    let day: Day = match day_raw.parse() {
        Ok(d) => d,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let Some(block_index) = req
        .params
        .get("blockIndex")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
    else {
        return err(&req.id, "bad_params", "missing blockIndex", None);
    };

    let Some(screen) = state.screen.as_mut() else {
        return err(&req.id, "no_section", "open a section first", None);
    };
    // Target legality is decided here, against the block table the grid was
    // drawn from. The move itself never sees break rows.
    let Some(block) = state.blocks.get(block_index) else {
        return err(
            &req.id,
            "invalid_target",
            format!("no block at index {block_index}"),
            None,
        );
    };
    if block.is_break {
        return err(
            &req.id,
            "invalid_target",
            format!("{:?} is a break row, entries cannot be dropped there", block.label),
            None,
        );
    }

    match screen
        .session
        .move_entry(entry_id, day, block.start, block.end)
    {
        Ok(MoveOutcome::Unchanged) => ok(&req.id, json!({ "outcome": "unchanged" })),
        Ok(MoveOutcome::Relocated) => ok(&req.id, json!({ "outcome": "relocated" })),
        Ok(MoveOutcome::Swapped { displaced_id }) => ok(
            &req.id,
            json!({ "outcome": "swapped", "displacedId": displaced_id }),
        ),
        Err(e) => session_err(&req.id, e),
    }
}

fn handle_cancel(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(screen) = state.screen.as_mut() else {
        return err(&req.id, "no_section", "open a section first", None);
    };
    match screen.session.cancel() {
        Ok(()) => ok(&req.id, json!({ "editState": "viewing" })),
        Err(e) => session_err(&req.id, e),
    }
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(gateway) = state.gateway.as_deref() else {
        return err(&req.id, "no_backend", "connect a backend first", None);
    };
    let Some(ScreenState {
        section_id,
        canonical,
        session,
    }) = state.screen.as_mut()
    else {
        return err(&req.id, "no_section", "open a section first", None);
    };

    match session.save(canonical, section_id, gateway) {
        Ok((updated, snapshot)) => {
            info!(section = %section_id, updates = updated, "schedule saved");
            *canonical = snapshot;
            ok(&req.id, json!({ "updated": updated }))
        }
        Err(e) => session_err(&req.id, e),
    }
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(screen) = state.screen.as_ref() else {
        return err(&req.id, "no_section", "open a section first", None);
    };
    ok(
        &req.id,
        json!({
            "sectionId": screen.section_id,
            "editState": screen.session.state().as_str(),
            "canonical": screen.canonical.entries(),
            "working": screen.session.working().map(|w| w.entries()),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "edit.enter" => Some(handle_enter(state, req)),
        "edit.move" => Some(handle_move(state, req)),
        "edit.cancel" => Some(handle_cancel(state, req)),
        "edit.save" => Some(handle_save(state, req)),
        "edit.status" => Some(handle_status(state, req)),
        _ => None,
    }
}
