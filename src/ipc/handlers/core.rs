use std::collections::BTreeMap;

use serde_json::json;

use crate::gateway::{HttpScheduleGateway, LocalScheduleGateway, ScheduleGateway};
use crate::grid::validate_blocks;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{ScheduleEntry, TimeBlock};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let edit_state = state
        .screen
        .as_ref()
        .map(|s| s.session.state().as_str())
        .unwrap_or("viewing");
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backend": state.gateway.as_ref().map(|g| g.describe()),
            "sectionId": state.screen.as_ref().map(|s| s.section_id.clone()),
            "editState": edit_state
        }),
    )
}

fn parse_seed(
    params: &serde_json::Value,
) -> Result<BTreeMap<String, Vec<ScheduleEntry>>, String> {
    let mut seed = BTreeMap::new();
    let Some(sections) = params.get("sections") else {
        return Ok(seed);
    };
    let Some(map) = sections.as_object() else {
        return Err("sections must be an object of sectionId -> entries".to_string());
    };
    for (section_id, raw) in map {
        let entries: Vec<ScheduleEntry> =
            serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
        seed.insert(section_id.clone(), entries);
    }
    Ok(seed)
}

fn handle_backend_connect(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.edit_active() {
        return err(
            &req.id,
            "edit_in_progress",
            "finish or cancel the edit session before reconnecting",
            None,
        );
    }

    let mode = req
        .params
        .get("mode")
        .and_then(|v| v.as_str())
        .unwrap_or("http");

    let gateway: Box<dyn ScheduleGateway> = match mode {
        "http" => {
            let Some(base_url) = req.params.get("baseUrl").and_then(|v| v.as_str()) else {
                return err(&req.id, "bad_params", "missing baseUrl", None);
            };
            // The credential is injected exactly once, here. Gateway calls
            // never consult ambient storage.
            let Some(token) = req.params.get("token").and_then(|v| v.as_str()) else {
                return err(&req.id, "bad_params", "missing token", None);
            };
            match HttpScheduleGateway::new(base_url, token) {
                Ok(gw) => Box::new(gw),
                Err(e) => return err(&req.id, "connect_failed", e.to_string(), None),
            }
        }
        "local" => {
            let subjects: Vec<String> = req
                .params
                .get("subjects")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            let seed = match parse_seed(&req.params) {
                Ok(s) => s,
                Err(msg) => return err(&req.id, "bad_params", msg, None),
            };
            let fail_updates = req
                .params
                .get("failUpdates")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            Box::new(LocalScheduleGateway::new(
                subjects,
                state.blocks.clone(),
                seed,
                fail_updates,
            ))
        }
        other => {
            return err(
                &req.id,
                "bad_params",
                format!("mode must be http or local, got {other}"),
                None,
            )
        }
    };

    let backend = gateway.describe();
    state.gateway = Some(gateway);
    // A different backend knows nothing about the previous screen.
    state.screen = None;
    ok(&req.id, json!({ "backend": backend }))
}

fn handle_blocks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "blocks": state.blocks }))
}

fn handle_blocks_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.edit_active() {
        return err(
            &req.id,
            "edit_in_progress",
            "finish or cancel the edit session before changing the block table",
            None,
        );
    }

    let Some(raw) = req.params.get("blocks") else {
        return err(&req.id, "bad_params", "missing blocks[]", None);
    };
    let blocks: Vec<TimeBlock> = match serde_json::from_value(raw.clone()) {
        Ok(b) => b,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if let Err(e) = validate_blocks(&blocks) {
        return err(&req.id, "bad_blocks", e.to_string(), None);
    }

    state.blocks = blocks;
    ok(&req.id, json!({ "blocks": state.blocks }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "backend.connect" => Some(handle_backend_connect(state, req)),
        "blocks.list" => Some(handle_blocks_list(state, req)),
        "blocks.set" => Some(handle_blocks_set(state, req)),
        _ => None,
    }
}
