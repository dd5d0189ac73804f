use serde::Deserialize;

use crate::gateway::ScheduleGateway;
use crate::grid::default_blocks;
use crate::model::{ScheduleSnapshot, TimeBlock};
use crate::session::EditSession;

#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// State for the currently selected section. The canonical snapshot lives
/// here and is only ever replaced wholesale after a successful fetch; the
/// working copy lives inside the session.
pub struct ScreenState {
    pub section_id: String,
    pub canonical: ScheduleSnapshot,
    pub session: EditSession,
}

pub struct AppState {
    pub gateway: Option<Box<dyn ScheduleGateway>>,
    pub blocks: Vec<TimeBlock>,
    pub screen: Option<ScreenState>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            gateway: None,
            blocks: default_blocks(),
            screen: None,
        }
    }

    /// True while an edit session is open. Structural operations (section
    /// switch, regenerate, delete, block-table replacement, reconnect) are
    /// refused in this state.
    pub fn edit_active(&self) -> bool {
        self.screen
            .as_ref()
            .is_some_and(|s| !s.session.is_viewing())
    }
}
