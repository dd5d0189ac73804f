use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::model::{Day, ModelError, ScheduleEntry, ScheduleSnapshot, SubjectRef, TimeBlock, DAYS};

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 401/403 from the backend. The shell owns re-authentication; the
    /// daemon only names the condition.
    #[error("session expired")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected by backend: {0}")]
    Rejected(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("malformed backend payload: {0}")]
    Decode(String),
}

impl From<ModelError> for GatewayError {
    fn from(e: ModelError) -> Self {
        GatewayError::Decode(e.to_string())
    }
}

/// The school-management backend, seen through the four operations the
/// schedule screen needs. Implementations must be safe to call repeatedly;
/// the daemon retries saves against the same instance.
pub trait ScheduleGateway {
    fn list_by_section(&self, section_id: &str) -> GatewayResult<ScheduleSnapshot>;
    /// Replaces all of the section's entries server-side. Callers must
    /// re-fetch afterwards; the returned snapshot is what the backend
    /// reported at generation time.
    fn generate_default(&self, section_id: &str) -> GatewayResult<ScheduleSnapshot>;
    fn update_entry(&self, entry: &ScheduleEntry) -> GatewayResult<ScheduleEntry>;
    fn delete_entry(&self, entry_id: &str) -> GatewayResult<()>;
    fn describe(&self) -> &'static str;
}

fn snapshot_from_wire(entries: Vec<ScheduleEntry>) -> GatewayResult<ScheduleSnapshot> {
    Ok(ScheduleSnapshot::new(entries)?)
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// REST client for the real backend. The bearer credential is injected at
/// construction; nothing here reads ambient state.
pub struct HttpScheduleGateway {
    base_url: String,
    token: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl HttpScheduleGateway {
    pub fn new(base_url: &str, token: &str) -> GatewayResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> GatewayResult<reqwest::blocking::Response> {
        let resp = req
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GatewayError::Unauthorized);
        }

        let detail = resp
            .json::<WireErrorBody>()
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| status.to_string());
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(detail));
        }
        if status.is_client_error() {
            return Err(GatewayError::Rejected(detail));
        }
        Err(GatewayError::Network(format!("{status}: {detail}")))
    }

    fn entries(&self, resp: reqwest::blocking::Response) -> GatewayResult<ScheduleSnapshot> {
        let entries: Vec<ScheduleEntry> = resp
            .json()
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        snapshot_from_wire(entries)
    }
}

impl ScheduleGateway for HttpScheduleGateway {
    fn list_by_section(&self, section_id: &str) -> GatewayResult<ScheduleSnapshot> {
        let url = self.url(&format!("/sections/{section_id}/schedules"));
        let resp = self.send(self.client.get(url))?;
        self.entries(resp)
    }

    fn generate_default(&self, section_id: &str) -> GatewayResult<ScheduleSnapshot> {
        let url = self.url(&format!("/sections/{section_id}/schedules/generate"));
        let resp = self.send(self.client.post(url))?;
        self.entries(resp)
    }

    fn update_entry(&self, entry: &ScheduleEntry) -> GatewayResult<ScheduleEntry> {
        let url = self.url(&format!("/schedules/{}", entry.id));
        let resp = self.send(self.client.put(url).json(entry))?;
        let updated: ScheduleEntry = resp
            .json()
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        updated.validate()?;
        Ok(updated)
    }

    fn delete_entry(&self, entry_id: &str) -> GatewayResult<()> {
        let url = self.url(&format!("/schedules/{entry_id}"));
        self.send(self.client.delete(url))?;
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "http"
    }
}

// ---------------------------------------------------------------------------
// Local in-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LocalStore {
    sections: BTreeMap<String, Vec<ScheduleEntry>>,
}

/// In-memory backend for tests and offline development. Mirrors the real
/// backend's observable contract: opaque ids, wholesale regeneration,
/// per-entry updates, and (on request) injected update failures.
pub struct LocalScheduleGateway {
    store: Mutex<LocalStore>,
    subjects: Vec<String>,
    blocks: Vec<TimeBlock>,
    fail_updates: bool,
}

impl LocalScheduleGateway {
    pub fn new(
        subjects: Vec<String>,
        blocks: Vec<TimeBlock>,
        seed: BTreeMap<String, Vec<ScheduleEntry>>,
        fail_updates: bool,
    ) -> Self {
        Self {
            store: Mutex::new(LocalStore { sections: seed }),
            subjects,
            blocks,
            fail_updates,
        }
    }

    fn fill_section(&self, section_id: &str) -> Vec<ScheduleEntry> {
        // Round-robin stand-in for the backend's placement algorithm. Good
        // enough to exercise every screen flow offline.
        let mut entries = Vec::new();
        if self.subjects.is_empty() {
            return entries;
        }
        let mut next = 0usize;
        for day in DAYS {
            for b in self.blocks.iter().filter(|b| !b.is_break) {
                let name = &self.subjects[next % self.subjects.len()];
                next += 1;
                entries.push(ScheduleEntry {
                    id: Uuid::new_v4().to_string(),
                    subject: SubjectRef {
                        id: name.to_ascii_lowercase().replace(' ', "-"),
                        name: name.clone(),
                    },
                    section_id: section_id.to_string(),
                    day,
                    start: b.start,
                    end: b.end,
                });
            }
        }
        entries
    }
}

impl ScheduleGateway for LocalScheduleGateway {
    fn list_by_section(&self, section_id: &str) -> GatewayResult<ScheduleSnapshot> {
        let store = self.store.lock().expect("local store lock");
        let entries = store.sections.get(section_id).cloned().unwrap_or_default();
        snapshot_from_wire(entries)
    }

    fn generate_default(&self, section_id: &str) -> GatewayResult<ScheduleSnapshot> {
        if self.subjects.is_empty() {
            return Err(GatewayError::Rejected(
                "no subjects configured for this section".to_string(),
            ));
        }
        let entries = self.fill_section(section_id);
        let mut store = self.store.lock().expect("local store lock");
        store
            .sections
            .insert(section_id.to_string(), entries.clone());
        snapshot_from_wire(entries)
    }

    fn update_entry(&self, entry: &ScheduleEntry) -> GatewayResult<ScheduleEntry> {
        if self.fail_updates {
            return Err(GatewayError::Rejected(
                "update refused by failure injection".to_string(),
            ));
        }
        entry.validate()?;
        let mut store = self.store.lock().expect("local store lock");
        let section = store
            .sections
            .get_mut(&entry.section_id)
            .ok_or_else(|| GatewayError::NotFound(format!("section {}", entry.section_id)))?;

        // No cell-collision check here: a saved swap arrives as two
        // sequential updates whose intermediate state collides. The store
        // is only read between requests, when it is consistent again.
        let stored = section
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| GatewayError::NotFound(format!("entry {}", entry.id)))?;
        stored.day = entry.day;
        stored.start = entry.start;
        stored.end = entry.end;
        stored.subject = entry.subject.clone();
        Ok(stored.clone())
    }

    fn delete_entry(&self, entry_id: &str) -> GatewayResult<()> {
        let mut store = self.store.lock().expect("local store lock");
        for section in store.sections.values_mut() {
            if let Some(pos) = section.iter().position(|e| e.id == entry_id) {
                section.remove(pos);
                return Ok(());
            }
        }
        Err(GatewayError::NotFound(format!("entry {entry_id}")))
    }

    fn describe(&self) -> &'static str {
        "local"
    }
}
