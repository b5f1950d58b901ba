//! Session-wide review state that outlives a single document: reviewer
//! colours and saved drafts, persisted through a [`KeyValueStore`].

use std::collections::{BTreeMap, HashMap};

use crate::changes::Operation;
use crate::critic::Attribution;
use crate::error::ReviewError;

/// Minimal string key-value persistence port.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

/// In-memory store, for tests and for sessions that are never persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

const USER_COLORS_KEY: &str = "review:user-colors";
const DRAFT_KEY_PREFIX: &str = "review:draft:";

/// Colours handed out to reviewers in order of first appearance.
pub const DEFAULT_PALETTE: &[&str] = &[
    "#2563eb", "#dc2626", "#16a34a", "#9333ea", "#ea580c", "#0891b2", "#db2777", "#65a30d",
];

pub struct ReviewContext<S: KeyValueStore> {
    store: S,
    palette: Vec<String>,
    /// Loaded lazily from the store on first use.
    colors: Option<BTreeMap<String, String>>,
}

impl<S: KeyValueStore> ReviewContext<S> {
    pub fn new(store: S) -> Self {
        Self::with_palette(store, DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect())
    }

    /// Falls back to [`DEFAULT_PALETTE`] when `palette` is empty.
    pub fn with_palette(store: S, palette: Vec<String>) -> Self {
        let palette = if palette.is_empty() {
            DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
        } else {
            palette
        };
        Self {
            store,
            palette,
            colors: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// The colour assigned to `user`, assigning and persisting the next
    /// palette colour on first sight.
    pub fn color_for_user(&mut self, user: &str) -> String {
        let palette_len = self.palette.len();
        let colors = self.colors.get_or_insert_with(|| {
            self.store
                .get(USER_COLORS_KEY)
                .and_then(|json| {
                    serde_json::from_str(&json)
                        .inspect_err(|err| log::warn!("ignoring stored user colours: {err}"))
                        .ok()
                })
                .unwrap_or_default()
        });
        if let Some(color) = colors.get(user) {
            return color.clone();
        }

        let color = self.palette[colors.len() % palette_len].clone();
        colors.insert(user.to_string(), color.clone());
        match serde_json::to_string(colors) {
            Ok(json) => self.store.set(USER_COLORS_KEY, json),
            Err(err) => log::warn!("could not persist user colours: {err}"),
        }
        color
    }

    pub fn attribution_for(&mut self, user: &str) -> Attribution {
        Attribution {
            author: user.to_string(),
            color: self.color_for_user(user),
        }
    }

    pub fn save_draft(&mut self, document: &str, operations: &[Operation]) -> Result<(), ReviewError> {
        let json = serde_json::to_string(operations)?;
        self.store.set(&draft_key(document), json);
        log::debug!("saved draft of {document} with {} operation(s)", operations.len());
        Ok(())
    }

    /// The saved draft of `document`, if there is one.
    pub fn load_draft(&self, document: &str) -> Result<Option<Vec<Operation>>, ReviewError> {
        self.store
            .get(&draft_key(document))
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(ReviewError::from)
    }

    pub fn clear_draft(&mut self, document: &str) {
        self.store.remove(&draft_key(document));
    }
}

fn draft_key(document: &str) -> String {
    format!("{DRAFT_KEY_PREFIX}{document}")
}
