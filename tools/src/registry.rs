//! In-memory session registry.
//!
//! Keyed store of per-session [`GateState`]. It is a cache over repository
//! ground truth, not the source of truth, and is rebuilt from nothing on each
//! process start.

use std::collections::HashMap;

use jjgate_types::{GateState, SessionId};

#[derive(Debug, Clone)]
struct Entry {
    state: GateState,
    /// Creation order; breaks ties when choosing an inheritance source.
    created_seq: u64,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: HashMap<SessionId, Entry>,
    next_seq: u64,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<&GateState> {
        self.entries.get(id).map(|entry| &entry.state)
    }

    /// Unknown sessions count as locked.
    #[must_use]
    pub fn is_unlocked(&self, id: &SessionId) -> bool {
        self.get(id).is_some_and(|state| state.unlocked)
    }

    /// Record a freshly created session. Re-creating an id moves it to the
    /// back of the creation order.
    pub fn insert_created(&mut self, id: SessionId, state: GateState) {
        let created_seq = self.bump_seq();
        self.entries.insert(id, Entry { state, created_seq });
    }

    /// Overwrite the state of `id`, keeping its creation order if known.
    pub fn set(&mut self, id: SessionId, state: GateState) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.state = state;
            return;
        }
        self.insert_created(id, state);
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<GateState> {
        self.entries.remove(id).map(|entry| entry.state)
    }

    /// Choose the session `id` inherits an unlocked gate from, if any.
    ///
    /// An explicit `hint` wins when it names a known, unlocked session other
    /// than `id`. Otherwise the most recently created unlocked session is used.
    #[must_use]
    pub fn inheritance_source(
        &self,
        id: &SessionId,
        hint: Option<&SessionId>,
    ) -> Option<SessionId> {
        if let Some(hint) = hint
            && hint != id
            && self.is_unlocked(hint)
        {
            return Some(hint.clone());
        }

        self.entries
            .iter()
            .filter(|(candidate, entry)| *candidate != id && entry.state.unlocked)
            .max_by_key(|(_, entry)| entry.created_seq)
            .map(|(candidate, _)| candidate.clone())
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
