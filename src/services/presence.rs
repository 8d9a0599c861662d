use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PresentEditor {
    pub user_id: Uuid,
    pub username: String,
}

/// Who is editing a quiz at one point in time. Snapshots for the same quiz
/// are totally ordered by `revision`; a subscriber holding a higher revision
/// can drop anything older.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub quiz_id: Uuid,
    pub revision: u64,
    pub editors: Vec<PresentEditor>,
}

#[derive(Default)]
struct Registry {
    revision: u64,
    editors: HashMap<Uuid, BTreeSet<PresentEditor>>,
}

impl Registry {
    fn snapshot(&self, quiz_id: Uuid) -> PresenceSnapshot {
        PresenceSnapshot {
            quiz_id,
            revision: self.revision,
            editors: self
                .editors
                .get(&quiz_id)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }
}

/// Process-scoped map of quiz id to the editors currently connected.
/// A mutation and the snapshot it yields are taken under the same lock.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<Registry>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, quiz_id: Uuid, editor: PresentEditor) -> PresenceSnapshot {
        let mut registry = self.inner.lock().expect("presence mutex poisoned");
        registry.editors.entry(quiz_id).or_default().insert(editor);
        registry.revision += 1;
        registry.snapshot(quiz_id)
    }

    /// Removes every entry for `user_id`; the quiz entry disappears once empty.
    pub fn leave(&self, quiz_id: Uuid, user_id: Uuid) -> PresenceSnapshot {
        let mut registry = self.inner.lock().expect("presence mutex poisoned");
        if let Some(set) = registry.editors.get_mut(&quiz_id) {
            set.retain(|e| e.user_id != user_id);
            if set.is_empty() {
                registry.editors.remove(&quiz_id);
            }
        }
        registry.revision += 1;
        registry.snapshot(quiz_id)
    }

    pub fn snapshot(&self, quiz_id: Uuid) -> PresenceSnapshot {
        self.inner
            .lock()
            .expect("presence mutex poisoned")
            .snapshot(quiz_id)
    }

    pub fn is_tracked(&self, quiz_id: Uuid) -> bool {
        self.inner
            .lock()
            .expect("presence mutex poisoned")
            .editors
            .contains_key(&quiz_id)
    }
}
