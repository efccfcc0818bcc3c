use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::models::Problem;
use crate::store::{Store, keys};

/// What the editor shows next to a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
}

impl std::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveStatus::Idle => write!(f, "no changes"),
            SaveStatus::Saving => write!(f, "saving..."),
            SaveStatus::Saved => write!(f, "saved"),
        }
    }
}

/////*============== CODE DRAFTS ==============*/
/// In-progress code per problem.
///
/// Every edit hits the store immediately. A problem's status only settles on
/// `Saved` once its edits pause for the debounce delay, so a burst of typing
/// shows a single saving/saved transition. Each problem has its own status.
pub struct DraftEditor {
    store: Store,
    delay: Duration,
    drafts: Arc<Mutex<HashMap<String, DraftState>>>,
}

struct DraftState {
    generation: u64,
    status: watch::Sender<SaveStatus>,
}

impl DraftState {
    fn new() -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self { generation: 0, status }
    }
}

fn lock(drafts: &Mutex<HashMap<String, DraftState>>) -> MutexGuard<'_, HashMap<String, DraftState>> {
    drafts.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DraftEditor {
    pub fn new(store: &Store, delay: Duration) -> Self {
        Self {
            store: store.clone(),
            delay,
            drafts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The saved draft for `problem`, or its skeleton if there is none.
    pub fn load(&self, problem: &Problem) -> String {
        self.store
            .read::<Option<String>>(&keys::code_editor(&problem.id), None)
            .unwrap_or_else(|| problem.skeleton_code.clone())
    }

    pub fn edit(&self, problem_id: &str, code: &str) {
        self.store.write(&keys::code_editor(problem_id), code);

        let generation = {
            let mut drafts = lock(&self.drafts);
            let state = drafts.entry(problem_id.to_string()).or_insert_with(DraftState::new);
            state.generation += 1;
            state.status.send_replace(SaveStatus::Saving);

            if tokio::runtime::Handle::try_current().is_err() {
                // No timer to wait on; the write above already happened.
                state.status.send_replace(SaveStatus::Saved);
                return;
            }
            state.generation
        };

        let drafts = Arc::clone(&self.drafts);
        let problem_id = problem_id.to_string();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(state) = lock(&drafts).get(&problem_id) {
                if state.generation == generation {
                    state.status.send_replace(SaveStatus::Saved);
                }
            }
        });
    }

    /// Discards the draft in favour of the skeleton code.
    pub fn reset(&self, problem: &Problem) -> String {
        log::info!("[reset] Resetting draft for {}", problem.id);
        self.edit(&problem.id, &problem.skeleton_code);
        problem.skeleton_code.clone()
    }

    /// Save status of `problem_id`'s draft. `Idle` until it is first edited.
    pub fn status(&self, problem_id: &str) -> SaveStatus {
        lock(&self.drafts)
            .get(problem_id)
            .map_or(SaveStatus::Idle, |state| *state.status.borrow())
    }

    pub fn subscribe_status(&self, problem_id: &str) -> watch::Receiver<SaveStatus> {
        lock(&self.drafts)
            .entry(problem_id.to_string())
            .or_insert_with(DraftState::new)
            .status
            .subscribe()
    }
}
