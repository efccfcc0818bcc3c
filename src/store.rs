pub mod answers;
pub mod drafts;
pub mod keys;
pub mod mcqs;
pub mod schema;
pub mod settings;
pub mod submissions;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::broadcast;

pub type DBResult<T> = Result<T, rusqlite::Error>;

// Room for bursts of writes before a slow subscriber starts lagging.
const EVENT_CAPACITY: usize = 64;

/// A change to one key. `value` is the new JSON text, `None` on removal.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub key: String,
    pub value: Option<String>,
}

/// Key-scoped JSON store over a single SQLite file.
///
/// Cloning is cheap and every clone shares the same change feed, so all
/// bindings handed out by one `Store` observe each other's writes. Separately
/// opened stores on the same file see each other's data, but not each
/// other's events.
///
/// Nothing here raises: an unavailable file or a value that no longer decodes
/// falls back to the caller's default and is logged.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    events: broadcast::Sender<StoreEvent>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let store = Self {
            inner: Arc::new(StoreInner { path: path.as_ref().to_path_buf(), events }),
        };

        if let Err(err) = store.initialize() {
            log::warn!("[open] Could not initialize store at {}: {err}",
                       store.inner.path.display());
        }

        store
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn connect(&self) -> DBResult<Connection> {
        Connection::open(&self.inner.path)
    }

    fn initialize(&self) -> DBResult<()> {
        log::debug!("[initialize] creating KeyValue table...");
        self.connect()?.execute(schema::KEY_VALUE_SCHEMA, [])?;
        Ok(())
    }

    /// Reads the value stored at `key`, or `default` if it is missing or unreadable.
    pub fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.read_raw(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                log::warn!("[read] Stored value for '{key}' does not decode, using default: {err}");
                default
            }),
            Ok(None) => default,
            Err(err) => {
                log::warn!("[read] Store unavailable when reading '{key}', using default: {err}");
                default
            }
        }
    }

    /// Stores `value` at `key` and notifies subscribers.
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("[write] Could not encode value for '{key}': {err}");
                return;
            }
        };

        match self.write_raw(key, &raw) {
            Ok(()) => self.notify(key, Some(raw)),
            Err(err) => log::warn!("[write] Store unavailable when writing '{key}': {err}"),
        }
    }

    pub fn remove(&self, key: &str) {
        let removed = self.connect().and_then(|connection| {
            connection
                .prepare("DELETE FROM KeyValue WHERE key = :key")?
                .execute(rusqlite::named_params! { ":key": key })
        });

        match removed {
            Ok(_) => self.notify(key, None),
            Err(err) => log::warn!("[remove] Store unavailable when removing '{key}': {err}"),
        }
    }

    /// A typed accessor for `key` that falls back to `default`.
    pub fn bind<T>(&self, key: impl Into<String>, default: T) -> Binding<T> {
        Binding { store: self.clone(), key: key.into(), default }
    }

    /// Raw feed of every change made through this store.
    pub fn events(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    fn read_raw(&self, key: &str) -> DBResult<Option<String>> {
        log::trace!("[read_raw] Reading '{key}'");
        self.connect()?
            .prepare("SELECT value FROM KeyValue WHERE key = :key")?
            .query(rusqlite::named_params! { ":key": key })?
            .next()?
            .map(|row| row.get("value"))
            .transpose()
    }

    fn write_raw(&self, key: &str, raw: &str) -> DBResult<()> {
        log::trace!("[write_raw] Writing '{key}'");
        self.connect()?
            .prepare(
                "INSERT INTO KeyValue (key, value) VALUES (:key, :value)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?
            .execute(rusqlite::named_params! { ":key": key, ":value": raw })?;

        Ok(())
    }

    fn notify(&self, key: &str, value: Option<String>) {
        // Sending only fails when nobody is listening, which is fine.
        let _ = self.inner.events.send(StoreEvent { key: key.to_string(), value });
    }
}

/// One key of the store, viewed as a `T`.
#[derive(Clone)]
pub struct Binding<T> {
    store: Store,
    key: String,
    default: T,
}

impl<T> Binding<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> T {
        self.store.read(&self.key, self.default.clone())
    }

    pub fn set(&self, value: &T) {
        self.store.write(&self.key, value)
    }

    /// Read-modify-write. Returns the value that was written.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> T {
        let mut value = self.get();
        f(&mut value);
        self.set(&value);
        value
    }

    pub fn clear(&self) {
        self.store.remove(&self.key)
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            events: self.store.events(),
            key: self.key.clone(),
            default: self.default.clone(),
        }
    }
}

/// Receives the new value each time the bound key changes.
pub struct Subscription<T> {
    events: broadcast::Receiver<StoreEvent>,
    key: String,
    default: T,
}

impl<T> Subscription<T>
where
    T: DeserializeOwned + Clone,
{
    /// Waits for the next change of the bound key. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    if let Some(value) = self.decode(event) {
                        return Some(value);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("[changed] Subscriber for '{}' skipped {skipped} events", self.key);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::changed`].
    pub fn try_changed(&mut self) -> Option<T> {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if let Some(value) = self.decode(event) {
                        return Some(value);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    fn decode(&self, event: StoreEvent) -> Option<T> {
        if event.key != self.key {
            return None;
        }

        match event.value {
            None => Some(self.default.clone()),
            Some(raw) => serde_json::from_str(&raw)
                .inspect_err(|err| log::warn!("[decode] Ignoring undecodable change to '{}': {err}",
                                              self.key))
                .ok(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Review, Submission, SubmissionWithReview};
    use std::collections::BTreeMap;

    pub(crate) fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store.db"));
        (store, dir)
    }

    #[test]
    fn missing_key_reads_default() {
        let (store, _dir) = temp_store();
        assert_eq!(store.read("nothing-here", 7u32), 7);
    }

    #[test]
    fn write_is_visible_to_a_separately_opened_store() {
        let (store, dir) = temp_store();
        let submission = SubmissionWithReview {
            submission: Submission {
                id: "2025-01-01T00:00:00.000Z".into(),
                problem_id: "in-memory-kv".into(),
                code: "package main".into(),
                timestamp: "2025-01-01T00:00:00Z".parse().unwrap(),
                is_mock: false,
            },
            review: Review {
                score: 82,
                feedback: "Solid".into(),
                strengths: vec!["a".into()],
                areas_for_improvement: vec!["b".into()],
            },
        };
        store.write("submissions-in-memory-kv", &vec![submission.clone()]);

        let other = Store::open(dir.path().join("store.db"));
        let read: Vec<SubmissionWithReview> = other.read("submissions-in-memory-kv", vec![]);
        assert_eq!(read, vec![submission]);
    }

    #[test]
    fn answer_map_round_trips() {
        let (store, _dir) = temp_store();
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), crate::models::AnswerStatus::Passed);
        answers.insert("q2".to_string(), crate::models::AnswerStatus::Failed);
        store.write("mcq-answers", &answers);

        let read: BTreeMap<String, crate::models::AnswerStatus> = store.read("mcq-answers", BTreeMap::new());
        assert_eq!(read, answers);
    }

    #[test]
    fn undecodable_value_falls_back_to_default() {
        let (store, _dir) = temp_store();
        store.write_raw("count", "{not json").unwrap();
        assert_eq!(store.read("count", 3u32), 3);

        store.write("count", &"a string");
        assert_eq!(store.read("count", 3u32), 3);
    }

    #[test]
    fn unavailable_medium_falls_back_and_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("missing").join("store.db"));

        store.write("key", &1u32);
        store.remove("key");
        assert_eq!(store.read("key", 5u32), 5);
    }

    #[test]
    fn bindings_on_the_same_key_share_state() {
        let (store, _dir) = temp_store();
        let a = store.bind("shared", 0u32);
        let b = store.bind("shared", 0u32);

        a.set(&41);
        assert_eq!(b.update(|v| *v += 1), 42);
        assert_eq!(a.get(), 42);

        b.clear();
        assert_eq!(a.get(), 0);
    }

    #[test]
    fn subscribers_only_see_their_key() {
        let (store, _dir) = temp_store();
        let watched = store.bind("watched", String::new());
        let other = store.bind("other", String::new());
        let mut sub = watched.subscribe();

        other.set(&"ignored".to_string());
        assert_eq!(sub.try_changed(), None);

        watched.set(&"hello".to_string());
        assert_eq!(sub.try_changed(), Some("hello".to_string()));

        watched.clear();
        assert_eq!(sub.try_changed(), Some(String::new()));
        assert_eq!(sub.try_changed(), None);
    }

    #[tokio::test]
    async fn async_subscriber_wakes_on_change() {
        let (store, _dir) = temp_store();
        let binding = store.bind("counter", 0u32);
        let mut sub = binding.subscribe();

        let writer = store.bind("counter", 0u32);
        tokio::spawn(async move { writer.set(&9) });

        assert_eq!(sub.changed().await, Some(9));
    }
}
