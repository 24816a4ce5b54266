//! The live state store.
//!
//! All mutations go through one writer lock that is held across mutate and
//! notify, so listeners see snapshots strictly in mutation order. Readers take
//! a cheap `Arc` snapshot and never observe a half-applied change.
//!
//! Listeners run synchronously on the mutating thread and must not call back
//! into mutating operations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics::counter;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

use super::{LiveState, Page, ViewUpdate};
use crate::config::ConfigEntry;
use crate::events::{group_by_subject, Event, Instance};
use crate::telemetry::metrics::{EVENTS_DROPPED_TOTAL, EVENTS_MERGED_TOTAL};

type Listener = Arc<dyn Fn(&Arc<LiveState>) + Send + Sync>;

/// Handle returned by [`LiveStateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Result of merging one pushed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Appended to the existing instance at `index`.
    Appended { index: usize },
    /// Opened a new instance at `index` (always the last position).
    NewInstance { index: usize },
    /// The experiment has no loaded dataset; the event was dropped.
    ExperimentNotLoaded,
}

impl MergeOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, Self::ExperimentNotLoaded)
    }
}

/// Owner of the [`LiveState`].
pub struct LiveStateStore {
    writer: Mutex<()>,
    state: RwLock<Arc<LiveState>>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

impl LiveStateStore {
    /// A store on the `Loading` page with nothing loaded.
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(()),
            state: RwLock::new(Arc::new(LiveState::default())),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reading
    // ─────────────────────────────────────────────────────────────────────────

    /// Current immutable snapshot.
    pub fn snapshot(&self) -> Arc<LiveState> {
        Arc::clone(&*self.state.read())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listeners
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a listener called once after every committed mutation.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Arc<LiveState>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Build every experiment's dataset from history and open the list page.
    ///
    /// Experiments missing from `history` stay unloaded.
    pub fn initialize(&self, config: Vec<ConfigEntry>, history: Vec<(String, Vec<Event>)>) {
        self.mutate(|state| {
            let experiments: HashMap<String, Vec<Instance>> = history
                .into_iter()
                .map(|(name, events)| (name, group_by_subject(events)))
                .collect();

            info!(
                experiments = experiments.len(),
                configured = config.len(),
                "Live state initialized"
            );

            state.config = config;
            state.experiments = experiments;
            state.view.page = Page::Experiments;
        });
    }

    /// Fold one pushed event into its experiment's dataset.
    ///
    /// Events for unloaded experiments are dropped without notifying.
    pub fn merge_incoming_event(&self, event: Event) -> MergeOutcome {
        let _writer = self.writer.lock();

        let snapshot = {
            let mut guard = self.state.write();
            if !guard.is_loaded(&event.experiment) {
                drop(guard);
                debug!(
                    experiment = %event.experiment,
                    subject = %event.subject,
                    "Dropping event for unloaded experiment"
                );
                counter!(EVENTS_DROPPED_TOTAL, "experiment" => event.experiment.clone())
                    .increment(1);
                return MergeOutcome::ExperimentNotLoaded;
            }

            let experiment = event.experiment.clone();
            let state = Arc::make_mut(&mut *guard);
            let instances = state.experiments.entry(experiment.clone()).or_default();

            let outcome = match instances.iter().position(|i| i.subject == event.subject) {
                Some(index) => {
                    instances[index].data.push(event);
                    MergeOutcome::Appended { index }
                }
                None => {
                    let mut instance = Instance::new(event.subject.clone());
                    instance.data.push(event);
                    instances.push(instance);
                    MergeOutcome::NewInstance {
                        index: instances.len() - 1,
                    }
                }
            };

            debug!(experiment = %experiment, outcome = ?outcome, "Event merged");
            counter!(EVENTS_MERGED_TOTAL, "experiment" => experiment).increment(1);
            (Arc::clone(&*guard), outcome)
        };

        let (state, outcome) = snapshot;
        self.notify(&state);
        outcome
    }

    /// Overwrite the provided navigation fields. No cross-field validation.
    pub fn set_view(&self, update: ViewUpdate) {
        self.mutate(|state| update.apply(&mut state.view));
    }

    /// Open an experiment's detail page at its first instance.
    pub fn select_experiment(&self, name: impl Into<String>) {
        let name = name.into();
        self.set_view(
            ViewUpdate::new()
                .page(Page::Detail)
                .experiment(Some(name))
                .instance_index(0),
        );
    }

    /// Return to the experiment list.
    pub fn show_experiment_list(&self) {
        self.set_view(
            ViewUpdate::new()
                .page(Page::Experiments)
                .experiment(None)
                .instance_index(0),
        );
    }

    /// Focus the next instance. Returns false, without notifying, at the end.
    pub fn next_instance(&self) -> bool {
        self.step_instance(|index, count| (index + 1 < count).then_some(index + 1))
    }

    /// Focus the previous instance. Returns false, without notifying, at the start.
    pub fn previous_instance(&self) -> bool {
        self.step_instance(|index, count| {
            let current = index.min(count.saturating_sub(1));
            (count > 0 && current > 0).then(|| current - 1)
        })
    }

    fn step_instance<F>(&self, step: F) -> bool
    where
        F: FnOnce(usize, usize) -> Option<usize>,
    {
        let _writer = self.writer.lock();

        let state = {
            let mut guard = self.state.write();
            let count = match guard.view.experiment.as_deref() {
                Some(name) => guard.participants(name).unwrap_or(0),
                None => 0,
            };
            match step(guard.view.instance_index, count) {
                Some(index) => {
                    Arc::make_mut(&mut *guard).view.instance_index = index;
                    Arc::clone(&*guard)
                }
                None => return false,
            }
        };

        self.notify(&state);
        true
    }

    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut LiveState),
    {
        let _writer = self.writer.lock();

        let state = {
            let mut guard = self.state.write();
            f(Arc::make_mut(&mut *guard));
            Arc::clone(&*guard)
        };

        self.notify(&state);
    }

    /// Must be called with the writer lock held.
    fn notify(&self, state: &Arc<LiveState>) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(state);
        }
    }
}

impl Default for LiveStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LiveStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStateStore")
            .field("state", &self.snapshot())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SubjectId;
    use std::sync::atomic::AtomicUsize;

    fn ev(subject: i64, kind: &str, time: i64) -> Event {
        Event::new("ProbMatch", subject, kind, time)
    }

    fn loaded_store() -> LiveStateStore {
        let store = LiveStateStore::new();
        store.initialize(
            Vec::new(),
            vec![(
                "ProbMatch".to_string(),
                vec![ev(1, "Start", 1), ev(2, "Start", 2), ev(1, "End", 3)],
            )],
        );
        store
    }

    #[test]
    fn test_initial_page_is_loading() {
        let store = LiveStateStore::new();
        assert_eq!(store.snapshot().view.page, Page::Loading);
    }

    #[test]
    fn test_initialize_groups_history() {
        let store = loaded_store();
        let state = store.snapshot();

        assert_eq!(state.view.page, Page::Experiments);
        let instances = state.instances("ProbMatch").unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].len(), 2);
        assert!(!state.is_loaded("Other"));
    }

    #[test]
    fn test_merge_appends_to_existing_subject() {
        let store = loaded_store();
        let outcome = store.merge_incoming_event(ev(2, "End", 4));

        assert_eq!(outcome, MergeOutcome::Appended { index: 1 });
        assert_eq!(store.snapshot().instances("ProbMatch").unwrap()[1].len(), 2);
    }

    #[test]
    fn test_merge_new_subject_goes_last() {
        let store = loaded_store();
        let before = store.snapshot();
        let outcome = store.merge_incoming_event(ev(3, "Start", 5));

        assert_eq!(outcome, MergeOutcome::NewInstance { index: 2 });
        let after = store.snapshot();
        let instances = after.instances("ProbMatch").unwrap();
        assert_eq!(instances[2].subject, SubjectId::from(3));
        assert_eq!(&instances[..2], before.instances("ProbMatch").unwrap());
    }

    #[test]
    fn test_merge_unloaded_experiment_is_dropped_silently() {
        let store = loaded_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = store.merge_incoming_event(Event::new("Other", 1, "Start", 1));
        assert_eq!(outcome, MergeOutcome::ExperimentNotLoaded);
        assert!(!outcome.is_applied());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!store.snapshot().is_loaded("Other"));
    }

    #[test]
    fn test_every_mutation_notifies_once() {
        let store = LiveStateStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.initialize(Vec::new(), vec![("ProbMatch".into(), Vec::new())]);
        store.merge_incoming_event(ev(1, "Start", 1));
        store.set_view(ViewUpdate::new().page(Page::Detail));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_listener_sees_committed_snapshot() {
        let store = loaded_store();
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        store.subscribe(move |state| {
            sink.lock().push(state.participants("ProbMatch").unwrap_or(0));
        });

        store.merge_incoming_event(ev(7, "Start", 1));
        store.merge_incoming_event(ev(8, "Start", 2));
        assert_eq!(*sizes.lock(), vec![3, 4]);
    }

    #[test]
    fn test_unsubscribe() {
        let store = loaded_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.merge_incoming_event(ev(1, "End", 9));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_old_snapshots_are_immutable() {
        let store = loaded_store();
        let old = store.snapshot();
        store.merge_incoming_event(ev(1, "ButtonPress", 4));

        assert_eq!(old.instances("ProbMatch").unwrap()[0].len(), 2);
        assert_eq!(store.snapshot().instances("ProbMatch").unwrap()[0].len(), 3);
    }

    #[test]
    fn test_navigation_is_bounded() {
        let store = loaded_store();
        store.select_experiment("ProbMatch");
        assert_eq!(store.snapshot().view.page, Page::Detail);

        assert!(!store.previous_instance());
        assert!(store.next_instance());
        assert_eq!(store.snapshot().view.instance_index, 1);
        assert!(!store.next_instance());
        assert!(store.previous_instance());
        assert_eq!(store.snapshot().view.instance_index, 0);

        store.show_experiment_list();
        let state = store.snapshot();
        assert_eq!(state.view.page, Page::Experiments);
        assert!(state.view.experiment.is_none());
    }

    #[test]
    fn test_set_view_does_not_validate() {
        let store = loaded_store();
        store.set_view(
            ViewUpdate::new()
                .experiment(Some("ProbMatch".into()))
                .instance_index(42),
        );
        let state = store.snapshot();
        assert_eq!(state.view.instance_index, 42);
        assert_eq!(state.selected_instance().unwrap().subject, SubjectId::from(2));
    }

    #[test]
    fn test_previous_from_past_the_end_moves_off_displayed_instance() {
        let store = loaded_store();
        store.merge_incoming_event(ev(3, "Start", 4));
        store.set_view(
            ViewUpdate::new()
                .page(Page::Detail)
                .experiment(Some("ProbMatch".into()))
                .instance_index(42),
        );
        assert_eq!(
            store.snapshot().selected_instance().unwrap().subject,
            SubjectId::from(3)
        );

        assert!(store.previous_instance());
        let state = store.snapshot();
        assert_eq!(state.view.instance_index, 1);
        assert_eq!(state.selected_instance().unwrap().subject, SubjectId::from(2));
    }

    #[test]
    fn test_previous_without_instances_does_not_notify() {
        let store = LiveStateStore::new();
        store.initialize(Vec::new(), vec![("ProbMatch".into(), Vec::new())]);
        store.set_view(
            ViewUpdate::new()
                .experiment(Some("ProbMatch".into()))
                .instance_index(5),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!store.previous_instance());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
