//! The meet's current start lists and race results.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{EventNumber, HeatKey, RaceResult, StartList};
use crate::reconcile::{ReconcileConfig, Reconciliation, reconcile};

#[derive(Debug, Default)]
struct Inner {
    start_lists: HashMap<EventNumber, Arc<StartList>>,
    results: HashMap<HeatKey, Arc<RaceResult>>,
    latest: Option<HeatKey>,
}

/// Latest start list per event and latest result per heat.
///
/// One writer (ingestion) and any number of readers. Records are replaced
/// whole, so a reader never sees a half-updated heat.
#[derive(Debug, Default)]
pub struct ResultStore {
    inner: RwLock<Inner>,
}

impl ResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer can't leave a record half-replaced, so a poisoned
    // lock still holds consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a start list, replacing any earlier one for the same event.
    pub fn put_start_list(&self, list: StartList) -> Arc<StartList> {
        let list = Arc::new(list);
        self.write()
            .start_lists
            .insert(list.event.number.clone(), Arc::clone(&list));
        list
    }

    /// Stores a result, replacing any earlier one for the same heat, and
    /// makes it the latest.
    pub fn put_result(&self, result: RaceResult) -> Arc<RaceResult> {
        let key = result.key();
        let result = Arc::new(result);
        let mut inner = self.write();
        inner.results.insert(key.clone(), Arc::clone(&result));
        inner.latest = Some(key);
        result
    }

    pub fn start_list(&self, event: &EventNumber) -> Option<Arc<StartList>> {
        self.read().start_lists.get(event).cloned()
    }

    pub fn result(&self, key: &HeatKey) -> Option<Arc<RaceResult>> {
        self.read().results.get(key).cloned()
    }

    /// The most recently stored result.
    pub fn latest(&self) -> Option<Arc<RaceResult>> {
        let inner = self.read();
        inner.latest.as_ref().and_then(|key| inner.results.get(key).cloned())
    }

    /// All start lists, in event order.
    pub fn program(&self) -> Vec<Arc<StartList>> {
        let mut lists: Vec<_> = self.read().start_lists.values().cloned().collect();
        lists.sort_by(|a, b| a.event.number.cmp(&b.event.number));
        lists
    }

    /// All results, in event and heat order.
    pub fn results(&self) -> Vec<Arc<RaceResult>> {
        let mut results: Vec<_> = self.read().results.values().cloned().collect();
        results.sort_by_key(|result| result.key());
        results
    }

    /// Heats of one event that have a result, in heat order.
    pub fn heats_of(&self, event: &EventNumber) -> Vec<HeatKey> {
        let mut keys: Vec<HeatKey> = self
            .read()
            .results
            .keys()
            .filter(|key| &key.event == event)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Reconciles one heat from the stored data.
    pub fn reconcile(&self, key: &HeatKey, config: &ReconcileConfig) -> Reconciliation {
        let (list, result) = {
            let inner = self.read();
            (
                inner.start_lists.get(&key.event).cloned(),
                inner.results.get(key).cloned(),
            )
        };
        reconcile(key, list.as_deref(), result.as_deref(), config)
    }

    /// Reconciles the heat of the most recently stored result.
    pub fn reconcile_latest(&self, config: &ReconcileConfig) -> Option<Reconciliation> {
        let (list, result) = {
            let inner = self.read();
            let key = inner.latest.as_ref()?;
            (
                inner.start_lists.get(&key.event).cloned(),
                inner.results.get(key).cloned(),
            )
        };
        let result = result?;
        Some(reconcile(&result.key(), list.as_deref(), Some(&result), config))
    }
}
