//! Intent Storage
//!
//! Keyed store of locally known intents, the single source of truth for
//! reconciliation. Transitions on one id are serialised; different ids never
//! contend on the same lock.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{PaymentError, Result};
use crate::intent::{IntentId, IntentState, PaymentIntent, Transition};

/// Intent storage trait
pub trait IntentStore: Send + Sync {
    /// Insert a new intent record.
    ///
    /// An id that is already tracked keeps its record untouched; the
    /// existing record is returned instead.
    fn put(&self, intent: PaymentIntent) -> Result<Option<PaymentIntent>>;

    /// Get intent by id
    fn get(&self, id: &IntentId) -> Result<Option<PaymentIntent>>;

    /// Atomically apply a transition and return the updated record.
    ///
    /// Returns `None` for unknown ids. A disallowed transition is not an
    /// error; the record comes back unchanged with `applied: false`.
    fn transition(
        &self,
        id: &IntentId,
        target: IntentState,
    ) -> Result<Option<(PaymentIntent, Transition)>>;

    /// Number of tracked intents
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory intent store with a mutex per intent id
pub struct MemoryIntentStore {
    intents: RwLock<HashMap<IntentId, Arc<Mutex<PaymentIntent>>>>,
}

impl Default for MemoryIntentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self {
            intents: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the per-id slot without holding the map lock afterwards
    fn slot(&self, id: &IntentId) -> Result<Option<Arc<Mutex<PaymentIntent>>>> {
        let intents = self.intents.read().map_err(|_| poisoned())?;
        Ok(intents.get(id).cloned())
    }
}

fn poisoned() -> PaymentError {
    PaymentError::Storage("intent store lock poisoned".into())
}

impl IntentStore for MemoryIntentStore {
    fn put(&self, intent: PaymentIntent) -> Result<Option<PaymentIntent>> {
        let mut intents = self.intents.write().map_err(|_| poisoned())?;

        match intents.entry(intent.id.clone()) {
            Entry::Occupied(slot) => Ok(Some(slot.get().lock().map_err(|_| poisoned())?.clone())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(intent)));
                Ok(None)
            }
        }
    }

    fn get(&self, id: &IntentId) -> Result<Option<PaymentIntent>> {
        match self.slot(id)? {
            Some(slot) => Ok(Some(slot.lock().map_err(|_| poisoned())?.clone())),
            None => Ok(None),
        }
    }

    fn transition(
        &self,
        id: &IntentId,
        target: IntentState,
    ) -> Result<Option<(PaymentIntent, Transition)>> {
        let Some(slot) = self.slot(id)? else {
            return Ok(None);
        };

        let mut intent = slot.lock().map_err(|_| poisoned())?;
        let transition = intent.apply(target);

        Ok(Some((intent.clone(), transition)))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.intents.read().map_err(|_| poisoned())?.len())
    }
}
