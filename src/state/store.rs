//! Shared handle to the current [`EditState`] snapshot.
//!
//! Backed by a `tokio::sync::watch` channel: the channel's internal lock makes
//! every update a single read-current → compute-next → replace step, and
//! observers (status displays, the CLI progress bar) can subscribe to changes
//! without polling.

use super::EditState;
use crate::error::RotateError;
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle to the session's edit state.
#[derive(Clone)]
pub struct EditStore {
    tx: Arc<watch::Sender<Arc<EditState>>>,
}

impl Default for EditStore {
    fn default() -> Self {
        Self::new(EditState::default())
    }
}

impl EditStore {
    pub fn new(initial: EditState) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// The current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<EditState> {
        Arc::clone(&self.tx.borrow())
    }

    /// Receiver notified after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<Arc<EditState>> {
        self.tx.subscribe()
    }

    /// Apply a fallible transition. On `Err` the snapshot is left untouched.
    ///
    /// `transition` runs under the channel lock: it must not call back into
    /// the store.
    pub fn apply(
        &self,
        transition: impl FnOnce(&EditState) -> Result<EditState, RotateError>,
    ) -> Result<Arc<EditState>, RotateError> {
        let mut applied = None;
        let mut failure = None;
        self.tx.send_if_modified(|current| match transition(current.as_ref()) {
            Ok(next) => {
                let next = Arc::new(next);
                *current = Arc::clone(&next);
                applied = Some(next);
                true
            }
            Err(e) => {
                failure = Some(e);
                false
            }
        });
        match (applied, failure) {
            (Some(state), _) => Ok(state),
            (None, Some(e)) => Err(e),
            (None, None) => Err(RotateError::Internal("state transition did not run".into())),
        }
    }

    /// Apply a transition that may decline (stale target). Returns the value
    /// produced alongside the new snapshot, or `None` if nothing changed.
    pub fn apply_with<T>(
        &self,
        transition: impl FnOnce(&EditState) -> Option<(EditState, T)>,
    ) -> Option<T> {
        let mut out = None;
        self.tx.send_if_modified(|current| match transition(current.as_ref()) {
            Some((next, value)) => {
                *current = Arc::new(next);
                out = Some(value);
                true
            }
            None => false,
        });
        out
    }

    /// Like [`Self::apply_with`] without a side value. Returns whether the
    /// snapshot changed.
    pub fn apply_if(&self, transition: impl FnOnce(&EditState) -> Option<EditState>) -> bool {
        self.apply_with(|state| transition(state).map(|next| (next, ())))
            .is_some()
    }

    /// Replace the whole state (full reset).
    pub fn replace(&self, state: EditState) {
        self.tx.send_replace(Arc::new(state));
    }
}
