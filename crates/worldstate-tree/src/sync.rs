use crate::patch::{diff, DiffError, StatePatch};
use crate::value::Value;

/// The last snapshot broadcast to a peer.
///
/// Diffing against the baseline and adopting the new snapshot happen in one
/// `&mut self` call, so two diffs can never race against the same baseline.
///
/// # Example
///
/// ```
/// use worldstate_tree::{json, SyncBaseline};
///
/// let mut baseline = SyncBaseline::new(json!({ "round": 1 }));
///
/// let patch = baseline.advance(json!({ "round": 2 })).unwrap();
/// assert!(patch.is_some());
///
/// // Nothing changed since the last broadcast.
/// assert!(baseline.advance(json!({ "round": 2 })).unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct SyncBaseline {
    snapshot: Value,
}

impl SyncBaseline {
    /// Start from a snapshot the peer already has in full.
    #[must_use]
    pub fn new(snapshot: Value) -> Self {
        Self { snapshot }
    }

    /// The snapshot the peer is known to have.
    #[must_use]
    pub fn snapshot(&self) -> &Value {
        &self.snapshot
    }

    /// Diff `next` against the baseline and adopt it.
    ///
    /// Returns `None` when nothing changed. On error the baseline is kept.
    pub fn advance(&mut self, next: Value) -> Result<Option<StatePatch>, DiffError> {
        let patch = diff(&self.snapshot, &next)?;
        self.snapshot = next;
        Ok((!patch.is_empty()).then_some(patch))
    }

    /// Replace the baseline after a full resync, without diffing.
    pub fn reset(&mut self, snapshot: Value) {
        self.snapshot = snapshot;
    }
}
