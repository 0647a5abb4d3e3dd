//! Transaction guard
//!
//! One [`UndoRecord`] makes one workflow step atomic from the user's point of
//! view. It snapshots control values, the set of existing routes, and the
//! native undo-stack depth before a script runs; `restore` rolls all of it
//! back even when the script created its own undo entries or partially
//! failed. Single level: a new snapshot replaces the previous one.

use std::collections::{BTreeMap, BTreeSet};

use crate::host::{ControlId, HostSession, RouteId};

#[derive(Debug, Default)]
pub struct UndoRecord {
    controls: BTreeMap<ControlId, f64>,
    routes: BTreeSet<RouteId>,
    undo_depth_before: u32,
    /// Native undo entries the guarded script created. Public because the
    /// executor computes it after the run and reconciliation adjusts it.
    pub native_undo_count: u32,
    /// User request that produced this snapshot, for the "Undone: ..." line
    pub description: String,
    valid: bool,
}

impl UndoRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn undo_depth_before(&self) -> u32 {
        self.undo_depth_before
    }

    /// Capture the current host state, replacing any previous snapshot
    pub fn snapshot(&mut self, host: &dyn HostSession) {
        let description = std::mem::take(&mut self.description);
        self.clear();
        self.description = description;

        for id in host.control_ids() {
            if let Some(value) = host.control_value(id) {
                self.controls.insert(id, value);
            }
        }
        self.routes = host.route_ids().into_iter().collect();
        self.undo_depth_before = host.undo_depth();
        self.valid = true;

        tracing::debug!(
            controls = self.controls.len(),
            routes = self.routes.len(),
            undo_depth = self.undo_depth_before,
            "captured undo snapshot"
        );
    }

    /// Roll the host back to the snapshot. Returns false without a valid
    /// snapshot; invalidates the record on success.
    pub fn restore(&mut self, host: &mut dyn HostSession) -> bool {
        if !self.valid {
            return false;
        }

        // Pop native undo entries the script created, never past empty.
        for _ in 0..self.native_undo_count {
            if host.undo_depth() > 0 {
                host.undo(1);
            }
        }

        // Put drifted control values back, only for controls that still exist.
        for (&id, &value) in &self.controls {
            match host.control_value(id) {
                Some(current) if current != value => host.set_control_value(id, value),
                _ => {}
            }
        }

        // Routes added since the snapshot get removed.
        let added: Vec<RouteId> = host
            .route_ids()
            .into_iter()
            .filter(|id| !self.routes.contains(id))
            .collect();
        if !added.is_empty() {
            host.remove_routes(&added);
        }

        self.clear();
        true
    }

    pub fn clear(&mut self) {
        self.valid = false;
        self.controls.clear();
        self.routes.clear();
        self.undo_depth_before = 0;
        self.native_undo_count = 0;
        self.description.clear();
    }

    /// Re-align with the host after its undo history changed externally.
    /// When the user undid entries themselves the observed depth drops below
    /// what the record expects; clamp `native_undo_count` so `restore` does
    /// not pop entries that are already gone.
    pub fn reconcile(&mut self, host: &dyn HostSession) {
        if !self.valid {
            return;
        }
        let current = host.undo_depth();
        let expected = self.undo_depth_before + self.native_undo_count;
        if current < expected {
            let already_undone = expected - current;
            self.native_undo_count = self.native_undo_count.saturating_sub(already_undone);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::host::{ControlId, RouteId};

    #[test]
    fn test_restore_without_snapshot_fails() {
        let mut host = MockHost::default();
        let mut record = UndoRecord::new();
        assert!(!record.restore(&mut host));
    }

    #[test]
    fn test_snapshot_then_restore_is_noop() {
        let mut host = MockHost::with_controls(&[(1, 0.5), (2, -3.0)]);
        host.routes.insert(RouteId(10));

        let mut record = UndoRecord::new();
        record.snapshot(&host);
        assert!(record.valid());

        assert!(record.restore(&mut host));
        assert_eq!(host.control_value(ControlId(1)), Some(0.5));
        assert_eq!(host.control_value(ControlId(2)), Some(-3.0));
        assert_eq!(host.route_ids(), vec![RouteId(10)]);
        assert!(!record.valid());
    }

    #[test]
    fn test_restore_reverts_drifted_controls_and_added_routes() {
        let mut host = MockHost::with_controls(&[(1, 0.5)]);
        host.routes.insert(RouteId(10));

        let mut record = UndoRecord::new();
        record.snapshot(&host);

        host.set_control_value(ControlId(1), 0.9);
        host.routes.insert(RouteId(11));

        assert!(record.restore(&mut host));
        assert_eq!(host.control_value(ControlId(1)), Some(0.5));
        assert!(!host.routes.contains(&RouteId(11)));
        assert!(host.routes.contains(&RouteId(10)));
    }

    #[test]
    fn test_restore_skips_controls_that_no_longer_exist() {
        let mut host = MockHost::with_controls(&[(1, 0.5), (2, 1.0)]);
        let mut record = UndoRecord::new();
        record.snapshot(&host);

        host.controls.remove(&ControlId(2));
        host.set_control_value(ControlId(1), 0.0);

        assert!(record.restore(&mut host));
        assert_eq!(host.control_value(ControlId(1)), Some(0.5));
        assert_eq!(host.control_value(ControlId(2)), None);
    }

    #[test]
    fn test_restore_pops_native_entries() {
        let mut host = MockHost::with_controls(&[(1, 0.0)]);
        let mut record = UndoRecord::new();
        record.snapshot(&host);

        // Script raises the control twice through the native undo machinery.
        host.set_control_value(ControlId(1), 1.0);
        host.push_undo_entry(|h| h.set_control_value(ControlId(1), 0.0));
        host.set_control_value(ControlId(1), 2.0);
        host.push_undo_entry(|h| h.set_control_value(ControlId(1), 1.0));
        record.native_undo_count = 2;

        assert!(record.restore(&mut host));
        assert_eq!(host.control_value(ControlId(1)), Some(0.0));
        assert_eq!(host.undo_depth(), 0);
    }

    #[test]
    fn test_restore_never_pops_past_empty_stack() {
        let mut host = MockHost::with_controls(&[(1, 0.0)]);
        let mut record = UndoRecord::new();
        record.snapshot(&host);
        record.native_undo_count = 5;

        assert!(record.restore(&mut host));
        assert_eq!(host.undo_depth(), 0);
    }

    #[test]
    fn test_reconcile_clamps_after_external_undo() {
        let mut host = MockHost::with_controls(&[(1, 0.0)]);
        host.push_undo_entry(|_| {});
        let mut record = UndoRecord::new();
        record.snapshot(&host);
        assert_eq!(record.undo_depth_before(), 1);

        host.push_undo_entry(|_| {});
        host.push_undo_entry(|_| {});
        record.native_undo_count = 2;

        // User undoes one entry by hand.
        host.undo(1);
        record.reconcile(&host);
        assert_eq!(record.native_undo_count, 1);

        // And then everything, past the baseline.
        host.undo(2);
        record.reconcile(&host);
        assert_eq!(record.native_undo_count, 0);
    }

    #[test]
    fn test_new_snapshot_replaces_previous() {
        let mut host = MockHost::with_controls(&[(1, 0.5)]);
        let mut record = UndoRecord::new();
        record.snapshot(&host);
        record.native_undo_count = 3;

        host.set_control_value(ControlId(1), 0.7);
        record.snapshot(&host);
        assert_eq!(record.native_undo_count, 0);

        assert!(record.restore(&mut host));
        assert_eq!(host.control_value(ControlId(1)), Some(0.7));
    }
}
