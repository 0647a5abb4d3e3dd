//! Host session surface
//!
//! Everything the orchestrator needs from the audio host lives behind
//! [`HostSession`]: control values, top-level routes, the host's own linear
//! undo stack, transaction open/abort, automation state, script execution,
//! and two opaque context strings handed to the model. The real binding is
//! supplied by the embedding application; tests use an in-memory host.

/// Stable identifier of one automatable control
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControlId(pub u64);

/// Stable identifier of one top-level route (track or bus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(pub u64);

/// The host-side collaborator surface.
///
/// Script execution is opaque: the host owns the scripting engine, runs the
/// text it is given, routes print output to the sink, and reports failure as
/// a message. Everything else exists so the transaction guard can snapshot
/// and roll back around that call.
pub trait HostSession {
    /// All automatable control identifiers currently registered
    fn control_ids(&self) -> Vec<ControlId>;

    /// Current value of one control, or `None` if it no longer exists
    fn control_value(&self, id: ControlId) -> Option<f64>;

    /// Set one control's value. Unknown identifiers are ignored.
    fn set_control_value(&mut self, id: ControlId, value: f64);

    /// All top-level route identifiers
    fn route_ids(&self) -> Vec<RouteId>;

    /// Remove the given routes. Unknown identifiers are ignored.
    fn remove_routes(&mut self, ids: &[RouteId]);

    /// Depth of the host's native undo stack
    fn undo_depth(&self) -> u32;

    /// Pop `n` entries off the native undo stack, applying each
    fn undo(&mut self, n: u32);

    /// Open a host transaction
    fn begin_transaction(&mut self, name: &str);

    /// Abort the open host transaction, if any. Idempotent.
    fn abort_transaction(&mut self);

    /// Controls that currently carry automation data
    fn automated_controls(&self) -> Vec<ControlId>;

    /// Put one control's automation into live playback
    fn set_automation_live(&mut self, id: ControlId);

    /// Run one script, feeding print output to `on_output`. A failure
    /// message comes back as `Err`; partial mutations may have happened.
    fn run_script(
        &mut self,
        script: &str,
        on_output: &mut dyn FnMut(&str),
    ) -> std::result::Result<(), String>;

    /// Human/model-readable description of the current session state
    fn snapshot_text(&self) -> String;

    /// Catalog of actions and resources available to generated scripts
    fn action_catalog(&self) -> String;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet, VecDeque};

    type Effect = Box<dyn FnOnce(&mut MockHost) + Send>;

    /// One canned reaction to a `run_script` call
    pub struct ScriptBehavior {
        pub output: Vec<&'static str>,
        pub effect: Option<Effect>,
        pub result: std::result::Result<(), String>,
    }

    impl ScriptBehavior {
        pub fn ok() -> Self {
            Self {
                output: Vec::new(),
                effect: None,
                result: Ok(()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                output: Vec::new(),
                effect: None,
                result: Err(message.to_string()),
            }
        }

        pub fn printing(lines: Vec<&'static str>) -> Self {
            Self {
                output: lines,
                effect: None,
                result: Ok(()),
            }
        }

        pub fn mutating(effect: impl FnOnce(&mut MockHost) + Send + 'static) -> Self {
            Self {
                output: Vec::new(),
                effect: Some(Box::new(effect)),
                result: Ok(()),
            }
        }
    }

    /// In-memory host: controls, routes, a native undo stack of closures,
    /// and a queue of scripted `run_script` behaviors.
    #[derive(Default)]
    pub struct MockHost {
        pub controls: BTreeMap<ControlId, f64>,
        pub routes: BTreeSet<RouteId>,
        pub undo_entries: Vec<Effect>,
        pub txn_open: bool,
        pub automated: BTreeSet<ControlId>,
        pub live: BTreeSet<ControlId>,
        pub behaviors: VecDeque<ScriptBehavior>,
        pub scripts_run: Vec<String>,
        pub snapshot: String,
        pub catalog: String,
    }

    impl MockHost {
        pub fn with_controls(values: &[(u64, f64)]) -> Self {
            let mut host = Self::default();
            for &(id, value) in values {
                host.controls.insert(ControlId(id), value);
            }
            host
        }

        pub fn push_undo_entry(&mut self, effect: impl FnOnce(&mut MockHost) + Send + 'static) {
            self.undo_entries.push(Box::new(effect));
        }

        pub fn script(&mut self, behavior: ScriptBehavior) {
            self.behaviors.push_back(behavior);
        }
    }

    impl HostSession for MockHost {
        fn control_ids(&self) -> Vec<ControlId> {
            self.controls.keys().copied().collect()
        }

        fn control_value(&self, id: ControlId) -> Option<f64> {
            self.controls.get(&id).copied()
        }

        fn set_control_value(&mut self, id: ControlId, value: f64) {
            if let Some(slot) = self.controls.get_mut(&id) {
                *slot = value;
            }
        }

        fn route_ids(&self) -> Vec<RouteId> {
            self.routes.iter().copied().collect()
        }

        fn remove_routes(&mut self, ids: &[RouteId]) {
            for id in ids {
                self.routes.remove(id);
            }
        }

        fn undo_depth(&self) -> u32 {
            self.undo_entries.len() as u32
        }

        fn undo(&mut self, n: u32) {
            for _ in 0..n {
                if let Some(effect) = self.undo_entries.pop() {
                    effect(self);
                }
            }
        }

        fn begin_transaction(&mut self, _name: &str) {
            self.txn_open = true;
        }

        fn abort_transaction(&mut self) {
            self.txn_open = false;
        }

        fn automated_controls(&self) -> Vec<ControlId> {
            self.automated.iter().copied().collect()
        }

        fn set_automation_live(&mut self, id: ControlId) {
            self.live.insert(id);
        }

        fn run_script(
            &mut self,
            script: &str,
            on_output: &mut dyn FnMut(&str),
        ) -> std::result::Result<(), String> {
            self.scripts_run.push(script.to_string());
            let behavior = match self.behaviors.pop_front() {
                Some(b) => b,
                None => return Err("no scripted behavior queued".to_string()),
            };
            for &line in &behavior.output {
                on_output(line);
            }
            if let Some(effect) = behavior.effect {
                effect(self);
            }
            behavior.result
        }

        fn snapshot_text(&self) -> String {
            if self.snapshot.is_empty() {
                format!("{} controls, {} routes", self.controls.len(), self.routes.len())
            } else {
                self.snapshot.clone()
            }
        }

        fn action_catalog(&self) -> String {
            self.catalog.clone()
        }
    }
}
