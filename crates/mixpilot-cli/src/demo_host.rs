//! Dry-run host session
//!
//! A stand-in for a real audio application binding: a small in-memory
//! session with named tracks and controls. Generated scripts are logged and
//! acknowledged, never interpreted; the scripting engine belongs to the real
//! host. Useful for exercising the request/workflow machinery end to end.

use std::collections::BTreeMap;

use mixpilot_agent::{ControlId, HostSession, RouteId};

struct Control {
    name: String,
    value: f64,
    automated: bool,
    live: bool,
}

struct Route {
    name: String,
}

pub struct DemoHost {
    controls: BTreeMap<ControlId, Control>,
    routes: BTreeMap<RouteId, Route>,
    undo_stack: Vec<String>,
    txn_open: bool,
}

impl DemoHost {
    /// A small fixed session: two tracks with gain and pan controls
    pub fn new() -> Self {
        let mut host = Self {
            controls: BTreeMap::new(),
            routes: BTreeMap::new(),
            undo_stack: Vec::new(),
            txn_open: false,
        };
        host.add_route(1, "Vocals");
        host.add_route(2, "Drums");
        host
    }

    fn add_route(&mut self, id: u64, name: &str) {
        self.routes.insert(RouteId(id), Route { name: name.to_string() });
        self.controls.insert(
            ControlId(id * 10),
            Control {
                name: format!("{name}/gain"),
                value: 1.0,
                automated: false,
                live: false,
            },
        );
        self.controls.insert(
            ControlId(id * 10 + 1),
            Control {
                name: format!("{name}/pan"),
                value: 0.5,
                automated: false,
                live: false,
            },
        );
    }
}

impl Default for DemoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSession for DemoHost {
    fn control_ids(&self) -> Vec<ControlId> {
        self.controls.keys().copied().collect()
    }

    fn control_value(&self, id: ControlId) -> Option<f64> {
        self.controls.get(&id).map(|c| c.value)
    }

    fn set_control_value(&mut self, id: ControlId, value: f64) {
        if let Some(control) = self.controls.get_mut(&id) {
            control.value = value;
        }
    }

    fn route_ids(&self) -> Vec<RouteId> {
        self.routes.keys().copied().collect()
    }

    fn remove_routes(&mut self, ids: &[RouteId]) {
        for id in ids {
            if let Some(route) = self.routes.remove(id) {
                tracing::info!(route = route.name, "removed route");
            }
        }
    }

    fn undo_depth(&self) -> u32 {
        self.undo_stack.len() as u32
    }

    fn undo(&mut self, n: u32) {
        for _ in 0..n {
            if let Some(entry) = self.undo_stack.pop() {
                tracing::info!(entry, "popped undo entry");
            }
        }
    }

    fn begin_transaction(&mut self, name: &str) {
        tracing::debug!(name, "transaction opened");
        self.txn_open = true;
    }

    fn abort_transaction(&mut self) {
        if self.txn_open {
            tracing::debug!("transaction aborted");
            self.txn_open = false;
        }
    }

    fn automated_controls(&self) -> Vec<ControlId> {
        self.controls
            .iter()
            .filter(|(_, c)| c.automated)
            .map(|(&id, _)| id)
            .collect()
    }

    fn set_automation_live(&mut self, id: ControlId) {
        if let Some(control) = self.controls.get_mut(&id) {
            control.live = true;
        }
    }

    fn run_script(
        &mut self,
        script: &str,
        on_output: &mut dyn FnMut(&str),
    ) -> Result<(), String> {
        tracing::info!(lines = script.lines().count(), "dry run, script not interpreted");
        on_output("dry run: script accepted but not executed");
        self.undo_stack.push("dry-run step".to_string());
        Ok(())
    }

    fn snapshot_text(&self) -> String {
        let mut out = String::new();
        for (id, route) in &self.routes {
            out.push_str(&format!("Track {}: {}\n", id.0, route.name));
        }
        for (id, control) in &self.controls {
            let automation = match (control.automated, control.live) {
                (true, true) => " [automation: live]",
                (true, false) => " [automation: written]",
                _ => "",
            };
            out.push_str(&format!(
                "  control {} {} = {:.3}{}\n",
                id.0, control.name, control.value, automation
            ));
        }
        out
    }

    fn action_catalog(&self) -> String {
        "Available API (dry run): Session, Track:gain(), Track:pan(), \
         Session:begin_reversible_command(), Session:commit_reversible_command()"
            .to_string()
    }
}
