//! Append-only record of every scenario enumerated, for the listing layer.

use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::scenario::runner::Scenario;

/// Ordered collector of enumerated scenarios.
///
/// The tree never reads it back; it exists so the listing layer can discover
/// what a set of scenario definitions produced.
#[derive(Default)]
pub struct ScenarioRegistry {
    seen: Mutex<Vec<Scenario>>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by the whole process, used by
    /// [`Scenarios::for_each_scenario`](crate::scenario::Scenarios::for_each_scenario).
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<ScenarioRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    pub fn record(&self, scenario: Scenario) {
        self.seen.lock().push(scenario);
    }

    /// Copy of everything recorded so far, in recording order.
    pub fn snapshot(&self) -> Vec<Scenario> {
        self.seen.lock().clone()
    }

    /// Take everything recorded so far, leaving the registry empty.
    pub fn drain(&self) -> Vec<Scenario> {
        std::mem::take(&mut *self.seen.lock())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    /// Names of everything recorded so far, in recording order.
    pub fn names(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }
}

impl std::fmt::Debug for ScenarioRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRegistry")
            .field("scenarios", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use crate::scenario::{Scenarios, mutator};

    fn base() -> Scenarios {
        Scenarios::from_project(|| Ok(Project::new("demo", "1.0.0")))
    }

    #[test]
    fn records_in_enumeration_order() {
        let registry = ScenarioRegistry::new();
        base()
            .expand([("b", mutator(|_| Ok(()))), ("a", mutator(|_| Ok(())))])
            .for_each_scenario_in(&registry, |_| {});
        assert_eq!(registry.names(), vec!["b", "a"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn drain_empties_the_registry() {
        let registry = ScenarioRegistry::new();
        base().for_each_scenario_in(&registry, |_| {});
        let drained = registry.drain();
        assert_eq!(drained.len(), 1);
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn repeated_enumeration_appends() {
        let registry = ScenarioRegistry::new();
        let tree = base().map("x", |_| Ok(()));
        tree.for_each_scenario_in(&registry, |_| {});
        tree.for_each_scenario_in(&registry, |_| {});
        assert_eq!(registry.names(), vec!["x", "x"]);
    }
}
