//! The scenario tree: a persistent, immutable chain of named transformations.
//!
//! A tree is either a *root* (one project factory) or a *derived* node (an
//! ordered set of named variants plus a shared handle to its parent). Every
//! builder method returns a new tree; the receiver is never modified, so one
//! base can be shared by any number of derived branches.
//!
//! Nothing here performs I/O. Factories and mutators only run when a
//! [`Scenario`] produced by enumeration is prepared.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::errors::{Result, ScenarioError};
use crate::project::{Project, ProjectKind};
use crate::scenario::registry::ScenarioRegistry;
use crate::scenario::runner::{ROOT_SCENARIO_NAME, Scenario};

/// Produces the base project for a scenario.
pub type ProjectFactory = Arc<dyn Fn() -> Result<Project> + Send + Sync>;

/// Adjusts a project in place to realize one variation.
pub type Mutator = Arc<dyn Fn(&mut Project) -> Result<()> + Send + Sync>;

/// Wrap a closure or function as a [`Mutator`].
pub fn mutator<F>(f: F) -> Mutator
where
    F: Fn(&mut Project) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Whether a variant takes part in enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    Active,
    Skipped,
}

#[derive(Clone)]
struct Variant {
    status: VariantStatus,
    steps: Vec<Mutator>,
}

impl Variant {
    fn active(step: Mutator) -> Self {
        Self {
            status: VariantStatus::Active,
            steps: vec![step],
        }
    }
}

/// Variants of one derived node, in insertion order, names unique.
#[derive(Clone, Default)]
struct VariantSet {
    entries: Vec<(String, Variant)>,
}

impl VariantSet {
    /// Insert or replace; a replaced entry keeps its original position.
    fn insert(&mut self, name: String, variant: Variant) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = variant,
            None => self.entries.push((name, variant)),
        }
    }

    fn get(&self, name: &str) -> Option<&Variant> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }
}

enum Node {
    Root {
        factory: ProjectFactory,
    },
    Derived {
        parent: Scenarios,
        variants: VariantSet,
    },
}

/// One leaf reached while walking the tree.
struct Resolved {
    name: Option<String>,
    factory: ProjectFactory,
    steps: Vec<Mutator>,
}

/// Builder for a matrix of scenarios.
///
/// Not the plural of [`Scenario`]: a `Scenarios` value describes how to
/// derive scenarios, and [`Scenarios::for_each_scenario`] turns it into them.
///
/// ```rust,no_run
/// use scenario_tester::prelude::*;
///
/// let scenarios = Scenarios::from_dir("tests/fixtures/app", ProjectKind::App).expand([
///     ("hello1", mutator(|p: &mut Project| p.write_file("flavor.txt", "one"))),
///     ("hello2", mutator(|p: &mut Project| p.write_file("flavor.txt", "two"))),
/// ]);
///
/// scenarios.for_each_scenario(|scenario| {
///     let app = scenario.prepare(None).expect("prepare");
///     let out = app.execute("cat flavor.txt").expect("execute");
///     assert_eq!(out.exit_code, 0);
/// });
/// ```
#[derive(Clone)]
pub struct Scenarios {
    node: Arc<Node>,
}

impl Scenarios {
    fn root(factory: ProjectFactory) -> Self {
        Self {
            node: Arc::new(Node::Root { factory }),
        }
    }

    fn derived(parent: Self, variants: VariantSet) -> Self {
        Self {
            node: Arc::new(Node::Derived { parent, variants }),
        }
    }

    /// Base scenario read from a fixture directory at prepare time.
    pub fn from_dir(path: impl Into<PathBuf>, kind: ProjectKind) -> Self {
        let path = path.into();
        Self::root(Arc::new(move || Project::from_dir(&path, kind)))
    }

    /// Base scenario produced by `factory` at prepare time.
    pub fn from_project<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Project> + Send + Sync + 'static,
    {
        Self::root(Arc::new(factory))
    }

    /// Derive one active variant per entry, each with its single mutator.
    ///
    /// Names compose with ancestor names at enumeration time
    /// (`<parent>-<variant>`), so they only need to be unique within this
    /// call; a repeated name keeps its first position and its last mutator.
    #[must_use]
    pub fn expand<I, K>(&self, variants: I) -> Self
    where
        I: IntoIterator<Item = (K, Mutator)>,
        K: Into<String>,
    {
        let mut set = VariantSet::default();
        for (name, step) in variants {
            set.insert(name.into(), Variant::active(step));
        }
        Self::derived(self.clone(), set)
    }

    /// Exclude a variant of this node from enumeration.
    ///
    /// The entry is kept (marked skipped), so skipping twice is harmless.
    pub fn skip(&self, variant: &str) -> Result<Self> {
        let (parent, variants) = self.derived_parts("skip", variant)?;
        let mut next = variants.clone();
        for (name, entry) in &mut next.entries {
            if name == variant {
                entry.status = VariantStatus::Skipped;
            }
        }
        Ok(Self::derived(parent.clone(), next))
    }

    /// Keep only one variant of this node, with its status unchanged.
    pub fn only(&self, variant: &str) -> Result<Self> {
        let (parent, variants) = self.derived_parts("only", variant)?;
        let mut next = VariantSet::default();
        if let Some(entry) = variants.get(variant) {
            next.insert(variant.to_string(), entry.clone());
        }
        Ok(Self::derived(parent.clone(), next))
    }

    /// Append `step` to every variant, suffixing each name with `-<name>`.
    ///
    /// On a root tree this creates a single variant called exactly `name`.
    #[must_use]
    pub fn map<F>(&self, name: &str, step: F) -> Self
    where
        F: Fn(&mut Project) -> Result<()> + Send + Sync + 'static,
    {
        let step: Mutator = Arc::new(step);
        match &*self.node {
            Node::Root { .. } => {
                let mut set = VariantSet::default();
                set.insert(name.to_string(), Variant::active(step));
                Self::derived(self.clone(), set)
            }
            Node::Derived { parent, variants } => {
                let mut set = VariantSet::default();
                for (existing, variant) in &variants.entries {
                    let mut steps = variant.steps.clone();
                    steps.push(Arc::clone(&step));
                    set.insert(
                        format!("{existing}-{name}"),
                        Variant {
                            status: variant.status,
                            steps,
                        },
                    );
                }
                Self::derived(parent.clone(), set)
            }
        }
    }

    /// Enumerate every active scenario, recording each in the process-wide
    /// registry before handing it to `define`.
    pub fn for_each_scenario<F>(&self, define: F)
    where
        F: FnMut(Scenario),
    {
        self.for_each_scenario_in(ScenarioRegistry::global(), define);
    }

    /// Like [`Scenarios::for_each_scenario`], recording into `registry`.
    ///
    /// Order is the parent's order crossed with each node's insertion order.
    pub fn for_each_scenario_in<F>(&self, registry: &ScenarioRegistry, mut define: F)
    where
        F: FnMut(Scenario),
    {
        for leaf in self.resolve() {
            let name = leaf.name.unwrap_or_else(|| ROOT_SCENARIO_NAME.to_string());
            let scenario = Scenario::new(name, leaf.factory, leaf.steps);
            registry.record(scenario.clone());
            define(scenario);
        }
    }

    /// Names enumeration would produce, without constructing scenarios.
    pub fn scenario_names(&self) -> Vec<String> {
        self.resolve()
            .into_iter()
            .map(|leaf| leaf.name.unwrap_or_else(|| ROOT_SCENARIO_NAME.to_string()))
            .collect()
    }

    pub fn is_root(&self) -> bool {
        matches!(&*self.node, Node::Root { .. })
    }

    /// Variant names of this node (skipped ones included), in insertion order.
    pub fn variant_names(&self) -> Vec<String> {
        match &*self.node {
            Node::Root { .. } => Vec::new(),
            Node::Derived { variants, .. } => variants.names(),
        }
    }

    pub fn variant_status(&self, variant: &str) -> Option<VariantStatus> {
        match &*self.node {
            Node::Root { .. } => None,
            Node::Derived { variants, .. } => variants.get(variant).map(|v| v.status),
        }
    }

    fn derived_parts(
        &self,
        operation: &'static str,
        variant: &str,
    ) -> Result<(&Self, &VariantSet)> {
        match &*self.node {
            Node::Root { .. } => Err(ScenarioError::InvalidOperation {
                operation,
                variant: variant.to_string(),
            }),
            Node::Derived { variants, .. } if variants.get(variant).is_none() => {
                Err(ScenarioError::UnknownVariant {
                    operation,
                    variant: variant.to_string(),
                    known: variants.names(),
                })
            }
            Node::Derived { parent, variants } => Ok((parent, variants)),
        }
    }

    fn resolve(&self) -> Vec<Resolved> {
        match &*self.node {
            Node::Root { factory } => vec![Resolved {
                name: None,
                factory: Arc::clone(factory),
                steps: Vec::new(),
            }],
            Node::Derived { parent, variants } => {
                let mut out = Vec::new();
                for base in parent.resolve() {
                    for (variant_name, variant) in &variants.entries {
                        if variant.status == VariantStatus::Skipped {
                            continue;
                        }
                        let name = match base.name.as_deref() {
                            Some(prefix) if !prefix.is_empty() => {
                                format!("{prefix}-{variant_name}")
                            }
                            _ => variant_name.clone(),
                        };
                        let mut steps = base.steps.clone();
                        steps.extend(variant.steps.iter().cloned());
                        out.push(Resolved {
                            name: Some(name),
                            factory: Arc::clone(&base.factory),
                            steps,
                        });
                    }
                }
                out
            }
        }
    }
}

impl fmt::Debug for Scenarios {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.node {
            Node::Root { .. } => f.write_str("Scenarios::Root"),
            Node::Derived { parent, variants } => {
                let mut list = f.debug_map();
                for (name, variant) in &variants.entries {
                    list.entry(name, &variant.status);
                }
                list.finish()?;
                write!(f, " <- {parent:?}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use proptest::prelude::*;

    fn base() -> Scenarios {
        Scenarios::from_project(|| Ok(Project::new("demo", "1.0.0")))
    }

    fn noop() -> Mutator {
        mutator(|_| Ok(()))
    }

    /// Mutator appending `tag` to `trace.txt`, so step order is observable.
    fn tag(tag: &'static str) -> Mutator {
        mutator(move |p: &mut Project| {
            let mut trace = p.file("trace.txt").unwrap_or_default().to_string();
            trace.push_str(tag);
            p.write_file("trace.txt", trace)
        })
    }

    fn names_of(tree: &Scenarios) -> Vec<String> {
        let registry = ScenarioRegistry::new();
        let mut names = Vec::new();
        tree.for_each_scenario_in(&registry, |s| names.push(s.name().to_string()));
        names
    }

    #[test]
    fn root_enumerates_single_sentinel_scenario() {
        assert_eq!(names_of(&base()), vec![ROOT_SCENARIO_NAME]);
        assert!(base().is_root());
    }

    #[test]
    fn expand_off_root_uses_bare_names_in_order() {
        let tree = base().expand([("hello1", noop()), ("hello2", noop())]);
        assert_eq!(names_of(&tree), vec!["hello1", "hello2"]);
        assert!(!tree.is_root());
    }

    #[test]
    fn nested_expand_crosses_names() {
        let tree = base()
            .expand([("a", noop()), ("b", noop())])
            .expand([("x", noop()), ("y", noop())]);
        assert_eq!(names_of(&tree), vec!["a-x", "a-y", "b-x", "b-y"]);
    }

    #[test]
    fn duplicate_names_in_one_expand_keep_first_position() {
        let tree = base().expand([("a", tag("1")), ("b", noop()), ("a", tag("2"))]);
        assert_eq!(tree.variant_names(), vec!["a", "b"]);
    }

    #[test]
    fn map_on_root_creates_single_variant() {
        let tree = base().map("ts", |_| Ok(()));
        assert_eq!(names_of(&tree), vec!["ts"]);
    }

    #[test]
    fn map_suffixes_every_variant_and_appends_step() {
        let tree = base()
            .expand([("a", tag("a")), ("b", tag("b"))])
            .map("m", |p: &mut Project| {
                let mut trace = p.file("trace.txt").unwrap_or_default().to_string();
                trace.push('m');
                p.write_file("trace.txt", trace)
            });
        assert_eq!(names_of(&tree), vec!["a-m", "b-m"]);

        let registry = ScenarioRegistry::new();
        let mut traces = Vec::new();
        tree.for_each_scenario_in(&registry, |s| {
            traces.push(s.build_project().unwrap().file("trace.txt").map(str::to_string));
        });
        assert_eq!(
            traces,
            vec![Some("am".to_string()), Some("bm".to_string())]
        );
    }

    #[test]
    fn ancestor_steps_run_before_leaf_steps() {
        let tree = base()
            .expand([("outer", tag("1"))])
            .expand([("inner", tag("2"))])
            .map("last", |p: &mut Project| {
                let mut trace = p.file("trace.txt").unwrap_or_default().to_string();
                trace.push('3');
                p.write_file("trace.txt", trace)
            });
        let registry = ScenarioRegistry::new();
        let mut seen = Vec::new();
        tree.for_each_scenario_in(&registry, |s| {
            seen.push((
                s.name().to_string(),
                s.step_count(),
                s.build_project().unwrap().file("trace.txt").map(str::to_string),
            ));
        });
        assert_eq!(
            seen,
            vec![("outer-inner-last".to_string(), 3, Some("123".to_string()))]
        );
    }

    #[test]
    fn skip_removes_only_that_variant() {
        let tree = base().expand([("a", noop()), ("skipMe", noop()), ("b", noop())]);
        let skipped = tree.skip("skipMe").unwrap();
        assert_eq!(names_of(&skipped), vec!["a", "b"]);
        assert_eq!(
            skipped.variant_status("skipMe"),
            Some(VariantStatus::Skipped)
        );
        assert_eq!(skipped.variant_names(), vec!["a", "skipMe", "b"]);
    }

    #[test]
    fn skip_twice_is_idempotent() {
        let tree = base().expand([("a", noop()), ("skipMe", noop())]);
        let once = tree.skip("skipMe").unwrap();
        let twice = once.skip("skipMe").unwrap();
        assert_eq!(names_of(&once), names_of(&twice));
    }

    #[test]
    fn skip_leaves_receiver_untouched() {
        let tree = base().expand([("a", noop()), ("b", noop())]);
        let _ = tree.skip("a").unwrap();
        assert_eq!(names_of(&tree), vec!["a", "b"]);
        assert_eq!(tree.variant_status("a"), Some(VariantStatus::Active));
    }

    #[test]
    fn only_selects_one_variant_with_its_chain() {
        let tree = base().expand([("a", tag("a")), ("b", tag("b"))]);
        let only = tree.only("b").unwrap();
        let registry = ScenarioRegistry::new();
        let mut seen = Vec::new();
        only.for_each_scenario_in(&registry, |s| {
            seen.push((
                s.name().to_string(),
                s.build_project().unwrap().file("trace.txt").map(str::to_string),
            ));
        });
        assert_eq!(seen, vec![("b".to_string(), Some("b".to_string()))]);
    }

    #[test]
    fn only_after_skip_keeps_variant_skipped() {
        let tree = base().expand([("a", noop()), ("b", noop())]);
        let only = tree.skip("a").unwrap().only("a").unwrap();
        assert!(names_of(&only).is_empty());
        assert_eq!(only.variant_status("a"), Some(VariantStatus::Skipped));
    }

    #[test]
    fn skip_and_only_on_root_are_invalid() {
        for result in [base().skip("x"), base().only("x")] {
            let err = result.unwrap_err();
            assert!(matches!(err, ScenarioError::InvalidOperation { .. }));
            assert_eq!(err.code(), "ST-2001");
        }
    }

    #[test]
    fn unknown_variant_error_lists_known_names() {
        let tree = base().expand([("hello1", noop()), ("hello2", noop())]);
        for result in [tree.skip("nope"), tree.only("nope")] {
            let err = result.unwrap_err();
            assert!(matches!(err, ScenarioError::UnknownVariant { .. }));
            let msg = err.to_string();
            assert!(msg.contains("hello1") && msg.contains("hello2"), "{msg}");
        }
    }

    #[test]
    fn skip_then_map_preserves_skip() {
        let tree = base()
            .expand([("a", noop()), ("b", noop())])
            .skip("a")
            .unwrap()
            .map("m", |_| Ok(()));
        assert_eq!(names_of(&tree), vec!["b-m"]);
        assert_eq!(tree.variant_status("a-m"), Some(VariantStatus::Skipped));
    }

    #[test]
    fn enumeration_does_not_run_callbacks() {
        let calls = Arc::new(Mutex::new(0_usize));
        let factory_calls = Arc::clone(&calls);
        let step_calls = Arc::clone(&calls);
        let tree = Scenarios::from_project(move || {
            *factory_calls.lock() += 1;
            Ok(Project::new("demo", "1.0.0"))
        })
        .map("m", move |_| {
            *step_calls.lock() += 1;
            Ok(())
        });
        assert_eq!(names_of(&tree).len(), 1);
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn shared_base_supports_independent_branches() {
        let shared = base().expand([("a", noop()), ("b", noop())]);
        let left = shared.map("l", |_| Ok(()));
        let right = shared.skip("b").unwrap();
        assert_eq!(names_of(&left), vec!["a-l", "b-l"]);
        assert_eq!(names_of(&right), vec!["a"]);
        assert_eq!(names_of(&shared), vec!["a", "b"]);
    }

    #[test]
    fn scenario_names_matches_enumeration() {
        let tree = base()
            .expand([("a", noop()), ("b", noop())])
            .expand([("x", noop())]);
        assert_eq!(tree.scenario_names(), names_of(&tree));
    }

    #[test]
    fn trees_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Scenarios>();
    }

    fn unique_names() -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set("[a-z][a-z0-9]{0,6}", 1..8)
            .prop_map(|set| set.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn expand_yields_one_scenario_per_entry(names in unique_names()) {
            let tree = base().expand(names.iter().map(|n| (n.clone(), noop())));
            prop_assert_eq!(names_of(&tree), names);
        }

        #[test]
        fn map_suffixes_all_names(names in unique_names(), suffix in "[a-z]{1,5}") {
            let tree = base()
                .expand(names.iter().map(|n| (n.clone(), noop())))
                .map(&suffix, |_| Ok(()));
            let expected: Vec<String> = names.iter().map(|n| format!("{n}-{suffix}")).collect();
            prop_assert_eq!(names_of(&tree), expected);
        }

        #[test]
        fn skip_removes_exactly_one(names in unique_names(), pick in any::<prop::sample::Index>()) {
            let victim = pick.get(&names).clone();
            let tree = base().expand(names.iter().map(|n| (n.clone(), noop())));
            let skipped = tree.skip(&victim).unwrap();
            let expected: Vec<String> = names.iter().filter(|n| **n != victim).cloned().collect();
            prop_assert_eq!(names_of(&skipped), expected.clone());
            prop_assert_eq!(names_of(&skipped.skip(&victim).unwrap()), expected);
        }

        #[test]
        fn only_yields_exactly_the_selected(names in unique_names(), pick in any::<prop::sample::Index>()) {
            let chosen = pick.get(&names).clone();
            let tree = base().expand(names.iter().map(|n| (n.clone(), noop())));
            prop_assert_eq!(names_of(&tree.only(&chosen).unwrap()), vec![chosen]);
        }
    }
}
