//! # Controller classes
//!
//! A [`ControllerClass`] holds everything shared by the instances of one
//! controller: the action table, the before/after hook lists, the layout and
//! the class namespace. It is mutable while being configured and frozen
//! behind an `Arc` once instances exist.
//!
//! Registration goes through [`ActionRegistrar`]; per-dispatch queues come
//! from [`ControllerClass::build_queue`].

use crate::{
    error::{ConfigError, DispatchError},
    filter::{HookFilter, Skip},
    namespace::Namespace,
    step::{Phase, QueuedStep, StepFn},
};
use std::collections::{HashMap, HashSet, VecDeque};

/// Which layout `render` wraps views in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Layout {
    /// The configured default layout.
    #[default]
    Default,
    /// A specific layout.
    Named(String),
    /// No layout at all.
    Disabled,
}

/// Per-class dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Layout used when the class does not set one.
    pub default_layout: String,
    /// Turn panics in step bodies into dispatch errors.
    pub catch_panics: bool,
    /// Append every executed step to the response's action history.
    pub record_history: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            default_layout: "application".to_string(),
            catch_panics: true,
            record_history: true,
        }
    }
}

/// A registered before or after hook.
#[derive(Clone, Debug)]
pub struct HookEntry {
    name: Option<String>,
    step: StepFn,
    filter: Option<HookFilter>,
}

impl HookEntry {
    /// Create an entry. The name falls back to the step's declared name.
    pub fn new(name: Option<&str>, step: StepFn, filter: Option<HookFilter>) -> Self {
        let name = name
            .filter(|n| !n.is_empty())
            .or(step.name())
            .map(str::to_owned);
        Self { name, step, filter }
    }

    /// The name used for deduplication and skipping.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The hook body.
    pub fn step(&self) -> &StepFn {
        &self.step
    }

    /// The action filter, if any.
    pub fn filter(&self) -> Option<&HookFilter> {
        self.filter.as_ref()
    }

    /// Whether this hook runs for `action`.
    pub fn admits(&self, action: &str) -> bool {
        self.filter.as_ref().is_none_or(|f| f.admits(action))
    }
}

#[derive(Clone, Debug)]
struct Slot {
    entry: HookEntry,
    removed: bool,
}

/// An ordered hook list with stable positions.
///
/// Skipped hooks are tombstoned rather than removed, so positions of the
/// remaining entries never shift on removal.
#[derive(Clone, Debug, Default)]
pub struct HookList {
    slots: Vec<Slot>,
}

impl HookList {
    /// Live entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &HookEntry> {
        self.slots.iter().filter(|s| !s.removed).map(|s| &s.entry)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entry with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| !s.removed && s.entry.name() == Some(name))
    }

    fn admissible(&self, entry: &HookEntry) -> bool {
        match entry.name() {
            Some(name) if self.contains(name) => {
                tracing::debug!(hook = name, "hook already registered, ignoring");
                false
            }
            _ => true,
        }
    }

    fn push(&mut self, entry: HookEntry) {
        if self.admissible(&entry) {
            self.slots.push(Slot {
                entry,
                removed: false,
            });
        }
    }

    fn prepend(&mut self, entry: HookEntry) {
        if self.admissible(&entry) {
            self.slots.insert(
                0,
                Slot {
                    entry,
                    removed: false,
                },
            );
        }
    }

    fn skip(&mut self, name: &str, skip: &Skip) {
        let Some(position) = self.position(name) else {
            tracing::debug!(hook = name, "skip of unknown hook ignored");
            return;
        };
        let slot = &mut self.slots[position];
        match skip {
            Skip::Always => slot.removed = true,
            Skip::Only(actions) => slot
                .entry
                .filter
                .get_or_insert_with(|| HookFilter {
                    only: None,
                    except: None,
                })
                .exclude(actions),
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
    }
}

/// The static tables shared by every instance of one controller.
#[derive(Clone, Debug)]
pub struct ControllerClass {
    name: String,
    actions: HashMap<String, StepFn>,
    before: HookList,
    after: HookList,
    layout: Layout,
    methods: Namespace,
    options: DispatchOptions,
}

impl ControllerClass {
    /// Create an empty class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: HashMap::new(),
            before: HookList::default(),
            after: HookList::default(),
            layout: Layout::Default,
            methods: Namespace::new(),
            options: DispatchOptions::default(),
        }
    }

    /// Replace the dispatch options.
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the class namespace.
    pub fn with_methods(mut self, methods: Namespace) -> Self {
        self.methods = methods;
        self
    }

    /// Clear actions, hooks and layout. Methods and options are kept.
    pub fn reset(&mut self) {
        self.actions.clear();
        self.before.clear();
        self.after.clear();
        self.layout = Layout::Default;
    }

    /// The controller name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The class namespace consulted first by configuration scripts.
    pub fn methods(&self) -> &Namespace {
        &self.methods
    }

    /// Mutable access to the class namespace.
    pub fn methods_mut(&mut self) -> &mut Namespace {
        &mut self.methods
    }

    /// Dispatch options.
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// The configured layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Set the layout.
    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    /// Resolve a layout to a template path. `None` means no layout.
    pub fn layout_path(&self, layout: &Layout) -> Option<String> {
        match layout {
            Layout::Default => Some(format!("layouts/{}_layout", self.options.default_layout)),
            Layout::Named(name) if !name.is_empty() => Some(format!("layouts/{name}_layout")),
            Layout::Named(_) | Layout::Disabled => None,
        }
    }

    /// Before hooks.
    pub fn before_hooks(&self) -> &HookList {
        &self.before
    }

    /// After hooks.
    pub fn after_hooks(&self) -> &HookList {
        &self.after
    }

    /// The handler registered for action `name`.
    pub fn handler(&self, name: &str) -> Option<&StepFn> {
        self.actions.get(name)
    }

    /// Names of all registered actions, sorted.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether an action of this name is registered.
    pub fn responds_to(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Build the ordered step queue for one dispatch of `action`.
    ///
    /// Before hooks admitted by their filters, then the action, then admitted
    /// after hooks. A hook name already queued earlier in the same call is
    /// skipped, across both lists.
    pub fn build_queue(&self, action: &str) -> Result<VecDeque<QueuedStep>, DispatchError> {
        let handler = self
            .actions
            .get(action)
            .ok_or_else(|| DispatchError::UndefinedAction {
                controller: self.name.clone(),
                action: action.to_string(),
            })?;

        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();

        enqueue(&mut queue, &mut seen, &self.before, action);
        queue.push_back(QueuedStep::new(
            Phase::Action(action.to_string()),
            handler.clone(),
        ));
        enqueue(&mut queue, &mut seen, &self.after, action);

        Ok(queue)
    }
}

fn enqueue<'a>(
    queue: &mut VecDeque<QueuedStep>,
    seen: &mut HashSet<&'a str>,
    hooks: &'a HookList,
    action: &str,
) {
    for entry in hooks.iter().filter(|e| e.admits(action)) {
        if let Some(name) = entry.name() {
            if !seen.insert(name) {
                continue;
            }
        }
        queue.push_back(QueuedStep::new(
            Phase::Hook(entry.name().map(str::to_owned)),
            entry.step.clone(),
        ));
    }
}

/// The registration vocabulary of a controller class.
///
/// Configuration scripts call these through their built-in words
/// (`action`, `before`, `skipBefore`, ...); Rust code can call them directly.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot register actions or hooks",
    label = "missing `ActionRegistrar` implementation",
    note = "`ControllerClass` implements `ActionRegistrar`."
)]
pub trait ActionRegistrar {
    /// Register an action. Without `name` the step's declared name is used.
    fn action(&mut self, name: Option<&str>, step: StepFn) -> Result<(), ConfigError>;

    /// Append a before hook.
    fn before(&mut self, name: Option<&str>, step: StepFn, filter: Option<HookFilter>);

    /// Insert a before hook at the front.
    fn prepend_before(&mut self, name: Option<&str>, step: StepFn, filter: Option<HookFilter>);

    /// Append an after hook.
    fn after(&mut self, name: Option<&str>, step: StepFn, filter: Option<HookFilter>);

    /// Insert an after hook at the front.
    fn prepend_after(&mut self, name: Option<&str>, step: StepFn, filter: Option<HookFilter>);

    /// Remove a before hook, or exclude it from some actions.
    fn skip_before(&mut self, name: &str, skip: Skip);

    /// Remove an after hook, or exclude it from some actions.
    fn skip_after(&mut self, name: &str, skip: Skip);
}

impl ActionRegistrar for ControllerClass {
    fn action(&mut self, name: Option<&str>, step: StepFn) -> Result<(), ConfigError> {
        let name = name
            .filter(|n| !n.is_empty())
            .or(step.name())
            .ok_or(ConfigError::UnnamedAction)?
            .to_owned();
        tracing::trace!(controller = %self.name, action = %name, "action registered");
        self.actions.insert(name, step);
        Ok(())
    }

    fn before(&mut self, name: Option<&str>, step: StepFn, filter: Option<HookFilter>) {
        self.before.push(HookEntry::new(name, step, filter));
    }

    fn prepend_before(&mut self, name: Option<&str>, step: StepFn, filter: Option<HookFilter>) {
        self.before.prepend(HookEntry::new(name, step, filter));
    }

    fn after(&mut self, name: Option<&str>, step: StepFn, filter: Option<HookFilter>) {
        self.after.push(HookEntry::new(name, step, filter));
    }

    fn prepend_after(&mut self, name: Option<&str>, step: StepFn, filter: Option<HookFilter>) {
        self.after.prepend(HookEntry::new(name, step, filter));
    }

    fn skip_before(&mut self, name: &str, skip: Skip) {
        self.before.skip(name, &skip);
    }

    fn skip_after(&mut self, name: &str, skip: Skip) {
        self.after.skip(name, &skip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> StepFn {
        StepFn::named(name.to_string(), |_cx| Ok(()))
    }

    fn phases(class: &ControllerClass, action: &str) -> Vec<Phase> {
        class
            .build_queue(action)
            .unwrap()
            .into_iter()
            .map(|s| s.phase)
            .collect()
    }

    fn hook(name: &str) -> Phase {
        Phase::Hook(Some(name.to_string()))
    }

    fn action(name: &str) -> Phase {
        Phase::Action(name.to_string())
    }

    #[test]
    fn test_action_registration() {
        let mut class = ControllerClass::new("Posts");
        class.action(Some("test1"), noop("a")).unwrap();
        class.action(None, noop("test2")).unwrap();

        assert!(class.responds_to("test1"));
        assert!(class.responds_to("test2"));
        assert!(!class.responds_to("a"));
        assert_eq!(class.action_names(), vec!["test1", "test2"]);
    }

    #[test]
    fn test_unnamed_action_rejected() {
        let mut class = ControllerClass::new("Posts");
        let err = class
            .action(None, StepFn::anonymous(|_cx| Ok(())))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnnamedAction));
    }

    #[test]
    fn test_queue_order() {
        let mut class = ControllerClass::new("Posts");
        class.action(None, noop("index")).unwrap();
        class.before(None, noop("b1"), None);
        class.before(None, noop("b2"), None);
        class.prepend_before(None, noop("b0"), None);
        class.after(None, noop("a1"), None);

        assert_eq!(
            phases(&class, "index"),
            vec![hook("b0"), hook("b1"), hook("b2"), action("index"), hook("a1")]
        );
    }

    #[test]
    fn test_duplicate_hook_names_keep_first() {
        let mut class = ControllerClass::new("Posts");
        class.action(None, noop("index")).unwrap();
        class.before(None, noop("auth"), None);
        class.before(Some("auth"), noop("other"), None);
        class.after(None, noop("auth"), None);

        assert_eq!(class.before_hooks().len(), 1);
        // the after hook shares the name with an already queued before hook
        assert_eq!(phases(&class, "index"), vec![hook("auth"), action("index")]);
    }

    #[test]
    fn test_anonymous_hooks_never_dedup() {
        let mut class = ControllerClass::new("Posts");
        class.action(None, noop("index")).unwrap();
        class.before(None, StepFn::anonymous(|_cx| Ok(())), None);
        class.before(None, StepFn::anonymous(|_cx| Ok(())), None);

        assert_eq!(
            phases(&class, "index"),
            vec![Phase::Hook(None), Phase::Hook(None), action("index")]
        );
    }

    #[test]
    fn test_filters_apply_per_action() {
        let mut class = ControllerClass::new("Posts");
        class.action(None, noop("index")).unwrap();
        class.action(None, noop("show")).unwrap();
        class.before(None, noop("load"), Some(HookFilter::only(["show"])));
        class.before(None, noop("count"), Some(HookFilter::except(["show"])));

        assert_eq!(phases(&class, "index"), vec![hook("count"), action("index")]);
        assert_eq!(phases(&class, "show"), vec![hook("load"), action("show")]);
    }

    #[test]
    fn test_skip_always_tombstones() {
        let mut class = ControllerClass::new("Posts");
        class.action(None, noop("index")).unwrap();
        class.before(None, noop("auth"), None);
        class.before(None, noop("load"), None);
        class.skip_before("auth", Skip::Always);

        assert_eq!(class.before_hooks().slots.len(), 2);
        assert!(class.before_hooks().slots[0].removed);
        assert_eq!(class.before_hooks().len(), 1);
        assert!(!class.before_hooks().contains("auth"));
        assert_eq!(phases(&class, "index"), vec![hook("load"), action("index")]);

        // a tombstoned name can be registered again
        class.before(None, noop("auth"), None);
        assert_eq!(
            phases(&class, "index"),
            vec![hook("load"), hook("auth"), action("index")]
        );
    }

    #[test]
    fn test_skip_only_rewrites_filter() {
        let mut class = ControllerClass::new("Posts");
        class.action(None, noop("index")).unwrap();
        class.action(None, noop("show")).unwrap();
        class.action(None, noop("edit")).unwrap();
        class.after(None, noop("audit"), Some(HookFilter::only(["show"])));
        class.skip_after("audit", Skip::only(["edit"]));

        let filter = class.after_hooks().iter().next().unwrap().filter().unwrap();
        assert_eq!(filter.except, Some(vec!["edit".to_string()]));
        assert_eq!(phases(&class, "show"), vec![action("show"), hook("audit")]);
        assert_eq!(phases(&class, "edit"), vec![action("edit")]);
        assert_eq!(phases(&class, "index"), vec![action("index"), hook("audit")]);
    }

    #[test]
    fn test_skip_unknown_is_noop() {
        let mut class = ControllerClass::new("Posts");
        class.before(None, noop("auth"), None);
        class.skip_before("missing", Skip::Always);
        assert_eq!(class.before_hooks().len(), 1);
    }

    #[test]
    fn test_undefined_action() {
        let class = ControllerClass::new("Posts");
        let err = class.build_queue("nope").unwrap_err();
        assert_eq!(err.to_string(), "undefined action \"nope\" in Posts controller");
    }

    #[test]
    fn test_reset_clears_tables() {
        let mut class = ControllerClass::new("Posts");
        class.action(None, noop("index")).unwrap();
        class.before(None, noop("auth"), None);
        class.set_layout(Layout::Disabled);
        class.reset();

        assert!(!class.responds_to("index"));
        assert!(class.before_hooks().is_empty());
        assert_eq!(class.layout(), &Layout::Default);
    }

    #[test]
    fn test_layout_paths() {
        let class = ControllerClass::new("Posts");
        assert_eq!(
            class.layout_path(&Layout::Default).as_deref(),
            Some("layouts/application_layout")
        );
        assert_eq!(
            class.layout_path(&Layout::Named("admin".into())).as_deref(),
            Some("layouts/admin_layout")
        );
        assert_eq!(class.layout_path(&Layout::Disabled), None);
    }
}
