//! Fragments, the transaction executor and the back stack.
//!
//! Fragments follow their host's lifecycle through a ceiling state the
//! host pushes down; they never advance past it. Transactions execute
//! their operations atomically in insertion order; a back-stack-tracked
//! transaction records its inverse so `pop_back_stack` can restore the
//! exact attached set and view visibilities.

use crate::view::{add_child, find_view_by_id, remove_from_parent, ViewRef, Visibility};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Fragment lifecycle positions, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FragmentState {
    Initial,
    Attached,
    Created,
    ViewCreated,
    Started,
    Resumed,
}

/// User-overridable fragment hooks.
#[allow(unused_variables)]
pub trait FragmentCallbacks {
    fn on_attach(&mut self) {}
    fn on_create(&mut self) {}
    /// Returns the fragment's view, if it has one.
    fn on_create_view(&mut self) -> Option<ViewRef> {
        None
    }
    fn on_view_created(&mut self, view: &ViewRef) {}
    fn on_start(&mut self) {}
    fn on_resume(&mut self) {}
    fn on_pause(&mut self) {}
    fn on_stop(&mut self) {}
    fn on_destroy_view(&mut self) {}
    fn on_destroy(&mut self) {}
    fn on_detach(&mut self) {}
}

/// The do-nothing callbacks, also used as the placeholder while a hook
/// runs.
pub struct NoopFragment;

impl FragmentCallbacks for NoopFragment {}

pub type FragmentRef = Rc<RefCell<Fragment>>;

pub struct Fragment {
    tag: Option<String>,
    container_id: i32,
    state: FragmentState,
    view: Option<ViewRef>,
    hidden: bool,
    added: bool,
    arguments: BTreeMap<String, String>,
    callbacks: Box<dyn FragmentCallbacks>,
}

impl std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Fragment")
            .field("tag", &self.tag)
            .field("state", &self.state)
            .field("added", &self.added)
            .field("hidden", &self.hidden)
            .finish()
    }
}

impl Fragment {
    #[must_use]
    pub fn new(callbacks: Box<dyn FragmentCallbacks>) -> FragmentRef {
        Rc::new(RefCell::new(Self {
            tag: None,
            container_id: 0,
            state: FragmentState::Initial,
            view: None,
            hidden: false,
            added: false,
            arguments: BTreeMap::new(),
            callbacks,
        }))
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> FragmentState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn is_added(&self) -> bool {
        self.added
    }

    #[inline]
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.hidden
    }

    #[inline]
    #[must_use]
    pub const fn container_id(&self) -> i32 {
        self.container_id
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> Option<ViewRef> {
        self.view.as_ref().map(Rc::clone)
    }

    pub fn set_arguments(&mut self, arguments: BTreeMap<String, String>) {
        self.arguments = arguments;
    }

    #[must_use]
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).map(String::as_str)
    }
}

// Runs one hook with the callbacks taken out, so the hook may borrow
// the fragment.
fn with_callbacks(fragment: &FragmentRef, f: impl FnOnce(&mut Box<dyn FragmentCallbacks>)) {
    let mut callbacks = std::mem::replace(
        &mut fragment.borrow_mut().callbacks,
        Box::new(NoopFragment),
    );
    f(&mut callbacks);
    fragment.borrow_mut().callbacks = callbacks;
}

/// Advances or rewinds a fragment one state at a time until it reaches
/// `target`, firing the hook chain in order.
pub(crate) fn move_to_state(
    fragment: &FragmentRef,
    target: FragmentState,
    container_root: Option<&ViewRef>,
) {
    loop {
        let current = fragment.borrow().state;
        if current == target {
            return;
        }
        if current < target {
            step_up(fragment, container_root);
        } else {
            step_down(fragment);
        }
    }
}

fn step_up(fragment: &FragmentRef, container_root: Option<&ViewRef>) {
    let current = fragment.borrow().state;
    match current {
        FragmentState::Initial => {
            with_callbacks(fragment, |cb| cb.on_attach());
            fragment.borrow_mut().state = FragmentState::Attached;
        }
        FragmentState::Attached => {
            with_callbacks(fragment, |cb| cb.on_create());
            fragment.borrow_mut().state = FragmentState::Created;
        }
        FragmentState::Created => {
            let mut created: Option<ViewRef> = None;
            with_callbacks(fragment, |cb| created = cb.on_create_view());
            if let Some(view) = &created {
                let container_id = fragment.borrow().container_id;
                let hidden = fragment.borrow().hidden;
                if hidden {
                    view.borrow_mut().set_visibility(Visibility::Gone);
                }
                if let Some(root) = container_root {
                    match find_view_by_id(root, container_id) {
                        Some(container) => add_child(&container, view),
                        None => log::warn!(
                            "fragment container {container_id:#x} not found in the hierarchy"
                        ),
                    }
                }
                fragment.borrow_mut().view = Some(Rc::clone(view));
                with_callbacks(fragment, |cb| cb.on_view_created(view));
            }
            fragment.borrow_mut().state = FragmentState::ViewCreated;
        }
        FragmentState::ViewCreated => {
            with_callbacks(fragment, |cb| cb.on_start());
            fragment.borrow_mut().state = FragmentState::Started;
        }
        FragmentState::Started => {
            with_callbacks(fragment, |cb| cb.on_resume());
            fragment.borrow_mut().state = FragmentState::Resumed;
        }
        FragmentState::Resumed => {}
    }
}

fn step_down(fragment: &FragmentRef) {
    let current = fragment.borrow().state;
    match current {
        FragmentState::Resumed => {
            with_callbacks(fragment, |cb| cb.on_pause());
            fragment.borrow_mut().state = FragmentState::Started;
        }
        FragmentState::Started => {
            with_callbacks(fragment, |cb| cb.on_stop());
            fragment.borrow_mut().state = FragmentState::ViewCreated;
        }
        FragmentState::ViewCreated => {
            with_callbacks(fragment, |cb| cb.on_destroy_view());
            let view = fragment.borrow_mut().view.take();
            if let Some(view) = view {
                remove_from_parent(&view);
            }
            fragment.borrow_mut().state = FragmentState::Created;
        }
        FragmentState::Created => {
            with_callbacks(fragment, |cb| cb.on_destroy());
            fragment.borrow_mut().state = FragmentState::Attached;
        }
        FragmentState::Attached => {
            with_callbacks(fragment, |cb| cb.on_detach());
            fragment.borrow_mut().state = FragmentState::Initial;
        }
        FragmentState::Initial => {}
    }
}

// -- transactions --------------------------------------------------------

enum FragOp {
    Add {
        container: i32,
        fragment: FragmentRef,
        tag: Option<String>,
    },
    Remove(FragmentRef),
    Replace {
        container: i32,
        fragment: FragmentRef,
        tag: Option<String>,
    },
    Show(FragmentRef),
    Hide(FragmentRef),
}

enum InverseOp {
    Add {
        fragment: FragmentRef,
        container: i32,
        tag: Option<String>,
        hidden: bool,
    },
    Remove(FragmentRef),
    SetHidden(FragmentRef, bool),
}

struct BackStackRecord {
    name: Option<String>,
    inverse: Vec<InverseOp>,
}

/// An atomic batch of fragment operations.
#[must_use = "a transaction does nothing until committed"]
pub struct FragmentTransaction {
    ops: Vec<FragOp>,
    back_stack_name: Option<String>,
    tracked: bool,
}

impl FragmentTransaction {
    fn new() -> Self {
        Self {
            ops: Vec::new(),
            back_stack_name: None,
            tracked: false,
        }
    }

    pub fn add(mut self, container: i32, fragment: FragmentRef, tag: Option<&str>) -> Self {
        self.ops.push(FragOp::Add {
            container,
            fragment,
            tag: tag.map(str::to_string),
        });
        self
    }

    pub fn remove(mut self, fragment: FragmentRef) -> Self {
        self.ops.push(FragOp::Remove(fragment));
        self
    }

    pub fn replace(mut self, container: i32, fragment: FragmentRef, tag: Option<&str>) -> Self {
        self.ops.push(FragOp::Replace {
            container,
            fragment,
            tag: tag.map(str::to_string),
        });
        self
    }

    pub fn show(mut self, fragment: FragmentRef) -> Self {
        self.ops.push(FragOp::Show(fragment));
        self
    }

    pub fn hide(mut self, fragment: FragmentRef) -> Self {
        self.ops.push(FragOp::Hide(fragment));
        self
    }

    pub fn add_to_back_stack(mut self, name: Option<&str>) -> Self {
        self.tracked = true;
        self.back_stack_name = name.map(str::to_string);
        self
    }

    /// Executes the operations in insertion order.
    pub fn commit(self, manager: &mut FragmentManager) {
        manager.execute(self);
    }
}

/// The fragment registry of one host (activity).
pub struct FragmentManager {
    fragments: Vec<FragmentRef>,
    back_stack: Vec<BackStackRecord>,
    host_state: FragmentState,
    container_root: Option<ViewRef>,
}

impl Default for FragmentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fragments: Vec::new(),
            back_stack: Vec::new(),
            host_state: FragmentState::Initial,
            container_root: None,
        }
    }

    pub fn set_container_root(&mut self, root: ViewRef) {
        self.container_root = Some(root);
    }

    #[must_use]
    pub fn begin_transaction(&self) -> FragmentTransaction {
        FragmentTransaction::new()
    }

    #[must_use]
    pub fn find_by_tag(&self, tag: &str) -> Option<FragmentRef> {
        self.fragments
            .iter()
            .find(|f| f.borrow().tag.as_deref() == Some(tag))
            .map(Rc::clone)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &FragmentRef> {
        self.fragments.iter()
    }

    #[inline]
    #[must_use]
    pub fn back_stack_count(&self) -> usize {
        self.back_stack.len()
    }

    /// The host entered a new lifecycle position: every added fragment
    /// follows, after the host.
    pub fn host_state_changed(&mut self, ceiling: FragmentState) {
        self.host_state = ceiling;
        let fragments = self.fragments.clone();
        for fragment in &fragments {
            move_to_state(fragment, ceiling, self.container_root.as_ref());
        }
    }

    /// Full teardown of every fragment (host destroyed).
    pub fn teardown_all(&mut self) {
        self.host_state = FragmentState::Initial;
        for fragment in std::mem::take(&mut self.fragments) {
            fragment.borrow_mut().added = false;
            move_to_state(&fragment, FragmentState::Initial, None);
        }
        self.back_stack.clear();
    }

    fn execute(&mut self, transaction: FragmentTransaction) {
        let mut inverse = Vec::new();

        for op in transaction.ops {
            match op {
                FragOp::Add {
                    container,
                    fragment,
                    tag,
                } => {
                    self.do_add(&fragment, container, tag);
                    inverse.push(InverseOp::Remove(Rc::clone(&fragment)));
                }
                FragOp::Remove(fragment) => {
                    let (container, tag, hidden) = {
                        let f = fragment.borrow();
                        (f.container_id, f.tag.clone(), f.hidden)
                    };
                    self.do_remove(&fragment);
                    inverse.push(InverseOp::Add {
                        fragment,
                        container,
                        tag,
                        hidden,
                    });
                }
                FragOp::Replace {
                    container,
                    fragment,
                    tag,
                } => {
                    let evicted: Vec<FragmentRef> = self
                        .fragments
                        .iter()
                        .filter(|f| f.borrow().container_id == container)
                        .map(Rc::clone)
                        .collect();
                    for old in evicted {
                        let (tag, hidden) = {
                            let f = old.borrow();
                            (f.tag.clone(), f.hidden)
                        };
                        self.do_remove(&old);
                        inverse.push(InverseOp::Add {
                            fragment: old,
                            container,
                            tag,
                            hidden,
                        });
                    }
                    self.do_add(&fragment, container, tag);
                    inverse.push(InverseOp::Remove(Rc::clone(&fragment)));
                }
                FragOp::Show(fragment) => {
                    let was = fragment.borrow().hidden;
                    self.set_hidden(&fragment, false);
                    inverse.push(InverseOp::SetHidden(fragment, was));
                }
                FragOp::Hide(fragment) => {
                    let was = fragment.borrow().hidden;
                    self.set_hidden(&fragment, true);
                    inverse.push(InverseOp::SetHidden(fragment, was));
                }
            }
        }

        if transaction.tracked {
            self.back_stack.push(BackStackRecord {
                name: transaction.back_stack_name,
                inverse,
            });
        }
    }

    /// Applies the inverse of the most recent tracked transaction.
    /// Returns `false` when the back stack is empty.
    pub fn pop_back_stack(&mut self) -> bool {
        let Some(record) = self.back_stack.pop() else {
            return false;
        };
        log::debug!("popping back stack entry {:?}", record.name);

        for op in record.inverse.into_iter().rev() {
            match op {
                InverseOp::Add {
                    fragment,
                    container,
                    tag,
                    hidden,
                } => {
                    fragment.borrow_mut().hidden = hidden;
                    self.do_add(&fragment, container, tag);
                    if hidden {
                        self.set_hidden(&fragment, true);
                    }
                }
                InverseOp::Remove(fragment) => self.do_remove(&fragment),
                InverseOp::SetHidden(fragment, hidden) => self.set_hidden(&fragment, hidden),
            }
        }
        true
    }

    fn do_add(&mut self, fragment: &FragmentRef, container: i32, tag: Option<String>) {
        {
            let mut f = fragment.borrow_mut();
            f.container_id = container;
            f.tag = tag;
            f.added = true;
        }
        self.fragments.push(Rc::clone(fragment));
        // The fragment climbs only as far as the host already is.
        move_to_state(fragment, self.host_state, self.container_root.as_ref());
    }

    /// Teardown runs the full chain regardless of the host's state.
    fn do_remove(&mut self, fragment: &FragmentRef) {
        fragment.borrow_mut().added = false;
        move_to_state(fragment, FragmentState::Initial, self.container_root.as_ref());
        self.fragments.retain(|f| !Rc::ptr_eq(f, fragment));
    }

    fn set_hidden(&mut self, fragment: &FragmentRef, hidden: bool) {
        fragment.borrow_mut().hidden = hidden;
        let view = fragment.borrow().view();
        if let Some(view) = view {
            view.borrow_mut().set_visibility(if hidden {
                Visibility::Gone
            } else {
                Visibility::Visible
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{View, ViewKind};

    /// Callbacks that log every hook invocation.
    struct Recording {
        log: Rc<RefCell<Vec<&'static str>>>,
        with_view: bool,
    }

    impl FragmentCallbacks for Recording {
        fn on_attach(&mut self) {
            self.log.borrow_mut().push("attach");
        }
        fn on_create(&mut self) {
            self.log.borrow_mut().push("create");
        }
        fn on_create_view(&mut self) -> Option<ViewRef> {
            self.log.borrow_mut().push("createView");
            self.with_view.then(|| View::new(ViewKind::Plain))
        }
        fn on_view_created(&mut self, _view: &ViewRef) {
            self.log.borrow_mut().push("viewCreated");
        }
        fn on_start(&mut self) {
            self.log.borrow_mut().push("start");
        }
        fn on_resume(&mut self) {
            self.log.borrow_mut().push("resume");
        }
        fn on_pause(&mut self) {
            self.log.borrow_mut().push("pause");
        }
        fn on_stop(&mut self) {
            self.log.borrow_mut().push("stop");
        }
        fn on_destroy_view(&mut self) {
            self.log.borrow_mut().push("destroyView");
        }
        fn on_destroy(&mut self) {
            self.log.borrow_mut().push("destroy");
        }
        fn on_detach(&mut self) {
            self.log.borrow_mut().push("detach");
        }
    }

    fn recording_fragment(with_view: bool) -> (FragmentRef, Rc<RefCell<Vec<&'static str>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let fragment = Fragment::new(Box::new(Recording {
            log: Rc::clone(&log),
            with_view,
        }));
        (fragment, log)
    }

    fn resumed_manager() -> FragmentManager {
        let mut manager = FragmentManager::new();
        manager.host_state_changed(FragmentState::Resumed);
        manager
    }

    #[test]
    fn add_to_resumed_host_runs_the_full_up_chain() {
        let mut manager = resumed_manager();
        let (fragment, log) = recording_fragment(true);

        manager
            .begin_transaction()
            .add(1, Rc::clone(&fragment), Some("A"))
            .commit(&mut manager);

        assert_eq!(
            *log.borrow(),
            vec!["attach", "create", "createView", "viewCreated", "start", "resume"]
        );
        assert!(fragment.borrow().is_added());
        assert_eq!(fragment.borrow().state(), FragmentState::Resumed);
    }

    #[test]
    fn add_to_created_host_stops_at_the_host_state() {
        let mut manager = FragmentManager::new();
        manager.host_state_changed(FragmentState::Created);
        let (fragment, log) = recording_fragment(false);

        manager
            .begin_transaction()
            .add(1, Rc::clone(&fragment), None)
            .commit(&mut manager);

        assert_eq!(*log.borrow(), vec!["attach", "create"]);
        assert_eq!(fragment.borrow().state(), FragmentState::Created);
    }

    #[test]
    fn remove_runs_the_full_teardown_chain() {
        let mut manager = resumed_manager();
        let (fragment, log) = recording_fragment(true);
        manager
            .begin_transaction()
            .add(1, Rc::clone(&fragment), Some("A"))
            .commit(&mut manager);
        log.borrow_mut().clear();

        manager
            .begin_transaction()
            .remove(Rc::clone(&fragment))
            .commit(&mut manager);

        assert_eq!(
            *log.borrow(),
            vec!["pause", "stop", "destroyView", "destroy", "detach"]
        );
        assert!(!fragment.borrow().is_added());
        assert!(fragment.borrow().view().is_none());
    }

    #[test]
    fn replace_then_pop_restores_the_previous_set() {
        let mut manager = resumed_manager();
        let (a, _) = recording_fragment(false);
        let (b, _) = recording_fragment(false);

        manager
            .begin_transaction()
            .add(1, Rc::clone(&a), Some("A"))
            .commit(&mut manager);

        manager
            .begin_transaction()
            .replace(1, Rc::clone(&b), Some("B"))
            .add_to_back_stack(Some("s1"))
            .commit(&mut manager);

        assert!(manager.find_by_tag("A").is_none());
        assert!(manager.find_by_tag("B").is_some());
        assert_eq!(manager.back_stack_count(), 1);

        assert!(manager.pop_back_stack());
        assert!(manager.find_by_tag("B").is_none());
        let restored = manager.find_by_tag("A").unwrap();
        assert!(restored.borrow().is_added());
        assert_eq!(manager.back_stack_count(), 0);
    }

    #[test]
    fn show_hide_toggle_visibility_and_back_stack_restores_it() {
        let root = View::new(ViewKind::Frame);
        let container = View::new(ViewKind::Frame);
        container.borrow_mut().set_id(1);
        add_child(&root, &container);

        let mut manager = resumed_manager();
        manager.set_container_root(Rc::clone(&root));

        let (fragment, _) = recording_fragment(true);
        manager
            .begin_transaction()
            .add(1, Rc::clone(&fragment), Some("A"))
            .commit(&mut manager);

        let view = fragment.borrow().view().unwrap();
        assert_eq!(view.borrow().visibility(), Visibility::Visible);

        manager
            .begin_transaction()
            .hide(Rc::clone(&fragment))
            .add_to_back_stack(None)
            .commit(&mut manager);
        assert!(fragment.borrow().is_hidden());
        assert_eq!(view.borrow().visibility(), Visibility::Gone);

        assert!(manager.pop_back_stack());
        assert!(!fragment.borrow().is_hidden());
        assert_eq!(view.borrow().visibility(), Visibility::Visible);
    }

    #[test]
    fn fragment_view_lands_in_its_container() {
        let root = View::new(ViewKind::Frame);
        let container = View::new(ViewKind::Frame);
        container.borrow_mut().set_id(42);
        add_child(&root, &container);

        let mut manager = resumed_manager();
        manager.set_container_root(Rc::clone(&root));

        let (fragment, _) = recording_fragment(true);
        manager
            .begin_transaction()
            .add(42, Rc::clone(&fragment), None)
            .commit(&mut manager);

        assert_eq!(container.borrow().children.len(), 1);

        manager
            .begin_transaction()
            .remove(Rc::clone(&fragment))
            .commit(&mut manager);
        assert!(container.borrow().children.is_empty());
    }

    #[test]
    fn empty_back_stack_pops_nothing() {
        let mut manager = resumed_manager();
        assert!(!manager.pop_back_stack());
    }
}
