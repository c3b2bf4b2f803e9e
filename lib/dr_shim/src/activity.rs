//! The activity lifecycle engine.
//!
//! States move along `Initialized → Created → Started → Resumed`, down
//! through `Paused → Stopped → Destroyed`, with `Stopped → Started` as
//! the restart edge and `Paused → Resumed` as the return edge. Calling
//! an operation whose preconditions do not hold first drives the
//! intermediate transitions, so every observer sees the canonical event
//! order with nothing skipped. Observers fire in registration order,
//! before the user-overridable hook; each hook runs at most once per
//! entry into its state.

use crate::errors::{ShimError, ShimResult};
use crate::fragment::{FragmentManager, FragmentState};
use crate::res::ResourceResolver;
use crate::view::{find_view_by_id, ViewRef};
use crate::window::Window;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initialized,
    Created,
    Started,
    Resumed,
    Paused,
    Stopped,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    OnCreate,
    OnStart,
    OnResume,
    OnPause,
    OnStop,
    OnDestroy,
}

/// User-overridable activity hooks.
#[allow(unused_variables)]
pub trait ActivityCallbacks {
    fn on_create(&mut self, activity: &mut Activity) {}
    fn on_start(&mut self, activity: &mut Activity) {}
    fn on_resume(&mut self, activity: &mut Activity) {}
    fn on_pause(&mut self, activity: &mut Activity) {}
    fn on_stop(&mut self, activity: &mut Activity) {}
    fn on_destroy(&mut self, activity: &mut Activity) {}
}

/// The do-nothing callbacks, also the placeholder while a hook runs.
pub struct NoopActivity;

impl ActivityCallbacks for NoopActivity {}

pub type LifecycleObserver = Box<dyn FnMut(LifecycleEvent)>;

pub struct Activity {
    name: String,
    state: LifecycleState,
    window: Window,
    observers: Vec<LifecycleObserver>,
    callbacks: Box<dyn ActivityCallbacks>,
    fragments: FragmentManager,
    resources: Option<Rc<dyn ResourceResolver>>,
}

impl std::fmt::Debug for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Activity")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Activity {
    #[must_use]
    pub fn new(name: &str, width: i32, height: i32) -> Self {
        Self::with_callbacks(name, width, height, Box::new(NoopActivity))
    }

    #[must_use]
    pub fn with_callbacks(
        name: &str,
        width: i32,
        height: i32,
        callbacks: Box<dyn ActivityCallbacks>,
    ) -> Self {
        Self {
            name: name.to_string(),
            state: LifecycleState::Initialized,
            window: Window::new(width, height),
            observers: Vec::new(),
            callbacks,
            fragments: FragmentManager::new(),
            resources: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    #[inline]
    #[must_use]
    pub const fn window(&self) -> &Window {
        &self.window
    }

    #[inline]
    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    #[inline]
    #[must_use]
    pub const fn fragments(&self) -> &FragmentManager {
        &self.fragments
    }

    #[inline]
    pub fn fragments_mut(&mut self) -> &mut FragmentManager {
        &mut self.fragments
    }

    pub fn add_lifecycle_observer(&mut self, observer: LifecycleObserver) {
        self.observers.push(observer);
    }

    pub fn set_resources(&mut self, resources: Rc<dyn ResourceResolver>) {
        self.resources = Some(resources);
    }

    #[must_use]
    pub fn resources(&self) -> Option<Rc<dyn ResourceResolver>> {
        self.resources.as_ref().map(Rc::clone)
    }

    /// Installs the content root and makes it the fragment container
    /// hierarchy.
    pub fn set_content_view(&mut self, view: ViewRef) {
        self.window.set_content(Rc::clone(&view));
        self.fragments.set_container_root(view);
    }

    #[must_use]
    pub fn find_view(&self, id: i32) -> Option<ViewRef> {
        self.window.root().and_then(|root| find_view_by_id(&root, id))
    }

    // -- lifecycle operations -------------------------------------------

    pub fn create(&mut self) -> ShimResult<()> {
        self.ensure_alive("create")?;
        if self.state == LifecycleState::Initialized {
            self.transition(LifecycleEvent::OnCreate, LifecycleState::Created);
        }
        Ok(())
    }

    pub fn start(&mut self) -> ShimResult<()> {
        self.ensure_alive("start")?;
        self.create()?;
        match self.state {
            LifecycleState::Created | LifecycleState::Stopped => {
                self.transition(LifecycleEvent::OnStart, LifecycleState::Started);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn resume(&mut self) -> ShimResult<()> {
        self.ensure_alive("resume")?;
        if self.state != LifecycleState::Paused {
            self.start()?;
        }
        match self.state {
            LifecycleState::Started | LifecycleState::Paused => {
                self.transition(LifecycleEvent::OnResume, LifecycleState::Resumed);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn pause(&mut self) -> ShimResult<()> {
        self.ensure_alive("pause")?;
        match self.state {
            LifecycleState::Paused | LifecycleState::Stopped => return Ok(()),
            LifecycleState::Resumed => {}
            _ => self.resume()?,
        }
        self.transition(LifecycleEvent::OnPause, LifecycleState::Paused);
        Ok(())
    }

    pub fn stop(&mut self) -> ShimResult<()> {
        self.ensure_alive("stop")?;
        match self.state {
            LifecycleState::Stopped => return Ok(()),
            LifecycleState::Initialized | LifecycleState::Created => self.start()?,
            LifecycleState::Resumed => self.pause()?,
            _ => {}
        }
        self.transition(LifecycleEvent::OnStop, LifecycleState::Stopped);
        Ok(())
    }

    pub fn destroy(&mut self) -> ShimResult<()> {
        if self.state == LifecycleState::Destroyed {
            return Ok(());
        }
        match self.state {
            LifecycleState::Resumed | LifecycleState::Paused | LifecycleState::Started => {
                self.stop()?;
            }
            _ => {}
        }
        self.transition(LifecycleEvent::OnDestroy, LifecycleState::Destroyed);
        self.window.clear_content();
        Ok(())
    }

    fn ensure_alive(&self, operation: &str) -> ShimResult<()> {
        if self.state == LifecycleState::Destroyed {
            return Err(ShimError::Lifecycle(format!(
                "cannot {operation} a destroyed activity"
            )));
        }
        Ok(())
    }

    fn transition(&mut self, event: LifecycleEvent, new_state: LifecycleState) {
        log::debug!("{}: {event:?} -> {new_state:?}", self.name);
        self.state = new_state;

        for observer in &mut self.observers {
            observer(event);
        }

        let mut callbacks = std::mem::replace(&mut self.callbacks, Box::new(NoopActivity));
        match event {
            LifecycleEvent::OnCreate => callbacks.on_create(self),
            LifecycleEvent::OnStart => callbacks.on_start(self),
            LifecycleEvent::OnResume => callbacks.on_resume(self),
            LifecycleEvent::OnPause => callbacks.on_pause(self),
            LifecycleEvent::OnStop => callbacks.on_stop(self),
            LifecycleEvent::OnDestroy => callbacks.on_destroy(self),
        }
        self.callbacks = callbacks;

        // Fragments follow, entering each state after the activity.
        match fragment_ceiling(new_state) {
            Some(ceiling) => self.fragments.host_state_changed(ceiling),
            None => self.fragments.teardown_all(),
        }
    }
}

const fn fragment_ceiling(state: LifecycleState) -> Option<FragmentState> {
    match state {
        LifecycleState::Initialized => Some(FragmentState::Initial),
        LifecycleState::Created => Some(FragmentState::Created),
        LifecycleState::Started => Some(FragmentState::Started),
        LifecycleState::Resumed => Some(FragmentState::Resumed),
        LifecycleState::Paused => Some(FragmentState::Started),
        LifecycleState::Stopped => Some(FragmentState::ViewCreated),
        LifecycleState::Destroyed => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn observed(activity: &mut Activity) -> Rc<RefCell<Vec<LifecycleEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        activity.add_lifecycle_observer(Box::new(move |event| {
            sink.borrow_mut().push(event);
        }));
        events
    }

    #[test]
    fn resume_from_initialized_drives_the_full_chain() {
        let mut activity = Activity::new("Main", 480, 800);
        let events = observed(&mut activity);

        activity.resume().unwrap();
        assert_eq!(activity.state(), LifecycleState::Resumed);
        assert_eq!(
            *events.borrow(),
            vec![
                LifecycleEvent::OnCreate,
                LifecycleEvent::OnStart,
                LifecycleEvent::OnResume
            ]
        );
    }

    #[test]
    fn destroy_from_resumed_winds_down() {
        let mut activity = Activity::new("Main", 480, 800);
        activity.resume().unwrap();
        let events = observed(&mut activity);

        activity.destroy().unwrap();
        assert_eq!(activity.state(), LifecycleState::Destroyed);
        assert_eq!(
            *events.borrow(),
            vec![
                LifecycleEvent::OnPause,
                LifecycleEvent::OnStop,
                LifecycleEvent::OnDestroy
            ]
        );
    }

    #[test]
    fn pause_and_return() {
        let mut activity = Activity::new("Main", 480, 800);
        activity.resume().unwrap();
        let events = observed(&mut activity);

        activity.pause().unwrap();
        assert_eq!(activity.state(), LifecycleState::Paused);
        activity.resume().unwrap();
        assert_eq!(activity.state(), LifecycleState::Resumed);
        assert_eq!(
            *events.borrow(),
            vec![LifecycleEvent::OnPause, LifecycleEvent::OnResume]
        );
    }

    #[test]
    fn stop_and_restart() {
        let mut activity = Activity::new("Main", 480, 800);
        activity.resume().unwrap();
        let events = observed(&mut activity);

        activity.stop().unwrap();
        assert_eq!(activity.state(), LifecycleState::Stopped);
        activity.resume().unwrap();
        assert_eq!(activity.state(), LifecycleState::Resumed);
        assert_eq!(
            *events.borrow(),
            vec![
                LifecycleEvent::OnPause,
                LifecycleEvent::OnStop,
                LifecycleEvent::OnStart,
                LifecycleEvent::OnResume
            ]
        );
    }

    #[test]
    fn destroyed_activities_reject_operations() {
        let mut activity = Activity::new("Main", 480, 800);
        activity.resume().unwrap();
        activity.destroy().unwrap();

        assert!(matches!(
            activity.create(),
            Err(ShimError::Lifecycle(_))
        ));
        assert!(matches!(activity.resume(), Err(ShimError::Lifecycle(_))));
        // A second destroy is a no-op, not a misuse.
        assert!(activity.destroy().is_ok());
    }

    #[test]
    fn observers_fire_in_registration_order() {
        let mut activity = Activity::new("Main", 480, 800);
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let sink = Rc::clone(&order);
            activity.add_lifecycle_observer(Box::new(move |event| {
                if event == LifecycleEvent::OnCreate {
                    sink.borrow_mut().push(tag);
                }
            }));
        }

        activity.create().unwrap();
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    /// The hook sees the state already entered, and fires once per entry.
    struct CountingCallbacks {
        creates: Rc<RefCell<u32>>,
    }

    impl ActivityCallbacks for CountingCallbacks {
        fn on_create(&mut self, activity: &mut Activity) {
            assert_eq!(activity.state(), LifecycleState::Created);
            *self.creates.borrow_mut() += 1;
        }
    }

    #[test]
    fn hooks_fire_once_per_state_entry() {
        let creates = Rc::new(RefCell::new(0u32));
        let mut activity = Activity::with_callbacks(
            "Main",
            480,
            800,
            Box::new(CountingCallbacks {
                creates: Rc::clone(&creates),
            }),
        );

        activity.create().unwrap();
        activity.create().unwrap();
        activity.resume().unwrap();
        assert_eq!(*creates.borrow(), 1);
    }

    #[test]
    fn fragments_follow_the_activity() {
        use crate::fragment::{Fragment, NoopFragment};

        let mut activity = Activity::new("Main", 480, 800);
        activity.create().unwrap();

        let fragment = Fragment::new(Box::new(NoopFragment));
        activity
            .fragments()
            .begin_transaction()
            .add(1, Rc::clone(&fragment), Some("A"))
            .commit(activity.fragments_mut());

        assert_eq!(fragment.borrow().state(), FragmentState::Created);

        activity.resume().unwrap();
        assert_eq!(fragment.borrow().state(), FragmentState::Resumed);

        activity.destroy().unwrap();
        assert_eq!(fragment.borrow().state(), FragmentState::Initial);
        assert!(!fragment.borrow().is_added());
    }
}
