//! The view tree: measurement, layout, drawing and touch dispatch.
//!
//! Views are shared nodes (`Rc<RefCell<_>>`) with a weak parent edge, so
//! the tree can be walked both ways on a single thread. The traversal
//! functions take the node by reference and never hold a borrow across a
//! recursion into a child.

use crate::canvas::Canvas;
use crate::errors::{ShimError, ShimResult};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

pub const NO_ID: i32 = -1;

pub type ViewRef = Rc<RefCell<View>>;
pub type ClickHandler = Box<dyn FnMut()>;
pub type TouchHandler = Box<dyn FnMut(&MotionEvent) -> bool>;

// -- measure specs ------------------------------------------------------

/// Measurement modes, packed in the top two bits of a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecMode {
    Unspecified = 0,
    Exactly = 1,
    AtMost = 2,
}

/// A packed `(mode, size)` measurement constraint: two mode bits on top
/// of a 30-bit size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureSpec(u32);

const SPEC_SIZE_MASK: u32 = (1 << 30) - 1;

impl MeasureSpec {
    #[must_use]
    pub fn make(size: i32, mode: SpecMode) -> Self {
        Self(((mode as u32) << 30) | (size as u32 & SPEC_SIZE_MASK))
    }

    #[must_use]
    pub const fn mode(self) -> u32 {
        self.0 >> 30
    }

    #[must_use]
    pub const fn size(self) -> i32 {
        (self.0 & SPEC_SIZE_MASK) as i32
    }

    #[must_use]
    pub fn spec_mode(self) -> SpecMode {
        match self.mode() {
            1 => SpecMode::Exactly,
            2 => SpecMode::AtMost,
            _ => SpecMode::Unspecified,
        }
    }

    /// Resolves a desired size against this constraint.
    #[must_use]
    pub fn resolve(self, desired: i32) -> i32 {
        match self.spec_mode() {
            SpecMode::Exactly => self.size(),
            SpecMode::AtMost => desired.min(self.size()),
            SpecMode::Unspecified => desired,
        }
    }
}

impl fmt::Display for MeasureSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mode = match self.spec_mode() {
            SpecMode::Unspecified => "UNSPECIFIED",
            SpecMode::Exactly => "EXACTLY",
            SpecMode::AtMost => "AT_MOST",
        };
        write!(f, "{mode} {}", self.size())
    }
}

/// Derives the constraint a parent passes to a child for one axis.
#[must_use]
pub fn child_measure_spec(parent: MeasureSpec, padding: i32, child_dimension: i32) -> MeasureSpec {
    let available = (parent.size() - padding).max(0);
    match parent.spec_mode() {
        SpecMode::Exactly | SpecMode::AtMost => match child_dimension {
            LayoutParams::MATCH_PARENT => MeasureSpec::make(available, parent.spec_mode()),
            LayoutParams::WRAP_CONTENT => MeasureSpec::make(available, SpecMode::AtMost),
            specific => MeasureSpec::make(specific, SpecMode::Exactly),
        },
        SpecMode::Unspecified => match child_dimension {
            LayoutParams::MATCH_PARENT | LayoutParams::WRAP_CONTENT => {
                MeasureSpec::make(0, SpecMode::Unspecified)
            }
            specific => MeasureSpec::make(specific, SpecMode::Exactly),
        },
    }
}

// -- layout params and basic attributes ---------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutParams {
    pub width: i32,
    pub height: i32,
}

impl LayoutParams {
    pub const MATCH_PARENT: i32 = -1;
    pub const WRAP_CONTENT: i32 = -2;

    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn match_parent() -> Self {
        Self::new(Self::MATCH_PARENT, Self::MATCH_PARENT)
    }

    #[must_use]
    pub const fn wrap_content() -> Self {
        Self::new(Self::WRAP_CONTENT, Self::WRAP_CONTENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Invisible,
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

// -- motion events -------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Down,
    Up,
    Move,
    Cancel,
}

/// A touch event in the coordinates of the view it is handed to.
#[derive(Debug, Clone, Copy)]
pub struct MotionEvent {
    pub down_time: u64,
    pub event_time: u64,
    pub action: Action,
    pub x: i32,
    pub y: i32,
}

impl MotionEvent {
    #[must_use]
    pub const fn new(down_time: u64, event_time: u64, action: Action, x: i32, y: i32) -> Self {
        Self {
            down_time,
            event_time,
            action,
            x,
            y,
        }
    }

    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            down_time: self.down_time,
            event_time: self.event_time,
            action: self.action,
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

// -- the view node -------------------------------------------------------

/// Widget-specific behavior of a view node.
pub enum ViewKind {
    /// A plain undecorated view.
    Plain,
    /// A frame container: children stack at the padded origin.
    Frame,
    /// A linear container laying children out along one axis.
    Linear { orientation: Orientation },
    /// A text-bearing leaf (`TextView`, `Button`).
    Text { text: String, text_size: i32 },
}

impl fmt::Debug for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "Plain"),
            Self::Frame => write!(f, "Frame"),
            Self::Linear { orientation } => write!(f, "Linear({orientation:?})"),
            Self::Text { text, .. } => write!(f, "Text({text:?})"),
        }
    }
}

pub struct View {
    pub(crate) id: i32,
    pub(crate) kind: ViewKind,
    pub(crate) visibility: Visibility,
    pub(crate) layout_params: LayoutParams,
    pub(crate) padding: (i32, i32, i32, i32),
    pub(crate) left: i32,
    pub(crate) top: i32,
    pub(crate) right: i32,
    pub(crate) bottom: i32,
    pub(crate) measured_width: i32,
    pub(crate) measured_height: i32,
    pub(crate) background: Option<u32>,
    pub(crate) text_color: u32,
    pub(crate) clickable: bool,
    pub(crate) parent: Weak<RefCell<View>>,
    pub(crate) children: Vec<ViewRef>,
    pub(crate) on_click: Option<ClickHandler>,
    pub(crate) on_touch: Option<TouchHandler>,
    pub(crate) touch_target: Option<ViewRef>,
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("visibility", &self.visibility)
            .field("frame", &(self.left, self.top, self.right, self.bottom))
            .field("children", &self.children.len())
            .finish()
    }
}

impl View {
    #[must_use]
    pub fn new(kind: ViewKind) -> ViewRef {
        Rc::new(RefCell::new(Self {
            id: NO_ID,
            kind,
            visibility: Visibility::Visible,
            layout_params: LayoutParams::wrap_content(),
            padding: (0, 0, 0, 0),
            left: 0,
            top: 0,
            right: 0,
            bottom: 0,
            measured_width: 0,
            measured_height: 0,
            background: None,
            text_color: 0xff00_0000,
            clickable: false,
            parent: Weak::new(),
            children: Vec::new(),
            on_click: None,
            on_touch: None,
            touch_target: None,
        }))
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> i32 {
        self.id
    }

    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    #[inline]
    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }

    #[inline]
    #[must_use]
    pub const fn layout_params(&self) -> LayoutParams {
        self.layout_params
    }

    pub fn set_layout_params(&mut self, params: LayoutParams) {
        self.layout_params = params;
    }

    pub fn set_padding(&mut self, left: i32, top: i32, right: i32, bottom: i32) {
        self.padding = (left, top, right, bottom);
    }

    #[inline]
    #[must_use]
    pub const fn frame(&self) -> (i32, i32, i32, i32) {
        (self.left, self.top, self.right, self.bottom)
    }

    #[inline]
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    #[inline]
    #[must_use]
    pub const fn measured_size(&self) -> (i32, i32) {
        (self.measured_width, self.measured_height)
    }

    /// The parent view, when attached.
    #[must_use]
    pub fn parent(&self) -> Option<ViewRef> {
        self.parent.upgrade()
    }

    pub fn set_background_color(&mut self, color: u32) {
        self.background = Some(color);
    }

    pub fn set_clickable(&mut self, clickable: bool) {
        self.clickable = clickable;
    }

    #[inline]
    #[must_use]
    pub const fn is_clickable(&self) -> bool {
        self.clickable
    }

    pub fn set_on_click(&mut self, handler: ClickHandler) {
        self.clickable = true;
        self.on_click = Some(handler);
    }

    pub fn set_on_touch(&mut self, handler: TouchHandler) {
        self.on_touch = Some(handler);
    }

    /// The text of a text-bearing view.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            ViewKind::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, new_text: &str) {
        if let ViewKind::Text { text, .. } = &mut self.kind {
            *text = new_text.to_string();
        }
    }
}

// -- tree edits ----------------------------------------------------------

/// Appends `child` to `parent`, maintaining the parent back-reference.
pub fn add_child(parent: &ViewRef, child: &ViewRef) {
    child.borrow_mut().parent = Rc::downgrade(parent);
    parent.borrow_mut().children.push(Rc::clone(child));
}

/// Detaches `child` from its parent, if it has one.
pub fn remove_from_parent(child: &ViewRef) {
    let parent = child.borrow().parent.upgrade();
    if let Some(parent) = parent {
        parent
            .borrow_mut()
            .children
            .retain(|c| !Rc::ptr_eq(c, child));
    }
    child.borrow_mut().parent = Weak::new();
}

/// Recursive-descent search; the receiver itself is considered first,
/// then children in insertion order. First match wins.
#[must_use]
pub fn find_view_by_id(view: &ViewRef, id: i32) -> Option<ViewRef> {
    if view.borrow().id == id {
        return Some(Rc::clone(view));
    }
    let children = view.borrow().children.clone();
    children.iter().find_map(|child| find_view_by_id(child, id))
}

// -- measurement ---------------------------------------------------------

enum MeasurePlan {
    Leaf { desired: (i32, i32) },
    Frame,
    Linear(Orientation),
}

/// Measures the subtree. Afterwards the view reports measured
/// dimensions respecting the passed specs.
pub fn measure(view: &ViewRef, width_spec: MeasureSpec, height_spec: MeasureSpec) {
    let (plan, padding, children) = {
        let v = view.borrow();
        let plan = match &v.kind {
            ViewKind::Plain => MeasurePlan::Leaf {
                desired: (
                    v.padding.0 + v.padding.2,
                    v.padding.1 + v.padding.3,
                ),
            },
            ViewKind::Text { text, text_size } => {
                let (tw, th) = crate::widget::text_metrics(text, *text_size);
                MeasurePlan::Leaf {
                    desired: (
                        tw + v.padding.0 + v.padding.2,
                        th + v.padding.1 + v.padding.3,
                    ),
                }
            }
            ViewKind::Frame => MeasurePlan::Frame,
            ViewKind::Linear { orientation } => MeasurePlan::Linear(*orientation),
        };
        (plan, v.padding, v.children.clone())
    };

    let pad_h = padding.0 + padding.2;
    let pad_v = padding.1 + padding.3;

    let desired = match plan {
        MeasurePlan::Leaf { desired } => desired,
        MeasurePlan::Frame => {
            let mut max_w = 0;
            let mut max_h = 0;
            for child in visible_children(&children) {
                let params = child.borrow().layout_params;
                let cw = child_measure_spec(width_spec, pad_h, params.width);
                let ch = child_measure_spec(height_spec, pad_v, params.height);
                measure(&child, cw, ch);
                let (mw, mh) = child.borrow().measured_size();
                max_w = max_w.max(mw);
                max_h = max_h.max(mh);
            }
            (max_w + pad_h, max_h + pad_v)
        }
        MeasurePlan::Linear(orientation) => {
            let mut main = 0;
            let mut cross = 0;
            for child in visible_children(&children) {
                let params = child.borrow().layout_params;
                let cw = child_measure_spec(width_spec, pad_h, params.width);
                let ch = child_measure_spec(height_spec, pad_v, params.height);
                measure(&child, cw, ch);
                let (mw, mh) = child.borrow().measured_size();
                match orientation {
                    Orientation::Vertical => {
                        main += mh;
                        cross = cross.max(mw);
                    }
                    Orientation::Horizontal => {
                        main += mw;
                        cross = cross.max(mh);
                    }
                }
            }
            match orientation {
                Orientation::Vertical => (cross + pad_h, main + pad_v),
                Orientation::Horizontal => (main + pad_h, cross + pad_v),
            }
        }
    };

    let mut v = view.borrow_mut();
    v.measured_width = width_spec.resolve(desired.0);
    v.measured_height = height_spec.resolve(desired.1);
}

fn visible_children(children: &[ViewRef]) -> impl Iterator<Item = ViewRef> + '_ {
    children
        .iter()
        .filter(|c| c.borrow().visibility != Visibility::Gone)
        .map(Rc::clone)
}

// -- layout --------------------------------------------------------------

/// Writes the geometry (parent-relative) and positions children from
/// their measured dimensions.
pub fn layout(view: &ViewRef, left: i32, top: i32, right: i32, bottom: i32) {
    let (plan, padding, children) = {
        let mut v = view.borrow_mut();
        v.left = left;
        v.top = top;
        v.right = right;
        v.bottom = bottom;
        let plan = match &v.kind {
            ViewKind::Linear { orientation } => Some(*orientation),
            _ => None,
        };
        (plan, v.padding, v.children.clone())
    };

    match plan {
        None => {
            // Frame-like containers stack children at the padded origin.
            for child in visible_children(&children) {
                let (mw, mh) = child.borrow().measured_size();
                layout(&child, padding.0, padding.1, padding.0 + mw, padding.1 + mh);
            }
        }
        Some(Orientation::Vertical) => {
            let mut y = padding.1;
            for child in visible_children(&children) {
                let (mw, mh) = child.borrow().measured_size();
                layout(&child, padding.0, y, padding.0 + mw, y + mh);
                y += mh;
            }
        }
        Some(Orientation::Horizontal) => {
            let mut x = padding.0;
            for child in visible_children(&children) {
                let (mw, mh) = child.borrow().measured_size();
                layout(&child, x, padding.1, x + mw, padding.1 + mh);
                x += mw;
            }
        }
    }
}

// -- drawing -------------------------------------------------------------

/// Records the subtree into the canvas command list.
pub fn draw(view: &ViewRef, canvas: &mut Canvas) {
    {
        let v = view.borrow();
        if v.visibility != Visibility::Visible {
            return;
        }
        if let Some(color) = v.background {
            canvas.set_color(color);
            canvas.fill_rect(0, 0, v.width(), v.height());
        }
        if let ViewKind::Text { text, text_size } = &v.kind {
            canvas.set_color(v.text_color);
            canvas.draw_text(v.padding.0, v.padding.1 + *text_size, text, *text_size);
        }
    }

    let children = view.borrow().children.clone();
    for child in &children {
        if child.borrow().visibility == Visibility::Gone {
            continue;
        }
        let (cl, ct) = {
            let c = child.borrow();
            (c.left, c.top)
        };
        canvas.save();
        canvas.translate(cl, ct);
        draw(child, canvas);
        canvas.restore();
    }
}

// -- touch dispatch ------------------------------------------------------

/// Routes a touch event through the subtree per the capture protocol:
/// hit-test on `DOWN`, then deliver the rest of the gesture to the
/// captured target even if it leaves the bounds.
pub fn dispatch_touch_event(view: &ViewRef, event: &MotionEvent) -> bool {
    if event.action == Action::Down {
        view.borrow_mut().touch_target = None;
    }

    let intercepted = on_intercept_touch_event(view, event);

    if !intercepted {
        if event.action == Action::Down {
            let target = hit_test_children(view, event.x, event.y);
            view.borrow_mut().touch_target = target;
        }

        let target = view.borrow().touch_target.clone();
        if let Some(target) = target {
            let (dx, dy) = {
                let t = target.borrow();
                (t.left, t.top)
            };
            let child_event = event.offset(-dx, -dy);
            let handled = dispatch_touch_event(&target, &child_event);
            if matches!(event.action, Action::Up | Action::Cancel) {
                view.borrow_mut().touch_target = None;
            }
            if handled {
                return true;
            }
        }
    }

    let handled = on_touch_event(view, event);
    if matches!(event.action, Action::Up | Action::Cancel) {
        view.borrow_mut().touch_target = None;
    }
    handled
}

// Containers may claim the gesture before their children see it. No
// built-in container intercepts; a touch listener returning true from a
// MOVE takes the same role.
fn on_intercept_touch_event(_view: &ViewRef, _event: &MotionEvent) -> bool {
    false
}

/// Reverse-order scan: the top-most (last drawn) child wins the hit.
fn hit_test_children(view: &ViewRef, x: i32, y: i32) -> Option<ViewRef> {
    let children = view.borrow().children.clone();
    for child in children.iter().rev() {
        let c = child.borrow();
        if c.visibility != Visibility::Visible {
            continue;
        }
        if x >= c.left && x < c.right && y >= c.top && y < c.bottom {
            return Some(Rc::clone(child));
        }
    }
    None
}

/// The view's own handling: touch listener first, then click behavior.
fn on_touch_event(view: &ViewRef, event: &MotionEvent) -> bool {
    // The listener is taken out for the call so it may re-borrow the
    // view without panicking.
    let mut listener = view.borrow_mut().on_touch.take();
    let mut consumed = false;
    if let Some(handler) = listener.as_mut() {
        consumed = handler(event);
    }
    if let Some(handler) = listener {
        let mut v = view.borrow_mut();
        if v.on_touch.is_none() {
            v.on_touch = Some(handler);
        }
    }
    if consumed {
        return true;
    }

    if view.borrow().clickable {
        if event.action == Action::Up {
            perform_click(view);
        }
        return true;
    }
    false
}

/// Fires the click listener, if any.
pub fn perform_click(view: &ViewRef) -> bool {
    let mut listener = view.borrow_mut().on_click.take();
    let fired = listener.is_some();
    if let Some(handler) = listener.as_mut() {
        handler();
    }
    if let Some(handler) = listener {
        let mut v = view.borrow_mut();
        if v.on_click.is_none() {
            v.on_click = Some(handler);
        }
    }
    fired
}

/// Checks the child-list/parent invariant for a subtree. Diagnostics
/// only.
pub fn validate_tree(view: &ViewRef) -> ShimResult<()> {
    let children = view.borrow().children.clone();
    for child in &children {
        let parent = child.borrow().parent.upgrade();
        match parent {
            Some(ref p) if Rc::ptr_eq(p, view) => {}
            _ => {
                return Err(ShimError::Lifecycle(
                    "child's parent back-reference does not own it".to_string(),
                ))
            }
        }
        validate_tree(child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_spec_roundtrip() {
        for mode in [SpecMode::Unspecified, SpecMode::Exactly, SpecMode::AtMost] {
            for size in [0, 1, 17, 480, (1 << 30) - 1] {
                let spec = MeasureSpec::make(size, mode);
                assert_eq!(spec.spec_mode(), mode);
                assert_eq!(spec.size(), size);
                assert_eq!(spec.mode(), mode as u32);
            }
        }
    }

    #[test]
    fn child_spec_table() {
        let exactly = MeasureSpec::make(100, SpecMode::Exactly);
        let at_most = MeasureSpec::make(100, SpecMode::AtMost);
        let unspec = MeasureSpec::make(0, SpecMode::Unspecified);

        // Specific dimension always wins.
        assert_eq!(
            child_measure_spec(exactly, 10, 40),
            MeasureSpec::make(40, SpecMode::Exactly)
        );
        assert_eq!(
            child_measure_spec(unspec, 0, 40),
            MeasureSpec::make(40, SpecMode::Exactly)
        );

        // MATCH_PARENT inherits the parent mode, minus padding.
        assert_eq!(
            child_measure_spec(exactly, 10, LayoutParams::MATCH_PARENT),
            MeasureSpec::make(90, SpecMode::Exactly)
        );
        assert_eq!(
            child_measure_spec(at_most, 10, LayoutParams::MATCH_PARENT),
            MeasureSpec::make(90, SpecMode::AtMost)
        );

        // WRAP_CONTENT is bounded by the available space.
        assert_eq!(
            child_measure_spec(exactly, 10, LayoutParams::WRAP_CONTENT),
            MeasureSpec::make(90, SpecMode::AtMost)
        );

        // Unspecified parents impose nothing.
        assert_eq!(
            child_measure_spec(unspec, 0, LayoutParams::MATCH_PARENT),
            MeasureSpec::make(0, SpecMode::Unspecified)
        );
    }

    #[test]
    fn geometry_is_consistent_after_layout() {
        let root = View::new(ViewKind::Frame);
        let child = View::new(ViewKind::Plain);
        child
            .borrow_mut()
            .set_layout_params(LayoutParams::new(200, 100));
        add_child(&root, &child);

        measure(
            &root,
            MeasureSpec::make(480, SpecMode::Exactly),
            MeasureSpec::make(800, SpecMode::Exactly),
        );
        layout(&root, 0, 0, 480, 800);

        let r = root.borrow();
        assert_eq!(r.frame(), (0, 0, 480, 800));
        let c = child.borrow();
        assert_eq!(c.frame(), (0, 0, 200, 100));
        assert!(c.right >= c.left && c.bottom >= c.top);
    }

    #[test]
    fn linear_layout_stacks_children() {
        let root = View::new(ViewKind::Linear {
            orientation: Orientation::Vertical,
        });
        let a = View::new(ViewKind::Plain);
        a.borrow_mut().set_layout_params(LayoutParams::new(100, 40));
        let b = View::new(ViewKind::Plain);
        b.borrow_mut().set_layout_params(LayoutParams::new(80, 60));
        add_child(&root, &a);
        add_child(&root, &b);

        measure(
            &root,
            MeasureSpec::make(480, SpecMode::Exactly),
            MeasureSpec::make(800, SpecMode::Exactly),
        );
        layout(&root, 0, 0, 480, 800);

        assert_eq!(a.borrow().frame(), (0, 0, 100, 40));
        assert_eq!(b.borrow().frame(), (0, 40, 80, 100));
    }

    #[test]
    fn gone_children_are_skipped() {
        let root = View::new(ViewKind::Linear {
            orientation: Orientation::Vertical,
        });
        let a = View::new(ViewKind::Plain);
        a.borrow_mut().set_layout_params(LayoutParams::new(100, 40));
        a.borrow_mut().set_visibility(Visibility::Gone);
        let b = View::new(ViewKind::Plain);
        b.borrow_mut().set_layout_params(LayoutParams::new(80, 60));
        add_child(&root, &a);
        add_child(&root, &b);

        measure(
            &root,
            MeasureSpec::make(480, SpecMode::Exactly),
            MeasureSpec::make(800, SpecMode::Exactly),
        );
        layout(&root, 0, 0, 480, 800);

        assert_eq!(b.borrow().frame(), (0, 0, 80, 60));
    }

    #[test]
    fn find_view_first_match_wins() {
        let root = View::new(ViewKind::Frame);
        let a = View::new(ViewKind::Plain);
        a.borrow_mut().set_id(7);
        let b = View::new(ViewKind::Plain);
        b.borrow_mut().set_id(7);
        add_child(&root, &a);
        add_child(&root, &b);

        let found = find_view_by_id(&root, 7).unwrap();
        assert!(Rc::ptr_eq(&found, &a));
        assert!(find_view_by_id(&root, 42).is_none());
    }

    fn clickable_child_in_frame() -> (ViewRef, ViewRef, Rc<RefCell<u32>>) {
        let root = View::new(ViewKind::Frame);
        let child = View::new(ViewKind::Plain);
        child
            .borrow_mut()
            .set_layout_params(LayoutParams::new(200, 100));
        let clicks = Rc::new(RefCell::new(0u32));
        let counter = Rc::clone(&clicks);
        child.borrow_mut().set_on_click(Box::new(move || {
            *counter.borrow_mut() += 1;
        }));
        add_child(&root, &child);
        measure(
            &root,
            MeasureSpec::make(480, SpecMode::Exactly),
            MeasureSpec::make(800, SpecMode::Exactly),
        );
        layout(&root, 0, 0, 480, 800);
        (root, child, clicks)
    }

    #[test]
    fn tap_inside_child_clicks_once() {
        let (root, _child, clicks) = clickable_child_in_frame();

        let down = MotionEvent::new(1, 1, Action::Down, 100, 50);
        let up = MotionEvent::new(1, 2, Action::Up, 100, 50);
        assert!(dispatch_touch_event(&root, &down));
        assert!(dispatch_touch_event(&root, &up));
        assert_eq!(*clicks.borrow(), 1);
    }

    #[test]
    fn tap_outside_child_clicks_nothing() {
        let (root, _child, clicks) = clickable_child_in_frame();

        let down = MotionEvent::new(1, 1, Action::Down, 300, 200);
        let up = MotionEvent::new(1, 2, Action::Up, 300, 200);
        dispatch_touch_event(&root, &down);
        dispatch_touch_event(&root, &up);
        assert_eq!(*clicks.borrow(), 0);
    }

    #[test]
    fn touch_target_is_captured_for_the_gesture() {
        let (root, child, clicks) = clickable_child_in_frame();

        let down = MotionEvent::new(1, 1, Action::Down, 100, 50);
        assert!(dispatch_touch_event(&root, &down));
        assert!(root.borrow().touch_target.is_some());

        // The move leaves the child's bounds; the target keeps it.
        let wander = MotionEvent::new(1, 2, Action::Move, 400, 700);
        assert!(dispatch_touch_event(&root, &wander));
        let target = root.borrow().touch_target.clone().unwrap();
        assert!(Rc::ptr_eq(&target, &child));

        let up = MotionEvent::new(1, 3, Action::Up, 400, 700);
        assert!(dispatch_touch_event(&root, &up));
        assert!(root.borrow().touch_target.is_none());
        assert_eq!(*clicks.borrow(), 1);
    }

    #[test]
    fn invisible_children_are_not_hit() {
        let (root, child, clicks) = clickable_child_in_frame();
        child.borrow_mut().set_visibility(Visibility::Invisible);

        dispatch_touch_event(&root, &MotionEvent::new(1, 1, Action::Down, 100, 50));
        dispatch_touch_event(&root, &MotionEvent::new(1, 2, Action::Up, 100, 50));
        assert_eq!(*clicks.borrow(), 0);
    }

    #[test]
    fn touch_listener_consumes_before_click() {
        let (root, child, clicks) = clickable_child_in_frame();
        child
            .borrow_mut()
            .set_on_touch(Box::new(|_event| true));

        dispatch_touch_event(&root, &MotionEvent::new(1, 1, Action::Down, 100, 50));
        dispatch_touch_event(&root, &MotionEvent::new(1, 2, Action::Up, 100, 50));
        assert_eq!(*clicks.borrow(), 0);
    }

    #[test]
    fn tree_invariant_holds() {
        let (root, child, _) = clickable_child_in_frame();
        assert!(validate_tree(&root).is_ok());
        remove_from_parent(&child);
        assert!(root.borrow().children.is_empty());
    }
}
