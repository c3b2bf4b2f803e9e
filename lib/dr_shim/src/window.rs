//! The window: fixed dimensions, one content root, a recording canvas.

use crate::canvas::{rasterize, Canvas, DrawCommand};
use crate::view::{
    dispatch_touch_event, draw, layout, measure, Action, MeasureSpec, MotionEvent, SpecMode,
    ViewRef,
};
use image::RgbaImage;
use std::rc::Rc;

#[derive(Debug)]
pub struct Window {
    width: i32,
    height: i32,
    root: Option<ViewRef>,
    next_event_time: u64,
}

impl Window {
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            root: None,
            next_event_time: 1,
        }
    }

    #[inline]
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> Option<ViewRef> {
        self.root.as_ref().map(Rc::clone)
    }

    pub fn set_content(&mut self, view: ViewRef) {
        self.root = Some(view);
        self.perform_layout();
    }

    pub fn clear_content(&mut self) {
        self.root = None;
    }

    /// Runs the measure and layout passes over the content root with
    /// the window dimensions as exact constraints.
    pub fn perform_layout(&mut self) {
        if let Some(root) = &self.root {
            measure(
                root,
                MeasureSpec::make(self.width, SpecMode::Exactly),
                MeasureSpec::make(self.height, SpecMode::Exactly),
            );
            layout(root, 0, 0, self.width, self.height);
        }
    }

    /// Hands a touch event to the content root. Events outside the
    /// window are silently not handled.
    pub fn dispatch_touch(&mut self, event: &MotionEvent) -> bool {
        if event.x < 0 || event.y < 0 || event.x >= self.width || event.y >= self.height {
            return false;
        }
        match &self.root {
            Some(root) => dispatch_touch_event(root, event),
            None => false,
        }
    }

    /// Synthesizes a down+up pair at the given window coordinates.
    pub fn tap(&mut self, x: i32, y: i32) -> bool {
        let down_time = self.next_event_time;
        self.next_event_time += 2;
        let down = MotionEvent::new(down_time, down_time, Action::Down, x, y);
        let up = MotionEvent::new(down_time, down_time + 1, Action::Up, x, y);
        let handled_down = self.dispatch_touch(&down);
        let handled_up = self.dispatch_touch(&up);
        handled_down || handled_up
    }

    /// Records the current content into a fresh command list.
    #[must_use]
    pub fn record(&self) -> Vec<DrawCommand> {
        let mut canvas = Canvas::new();
        if let Some(root) = &self.root {
            draw(root, &mut canvas);
        }
        canvas.into_commands()
    }

    /// Rasterizes the recorded command list at the window's dimensions.
    #[must_use]
    pub fn screenshot(&self) -> RgbaImage {
        let commands = self.record();
        rasterize(&commands, self.width.max(0) as u32, self.height.max(0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{add_child, LayoutParams, View, ViewKind};
    use std::cell::RefCell;

    #[test]
    fn out_of_bounds_taps_are_ignored() {
        let mut window = Window::new(480, 800);
        let root = View::new(ViewKind::Frame);
        root.borrow_mut().set_clickable(true);
        window.set_content(root);

        assert!(!window.dispatch_touch(&MotionEvent::new(1, 1, Action::Down, -1, 10)));
        assert!(!window.dispatch_touch(&MotionEvent::new(1, 1, Action::Down, 480, 10)));
        assert!(window.dispatch_touch(&MotionEvent::new(1, 1, Action::Down, 10, 10)));
    }

    #[test]
    fn tap_synthesizes_a_click() {
        let mut window = Window::new(480, 800);
        let root = View::new(ViewKind::Frame);
        let child = View::new(ViewKind::Plain);
        child
            .borrow_mut()
            .set_layout_params(LayoutParams::new(200, 100));
        let clicks = std::rc::Rc::new(RefCell::new(0u32));
        let counter = std::rc::Rc::clone(&clicks);
        child.borrow_mut().set_on_click(Box::new(move || {
            *counter.borrow_mut() += 1;
        }));
        add_child(&root, &child);
        window.set_content(root);

        assert!(window.tap(100, 50));
        assert_eq!(*clicks.borrow(), 1);

        assert!(!window.tap(300, 200));
        assert_eq!(*clicks.borrow(), 1);
    }

    #[test]
    fn screenshot_has_window_dimensions() {
        let mut window = Window::new(32, 16);
        let root = View::new(ViewKind::Frame);
        root.borrow_mut().set_background_color(0xff12_3456);
        window.set_content(root);

        let image = window.screenshot();
        assert_eq!(image.dimensions(), (32, 16));
        assert_eq!(image.get_pixel(0, 0).0, [0x12, 0x34, 0x56, 255]);
    }
}
