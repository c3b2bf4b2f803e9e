//! Common widgets: constructors over the view kinds, plus the list
//! containers.

use crate::view::{add_child, remove_from_parent, Orientation, View, ViewKind, ViewRef};
use std::rc::Rc;

pub const DEFAULT_TEXT_SIZE: i32 = 14;
const BUTTON_BACKGROUND: u32 = 0xffd6_d6d6;

// Approximate text metrics: a fixed advance per glyph, a line height
// proportional to the text size. Good enough for layout; pixel-exact
// platform text is a non-goal.
pub(crate) fn char_advance(text_size: i32) -> i32 {
    (text_size * 6 + 9) / 10
}

pub(crate) fn text_metrics(text: &str, text_size: i32) -> (i32, i32) {
    let advance = char_advance(text_size);
    let width = advance * text.chars().count() as i32;
    let height = (text_size * 12 + 9) / 10;
    (width, height)
}

#[must_use]
pub fn frame_layout() -> ViewRef {
    View::new(ViewKind::Frame)
}

#[must_use]
pub fn linear_layout(orientation: Orientation) -> ViewRef {
    View::new(ViewKind::Linear { orientation })
}

#[must_use]
pub fn text_view(text: &str) -> ViewRef {
    View::new(ViewKind::Text {
        text: text.to_string(),
        text_size: DEFAULT_TEXT_SIZE,
    })
}

#[must_use]
pub fn button(text: &str) -> ViewRef {
    let view = View::new(ViewKind::Text {
        text: text.to_string(),
        text_size: DEFAULT_TEXT_SIZE,
    });
    {
        let mut v = view.borrow_mut();
        v.set_clickable(true);
        v.set_background_color(BUTTON_BACKGROUND);
        v.set_padding(8, 4, 8, 4);
    }
    view
}

/// The adapter contract of the linear list container.
pub trait RecyclerAdapter {
    fn item_count(&self) -> usize;
    /// Creates the view for one position.
    fn create_view(&mut self, position: usize) -> ViewRef;
}

/// A deliberately small recycler: binds every position eagerly into a
/// vertical strip. Enough surface for guest adapters routed through the
/// shim.
pub struct RecyclerView {
    view: ViewRef,
    adapter: Option<Box<dyn RecyclerAdapter>>,
}

impl RecyclerView {
    #[must_use]
    pub fn new() -> Self {
        Self {
            view: linear_layout(Orientation::Vertical),
            adapter: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> ViewRef {
        Rc::clone(&self.view)
    }

    pub fn set_adapter(&mut self, adapter: Box<dyn RecyclerAdapter>) {
        self.adapter = Some(adapter);
        self.rebind();
    }

    /// Rebuilds the children from the adapter (data-set change).
    pub fn rebind(&mut self) {
        let children = self.view.borrow().children.clone();
        for child in &children {
            remove_from_parent(child);
        }
        if let Some(adapter) = self.adapter.as_mut() {
            for position in 0..adapter.item_count() {
                let child = adapter.create_view(position);
                add_child(&self.view, &child);
            }
        }
    }
}

impl Default for RecyclerView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{measure, MeasureSpec, SpecMode};

    #[test]
    fn text_metrics_scale_with_length() {
        let (w1, h) = text_metrics("ab", 14);
        let (w2, _) = text_metrics("abcd", 14);
        assert_eq!(w2, 2 * w1);
        assert!(h > 14);
    }

    #[test]
    fn text_view_measures_its_text() {
        let view = text_view("hello");
        measure(
            &view,
            MeasureSpec::make(480, SpecMode::AtMost),
            MeasureSpec::make(800, SpecMode::AtMost),
        );
        let (w, h) = view.borrow().measured_size();
        let (tw, th) = text_metrics("hello", DEFAULT_TEXT_SIZE);
        assert_eq!((w, h), (tw, th));
    }

    #[test]
    fn button_is_clickable_and_padded() {
        let view = button("go");
        let v = view.borrow();
        assert!(v.is_clickable());
        assert_eq!(v.text(), Some("go"));
    }

    struct CountingAdapter(usize);

    impl RecyclerAdapter for CountingAdapter {
        fn item_count(&self) -> usize {
            self.0
        }

        fn create_view(&mut self, position: usize) -> ViewRef {
            text_view(&format!("row {position}"))
        }
    }

    #[test]
    fn recycler_binds_every_position() {
        let mut recycler = RecyclerView::new();
        recycler.set_adapter(Box::new(CountingAdapter(3)));
        assert_eq!(recycler.view().borrow().children.len(), 3);

        recycler.set_adapter(Box::new(CountingAdapter(1)));
        assert_eq!(recycler.view().borrow().children.len(), 1);
    }
}
