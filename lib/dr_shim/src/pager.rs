//! A paged container with offscreen-page eviction.
//!
//! The pager keeps instantiated pages inside the window
//! `[current - limit, current + limit]` intersected with `[0, count)`.
//! Every position change instantiates the pages that entered the window
//! and destroys the ones that left it, through the adapter.

use crate::view::ViewRef;
use std::any::Any;
use std::collections::BTreeMap;
use std::rc::Rc;

/// The opaque key an adapter returns for an instantiated page.
pub type PageKey = Rc<dyn Any>;

pub trait PagerAdapter {
    fn count(&self) -> usize;

    /// Creates the page for `position`, attaching its view to the
    /// container, and returns the page key.
    fn instantiate_item(&mut self, container: &ViewRef, position: usize) -> PageKey;

    /// Tears the page down, detaching its view from the container.
    fn destroy_item(&mut self, container: &ViewRef, position: usize, key: &PageKey);

    /// Associates a child view with a page key; used to disambiguate
    /// hit-tests after a data-set change.
    fn is_view_from_object(&self, view: &ViewRef, key: &PageKey) -> bool;
}

pub struct ViewPager {
    container: ViewRef,
    adapter: Option<Box<dyn PagerAdapter>>,
    current: usize,
    offscreen_limit: usize,
    pages: BTreeMap<usize, PageKey>,
}

impl ViewPager {
    #[must_use]
    pub fn new(container: ViewRef) -> Self {
        Self {
            container,
            adapter: None,
            current: 0,
            offscreen_limit: 1,
            pages: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> ViewRef {
        Rc::clone(&self.container)
    }

    #[inline]
    #[must_use]
    pub const fn current_item(&self) -> usize {
        self.current
    }

    #[inline]
    #[must_use]
    pub const fn offscreen_page_limit(&self) -> usize {
        self.offscreen_limit
    }

    /// Positions currently instantiated, in order.
    #[must_use]
    pub fn instantiated_positions(&self) -> Vec<usize> {
        self.pages.keys().copied().collect()
    }

    pub fn set_adapter(&mut self, adapter: Box<dyn PagerAdapter>) {
        // Pages of a previous adapter are torn down first.
        self.evict_all();
        self.adapter = Some(adapter);
        self.current = 0;
        self.populate();
    }

    pub fn set_offscreen_page_limit(&mut self, limit: usize) {
        self.offscreen_limit = limit.max(1);
        self.populate();
    }

    pub fn set_current_item(&mut self, position: usize) {
        let count = self.adapter.as_ref().map_or(0, |a| a.count());
        if count == 0 {
            return;
        }
        self.current = position.min(count - 1);
        self.populate();
    }

    /// Finds the page key owning `view`, if any.
    #[must_use]
    pub fn page_for_view(&self, view: &ViewRef) -> Option<(usize, &PageKey)> {
        let adapter = self.adapter.as_ref()?;
        self.pages
            .iter()
            .find(|(_, key)| adapter.is_view_from_object(view, key))
            .map(|(position, key)| (*position, key))
    }

    fn evict_all(&mut self) {
        if let Some(adapter) = self.adapter.as_mut() {
            for (position, key) in std::mem::take(&mut self.pages) {
                adapter.destroy_item(&self.container, position, &key);
            }
        }
        self.pages.clear();
    }

    // Reconciles the instantiated set with the retention window.
    fn populate(&mut self) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        let count = adapter.count();
        if count == 0 {
            for (position, key) in std::mem::take(&mut self.pages) {
                adapter.destroy_item(&self.container, position, &key);
            }
            return;
        }

        let lo = self.current.saturating_sub(self.offscreen_limit);
        let hi = (self.current + self.offscreen_limit).min(count - 1);

        let evicted: Vec<usize> = self
            .pages
            .keys()
            .copied()
            .filter(|p| *p < lo || *p > hi)
            .collect();
        for position in evicted {
            if let Some(key) = self.pages.remove(&position) {
                log::debug!("pager: destroying page {position}");
                adapter.destroy_item(&self.container, position, &key);
            }
        }

        for position in lo..=hi {
            if !self.pages.contains_key(&position) {
                log::debug!("pager: instantiating page {position}");
                let key = adapter.instantiate_item(&self.container, position);
                self.pages.insert(position, key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{add_child, remove_from_parent, View, ViewKind};
    use std::cell::RefCell;

    /// Records instantiate/destroy calls; each key is the page's view.
    struct RecordingAdapter {
        count: usize,
        log: Rc<RefCell<Vec<(String, usize)>>>,
    }

    impl PagerAdapter for RecordingAdapter {
        fn count(&self) -> usize {
            self.count
        }

        fn instantiate_item(&mut self, container: &ViewRef, position: usize) -> PageKey {
            self.log.borrow_mut().push(("new".to_string(), position));
            let view = View::new(ViewKind::Plain);
            add_child(container, &view);
            Rc::new(view)
        }

        fn destroy_item(&mut self, _container: &ViewRef, position: usize, key: &PageKey) {
            self.log.borrow_mut().push(("del".to_string(), position));
            if let Some(view) = key.downcast_ref::<ViewRef>() {
                remove_from_parent(view);
            }
        }

        fn is_view_from_object(&self, view: &ViewRef, key: &PageKey) -> bool {
            key.downcast_ref::<ViewRef>()
                .is_some_and(|page| Rc::ptr_eq(page, view))
        }
    }

    fn pager_with_pages(count: usize) -> (ViewPager, Rc<RefCell<Vec<(String, usize)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let container = View::new(ViewKind::Frame);
        let mut pager = ViewPager::new(container);
        pager.set_adapter(Box::new(RecordingAdapter {
            count,
            log: Rc::clone(&log),
        }));
        (pager, log)
    }

    #[test]
    fn initial_window_with_limit_one() {
        let (pager, _log) = pager_with_pages(5);
        assert_eq!(pager.instantiated_positions(), vec![0, 1]);
    }

    #[test]
    fn jump_evicts_pages_leaving_the_window() {
        let (mut pager, log) = pager_with_pages(5);
        log.borrow_mut().clear();

        pager.set_current_item(3);
        let positions = pager.instantiated_positions();
        assert_eq!(positions, vec![2, 3, 4]);

        let destroyed: Vec<usize> = log
            .borrow()
            .iter()
            .filter(|(op, _)| op == "del")
            .map(|(_, p)| *p)
            .collect();
        assert_eq!(destroyed, vec![0, 1]);
    }

    #[test]
    fn window_is_clamped_to_the_page_range() {
        let (mut pager, _log) = pager_with_pages(5);
        pager.set_current_item(4);
        assert_eq!(pager.instantiated_positions(), vec![3, 4]);
    }

    #[test]
    fn larger_limit_widens_the_window() {
        let (mut pager, _log) = pager_with_pages(7);
        pager.set_current_item(3);
        pager.set_offscreen_page_limit(2);
        assert_eq!(pager.instantiated_positions(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn container_children_track_the_pages() {
        let (mut pager, _log) = pager_with_pages(5);
        assert_eq!(pager.view().borrow().children.len(), 2);
        pager.set_current_item(3);
        assert_eq!(pager.view().borrow().children.len(), 3);
    }

    #[test]
    fn page_for_view_disambiguates() {
        let (pager, _log) = pager_with_pages(3);
        let child = pager.view().borrow().children[0].clone();
        let (position, _) = pager.page_for_view(&child).unwrap();
        assert_eq!(position, 0);

        let stranger = View::new(ViewKind::Plain);
        assert!(pager.page_for_view(&stranger).is_none());
    }
}
