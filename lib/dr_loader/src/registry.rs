//! The loaded-class registry.
//!
//! Read-only after construction: the driver loads every translated and
//! rewritten class unit up front, then the shim layer looks classes up
//! by internal name.

use crate::host::HostClass;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, HostClass>,
}

impl ClassRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class unit. The first definition of a name wins, as
    /// with multidex class precedence.
    pub fn register(&mut self, class: HostClass) {
        if self.classes.contains_key(&class.name) {
            log::debug!("duplicate class definition for {} ignored", class.name);
            return;
        }
        self.classes.insert(class.name.clone(), class);
    }

    #[must_use]
    pub fn get(&self, internal_name: &str) -> Option<&HostClass> {
        self.classes.get(internal_name)
    }

    /// Looks a class up by dotted binary name (`com.example.Main`).
    #[must_use]
    pub fn get_by_binary_name(&self, binary_name: &str) -> Option<&HostClass> {
        self.get(&binary_name.replace('.', "/"))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &HostClass> {
        self.classes.values()
    }

    /// Classes extending (directly) the given internal name.
    pub fn subclasses_of<'a>(
        &'a self,
        internal_name: &'a str,
    ) -> impl Iterator<Item = &'a HostClass> {
        self.classes
            .values()
            .filter(move |c| c.super_name.as_deref() == Some(internal_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ConstPool;

    fn class(name: &str, super_name: &str) -> HostClass {
        HostClass {
            name: name.to_string(),
            super_name: Some(super_name.to_string()),
            interfaces: vec![],
            access: 0x1,
            fields: vec![],
            methods: vec![],
            pool: ConstPool::new(),
        }
    }

    #[test]
    fn first_definition_wins() {
        let mut registry = ClassRegistry::new();
        registry.register(class("com/example/Main", "java/lang/Object"));
        registry.register(class("com/example/Main", "other/Super"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("com/example/Main").unwrap().super_name.as_deref(),
            Some("java/lang/Object")
        );
    }

    #[test]
    fn binary_name_lookup() {
        let mut registry = ClassRegistry::new();
        registry.register(class("com/example/Main", "java/lang/Object"));
        assert!(registry.get_by_binary_name("com.example.Main").is_some());
        assert!(registry.get_by_binary_name("com.example.Other").is_none());
    }
}
