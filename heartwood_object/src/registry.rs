// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The branchable class registry.
//!
//! Deserialization resolves class-name tags through a [`ClassRegistry`]
//! branch. Classes register into the thread-local root branch by default;
//! a class hierarchy can re-point itself at an isolated branch so its
//! names never collide with (or leak into) the rest of the process.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::class::ObjectClass;
use crate::error::{BuildError, UnknownClass};

thread_local! {
    static ROOT: ClassRegistry = ClassRegistry::branch_with_label("root");
}

/// A mapping from class name to class schema, scoped to one branch.
///
/// Registries are cheap-clone handles over shared state: cloning yields a
/// second handle to the same branch, while [`ClassRegistry::branch`]
/// yields a new, isolated branch. Lookups are class-name-exact.
///
/// # Example
///
/// ```rust
/// use heartwood_object::ClassRegistry;
///
/// let branch = ClassRegistry::root().branch("plugins");
/// assert!(branch.is_empty());
/// assert!(branch.lookup("Anything").is_err());
/// ```
#[derive(Clone)]
pub struct ClassRegistry {
    label: &'static str,
    classes: Rc<RefCell<HashMap<&'static str, Arc<ObjectClass>>>>,
}

impl ClassRegistry {
    /// The thread-local root branch, which classes register into unless
    /// re-pointed.
    #[must_use]
    pub fn root() -> Self {
        ROOT.with(Self::clone)
    }

    /// Creates a new, isolated branch.
    ///
    /// The receiver only supplies the place in the branch tree this was
    /// created from; the result shares nothing with it.
    #[must_use]
    pub fn branch(&self, label: &'static str) -> Self {
        Self::branch_with_label(label)
    }

    fn branch_with_label(label: &'static str) -> Self {
        Self {
            label,
            classes: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Registers a class under its own name.
    ///
    /// Duplicate names are rejected rather than overwritten.
    pub fn register(&self, class: &Arc<ObjectClass>) -> Result<(), BuildError> {
        let mut classes = self.classes.borrow_mut();
        if classes.contains_key(class.name()) {
            return Err(BuildError::DuplicateClass { class: class.name() });
        }
        classes.insert(class.name(), class.clone());
        Ok(())
    }

    /// Resolves a class name in this branch.
    pub fn lookup(&self, name: &str) -> Result<Arc<ObjectClass>, UnknownClass> {
        self.classes
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| UnknownClass::new(name))
    }

    /// Returns `true` if the name is registered in this branch.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.borrow().contains_key(name)
    }

    /// The number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.borrow().len()
    }

    /// Returns `true` if no classes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.borrow().is_empty()
    }

    /// Returns `true` if both handles point at the same branch.
    #[must_use]
    pub fn same_branch(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.classes, &other.classes)
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("label", &self.label)
            .field("count", &self.classes.borrow().len())
            .field(
                "classes",
                &self.classes.borrow().keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branches_are_isolated() {
        let a = ClassRegistry::root().branch("a");
        let b = a.branch("b");
        assert!(!a.same_branch(&b));
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn clones_share_a_branch() {
        let a = ClassRegistry::root().branch("a");
        let a2 = a.clone();
        assert!(a.same_branch(&a2));
    }

    #[test]
    fn lookup_of_unknown_name_fails() {
        let branch = ClassRegistry::root().branch("empty");
        let err = branch.lookup("Missing").unwrap_err();
        assert!(format!("{err}").contains("`Missing`"));
    }

    #[test]
    fn root_is_stable_within_a_thread() {
        let a = ClassRegistry::root();
        let b = ClassRegistry::root();
        assert!(a.same_branch(&b));
    }
}
