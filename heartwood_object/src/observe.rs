// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The notification bus: observers, change payloads, and suspension.
//!
//! Two observer kinds exist per property:
//!
//! - **Validating observers** run after descriptor validation and before
//!   commit. Each may replace the candidate with a further-coerced value or
//!   reject it; the first rejection aborts the assignment.
//! - **Change observers** run strictly after commit. Their failures belong
//!   to the observer, not the assignment, and never roll the store back.
//!
//! Observers register either on a class (through the builder, applying to
//! every instance) or on a single instance. [`suspend`] disables either
//! kind, or both, for the duration of an RAII scope; nested scopes compose
//! and the counters are released on every exit path.

use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;
use std::rc::Rc;

use hashbrown::HashMap;
use heartwood_descriptor::{ErasedValue, InvalidValue};

use crate::error::ObserverError;
use crate::object::Object;

/// The payload handed to observers: one property's transition.
///
/// `None` for [`Change::previous`] means the property was unset before the
/// assignment; `None` for [`Change::value`] means the assignment unsets it.
#[derive(Debug)]
pub struct Change<'a> {
    property: &'a str,
    previous: Option<&'a ErasedValue>,
    value: Option<&'a ErasedValue>,
}

impl<'a> Change<'a> {
    pub(crate) fn new(
        property: &'a str,
        previous: Option<&'a ErasedValue>,
        value: Option<&'a ErasedValue>,
    ) -> Self {
        Self {
            property,
            previous,
            value,
        }
    }

    /// The property being assigned.
    #[must_use]
    pub fn property(&self) -> &str {
        self.property
    }

    /// The committed value before the assignment, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&'a ErasedValue> {
        self.previous
    }

    /// The candidate (pre-commit) or committed (post-commit) value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&'a ErasedValue> {
        self.value
    }
}

/// A pre-commit observer: may transform the candidate or reject it.
///
/// Returning `Ok(None)` keeps the candidate; `Ok(Some(value))` replaces it
/// (the replacement re-enters descriptor validation); `Err` aborts the
/// assignment with the store unchanged.
pub type ValidatingCallback =
    Rc<dyn Fn(&Object, &Change<'_>) -> Result<Option<ErasedValue>, InvalidValue>>;

/// A post-commit observer: notified of an already-applied change.
///
/// An `Err` is reported to the assigning caller but does not roll back the
/// committed value.
pub type ChangeCallback = Rc<dyn Fn(&Object, &Change<'_>) -> Result<(), ObserverError>>;

bitflags::bitflags! {
    /// Which observer kinds a suspension scope disables.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SuspendKind: u8 {
        /// Pre-commit validating observers.
        const VALIDATING = 1 << 0;
        /// Post-commit change observers.
        const CHANGE = 1 << 1;
        /// Both kinds.
        const ALL = Self::VALIDATING.bits() | Self::CHANGE.bits();
    }
}

thread_local! {
    static VALIDATING_DEPTH: Cell<u32> = const { Cell::new(0) };
    static CHANGE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Disables observers of the given kinds until the guard drops.
///
/// Entering increments a thread-local depth counter per kind; dropping the
/// guard decrements it unconditionally, so suspension is released on every
/// exit path. Nested scopes compose: observers of a kind are skipped while
/// its counter is nonzero.
///
/// # Example
///
/// ```rust
/// use heartwood_object::{suspend, SuspendKind};
///
/// {
///     let _quiet = suspend(SuspendKind::ALL);
///     let _inner = suspend(SuspendKind::CHANGE);
///     // observers are disabled here
/// }
/// // and re-enabled here
/// ```
#[must_use]
pub fn suspend(kind: SuspendKind) -> SuspendGuard {
    if kind.contains(SuspendKind::VALIDATING) {
        VALIDATING_DEPTH.with(|depth| depth.set(depth.get() + 1));
    }
    if kind.contains(SuspendKind::CHANGE) {
        CHANGE_DEPTH.with(|depth| depth.set(depth.get() + 1));
    }
    SuspendGuard {
        kind,
        _not_send: PhantomData,
    }
}

pub(crate) fn validating_suspended() -> bool {
    VALIDATING_DEPTH.with(|depth| depth.get() > 0)
}

pub(crate) fn change_suspended() -> bool {
    CHANGE_DEPTH.with(|depth| depth.get() > 0)
}

/// The RAII scope returned by [`suspend`].
pub struct SuspendGuard {
    kind: SuspendKind,
    // Depth counters are thread-local; keep the guard on its thread.
    _not_send: PhantomData<Rc<()>>,
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        if self.kind.contains(SuspendKind::VALIDATING) {
            VALIDATING_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
        }
        if self.kind.contains(SuspendKind::CHANGE) {
            CHANGE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
        }
    }
}

impl fmt::Debug for SuspendGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspendGuard")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Which table an [`ObserverHandle`] points into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ObserverKind {
    Validating,
    Change,
}

/// A handle to a registered per-instance observer, usable to deregister it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ObserverHandle {
    kind: ObserverKind,
    property: &'static str,
    id: u64,
}

/// Per-instance observer tables.
pub(crate) struct Listeners {
    next_id: u64,
    validating: HashMap<&'static str, Vec<(u64, ValidatingCallback)>>,
    change: HashMap<&'static str, Vec<(u64, ChangeCallback)>>,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            validating: HashMap::new(),
            change: HashMap::new(),
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn add_validating(
        &mut self,
        property: &'static str,
        callback: ValidatingCallback,
    ) -> ObserverHandle {
        let id = self.next_id();
        self.validating.entry(property).or_default().push((id, callback));
        ObserverHandle {
            kind: ObserverKind::Validating,
            property,
            id,
        }
    }

    pub(crate) fn add_change(
        &mut self,
        property: &'static str,
        callback: ChangeCallback,
    ) -> ObserverHandle {
        let id = self.next_id();
        self.change.entry(property).or_default().push((id, callback));
        ObserverHandle {
            kind: ObserverKind::Change,
            property,
            id,
        }
    }

    pub(crate) fn remove(&mut self, handle: ObserverHandle) -> bool {
        match handle.kind {
            ObserverKind::Validating => Self::remove_from(&mut self.validating, handle),
            ObserverKind::Change => Self::remove_from(&mut self.change, handle),
        }
    }

    fn remove_from<C>(
        table: &mut HashMap<&'static str, Vec<(u64, C)>>,
        handle: ObserverHandle,
    ) -> bool {
        let Some(entries) = table.get_mut(handle.property) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != handle.id);
        entries.len() != before
    }

    /// Registration-order snapshot, cloned out so no borrow is held while
    /// callbacks run.
    pub(crate) fn validating_for(&self, property: &str) -> Vec<ValidatingCallback> {
        self.validating
            .get(property)
            .map(|entries| entries.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn change_for(&self, property: &str) -> Vec<ChangeCallback> {
        self.change
            .get(property)
            .map(|entries| entries.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("validating", &self.validating.keys().collect::<Vec<_>>())
            .field("change", &self.change.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
