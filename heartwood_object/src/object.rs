// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Owning-object instances and the assignment pipeline.
//!
//! An [`Object`] is a cheap-clone handle over per-instance state: the
//! class schema, the sparse committed-value store, per-instance observer
//! tables, and re-entrancy guards. Every assignment runs the same
//! pipeline:
//!
//! ```text
//! Raw → Descriptor-Validated → Instance-Validated → Bus-Approved → Committed
//! ```
//!
//! Any pre-commit failure leaves the store unchanged and fires nothing
//! further. The commit itself cannot fail; change observers run after it,
//! and their failures are reported without rollback.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::Rc;
use std::sync::Arc;

use heartwood_descriptor::{ErasedValue, Field, FieldRegistration, InvalidValue, ValidateCx};
use smallvec::SmallVec;

use crate::class::ObjectClass;
use crate::error::{
    MissingRequired, ObserverError, ReentrantMutation, SetError, UnknownField, ValidateError,
};
use crate::observe::{
    Change, ChangeCallback, Listeners, ObserverHandle, ValidatingCallback, change_suspended,
    validating_suspended,
};

/// Inline capacity of the per-instance value store.
///
/// Most objects keep fewer than 8 committed values, so the common case
/// avoids a heap allocation.
const INLINE_CAPACITY: usize = 8;

/// An owning-object instance.
///
/// `Object` has reference semantics: cloning yields a second handle to the
/// same instance, which is what lets nested objects, observers, and links
/// share it. The committed store only ever holds values that passed the
/// full assignment pipeline; unset is distinct from every valid value and
/// is only an error at explicit [`Object::validate`] time.
///
/// # Example
///
/// ```rust
/// use heartwood_descriptor::{FieldSpec, Float, Text};
/// use heartwood_object::{ClassBuilder, ClassRegistry};
///
/// let branch = ClassRegistry::root().branch("object-doc");
/// let mut builder = ClassBuilder::new("Reading");
/// builder.registry(&branch);
/// let value = builder.field("value", FieldSpec::new(Float::new(), "measured value").required());
/// let unit = builder.field("unit", FieldSpec::new(Text, "unit").default("m".to_owned()));
/// let class = builder.build().unwrap();
///
/// let reading = class.instantiate();
/// assert_eq!(reading.get(unit), Some("m".to_owned()));  // default
/// assert_eq!(reading.get(value), None);                 // unset
///
/// assert!(reading.validate().is_err());                 // required gate
/// reading.set(value, 2.5).unwrap();
/// assert!(reading.validate().is_ok());
/// ```
pub struct Object {
    core: Rc<ObjectCore>,
}

pub(crate) struct ObjectCore {
    pub(crate) class: Arc<ObjectClass>,
    state: RefCell<ObjectState>,
    pub(crate) serializing: Cell<bool>,
    comparing: Cell<bool>,
    validating: Cell<bool>,
}

struct ObjectState {
    /// Committed values, sorted by field name for binary-search lookup.
    values: SmallVec<[(&'static str, ErasedValue); INLINE_CAPACITY]>,
    listeners: Listeners,
    /// Names whose assignment is currently between validation and the end
    /// of change notification.
    in_flight: SmallVec<[&'static str; 2]>,
}

impl ObjectState {
    fn find(&self, name: &str) -> Option<&ErasedValue> {
        self.values
            .binary_search_by_key(&name, |(n, _)| *n)
            .ok()
            .map(|at| &self.values[at].1)
    }

    fn store(&mut self, name: &'static str, value: ErasedValue) {
        match self.values.binary_search_by_key(&name, |(n, _)| *n) {
            Ok(at) => self.values[at].1 = value,
            Err(at) => self.values.insert(at, (name, value)),
        }
    }

    fn remove(&mut self, name: &str) {
        if let Ok(at) = self.values.binary_search_by_key(&name, |(n, _)| *n) {
            self.values.remove(at);
        }
    }
}

impl ObjectClass {
    /// Constructs an instance, committing every resolvable default.
    ///
    /// Class-level default overrides win over descriptor defaults; either
    /// is produced fresh, so instances never share a default-derived
    /// value. No observers fire.
    ///
    /// # Panics
    ///
    /// Panics if a default producer yields a value its descriptor rejects.
    /// Defaults are checked once at build time; a producer whose output
    /// validity varies between calls is a bug in the producer.
    #[must_use]
    pub fn instantiate(&self) -> Object {
        let object = Object {
            core: Rc::new(ObjectCore {
                class: self.arc(),
                state: RefCell::new(ObjectState {
                    values: SmallVec::new(),
                    listeners: Listeners::new(),
                    in_flight: SmallVec::new(),
                }),
                serializing: Cell::new(false),
                comparing: Cell::new(false),
                validating: Cell::new(false),
            }),
        };
        {
            let mut state = object.core.state.borrow_mut();
            for registration in self.fields() {
                let name = registration.name();
                if let Some(default) = self.default_for(name) {
                    let cx = ValidateCx::new(Some(self.name()), Some(name));
                    let valid = match registration.validate_erased(&cx, &default) {
                        Ok(valid) => valid,
                        Err(err) => panic!("default for '{name}' failed validation: {err}"),
                    };
                    state.store(name, valid);
                }
            }
        }
        object
    }
}

impl Object {
    /// The class this instance was built from.
    #[must_use]
    pub fn class(&self) -> &Arc<ObjectClass> {
        &self.core.class
    }

    /// Returns `true` if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.core, &b.core)
    }

    pub(crate) fn core(&self) -> &ObjectCore {
        &self.core
    }

    /// Reads a committed value through its typed key.
    ///
    /// `None` means the property is unset (or the key's type does not
    /// match the declaration, which is a programming error caught by the
    /// same `None`).
    #[must_use]
    pub fn get<T: Clone + fmt::Debug + 'static>(&self, field: Field<T>) -> Option<T> {
        self.get_erased(field.name()).and_then(|v| v.to_typed::<T>())
    }

    /// Reads a committed value by name.
    #[must_use]
    pub fn get_erased(&self, name: &str) -> Option<ErasedValue> {
        self.core.state.borrow().find(name).cloned()
    }

    /// Returns `true` if the property has a committed value.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.core.state.borrow().find(name).is_some()
    }

    /// Assigns a value through its typed key.
    ///
    /// Runs the full pipeline; see [`Object::set_erased`].
    pub fn set<T: Clone + fmt::Debug + 'static>(
        &self,
        field: Field<T>,
        value: T,
    ) -> Result<(), SetError> {
        self.set_erased(field.name(), ErasedValue::new(value))
    }

    /// Assigns a candidate value by name through the full pipeline.
    ///
    /// Descriptor validation, class-registered validating observers, then
    /// instance-registered validating observers run in order; the first
    /// rejection aborts with the store unchanged. After commit, change
    /// observers fire unless the committed value equals the previous one
    /// under the descriptor's equality rule. Change-observer failures are
    /// returned as [`SetError::Observers`] with the store already updated.
    pub fn set_erased(&self, name: &str, value: ErasedValue) -> Result<(), SetError> {
        self.apply(name, Some(value), true)
    }

    /// Removes the committed value, through the same notification
    /// discipline as assignment.
    ///
    /// Validating observers see the unset candidate; change observers fire
    /// if a value was present. Unsetting a required property is legal and
    /// caught only by [`Object::validate`].
    pub fn unset(&self, name: &str) -> Result<(), SetError> {
        self.apply(name, None, true)
    }

    pub(crate) fn registration(&self, name: &str) -> Result<FieldRegistration, SetError> {
        self.core.class.field(name).cloned().ok_or_else(|| {
            SetError::UnknownField(UnknownField::new(self.core.class.name(), name))
        })
    }

    /// The shared pipeline tail. `run_descriptor` is `false` when the
    /// candidate was already element-validated by a container operation.
    pub(crate) fn apply(
        &self,
        name: &str,
        candidate: Option<ErasedValue>,
        run_descriptor: bool,
    ) -> Result<(), SetError> {
        let registration = self.registration(name)?;
        let name = registration.name();
        let class_name = self.core.class.name();
        let _flight = InFlightGuard::acquire(&self.core, name)?;
        let cx = ValidateCx::new(Some(class_name), Some(name));

        let mut candidate = match candidate {
            Some(value) if run_descriptor => Some(
                registration
                    .validate_erased(&cx, &value)
                    .map_err(SetError::Invalid)?,
            ),
            other => other,
        };
        let previous = self.get_erased(name);

        if !validating_suspended() {
            let callbacks = self.validating_callbacks(name);
            for callback in callbacks {
                let change = Change::new(name, previous.as_ref(), candidate.as_ref());
                match callback(self, &change) {
                    Ok(None) => {}
                    Ok(Some(transformed)) => {
                        // Observer-coerced values re-enter descriptor
                        // validation so the store invariant holds.
                        candidate = Some(
                            registration
                                .validate_erased(&cx, &transformed)
                                .map_err(SetError::Invalid)?,
                        );
                    }
                    Err(err) => return Err(SetError::Invalid(err)),
                }
            }
        }

        let changed = match (&previous, &candidate) {
            (None, None) => false,
            (Some(previous), Some(next)) => !registration.equal_erased(previous, next),
            _ => true,
        };

        {
            let mut state = self.core.state.borrow_mut();
            match &candidate {
                Some(value) => state.store(name, value.clone()),
                None => state.remove(name),
            }
        }

        if changed && !change_suspended() {
            let callbacks = self.change_callbacks(name);
            let mut failures: Vec<ObserverError> = Vec::new();
            for callback in callbacks {
                let change = Change::new(name, previous.as_ref(), candidate.as_ref());
                if let Err(mut err) = callback(self, &change) {
                    err.bind_property(name);
                    log::warn!("change observer failed on `{class_name}`: {err}");
                    failures.push(err);
                }
            }
            if !failures.is_empty() {
                return Err(SetError::Observers(failures));
            }
        }
        Ok(())
    }

    /// Class-scope callbacks first, then instance-scope, each in
    /// registration order; cloned out so no borrow is held while they run.
    fn validating_callbacks(&self, name: &str) -> Vec<ValidatingCallback> {
        let mut callbacks: Vec<ValidatingCallback> =
            self.core.class.validating_for(name).to_vec();
        callbacks.extend(self.core.state.borrow().listeners.validating_for(name));
        callbacks
    }

    fn change_callbacks(&self, name: &str) -> Vec<ChangeCallback> {
        let mut callbacks: Vec<ChangeCallback> = self.core.class.change_for(name).to_vec();
        callbacks.extend(self.core.state.borrow().listeners.change_for(name));
        callbacks
    }

    /// Registers an instance-scope change observer.
    pub fn observe(
        &self,
        name: &str,
        callback: impl Fn(&Self, &Change<'_>) -> Result<(), ObserverError> + 'static,
    ) -> Result<ObserverHandle, UnknownField> {
        let name = self.known_name(name)?;
        Ok(self
            .core
            .state
            .borrow_mut()
            .listeners
            .add_change(name, Rc::new(callback)))
    }

    /// Registers an instance-scope validating observer.
    pub fn validate_field(
        &self,
        name: &str,
        callback: impl Fn(&Self, &Change<'_>) -> Result<Option<ErasedValue>, InvalidValue> + 'static,
    ) -> Result<ObserverHandle, UnknownField> {
        let name = self.known_name(name)?;
        Ok(self
            .core
            .state
            .borrow_mut()
            .listeners
            .add_validating(name, Rc::new(callback)))
    }

    /// Deregisters an instance-scope observer. Returns `false` for a
    /// handle that was already removed.
    pub fn remove_observer(&self, handle: ObserverHandle) -> bool {
        self.core.state.borrow_mut().listeners.remove(handle)
    }

    fn known_name(&self, name: &str) -> Result<&'static str, UnknownField> {
        self.core
            .class
            .field(name)
            .map(FieldRegistration::name)
            .ok_or_else(|| UnknownField::new(self.core.class.name(), name))
    }

    /// Whole-object validation.
    ///
    /// Checks that every `required` property has a committed value
    /// (reporting all missing names), then runs class-level cross-field
    /// validators in order. Idempotent and side-effect-free on success;
    /// does not re-run per-property validation, which the commit invariant
    /// already guarantees.
    pub fn validate(&self) -> Result<(), ValidateError> {
        let Some(_guard) = FlagGuard::acquire(&self.core.validating) else {
            // Already mid-validation further up the call stack.
            return Ok(());
        };
        let class = &self.core.class;
        let missing: Vec<&'static str> = class
            .fields()
            .filter(|registration| registration.required() && !self.is_set(registration.name()))
            .map(FieldRegistration::name)
            .collect();
        if !missing.is_empty() {
            return Err(ValidateError::MissingRequired(MissingRequired::new(
                class.name(),
                missing,
            )));
        }
        for validator in class.class_validators() {
            validator(self)
                .map_err(|err| ValidateError::Inconsistent(err.with_class(class.name())))?;
        }
        Ok(())
    }

    /// Field-by-field equality under each descriptor's equality rule.
    ///
    /// Both objects must share a class. A self-referential comparison
    /// answers `false` rather than recursing.
    #[must_use]
    pub fn equal(&self, other: &Self) -> bool {
        if Self::ptr_eq(self, other) {
            return true;
        }
        if !Arc::ptr_eq(&self.core.class, &other.core.class) {
            return false;
        }
        let Some(_guard) = FlagGuard::acquire(&self.core.comparing) else {
            return false;
        };
        for registration in self.core.class.fields() {
            let name = registration.name();
            let same = match (self.get_erased(name), other.get_erased(name)) {
                (None, None) => true,
                (Some(a), Some(b)) => registration.equal_erased(&a, &b),
                _ => false,
            };
            if !same {
                return false;
            }
        }
        true
    }
}

impl Clone for Object {
    /// Clones the handle, not the instance.
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.borrow();
        f.debug_struct("Object")
            .field("class", &self.core.class.name())
            .field(
                "set",
                &state.values.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Marks a property as mid-assignment for re-entrancy detection.
struct InFlightGuard {
    core: Rc<ObjectCore>,
    name: &'static str,
}

impl InFlightGuard {
    fn acquire(core: &Rc<ObjectCore>, name: &'static str) -> Result<Self, SetError> {
        let mut state = core.state.borrow_mut();
        if state.in_flight.contains(&name) {
            return Err(SetError::Reentrant(ReentrantMutation::new(
                core.class.name(),
                name,
            )));
        }
        state.in_flight.push(name);
        drop(state);
        Ok(Self {
            core: core.clone(),
            name,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.core.state.borrow_mut();
        if let Some(at) = state.in_flight.iter().position(|n| *n == self.name) {
            state.in_flight.remove(at);
        }
    }
}

/// A per-object boolean scope: acquire fails when already held.
pub(crate) struct FlagGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> FlagGuard<'a> {
    pub(crate) fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.get() {
            return None;
        }
        flag.set(true);
        Some(Self { flag })
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::error::Inconsistency;
    use crate::observe::{SuspendKind, suspend};
    use crate::registry::ClassRegistry;
    use core::cell::Cell;
    use heartwood_descriptor::{Field, FieldSpec, Float, Integer, Seq};

    fn scratch() -> ClassRegistry {
        ClassRegistry::root().branch("object-tests")
    }

    struct PointParts {
        class: Arc<ObjectClass>,
        x: Field<f64>,
        y: Field<f64>,
    }

    fn point_class(branch: &ClassRegistry) -> PointParts {
        let mut builder = ClassBuilder::new("Point");
        builder.registry(branch);
        let x = builder.field("x", FieldSpec::new(Float::new(), "x-coordinate").required());
        let y = builder.field("y", FieldSpec::new(Float::new(), "y-coordinate").required());
        let class = builder.build().unwrap();
        PointParts { class, x, y }
    }

    #[test]
    fn set_and_get_round_trip() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();

        assert_eq!(point.get(parts.x), None);
        point.set(parts.x, 1.0).unwrap();
        assert_eq!(point.get(parts.x), Some(1.0));

        // Erased access coerces like any other assignment.
        point.set_erased("y", ErasedValue::new(2_i64)).unwrap();
        assert_eq!(point.get(parts.y), Some(2.0));
    }

    #[test]
    fn invalid_assignment_leaves_store_unchanged() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();
        point.set(parts.x, 1.0).unwrap();

        let err = point.set_erased("x", ErasedValue::new("nope")).unwrap_err();
        assert!(matches!(err, SetError::Invalid(_)));
        assert_eq!(point.get(parts.x), Some(1.0));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();
        assert!(matches!(
            point.set_erased("z", ErasedValue::new(1.0)),
            Err(SetError::UnknownField(_))
        ));
    }

    #[test]
    fn required_gate_fires_only_on_validate() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();

        // Partial construction is fine...
        point.set(parts.x, 1.0).unwrap();
        // ...until explicit validation, which names every missing field.
        let err = point.validate().unwrap_err();
        match err {
            ValidateError::MissingRequired(missing) => {
                assert_eq!(missing.properties(), &["y"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        point.set(parts.y, 2.0).unwrap();
        point.validate().unwrap();
        // Idempotent.
        point.validate().unwrap();
    }

    #[test]
    fn unset_reverts_to_unset_and_notifies() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();
        point.set(parts.x, 1.0).unwrap();

        let fired = Rc::new(Cell::new(0));
        let seen = fired.clone();
        point
            .observe("x", move |_, change| {
                assert!(change.value().is_none());
                assert!(change.previous().is_some());
                seen.set(seen.get() + 1);
                Ok(())
            })
            .unwrap();

        point.unset("x").unwrap();
        assert_eq!(point.get(parts.x), None);
        assert_eq!(fired.get(), 1);

        // Unsetting an unset property changes nothing and fires nothing.
        point.unset("x").unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn fresh_defaults_never_alias() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Bag");
        builder.registry(&branch);
        let items = builder.field(
            "items",
            FieldSpec::new(Seq::new(Integer::new()), "contents").default_with(Vec::new),
        );
        let class = builder.build().unwrap();

        let a = class.instantiate();
        let b = class.instantiate();
        a.push_item("items", ErasedValue::new(1_i64)).unwrap();
        assert_eq!(a.get(items), Some(vec![1]));
        assert_eq!(b.get(items), Some(vec![]));
    }

    #[test]
    fn container_assignment_is_all_or_nothing() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Bins");
        builder.registry(&branch);
        let counts = builder.field(
            "counts",
            FieldSpec::new(Seq::new(Integer::new().min(0)), "per-bin counts"),
        );
        let class = builder.build().unwrap();

        let object = class.instantiate();
        object.set(counts, vec![1, 2]).unwrap();

        // One bad element rejects the whole assignment; the committed
        // value stands.
        let err = object.set(counts, vec![3, 4, -5]).unwrap_err();
        assert!(matches!(err, SetError::Invalid(_)));
        assert_eq!(object.get(counts), Some(vec![1, 2]));
    }

    #[test]
    fn validating_observers_transform_in_order() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Clamped");
        builder.registry(&branch);
        let level = builder.field("level", FieldSpec::new(Integer::new(), "level"));
        // Class-scope observer clamps into range.
        builder.validate_field("level", |_, change| {
            let value = change.value().and_then(|v| v.to_typed::<i64>());
            Ok(value.map(|v| ErasedValue::new(v.clamp(0, 10))))
        });
        let class = builder.build().unwrap();

        let object = class.instantiate();
        object.set(level, 99).unwrap();
        assert_eq!(object.get(level), Some(10));

        // Instance-scope observers run after class-scope ones.
        object
            .validate_field("level", |_, change| {
                let value = change.value().and_then(|v| v.to_typed::<i64>());
                assert!(value.unwrap() <= 10, "class observer ran first");
                Ok(None)
            })
            .unwrap();
        object.set(level, 50).unwrap();
        assert_eq!(object.get(level), Some(10));
    }

    #[test]
    fn validating_rejection_aborts_before_commit() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();
        point.set(parts.x, 1.0).unwrap();

        point
            .validate_field("x", |_, change| {
                let value = change.value().and_then(|v| v.to_typed::<f64>());
                if value.is_some_and(|v| v > 100.0) {
                    let cx = ValidateCx::new(None, Some("x"));
                    return Err(InvalidValue::new(&cx, "a small number", &value));
                }
                Ok(None)
            })
            .unwrap();

        let fired = Rc::new(Cell::new(false));
        let seen = fired.clone();
        point
            .observe("x", move |_, _| {
                seen.set(true);
                Ok(())
            })
            .unwrap();

        assert!(point.set(parts.x, 101.0).is_err());
        assert_eq!(point.get(parts.x), Some(1.0));
        assert!(!fired.get(), "change observers must not fire on abort");
    }

    #[test]
    fn skip_on_no_change() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();
        point.set(parts.x, 5.0).unwrap();

        let validated = Rc::new(Cell::new(0));
        let changed = Rc::new(Cell::new(0));
        let v = validated.clone();
        let c = changed.clone();
        point
            .validate_field("x", move |_, _| {
                v.set(v.get() + 1);
                Ok(None)
            })
            .unwrap();
        point
            .observe("x", move |_, _| {
                c.set(c.get() + 1);
                Ok(())
            })
            .unwrap();

        // Same value: validating observers run, change observers do not.
        point.set(parts.x, 5.0).unwrap();
        assert_eq!(validated.get(), 1);
        assert_eq!(changed.get(), 0);

        point.set(parts.x, 6.0).unwrap();
        assert_eq!(validated.get(), 2);
        assert_eq!(changed.get(), 1);
    }

    #[test]
    fn change_observer_failure_reports_without_rollback() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();

        point
            .observe("x", |_, _| Err(ObserverError::new("downstream exploded")))
            .unwrap();

        let err = point.set(parts.x, 3.0).unwrap_err();
        assert!(err.committed());
        match err {
            SetError::Observers(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].property(), Some("x"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // The assignment stands.
        assert_eq!(point.get(parts.x), Some(3.0));
    }

    #[test]
    fn reentrant_mutation_is_detected() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();
        point.set(parts.x, 0.0).unwrap();

        let x = parts.x;
        point
            .observe("x", move |object, _| {
                // Feeding the property back into itself must fail, not loop.
                match object.set(x, 99.0) {
                    Err(SetError::Reentrant(_)) => {
                        Err(ObserverError::new("re-entrant assignment rejected"))
                    }
                    _ => Ok(()),
                }
            })
            .unwrap();

        let err = point.set(parts.x, 1.0).unwrap_err();
        assert!(err.committed());
        // The outer assignment committed; the inner one never did.
        assert_eq!(point.get(parts.x), Some(1.0));
    }

    #[test]
    fn observers_may_mutate_other_properties() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();
        point.set(parts.y, 0.0).unwrap();

        let y = parts.y;
        point
            .observe("x", move |object, change| {
                // Mirror x into y; a different property, so no re-entrancy.
                if let Some(value) = change.value().and_then(|v| v.to_typed::<f64>()) {
                    object.set(y, value).map_err(|e| ObserverError::new(e.to_string()))?;
                }
                Ok(())
            })
            .unwrap();

        point.set(parts.x, 7.0).unwrap();
        assert_eq!(point.get(parts.y), Some(7.0));
    }

    #[test]
    fn suspension_scopes_mute_observers() {
        let branch = scratch();
        let parts = point_class(&branch);
        let point = parts.class.instantiate();

        let fired = Rc::new(Cell::new(0));
        let seen = fired.clone();
        point
            .observe("x", move |_, _| {
                seen.set(seen.get() + 1);
                Ok(())
            })
            .unwrap();

        {
            let _quiet = suspend(SuspendKind::ALL);
            point.set(parts.x, 1.0).unwrap();
        }
        assert_eq!(fired.get(), 0);

        point.set(parts.x, 2.0).unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn class_validators_run_in_order_on_validate() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Span");
        builder.registry(&branch);
        let start = builder.field("start", FieldSpec::new(Float::new(), "start").required());
        let end = builder.field("end", FieldSpec::new(Float::new(), "end").required());
        builder.class_validator(move |object| {
            let start = object.get(start).unwrap_or(0.0);
            let end = object.get(end).unwrap_or(0.0);
            if end < start {
                return Err(Inconsistency::new("ends before it starts"));
            }
            Ok(())
        });
        let class = builder.build().unwrap();

        let span = class.instantiate();
        span.set(start, 2.0).unwrap();
        span.set(end, 1.0).unwrap();
        let err = span.validate().unwrap_err();
        assert!(matches!(err, ValidateError::Inconsistent(_)));
        assert!(format!("{err}").contains("`Span`"));

        span.set(end, 3.0).unwrap();
        span.validate().unwrap();
    }

    #[test]
    fn equality_is_field_by_field() {
        let branch = scratch();
        let parts = point_class(&branch);
        let a = parts.class.instantiate();
        let b = parts.class.instantiate();
        assert!(a.equal(&b));

        a.set(parts.x, 1.0).unwrap();
        assert!(!a.equal(&b));

        b.set(parts.x, 1.0).unwrap();
        assert!(a.equal(&b));

        // Same handle is trivially equal.
        let alias = a.clone();
        assert!(a.equal(&alias));
    }
}
