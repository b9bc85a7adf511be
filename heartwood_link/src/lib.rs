// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Heartwood Link: standing synchronization between properties.
//!
//! A link relates two `(object, property)` endpoints. [`DirectionalLink`]
//! pushes every committed change of the source property into the target
//! property — through the target's own full validation pipeline, never
//! around it. [`Link`] installs both directions, sharing one propagation
//! flag so a round trip terminates after a single hop instead of looping.
//!
//! Links are owned by their external holder, not by either endpoint:
//! tearing one down is explicit ([`DirectionalLink::unlink`]), and
//! [`DirectionalLink::relink`] re-points the endpoints with the
//! replacement observers installed before the old ones are removed, so
//! there is no window with neither link active.
//!
//! ## Quick Start
//!
//! ```rust
//! use heartwood_descriptor::{FieldSpec, Float};
//! use heartwood_object::{ClassBuilder, ClassRegistry};
//! use heartwood_link::Link;
//!
//! let branch = ClassRegistry::root().branch("link-doc");
//! let mut builder = ClassBuilder::new("Dial");
//! builder.registry(&branch);
//! let value = builder.field("value", FieldSpec::new(Float::new(), "dial value"));
//! let dial = builder.build().unwrap();
//!
//! let a = dial.instantiate();
//! let b = dial.instantiate();
//! let mut link = Link::new((&a, "value"), (&b, "value")).unwrap();
//!
//! a.set(value, 5.0).unwrap();
//! assert_eq!(b.get(value), Some(5.0));
//! b.set(value, 7.0).unwrap();
//! assert_eq!(a.get(value), Some(7.0));
//!
//! link.unlink();
//! a.set(value, 9.0).unwrap();
//! assert_eq!(b.get(value), Some(7.0));
//! ```

use core::cell::Cell;
use core::fmt;
use std::rc::Rc;

use heartwood_descriptor::ErasedValue;
use heartwood_object::{Object, ObserverError, ObserverHandle};

/// Maps a propagated value in flight, before target validation.
pub type Transform = dyn Fn(ErasedValue) -> ErasedValue;

/// Failure to establish or re-point a link.
#[derive(Clone, Debug)]
pub enum LinkError {
    /// An endpoint names no declared property of its object's class.
    UnknownProperty {
        /// The endpoint object's class.
        class: String,
        /// The unresolved property name.
        property: String,
    },
    /// Both endpoints are the same property of the same object.
    SelfLink,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProperty { class, property } => {
                write!(f, "cannot link: `{class}` has no property named '{property}'")
            }
            Self::SelfLink => write!(f, "cannot link a property to itself"),
        }
    }
}

impl core::error::Error for LinkError {}

fn check_endpoint(endpoint: (&Object, &'static str)) -> Result<(), LinkError> {
    let (object, property) = endpoint;
    if object.class().field(property).is_none() {
        return Err(LinkError::UnknownProperty {
            class: object.class().name().to_owned(),
            property: property.to_owned(),
        });
    }
    Ok(())
}

fn check_endpoints(
    source: (&Object, &'static str),
    target: (&Object, &'static str),
) -> Result<(), LinkError> {
    check_endpoint(source)?;
    check_endpoint(target)?;
    if Object::ptr_eq(source.0, target.0) && source.1 == target.1 {
        return Err(LinkError::SelfLink);
    }
    Ok(())
}

/// Clears the shared propagation flag when a hop finishes, on every path.
struct PropagationGuard {
    flag: Rc<Cell<bool>>,
}

impl PropagationGuard {
    fn hold(flag: &Rc<Cell<bool>>) -> Self {
        flag.set(true);
        Self { flag: flag.clone() }
    }
}

impl Drop for PropagationGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// A one-way link: committed changes of the source property propagate
/// into the target property.
///
/// Propagation runs the target's full assignment pipeline; a target-side
/// rejection surfaces as an observer failure of the *source* assignment,
/// with the source already committed and the target unchanged.
pub struct DirectionalLink {
    source: (Object, &'static str),
    target: (Object, &'static str),
    transform: Option<Rc<Transform>>,
    propagating: Rc<Cell<bool>>,
    handle: Option<ObserverHandle>,
}

impl DirectionalLink {
    /// Links `source` to `target`.
    pub fn new(
        source: (&Object, &'static str),
        target: (&Object, &'static str),
    ) -> Result<Self, LinkError> {
        Self::build(source, target, None, Rc::new(Cell::new(false)))
    }

    /// Links `source` to `target`, mapping each value through `transform`
    /// before target validation.
    pub fn with_transform(
        source: (&Object, &'static str),
        target: (&Object, &'static str),
        transform: impl Fn(ErasedValue) -> ErasedValue + 'static,
    ) -> Result<Self, LinkError> {
        Self::build(
            source,
            target,
            Some(Rc::new(transform)),
            Rc::new(Cell::new(false)),
        )
    }

    fn build(
        source: (&Object, &'static str),
        target: (&Object, &'static str),
        transform: Option<Rc<Transform>>,
        propagating: Rc<Cell<bool>>,
    ) -> Result<Self, LinkError> {
        check_endpoints(source, target)?;
        let handle = Self::install(source, target, &propagating, transform.clone());
        Ok(Self {
            source: (source.0.clone(), source.1),
            target: (target.0.clone(), target.1),
            transform,
            propagating,
            handle: Some(handle),
        })
    }

    /// Registers the propagating change observer on the source.
    ///
    /// Endpoints were checked, so registration cannot fail.
    fn install(
        source: (&Object, &'static str),
        target: (&Object, &'static str),
        propagating: &Rc<Cell<bool>>,
        transform: Option<Rc<Transform>>,
    ) -> ObserverHandle {
        let target_object = target.0.clone();
        let target_property = target.1;
        let flag = propagating.clone();
        let handle = source.0.observe(source.1, move |_, change| {
            if flag.get() {
                // The reverse half of a bidirectional pair; one hop is
                // enough.
                return Ok(());
            }
            let _hop = PropagationGuard::hold(&flag);
            let result = match change.value() {
                Some(value) => {
                    let mut value = value.clone();
                    if let Some(transform) = &transform {
                        value = transform(value);
                    }
                    target_object.set_erased(target_property, value)
                }
                None => target_object.unset(target_property),
            };
            result.map_err(|err| ObserverError::new(format!("link propagation failed: {err}")))
        });
        match handle {
            Ok(handle) => handle,
            Err(_) => unreachable!("endpoint was checked before installation"),
        }
    }

    /// The source endpoint.
    #[must_use]
    pub fn source(&self) -> (&Object, &'static str) {
        (&self.source.0, self.source.1)
    }

    /// The target endpoint.
    #[must_use]
    pub fn target(&self) -> (&Object, &'static str) {
        (&self.target.0, self.target.1)
    }

    /// Returns `true` while the propagating observer is installed.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.handle.is_some()
    }

    /// Removes the propagating observer.
    ///
    /// Dropping an un-unlinked link leaves the observer installed; the
    /// link value is the handle required to take it back out.
    pub fn unlink(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.source.0.remove_observer(handle);
        }
    }

    /// Re-points both endpoints.
    ///
    /// The replacement observer is installed before the old one is
    /// removed, so no change can slip through a window with neither
    /// active.
    pub fn relink(
        &mut self,
        source: (&Object, &'static str),
        target: (&Object, &'static str),
    ) -> Result<(), LinkError> {
        check_endpoints(source, target)?;
        let next = Self::install(source, target, &self.propagating, self.transform.clone());
        if let Some(old) = self.handle.take() {
            self.source.0.remove_observer(old);
        }
        self.source = (source.0.clone(), source.1);
        self.target = (target.0.clone(), target.1);
        self.handle = Some(next);
        Ok(())
    }
}

impl fmt::Debug for DirectionalLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectionalLink")
            .field(
                "source",
                &format_args!("{}.{}", self.source.0.class().name(), self.source.1),
            )
            .field(
                "target",
                &format_args!("{}.{}", self.target.0.class().name(), self.target.1),
            )
            .field("linked", &self.is_linked())
            .finish_non_exhaustive()
    }
}

/// A bidirectional link: two directional halves sharing one propagation
/// flag, so an update crossing in one direction is not pushed back.
#[derive(Debug)]
pub struct Link {
    forward: DirectionalLink,
    backward: DirectionalLink,
}

impl Link {
    /// Links `a` and `b` in both directions.
    pub fn new(
        a: (&Object, &'static str),
        b: (&Object, &'static str),
    ) -> Result<Self, LinkError> {
        check_endpoints(a, b)?;
        let flag = Rc::new(Cell::new(false));
        let forward = DirectionalLink::build(a, b, None, flag.clone())?;
        match DirectionalLink::build(b, a, None, flag) {
            Ok(backward) => Ok(Self { forward, backward }),
            Err(err) => {
                let mut forward = forward;
                forward.unlink();
                Err(err)
            }
        }
    }

    /// The two endpoints, in construction order.
    #[must_use]
    pub fn endpoints(&self) -> ((&Object, &'static str), (&Object, &'static str)) {
        (self.forward.source(), self.forward.target())
    }

    /// Returns `true` while both directions are installed.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.forward.is_linked() && self.backward.is_linked()
    }

    /// Removes both propagating observers.
    pub fn unlink(&mut self) {
        self.forward.unlink();
        self.backward.unlink();
    }

    /// Re-points both directions at new endpoints.
    pub fn relink(
        &mut self,
        a: (&Object, &'static str),
        b: (&Object, &'static str),
    ) -> Result<(), LinkError> {
        check_endpoints(a, b)?;
        self.forward.relink(a, b)?;
        self.backward.relink(b, a)?;
        Ok(())
    }
}
