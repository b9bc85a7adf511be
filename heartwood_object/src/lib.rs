// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Heartwood Object: the owning-object runtime.
//!
//! This crate turns the descriptors of `heartwood_descriptor` into a
//! declarative object model: classes declare a fixed set of named, typed
//! properties; every read/write path routes through per-property
//! validation, coercion, change notification, and serialization. Objects
//! may be built up interactively through transient invalid states —
//! explicit whole-object validation is the completeness gate.
//!
//! ## Core Concepts
//!
//! ### Classes and instances
//!
//! [`ClassBuilder`] assembles an immutable [`ObjectClass`] schema once per
//! type, merging the inheritance chain at build time. [`Object`] instances
//! hold per-instance storage; assignment runs the pipeline
//! `descriptor → instance validators → validating observers → commit →
//! change observers`, aborting transactionally at any pre-commit stage.
//!
//! ### Notification
//!
//! Validating observers may transform or reject candidates; change
//! observers see committed transitions, and equal-value assignments are
//! skipped. [`suspend`] disables either kind for a scope. See the
//! [`Change`] payload and [`ObserverHandle`] deregistration.
//!
//! ### Registry and serialization
//!
//! Classes register into a branchable [`ClassRegistry`]; objects serialize
//! to tagged JSON-compatible trees and deserialize polymorphically through
//! the branch, nesting via [`InstanceOf`].
//!
//! ## Quick Start
//!
//! ```rust
//! use heartwood_descriptor::{FieldSpec, Float, Text};
//! use heartwood_object::{ClassBuilder, ClassRegistry};
//!
//! let branch = ClassRegistry::root().branch("lib-doc");
//! let mut builder = ClassBuilder::new("Waypoint");
//! builder.registry(&branch);
//! let name = builder.field("name", FieldSpec::new(Text, "display name").required());
//! let depth = builder.field("depth", FieldSpec::new(Float::new().min(0.0), "meters"));
//! let waypoint = builder.build().unwrap();
//!
//! let wp = waypoint.instantiate();
//! wp.set(name, "K-7".to_owned()).unwrap();
//! wp.set(depth, 42.0).unwrap();
//! wp.validate().unwrap();
//!
//! let tree = wp.serialize().unwrap();
//! let back = waypoint.deserialize(&tree).unwrap();
//! assert!(back.equal(&wp));
//! ```

mod class;
mod error;
mod instance;
mod mutate;
mod object;
mod observe;
mod registry;
mod serial;

pub use class::{ClassBuilder, ClassValidator, ObjectClass};
pub use error::{
    BuildError, DeserializeError, Inconsistency, MissingRequired, ObserverError,
    ReentrantMutation, SetError, UnknownClass, UnknownField, ValidateError,
};
pub use instance::InstanceOf;
pub use object::Object;
pub use observe::{
    Change, ChangeCallback, ObserverHandle, SuspendGuard, SuspendKind, ValidatingCallback,
    suspend,
};
pub use registry::ClassRegistry;
pub use serial::{CLASS_KEY, deserialize_from};
