// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Heartwood Descriptor: typed property descriptors.
//!
//! This crate provides the per-attribute contract of the Heartwood object
//! model: every named attribute of an owning object is governed by a
//! descriptor that knows how to validate/coerce candidate values, produce
//! fresh defaults, compare committed values, and carry them to and from a
//! JSON-compatible tree. The owning-object runtime lives in
//! `heartwood_object`; this crate is freestanding.
//!
//! ## Core Concepts
//!
//! ### The capability set
//!
//! [`Descriptor`] is a closed capability set
//! `{validate, equal, serialize, deserialize, info}` over an associated
//! value type. New property kinds implement the same trait; schemas store
//! them side by side through the erased [`FieldRegistration`] form.
//!
//! ### Erased values
//!
//! [`ErasedValue`] carries any `'static + Clone + Debug` value through the
//! name-keyed layers, with downcasting on the way out.
//!
//! ### Built-in descriptors
//!
//! Scalars: [`Boolean`], [`Integer`], [`Float`], [`Text`]. Containers:
//! [`Seq`], [`SetOf`], [`TupleOf`], [`Mapping`], each wrapping element
//! descriptors with recursive, all-or-nothing validation and
//! touched-element in-place mutation via [`SeqOps`]/[`MapOps`].
//!
//! ## Quick Start
//!
//! ```rust
//! use heartwood_descriptor::{
//!     Descriptor, ErasedValue, FieldSpec, Float, Seq, ValidateCx,
//! };
//!
//! // A bounded float, and a sequence of them.
//! let speed = Float::new().min(0.0);
//! let path = Seq::new(Float::new()).min_length(2);
//!
//! let cx = ValidateCx::none();
//! assert_eq!(speed.validate(&cx, &ErasedValue::new(3_i64)).unwrap(), 3.0);
//! assert!(speed.validate(&cx, &ErasedValue::new(-1.0)).is_err());
//!
//! // One failing element rejects the whole container.
//! assert!(path.validate(&cx, &ErasedValue::new(vec![0.0, 1.0])).is_ok());
//!
//! // Field declarations bind a descriptor to a name with doc, required
//! // flag, and a default that is produced fresh per use.
//! let spec = FieldSpec::new(Seq::new(Float::new()), "sampled positions")
//!     .default_with(Vec::new);
//! let registration = spec.bind("positions");
//! assert_eq!(registration.name(), "positions");
//! ```

mod container;
mod descriptor;
mod error;
mod scalar;
mod value;

pub use container::{ContainerOps, MapOps, Mapping, Seq, SeqOps, SetOf, TupleOf};
pub use descriptor::{
    Descriptor, Field, FieldDefault, FieldRegistration, FieldSpec, Json, ValidateCx,
};
pub use error::{CyclicReference, InvalidValue};
pub use scalar::{Boolean, Float, Integer, Text};
pub use value::ErasedValue;
