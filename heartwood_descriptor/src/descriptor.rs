// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The descriptor capability set and field declarations.
//!
//! This module provides the typed [`Descriptor`] trait, the per-attribute
//! declaration [`FieldSpec`], its erased schema-stored form
//! [`FieldRegistration`], and the typed field key [`Field`].

use core::fmt;
use core::marker::PhantomData;
use std::rc::Rc;

use crate::container::ContainerOps;
use crate::error::{CyclicReference, InvalidValue};
use crate::value::ErasedValue;

/// A JSON-compatible tree node.
///
/// Descriptors serialize into and deserialize out of this type: scalars,
/// ordered sequences, and keyed mappings of strings to further tree nodes.
pub type Json = serde_json::Value;

/// Validation context: the owning class and property, when known.
///
/// This is the "owning-instance-or-none" argument of descriptor
/// validation, reduced to what descriptors consume: naming for error
/// messages. Free-standing validation uses [`ValidateCx::none`].
#[derive(Copy, Clone, Debug, Default)]
pub struct ValidateCx<'a> {
    class: Option<&'a str>,
    property: Option<&'a str>,
}

impl<'a> ValidateCx<'a> {
    /// A context with no owning class or property.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            class: None,
            property: None,
        }
    }

    /// Creates a context naming the owning class and property.
    #[must_use]
    pub const fn new(class: Option<&'a str>, property: Option<&'a str>) -> Self {
        Self { class, property }
    }

    /// The owning class name, if any.
    #[must_use]
    pub const fn class(&self) -> Option<&'a str> {
        self.class
    }

    /// The property name, if any.
    #[must_use]
    pub const fn property(&self) -> Option<&'a str> {
        self.property
    }
}

/// The closed capability set of a property descriptor.
///
/// A descriptor is the per-attribute contract for one value type:
/// validate/coerce, equality, and JSON (de)serialization. New property
/// kinds are added by implementing this same capability set; the erased
/// form ([`FieldRegistration`]) is how schemas store them side by side.
///
/// # Contract
///
/// - `validate` must be idempotent: revalidating its own output yields an
///   equal value.
/// - `serialize` assumes an already-valid value; `deserialize` assumes the
///   counterpart of a prior `serialize`. Arbitrary input must still pass
///   through `validate` after `deserialize`.
///
/// # Example
///
/// ```rust
/// use heartwood_descriptor::{Descriptor, ErasedValue, Float, ValidateCx};
///
/// let speed = Float::new().min(0.0);
/// let cx = ValidateCx::none();
///
/// // Integers coerce to floats; revalidation is a no-op.
/// let value = speed.validate(&cx, &ErasedValue::new(42_i64)).unwrap();
/// assert_eq!(value, 42.0);
/// let again = speed.validate(&cx, &ErasedValue::new(value)).unwrap();
/// assert_eq!(again, value);
///
/// assert!(speed.validate(&cx, &ErasedValue::new(-1.0)).is_err());
/// ```
pub trait Descriptor: fmt::Debug + 'static {
    /// The valid value type this descriptor produces.
    type Value: Clone + fmt::Debug + 'static;

    /// Human-readable expectation, e.g. `"a floating-point number"`.
    ///
    /// Used in `InvalidValue` messages and documentation.
    fn info(&self) -> String;

    /// Checks a candidate value, coercing where the descriptor allows it.
    ///
    /// Returns the valid value, or [`InvalidValue`] if the candidate cannot
    /// be coerced. Must be a pure function of `(cx, input)` and idempotent
    /// on its own output.
    fn validate(&self, cx: &ValidateCx<'_>, input: &ErasedValue)
    -> Result<Self::Value, InvalidValue>;

    /// Compares two valid values.
    ///
    /// Used for change detection (skip notification when the new value
    /// equals the stored one) and whole-object equality.
    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool;

    /// Serializes a valid value to a JSON-compatible tree.
    ///
    /// The only admissible failure is a reference cycle in a nested object
    /// graph.
    fn serialize(&self, value: &Self::Value) -> Result<Json, CyclicReference>;

    /// Deserializes the counterpart of a prior [`Descriptor::serialize`].
    fn deserialize(&self, cx: &ValidateCx<'_>, json: &Json) -> Result<Self::Value, InvalidValue>;

    /// Builds an [`InvalidValue`] for a rejected candidate.
    fn failure(&self, cx: &ValidateCx<'_>, value: &dyn fmt::Debug) -> InvalidValue {
        InvalidValue::new(cx, self.info(), value)
    }

    /// Single-element mutation support, when this descriptor is a
    /// container. Non-container descriptors keep the default.
    fn as_container_ops(&self) -> Option<&dyn ContainerOps> {
        None
    }
}

/// The default of a declared field.
///
/// Literal defaults are cloned fresh on each use; producer defaults are
/// invoked fresh on each use. Either way, two instances never share
/// identity for a default-derived value.
pub enum FieldDefault<T> {
    /// No default; the field starts unset.
    Absent,
    /// A literal value, cloned per use.
    Literal(T),
    /// A zero-argument producer, invoked per use.
    Producer(Box<dyn Fn() -> T>),
}

impl<T: Clone> FieldDefault<T> {
    /// Resolves the default to a fresh value, if one is declared.
    #[must_use]
    pub fn resolve(&self) -> Option<T> {
        match self {
            Self::Absent => None,
            Self::Literal(value) => Some(value.clone()),
            Self::Producer(producer) => Some(producer()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for FieldDefault<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "Absent"),
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Producer(_) => write!(f, "Producer(..)"),
        }
    }
}

/// One named attribute's declaration: a descriptor plus its documentation,
/// `required` flag, and default.
///
/// Fields are optional unless [`FieldSpec::required`] is called; an unset
/// required field fails only at explicit whole-object validation, never at
/// assignment or read time.
///
/// # Example
///
/// ```rust
/// use heartwood_descriptor::{FieldSpec, Seq, Text};
///
/// let tags = FieldSpec::new(Seq::new(Text), "free-form labels")
///     .default_with(Vec::new);
/// let name = FieldSpec::new(Text, "display name").required();
/// ```
#[derive(Debug)]
pub struct FieldSpec<D: Descriptor> {
    descriptor: D,
    doc: String,
    required: bool,
    default: FieldDefault<D::Value>,
}

impl<D: Descriptor> FieldSpec<D> {
    /// Declares a field with the given descriptor and documentation.
    #[must_use]
    pub fn new(descriptor: D, doc: impl Into<String>) -> Self {
        Self {
            descriptor,
            doc: doc.into(),
            required: false,
            default: FieldDefault::Absent,
        }
    }

    /// Marks the field as required for whole-object validation.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Declares a literal default, cloned fresh per instance.
    #[must_use]
    pub fn default(mut self, value: D::Value) -> Self {
        self.default = FieldDefault::Literal(value);
        self
    }

    /// Declares a producer default, invoked fresh per instance.
    #[must_use]
    pub fn default_with(mut self, producer: impl Fn() -> D::Value + 'static) -> Self {
        self.default = FieldDefault::Producer(Box::new(producer));
        self
    }

    /// Binds the declaration to a name, producing the erased form a schema
    /// stores.
    #[must_use]
    pub fn bind(self, name: &'static str) -> FieldRegistration {
        FieldRegistration {
            name,
            doc: self.doc,
            required: self.required,
            inner: Rc::new(ErasedField {
                descriptor: self.descriptor,
                default: self.default,
            }),
        }
    }
}

/// The erased, schema-stored form of a bound field declaration.
///
/// Operations mirror the typed [`Descriptor`] capability set over
/// [`ErasedValue`], plus default resolution and (for container
/// descriptors) single-element mutation support.
#[derive(Clone)]
pub struct FieldRegistration {
    name: &'static str,
    doc: String,
    required: bool,
    inner: Rc<dyn ErasedDescriptor>,
}

impl FieldRegistration {
    /// The field name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The field documentation string.
    #[must_use]
    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Whether the field is required for whole-object validation.
    #[must_use]
    #[inline]
    pub fn required(&self) -> bool {
        self.required
    }

    /// The descriptor's expectation string.
    #[must_use]
    pub fn info(&self) -> String {
        self.inner.info()
    }

    /// Validates a candidate through the underlying descriptor.
    pub fn validate_erased(
        &self,
        cx: &ValidateCx<'_>,
        input: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        self.inner.validate_erased(cx, input)
    }

    /// Resolves the declared default to a fresh value, if any.
    #[must_use]
    pub fn default_erased(&self) -> Option<ErasedValue> {
        self.inner.default_erased()
    }

    /// Serializes a committed value.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not of this descriptor's value type. Committed
    /// values always are, so this only fires on misuse of the erased API.
    pub fn serialize_erased(&self, value: &ErasedValue) -> Result<Json, CyclicReference> {
        self.inner.serialize_erased(value)
    }

    /// Deserializes the counterpart of a prior serialization.
    pub fn deserialize_erased(
        &self,
        cx: &ValidateCx<'_>,
        json: &Json,
    ) -> Result<ErasedValue, InvalidValue> {
        self.inner.deserialize_erased(cx, json)
    }

    /// Compares two committed values with the descriptor's equality rule.
    ///
    /// Values of the wrong type are never equal.
    #[must_use]
    pub fn equal_erased(&self, a: &ErasedValue, b: &ErasedValue) -> bool {
        self.inner.equal_erased(a, b)
    }

    /// Single-element mutation support, when this field is a container.
    #[must_use]
    pub fn container_ops(&self) -> Option<&dyn ContainerOps> {
        self.inner.container_ops()
    }
}

impl fmt::Debug for FieldRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistration")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("info", &self.inner.info())
            .finish_non_exhaustive()
    }
}

/// Erased descriptor operations, object-safe over [`ErasedValue`].
trait ErasedDescriptor {
    fn info(&self) -> String;
    fn validate_erased(
        &self,
        cx: &ValidateCx<'_>,
        input: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue>;
    fn default_erased(&self) -> Option<ErasedValue>;
    fn serialize_erased(&self, value: &ErasedValue) -> Result<Json, CyclicReference>;
    fn deserialize_erased(
        &self,
        cx: &ValidateCx<'_>,
        json: &Json,
    ) -> Result<ErasedValue, InvalidValue>;
    fn equal_erased(&self, a: &ErasedValue, b: &ErasedValue) -> bool;
    fn container_ops(&self) -> Option<&dyn ContainerOps>;
}

struct ErasedField<D: Descriptor> {
    descriptor: D,
    default: FieldDefault<D::Value>,
}

impl<D: Descriptor> ErasedDescriptor for ErasedField<D> {
    fn info(&self) -> String {
        self.descriptor.info()
    }

    fn validate_erased(
        &self,
        cx: &ValidateCx<'_>,
        input: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        self.descriptor
            .validate(cx, input)
            .map(ErasedValue::new)
    }

    fn default_erased(&self) -> Option<ErasedValue> {
        self.default.resolve().map(ErasedValue::new)
    }

    fn serialize_erased(&self, value: &ErasedValue) -> Result<Json, CyclicReference> {
        let Some(typed) = value.downcast_ref::<D::Value>() else {
            panic!(
                "committed value of type {} does not match descriptor expecting {}",
                value.type_name(),
                core::any::type_name::<D::Value>()
            );
        };
        self.descriptor.serialize(typed)
    }

    fn deserialize_erased(
        &self,
        cx: &ValidateCx<'_>,
        json: &Json,
    ) -> Result<ErasedValue, InvalidValue> {
        self.descriptor.deserialize(cx, json).map(ErasedValue::new)
    }

    fn equal_erased(&self, a: &ErasedValue, b: &ErasedValue) -> bool {
        match (a.downcast_ref::<D::Value>(), b.downcast_ref::<D::Value>()) {
            (Some(a), Some(b)) => self.descriptor.equal(a, b),
            _ => false,
        }
    }

    fn container_ops(&self) -> Option<&dyn ContainerOps> {
        self.descriptor.as_container_ops()
    }
}

/// A typed field key.
///
/// Handed back by schema construction, this pairs the field name with a
/// phantom of its value type, enabling compile-time-checked get/set on
/// owning objects. Keyed by name rather than index because inheritance
/// merges field tables by exact name.
///
/// `Field<T>` is two words and `Copy` regardless of `T`.
pub struct Field<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Field<T> {
    /// Creates a typed key for a named field.
    ///
    /// Typically obtained from schema construction rather than built
    /// directly; the caller must ensure the field was declared with a
    /// descriptor whose value type is `T`.
    #[must_use]
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The field name.
    #[must_use]
    #[inline]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

// Manual trait implementations to avoid requiring T: Clone, etc.

impl<T> Copy for Field<T> {}

impl<T> Clone for Field<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Field<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for Field<T> {}

impl<T> core::hash::Hash for Field<T> {
    #[inline]
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Seq;
    use crate::scalar::{Float, Integer, Text};

    #[test]
    fn field_spec_binds_to_registration() {
        let reg = FieldSpec::new(Float::new(), "x-coordinate")
            .required()
            .default(1.5)
            .bind("x");

        assert_eq!(reg.name(), "x");
        assert_eq!(reg.doc(), "x-coordinate");
        assert!(reg.required());

        let default = reg.default_erased().unwrap();
        assert_eq!(default.downcast_ref::<f64>(), Some(&1.5));
    }

    #[test]
    fn producer_default_is_fresh_per_resolve() {
        let reg = FieldSpec::new(Seq::new(Integer::new()), "buffer")
            .default_with(Vec::new)
            .bind("buffer");

        let a = reg.default_erased().unwrap();
        let b = reg.default_erased().unwrap();
        let a = a.downcast::<Vec<i64>>().unwrap();
        let mut b = b.downcast::<Vec<i64>>().unwrap();
        b.push(9);
        assert!(a.is_empty());
        assert_eq!(b, vec![9]);
    }

    #[test]
    fn registration_validates_and_compares() {
        let reg = FieldSpec::new(Text, "label").bind("label");
        let cx = ValidateCx::none();

        let valid = reg
            .validate_erased(&cx, &ErasedValue::new(String::from("hi")))
            .unwrap();
        assert_eq!(valid.downcast_ref::<String>().unwrap(), "hi");

        let other = ErasedValue::new(String::from("hi"));
        assert!(reg.equal_erased(&valid, &other));
        // Wrong-typed values are never equal.
        assert!(!reg.equal_erased(&valid, &ErasedValue::new(1_i64)));
    }

    #[test]
    fn registration_rejects_with_context() {
        let reg = FieldSpec::new(Float::new(), "x-coordinate").bind("x");
        let cx = ValidateCx::new(Some("Point"), Some("x"));
        let err = reg
            .validate_erased(&cx, &ErasedValue::new("nope"))
            .unwrap_err();
        assert_eq!(err.property(), Some("x"));
        assert_eq!(err.class(), Some("Point"));
    }

    #[test]
    fn scalar_field_has_no_container_ops() {
        let reg = FieldSpec::new(Integer::new(), "count").bind("count");
        assert!(reg.container_ops().is_none());
    }

    #[test]
    fn field_key_is_copy_and_name_keyed() {
        let a: Field<f64> = Field::new("x");
        let b = a;
        assert_eq!(a, b);
        assert_eq!(a.name(), "x");
    }
}
