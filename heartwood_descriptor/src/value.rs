// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased property values.
//!
//! This module provides [`ErasedValue`], the currency in which candidate
//! values, committed values, and observer payloads travel through the
//! name-keyed layers of the object model.

use core::any::{Any, TypeId};
use core::fmt;

/// A type-erased property value.
///
/// This wraps a value of any `'static + Clone + Debug` type, storing it on
/// the heap with its type information for later downcasting. Unlike a plain
/// `Box<dyn Any>`, the debug rendering of the inner value is preserved so
/// that validation failures can show the offending value.
///
/// # Example
///
/// ```rust
/// use heartwood_descriptor::ErasedValue;
///
/// let value = ErasedValue::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&42));
/// assert_eq!(value.type_name(), "i32");
///
/// let cloned = value.clone();
/// assert_eq!(cloned.downcast_ref::<i32>(), Some(&42));
/// ```
pub struct ErasedValue {
    inner: Box<dyn ErasedValueTrait>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ErasedValue {
    /// Creates a new erased value from a concrete value.
    #[must_use]
    pub fn new<T: Clone + fmt::Debug + 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            inner: Box::new(value),
        }
    }

    /// Returns the [`TypeId`] of the contained value.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the contained value.
    ///
    /// This is [`core::any::type_name`] output, intended for error messages
    /// rather than programmatic matching.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the contained value is of type `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Attempts to downcast to a reference of type `T`.
    ///
    /// Returns `None` if the contained value is not of type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if self.is::<T>() {
            self.inner.as_any().downcast_ref()
        } else {
            None
        }
    }

    /// Attempts to take the contained value out as type `T`.
    ///
    /// Returns the value unchanged in `Err` if it is not of type `T`.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        if self.is::<T>() {
            match self.inner.into_any().downcast::<T>() {
                Ok(boxed) => Ok(*boxed),
                Err(_) => unreachable!("type id matched but downcast failed"),
            }
        } else {
            Err(self)
        }
    }

    /// Clones the contained value out as type `T`, if it is one.
    #[must_use]
    pub fn to_typed<T: Clone + 'static>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl Clone for ErasedValue {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_boxed(),
            type_id: self.type_id,
            type_name: self.type_name,
        }
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.debug(f)
    }
}

/// Trait object for type-erased values that can be cloned and rendered.
trait ErasedValueTrait: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_boxed(&self) -> Box<dyn ErasedValueTrait>;
    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: Clone + fmt::Debug + 'static> ErasedValueTrait for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_boxed(&self) -> Box<dyn ErasedValueTrait> {
        Box::new(self.clone())
    }

    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
