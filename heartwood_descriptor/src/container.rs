// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Container adapters.
//!
//! This module wraps an element descriptor into ordered-sequence, set,
//! tuple, and keyed-mapping semantics with recursive validation: [`Seq`],
//! [`SetOf`], [`TupleOf`], and [`Mapping`].
//!
//! Whole-container validation is all-or-nothing: one failing element
//! aborts the assignment and the previously committed value stands.
//! Single-element mutation goes through [`SeqOps`]/[`MapOps`], which
//! validate only the touched element and re-check size constraints, so an
//! owning object can mutate a container in place without revalidating
//! every element.

use crate::descriptor::{Descriptor, Json, ValidateCx};
use crate::error::{CyclicReference, InvalidValue};
use crate::value::ErasedValue;

/// Single-element mutation support exposed by container descriptors.
///
/// The owning-object runtime discovers this through the erased field
/// layer; which family a container answers to depends on its shape.
pub trait ContainerOps {
    /// Ordered-element operations, for sequence-shaped containers.
    fn seq(&self) -> Option<&dyn SeqOps> {
        None
    }

    /// Keyed-entry operations, for mapping-shaped containers.
    fn map(&self) -> Option<&dyn MapOps> {
        None
    }
}

/// Ordered-element operations over an erased committed container.
///
/// Every operation validates only the touched element, re-checks the
/// container's size constraints, and returns the updated container value;
/// on failure the input container is untouched.
pub trait SeqOps {
    /// The number of elements in a committed container value.
    ///
    /// # Panics
    ///
    /// Panics if `container` is not this descriptor's value type.
    fn len(&self, container: &ErasedValue) -> usize;

    /// Inserts a validated element at `index`.
    fn insert(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
        item: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue>;

    /// Removes the element at `index`.
    fn remove(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
    ) -> Result<ErasedValue, InvalidValue>;

    /// Replaces the element at `index` with a validated element.
    fn replace(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
        item: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue>;
}

/// Keyed-entry operations over an erased committed container.
pub trait MapOps {
    /// Inserts or replaces the entry for a validated key.
    fn insert(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        key: &ErasedValue,
        value: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue>;

    /// Removes the entry for a key; the key must be present.
    fn remove(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        key: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue>;
}

fn length_error(
    cx: &ValidateCx<'_>,
    info: String,
    len: usize,
    min: Option<usize>,
    max: Option<usize>,
) -> InvalidValue {
    let detail = match (min, max) {
        (Some(min), _) if len < min => format!("minimum length is {min}"),
        (_, Some(max)) if len > max => format!("maximum length is {max}"),
        _ => "length constraint violated".to_owned(),
    };
    InvalidValue::new(cx, info, &format_args!("a container of length {len}")).with_detail(detail)
}

fn check_length(
    cx: &ValidateCx<'_>,
    info: impl Fn() -> String,
    len: usize,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<(), InvalidValue> {
    if min.is_some_and(|min| len < min) || max.is_some_and(|max| len > max) {
        return Err(length_error(cx, info(), len, min, max));
    }
    Ok(())
}

/// Downcasts a committed container value.
///
/// Committed values always carry the descriptor's value type; a mismatch
/// is misuse of the erased API.
fn committed<T: 'static>(container: &ErasedValue) -> &T {
    match container.downcast_ref::<T>() {
        Some(typed) => typed,
        None => panic!(
            "committed container of type {} does not match descriptor expecting {}",
            container.type_name(),
            core::any::type_name::<T>()
        ),
    }
}

/// An ordered-sequence adapter over an element descriptor.
///
/// The value type is `Vec` of the element's value type. Input order is
/// preserved. Accepts a typed `Vec`, a `Vec<ErasedValue>` of raw
/// candidates, or — with [`Seq::coerce`] — a bare element, wrapped into a
/// one-element sequence.
///
/// # Example
///
/// ```rust
/// use heartwood_descriptor::{Descriptor, ErasedValue, Integer, Seq, ValidateCx};
///
/// let scores = Seq::new(Integer::new().min(0)).max_length(3);
/// let cx = ValidateCx::none();
///
/// let valid = scores
///     .validate(&cx, &ErasedValue::new(vec![1_i64, 2, 3]))
///     .unwrap();
/// assert_eq!(valid, vec![1, 2, 3]);
///
/// // One bad element rejects the whole assignment.
/// assert!(scores
///     .validate(&cx, &ErasedValue::new(vec![1_i64, -2, 3]))
///     .is_err());
/// ```
#[derive(Copy, Clone, Debug)]
pub struct Seq<D: Descriptor> {
    elem: D,
    min_length: Option<usize>,
    max_length: Option<usize>,
    coerce: bool,
}

impl<D: Descriptor> Seq<D> {
    /// Creates an unconstrained sequence adapter.
    #[must_use]
    pub fn new(elem: D) -> Self {
        Self {
            elem,
            min_length: None,
            max_length: None,
            coerce: false,
        }
    }

    /// Sets the inclusive minimum length.
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Sets the inclusive maximum length.
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Accepts a bare element candidate as a one-element sequence.
    #[must_use]
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    fn validate_elements(
        &self,
        cx: &ValidateCx<'_>,
        input: &ErasedValue,
    ) -> Result<Vec<D::Value>, InvalidValue> {
        if let Some(typed) = input.downcast_ref::<Vec<D::Value>>() {
            typed
                .iter()
                .map(|e| self.elem.validate(cx, &ErasedValue::new(e.clone())))
                .collect()
        } else if let Some(raw) = input.downcast_ref::<Vec<ErasedValue>>() {
            raw.iter().map(|e| self.elem.validate(cx, e)).collect()
        } else if self.coerce {
            match self.elem.validate(cx, input) {
                Ok(single) => Ok(vec![single]),
                Err(_) => Err(self.failure(cx, input)),
            }
        } else {
            Err(self.failure(cx, input))
        }
    }
}

impl<D: Descriptor> Descriptor for Seq<D> {
    type Value = Vec<D::Value>;

    fn info(&self) -> String {
        format!("a sequence of {}", self.elem.info())
    }

    fn validate(
        &self,
        cx: &ValidateCx<'_>,
        input: &ErasedValue,
    ) -> Result<Self::Value, InvalidValue> {
        let elems = self.validate_elements(cx, input)?;
        check_length(cx, || self.info(), elems.len(), self.min_length, self.max_length)?;
        Ok(elems)
    }

    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.elem.equal(x, y))
    }

    fn serialize(&self, value: &Self::Value) -> Result<Json, CyclicReference> {
        let elems = value
            .iter()
            .map(|e| self.elem.serialize(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Json::Array(elems))
    }

    fn deserialize(
        &self,
        cx: &ValidateCx<'_>,
        json: &Json,
    ) -> Result<Self::Value, InvalidValue> {
        let elems = json.as_array().ok_or_else(|| self.failure(cx, json))?;
        elems.iter().map(|e| self.elem.deserialize(cx, e)).collect()
    }

    fn as_container_ops(&self) -> Option<&dyn ContainerOps> {
        Some(self)
    }
}

impl<D: Descriptor> ContainerOps for Seq<D> {
    fn seq(&self) -> Option<&dyn SeqOps> {
        Some(self)
    }
}

impl<D: Descriptor> SeqOps for Seq<D> {
    fn len(&self, container: &ErasedValue) -> usize {
        committed::<Vec<D::Value>>(container).len()
    }

    fn insert(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
        item: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        let current = committed::<Vec<D::Value>>(container);
        if index > current.len() {
            return Err(self
                .failure(cx, &index)
                .with_detail(format!("insertion index out of bounds (length {})", current.len())));
        }
        check_length(cx, || self.info(), current.len() + 1, None, self.max_length)?;
        let valid = self.elem.validate(cx, item)?;
        let mut next = current.clone();
        next.insert(index, valid);
        Ok(ErasedValue::new(next))
    }

    fn remove(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
    ) -> Result<ErasedValue, InvalidValue> {
        let current = committed::<Vec<D::Value>>(container);
        if index >= current.len() {
            return Err(self
                .failure(cx, &index)
                .with_detail(format!("index out of bounds (length {})", current.len())));
        }
        check_length(cx, || self.info(), current.len() - 1, self.min_length, None)?;
        let mut next = current.clone();
        next.remove(index);
        Ok(ErasedValue::new(next))
    }

    fn replace(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
        item: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        let current = committed::<Vec<D::Value>>(container);
        if index >= current.len() {
            return Err(self
                .failure(cx, &index)
                .with_detail(format!("index out of bounds (length {})", current.len())));
        }
        let valid = self.elem.validate(cx, item)?;
        let mut next = current.clone();
        next[index] = valid;
        Ok(ErasedValue::new(next))
    }
}

/// A set adapter over an element descriptor.
///
/// The value type is `Vec` of the element's value type, deduplicated by
/// the element's `equal` rule, first-insertion order preserved. Equality
/// between two sets is order-insensitive. Elements need not be `Hash` or
/// `Ord`.
#[derive(Copy, Clone, Debug)]
pub struct SetOf<D: Descriptor> {
    elem: D,
    min_length: Option<usize>,
    max_length: Option<usize>,
    coerce: bool,
}

impl<D: Descriptor> SetOf<D> {
    /// Creates an unconstrained set adapter.
    #[must_use]
    pub fn new(elem: D) -> Self {
        Self {
            elem,
            min_length: None,
            max_length: None,
            coerce: false,
        }
    }

    /// Sets the inclusive minimum size.
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Sets the inclusive maximum size.
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Accepts a bare element candidate as a one-element set.
    #[must_use]
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    fn contains(&self, elems: &[D::Value], candidate: &D::Value) -> bool {
        elems.iter().any(|e| self.elem.equal(e, candidate))
    }

    fn dedup(&self, elems: Vec<D::Value>) -> Vec<D::Value> {
        let mut out: Vec<D::Value> = Vec::with_capacity(elems.len());
        for elem in elems {
            if !self.contains(&out, &elem) {
                out.push(elem);
            }
        }
        out
    }
}

impl<D: Descriptor> Descriptor for SetOf<D> {
    type Value = Vec<D::Value>;

    fn info(&self) -> String {
        format!("a set of {}", self.elem.info())
    }

    fn validate(
        &self,
        cx: &ValidateCx<'_>,
        input: &ErasedValue,
    ) -> Result<Self::Value, InvalidValue> {
        let elems = if let Some(typed) = input.downcast_ref::<Vec<D::Value>>() {
            typed
                .iter()
                .map(|e| self.elem.validate(cx, &ErasedValue::new(e.clone())))
                .collect::<Result<Vec<_>, _>>()?
        } else if let Some(raw) = input.downcast_ref::<Vec<ErasedValue>>() {
            raw.iter()
                .map(|e| self.elem.validate(cx, e))
                .collect::<Result<Vec<_>, _>>()?
        } else if self.coerce {
            match self.elem.validate(cx, input) {
                Ok(single) => vec![single],
                Err(_) => return Err(self.failure(cx, input)),
            }
        } else {
            return Err(self.failure(cx, input));
        };
        let elems = self.dedup(elems);
        check_length(cx, || self.info(), elems.len(), self.min_length, self.max_length)?;
        Ok(elems)
    }

    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a.len() == b.len() && a.iter().all(|x| self.contains(b, x))
    }

    fn serialize(&self, value: &Self::Value) -> Result<Json, CyclicReference> {
        let elems = value
            .iter()
            .map(|e| self.elem.serialize(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Json::Array(elems))
    }

    fn deserialize(
        &self,
        cx: &ValidateCx<'_>,
        json: &Json,
    ) -> Result<Self::Value, InvalidValue> {
        let elems = json.as_array().ok_or_else(|| self.failure(cx, json))?;
        let elems = elems
            .iter()
            .map(|e| self.elem.deserialize(cx, e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.dedup(elems))
    }

    fn as_container_ops(&self) -> Option<&dyn ContainerOps> {
        Some(self)
    }
}

impl<D: Descriptor> ContainerOps for SetOf<D> {
    fn seq(&self) -> Option<&dyn SeqOps> {
        Some(self)
    }
}

impl<D: Descriptor> SeqOps for SetOf<D> {
    fn len(&self, container: &ErasedValue) -> usize {
        committed::<Vec<D::Value>>(container).len()
    }

    fn insert(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
        item: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        let current = committed::<Vec<D::Value>>(container);
        let valid = self.elem.validate(cx, item)?;
        if self.contains(current, &valid) {
            // Already a member; the unchanged value suppresses notification.
            return Ok(container.clone());
        }
        check_length(cx, || self.info(), current.len() + 1, None, self.max_length)?;
        let mut next = current.clone();
        next.insert(index.min(next.len()), valid);
        Ok(ErasedValue::new(next))
    }

    fn remove(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
    ) -> Result<ErasedValue, InvalidValue> {
        let current = committed::<Vec<D::Value>>(container);
        if index >= current.len() {
            return Err(self
                .failure(cx, &index)
                .with_detail(format!("index out of bounds (size {})", current.len())));
        }
        check_length(cx, || self.info(), current.len() - 1, self.min_length, None)?;
        let mut next = current.clone();
        next.remove(index);
        Ok(ErasedValue::new(next))
    }

    fn replace(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
        item: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        let current = committed::<Vec<D::Value>>(container);
        if index >= current.len() {
            return Err(self
                .failure(cx, &index)
                .with_detail(format!("index out of bounds (size {})", current.len())));
        }
        let valid = self.elem.validate(cx, item)?;
        let mut next = current.clone();
        if self.contains(&next, &valid) {
            // The replacement is already a member elsewhere; this reduces
            // to removing the replaced element.
            if !self.elem.equal(&next[index], &valid) {
                check_length(cx, || self.info(), next.len() - 1, self.min_length, None)?;
                next.remove(index);
            }
        } else {
            next[index] = valid;
        }
        Ok(ErasedValue::new(next))
    }
}

/// A fixed-arity tuple adapter over an element descriptor.
///
/// The value type is `Vec` of the element's value type with an exact
/// length. Single-element `replace` is supported; `insert` and `remove`
/// are rejected because they would change the arity.
#[derive(Copy, Clone, Debug)]
pub struct TupleOf<D: Descriptor> {
    elem: D,
    arity: usize,
}

impl<D: Descriptor> TupleOf<D> {
    /// Creates a tuple adapter of exactly `arity` elements.
    #[must_use]
    pub fn new(elem: D, arity: usize) -> Self {
        Self { elem, arity }
    }
}

impl<D: Descriptor> Descriptor for TupleOf<D> {
    type Value = Vec<D::Value>;

    fn info(&self) -> String {
        format!("a tuple of {} × {}", self.arity, self.elem.info())
    }

    fn validate(
        &self,
        cx: &ValidateCx<'_>,
        input: &ErasedValue,
    ) -> Result<Self::Value, InvalidValue> {
        let elems = if let Some(typed) = input.downcast_ref::<Vec<D::Value>>() {
            typed
                .iter()
                .map(|e| self.elem.validate(cx, &ErasedValue::new(e.clone())))
                .collect::<Result<Vec<_>, _>>()?
        } else if let Some(raw) = input.downcast_ref::<Vec<ErasedValue>>() {
            raw.iter()
                .map(|e| self.elem.validate(cx, e))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            return Err(self.failure(cx, input));
        };
        if elems.len() != self.arity {
            return Err(self
                .failure(cx, &format_args!("a container of length {}", elems.len()))
                .with_detail(format!("exact length is {}", self.arity)));
        }
        Ok(elems)
    }

    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.elem.equal(x, y))
    }

    fn serialize(&self, value: &Self::Value) -> Result<Json, CyclicReference> {
        let elems = value
            .iter()
            .map(|e| self.elem.serialize(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Json::Array(elems))
    }

    fn deserialize(
        &self,
        cx: &ValidateCx<'_>,
        json: &Json,
    ) -> Result<Self::Value, InvalidValue> {
        let elems = json.as_array().ok_or_else(|| self.failure(cx, json))?;
        elems.iter().map(|e| self.elem.deserialize(cx, e)).collect()
    }

    fn as_container_ops(&self) -> Option<&dyn ContainerOps> {
        Some(self)
    }
}

impl<D: Descriptor> ContainerOps for TupleOf<D> {
    fn seq(&self) -> Option<&dyn SeqOps> {
        Some(self)
    }
}

impl<D: Descriptor> SeqOps for TupleOf<D> {
    fn len(&self, container: &ErasedValue) -> usize {
        committed::<Vec<D::Value>>(container).len()
    }

    fn insert(
        &self,
        cx: &ValidateCx<'_>,
        _container: &ErasedValue,
        _index: usize,
        item: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        Err(self
            .failure(cx, item)
            .with_detail(format!("fixed arity of {}", self.arity)))
    }

    fn remove(
        &self,
        cx: &ValidateCx<'_>,
        _container: &ErasedValue,
        index: usize,
    ) -> Result<ErasedValue, InvalidValue> {
        Err(self
            .failure(cx, &index)
            .with_detail(format!("fixed arity of {}", self.arity)))
    }

    fn replace(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        index: usize,
        item: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        let current = committed::<Vec<D::Value>>(container);
        if index >= current.len() {
            return Err(self
                .failure(cx, &index)
                .with_detail(format!("index out of bounds (arity {})", self.arity)));
        }
        let valid = self.elem.validate(cx, item)?;
        let mut next = current.clone();
        next[index] = valid;
        Ok(ErasedValue::new(next))
    }
}

/// A keyed-mapping adapter over a key descriptor and a value descriptor.
///
/// The value type is a `Vec` of key/value pairs, first-insertion order
/// preserved, keys deduplicated by the key descriptor's `equal` rule with
/// the last value winning. Keys and values validate independently.
///
/// Serializes as an array of two-element `[key, value]` arrays so that
/// non-string key types survive the round trip.
#[derive(Copy, Clone, Debug)]
pub struct Mapping<K: Descriptor, V: Descriptor> {
    key: K,
    value: V,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl<K: Descriptor, V: Descriptor> Mapping<K, V> {
    /// Creates an unconstrained mapping adapter.
    #[must_use]
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            min_length: None,
            max_length: None,
        }
    }

    /// Sets the inclusive minimum entry count.
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Sets the inclusive maximum entry count.
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    fn position_of(&self, entries: &[(K::Value, V::Value)], key: &K::Value) -> Option<usize> {
        entries.iter().position(|(k, _)| self.key.equal(k, key))
    }

    fn dedup(&self, entries: Vec<(K::Value, V::Value)>) -> Vec<(K::Value, V::Value)> {
        let mut out: Vec<(K::Value, V::Value)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match self.position_of(&out, &key) {
                // First insertion keeps its position; the last value wins.
                Some(at) => out[at].1 = value,
                None => out.push((key, value)),
            }
        }
        out
    }
}

impl<K: Descriptor, V: Descriptor> Descriptor for Mapping<K, V> {
    type Value = Vec<(K::Value, V::Value)>;

    fn info(&self) -> String {
        format!("a mapping of {} to {}", self.key.info(), self.value.info())
    }

    fn validate(
        &self,
        cx: &ValidateCx<'_>,
        input: &ErasedValue,
    ) -> Result<Self::Value, InvalidValue> {
        let entries = if let Some(typed) = input.downcast_ref::<Vec<(K::Value, V::Value)>>() {
            typed
                .iter()
                .map(|(k, v)| {
                    Ok((
                        self.key.validate(cx, &ErasedValue::new(k.clone()))?,
                        self.value.validate(cx, &ErasedValue::new(v.clone()))?,
                    ))
                })
                .collect::<Result<Vec<_>, InvalidValue>>()?
        } else if let Some(raw) = input.downcast_ref::<Vec<(ErasedValue, ErasedValue)>>() {
            raw.iter()
                .map(|(k, v)| Ok((self.key.validate(cx, k)?, self.value.validate(cx, v)?)))
                .collect::<Result<Vec<_>, InvalidValue>>()?
        } else {
            return Err(self.failure(cx, input));
        };
        let entries = self.dedup(entries);
        check_length(cx, || self.info(), entries.len(), self.min_length, self.max_length)?;
        Ok(entries)
    }

    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a.len() == b.len()
            && a.iter().all(|(k, v)| {
                self.position_of(b, k)
                    .is_some_and(|at| self.value.equal(&b[at].1, v))
            })
    }

    fn serialize(&self, value: &Self::Value) -> Result<Json, CyclicReference> {
        let entries = value
            .iter()
            .map(|(k, v)| {
                Ok(Json::Array(vec![
                    self.key.serialize(k)?,
                    self.value.serialize(v)?,
                ]))
            })
            .collect::<Result<Vec<_>, CyclicReference>>()?;
        Ok(Json::Array(entries))
    }

    fn deserialize(
        &self,
        cx: &ValidateCx<'_>,
        json: &Json,
    ) -> Result<Self::Value, InvalidValue> {
        let entries = json.as_array().ok_or_else(|| self.failure(cx, json))?;
        let entries = entries
            .iter()
            .map(|entry| {
                let pair = entry.as_array().filter(|p| p.len() == 2);
                let pair = pair.ok_or_else(|| self.failure(cx, entry))?;
                Ok((
                    self.key.deserialize(cx, &pair[0])?,
                    self.value.deserialize(cx, &pair[1])?,
                ))
            })
            .collect::<Result<Vec<_>, InvalidValue>>()?;
        Ok(self.dedup(entries))
    }

    fn as_container_ops(&self) -> Option<&dyn ContainerOps> {
        Some(self)
    }
}

impl<K: Descriptor, V: Descriptor> ContainerOps for Mapping<K, V> {
    fn map(&self) -> Option<&dyn MapOps> {
        Some(self)
    }
}

impl<K: Descriptor, V: Descriptor> MapOps for Mapping<K, V> {
    fn insert(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        key: &ErasedValue,
        value: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        let current = committed::<Vec<(K::Value, V::Value)>>(container);
        let key = self.key.validate(cx, key)?;
        let value = self.value.validate(cx, value)?;
        let mut next = current.clone();
        match self.position_of(&next, &key) {
            Some(at) => next[at].1 = value,
            None => {
                check_length(cx, || self.info(), next.len() + 1, None, self.max_length)?;
                next.push((key, value));
            }
        }
        Ok(ErasedValue::new(next))
    }

    fn remove(
        &self,
        cx: &ValidateCx<'_>,
        container: &ErasedValue,
        key: &ErasedValue,
    ) -> Result<ErasedValue, InvalidValue> {
        let current = committed::<Vec<(K::Value, V::Value)>>(container);
        let key = self.key.validate(cx, key)?;
        let Some(at) = self.position_of(current, &key) else {
            return Err(self
                .failure(cx, &key)
                .with_detail("key not present".to_owned()));
        };
        check_length(cx, || self.info(), current.len() - 1, self.min_length, None)?;
        let mut next = current.clone();
        next.remove(at);
        Ok(ErasedValue::new(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{Float, Integer, Text};

    fn cx() -> ValidateCx<'static> {
        ValidateCx::none()
    }

    #[test]
    fn seq_preserves_order_and_coerces_elements() {
        let desc = Seq::new(Float::new());
        let valid = desc
            .validate(
                &cx(),
                &ErasedValue::new(vec![
                    ErasedValue::new(3_i64),
                    ErasedValue::new(1.5_f64),
                    ErasedValue::new(2_i32),
                ]),
            )
            .unwrap();
        assert_eq!(valid, vec![3.0, 1.5, 2.0]);
    }

    #[test]
    fn seq_all_or_nothing() {
        let desc = Seq::new(Integer::new().min(0));
        let err = desc
            .validate(&cx(), &ErasedValue::new(vec![1_i64, 2, -3]))
            .unwrap_err();
        assert!(format!("{err}").contains("minimum is 0"));
    }

    #[test]
    fn seq_length_constraints() {
        let desc = Seq::new(Integer::new()).min_length(1).max_length(2);
        assert!(desc.validate(&cx(), &ErasedValue::new(Vec::<i64>::new())).is_err());
        assert!(desc
            .validate(&cx(), &ErasedValue::new(vec![1_i64, 2, 3]))
            .is_err());
        assert!(desc.validate(&cx(), &ErasedValue::new(vec![1_i64])).is_ok());
    }

    #[test]
    fn seq_coerce_wraps_single_element() {
        let desc = Seq::new(Integer::new()).coerce();
        assert_eq!(
            desc.validate(&cx(), &ErasedValue::new(5_i64)).unwrap(),
            vec![5]
        );
        // Without coerce, a bare element is rejected.
        let strict = Seq::new(Integer::new());
        assert!(strict.validate(&cx(), &ErasedValue::new(5_i64)).is_err());
    }

    #[test]
    fn seq_ops_validate_touched_element_only() {
        let desc = Seq::new(Integer::new().min(0)).max_length(4);
        let committed = ErasedValue::new(vec![1_i64, 2, 3]);

        let next = desc.insert(&cx(), &committed, 1, &ErasedValue::new(9_i64)).unwrap();
        assert_eq!(next.downcast_ref::<Vec<i64>>().unwrap(), &vec![1, 9, 2, 3]);

        // A failing element leaves the container untouched.
        assert!(desc.insert(&cx(), &committed, 0, &ErasedValue::new(-1_i64)).is_err());
        assert_eq!(committed.downcast_ref::<Vec<i64>>().unwrap(), &vec![1, 2, 3]);

        let next = desc.remove(&cx(), &committed, 0).unwrap();
        assert_eq!(next.downcast_ref::<Vec<i64>>().unwrap(), &vec![2, 3]);

        let next = desc
            .replace(&cx(), &committed, 2, &ErasedValue::new(7_i64))
            .unwrap();
        assert_eq!(next.downcast_ref::<Vec<i64>>().unwrap(), &vec![1, 2, 7]);
    }

    #[test]
    fn seq_ops_enforce_size_constraints() {
        let desc = Seq::new(Integer::new()).min_length(2).max_length(3);
        let committed = ErasedValue::new(vec![1_i64, 2, 3]);
        assert!(desc.insert(&cx(), &committed, 0, &ErasedValue::new(4_i64)).is_err());

        let committed = ErasedValue::new(vec![1_i64, 2]);
        assert!(desc.remove(&cx(), &committed, 0).is_err());
    }

    #[test]
    fn set_dedups_by_element_equal() {
        let desc = SetOf::new(Integer::new());
        let valid = desc
            .validate(&cx(), &ErasedValue::new(vec![3_i64, 1, 3, 2, 1]))
            .unwrap();
        assert_eq!(valid, vec![3, 1, 2]);
    }

    #[test]
    fn set_equality_is_order_insensitive() {
        let desc = SetOf::new(Integer::new());
        let a = vec![1_i64, 2, 3];
        let b = vec![3_i64, 1, 2];
        assert!(desc.equal(&a, &b));
        assert!(!desc.equal(&a, &vec![1_i64, 2]));
    }

    #[test]
    fn set_insert_of_member_is_no_op() {
        let desc = SetOf::new(Integer::new());
        let committed = ErasedValue::new(vec![1_i64, 2]);
        let next = desc.insert(&cx(), &committed, 0, &ErasedValue::new(2_i64)).unwrap();
        assert!(desc.equal(
            next.downcast_ref::<Vec<i64>>().unwrap(),
            committed.downcast_ref::<Vec<i64>>().unwrap()
        ));
    }

    #[test]
    fn tuple_checks_arity() {
        let desc = TupleOf::new(Float::new(), 3);
        assert!(desc
            .validate(&cx(), &ErasedValue::new(vec![1.0_f64, 2.0, 3.0]))
            .is_ok());
        let err = desc
            .validate(&cx(), &ErasedValue::new(vec![1.0_f64, 2.0]))
            .unwrap_err();
        assert!(format!("{err}").contains("exact length is 3"));
    }

    #[test]
    fn tuple_rejects_arity_changing_ops() {
        let desc = TupleOf::new(Float::new(), 2);
        let committed = ErasedValue::new(vec![1.0_f64, 2.0]);
        assert!(desc.insert(&cx(), &committed, 0, &ErasedValue::new(3.0_f64)).is_err());
        assert!(desc.remove(&cx(), &committed, 0).is_err());
        assert!(desc
            .replace(&cx(), &committed, 0, &ErasedValue::new(3.0_f64))
            .is_ok());
    }

    #[test]
    fn mapping_validates_keys_and_values_independently() {
        let desc = Mapping::new(Text, Integer::new().min(0));
        let valid = desc
            .validate(
                &cx(),
                &ErasedValue::new(vec![
                    (ErasedValue::new("a"), ErasedValue::new(1_i64)),
                    (ErasedValue::new("b"), ErasedValue::new(2_i32)),
                ]),
            )
            .unwrap();
        assert_eq!(valid, vec![("a".to_owned(), 1), ("b".to_owned(), 2)]);

        assert!(desc
            .validate(
                &cx(),
                &ErasedValue::new(vec![(ErasedValue::new("a"), ErasedValue::new(-1_i64))]),
            )
            .is_err());
    }

    #[test]
    fn mapping_dedups_keys_last_value_wins() {
        let desc = Mapping::new(Text, Integer::new());
        let valid = desc
            .validate(
                &cx(),
                &ErasedValue::new(vec![
                    ("a".to_owned(), 1_i64),
                    ("b".to_owned(), 2),
                    ("a".to_owned(), 3),
                ]),
            )
            .unwrap();
        assert_eq!(valid, vec![("a".to_owned(), 3), ("b".to_owned(), 2)]);
    }

    #[test]
    fn mapping_entry_ops() {
        let desc = Mapping::new(Text, Integer::new());
        let committed = ErasedValue::new(vec![("a".to_owned(), 1_i64)]);

        let next = desc
            .insert(&cx(), &committed, &ErasedValue::new("b"), &ErasedValue::new(2_i64))
            .unwrap();
        assert_eq!(
            next.downcast_ref::<Vec<(String, i64)>>().unwrap(),
            &vec![("a".to_owned(), 1), ("b".to_owned(), 2)]
        );

        let next = desc.remove(&cx(), &committed, &ErasedValue::new("a")).unwrap();
        assert!(next.downcast_ref::<Vec<(String, i64)>>().unwrap().is_empty());

        let err = desc
            .remove(&cx(), &committed, &ErasedValue::new("zzz"))
            .unwrap_err();
        assert!(format!("{err}").contains("key not present"));
    }

    #[test]
    fn mapping_round_trips_non_string_keys() {
        let desc = Mapping::new(Integer::new(), Text);
        let value = vec![(1_i64, "one".to_owned()), (2, "two".to_owned())];
        let json = desc.serialize(&value).unwrap();
        let back = desc.deserialize(&cx(), &json).unwrap();
        assert!(desc.equal(&value, &back));
    }

    #[test]
    fn nested_containers_validate_recursively() {
        let desc = Seq::new(Seq::new(Integer::new().min(0)));
        let valid = desc
            .validate(&cx(), &ErasedValue::new(vec![vec![1_i64, 2], vec![3_i64]]))
            .unwrap();
        assert_eq!(valid, vec![vec![1, 2], vec![3]]);

        assert!(desc
            .validate(&cx(), &ErasedValue::new(vec![vec![1_i64], vec![-1_i64]]))
            .is_err());
    }

    #[test]
    fn container_serialization_round_trips() {
        let desc = Seq::new(Float::new());
        let value = vec![1.0, 2.5];
        let json = desc.serialize(&value).unwrap();
        assert_eq!(json, serde_json::json!([1.0, 2.5]));
        let back = desc.deserialize(&cx(), &json).unwrap();
        assert!(desc.equal(&value, &back));
    }
}
