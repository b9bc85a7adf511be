// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-place container mutation.
//!
//! These entry points mutate one element of a committed container
//! property: the container descriptor validates only the touched element
//! and produces the updated value, which then re-enters the shared
//! assignment pipeline at the instance-validation stage. Observers cannot
//! distinguish an in-place mutation from a whole-value reassignment by
//! watching the notification stream. A failed element operation changes
//! nothing.

use heartwood_descriptor::{
    ContainerOps, ErasedValue, InvalidValue, MapOps, SeqOps, ValidateCx,
};

use crate::error::SetError;
use crate::object::Object;

impl Object {
    /// Appends an element to a sequence- or set-shaped container property.
    ///
    /// For set-shaped containers, appending an existing member commits the
    /// unchanged value, which suppresses change notification.
    pub fn push_item(&self, name: &str, item: ErasedValue) -> Result<(), SetError> {
        self.with_seq_ops(name, |ops, cx, committed| {
            ops.insert(cx, committed, ops.len(committed), &item)
        })
    }

    /// Inserts an element at `index`.
    pub fn insert_item(&self, name: &str, index: usize, item: ErasedValue) -> Result<(), SetError> {
        self.with_seq_ops(name, |ops, cx, committed| {
            ops.insert(cx, committed, index, &item)
        })
    }

    /// Removes the element at `index`.
    pub fn remove_item(&self, name: &str, index: usize) -> Result<(), SetError> {
        self.with_seq_ops(name, |ops, cx, committed| ops.remove(cx, committed, index))
    }

    /// Replaces the element at `index`.
    pub fn replace_item(&self, name: &str, index: usize, item: ErasedValue) -> Result<(), SetError> {
        self.with_seq_ops(name, |ops, cx, committed| {
            ops.replace(cx, committed, index, &item)
        })
    }

    /// Inserts or replaces an entry of a mapping-shaped container property.
    pub fn insert_entry(
        &self,
        name: &str,
        key: ErasedValue,
        value: ErasedValue,
    ) -> Result<(), SetError> {
        self.with_map_ops(name, |ops, cx, committed| {
            ops.insert(cx, committed, &key, &value)
        })
    }

    /// Removes the entry for `key`; the key must be present.
    pub fn remove_entry(&self, name: &str, key: ErasedValue) -> Result<(), SetError> {
        self.with_map_ops(name, |ops, cx, committed| ops.remove(cx, committed, &key))
    }

    fn with_seq_ops<F>(&self, name: &str, op: F) -> Result<(), SetError>
    where
        F: FnOnce(
            &dyn SeqOps,
            &ValidateCx<'_>,
            &ErasedValue,
        ) -> Result<ErasedValue, InvalidValue>,
    {
        let registration = self.registration(name)?;
        let name = registration.name();
        let cx = ValidateCx::new(Some(self.class().name()), Some(name));
        let ops = registration
            .container_ops()
            .and_then(ContainerOps::seq)
            .ok_or_else(|| not_a_container(&cx, "an ordered-container property"))?;
        let committed = self.committed_container(&cx, &registration)?;
        let next = op(ops, &cx, &committed).map_err(SetError::Invalid)?;
        self.apply(name, Some(next), false)
    }

    fn with_map_ops<F>(&self, name: &str, op: F) -> Result<(), SetError>
    where
        F: FnOnce(
            &dyn MapOps,
            &ValidateCx<'_>,
            &ErasedValue,
        ) -> Result<ErasedValue, InvalidValue>,
    {
        let registration = self.registration(name)?;
        let name = registration.name();
        let cx = ValidateCx::new(Some(self.class().name()), Some(name));
        let ops = registration
            .container_ops()
            .and_then(ContainerOps::map)
            .ok_or_else(|| not_a_container(&cx, "a keyed-mapping property"))?;
        let committed = self.committed_container(&cx, &registration)?;
        let next = op(ops, &cx, &committed).map_err(SetError::Invalid)?;
        self.apply(name, Some(next), false)
    }

    fn committed_container(
        &self,
        cx: &ValidateCx<'_>,
        registration: &heartwood_descriptor::FieldRegistration,
    ) -> Result<ErasedValue, SetError> {
        self.get_erased(registration.name()).ok_or_else(|| {
            SetError::Invalid(
                InvalidValue::new(cx, registration.info(), &"unset")
                    .with_detail("in-place mutation requires a committed container"),
            )
        })
    }
}

fn not_a_container(cx: &ValidateCx<'_>, expected: &str) -> SetError {
    let property = cx.property().unwrap_or("<unknown>");
    SetError::Invalid(
        InvalidValue::new(cx, expected, &property)
            .with_detail("this property does not support element operations"),
    )
}
