// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Built-in scalar descriptors.
//!
//! These are the built-in side of the descriptor plugin interface: each is
//! one [`Descriptor`] implementation over a JSON-natural scalar. Richer
//! primitive families (dates, uuids, colors, numeric arrays) implement the
//! same trait outside this crate.

use crate::descriptor::{Descriptor, Json, ValidateCx};
use crate::error::{CyclicReference, InvalidValue};
use crate::value::ErasedValue;

/// A boolean-valued descriptor.
///
/// No coercion: only `bool` candidates validate.
#[derive(Copy, Clone, Debug, Default)]
pub struct Boolean;

impl Descriptor for Boolean {
    type Value = bool;

    fn info(&self) -> String {
        "a boolean".to_owned()
    }

    fn validate(&self, cx: &ValidateCx<'_>, input: &ErasedValue) -> Result<bool, InvalidValue> {
        input
            .to_typed::<bool>()
            .ok_or_else(|| self.failure(cx, input))
    }

    fn equal(&self, a: &bool, b: &bool) -> bool {
        a == b
    }

    fn serialize(&self, value: &bool) -> Result<Json, CyclicReference> {
        Ok(Json::Bool(*value))
    }

    fn deserialize(&self, cx: &ValidateCx<'_>, json: &Json) -> Result<bool, InvalidValue> {
        json.as_bool().ok_or_else(|| self.failure(cx, json))
    }
}

/// An integer-valued descriptor over `i64`.
///
/// Candidates of the smaller signed and unsigned integer types coerce;
/// `u64` coerces when it fits. Optional inclusive bounds.
///
/// # Example
///
/// ```rust
/// use heartwood_descriptor::{Descriptor, ErasedValue, Integer, ValidateCx};
///
/// let port = Integer::new().min(1).max(65535);
/// let cx = ValidateCx::none();
/// assert_eq!(port.validate(&cx, &ErasedValue::new(8080_u32)).unwrap(), 8080);
/// assert!(port.validate(&cx, &ErasedValue::new(0_i64)).is_err());
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct Integer {
    min: Option<i64>,
    max: Option<i64>,
}

impl Integer {
    /// Creates an unbounded integer descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    fn check_bounds(&self, cx: &ValidateCx<'_>, value: i64) -> Result<i64, InvalidValue> {
        if let Some(min) = self.min
            && value < min
        {
            return Err(self.failure(cx, &value).with_detail(format!("minimum is {min}")));
        }
        if let Some(max) = self.max
            && value > max
        {
            return Err(self.failure(cx, &value).with_detail(format!("maximum is {max}")));
        }
        Ok(value)
    }
}

impl Descriptor for Integer {
    type Value = i64;

    fn info(&self) -> String {
        match (self.min, self.max) {
            (None, None) => "an integer".to_owned(),
            (Some(min), None) => format!("an integer >= {min}"),
            (None, Some(max)) => format!("an integer <= {max}"),
            (Some(min), Some(max)) => format!("an integer in [{min}, {max}]"),
        }
    }

    fn validate(&self, cx: &ValidateCx<'_>, input: &ErasedValue) -> Result<i64, InvalidValue> {
        let coerced = input
            .to_typed::<i64>()
            .or_else(|| input.to_typed::<i32>().map(i64::from))
            .or_else(|| input.to_typed::<i16>().map(i64::from))
            .or_else(|| input.to_typed::<i8>().map(i64::from))
            .or_else(|| input.to_typed::<u32>().map(i64::from))
            .or_else(|| input.to_typed::<u16>().map(i64::from))
            .or_else(|| input.to_typed::<u8>().map(i64::from))
            .or_else(|| input.to_typed::<u64>().and_then(|v| i64::try_from(v).ok()));
        let value = coerced.ok_or_else(|| self.failure(cx, input))?;
        self.check_bounds(cx, value)
    }

    fn equal(&self, a: &i64, b: &i64) -> bool {
        a == b
    }

    fn serialize(&self, value: &i64) -> Result<Json, CyclicReference> {
        Ok(Json::from(*value))
    }

    fn deserialize(&self, cx: &ValidateCx<'_>, json: &Json) -> Result<i64, InvalidValue> {
        json.as_i64().ok_or_else(|| self.failure(cx, json))
    }
}

/// A float-valued descriptor over `f64`.
///
/// Candidates of `f32` and the common integer types coerce. Optional
/// inclusive bounds.
#[derive(Copy, Clone, Debug, Default)]
pub struct Float {
    min: Option<f64>,
    max: Option<f64>,
}

impl Float {
    /// Creates an unbounded float descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    fn check_bounds(&self, cx: &ValidateCx<'_>, value: f64) -> Result<f64, InvalidValue> {
        if let Some(min) = self.min
            && value < min
        {
            return Err(self.failure(cx, &value).with_detail(format!("minimum is {min}")));
        }
        if let Some(max) = self.max
            && value > max
        {
            return Err(self.failure(cx, &value).with_detail(format!("maximum is {max}")));
        }
        Ok(value)
    }
}

impl Descriptor for Float {
    type Value = f64;

    fn info(&self) -> String {
        match (self.min, self.max) {
            (None, None) => "a floating-point number".to_owned(),
            (Some(min), None) => format!("a floating-point number >= {min}"),
            (None, Some(max)) => format!("a floating-point number <= {max}"),
            (Some(min), Some(max)) => format!("a floating-point number in [{min}, {max}]"),
        }
    }

    fn validate(&self, cx: &ValidateCx<'_>, input: &ErasedValue) -> Result<f64, InvalidValue> {
        let coerced = input
            .to_typed::<f64>()
            .or_else(|| input.to_typed::<f32>().map(f64::from))
            .or_else(|| {
                input
                    .to_typed::<i64>()
                    .map(|v| v as f64)
            })
            .or_else(|| input.to_typed::<i32>().map(f64::from))
            .or_else(|| input.to_typed::<u32>().map(f64::from));
        let value = coerced.ok_or_else(|| self.failure(cx, input))?;
        self.check_bounds(cx, value)
    }

    fn equal(&self, a: &f64, b: &f64) -> bool {
        a == b
    }

    fn serialize(&self, value: &f64) -> Result<Json, CyclicReference> {
        Ok(Json::from(*value))
    }

    fn deserialize(&self, cx: &ValidateCx<'_>, json: &Json) -> Result<f64, InvalidValue> {
        // Accept a JSON integer where a float was serialized losslessly.
        json.as_f64().ok_or_else(|| self.failure(cx, json))
    }
}

/// A string-valued descriptor over `String`.
///
/// `&'static str` candidates coerce.
#[derive(Copy, Clone, Debug, Default)]
pub struct Text;

impl Descriptor for Text {
    type Value = String;

    fn info(&self) -> String {
        "a string".to_owned()
    }

    fn validate(&self, cx: &ValidateCx<'_>, input: &ErasedValue) -> Result<String, InvalidValue> {
        input
            .to_typed::<String>()
            .or_else(|| input.to_typed::<&'static str>().map(str::to_owned))
            .ok_or_else(|| self.failure(cx, input))
    }

    fn equal(&self, a: &String, b: &String) -> bool {
        a == b
    }

    fn serialize(&self, value: &String) -> Result<Json, CyclicReference> {
        Ok(Json::String(value.clone()))
    }

    fn deserialize(&self, cx: &ValidateCx<'_>, json: &Json) -> Result<String, InvalidValue> {
        json.as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.failure(cx, json))
    }
}
