// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Descriptor-level failures.

use core::fmt;

use crate::descriptor::ValidateCx;

/// A candidate value was rejected by a descriptor, an instance validator,
/// or a validating observer.
///
/// The error carries the owning class and property names when they are
/// known, the descriptor's expectation, and a debug rendering of the
/// offending value, so the message is actionable without further lookup.
/// The owning object's store is left unchanged whenever this is raised.
#[derive(Clone, Debug)]
pub struct InvalidValue {
    class: Option<String>,
    property: Option<String>,
    expected: String,
    value: String,
    detail: Option<String>,
}

impl InvalidValue {
    /// Creates a new error from the validation context, the descriptor's
    /// expectation, and the offending value.
    #[must_use]
    pub fn new(cx: &ValidateCx<'_>, expected: impl Into<String>, value: &dyn fmt::Debug) -> Self {
        Self {
            class: cx.class().map(str::to_owned),
            property: cx.property().map(str::to_owned),
            expected: expected.into(),
            value: format!("{value:?}"),
            detail: None,
        }
    }

    /// Attaches an extra sentence to the message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The owning class name, when the failure occurred on a bound property.
    #[must_use]
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// The property name, when the failure occurred on a bound property.
    #[must_use]
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// The descriptor's expectation, e.g. `"a floating-point number"`.
    #[must_use]
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Debug rendering of the rejected value.
    #[must_use]
    pub fn offending_value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value")?;
        if let Some(property) = &self.property {
            write!(f, " for property '{property}'")?;
        }
        if let Some(class) = &self.class {
            write!(f, " of a `{class}` instance")?;
        }
        write!(f, ": expected {}, got {}", self.expected, self.value)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl core::error::Error for InvalidValue {}

/// Serialization hit a reference cycle in the object graph.
///
/// Cyclic object graphs are unsupported by serialization; rather than
/// recurse indefinitely, the walk fails when it re-enters an object it is
/// already serializing.
#[derive(Clone, Debug)]
pub struct CyclicReference {
    class: String,
}

impl CyclicReference {
    /// Creates a new error naming the class of the re-entered object.
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
        }
    }

    /// The class of the object that was reached a second time.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }
}

impl fmt::Display for CyclicReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot serialize `{}`: the object graph contains a reference cycle",
            self.class
        )
    }
}

impl core::error::Error for CyclicReference {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_message_unbound() {
        let err = InvalidValue::new(&ValidateCx::none(), "a boolean", &42_i64);
        assert_eq!(format!("{err}"), "invalid value: expected a boolean, got 42");
    }

    #[test]
    fn invalid_value_message_bound() {
        let cx = ValidateCx::new(Some("Point"), Some("x"));
        let err = InvalidValue::new(&cx, "a floating-point number", &"abc");
        let message = format!("{err}");
        assert!(message.contains("property 'x'"));
        assert!(message.contains("`Point` instance"));
        assert!(message.contains("got \"abc\""));
    }

    #[test]
    fn invalid_value_detail() {
        let err = InvalidValue::new(&ValidateCx::none(), "an integer", &128_i64)
            .with_detail("maximum is 100");
        assert!(format!("{err}").ends_with("(maximum is 100)"));
    }

    #[test]
    fn cyclic_reference_message() {
        let err = CyclicReference::new("Node");
        assert!(format!("{err}").contains("`Node`"));
    }
}
