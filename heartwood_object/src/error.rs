// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The owning-object failure taxonomy.
//!
//! Every error carries enough context (class name, property name, offending
//! value or missing-property list) to build an actionable message without
//! inspecting internals. Pre-commit failures are transactional: the store
//! is unchanged. Post-commit observer failures are reported without
//! rollback.

use core::fmt;

use heartwood_descriptor::InvalidValue;

/// A name that matches no declared field of the class.
#[derive(Clone, Debug)]
pub struct UnknownField {
    class: String,
    property: String,
}

impl UnknownField {
    pub(crate) fn new(class: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            property: property.into(),
        }
    }

    /// The class the lookup ran against.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The name that failed to resolve.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }
}

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` has no property named '{}'",
            self.class, self.property
        )
    }
}

impl core::error::Error for UnknownField {}

/// An observer assigned to the property whose assignment triggered it.
///
/// Raised instead of recursing unboundedly; the inner assignment is
/// aborted, the outer one proceeds.
#[derive(Clone, Debug)]
pub struct ReentrantMutation {
    class: String,
    property: String,
}

impl ReentrantMutation {
    pub(crate) fn new(class: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            property: property.into(),
        }
    }

    /// The owning class.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The property whose assignment re-entered itself.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }
}

impl fmt::Display for ReentrantMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "re-entrant mutation of property '{}' on `{}` while its assignment is still in progress",
            self.property, self.class
        )
    }
}

impl core::error::Error for ReentrantMutation {}

/// Required properties with no committed value, found by whole-object
/// validation.
#[derive(Clone, Debug)]
pub struct MissingRequired {
    class: String,
    properties: Vec<&'static str>,
}

impl MissingRequired {
    pub(crate) fn new(class: impl Into<String>, properties: Vec<&'static str>) -> Self {
        Self {
            class: class.into(),
            properties,
        }
    }

    /// The validated class.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Every required property that is unset, in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[&'static str] {
        &self.properties
    }
}

impl fmt::Display for MissingRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` is missing required properties: {}",
            self.class,
            self.properties.join(", ")
        )
    }
}

impl core::error::Error for MissingRequired {}

/// A class-level cross-property validator rejected the object.
#[derive(Clone, Debug)]
pub struct Inconsistency {
    class: Option<String>,
    message: String,
}

impl Inconsistency {
    /// Creates a rejection with the given message.
    ///
    /// The owning class is filled in by the validation run.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            class: None,
            message: message.into(),
        }
    }

    pub(crate) fn with_class(mut self, class: &str) -> Self {
        if self.class.is_none() {
            self.class = Some(class.to_owned());
        }
        self
    }

    /// The validated class, when known.
    #[must_use]
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// The validator's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.class {
            Some(class) => write!(f, "`{class}` failed validation: {}", self.message),
            None => write!(f, "failed validation: {}", self.message),
        }
    }
}

impl core::error::Error for Inconsistency {}

/// A class name that resolves to nothing in the registry branch.
///
/// Deserialization never guesses a superclass for an unregistered name.
#[derive(Clone, Debug)]
pub struct UnknownClass {
    name: String,
}

impl UnknownClass {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The unresolved class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for UnknownClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class `{}` is not registered in this branch", self.name)
    }
}

impl core::error::Error for UnknownClass {}

/// A change observer failed after the assignment committed.
///
/// This is a failure of the observer, not of the assignment; the store is
/// not rolled back.
#[derive(Clone, Debug)]
pub struct ObserverError {
    property: Option<String>,
    message: String,
}

impl ObserverError {
    /// Creates an observer failure with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            property: None,
            message: message.into(),
        }
    }

    pub(crate) fn bind_property(&mut self, property: &str) {
        if self.property.is_none() {
            self.property = Some(property.to_owned());
        }
    }

    /// The observed property, filled in by the notification run.
    #[must_use]
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// The observer's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(property) => write!(f, "observer of '{property}' failed: {}", self.message),
            None => write!(f, "observer failed: {}", self.message),
        }
    }
}

impl core::error::Error for ObserverError {}

/// Failure of a single attribute assignment.
#[derive(Clone, Debug)]
pub enum SetError {
    /// The candidate was rejected before commit; the store is unchanged.
    Invalid(InvalidValue),
    /// The name matches no declared field; the store is unchanged.
    UnknownField(UnknownField),
    /// The assignment re-entered itself; the inner store write is aborted.
    Reentrant(ReentrantMutation),
    /// The assignment committed, then one or more change observers failed.
    Observers(Vec<ObserverError>),
}

impl SetError {
    /// `true` when the assignment committed despite the error.
    #[must_use]
    pub fn committed(&self) -> bool {
        matches!(self, Self::Observers(_))
    }
}

impl fmt::Display for SetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(err) => err.fmt(f),
            Self::UnknownField(err) => err.fmt(f),
            Self::Reentrant(err) => err.fmt(f),
            Self::Observers(errors) => {
                write!(f, "{} change observer(s) failed after commit", errors.len())?;
                if let Some(first) = errors.first() {
                    write!(f, ": {first}")?;
                }
                Ok(())
            }
        }
    }
}

impl core::error::Error for SetError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::UnknownField(err) => Some(err),
            Self::Reentrant(err) => Some(err),
            Self::Observers(errors) => errors
                .first()
                .map(|err| err as &(dyn core::error::Error + 'static)),
        }
    }
}

/// Failure of explicit whole-object validation.
#[derive(Clone, Debug)]
pub enum ValidateError {
    /// Required properties are unset.
    MissingRequired(MissingRequired),
    /// A class-level validator rejected the object.
    Inconsistent(Inconsistency),
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired(err) => err.fmt(f),
            Self::Inconsistent(err) => err.fmt(f),
        }
    }
}

impl core::error::Error for ValidateError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::MissingRequired(err) => Some(err),
            Self::Inconsistent(err) => Some(err),
        }
    }
}

/// Failure while reconstructing an object from its serialized form.
#[derive(Clone, Debug)]
pub enum DeserializeError {
    /// The tree does not have the expected shape.
    Malformed {
        /// What was wrong with it.
        detail: String,
    },
    /// The class tag resolved to nothing in the registry branch.
    UnknownClass(UnknownClass),
    /// A field value failed validation on the way back in.
    Invalid(InvalidValue),
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { detail } => write!(f, "malformed serialized object: {detail}"),
            Self::UnknownClass(err) => err.fmt(f),
            Self::Invalid(err) => err.fmt(f),
        }
    }
}

impl core::error::Error for DeserializeError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Malformed { .. } => None,
            Self::UnknownClass(err) => Some(err),
            Self::Invalid(err) => Some(err),
        }
    }
}

/// Failure while building a class schema.
#[derive(Clone, Debug)]
pub enum BuildError {
    /// Field names must be non-empty, public, and not the reserved tag.
    InvalidFieldName {
        /// The class under construction.
        class: &'static str,
        /// The offending name.
        field: &'static str,
    },
    /// The same field name was declared twice on one builder.
    DuplicateField {
        /// The class under construction.
        class: &'static str,
        /// The redeclared name.
        field: &'static str,
    },
    /// A default override names no declared or inherited field.
    UnknownDefault {
        /// The class under construction.
        class: &'static str,
        /// The unresolved name.
        field: &'static str,
    },
    /// An observer names no declared or inherited field.
    UnknownObserved {
        /// The class under construction.
        class: &'static str,
        /// The unresolved name.
        field: &'static str,
    },
    /// A declared default failed its own descriptor's validation.
    InvalidDefault {
        /// The class under construction.
        class: &'static str,
        /// The field whose default is invalid.
        field: &'static str,
        /// The underlying rejection.
        source: InvalidValue,
    },
    /// The class name is already registered in the target branch.
    DuplicateClass {
        /// The colliding name.
        class: &'static str,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFieldName { class, field } => {
                write!(f, "invalid field name '{field}' on `{class}`")
            }
            Self::DuplicateField { class, field } => {
                write!(f, "field '{field}' is declared twice on `{class}`")
            }
            Self::UnknownDefault { class, field } => {
                write!(f, "default override for unknown field '{field}' on `{class}`")
            }
            Self::UnknownObserved { class, field } => {
                write!(f, "observer for unknown field '{field}' on `{class}`")
            }
            Self::InvalidDefault { class, field, source } => {
                write!(f, "invalid default for field '{field}' on `{class}`: {source}")
            }
            Self::DuplicateClass { class } => {
                write!(f, "class `{class}` is already registered in this branch")
            }
        }
    }
}

impl core::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::InvalidDefault { source, .. } => Some(source),
            _ => None,
        }
    }
}
