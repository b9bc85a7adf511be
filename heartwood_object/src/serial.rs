// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Serialization of object graphs to and from JSON-compatible trees.
//!
//! An object serializes to a keyed mapping of every committed field's
//! descriptor-serialized value plus a reserved class-name tag.
//! Deserialization resolves the tag in the registry branch of the class it
//! was invoked through — class-name-exact, so a tagged subclass comes back
//! as that subclass and an unregistered name is an error, never a guessed
//! superclass. Field values re-enter the normal validation pipeline on the
//! way in, under a full observer-suspension scope.

use heartwood_descriptor::{CyclicReference, Json, ValidateCx};

use crate::class::ObjectClass;
use crate::error::{DeserializeError, SetError};
use crate::object::{FlagGuard, Object};
use crate::observe::{SuspendKind, suspend};
use crate::registry::ClassRegistry;

/// The reserved key carrying the class name in serialized objects.
pub const CLASS_KEY: &str = "__class__";

impl Object {
    /// Serializes every committed field plus the class-name tag.
    ///
    /// Unset fields are omitted. A self-referential object graph fails
    /// with [`CyclicReference`] rather than recursing indefinitely.
    pub fn serialize(&self) -> Result<Json, CyclicReference> {
        let core = self.core();
        let Some(_guard) = FlagGuard::acquire(&core.serializing) else {
            return Err(CyclicReference::new(core.class.name()));
        };
        let mut tree = serde_json::Map::new();
        for registration in core.class.fields() {
            if let Some(value) = self.get_erased(registration.name()) {
                tree.insert(
                    registration.name().to_owned(),
                    registration.serialize_erased(&value)?,
                );
            }
        }
        tree.insert(
            CLASS_KEY.to_owned(),
            Json::String(core.class.name().to_owned()),
        );
        Ok(Json::Object(tree))
    }
}

impl ObjectClass {
    /// Reconstructs an instance from a serialized tree.
    ///
    /// The class tag, when present, is resolved in this class's registry
    /// branch, so invoking through a base class reconstructs the tagged
    /// subclass. A missing tag falls back to this class; an unknown tag is
    /// an error. Keys matching no field are skipped with a warning.
    pub fn deserialize(&self, tree: &Json) -> Result<Object, DeserializeError> {
        let tree = tree.as_object().ok_or_else(|| DeserializeError::Malformed {
            detail: "expected a keyed mapping".to_owned(),
        })?;
        let class = match tree.get(CLASS_KEY) {
            Some(tag) => {
                let tag = tag.as_str().ok_or_else(|| DeserializeError::Malformed {
                    detail: "class tag must be a string".to_owned(),
                })?;
                self.registry()
                    .lookup(tag)
                    .map_err(DeserializeError::UnknownClass)?
            }
            None => self.arc(),
        };
        class.deserialize_fields(tree)
    }

    fn deserialize_fields(
        &self,
        tree: &serde_json::Map<String, Json>,
    ) -> Result<Object, DeserializeError> {
        let object = self.instantiate();
        let _quiet = suspend(SuspendKind::ALL);
        for (key, value) in tree {
            if key == CLASS_KEY {
                continue;
            }
            let Some(registration) = self.field(key) else {
                log::warn!(
                    "ignoring unknown key '{key}' while deserializing `{}`",
                    self.name()
                );
                continue;
            };
            let cx = ValidateCx::new(Some(self.name()), Some(registration.name()));
            let candidate = registration
                .deserialize_erased(&cx, value)
                .map_err(DeserializeError::Invalid)?;
            object.set_erased(key, candidate).map_err(|err| match err {
                SetError::Invalid(inner) => DeserializeError::Invalid(inner),
                other => DeserializeError::Malformed {
                    detail: other.to_string(),
                },
            })?;
        }
        Ok(object)
    }
}

/// Reconstructs an instance from a tagged tree without a class in hand.
///
/// The tag is mandatory here; it is the only way to pick the class.
pub fn deserialize_from(
    registry: &ClassRegistry,
    tree: &Json,
) -> Result<Object, DeserializeError> {
    let map = tree.as_object().ok_or_else(|| DeserializeError::Malformed {
        detail: "expected a keyed mapping".to_owned(),
    })?;
    let tag = map
        .get(CLASS_KEY)
        .and_then(Json::as_str)
        .ok_or_else(|| DeserializeError::Malformed {
            detail: format!("missing '{CLASS_KEY}' tag"),
        })?;
    let class = registry
        .lookup(tag)
        .map_err(DeserializeError::UnknownClass)?;
    class.deserialize(tree)
}
