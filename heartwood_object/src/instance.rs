// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The nested-instance descriptor.
//!
//! [`InstanceOf`] makes an owning object a property value of another,
//! constrained to a class or any of its descendants. It is one more
//! implementation of the descriptor capability set, which is what lets
//! object graphs nest — and why serialization carries a cycle guard.

use core::fmt;

use heartwood_descriptor::{
    CyclicReference, Descriptor, ErasedValue, InvalidValue, Json, ValidateCx,
};
use std::sync::Arc;

use crate::class::ObjectClass;
use crate::object::Object;

/// A descriptor whose value is an instance of a class or its descendants.
///
/// Candidates are accepted by class, not by content: committed values are
/// already valid field-by-field, and required-field completeness is the
/// business of explicit whole-object validation. Values compare with
/// [`Object::equal`] and serialize by recursing into the nested object,
/// whose own tag makes polymorphic reconstruction work.
///
/// # Example
///
/// ```rust
/// use heartwood_descriptor::{FieldSpec, Float};
/// use heartwood_object::{ClassBuilder, ClassRegistry, InstanceOf};
///
/// let branch = ClassRegistry::root().branch("instance-doc");
/// let mut builder = ClassBuilder::new("Anchor");
/// builder.registry(&branch);
/// let depth = builder.field("depth", FieldSpec::new(Float::new(), "depth"));
/// let anchor = builder.build().unwrap();
///
/// let mut builder = ClassBuilder::new("Buoy");
/// builder.registry(&branch);
/// let tether = builder.field("tether", FieldSpec::new(InstanceOf::new(&anchor), "anchor point"));
/// let buoy = builder.build().unwrap();
///
/// let a = anchor.instantiate();
/// a.set(depth, 12.0).unwrap();
/// let b = buoy.instantiate();
/// b.set(tether, a.clone()).unwrap();
/// assert!(b.get(tether).unwrap().equal(&a));
/// ```
#[derive(Clone)]
pub struct InstanceOf {
    class: Arc<ObjectClass>,
}

impl InstanceOf {
    /// Creates a descriptor accepting `class` and its descendants.
    #[must_use]
    pub fn new(class: &Arc<ObjectClass>) -> Self {
        Self {
            class: class.clone(),
        }
    }

    /// The accepted base class.
    #[must_use]
    pub fn class(&self) -> &Arc<ObjectClass> {
        &self.class
    }
}

impl fmt::Debug for InstanceOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceOf")
            .field("class", &self.class.name())
            .finish()
    }
}

impl Descriptor for InstanceOf {
    type Value = Object;

    fn info(&self) -> String {
        format!("an instance of `{}`", self.class.name())
    }

    fn validate(&self, cx: &ValidateCx<'_>, input: &ErasedValue) -> Result<Object, InvalidValue> {
        let object = input
            .to_typed::<Object>()
            .ok_or_else(|| self.failure(cx, input))?;
        if !object.class().derives_from(&self.class) {
            return Err(self.failure(cx, input).with_detail(format!(
                "`{}` does not derive from `{}`",
                object.class().name(),
                self.class.name()
            )));
        }
        Ok(object)
    }

    fn equal(&self, a: &Object, b: &Object) -> bool {
        a.equal(b)
    }

    fn serialize(&self, value: &Object) -> Result<Json, CyclicReference> {
        value.serialize()
    }

    fn deserialize(&self, cx: &ValidateCx<'_>, json: &Json) -> Result<Object, InvalidValue> {
        self.class
            .deserialize(json)
            .map_err(|err| self.failure(cx, json).with_detail(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::registry::ClassRegistry;
    use crate::serial::CLASS_KEY;
    use heartwood_descriptor::{Field, FieldSpec, Float, Text};
    use serde_json::json;

    struct NestedParts {
        anchor: Arc<ObjectClass>,
        buoy: Arc<ObjectClass>,
        depth: Field<f64>,
        tether: Field<Object>,
    }

    fn nested(label: &'static str) -> NestedParts {
        let branch = ClassRegistry::root().branch(label);
        let mut builder = ClassBuilder::new("Anchor");
        builder.registry(&branch);
        let depth = builder.field("depth", FieldSpec::new(Float::new(), "depth"));
        let anchor = builder.build().unwrap();

        let mut builder = ClassBuilder::new("Buoy");
        builder.registry(&branch);
        let tether = builder.field(
            "tether",
            FieldSpec::new(InstanceOf::new(&anchor), "anchor point"),
        );
        let buoy = builder.build().unwrap();
        NestedParts {
            anchor,
            buoy,
            depth,
            tether,
        }
    }

    #[test]
    fn accepts_class_and_descendants_only() {
        let parts = nested("instance-accepts");
        let sub = ClassBuilder::extending("SeaAnchor", &parts.anchor)
            .build()
            .unwrap();

        let buoy = parts.buoy.instantiate();
        buoy.set(parts.tether, parts.anchor.instantiate()).unwrap();
        buoy.set(parts.tether, sub.instantiate()).unwrap();

        // An unrelated object is rejected by class.
        let err = buoy
            .set_erased("tether", ErasedValue::new(parts.buoy.instantiate()))
            .unwrap_err();
        assert!(format!("{err}").contains("does not derive from"));
    }

    #[test]
    fn nested_objects_serialize_recursively() {
        let parts = nested("instance-serialize");
        let anchor = parts.anchor.instantiate();
        anchor.set(parts.depth, 14.0).unwrap();
        let buoy = parts.buoy.instantiate();
        buoy.set(parts.tether, anchor).unwrap();

        let tree = buoy.serialize().unwrap();
        assert_eq!(tree["tether"][CLASS_KEY], json!("Anchor"));
        assert_eq!(tree["tether"]["depth"], json!(14.0));

        let back = parts.buoy.deserialize(&tree).unwrap();
        assert!(back.equal(&buoy));
        // The nested value is a reconstructed instance, not a shared handle.
        let original = buoy.get(parts.tether).unwrap();
        let rebuilt = back.get(parts.tether).unwrap();
        assert!(!Object::ptr_eq(&original, &rebuilt));
        assert!(original.equal(&rebuilt));
    }

    #[test]
    fn nested_value_shares_the_instance() {
        let parts = nested("instance-shares");
        let anchor = parts.anchor.instantiate();
        let buoy = parts.buoy.instantiate();
        buoy.set(parts.tether, anchor.clone()).unwrap();

        // Reference semantics: mutating through either handle is visible
        // through the other.
        anchor.set(parts.depth, 3.0).unwrap();
        assert_eq!(buoy.get(parts.tether).unwrap().get(parts.depth), Some(3.0));
    }

    #[test]
    fn self_reference_fails_serialization() {
        let branch = ClassRegistry::root().branch("instance-cycle");
        // A class whose field may hold an instance of the class itself.
        let mut builder = ClassBuilder::new("Node");
        builder.registry(&branch);
        builder.field("label", FieldSpec::new(Text, "label"));
        let node = builder.build().unwrap();
        let mut builder = ClassBuilder::extending("LinkedNode", &node);
        let next = builder.field("next", FieldSpec::new(InstanceOf::new(&node), "next node"));
        let linked = builder.build().unwrap();

        let a = linked.instantiate();
        let b = linked.instantiate();
        a.set(next, b.clone()).unwrap();
        b.set(next, a.clone()).unwrap();

        let err = a.serialize().unwrap_err();
        assert!(format!("{err}").contains("reference cycle"));

        // An acyclic chain still serializes.
        b.unset("next").unwrap();
        assert!(a.serialize().is_ok());
    }
}
