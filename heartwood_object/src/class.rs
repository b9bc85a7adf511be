// Copyright 2025 the Heartwood Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Class schemas and the builder that assembles them.
//!
//! An [`ObjectClass`] is the immutable per-type schema of an owning
//! object: its ordered field table, default overrides, class-registered
//! observers, cross-field validators, and registry branch. Schemas are
//! built once per type by [`ClassBuilder`], which merges the whole
//! inheritance chain at build time — there is no runtime class patching.

use core::fmt;
use std::rc::Rc;
use std::sync::{Arc, Weak};

use hashbrown::{HashMap, HashSet};
use heartwood_descriptor::{
    Descriptor, ErasedValue, Field, FieldRegistration, FieldSpec, ValidateCx,
};

use crate::error::{BuildError, Inconsistency};
use crate::object::Object;
use crate::observe::{Change, ChangeCallback, ValidatingCallback};
use crate::registry::ClassRegistry;
use crate::serial::CLASS_KEY;

/// A cross-field validator, run only by explicit whole-object validation.
pub type ClassValidator = Rc<dyn Fn(&Object) -> Result<(), Inconsistency>>;

type DefaultProducer = Rc<dyn Fn() -> ErasedValue>;

/// The immutable schema of one owning-object type.
///
/// Holds everything assignment and validation consult: the field table
/// merged from the whole inheritance chain (subclass overrides win by
/// exact name), default overrides, class-scope observers, cross-field
/// validators, and the registry branch the class registered into.
///
/// Schemas are shared: instances hold an `Arc` to their class, and
/// subclasses hold an `Arc` to their parent.
pub struct ObjectClass {
    /// Back-reference to the `Arc` this schema lives in, so instances can
    /// hold their class without the caller threading the handle through.
    me: Weak<ObjectClass>,
    name: &'static str,
    parent: Option<Arc<ObjectClass>>,
    fields: Vec<FieldRegistration>,
    by_name: HashMap<&'static str, usize>,
    defaults: HashMap<&'static str, DefaultProducer>,
    validating: HashMap<&'static str, Vec<ValidatingCallback>>,
    change: HashMap<&'static str, Vec<ChangeCallback>>,
    class_validators: Vec<ClassValidator>,
    registry: ClassRegistry,
}

impl ObjectClass {
    /// The class name, as registered.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The parent class, if this one extends another.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<ObjectClass>> {
        self.parent.as_ref()
    }

    /// The registry branch this class registered into.
    #[must_use]
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldRegistration> {
        self.by_name.get(name).map(|&at| &self.fields[at])
    }

    /// The merged field table, in declaration order (ancestors first).
    pub fn fields(&self) -> impl Iterator<Item = &FieldRegistration> {
        self.fields.iter()
    }

    /// Returns `true` if `ancestor` is this class or any class on its
    /// parent chain.
    #[must_use]
    pub fn derives_from(&self, ancestor: &Arc<Self>) -> bool {
        let mut current: Option<&Self> = Some(self);
        while let Some(class) = current {
            if core::ptr::eq(class, ancestor.as_ref()) {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }

    /// The `Arc` this schema lives in.
    ///
    /// The weak back-reference always upgrades: having `&self` means at
    /// least one strong handle is alive.
    pub(crate) fn arc(&self) -> Arc<Self> {
        match self.me.upgrade() {
            Some(class) => class,
            None => unreachable!("class schema outlived its last handle"),
        }
    }

    pub(crate) fn default_for(&self, name: &str) -> Option<ErasedValue> {
        match self.defaults.get(name) {
            Some(producer) => Some(producer()),
            None => self.field(name).and_then(FieldRegistration::default_erased),
        }
    }

    pub(crate) fn validating_for(&self, name: &str) -> &[ValidatingCallback] {
        self.validating.get(name).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn change_for(&self, name: &str) -> &[ChangeCallback] {
        self.change.get(name).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn class_validators(&self) -> &[ClassValidator] {
        &self.class_validators
    }
}

impl fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClass")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field(
                "fields",
                &self.fields.iter().map(FieldRegistration::name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Assembles an [`ObjectClass`], then registers it.
///
/// Declared fields return typed [`Field`] keys for compile-time-checked
/// access. Building merges the inheritance chain: fields, default
/// overrides, and per-property observers are overridden by exact-name
/// collision in the most-derived class; cross-field validators accumulate
/// ancestors-first. Defaults are validated at build time, so instances
/// never start from an invalid value.
///
/// # Example
///
/// ```rust
/// use heartwood_descriptor::{FieldSpec, Float, Text};
/// use heartwood_object::{ClassBuilder, ClassRegistry};
///
/// let branch = ClassRegistry::root().branch("doc-example");
/// let mut builder = ClassBuilder::new("Probe");
/// builder.registry(&branch);
/// let depth = builder.field("depth", FieldSpec::new(Float::new().min(0.0), "depth in meters"));
/// let label = builder.field("label", FieldSpec::new(Text, "display label").required());
/// let probe = builder.build().unwrap();
///
/// assert_eq!(probe.name(), "Probe");
/// assert!(probe.field("depth").is_some());
/// let instance = probe.instantiate();
/// instance.set(depth, 10.0).unwrap();
/// assert_eq!(instance.get(depth), Some(10.0));
/// # let _ = label;
/// ```
pub struct ClassBuilder {
    name: &'static str,
    parent: Option<Arc<ObjectClass>>,
    registry: Option<ClassRegistry>,
    fields: Vec<FieldRegistration>,
    defaults: Vec<(&'static str, DefaultProducer)>,
    validating: Vec<(&'static str, ValidatingCallback)>,
    change: Vec<(&'static str, ChangeCallback)>,
    class_validators: Vec<ClassValidator>,
}

impl ClassBuilder {
    /// Starts a schema with no parent.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            parent: None,
            registry: None,
            fields: Vec::new(),
            defaults: Vec::new(),
            validating: Vec::new(),
            change: Vec::new(),
            class_validators: Vec::new(),
        }
    }

    /// Starts a schema extending `parent`.
    ///
    /// The parent's fields, defaults, observers, validators, and registry
    /// branch are inherited; redeclaring a name overrides it.
    #[must_use]
    pub fn extending(name: &'static str, parent: &Arc<ObjectClass>) -> Self {
        let mut builder = Self::new(name);
        builder.parent = Some(parent.clone());
        builder
    }

    /// Declares a field and returns its typed key.
    pub fn field<D: Descriptor>(
        &mut self,
        name: &'static str,
        spec: FieldSpec<D>,
    ) -> Field<D::Value> {
        self.fields.push(spec.bind(name));
        Field::new(name)
    }

    /// Overrides the default of a declared or inherited field without
    /// touching its descriptor.
    pub fn default_of<T: Clone + fmt::Debug + 'static>(
        &mut self,
        field: Field<T>,
        producer: impl Fn() -> T + 'static,
    ) {
        self.defaults
            .push((field.name(), Rc::new(move || ErasedValue::new(producer()))));
    }

    /// Registers a class-scope validating observer for one property.
    ///
    /// Runs on every instance, after descriptor validation and before
    /// commit; may transform the candidate or reject the assignment.
    pub fn validate_field(
        &mut self,
        name: &'static str,
        callback: impl Fn(&Object, &Change<'_>) -> Result<Option<ErasedValue>, heartwood_descriptor::InvalidValue>
        + 'static,
    ) {
        self.validating.push((name, Rc::new(callback)));
    }

    /// Registers a class-scope change observer for one property.
    pub fn observe(
        &mut self,
        name: &'static str,
        callback: impl Fn(&Object, &Change<'_>) -> Result<(), crate::error::ObserverError> + 'static,
    ) {
        self.change.push((name, Rc::new(callback)));
    }

    /// Registers a cross-field validator, run only by whole-object
    /// validation.
    pub fn class_validator(
        &mut self,
        callback: impl Fn(&Object) -> Result<(), Inconsistency> + 'static,
    ) {
        self.class_validators.push(Rc::new(callback));
    }

    /// Re-points the registry branch this class (and its descendants,
    /// unless they re-point again) registers into.
    pub fn registry(&mut self, branch: &ClassRegistry) {
        self.registry = Some(branch.clone());
    }

    /// Merges the inheritance chain, validates defaults, registers the
    /// class into its branch, and returns the schema.
    pub fn build(self) -> Result<Arc<ObjectClass>, BuildError> {
        let class = self.name;

        let (mut fields, mut by_name) = match &self.parent {
            Some(parent) => (parent.fields.clone(), parent.by_name.clone()),
            None => (Vec::new(), HashMap::new()),
        };

        let mut declared: HashSet<&'static str> = HashSet::new();
        for registration in self.fields {
            let field = registration.name();
            if field.is_empty() || field.starts_with('_') || field == CLASS_KEY {
                return Err(BuildError::InvalidFieldName { class, field });
            }
            if !declared.insert(field) {
                return Err(BuildError::DuplicateField { class, field });
            }
            match by_name.get(field) {
                // An override keeps the position of the first declaration.
                Some(&at) => fields[at] = registration,
                None => {
                    by_name.insert(field, fields.len());
                    fields.push(registration);
                }
            }
        }

        let mut validating = self
            .parent
            .as_ref()
            .map(|p| p.validating.clone())
            .unwrap_or_default();
        let mut own_validating: HashMap<&'static str, Vec<ValidatingCallback>> = HashMap::new();
        for (field, callback) in self.validating {
            if !by_name.contains_key(field) {
                return Err(BuildError::UnknownObserved { class, field });
            }
            own_validating.entry(field).or_default().push(callback);
        }
        // The most-derived declaration replaces the inherited list wholesale.
        for (field, callbacks) in own_validating {
            validating.insert(field, callbacks);
        }

        let mut change = self
            .parent
            .as_ref()
            .map(|p| p.change.clone())
            .unwrap_or_default();
        let mut own_change: HashMap<&'static str, Vec<ChangeCallback>> = HashMap::new();
        for (field, callback) in self.change {
            if !by_name.contains_key(field) {
                return Err(BuildError::UnknownObserved { class, field });
            }
            own_change.entry(field).or_default().push(callback);
        }
        for (field, callbacks) in own_change {
            change.insert(field, callbacks);
        }

        let mut defaults = self
            .parent
            .as_ref()
            .map(|p| p.defaults.clone())
            .unwrap_or_default();
        for (field, producer) in self.defaults {
            if !by_name.contains_key(field) {
                return Err(BuildError::UnknownDefault { class, field });
            }
            defaults.insert(field, producer);
        }

        let mut class_validators = self
            .parent
            .as_ref()
            .map(|p| p.class_validators.clone())
            .unwrap_or_default();
        class_validators.extend(self.class_validators);

        let registry = self
            .registry
            .or_else(|| self.parent.as_ref().map(|p| p.registry.clone()))
            .unwrap_or_else(ClassRegistry::root);

        // Every resolvable default must validate against the (possibly
        // overridden) descriptor in the merged table.
        for registration in &fields {
            let field = registration.name();
            let cx = ValidateCx::new(Some(class), Some(field));
            let produced = match defaults.get(field) {
                Some(producer) => Some(producer()),
                None => registration.default_erased(),
            };
            if let Some(value) = produced {
                registration
                    .validate_erased(&cx, &value)
                    .map_err(|source| BuildError::InvalidDefault { class, field, source })?;
            }
        }

        let built = Arc::new_cyclic(|me| ObjectClass {
            me: me.clone(),
            name: class,
            parent: self.parent,
            fields,
            by_name,
            defaults,
            validating,
            change,
            class_validators,
            registry,
        });
        built.registry.register(&built)?;
        Ok(built)
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field(
                "fields",
                &self.fields.iter().map(FieldRegistration::name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heartwood_descriptor::{Float, Integer, Text};

    fn scratch() -> ClassRegistry {
        ClassRegistry::root().branch("class-tests")
    }

    #[test]
    fn builder_declares_ordered_fields() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Reading");
        builder.registry(&branch);
        builder.field("value", FieldSpec::new(Float::new(), "measured value"));
        builder.field("unit", FieldSpec::new(Text, "unit of measure"));
        let class = builder.build().unwrap();

        let names: Vec<_> = class.fields().map(FieldRegistration::name).collect();
        assert_eq!(names, vec!["value", "unit"]);
        assert!(class.field("value").is_some());
        assert!(class.field("missing").is_none());
    }

    #[test]
    fn subclass_inherits_and_overrides_by_name() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Base");
        builder.registry(&branch);
        builder.field("count", FieldSpec::new(Integer::new(), "how many"));
        builder.field("label", FieldSpec::new(Text, "name"));
        let base = builder.build().unwrap();

        // The subclass narrows `count` and adds a field of its own.
        let mut builder = ClassBuilder::extending("Derived", &base);
        builder.field("count", FieldSpec::new(Integer::new().min(0), "how many"));
        builder.field("extra", FieldSpec::new(Float::new(), "addition"));
        let derived = builder.build().unwrap();

        // Override keeps the original position; new fields append.
        let names: Vec<_> = derived.fields().map(FieldRegistration::name).collect();
        assert_eq!(names, vec!["count", "label", "extra"]);
        assert!(derived.field("count").unwrap().info().contains(">= 0"));
        // The parent is untouched.
        assert!(!base.field("count").unwrap().info().contains(">= 0"));
    }

    #[test]
    fn derives_from_walks_the_chain() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("A");
        builder.registry(&branch);
        let a = builder.build().unwrap();
        let b = ClassBuilder::extending("B", &a).build().unwrap();
        let c = ClassBuilder::extending("C", &b).build().unwrap();

        assert!(c.derives_from(&a));
        assert!(c.derives_from(&c));
        assert!(!a.derives_from(&c));
    }

    #[test]
    fn duplicate_field_declaration_is_an_error() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Dup");
        builder.registry(&branch);
        builder.field("x", FieldSpec::new(Float::new(), "first"));
        builder.field("x", FieldSpec::new(Float::new(), "second"));
        assert!(matches!(
            builder.build(),
            Err(BuildError::DuplicateField { field: "x", .. })
        ));
    }

    #[test]
    fn private_and_reserved_field_names_are_rejected() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Private");
        builder.registry(&branch);
        builder.field("_hidden", FieldSpec::new(Float::new(), "nope"));
        assert!(matches!(
            builder.build(),
            Err(BuildError::InvalidFieldName { field: "_hidden", .. })
        ));

        let mut builder = ClassBuilder::new("Reserved");
        builder.registry(&branch);
        builder.field(CLASS_KEY, FieldSpec::new(Text, "nope"));
        assert!(matches!(
            builder.build(),
            Err(BuildError::InvalidFieldName { .. })
        ));
    }

    #[test]
    fn default_override_must_name_a_known_field() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Orphan");
        builder.registry(&branch);
        builder.default_of(Field::<f64>::new("ghost"), || 1.0);
        assert!(matches!(
            builder.build(),
            Err(BuildError::UnknownDefault { field: "ghost", .. })
        ));
    }

    #[test]
    fn defaults_are_validated_at_build_time() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("BadDefault");
        builder.registry(&branch);
        builder.field(
            "count",
            FieldSpec::new(Integer::new().min(0), "how many").default(-1),
        );
        assert!(matches!(
            builder.build(),
            Err(BuildError::InvalidDefault { field: "count", .. })
        ));
    }

    #[test]
    fn inherited_default_revalidates_against_overridden_descriptor() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Loose");
        builder.registry(&branch);
        let count = builder.field(
            "count",
            FieldSpec::new(Integer::new(), "how many").default(-5),
        );
        let base = builder.build().unwrap();

        // The subclass narrows the descriptor but keeps the inherited
        // default override, which is now invalid.
        let mut builder = ClassBuilder::extending("Strict", &base);
        builder.default_of(count, || -5);
        builder.field("count", FieldSpec::new(Integer::new().min(0), "how many"));
        assert!(matches!(
            builder.build(),
            Err(BuildError::InvalidDefault { field: "count", .. })
        ));
    }

    #[test]
    fn observers_must_name_known_fields() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Watchful");
        builder.registry(&branch);
        builder.observe("ghost", |_, _| Ok(()));
        assert!(matches!(
            builder.build(),
            Err(BuildError::UnknownObserved { field: "ghost", .. })
        ));
    }

    #[test]
    fn registry_branch_is_inherited_unless_repointed() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Root");
        builder.registry(&branch);
        let root = builder.build().unwrap();

        let child = ClassBuilder::extending("Child", &root).build().unwrap();
        assert!(child.registry().same_branch(&branch));
        assert!(branch.contains("Child"));

        let private = branch.branch("private");
        let mut builder = ClassBuilder::extending("Detached", &root);
        builder.registry(&private);
        let detached = builder.build().unwrap();
        assert!(detached.registry().same_branch(&private));
        assert!(!branch.contains("Detached"));

        // Descendants of the re-pointed class follow the new branch.
        let grandchild = ClassBuilder::extending("Grandchild", &detached)
            .build()
            .unwrap();
        assert!(grandchild.registry().same_branch(&private));
    }

    #[test]
    fn duplicate_class_names_are_rejected_per_branch() {
        let branch = scratch();
        let mut builder = ClassBuilder::new("Twice");
        builder.registry(&branch);
        builder.build().unwrap();

        let mut builder = ClassBuilder::new("Twice");
        builder.registry(&branch);
        assert!(matches!(
            builder.build(),
            Err(BuildError::DuplicateClass { class: "Twice" })
        ));

        // A different branch is a different namespace.
        let other = branch.branch("other");
        let mut builder = ClassBuilder::new("Twice");
        builder.registry(&other);
        assert!(builder.build().is_ok());
    }
}
