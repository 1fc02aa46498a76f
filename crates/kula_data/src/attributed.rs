//! Reflected objects living in the scope tree
//!
//! A reflected scope pairs a native struct (any [`Reflected`] type) with
//! the scope that exposes it. Slot 0 is the `this` pointer back to the
//! scope itself; slots `1..prescribed` follow the type's signatures in
//! order and alias the struct's [`Field`](crate::Field)s. Anything appended
//! after that is an auxiliary attribute.
//!
//! Whenever a reflected scope is cloned or transferred the arena re-points
//! `this` and every external binding, so no datum ever reads through the
//! storage of another instance.

use core::any::{Any, TypeId};
use core::ops::ControlFlow;
use std::sync::Arc;

use kula_core::{Error, Result};

use crate::datum::Datum;
use crate::scope::{ScopeArena, ScopeId, ScopeNode};
use crate::signature::Signature;
use crate::value::DatumType;

/// Key of the self pointer in every reflected scope
pub const THIS_KEY: &str = "this";

/// A native struct that can be reflected into a scope
pub trait Reflected: Any + Clone + Default + Send + Sync {
    /// Class name used by the registry and by JSON class hints
    const TYPE_NAME: &'static str;

    /// Signatures declared by this type (without its parent's)
    fn signatures() -> Vec<Signature>;

    /// Embedded parent struct, if the type extends another reflected type
    fn base(&self) -> Option<&dyn Attributed> {
        None
    }
}

/// Object-safe view of a [`Reflected`] value
pub trait Attributed: Any + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn reflected_type_id(&self) -> TypeId;
    fn clone_boxed(&self) -> Box<dyn Attributed>;
    fn as_any(&self) -> &dyn Any;
    fn base_object(&self) -> Option<&dyn Attributed>;
}

impl<T: Reflected> Attributed for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn reflected_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn clone_boxed(&self) -> Box<dyn Attributed> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn base_object(&self) -> Option<&dyn Attributed> {
        Reflected::base(self)
    }
}

impl dyn Attributed {
    /// Downcast to `T`, walking the embedded parent chain
    pub fn downcast_ref<T: Reflected>(&self) -> Option<&T> {
        let mut current: Option<&dyn Attributed> = Some(self);
        while let Some(object) = current {
            if let Some(found) = object.as_any().downcast_ref::<T>() {
                return Some(found);
            }
            current = object.base_object();
        }
        None
    }

    /// Whether the object is, or extends, `T`
    pub fn is<T: Reflected>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }
}

impl ScopeArena {
    /// Create a reflected root scope holding `T::default()`
    pub fn create<T: Reflected>(&mut self) -> Result<ScopeId> {
        self.create_object(T::default())
    }

    /// Create a reflected root scope holding `object`
    pub fn create_object<T: Reflected>(&mut self, object: T) -> Result<ScopeId> {
        self.create_boxed(Box::new(object))
    }

    /// Create a reflected root scope from a type-erased object
    pub fn create_boxed(&mut self, object: Box<dyn Attributed>) -> Result<ScopeId> {
        let id = self.insert(ScopeNode::with_object(Arc::from(object)));
        if let Err(err) = self.populate(id) {
            self.remove_node(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Create a reflected root scope of a registered class
    pub fn create_class(&mut self, class: &str) -> Result<ScopeId> {
        let object = self.registry.create_by_name(class)?;
        self.create_boxed(object)
    }

    /// Append a new reflected child of a registered class at `key`
    pub fn append_scope_of_class(&mut self, id: ScopeId, key: &str, class: &str) -> Result<ScopeId> {
        let object = self.registry.create_by_name(class)?;
        let child = self.append_child_node(id, key, ScopeNode::with_object(Arc::from(object)))?;
        self.populate(child)?;
        Ok(child)
    }

    /// Build the `this` slot and the prescribed attributes of an empty scope
    pub fn populate(&mut self, id: ScopeId) -> Result<()> {
        let object = self.reflected(id)?;
        let registry = Arc::clone(&self.registry);
        let signatures = registry.find_signatures(object.reflected_type_id())?;
        let node = self.node_mut(id)?;
        if !node.entries.is_empty() {
            return Err(Error::InvalidStorage(format!(
                "scope {} is already populated",
                id
            )));
        }

        let this = node.append(THIS_KEY);
        node.entries[this].1 = Datum::from_scope_ids(DatumType::Pointer, vec![id]);
        for signature in signatures {
            let position = node.append(&signature.key);
            let datum = &mut node.entries[position].1;
            match signature.storage_of(object.as_ref())? {
                Some(storage) => datum.set_external(storage, signature.read_only)?,
                None => {
                    datum.set_type(signature.ty)?;
                    if signature.ty.is_scalar() {
                        datum.resize(signature.count)?;
                    }
                }
            }
        }
        node.prescribed = signatures.len() + 1;
        log::trace!(
            "Populated {} as {} ({} prescribed)",
            id,
            object.type_name(),
            node.prescribed
        );
        Ok(())
    }

    /// Re-point `this` and every external binding at the scope's own object
    pub fn update_prescribed_attributes(&mut self, id: ScopeId) -> Result<()> {
        let object = self.reflected(id)?;
        let registry = Arc::clone(&self.registry);
        let signatures = registry.find_signatures(object.reflected_type_id())?;
        let node = self.node_mut(id)?;

        match node.entries.first_mut() {
            Some((key, datum)) if key == THIS_KEY => datum.set_pointer(0, id)?,
            _ => {
                return Err(Error::InvalidStorage(format!(
                    "scope {} has no `{}` slot",
                    id, THIS_KEY
                )))
            }
        }
        for (offset, signature) in signatures.iter().enumerate() {
            let Some(storage) = signature.storage_of(object.as_ref())? else {
                continue;
            };
            match node.entries.get_mut(offset + 1) {
                Some((key, datum)) if *key == signature.key => {
                    datum.set_external(storage, signature.read_only)?
                }
                _ => {
                    return Err(Error::SignatureMismatch {
                        key: signature.key.clone(),
                        reason: format!("not at prescribed position {}", offset + 1),
                    })
                }
            }
        }
        Ok(())
    }

    /// Append an attribute that is not part of the type's signatures
    pub fn append_auxiliary_attribute(&mut self, id: ScopeId, key: &str) -> Result<&mut Datum> {
        if self.is_prescribed_attribute(id, key) {
            return Err(Error::PrescribedKey(key.to_string()));
        }
        self.append(id, key)
    }

    /// Whether `key` exists in the scope
    pub fn is_attribute(&self, id: ScopeId, key: &str) -> bool {
        self.index_of(id, key).is_some()
    }

    /// Whether `key` is `this` or one of the type's signatures
    pub fn is_prescribed_attribute(&self, id: ScopeId, key: &str) -> bool {
        match self.node(id) {
            Ok(node) => node.position(key).is_some_and(|p| p < node.prescribed),
            Err(_) => false,
        }
    }

    /// Whether `key` was appended after the prescribed attributes
    pub fn is_auxiliary_attribute(&self, id: ScopeId, key: &str) -> bool {
        match self.node(id) {
            Ok(node) => node.position(key).is_some_and(|p| p >= node.prescribed),
            Err(_) => false,
        }
    }

    /// Number of prescribed slots, including `this`
    pub fn prescribed_count(&self, id: ScopeId) -> Result<usize> {
        Ok(self.node(id)?.prescribed)
    }

    pub fn for_each_prescribed_attribute<F>(&self, id: ScopeId, f: F) -> Result<ControlFlow<()>>
    where
        F: FnMut(&str, &Datum) -> ControlFlow<()>,
    {
        let node = self.node(id)?;
        Ok(visit(&node.entries[..node.prescribed], f))
    }

    pub fn for_each_auxiliary_attribute<F>(&self, id: ScopeId, f: F) -> Result<ControlFlow<()>>
    where
        F: FnMut(&str, &Datum) -> ControlFlow<()>,
    {
        let node = self.node(id)?;
        Ok(visit(&node.entries[node.prescribed..], f))
    }

    pub fn for_each_attribute<F>(&self, id: ScopeId, f: F) -> Result<ControlFlow<()>>
    where
        F: FnMut(&str, &Datum) -> ControlFlow<()>,
    {
        Ok(visit(&self.node(id)?.entries, f))
    }

    /// Reflected object of a scope
    pub fn object(&self, id: ScopeId) -> Option<Arc<dyn Attributed>> {
        self.node(id).ok()?.object.clone()
    }

    /// Reflected object of a scope as `T` (or a type extending `T`)
    pub fn object_as<T: Reflected>(&self, id: ScopeId) -> Option<&T> {
        self.node(id).ok()?.object.as_deref()?.downcast_ref::<T>()
    }

    /// Whether the scope holds a reflected object
    pub fn is_reflected(&self, id: ScopeId) -> bool {
        self.node(id).is_ok_and(|node| node.object.is_some())
    }

    fn reflected(&self, id: ScopeId) -> Result<Arc<dyn Attributed>> {
        self.object(id).ok_or_else(|| {
            Error::InvalidArgument(format!("scope {} has no reflected object", id))
        })
    }
}

fn visit<F>(entries: &[(String, Datum)], mut f: F) -> ControlFlow<()>
where
    F: FnMut(&str, &Datum) -> ControlFlow<()>,
{
    for (key, datum) in entries {
        f(key, datum)?;
    }
    ControlFlow::Continue(())
}
