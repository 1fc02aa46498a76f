//! Signatures of reflected types and the registry that holds them

use core::any::TypeId;
use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kula_core::{Error, Result};

use crate::attributed::{Attributed, Reflected, THIS_KEY};
use crate::field::{ExternalStorage, Field};
use crate::value::{DatumType, DatumValue};

/// Accessor from a reflected instance to one of its fields
pub type FieldAccessor = Arc<dyn Fn(&dyn Attributed) -> Option<ExternalStorage> + Send + Sync>;

/// Where a prescribed attribute keeps its values
#[derive(Clone)]
pub enum Binding {
    /// The datum owns its values
    Internal,
    /// The datum aliases a field of the reflected struct
    External(FieldAccessor),
}

/// Description of one prescribed attribute
#[derive(Clone)]
pub struct Signature {
    pub key: String,
    pub ty: DatumType,
    pub count: usize,
    pub read_only: bool,
    pub binding: Binding,
}

impl Signature {
    /// Internal attribute of `count` default elements
    pub fn internal(key: impl Into<String>, ty: DatumType, count: usize) -> Self {
        Self {
            key: key.into(),
            ty,
            count,
            read_only: false,
            binding: Binding::Internal,
        }
    }

    /// Nested table attribute owned by the scope
    pub fn table(key: impl Into<String>) -> Self {
        Self::internal(key, DatumType::InternalTable, 0)
    }

    /// Attribute bound to a [`Field`] of `T`
    pub fn field<T, V>(key: impl Into<String>, count: usize, accessor: fn(&T) -> &Field<V>) -> Self
    where
        T: Reflected,
        V: DatumValue,
    {
        let accessor: FieldAccessor = Arc::new(move |object: &dyn Attributed| {
            object
                .downcast_ref::<T>()
                .map(|instance| V::wrap_field(accessor(instance).share()))
        });
        Self {
            key: key.into(),
            ty: V::TYPE,
            count,
            read_only: false,
            binding: Binding::External(accessor),
        }
    }

    /// Read-only variant of [`Signature::field`]
    pub fn read_only_field<T, V>(
        key: impl Into<String>,
        count: usize,
        accessor: fn(&T) -> &Field<V>,
    ) -> Self
    where
        T: Reflected,
        V: DatumValue,
    {
        Self {
            read_only: true,
            ..Self::field(key, count, accessor)
        }
    }

    /// Whether the attribute aliases native storage
    pub fn is_external(&self) -> bool {
        matches!(self.binding, Binding::External(_))
    }

    /// Resolve the native storage of `object`
    pub fn storage_of(&self, object: &dyn Attributed) -> Result<Option<ExternalStorage>> {
        let Binding::External(accessor) = &self.binding else {
            return Ok(None);
        };
        let storage = accessor(object).ok_or_else(|| Error::SignatureMismatch {
            key: self.key.clone(),
            reason: format!("accessor does not apply to {}", object.type_name()),
        })?;
        if storage.datum_type() != self.ty {
            return Err(Error::SignatureMismatch {
                key: self.key.clone(),
                reason: format!("field holds {}, expected {}", storage.datum_type(), self.ty),
            });
        }
        if storage.len() != self.count {
            return Err(Error::SignatureMismatch {
                key: self.key.clone(),
                reason: format!("field holds {} elements, expected {}", storage.len(), self.count),
            });
        }
        Ok(Some(storage))
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        let same_binding = match (&self.binding, &other.binding) {
            (Binding::Internal, Binding::Internal) => true,
            (Binding::External(a), Binding::External(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.key == other.key
            && self.ty == other.ty
            && self.count == other.count
            && self.read_only == other.read_only
            && same_binding
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("key", &self.key)
            .field("ty", &self.ty)
            .field("count", &self.count)
            .field("read_only", &self.read_only)
            .field("external", &self.is_external())
            .finish()
    }
}

struct TypeEntry {
    name: &'static str,
    signatures: Vec<Signature>,
    constructor: fn() -> Box<dyn Attributed>,
}

fn construct<T: Reflected>() -> Box<dyn Attributed> {
    Box::new(T::default())
}

/// Registry of reflected types and their prescribed attributes
///
/// Built once before use, then shared through an `Arc` by every arena.
#[derive(Default)]
pub struct SignatureRegistry {
    by_id: HashMap<TypeId, TypeEntry>,
    by_name: HashMap<&'static str, TypeId>,
}

impl SignatureRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`; false if `T` or one of its keys is already known
    pub fn register<T: Reflected>(&mut self) -> bool {
        self.insert::<T>(T::signatures())
    }

    /// Register `T` with the signatures of `P` prepended
    pub fn register_with_parent<T: Reflected, P: Reflected>(&mut self) -> Result<bool> {
        let parent = self
            .by_id
            .get(&TypeId::of::<P>())
            .ok_or_else(|| Error::MissingParent(P::TYPE_NAME.to_string()))?;
        let mut signatures = parent.signatures.clone();
        signatures.extend(T::signatures());
        Ok(self.insert::<T>(signatures))
    }

    fn insert<T: Reflected>(&mut self, signatures: Vec<Signature>) -> bool {
        let type_id = TypeId::of::<T>();
        if self.by_id.contains_key(&type_id) || self.by_name.contains_key(T::TYPE_NAME) {
            log::warn!("Type {} is already registered", T::TYPE_NAME);
            return false;
        }
        let mut seen = HashSet::new();
        for signature in &signatures {
            if signature.key == THIS_KEY || !seen.insert(signature.key.as_str()) {
                log::warn!(
                    "Type {} declares attribute `{}` twice",
                    T::TYPE_NAME,
                    signature.key
                );
                return false;
            }
        }

        log::debug!(
            "Registered {} with {} signatures",
            T::TYPE_NAME,
            signatures.len()
        );
        self.by_id.insert(
            type_id,
            TypeEntry {
                name: T::TYPE_NAME,
                signatures,
                constructor: construct::<T>,
            },
        );
        self.by_name.insert(T::TYPE_NAME, type_id);
        true
    }

    /// Remove `T`; false if it was not registered
    pub fn unregister<T: Reflected>(&mut self) -> bool {
        match self.by_id.remove(&TypeId::of::<T>()) {
            Some(entry) => {
                self.by_name.remove(entry.name);
                true
            }
            None => false,
        }
    }

    /// Signatures of a registered type
    pub fn find_signatures(&self, type_id: TypeId) -> Result<&[Signature]> {
        self.by_id
            .get(&type_id)
            .map(|entry| entry.signatures.as_slice())
            .ok_or_else(|| Error::SignaturesNotFound(format!("{:?}", type_id)))
    }

    /// Type id and signatures of a class name
    pub fn find_by_name(&self, name: &str) -> Option<(TypeId, &[Signature])> {
        let type_id = *self.by_name.get(name)?;
        self.by_id
            .get(&type_id)
            .map(|entry| (type_id, entry.signatures.as_slice()))
    }

    /// Default instance of a registered class
    pub fn create_by_name(&self, name: &str) -> Result<Box<dyn Attributed>> {
        self.by_name
            .get(name)
            .and_then(|type_id| self.by_id.get(type_id))
            .map(|entry| (entry.constructor)())
            .ok_or_else(|| Error::UnknownClass(name.to_string()))
    }

    /// Check if `T` is registered
    pub fn is_registered<T: Reflected>(&self) -> bool {
        self.by_id.contains_key(&TypeId::of::<T>())
    }

    /// Check if a class name is registered
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered class names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().copied()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl fmt::Debug for SignatureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureRegistry")
            .field("types", &self.by_id.len())
            .finish()
    }
}
