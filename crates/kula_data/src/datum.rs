//! Datum - a single polymorphic value slot
//!
//! A datum holds a homogeneous sequence of one [`DatumType`]. Storage is
//! either internal (the datum owns a growable buffer) or external (the
//! datum aliases a [`Field`] owned by a reflected struct).
//!
//! Table datums hold [`ScopeId`]s. Internal-table ids are owned children
//! and are only created, removed and deep-cloned through the
//! [`ScopeArena`](crate::ScopeArena); external-table and pointer ids are
//! plain aliases.

use core::fmt;

use glam::{Mat4, Vec4};
use kula_core::{Error, Result};

use crate::field::{ExternalStorage, Field};
use crate::scope::ScopeId;
use crate::value::{DatumType, DatumValue, Values};

/// Capacity growth strategy: `(size, capacity) -> new capacity`
pub type GrowPolicy = fn(usize, usize) -> usize;

/// Default policy: double the capacity, starting at 4
pub fn geometric_growth(size: usize, capacity: usize) -> usize {
    (capacity * 2).max(size + 1).max(4)
}

#[derive(Debug)]
enum Storage {
    Unknown,
    Internal(Values),
    External {
        field: ExternalStorage,
        read_only: bool,
    },
}

/// Polymorphic value container
#[derive(Debug)]
pub struct Datum {
    storage: Storage,
    grow: GrowPolicy,
}

impl Datum {
    /// Create an empty datum of unknown type
    pub fn new() -> Self {
        Self {
            storage: Storage::Unknown,
            grow: geometric_growth,
        }
    }

    /// Create an empty datum of a fixed type
    pub fn with_type(ty: DatumType) -> Self {
        let storage = match Values::empty(ty) {
            Some(values) => Storage::Internal(values),
            None => Storage::Unknown,
        };
        Self {
            storage,
            grow: geometric_growth,
        }
    }

    /// Create an internal datum from values
    pub fn from_values<T: DatumValue>(values: Vec<T>) -> Self {
        Self {
            storage: Storage::Internal(T::wrap(values)),
            grow: geometric_growth,
        }
    }

    /// Replace the capacity growth policy
    pub fn with_grow_policy(mut self, policy: GrowPolicy) -> Self {
        self.grow = policy;
        self
    }

    /// Replace the capacity growth policy in place
    pub fn set_grow_policy(&mut self, policy: GrowPolicy) {
        self.grow = policy;
    }

    /// Current type
    pub fn datum_type(&self) -> DatumType {
        match &self.storage {
            Storage::Unknown => DatumType::Unknown,
            Storage::Internal(values) => values.datum_type(),
            Storage::External { field, .. } => field.datum_type(),
        }
    }

    /// Number of elements
    pub fn size(&self) -> usize {
        match &self.storage {
            Storage::Unknown => 0,
            Storage::Internal(values) => values.len(),
            Storage::External { field, .. } => field.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Allocated element capacity (equal to size for external storage)
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Unknown => 0,
            Storage::Internal(values) => values.capacity(),
            Storage::External { field, .. } => field.len(),
        }
    }

    /// Whether the datum aliases external storage
    pub fn is_external(&self) -> bool {
        matches!(self.storage, Storage::External { .. })
    }

    /// Whether writes are rejected
    pub fn is_read_only(&self) -> bool {
        matches!(self.storage, Storage::External { read_only: true, .. })
    }

    /// Fix the type; fails if a different type is already fixed
    pub fn set_type(&mut self, ty: DatumType) -> Result<()> {
        let current = self.datum_type();
        if ty == DatumType::Unknown {
            return Err(Error::InvalidArgument(
                "cannot set a datum type to Unknown; use reset".into(),
            ));
        }
        if current == ty {
            return Ok(());
        }
        if current != DatumType::Unknown {
            return Err(Error::type_mismatch(current, ty));
        }
        if let Some(values) = Values::empty(ty) {
            self.storage = Storage::Internal(values);
        }
        Ok(())
    }

    /// Bind external storage
    ///
    /// Fails if the datum owns internal data or already has another type.
    pub fn set_storage<T: DatumValue>(&mut self, field: Field<T>, read_only: bool) -> Result<()> {
        self.set_external(T::wrap_field(field), read_only)
    }

    /// Bind type-erased external storage
    pub fn set_external(&mut self, field: ExternalStorage, read_only: bool) -> Result<()> {
        let current = self.datum_type();
        let ty = field.datum_type();
        if current != DatumType::Unknown && current != ty {
            return Err(Error::type_mismatch(current, ty));
        }
        if let Storage::Internal(values) = &self.storage {
            if !values.is_empty() || values.capacity() > 0 {
                return Err(Error::InvalidArgument(
                    "datum already owns internal data".into(),
                ));
            }
        }
        self.storage = Storage::External { field, read_only };
        Ok(())
    }

    /// External storage currently bound, if any
    pub fn external_storage(&self) -> Option<&ExternalStorage> {
        match &self.storage {
            Storage::External { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Drop all storage and return to `Unknown`
    ///
    /// Internal tables with children must be emptied through the arena.
    pub fn reset(&mut self) -> Result<()> {
        if let Storage::Internal(Values::InternalTable(ids)) = &self.storage {
            if !ids.is_empty() {
                return Err(Error::InvalidStorage(
                    "internal table still owns child scopes".into(),
                ));
            }
        }
        self.storage = Storage::Unknown;
        Ok(())
    }

    /// Remove all elements, keeping the type
    pub fn clear(&mut self) -> Result<()> {
        match &mut self.storage {
            Storage::Unknown => Ok(()),
            Storage::External { .. } => Err(Error::InvalidStorage(
                "cannot clear external storage".into(),
            )),
            Storage::Internal(Values::InternalTable(ids)) if !ids.is_empty() => Err(
                Error::InvalidStorage("internal table children are cleared through the arena".into()),
            ),
            Storage::Internal(values) => {
                let ty = values.datum_type();
                if let Some(empty) = Values::empty(ty) {
                    *values = empty;
                }
                Ok(())
            }
        }
    }

    /// Ensure capacity for at least `capacity` elements
    pub fn reserve(&mut self, capacity: usize) -> Result<()> {
        let values = self.internal_mut("reserve")?;
        if capacity > values.capacity() {
            let additional = capacity - values.len();
            values.reserve_exact(additional);
        }
        Ok(())
    }

    /// Release unused capacity
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        self.internal_mut("shrink")?.shrink_to_fit();
        Ok(())
    }

    /// Resize a scalar datum, default-filling new elements
    pub fn resize(&mut self, size: usize) -> Result<()> {
        let values = self.internal_mut("resize")?;
        match values {
            Values::Integer(v) => v.resize(size, 0),
            Values::Float(v) => v.resize(size, 0.0),
            Values::String(v) => v.resize(size, String::new()),
            Values::Vector4(v) => v.resize(size, Vec4::ZERO),
            Values::Matrix4x4(v) => v.resize(size, Mat4::IDENTITY),
            Values::ExternalTable(v) | Values::Pointer(v) if size <= v.len() => v.truncate(size),
            _ => {
                return Err(Error::InvalidStorage(
                    "table datums cannot be resized directly".into(),
                ))
            }
        }
        Ok(())
    }

    /// Append an element, fixing the type on first use
    pub fn push_back<T: DatumValue>(&mut self, value: T) -> Result<()> {
        self.ensure_type(T::TYPE)?;
        let grow = self.grow;
        match &mut self.storage {
            Storage::External { field, .. } => Err(Error::OutOfRange {
                index: field.len(),
                size: field.len(),
            }),
            Storage::Internal(values) => {
                let required = values.len() + 1;
                grow_for(values, required, grow);
                let found = values.datum_type();
                T::slice_mut(values)
                    .ok_or_else(|| Error::type_mismatch(T::TYPE, found))?
                    .push(value);
                Ok(())
            }
            Storage::Unknown => Err(Error::type_mismatch(T::TYPE, DatumType::Unknown)),
        }
    }

    /// Overwrite the element at `index`
    ///
    /// Internal storage grows (default-filled) when `index` is past the end.
    pub fn set<T: DatumValue>(&mut self, index: usize, value: T) -> Result<()> {
        self.ensure_type(T::TYPE)?;
        let grow = self.grow;
        match &mut self.storage {
            Storage::External { field, read_only } => {
                if *read_only {
                    return Err(Error::ReadOnly);
                }
                let field = T::field(field).ok_or_else(|| Error::type_mismatch(T::TYPE, "external"))?;
                if field.set_at(index, value) {
                    Ok(())
                } else {
                    Err(Error::OutOfRange {
                        index,
                        size: field.len(),
                    })
                }
            }
            Storage::Internal(values) => {
                if index >= values.len() {
                    grow_for(values, index + 1, grow);
                }
                let found = values.datum_type();
                let slice = T::slice_mut(values).ok_or_else(|| Error::type_mismatch(T::TYPE, found))?;
                if index >= slice.len() {
                    slice.resize(index + 1, T::default());
                }
                slice[index] = value;
                Ok(())
            }
            Storage::Unknown => Err(Error::type_mismatch(T::TYPE, DatumType::Unknown)),
        }
    }

    /// Copy of the element at `index`
    pub fn get<T: DatumValue>(&self, index: usize) -> Result<T> {
        let size = self.size();
        self.with_slice(|slice: &[T]| slice.get(index).cloned())?
            .ok_or(Error::OutOfRange { index, size })
    }

    /// Run `f` over the typed elements (internal or external)
    pub fn with_slice<T: DatumValue, R>(&self, f: impl FnOnce(&[T]) -> R) -> Result<R> {
        let mismatch = || Error::type_mismatch(T::TYPE, self.datum_type());
        match &self.storage {
            Storage::Unknown => Err(mismatch()),
            Storage::Internal(values) => Ok(f(T::slice(values).ok_or_else(mismatch)?)),
            Storage::External { field, .. } => {
                let field = T::field(field).ok_or_else(mismatch)?;
                let guard = field.read();
                Ok(f(&guard))
            }
        }
    }

    /// Copy of all elements
    pub fn to_vec<T: DatumValue>(&self) -> Result<Vec<T>> {
        self.with_slice(|slice: &[T]| slice.to_vec())
    }

    pub fn get_int(&self, index: usize) -> Result<i32> {
        self.get(index)
    }

    pub fn get_float(&self, index: usize) -> Result<f32> {
        self.get(index)
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        self.get(index)
    }

    pub fn get_vector(&self, index: usize) -> Result<Vec4> {
        self.get(index)
    }

    pub fn get_matrix(&self, index: usize) -> Result<Mat4> {
        self.get(index)
    }

    /// Position of the first element equal to `value`
    pub fn find<T: DatumValue>(&self, value: &T) -> Option<usize> {
        self.with_slice(|slice: &[T]| slice.iter().position(|v| v == value))
            .ok()
            .flatten()
    }

    /// Remove the first element equal to `value`
    pub fn remove<T: DatumValue>(&mut self, value: &T) -> Result<bool> {
        match self.find(value) {
            Some(index) => self.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Remove the element at `index`
    pub fn remove_at(&mut self, index: usize) -> Result<()> {
        let values = self.internal_mut("remove")?;
        let size = values.len();
        if index >= size {
            return Err(Error::OutOfRange { index, size });
        }
        match values {
            Values::Integer(v) => {
                v.remove(index);
            }
            Values::Float(v) => {
                v.remove(index);
            }
            Values::String(v) => {
                v.remove(index);
            }
            Values::Vector4(v) => {
                v.remove(index);
            }
            Values::Matrix4x4(v) => {
                v.remove(index);
            }
            Values::InternalTable(_) => {
                return Err(Error::InvalidStorage(
                    "child scopes are removed through the arena".into(),
                ))
            }
            Values::ExternalTable(v) | Values::Pointer(v) => {
                v.remove(index);
            }
        }
        Ok(())
    }

    // === Scope references ===

    /// Scope id at `index` of a table or pointer datum
    pub fn get_scope(&self, index: usize) -> Result<ScopeId> {
        let ids = self.scope_ids_checked()?;
        ids.get(index).copied().ok_or(Error::OutOfRange {
            index,
            size: ids.len(),
        })
    }

    /// All scope ids (empty for non-table datums)
    pub fn scope_ids(&self) -> &[ScopeId] {
        match &self.storage {
            Storage::Internal(values) => values.scope_ids().map(Vec::as_slice).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Append an aliased scope
    pub fn push_external_table(&mut self, scope: ScopeId) -> Result<()> {
        self.push_scope_id(DatumType::ExternalTable, scope)
    }

    /// Append a reference to a reflected object
    pub fn push_pointer(&mut self, scope: ScopeId) -> Result<()> {
        self.push_scope_id(DatumType::Pointer, scope)
    }

    /// Overwrite a pointer element
    pub fn set_pointer(&mut self, index: usize, scope: ScopeId) -> Result<()> {
        self.ensure_type(DatumType::Pointer)?;
        let ids = self.scope_ids_mut()?;
        let size = ids.len();
        match ids.get_mut(index) {
            Some(slot) => {
                *slot = scope;
                Ok(())
            }
            None if index == size => {
                ids.push(scope);
                Ok(())
            }
            None => Err(Error::OutOfRange { index, size }),
        }
    }

    pub(crate) fn push_scope_id(&mut self, ty: DatumType, scope: ScopeId) -> Result<()> {
        self.ensure_type(ty)?;
        let grow = self.grow;
        if let Storage::Internal(values) = &mut self.storage {
            let required = values.len() + 1;
            grow_for(values, required, grow);
        }
        self.scope_ids_mut()?.push(scope);
        Ok(())
    }

    pub(crate) fn remove_scope_at(&mut self, index: usize) -> Result<ScopeId> {
        let ids = self.scope_ids_mut()?;
        let size = ids.len();
        if index >= size {
            return Err(Error::OutOfRange { index, size });
        }
        Ok(ids.remove(index))
    }

    pub(crate) fn replace_scope_at(&mut self, index: usize, scope: ScopeId) -> Result<()> {
        let ids = self.scope_ids_mut()?;
        let size = ids.len();
        match ids.get_mut(index) {
            Some(slot) => {
                *slot = scope;
                Ok(())
            }
            None => Err(Error::OutOfRange { index, size }),
        }
    }

    pub(crate) fn from_scope_ids(ty: DatumType, ids: Vec<ScopeId>) -> Self {
        let values = match ty {
            DatumType::InternalTable => Values::InternalTable(ids),
            DatumType::ExternalTable => Values::ExternalTable(ids),
            _ => Values::Pointer(ids),
        };
        Self {
            storage: Storage::Internal(values),
            grow: geometric_growth,
        }
    }

    // === Text conversion ===

    /// Parse `text` into the element at `index`
    pub fn set_from_string(&mut self, index: usize, text: &str) -> Result<()> {
        match self.datum_type() {
            DatumType::Integer => self.set(index, i32::parse_text(text)?),
            DatumType::Float => self.set(index, f32::parse_text(text)?),
            DatumType::String => self.set(index, String::parse_text(text)?),
            DatumType::Vector4 => self.set(index, Vec4::parse_text(text)?),
            DatumType::Matrix4x4 => self.set(index, Mat4::parse_text(text)?),
            other => Err(Error::type_mismatch("scalar type", other)),
        }
    }

    /// Parse `text` and append it
    pub fn push_back_from_string(&mut self, text: &str) -> Result<()> {
        match self.datum_type() {
            DatumType::Integer => self.push_back(i32::parse_text(text)?),
            DatumType::Float => self.push_back(f32::parse_text(text)?),
            DatumType::String => self.push_back(String::parse_text(text)?),
            DatumType::Vector4 => self.push_back(Vec4::parse_text(text)?),
            DatumType::Matrix4x4 => self.push_back(Mat4::parse_text(text)?),
            other => Err(Error::type_mismatch("scalar type", other)),
        }
    }

    /// Text form of the element at `index`
    pub fn to_string_at(&self, index: usize) -> Result<String> {
        match self.datum_type() {
            DatumType::Integer => self.get::<i32>(index).map(|v| v.format_text()),
            DatumType::Float => self.get::<f32>(index).map(|v| v.format_text()),
            DatumType::String => self.get::<String>(index),
            DatumType::Vector4 => self.get::<Vec4>(index).map(|v| v.format_text()),
            DatumType::Matrix4x4 => self.get::<Mat4>(index).map(|v| v.format_text()),
            DatumType::Unknown => Err(Error::OutOfRange { index, size: 0 }),
            _ => self.get_scope(index).map(|id| id.to_string()),
        }
    }

    /// Truthiness of the first element; empty datums are false
    pub fn is_truthy(&self) -> bool {
        fn first<T: DatumValue>(datum: &Datum) -> bool {
            datum
                .with_slice(|slice: &[T]| slice.first().map(T::is_truthy).unwrap_or(false))
                .unwrap_or(false)
        }
        match self.datum_type() {
            DatumType::Unknown => false,
            DatumType::Integer => first::<i32>(self),
            DatumType::Float => first::<f32>(self),
            DatumType::String => first::<String>(self),
            DatumType::Vector4 => first::<Vec4>(self),
            DatumType::Matrix4x4 => first::<Mat4>(self),
            DatumType::InternalTable | DatumType::ExternalTable | DatumType::Pointer => {
                !self.scope_ids().is_empty()
            }
        }
    }

    // === Copies ===

    /// Copy a datum that does not own child scopes
    ///
    /// External storage is aliased, never copied.
    pub fn try_clone(&self) -> Result<Datum> {
        let storage = match &self.storage {
            Storage::Unknown => Storage::Unknown,
            Storage::External { field, read_only } => Storage::External {
                field: field.share(),
                read_only: *read_only,
            },
            Storage::Internal(Values::InternalTable(ids)) if !ids.is_empty() => {
                return Err(Error::InvalidStorage(
                    "internal tables are cloned through the arena".into(),
                ))
            }
            Storage::Internal(values) => Storage::Internal(values.clone()),
        };
        Ok(Self {
            storage,
            grow: self.grow,
        })
    }

    /// Copy the current values into a new internal datum
    pub fn snapshot(&self) -> Result<Datum> {
        fn copy<T: DatumValue>(datum: &Datum) -> Result<Datum> {
            Ok(Datum::from_values(datum.to_vec::<T>()?))
        }
        match self.datum_type() {
            DatumType::Integer => copy::<i32>(self),
            DatumType::Float => copy::<f32>(self),
            DatumType::String => copy::<String>(self),
            DatumType::Vector4 => copy::<Vec4>(self),
            DatumType::Matrix4x4 => copy::<Mat4>(self),
            _ => self.try_clone(),
        }
    }

    // === Internals ===

    fn ensure_type(&mut self, ty: DatumType) -> Result<()> {
        match self.datum_type() {
            DatumType::Unknown => self.set_type(ty),
            current if current == ty => Ok(()),
            current => Err(Error::type_mismatch(ty, current)),
        }
    }

    fn internal_mut(&mut self, operation: &str) -> Result<&mut Values> {
        match &mut self.storage {
            Storage::Internal(values) => Ok(values),
            Storage::External { .. } => Err(Error::InvalidStorage(format!(
                "cannot {} external storage",
                operation
            ))),
            Storage::Unknown => Err(Error::InvalidStorage(format!(
                "cannot {} a datum without a type",
                operation
            ))),
        }
    }

    fn scope_ids_checked(&self) -> Result<&Vec<ScopeId>> {
        match &self.storage {
            Storage::Internal(values) => values
                .scope_ids()
                .ok_or_else(|| Error::type_mismatch("table or pointer", values.datum_type())),
            _ => Err(Error::type_mismatch("table or pointer", self.datum_type())),
        }
    }

    fn scope_ids_mut(&mut self) -> Result<&mut Vec<ScopeId>> {
        let found = self.datum_type();
        match &mut self.storage {
            Storage::Internal(values) => values
                .scope_ids_mut()
                .ok_or_else(|| Error::type_mismatch("table or pointer", found)),
            _ => Err(Error::type_mismatch("table or pointer", found)),
        }
    }
}

/// Apply the growth policy so that `values` can hold `required` elements
fn grow_for(values: &mut Values, required: usize, grow: GrowPolicy) {
    let capacity = values.capacity();
    if required > capacity {
        let target = grow(values.len(), capacity).max(required);
        values.reserve_exact(target - values.len());
    }
}

impl Default for Datum {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        fn same<T: DatumValue>(a: &Datum, b: &Datum) -> bool {
            a.with_slice(|x: &[T]| b.with_slice(|y: &[T]| x == y).unwrap_or(false))
                .unwrap_or(false)
        }
        if self.datum_type() != other.datum_type() || self.size() != other.size() {
            return false;
        }
        match self.datum_type() {
            DatumType::Unknown => true,
            DatumType::Integer => same::<i32>(self, other),
            DatumType::Float => same::<f32>(self, other),
            DatumType::String => same::<String>(self, other),
            DatumType::Vector4 => same::<Vec4>(self, other),
            DatumType::Matrix4x4 => same::<Mat4>(self, other),
            _ => self.scope_ids() == other.scope_ids(),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = (0..self.size())
            .filter_map(|i| self.to_string_at(i).ok())
            .collect();
        write!(f, "[{}]", items.join(", "))
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Datum {
                fn from(value: $ty) -> Self {
                    Datum::from_values(vec![value])
                }
            }
        )*
    };
}

impl_from_scalar!(i32, f32, String, Vec4, Mat4);

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::from_values(vec![value.to_string()])
    }
}
