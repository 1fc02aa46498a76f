//! Shared native storage for reflected members
//!
//! A reflected struct keeps each prescribed member in a [`Field`]. The
//! datum that reflects the member aliases the same buffer, so a write
//! through either side is visible on the other without copying.
//!
//! ```ignore
//! #[derive(Clone, Default)]
//! struct Monster { health: Field<i32> }
//!
//! let monster = Monster { health: Field::new(10) };
//! let mut datum = Datum::new();
//! datum.set_storage(monster.health.share(), false)?;
//! datum.set(0, 7)?;
//! assert_eq!(monster.health.get(), 7);
//! ```

use core::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec4};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::value::DatumType;

/// Fixed-length, shared, interior-mutable member storage
pub struct Field<T> {
    cells: Arc<RwLock<Vec<T>>>,
}

impl<T: Clone + Default> Field<T> {
    /// Single-element field
    pub fn new(value: T) -> Self {
        Self::from_vec(vec![value])
    }

    /// Field with one element per value
    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            cells: Arc::new(RwLock::new(values)),
        }
    }

    /// Field of `len` default elements
    pub fn with_len(len: usize) -> Self {
        Self::from_vec(vec![T::default(); len])
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    /// First element (default when empty)
    pub fn get(&self) -> T {
        self.get_at(0).unwrap_or_default()
    }

    /// Element at `index`
    pub fn get_at(&self, index: usize) -> Option<T> {
        self.cells.read().get(index).cloned()
    }

    /// Overwrite the first element
    pub fn set(&self, value: T) {
        self.set_at(0, value);
    }

    /// Overwrite the element at `index`; false when out of range
    pub fn set_at(&self, index: usize, value: T) -> bool {
        match self.cells.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Copy of all elements
    pub fn to_vec(&self) -> Vec<T> {
        self.cells.read().clone()
    }

    /// Alias of this field (same storage)
    pub fn share(&self) -> Self {
        Self {
            cells: Arc::clone(&self.cells),
        }
    }

    /// Whether both fields alias the same storage
    pub fn is_alias_of(&self, other: &Field<T>) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.cells.read()
    }
}

/// Cloning a field copies the values into new storage
impl<T: Clone + Default> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self::from_vec(self.to_vec())
    }
}

impl<T: Clone + Default> Default for Field<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Default + PartialEq> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        self.is_alias_of(other) || *self.read() == *other.read()
    }
}

impl<T: fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&*self.cells.read()).finish()
    }
}

/// Type-erased external storage bound into a datum
#[derive(Debug)]
pub enum ExternalStorage {
    Integer(Field<i32>),
    Float(Field<f32>),
    String(Field<String>),
    Vector4(Field<Vec4>),
    Matrix4x4(Field<Mat4>),
}

impl ExternalStorage {
    /// Datum type of the elements
    pub fn datum_type(&self) -> DatumType {
        match self {
            Self::Integer(_) => DatumType::Integer,
            Self::Float(_) => DatumType::Float,
            Self::String(_) => DatumType::String,
            Self::Vector4(_) => DatumType::Vector4,
            Self::Matrix4x4(_) => DatumType::Matrix4x4,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            Self::Integer(f) => f.len(),
            Self::Float(f) => f.len(),
            Self::String(f) => f.len(),
            Self::Vector4(f) => f.len(),
            Self::Matrix4x4(f) => f.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alias of the same storage
    pub fn share(&self) -> Self {
        match self {
            Self::Integer(f) => Self::Integer(f.share()),
            Self::Float(f) => Self::Float(f.share()),
            Self::String(f) => Self::String(f.share()),
            Self::Vector4(f) => Self::Vector4(f.share()),
            Self::Matrix4x4(f) => Self::Matrix4x4(f.share()),
        }
    }

    /// Whether both refer to the same storage
    pub fn is_alias_of(&self, other: &ExternalStorage) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.is_alias_of(b),
            (Self::Float(a), Self::Float(b)) => a.is_alias_of(b),
            (Self::String(a), Self::String(b)) => a.is_alias_of(b),
            (Self::Vector4(a), Self::Vector4(b)) => a.is_alias_of(b),
            (Self::Matrix4x4(a), Self::Matrix4x4(b)) => a.is_alias_of(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_aliases() {
        let field = Field::new(10);
        let alias = field.share();
        alias.set(7);
        assert_eq!(field.get(), 7);
        assert!(alias.is_alias_of(&field));
    }

    #[test]
    fn test_clone_is_deep() {
        let field = Field::from_vec(vec![1, 2, 3]);
        let copy = field.clone();
        copy.set_at(1, 20);
        assert_eq!(field.to_vec(), vec![1, 2, 3]);
        assert_eq!(copy.to_vec(), vec![1, 20, 3]);
        assert!(!copy.is_alias_of(&field));
    }

    #[test]
    fn test_set_out_of_range() {
        let field = Field::<f32>::with_len(2);
        assert!(field.set_at(1, 1.5));
        assert!(!field.set_at(2, 1.5));
        assert_eq!(field.len(), 2);
    }
}
