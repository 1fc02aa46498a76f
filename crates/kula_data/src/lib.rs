//! # kula_data - Kula Reflective Data Model
//!
//! The self-describing object graph everything else is built on:
//!
//! - **Datum**: a typed, homogeneous value slot with internal or external
//!   storage
//! - **Field**: native struct storage shared with a datum
//! - **Scope**: an insertion-ordered `key -> Datum` table in a [`ScopeArena`]
//! - **Attributed**: native structs reflected into scopes through their
//!   [`Signature`]s
//!
//! ## Example
//!
//! ```ignore
//! use kula_data::prelude::*;
//!
//! let mut arena = ScopeArena::new();
//! let root = arena.create_scope();
//! arena.append(root, "Score")?.push_back(5)?;
//! let child = arena.append_scope(root, "Inventory")?;
//! assert_eq!(arena.parent(child), Some(root));
//! ```

pub mod attributed;
pub mod datum;
pub mod field;
pub mod scope;
pub mod signature;
pub mod value;

pub use attributed::{Attributed, Reflected, THIS_KEY};
pub use datum::{geometric_growth, Datum, GrowPolicy};
pub use field::{ExternalStorage, Field};
pub use scope::{ScopeArena, ScopeId};
pub use signature::{Binding, FieldAccessor, Signature, SignatureRegistry};
pub use value::{DatumType, DatumValue, Values};

pub use glam::{Mat4, Vec4};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::attributed::{Attributed, Reflected};
    pub use crate::datum::Datum;
    pub use crate::field::Field;
    pub use crate::scope::{ScopeArena, ScopeId};
    pub use crate::signature::{Signature, SignatureRegistry};
    pub use crate::value::DatumType;
    pub use glam::{Mat4, Vec4};
}
