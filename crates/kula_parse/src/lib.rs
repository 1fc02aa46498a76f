//! # kula_parse - Kula JSON Loading
//!
//! A chain-of-responsibility JSON deserializer:
//!
//! - **ParseCoordinator**: walks a JSON document and hands each member to the
//!   first helper that claims it
//! - **ParseHelper / KeyTransmuter**: pluggable member handlers and key
//!   rewriters, each owning per-parse state
//! - **TableWrapper**: populates a scope tree, instantiating reflected
//!   classes through the signature registry
//! - **Expression**: infix arithmetic compiled to reverse Polish notation
//!
//! ## Example
//!
//! ```ignore
//! use kula_parse::prelude::*;
//!
//! let mut arena = ScopeArena::new();
//! let root = arena.create_scope();
//! parse_table(&mut arena, root, r#"{"int Score": 5}"#, &ParseConfig::default())?;
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod expression;
pub mod table;
pub mod transmuter;

pub use config::ParseConfig;
pub use coordinator::{KeyTransmuter, Member, ParseCoordinator, ParseHelper, ParseOutcome, ParseWrapper};
pub use error::{ParseError, Result};
pub use expression::{Environment, Expression, ExpressionError, Operand, Operator, RpnToken};
pub use table::{
    parse_table, table_coordinator, Frame, FrameKind, TableHelper, TableWrapper, ValueHelper,
    CLASS_KEY, TYPE_KEY, VALUE_KEY,
};
pub use transmuter::{KeywordTransmuter, PathTransmuter, OBJECT_MARKER};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ParseConfig;
    pub use crate::coordinator::{ParseCoordinator, ParseHelper, ParseWrapper};
    pub use crate::error::{ParseError, Result};
    pub use crate::expression::{Environment, Expression, Operand};
    pub use crate::table::{parse_table, table_coordinator, TableWrapper};
    pub use kula_data::prelude::*;
}
