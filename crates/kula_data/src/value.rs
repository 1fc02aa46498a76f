//! Datum element types
//!
//! [`DatumType`] is the runtime tag of a datum; [`DatumValue`] maps each
//! scalar Rust type that a datum can hold onto its tag, its buffers and its
//! text form.

use core::fmt;

use glam::{Mat4, Vec4};
use kula_core::{Error, Result};

use crate::field::{ExternalStorage, Field};
use crate::scope::ScopeId;

/// Runtime type of a datum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DatumType {
    /// No type fixed yet
    #[default]
    Unknown,
    /// 32-bit signed integer
    Integer,
    /// 32-bit float
    Float,
    /// UTF-8 string
    String,
    /// Four component float vector
    Vector4,
    /// 4x4 float matrix (column-major)
    Matrix4x4,
    /// Owned child scopes
    InternalTable,
    /// Aliased scopes owned elsewhere
    ExternalTable,
    /// Reference to a reflected object
    Pointer,
}

impl DatumType {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::String => "String",
            Self::Vector4 => "Vector4",
            Self::Matrix4x4 => "Matrix4x4",
            Self::InternalTable => "InternalTable",
            Self::ExternalTable => "ExternalTable",
            Self::Pointer => "Pointer",
        }
    }

    /// Parse a type keyword as used in JSON (`"int"`, `"vector"`, ...)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(Self::Integer),
            "float" => Some(Self::Float),
            "string" => Some(Self::String),
            "vector" | "vector4" | "vec4" => Some(Self::Vector4),
            "matrix" | "matrix4x4" | "mat4" | "mat4x4" => Some(Self::Matrix4x4),
            "table" => Some(Self::InternalTable),
            _ => None,
        }
    }

    /// Whether elements are scope ids
    pub fn is_scope_reference(&self) -> bool {
        matches!(self, Self::InternalTable | Self::ExternalTable | Self::Pointer)
    }

    /// Whether elements are plain values
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Integer | Self::Float | Self::String | Self::Vector4 | Self::Matrix4x4
        )
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Internal element buffer of a datum
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Integer(Vec<i32>),
    Float(Vec<f32>),
    String(Vec<String>),
    Vector4(Vec<Vec4>),
    Matrix4x4(Vec<Mat4>),
    InternalTable(Vec<ScopeId>),
    ExternalTable(Vec<ScopeId>),
    Pointer(Vec<ScopeId>),
}

impl Values {
    /// Empty buffer for a type; `None` for `Unknown`
    pub fn empty(ty: DatumType) -> Option<Self> {
        Some(match ty {
            DatumType::Unknown => return None,
            DatumType::Integer => Self::Integer(Vec::new()),
            DatumType::Float => Self::Float(Vec::new()),
            DatumType::String => Self::String(Vec::new()),
            DatumType::Vector4 => Self::Vector4(Vec::new()),
            DatumType::Matrix4x4 => Self::Matrix4x4(Vec::new()),
            DatumType::InternalTable => Self::InternalTable(Vec::new()),
            DatumType::ExternalTable => Self::ExternalTable(Vec::new()),
            DatumType::Pointer => Self::Pointer(Vec::new()),
        })
    }

    /// Type tag of the buffer
    pub fn datum_type(&self) -> DatumType {
        match self {
            Self::Integer(_) => DatumType::Integer,
            Self::Float(_) => DatumType::Float,
            Self::String(_) => DatumType::String,
            Self::Vector4(_) => DatumType::Vector4,
            Self::Matrix4x4(_) => DatumType::Matrix4x4,
            Self::InternalTable(_) => DatumType::InternalTable,
            Self::ExternalTable(_) => DatumType::ExternalTable,
            Self::Pointer(_) => DatumType::Pointer,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Integer(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Vector4(v) => v.len(),
            Self::Matrix4x4(v) => v.len(),
            Self::InternalTable(v) | Self::ExternalTable(v) | Self::Pointer(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        match self {
            Self::Integer(v) => v.capacity(),
            Self::Float(v) => v.capacity(),
            Self::String(v) => v.capacity(),
            Self::Vector4(v) => v.capacity(),
            Self::Matrix4x4(v) => v.capacity(),
            Self::InternalTable(v) | Self::ExternalTable(v) | Self::Pointer(v) => v.capacity(),
        }
    }

    pub(crate) fn reserve_exact(&mut self, additional: usize) {
        match self {
            Self::Integer(v) => v.reserve_exact(additional),
            Self::Float(v) => v.reserve_exact(additional),
            Self::String(v) => v.reserve_exact(additional),
            Self::Vector4(v) => v.reserve_exact(additional),
            Self::Matrix4x4(v) => v.reserve_exact(additional),
            Self::InternalTable(v) | Self::ExternalTable(v) | Self::Pointer(v) => {
                v.reserve_exact(additional)
            }
        }
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        match self {
            Self::Integer(v) => v.shrink_to_fit(),
            Self::Float(v) => v.shrink_to_fit(),
            Self::String(v) => v.shrink_to_fit(),
            Self::Vector4(v) => v.shrink_to_fit(),
            Self::Matrix4x4(v) => v.shrink_to_fit(),
            Self::InternalTable(v) | Self::ExternalTable(v) | Self::Pointer(v) => v.shrink_to_fit(),
        }
    }

    pub(crate) fn scope_ids(&self) -> Option<&Vec<ScopeId>> {
        match self {
            Self::InternalTable(v) | Self::ExternalTable(v) | Self::Pointer(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn scope_ids_mut(&mut self) -> Option<&mut Vec<ScopeId>> {
        match self {
            Self::InternalTable(v) | Self::ExternalTable(v) | Self::Pointer(v) => Some(v),
            _ => None,
        }
    }
}

/// A scalar type that a datum can store
pub trait DatumValue: Clone + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Datum tag for this type
    const TYPE: DatumType;

    /// Typed view of an internal buffer
    fn slice(values: &Values) -> Option<&Vec<Self>>;

    /// Mutable typed view of an internal buffer
    fn slice_mut(values: &mut Values) -> Option<&mut Vec<Self>>;

    /// Wrap a vector into an internal buffer
    fn wrap(values: Vec<Self>) -> Values;

    /// Typed view of external storage
    fn field(storage: &ExternalStorage) -> Option<&Field<Self>>;

    /// Wrap a field into external storage
    fn wrap_field(field: Field<Self>) -> ExternalStorage;

    /// Parse the text form
    fn parse_text(text: &str) -> Result<Self>;

    /// Render the text form
    fn format_text(&self) -> String;

    /// Truthiness used by conditions
    fn is_truthy(&self) -> bool;
}

macro_rules! impl_datum_value {
    ($ty:ty, $variant:ident) => {
        fn slice(values: &Values) -> Option<&Vec<Self>> {
            match values {
                Values::$variant(v) => Some(v),
                _ => None,
            }
        }

        fn slice_mut(values: &mut Values) -> Option<&mut Vec<Self>> {
            match values {
                Values::$variant(v) => Some(v),
                _ => None,
            }
        }

        fn wrap(values: Vec<Self>) -> Values {
            Values::$variant(values)
        }

        fn field(storage: &ExternalStorage) -> Option<&Field<Self>> {
            match storage {
                ExternalStorage::$variant(f) => Some(f),
                _ => None,
            }
        }

        fn wrap_field(field: Field<Self>) -> ExternalStorage {
            ExternalStorage::$variant(field)
        }
    };
}

fn conversion(text: &str, target: DatumType) -> Error {
    Error::Conversion {
        text: text.to_string(),
        target: target.to_string(),
    }
}

impl DatumValue for i32 {
    const TYPE: DatumType = DatumType::Integer;
    impl_datum_value!(i32, Integer);

    /// Accepts integer text, or float text that is integral and in range
    /// (`3.0`, `1e3`); anything that would lose precision is rejected.
    fn parse_text(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if let Ok(value) = trimmed.parse::<i32>() {
            return Ok(value);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX) => {
                Ok(f as i32)
            }
            _ => Err(conversion(text, Self::TYPE)),
        }
    }

    fn format_text(&self) -> String {
        self.to_string()
    }

    fn is_truthy(&self) -> bool {
        *self != 0
    }
}

impl DatumValue for f32 {
    const TYPE: DatumType = DatumType::Float;
    impl_datum_value!(f32, Float);

    fn parse_text(text: &str) -> Result<Self> {
        text.trim()
            .parse::<f32>()
            .map_err(|_| conversion(text, Self::TYPE))
    }

    fn format_text(&self) -> String {
        self.to_string()
    }

    fn is_truthy(&self) -> bool {
        *self != 0.0
    }
}

impl DatumValue for String {
    const TYPE: DatumType = DatumType::String;
    impl_datum_value!(String, String);

    fn parse_text(text: &str) -> Result<Self> {
        Ok(text.to_string())
    }

    fn format_text(&self) -> String {
        self.clone()
    }

    fn is_truthy(&self) -> bool {
        !(self.is_empty() || self == "0" || self.eq_ignore_ascii_case("false"))
    }
}

impl DatumValue for Vec4 {
    const TYPE: DatumType = DatumType::Vector4;
    impl_datum_value!(Vec4, Vector4);

    fn parse_text(text: &str) -> Result<Self> {
        let numbers = parse_floats(text, "vec4").ok_or_else(|| conversion(text, Self::TYPE))?;
        match numbers.as_slice() {
            [v] => Ok(Vec4::splat(*v)),
            [x, y, z, w] => Ok(Vec4::new(*x, *y, *z, *w)),
            _ => Err(conversion(text, Self::TYPE)),
        }
    }

    fn format_text(&self) -> String {
        format!("vec4({}, {}, {}, {})", self.x, self.y, self.z, self.w)
    }

    fn is_truthy(&self) -> bool {
        *self != Vec4::ZERO
    }
}

impl DatumValue for Mat4 {
    const TYPE: DatumType = DatumType::Matrix4x4;
    impl_datum_value!(Mat4, Matrix4x4);

    fn parse_text(text: &str) -> Result<Self> {
        let numbers = parse_floats(text, "mat4x4").ok_or_else(|| conversion(text, Self::TYPE))?;
        match numbers.len() {
            1 => Ok(Mat4::from_diagonal(Vec4::splat(numbers[0]))),
            16 => {
                let mut cols = [0.0f32; 16];
                cols.copy_from_slice(&numbers);
                Ok(Mat4::from_cols_array(&cols))
            }
            _ => Err(conversion(text, Self::TYPE)),
        }
    }

    fn format_text(&self) -> String {
        let cols: Vec<String> = (0..4)
            .map(|i| {
                let c = self.col(i);
                format!("({}, {}, {}, {})", c.x, c.y, c.z, c.w)
            })
            .collect();
        format!("mat4x4({})", cols.join(", "))
    }

    fn is_truthy(&self) -> bool {
        *self != Mat4::ZERO
    }
}

/// Parse `prefix(a, b, (c, d))`-style text into a flat list of floats
fn parse_floats(text: &str, prefix: &str) -> Option<Vec<f32>> {
    let body = text.trim();
    let body = body.strip_prefix(prefix).unwrap_or(body);
    body.split(|c: char| c == ',' || c == '(' || c == ')' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(DatumType::from_keyword("int"), Some(DatumType::Integer));
        assert_eq!(DatumType::from_keyword("Integer"), Some(DatumType::Integer));
        assert_eq!(DatumType::from_keyword("vector"), Some(DatumType::Vector4));
        assert_eq!(DatumType::from_keyword("table"), Some(DatumType::InternalTable));
        assert_eq!(DatumType::from_keyword("Monster"), None);
    }

    #[test]
    fn test_vector_text() {
        let v = Vec4::new(1.0, 2.5, -3.0, 4.0);
        let text = v.format_text();
        assert_eq!(text, "vec4(1, 2.5, -3, 4)");
        assert_eq!(Vec4::parse_text(&text).unwrap(), v);
        assert_eq!(Vec4::parse_text("1 2 3 4").unwrap(), Vec4::new(1.0, 2.0, 3.0, 4.0));
        assert!(Vec4::parse_text("vec4(1, 2)").is_err());
    }

    #[test]
    fn test_matrix_text() {
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
        ]);
        let text = m.format_text();
        assert!(text.starts_with("mat4x4((1, 2, 3, 4)"));
        assert_eq!(Mat4::parse_text(&text).unwrap(), m);
        assert_eq!(Mat4::parse_text("mat4x4(1)").unwrap(), Mat4::IDENTITY);
    }

    #[test]
    fn test_integer_text() {
        assert_eq!(i32::parse_text(" 42 ").unwrap(), 42);
        assert_eq!(i32::parse_text("3.0").unwrap(), 3);
        assert_eq!(i32::parse_text("1e3").unwrap(), 1000);
        assert!(matches!(i32::parse_text("3.9"), Err(Error::Conversion { .. })));
        assert!(i32::parse_text("3000000000").is_err());
        assert!(i32::parse_text("NaN").is_err());
        assert!(i32::parse_text("abc").is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(!0i32.is_truthy());
        assert!(5i32.is_truthy());
        assert!(!String::from("false").is_truthy());
        assert!(!String::new().is_truthy());
        assert!(String::from("yes").is_truthy());
        assert!(!Vec4::ZERO.is_truthy());
        assert!(Mat4::IDENTITY.is_truthy());
    }
}
