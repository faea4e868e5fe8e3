//! Entity metadata: the static tables the decoder plans against.
//!
//! Rust has no runtime reflection, so the per-type introspection the decoder
//! needs is described up front: a field table with one compiled setter per
//! writable field, and a construction strategy that is either a nil-ary
//! factory or an ordered constructor-parameter list with a factory consuming
//! an argument vector. The [`crate::entity!`] and [`crate::sql_enum!`] macros
//! generate these implementations; hand-written impls are equally valid.

use std::any::{Any, TypeId};

use crate::error::{DriverError, SqlMapperError};
use crate::value::SqlValue;

/// A value on its way into an entity field or constructor argument.
///
/// `Sql` carries a raw driver value for the built-in conversion path;
/// `Custom` carries the output of a registered type handler or an enum
/// parser; `Null` stands for a database null or an unmatched constructor
/// argument and converts to the target type's default.
pub enum FieldValue {
    Null,
    Sql(SqlValue),
    Custom(Box<dyn Any + Send>),
}

impl std::fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Sql(v) => write!(f, "Sql({v:?})"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Shape of a field or parameter type, after stripping the `Option` wrapper.
///
/// The decoder uses the shape to pick the read path for a column: `Enum`
/// carries the type-erased parser built from the [`SqlEnum`] impl, `Date` and
/// `Time` route through the driver's strongly-typed accessors.
#[derive(Debug, Clone, Copy)]
pub enum TypeShape {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Uuid,
    Decimal,
    Timestamp,
    Date,
    Time,
    Json,
    Enum {
        parse: fn(&SqlValue) -> Result<FieldValue, SqlMapperError>,
    },
    /// A type the mapper has no built-in conversion for; it must be covered
    /// by a registered handler.
    Other,
}

/// Type description of an entity field or constructor parameter.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// `TypeId` of the underlying type (the declared type with `Option`
    /// stripped). Handler lookups key on this.
    pub id: TypeId,
    /// Human-readable name of the underlying type, for diagnostics.
    pub name: &'static str,
    /// Whether the declared type was wrapped in `Option`.
    pub optional: bool,
    pub shape: TypeShape,
}

impl TypeInfo {
    #[must_use]
    pub fn of<T: SqlType>() -> TypeInfo {
        T::type_info()
    }
}

/// Types that can appear as entity fields, constructor parameters, or scalar
/// query targets.
pub trait SqlType: Any + Send {
    fn type_info() -> TypeInfo;
}

/// One public field of an entity.
pub struct Field<E> {
    /// The field's mapping name. Column identifiers are matched against this,
    /// first directly (case-insensitive), then through the snake-to-Pascal
    /// fallback.
    pub name: &'static str,
    pub ty: TypeInfo,
    /// Compiled setter; `None` for read-only fields that are only assignable
    /// through the constructor.
    pub setter: Option<fn(&mut E, FieldValue) -> Result<(), SqlMapperError>>,
}

/// One parameter of a parameterised constructor.
#[derive(Debug, Clone, Copy)]
pub struct CtorParam {
    pub name: &'static str,
    pub ty: TypeInfo,
}

/// How instances of an entity are created.
pub enum Construction<E> {
    /// A public nil-ary constructor; all writable fields are set afterwards.
    Nullary(fn() -> E),
    /// A parameterised constructor invoked from an argument vector whose
    /// slots correspond to `params` in order.
    Parameterised {
        params: &'static [CtorParam],
        factory: fn(Vec<FieldValue>) -> Result<E, SqlMapperError>,
    },
}

/// Per-type metadata the row decoder plans against.
pub trait Entity: Sized + Send + 'static {
    /// Entity type name, used in error messages.
    const NAME: &'static str;

    /// Public instance fields in declaration order. Column-to-field matching
    /// is first-match-wins over this order.
    fn fields() -> &'static [Field<Self>];

    fn construction() -> Construction<Self>;
}

/// One variant of a database-mapped enum.
#[derive(Debug, Clone, Copy)]
pub struct EnumVariant<E> {
    /// The Rust identifier of the variant.
    pub ident: &'static str,
    pub value: E,
    /// The database name declared for this variant, when its stored
    /// representation differs from the identifier.
    pub db_name: Option<&'static str>,
}

/// Enumerated types storable in the database.
///
/// Without a registered handler, values decode from a string column by
/// case-insensitive identifier match, or from an integer column by variant
/// position; they bind as their variant position. Enums whose database
/// representation differs from the identifier by more than case declare
/// per-variant database names and are covered by an
/// [`crate::handler::EnumNameHandler`].
pub trait SqlEnum: Sized + Copy + PartialEq + Send + Sync + 'static {
    const NAME: &'static str;

    /// Database type name for drivers that require a type hint, when the
    /// enum's database type also varies by type.
    const DB_TYPE: Option<&'static str> = None;

    const VARIANTS: &'static [EnumVariant<Self>];

    /// Position of the variant in `VARIANTS`, used as its integral database
    /// representation when no handler is registered.
    fn position(self) -> usize {
        Self::VARIANTS
            .iter()
            .position(|v| v.value == self)
            .unwrap_or_default()
    }

    /// Built-in decode path: case-insensitive identifier match for strings,
    /// variant position for integers.
    fn from_sql(value: &SqlValue) -> Result<Self, SqlMapperError> {
        match value {
            SqlValue::Text(s) => Self::VARIANTS
                .iter()
                .find(|v| v.ident.eq_ignore_ascii_case(s))
                .map(|v| v.value)
                .ok_or_else(|| {
                    DriverError::new(format!("no variant of {} matches `{s}`", Self::NAME)).into()
                }),
            SqlValue::Int(i) => usize::try_from(*i)
                .ok()
                .and_then(|idx| Self::VARIANTS.get(idx))
                .map(|v| v.value)
                .ok_or_else(|| {
                    DriverError::new(format!("no variant of {} at position {i}", Self::NAME)).into()
                }),
            other => Err(DriverError::new(format!(
                "cannot convert {} to enum {}",
                other.kind(),
                Self::NAME
            ))
            .into()),
        }
    }
}
