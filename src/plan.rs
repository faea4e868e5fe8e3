//! Decode plans: cached descriptions of how a particular result-column
//! layout turns into instances of a particular entity type.
//!
//! A plan is built once per `(column-name tuple, entity type)` pair and
//! stamped with the handler-registry version; a version bump invalidates the
//! plan on its next lookup. Plans are read-only once inserted — staleness
//! triggers replacement, never mutation.

use std::any::{Any, TypeId};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::driver::RowReader;
use crate::entity::{Construction, CtorParam, Entity, FieldValue, TypeInfo, TypeShape};
use crate::error::SqlMapperError;
use crate::handler::{HandlerRegistry, TypeHandler};
use crate::value::SqlValue;

pub(crate) type SetterFn<E> = fn(&mut E, FieldValue) -> Result<(), SqlMapperError>;

/// Read path selected for a bound column, resolved once at plan-build time.
#[derive(Clone)]
pub(crate) enum BindKind {
    /// Raw value, coerced by the target's standard conversion.
    Default,
    /// A registered handler owns the conversion.
    Handler(Arc<dyn TypeHandler>),
    /// Enumerated target; read through the driver's strongly-typed accessor
    /// and decoded by the enum's type-erased parser.
    Enum(fn(&SqlValue) -> Result<FieldValue, SqlMapperError>),
    /// Date-only target; read through the driver's strongly-typed accessor.
    DateOnly,
    /// Time-of-day target; read through the driver's strongly-typed accessor.
    TimeOnly,
}

pub(crate) struct ColumnBinding {
    pub(crate) ordinal: usize,
    pub(crate) kind: BindKind,
}

pub(crate) struct CtorBinding {
    /// `None` when no result column matched the constructor parameter; the
    /// parameter then receives its type's default.
    pub(crate) ordinal: Option<usize>,
    pub(crate) kind: BindKind,
}

pub(crate) enum PlanConstruction<E> {
    Nullary(fn() -> E),
    Parameterised {
        factory: fn(Vec<FieldValue>) -> Result<E, SqlMapperError>,
        bindings: Vec<CtorBinding>,
    },
}

/// Cached decode plan for one `(column-name tuple, entity type)` pair.
pub struct DecodePlan<E: Entity> {
    pub(crate) construction: PlanConstruction<E>,
    pub(crate) setters: Vec<(SetterFn<E>, ColumnBinding)>,
    pub(crate) handler_version: u64,
}

/// Separator for the cache key built from column names; cannot occur in an
/// identifier.
const COLUMN_KEY_SEPARATOR: char = '\u{1}';

static PLAN_CACHE: LazyLock<DashMap<(String, TypeId), Arc<dyn Any + Send + Sync>>> =
    LazyLock::new(DashMap::new);

/// Fetch or build the decode plan for `E` against the reader's current
/// result shape.
///
/// # Errors
///
/// Returns `InvalidEntity` when the entity metadata cannot support the
/// result shape.
pub fn plan_for<E: Entity>(reader: &dyn RowReader) -> Result<Arc<DecodePlan<E>>, SqlMapperError> {
    let registry = HandlerRegistry::global();
    let mut column_key =
        String::with_capacity(reader.field_count().saturating_mul(12));
    for ordinal in 0..reader.field_count() {
        if ordinal > 0 {
            column_key.push(COLUMN_KEY_SEPARATOR);
        }
        column_key.push_str(reader.column_name(ordinal));
    }

    let key = (column_key, TypeId::of::<E>());
    if let Some(entry) = PLAN_CACHE.get(&key) {
        if let Ok(plan) = Arc::clone(entry.value()).downcast::<DecodePlan<E>>() {
            if plan.handler_version == registry.version() {
                return Ok(plan);
            }
        }
    }

    // Read the version before resolving handlers: a registration racing the
    // build leaves the plan stamped stale, forcing a rebuild on next use.
    let version = registry.version();
    let plan = Arc::new(build_plan::<E>(reader, registry, version)?);
    tracing::debug!(
        entity = E::NAME,
        columns = reader.field_count(),
        version,
        "decode plan built"
    );
    PLAN_CACHE.insert(key, plan.clone());
    Ok(plan)
}

fn build_plan<E: Entity>(
    reader: &dyn RowReader,
    registry: &HandlerRegistry,
    version: u64,
) -> Result<DecodePlan<E>, SqlMapperError> {
    let fields = E::fields();
    let construction = E::construction();

    // Map fields to ordinals: a case-insensitive direct match first, then the
    // snake-to-Pascal fallback. Each ordinal claims at most one field and
    // each field is claimed at most once; first match wins in field
    // declaration order.
    let mut field_ordinals: Vec<Option<usize>> = vec![None; fields.len()];
    for ordinal in 0..reader.field_count() {
        let column = reader.column_name(ordinal);
        let matched = find_unclaimed(fields, &field_ordinals, column).or_else(|| {
            let pascal = snake_to_pascal(column);
            find_unclaimed(fields, &field_ordinals, &pascal)
        });
        if let Some(index) = matched {
            field_ordinals[index] = Some(ordinal);
        }
    }

    let ctor_params: &[CtorParam] = match &construction {
        Construction::Nullary(_) => &[],
        Construction::Parameterised { params, .. } => *params,
    };

    let mut setters = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let Some(setter) = field.setter else { continue };
        if ctor_params
            .iter()
            .any(|param| param.name.eq_ignore_ascii_case(field.name))
        {
            continue;
        }
        let Some(ordinal) = field_ordinals[index] else { continue };
        setters.push((
            setter,
            ColumnBinding {
                ordinal,
                kind: resolve_kind(&field.ty, registry),
            },
        ));
    }

    let construction = match construction {
        Construction::Nullary(factory) => PlanConstruction::Nullary(factory),
        Construction::Parameterised { params, factory } => {
            let mut bindings = Vec::with_capacity(params.len());
            for param in params {
                let ordinal = fields
                    .iter()
                    .position(|field| field.name.eq_ignore_ascii_case(param.name))
                    .and_then(|index| field_ordinals[index]);
                bindings.push(CtorBinding {
                    ordinal,
                    kind: resolve_kind(&param.ty, registry),
                });
            }
            PlanConstruction::Parameterised { factory, bindings }
        }
    };

    Ok(DecodePlan {
        construction,
        setters,
        handler_version: version,
    })
}

fn find_unclaimed<E>(
    fields: &[crate::entity::Field<E>],
    claimed: &[Option<usize>],
    name: &str,
) -> Option<usize> {
    fields
        .iter()
        .enumerate()
        .position(|(index, field)| claimed[index].is_none() && field.name.eq_ignore_ascii_case(name))
}

/// Pick the read path for a column: a registered handler first, so handlers
/// for enumerated types are never bypassed, then the shape-specific paths.
fn resolve_kind(ty: &TypeInfo, registry: &HandlerRegistry) -> BindKind {
    if let Some(handler) = registry.try_get(ty.id) {
        return BindKind::Handler(handler);
    }
    match ty.shape {
        TypeShape::Enum { parse } => BindKind::Enum(parse),
        TypeShape::Date => BindKind::DateOnly,
        TypeShape::Time => BindKind::TimeOnly,
        _ => BindKind::Default,
    }
}

/// Materialise one entity from the reader's current row.
///
/// # Errors
///
/// Surfaces driver read failures and conversion errors.
pub fn decode_row<E: Entity>(
    reader: &dyn RowReader,
    plan: &DecodePlan<E>,
) -> Result<E, SqlMapperError> {
    let mut instance = match &plan.construction {
        PlanConstruction::Nullary(factory) => factory(),
        PlanConstruction::Parameterised { factory, bindings } => {
            let mut args = Vec::with_capacity(bindings.len());
            for binding in bindings {
                let value = match binding.ordinal {
                    None => FieldValue::Null,
                    Some(ordinal) if reader.is_null(ordinal) => FieldValue::Null,
                    Some(ordinal) => read_value(reader, ordinal, &binding.kind)?,
                };
                args.push(value);
            }
            factory(args)?
        }
    };

    for (setter, binding) in &plan.setters {
        if reader.is_null(binding.ordinal) {
            continue;
        }
        let value = read_value(reader, binding.ordinal, &binding.kind)?;
        setter(&mut instance, value)?;
    }

    Ok(instance)
}

fn read_value(
    reader: &dyn RowReader,
    ordinal: usize,
    kind: &BindKind,
) -> Result<FieldValue, SqlMapperError> {
    match kind {
        BindKind::Handler(handler) => {
            Ok(FieldValue::Custom(handler.parse(reader.value(ordinal)?)?))
        }
        BindKind::Enum(parse) => parse(&reader.enum_value(ordinal)?),
        BindKind::DateOnly => Ok(FieldValue::Sql(SqlValue::Date(reader.date_value(ordinal)?))),
        BindKind::TimeOnly => Ok(FieldValue::Sql(SqlValue::Time(reader.time_value(ordinal)?))),
        BindKind::Default => Ok(FieldValue::Sql(reader.value(ordinal)?)),
    }
}

/// Normalise a snake_case column identifier to PascalCase.
///
/// Fast path when the name has no underscore: only the first character is
/// upper-cased. Otherwise each character following an underscore is
/// upper-cased and the underscores are dropped.
#[must_use]
pub fn snake_to_pascal(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    if !name.contains('_') {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return String::new();
        };
        if first.is_uppercase() {
            return name.to_string();
        }
        let mut out = String::with_capacity(name.len());
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
        return out;
    }

    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_to_pascal_normative_examples() {
        assert_eq!(snake_to_pascal("is_active"), "IsActive");
        assert_eq!(snake_to_pascal("created_at"), "CreatedAt");
        assert_eq!(snake_to_pascal("my_long_column_name"), "MyLongColumnName");
        assert_eq!(snake_to_pascal("id"), "Id");
        assert_eq!(snake_to_pascal(""), "");
    }

    #[test]
    fn snake_to_pascal_is_idempotent_on_pascal_input() {
        for input in ["IsActive", "Id", "MyLongColumnName", "X"] {
            let once = snake_to_pascal(input);
            assert_eq!(snake_to_pascal(&once), once);
        }
    }

    #[test]
    fn snake_to_pascal_drops_leading_and_doubled_underscores() {
        assert_eq!(snake_to_pascal("_leading"), "Leading");
        assert_eq!(snake_to_pascal("a__b"), "AB");
        assert_eq!(snake_to_pascal("trailing_"), "Trailing");
    }
}
