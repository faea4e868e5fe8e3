//! Declarative macros generating entity and enum metadata.
//!
//! [`entity!`] defines a mappable struct together with its [`crate::entity::Entity`]
//! and [`crate::decode::FromRow`] implementations; [`sql_enum!`] defines a
//! database-mapped enum with optional per-variant database names and an
//! optional database type name.

/// Define a mappable entity struct.
///
/// The plain form lists writable fields; instances are created through a
/// nil-ary factory and every field is set from its matching column. A field's
/// mapping name defaults to its identifier and can be overridden with
/// `#[column = "..."]` for databases whose identifiers differ from the Rust
/// field names:
///
/// ```rust
/// use sql_mapper::entity;
///
/// entity! {
///     #[derive(Debug, Clone)]
///     pub struct User {
///         #[column = "Name"]
///         name: String,
///         #[column = "IsActive"]
///         is_active: bool,
///     }
/// }
/// ```
///
/// The constructor form starts with a `new(...)` parameter list; instances
/// are created through the generated constructor, constructor parameters are
/// filled from their matching columns (or the type's default when no column
/// matches), and the remaining fields are set afterwards:
///
/// ```rust
/// use sql_mapper::entity;
/// use uuid::Uuid;
///
/// entity! {
///     #[derive(Debug, Clone)]
///     pub struct Account {
///         new(id: Uuid, name: String, value: Option<i64>);
///         description: Option<String>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    // Constructor form.
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            new( $( $param:ident : $pty:ty ),* $(,)? );
            $( $(#[column = $col:literal])? $field:ident : $fty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( pub $param: $pty, )*
            $( pub $field: $fty, )*
        }

        impl $name {
            /// Construct from the values a result row would supply; the
            /// remaining fields start at their defaults.
            $vis fn new( $( $param: $pty ),* ) -> Self {
                Self {
                    $( $param, )*
                    $( $field: ::std::default::Default::default(), )*
                }
            }
        }

        impl $crate::entity::Entity for $name {
            const NAME: &'static str = stringify!($name);

            fn fields() -> &'static [$crate::entity::Field<Self>] {
                static FIELDS: ::std::sync::OnceLock<
                    ::std::vec::Vec<$crate::entity::Field<$name>>,
                > = ::std::sync::OnceLock::new();
                FIELDS.get_or_init(|| ::std::vec![
                    $(
                        $crate::entity::Field {
                            name: stringify!($param),
                            ty: $crate::entity::TypeInfo::of::<$pty>(),
                            setter: ::std::option::Option::None,
                        },
                    )*
                    $(
                        $crate::entity::Field {
                            name: $crate::entity!(@name $field $(, $col)?),
                            ty: $crate::entity::TypeInfo::of::<$fty>(),
                            setter: ::std::option::Option::Some(|instance, value| {
                                instance.$field = $crate::convert::FromFieldValue::from_field(
                                    value,
                                    $crate::entity!(@name $field $(, $col)?),
                                )?;
                                ::std::result::Result::Ok(())
                            }),
                        },
                    )*
                ])
            }

            fn construction() -> $crate::entity::Construction<Self> {
                static PARAMS: ::std::sync::OnceLock<
                    ::std::vec::Vec<$crate::entity::CtorParam>,
                > = ::std::sync::OnceLock::new();
                let params = PARAMS.get_or_init(|| ::std::vec![
                    $(
                        $crate::entity::CtorParam {
                            name: stringify!($param),
                            ty: $crate::entity::TypeInfo::of::<$pty>(),
                        },
                    )*
                ]);
                $crate::entity::Construction::Parameterised {
                    params: params.as_slice(),
                    factory: |args| {
                        let mut args = args.into_iter();
                        $(
                            let $param: $pty = $crate::convert::FromFieldValue::from_field(
                                args.next().unwrap_or($crate::entity::FieldValue::Null),
                                stringify!($param),
                            )?;
                        )*
                        ::std::result::Result::Ok($name {
                            $( $param, )*
                            $( $field: ::std::default::Default::default(), )*
                        })
                    },
                }
            }
        }

        $crate::entity!(@from_row $name);
    };

    // Nil-ary form.
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[column = $col:literal])? $field:ident : $fty:ty ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( pub $field: $fty, )+
        }

        impl $crate::entity::Entity for $name {
            const NAME: &'static str = stringify!($name);

            fn fields() -> &'static [$crate::entity::Field<Self>] {
                static FIELDS: ::std::sync::OnceLock<
                    ::std::vec::Vec<$crate::entity::Field<$name>>,
                > = ::std::sync::OnceLock::new();
                FIELDS.get_or_init(|| ::std::vec![
                    $(
                        $crate::entity::Field {
                            name: $crate::entity!(@name $field $(, $col)?),
                            ty: $crate::entity::TypeInfo::of::<$fty>(),
                            setter: ::std::option::Option::Some(|instance, value| {
                                instance.$field = $crate::convert::FromFieldValue::from_field(
                                    value,
                                    $crate::entity!(@name $field $(, $col)?),
                                )?;
                                ::std::result::Result::Ok(())
                            }),
                        },
                    )+
                ])
            }

            fn construction() -> $crate::entity::Construction<Self> {
                $crate::entity::Construction::Nullary(|| $name {
                    $( $field: ::std::default::Default::default(), )+
                })
            }
        }

        $crate::entity!(@from_row $name);
    };

    (@name $field:ident) => {
        stringify!($field)
    };
    (@name $field:ident, $col:literal) => {
        $col
    };

    (@from_row $name:ident) => {
        impl $crate::decode::FromRow for $name {
            type Decoder = ::std::sync::Arc<$crate::plan::DecodePlan<$name>>;

            fn target_name() -> &'static str {
                <$name as $crate::entity::Entity>::NAME
            }

            fn make_decoder(
                reader: &dyn $crate::driver::RowReader,
            ) -> ::std::result::Result<Self::Decoder, $crate::error::SqlMapperError> {
                $crate::plan::plan_for::<$name>(reader)
            }

            fn decode(
                reader: &dyn $crate::driver::RowReader,
                decoder: &Self::Decoder,
            ) -> ::std::result::Result<Self, $crate::error::SqlMapperError> {
                $crate::plan::decode_row(reader, decoder)
            }
        }
    };
}

/// Define a database-mapped enum.
///
/// Variants may carry database names when the stored representation differs
/// from the identifier, and the enum may name its database type for drivers
/// that require a type hint:
///
/// ```rust
/// use sql_mapper::sql_enum;
///
/// sql_enum! {
///     pub enum Status as "status_kind" {
///         Active = "active",
///         Inactive = "inactive",
///     }
/// }
///
/// sql_enum! {
///     pub enum Color { Red, Green, Blue }
/// }
/// ```
///
/// Without a registered handler, a plain enum decodes from a string column by
/// case-insensitive identifier match or from an integer column by variant
/// position, and binds as its variant position. Registering an
/// [`crate::handler::EnumNameHandler`] (see
/// [`crate::handler::HandlerRegistry::register_enum`]) switches both
/// directions to the declared database names.
#[macro_export]
macro_rules! sql_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident as $dbty:literal {
            $first:ident = $firstdb:literal $(, $variant:ident = $dbname:literal)* $(,)?
        }
    ) => {
        $crate::sql_enum!(@build ($($meta)*) $vis $name
            (::std::option::Option::Some($dbty))
            ($first, ::std::option::Option::Some($firstdb))
            $(($variant, ::std::option::Option::Some($dbname)))*);
    };
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $first:ident = $firstdb:literal $(, $variant:ident = $dbname:literal)* $(,)?
        }
    ) => {
        $crate::sql_enum!(@build ($($meta)*) $vis $name
            (::std::option::Option::None)
            ($first, ::std::option::Option::Some($firstdb))
            $(($variant, ::std::option::Option::Some($dbname)))*);
    };
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $first:ident $(, $variant:ident)* $(,)?
        }
    ) => {
        $crate::sql_enum!(@build ($($meta)*) $vis $name
            (::std::option::Option::None)
            ($first, ::std::option::Option::None)
            $(($variant, ::std::option::Option::None))*);
    };

    (@build ($($meta:meta)*) $vis:vis $name:ident ($dbty:expr)
        ($first:ident, $firstdb:expr) $(($variant:ident, $dbname:expr))*) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $first
            $(, $variant)*
        }

        impl ::std::default::Default for $name {
            fn default() -> Self {
                $name::$first
            }
        }

        impl $crate::entity::SqlEnum for $name {
            const NAME: &'static str = stringify!($name);
            const DB_TYPE: ::std::option::Option<&'static str> = $dbty;
            const VARIANTS: &'static [$crate::entity::EnumVariant<Self>] = &[
                $crate::entity::EnumVariant {
                    ident: stringify!($first),
                    value: $name::$first,
                    db_name: $firstdb,
                },
                $(
                    $crate::entity::EnumVariant {
                        ident: stringify!($variant),
                        value: $name::$variant,
                        db_name: $dbname,
                    },
                )*
            ];
        }

        impl $crate::entity::SqlType for $name {
            fn type_info() -> $crate::entity::TypeInfo {
                $crate::entity::TypeInfo {
                    id: ::std::any::TypeId::of::<$name>(),
                    name: stringify!($name),
                    optional: false,
                    shape: $crate::entity::TypeShape::Enum {
                        parse: |raw| {
                            <$name as $crate::entity::SqlEnum>::from_sql(raw).map(|value| {
                                $crate::entity::FieldValue::Custom(::std::boxed::Box::new(value))
                            })
                        },
                    },
                }
            }
        }

        impl $crate::convert::FromFieldValue for $name {
            fn from_field(
                value: $crate::entity::FieldValue,
                context: &'static str,
            ) -> ::std::result::Result<Self, $crate::error::SqlMapperError> {
                match value {
                    $crate::entity::FieldValue::Null => {
                        ::std::result::Result::Ok(<Self as ::std::default::Default>::default())
                    }
                    $crate::entity::FieldValue::Custom(boxed) => boxed
                        .downcast::<Self>()
                        .map(|boxed| *boxed)
                        .map_err(|_| {
                            $crate::error::SqlMapperError::HandlerContract(::std::format!(
                                "handler produced a value of the wrong type for {} `{context}`",
                                stringify!($name),
                            ))
                        }),
                    $crate::entity::FieldValue::Sql(raw) => {
                        <Self as $crate::entity::SqlEnum>::from_sql(&raw)
                    }
                }
            }
        }

        impl $crate::decode::FromRow for $name {
            type Decoder = ();

            fn target_name() -> &'static str {
                stringify!($name)
            }

            fn make_decoder(
                _reader: &dyn $crate::driver::RowReader,
            ) -> ::std::result::Result<(), $crate::error::SqlMapperError> {
                ::std::result::Result::Ok(())
            }

            fn decode(
                reader: &dyn $crate::driver::RowReader,
                _decoder: &(),
            ) -> ::std::result::Result<Self, $crate::error::SqlMapperError> {
                $crate::decode::decode_scalar_row::<Self>(reader)
            }
        }

        impl ::std::convert::From<$name> for $crate::params::ParamValue {
            fn from(value: $name) -> Self {
                $crate::params::ParamValue::custom_with_fallback(value, |any| {
                    any.downcast_ref::<$name>().map(|value| {
                        $crate::value::SqlValue::Int(
                            <$name as $crate::entity::SqlEnum>::position(*value) as i64,
                        )
                    })
                })
            }
        }
    };
}
