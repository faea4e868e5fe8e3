//! Type-handler registry: the single source of truth for custom conversions.
//!
//! Both the parameter binder and the row decoder consult the registry before
//! any built-in conversion, so a handler registered for an enumerated type is
//! never silently bypassed. Decode plans carry the registry version at which
//! they were built; any insert, replace, or clear bumps the version and
//! invalidates dependent plans on their next use.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::driver::Parameter;
use crate::entity::SqlEnum;
use crate::error::SqlMapperError;
use crate::value::{DbTypeHint, SqlValue};

/// User-registered conversion pair for a specific target type.
///
/// `set_parameter` writes a value into a driver parameter and chooses the
/// driver type hint; `parse` turns a raw driver value into an instance of the
/// target type, boxed for the type-erased decode path.
pub trait TypeHandler: Send + Sync {
    /// `TypeId` of the target type this handler converts.
    fn target(&self) -> TypeId;

    /// Name of the target type, for diagnostics.
    fn target_name(&self) -> &'static str;

    fn set_parameter(
        &self,
        parameter: &mut dyn Parameter,
        value: &dyn Any,
    ) -> Result<(), SqlMapperError>;

    fn parse(&self, raw: SqlValue) -> Result<Box<dyn Any + Send>, SqlMapperError>;
}

static GLOBAL: LazyLock<HandlerRegistry> = LazyLock::new(HandlerRegistry::new);

/// Concurrent mapping from target type to handler, with a monotonic version
/// counter used as the staleness token for decode plans.
pub struct HandlerRegistry {
    handlers: DashMap<TypeId, Arc<dyn TypeHandler>>,
    version: AtomicU64,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            version: AtomicU64::new(0),
        }
    }

    /// The process-wide registry used by the query facade and decoder.
    #[must_use]
    pub fn global() -> &'static HandlerRegistry {
        &GLOBAL
    }

    /// Register or replace the handler for `T`.
    ///
    /// # Errors
    ///
    /// Returns `HandlerContract` if the handler's declared target is not `T`.
    pub fn register<T: Any>(
        &self,
        handler: Arc<dyn TypeHandler>,
    ) -> Result<(), SqlMapperError> {
        if handler.target() != TypeId::of::<T>() {
            return Err(SqlMapperError::HandlerContract(format!(
                "handler for {} registered under a different target type",
                handler.target_name()
            )));
        }
        self.register_dyn(TypeId::of::<T>(), handler);
        Ok(())
    }

    /// Register or replace a handler under a runtime type id.
    pub fn register_dyn(&self, target: TypeId, handler: Arc<dyn TypeHandler>) {
        // Bump the version before the entry becomes visible, so a reader that
        // observes the new handler observes a version at least as new.
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(target_type = handler.target_name(), version, "handler registered");
        self.handlers.insert(target, handler);
    }

    /// Build an [`EnumNameHandler`] for `E` and register it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntity` if any variant of `E` lacks a database name.
    pub fn register_enum<E: SqlEnum>(&self) -> Result<(), SqlMapperError> {
        let handler = EnumNameHandler::<E>::new()?;
        self.register::<E>(Arc::new(handler))
    }

    /// Non-blocking handler lookup.
    #[must_use]
    pub fn try_get(&self, target: TypeId) -> Option<Arc<dyn TypeHandler>> {
        self.handlers.get(&target).map(|entry| entry.value().clone())
    }

    /// Typed handler lookup.
    #[must_use]
    pub fn handler_for<T: Any>(&self) -> Option<Arc<dyn TypeHandler>> {
        self.try_get(TypeId::of::<T>())
    }

    /// Remove all handlers.
    pub fn clear(&self) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(version, "handler registry cleared");
        self.handlers.clear();
    }

    /// Current registry version. Plans stamped with an older version are
    /// rebuilt on their next use.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

/// Handler mapping an enum to per-variant database names.
///
/// Construction builds the bidirectional lookup from the [`SqlEnum`] variant
/// table and fails fast when any variant lacks its database-name annotation.
pub struct EnumNameHandler<E: SqlEnum> {
    names: Vec<(E, &'static str)>,
    db_type: Option<&'static str>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: SqlEnum> std::fmt::Debug for EnumNameHandler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnumNameHandler")
            .field("db_type", &self.db_type)
            .field("variant_count", &self.names.len())
            .finish()
    }
}

impl<E: SqlEnum> EnumNameHandler<E> {
    /// # Errors
    ///
    /// Returns `InvalidEntity` if any variant of `E` lacks a database name.
    pub fn new() -> Result<Self, SqlMapperError> {
        let mut names = Vec::with_capacity(E::VARIANTS.len());
        for variant in E::VARIANTS {
            let Some(db_name) = variant.db_name else {
                return Err(SqlMapperError::invalid_entity(
                    E::NAME,
                    format!("variant {} has no database-name annotation", variant.ident),
                ));
            };
            names.push((variant.value, db_name));
        }
        Ok(Self {
            names,
            db_type: E::DB_TYPE,
            _marker: PhantomData,
        })
    }

    fn db_name(&self, value: E) -> Option<&'static str> {
        self.names
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, name)| *name)
    }
}

impl<E: SqlEnum + Any> TypeHandler for EnumNameHandler<E> {
    fn target(&self) -> TypeId {
        TypeId::of::<E>()
    }

    fn target_name(&self) -> &'static str {
        E::NAME
    }

    fn set_parameter(
        &self,
        parameter: &mut dyn Parameter,
        value: &dyn Any,
    ) -> Result<(), SqlMapperError> {
        let Some(value) = value.downcast_ref::<E>() else {
            return Err(SqlMapperError::HandlerContract(format!(
                "enum handler for {} received a value of another type",
                E::NAME
            )));
        };
        let Some(name) = self.db_name(*value) else {
            return Err(SqlMapperError::HandlerContract(format!(
                "enum handler for {} has no name for the bound variant",
                E::NAME
            )));
        };
        parameter.set_value(SqlValue::Text(name.to_string()));
        if let Some(db_type) = self.db_type {
            parameter.set_type_hint(DbTypeHint::Named(db_type.to_string()));
        }
        Ok(())
    }

    fn parse(&self, raw: SqlValue) -> Result<Box<dyn Any + Send>, SqlMapperError> {
        match raw {
            SqlValue::Text(s) => self
                .names
                .iter()
                .find(|(_, name)| *name == s)
                .map(|(value, _)| Box::new(*value) as Box<dyn Any + Send>)
                .ok_or_else(|| {
                    SqlMapperError::HandlerContract(format!(
                        "no variant of {} stored as `{s}`",
                        E::NAME
                    ))
                }),
            other => Err(SqlMapperError::HandlerContract(format!(
                "enum handler for {} expected a text column, got {}",
                E::NAME,
                other.kind()
            ))),
        }
    }
}
