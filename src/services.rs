//! # Services Module
//!
//! Service resolution for route handlers.
//!
//! Routes declare the dependencies their handler needs as
//! name → [`ServiceDescriptor`] pairs. Before the handler runs, the pipeline
//! asks a [`ServiceResolver`] for each descriptor and hands the results to the
//! handler as [`ResolvedServices`].
//!
//! [`ServiceRegistry`] is the bundled resolver: a factory table keyed by
//! service name with three lifetimes.
//!
//! | Lifetime    | Instance                                      |
//! |-------------|-----------------------------------------------|
//! | `Singleton` | one instance shared by every request          |
//! | `Scoped`    | one instance per request, shared within it    |
//! | `Transient` | a fresh instance for every resolution         |
//!
//! ```rust
//! use schemaroute::services::{ServiceDescriptor, ServiceRegistry, ServiceResolver, ServiceScope};
//!
//! struct Clock;
//!
//! let registry = ServiceRegistry::new().transient("clock", || Ok(Clock));
//! let mut scope = ServiceScope::default();
//! let clock = registry.resolve(&ServiceDescriptor::of::<Clock>("clock"), &mut scope);
//! assert!(clock.is_ok());
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Type-erased service instance.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// What to resolve: a registry key plus the Rust type expected back.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    key: String,
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceDescriptor {
    /// Descriptor for a service of type `T` registered under `key`.
    pub fn of<T: Any + Send + Sync>(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.key, self.type_name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Unknown dependency: {0}")]
    Unknown(String),
    #[error("Dependency {key} is registered as {registered}, not {requested}")]
    TypeMismatch {
        key: String,
        registered: &'static str,
        requested: &'static str,
    },
    #[error("Could not construct dependency {key}")]
    Factory {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Per-request cache for scoped services.
#[derive(Default)]
pub struct ServiceScope {
    instances: HashMap<String, ServiceInstance>,
}

impl ServiceScope {
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Resolves descriptors to instances. Called synchronously, once per declared
/// service, from many requests at once.
pub trait ServiceResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ResolveError`] for unknown or mistyped dependencies and
    /// failing factories.
    fn resolve(
        &self,
        descriptor: &ServiceDescriptor,
        scope: &mut ServiceScope,
    ) -> Result<ServiceInstance, ResolveError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Singleton,
    Scoped,
    Transient,
}

type Factory = Arc<dyn Fn() -> anyhow::Result<ServiceInstance> + Send + Sync>;

struct Registration {
    lifetime: Lifetime,
    type_id: TypeId,
    type_name: &'static str,
    singleton: Option<ServiceInstance>,
    factory: Option<Factory>,
}

/// Factory-table resolver.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: HashMap<String, Registration>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ready-made instance shared by every request.
    #[must_use]
    pub fn singleton<T: Any + Send + Sync>(mut self, key: impl Into<String>, instance: T) -> Self {
        self.entries.insert(
            key.into(),
            Registration {
                lifetime: Lifetime::Singleton,
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                singleton: Some(Arc::new(instance)),
                factory: None,
            },
        );
        self
    }

    /// Register a factory invoked once per request.
    #[must_use]
    pub fn scoped<T, F>(self, key: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.with_factory(key, Lifetime::Scoped, factory)
    }

    /// Register a factory invoked on every resolution.
    #[must_use]
    pub fn transient<T, F>(self, key: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.with_factory(key, Lifetime::Transient, factory)
    }

    fn with_factory<T, F>(mut self, key: impl Into<String>, lifetime: Lifetime, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let erased: Factory = Arc::new(move || factory().map(|v| Arc::new(v) as ServiceInstance));
        self.entries.insert(
            key.into(),
            Registration {
                lifetime,
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                singleton: None,
                factory: Some(erased),
            },
        );
        self
    }

    #[must_use]
    pub fn lifetime(&self, key: &str) -> Option<Lifetime> {
        self.entries.get(key).map(|r| r.lifetime)
    }
}

impl ServiceResolver for ServiceRegistry {
    fn resolve(
        &self,
        descriptor: &ServiceDescriptor,
        scope: &mut ServiceScope,
    ) -> Result<ServiceInstance, ResolveError> {
        let key = descriptor.key();
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| ResolveError::Unknown(key.to_string()))?;
        if entry.type_id != descriptor.type_id {
            return Err(ResolveError::TypeMismatch {
                key: key.to_string(),
                registered: entry.type_name,
                requested: descriptor.type_name,
            });
        }

        if let Some(instance) = &entry.singleton {
            return Ok(Arc::clone(instance));
        }
        if entry.lifetime == Lifetime::Scoped {
            if let Some(instance) = scope.instances.get(key) {
                return Ok(Arc::clone(instance));
            }
        }

        let factory = entry
            .factory
            .as_ref()
            .ok_or_else(|| ResolveError::Unknown(key.to_string()))?;
        let instance = factory().map_err(|source| ResolveError::Factory {
            key: key.to_string(),
            source,
        })?;
        if entry.lifetime == Lifetime::Scoped {
            scope.instances.insert(key.to_string(), Arc::clone(&instance));
        }
        Ok(instance)
    }
}

/// Resolver bound to one request's [`ServiceScope`].
///
/// Handed to handlers for ad-hoc lookups. Scoped services come back as the
/// same instances the route's declared services were resolved to.
pub struct RequestContainer {
    resolver: Arc<dyn ServiceResolver>,
    scope: Mutex<ServiceScope>,
}

impl RequestContainer {
    #[must_use]
    pub fn new(resolver: Arc<dyn ServiceResolver>, scope: ServiceScope) -> Self {
        Self {
            resolver,
            scope: Mutex::new(scope),
        }
    }

    /// # Errors
    ///
    /// Whatever the underlying resolver reports.
    pub fn resolve(&self, descriptor: &ServiceDescriptor) -> Result<ServiceInstance, ResolveError> {
        let mut scope = self.scope.lock().unwrap_or_else(PoisonError::into_inner);
        self.resolver.resolve(descriptor, &mut scope)
    }

    /// Typed lookup of the service registered under `key`.
    ///
    /// # Errors
    ///
    /// As [`RequestContainer::resolve`], plus [`ResolveError::TypeMismatch`]
    /// when the resolver hands back another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, ResolveError> {
        let descriptor = ServiceDescriptor::of::<T>(key);
        self.resolve(&descriptor)?
            .downcast::<T>()
            .map_err(|_| ResolveError::TypeMismatch {
                key: key.to_string(),
                registered: "another type",
                requested: descriptor.type_name,
            })
    }
}

impl fmt::Debug for RequestContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self.scope.lock().map_or(0, |scope| scope.len());
        f.debug_struct("RequestContainer").field("scoped", &cached).finish()
    }
}

/// Services handed to a handler, keyed by the route's declared names.
#[derive(Default, Clone)]
pub struct ResolvedServices {
    instances: HashMap<String, ServiceInstance>,
}

impl ResolvedServices {
    pub(crate) fn insert(&mut self, name: String, instance: ServiceInstance) {
        self.instances.insert(name, instance);
    }

    /// Typed access; `None` when `name` was not declared or has another type.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.instances
            .get(name)
            .and_then(|i| Arc::clone(i).downcast::<T>().ok())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl fmt::Debug for ResolvedServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.instances.keys()).finish()
    }
}
