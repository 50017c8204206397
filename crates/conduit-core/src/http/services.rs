//! Request services.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::{BoundValue, bound, downcast};

/// Resolves services by type.
///
/// Values are keyed by the exact Rust type a handler asks for; a service
/// shared as `Arc<T>` is looked up under `TypeId::of::<Arc<T>>()`.
pub trait ServiceProvider: Send + Sync {
    /// The most recently registered service of `type_id`.
    fn get(&self, type_id: TypeId) -> Option<BoundValue>;

    /// Every registered service of `type_id`, in registration order.
    fn get_all(&self, type_id: TypeId) -> Vec<BoundValue>;

    /// Returns `true` if `type_id` can be resolved.
    fn is_service(&self, type_id: TypeId) -> bool;
}

/// Typed helpers over [`ServiceProvider`].
pub trait ServiceProviderExt: ServiceProvider {
    /// Resolves a `T`.
    fn resolve<T: 'static>(&self) -> Option<T> {
        self.get(TypeId::of::<T>()).and_then(|v| downcast(v).ok())
    }
}

impl<P: ServiceProvider + ?Sized> ServiceProviderExt for P {}

type ServiceFactory = Arc<dyn Fn() -> BoundValue + Send + Sync>;

/// A simple [`ServiceProvider`] backed by registered factories.
#[derive(Clone, Default)]
pub struct ServiceCollection {
    services: HashMap<TypeId, Vec<ServiceFactory>>,
    names: HashMap<TypeId, &'static str>,
}

impl ServiceCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shared singleton, resolvable as `Arc<T>`.
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.add_instance(service)
    }

    /// Registers a value that is cloned on every resolution.
    pub fn add_instance<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.add_factory(move || value.clone())
    }

    /// Registers a factory called on every resolution.
    pub fn add_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let id = TypeId::of::<T>();
        self.names.insert(id, type_name::<T>());
        self.services
            .entry(id)
            .or_default()
            .push(Arc::new(move || bound(factory())));
        self
    }

    /// Builder-style [`add_singleton`](Self::add_singleton).
    pub fn with_singleton<T: Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.add_singleton(service);
        self
    }

    /// Builder-style [`add_instance`](Self::add_instance).
    pub fn with_instance<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.add_instance(value);
        self
    }

    /// Number of registered service types.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Freezes the collection into a shareable provider.
    pub fn into_provider(self) -> Arc<dyn ServiceProvider> {
        Arc::new(self)
    }
}

impl ServiceProvider for ServiceCollection {
    fn get(&self, type_id: TypeId) -> Option<BoundValue> {
        self.services
            .get(&type_id)
            .and_then(|factories| factories.last())
            .map(|factory| factory())
    }

    fn get_all(&self, type_id: TypeId) -> Vec<BoundValue> {
        self.services
            .get(&type_id)
            .map(|factories| factories.iter().map(|f| f()).collect())
            .unwrap_or_default()
    }

    fn is_service(&self, type_id: TypeId) -> bool {
        self.services.contains_key(&type_id)
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("services", &self.names.values().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock(u64);

    #[test]
    fn test_singleton_resolves_as_arc() {
        let services = ServiceCollection::new().with_singleton(Arc::new(Clock(7)));
        assert!(services.is_service(TypeId::of::<Arc<Clock>>()));
        assert!(!services.is_service(TypeId::of::<Clock>()));
        let clock: Arc<Clock> = services.resolve().unwrap();
        assert_eq!(clock.0, 7);
    }

    #[test]
    fn test_get_all_keeps_registration_order() {
        let services = ServiceCollection::new()
            .with_instance(1_u32)
            .with_instance(2_u32);
        let all: Vec<u32> = services
            .get_all(TypeId::of::<u32>())
            .into_iter()
            .map(|v| downcast(v).unwrap())
            .collect();
        assert_eq!(all, [1, 2]);
        assert_eq!(services.resolve::<u32>(), Some(2));
    }
}
