use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::error::WindowError;

/// Type-keyed service map shared by the factory, controllers and handlers.
///
/// Each service type is stored once as an `Arc<T>`; trait objects are stored
/// as `Arc<dyn Trait>` by registering the `dyn Trait` type itself. Cloning the
/// container shares the same map.
#[derive(Clone, Default)]
pub struct ServiceContainer {
    inner: Arc<RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T>(&self, service: Arc<T>) -> Result<(), ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let type_id = TypeId::of::<T>();
        if guard.contains_key(&type_id) {
            return Err(ContainerError::AlreadyRegistered(std::any::type_name::<T>()));
        }
        guard.insert(type_id, Box::new(service));
        Ok(())
    }

    /// Inserts or replaces the service of type `T`.
    pub fn replace<T>(&self, service: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), Box::new(service));
    }

    pub fn get<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let boxed = guard
            .get(&TypeId::of::<T>())
            .ok_or(ContainerError::Missing(std::any::type_name::<T>()))?;
        boxed
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(ContainerError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Optional services resolve to `None` instead of an error.
    pub fn try_get<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get::<T>().ok()
    }

    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }

    pub fn get_or_insert_with<T, F>(&self, make: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Ok(service) = self.get::<T>() {
            return service;
        }
        let service = Arc::new(make());
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let entry = guard
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(service.clone()));
        // a concurrent insert may have won the race
        entry.downcast_ref::<Arc<T>>().cloned().unwrap_or(service)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("service {0} already registered")]
    AlreadyRegistered(&'static str),
    #[error("service {0} not registered")]
    Missing(&'static str),
    #[error("service {0} has unexpected type")]
    TypeMismatch(&'static str),
}

impl From<ContainerError> for WindowError {
    fn from(err: ContainerError) -> Self {
        WindowError::ServiceUnavailable(err.to_string())
    }
}
