//! Dependency Container (C13).
//!
//! A lazy service registry: eager singletons via `register`, lazy
//! singletons via `register_factory` (the factory runs at most once,
//! on first `get`), lookup by interface name via `get`, and ordered
//! cleanup via `shutdown`. Instance storage is a lock-free
//! `DashMap<String, Arc<dyn Any + Send + Sync>>` so concurrent `get`
//! calls for already-resolved services never contend on a mutex,
//! mirroring the lazy-registry idiom used for connection pools
//! elsewhere in the corpus.
//!
//! Registration order is tracked separately so `shutdown` can run
//! cleanup hooks in reverse order, per spec.md §4.13/§5.

use crate::error::{Error, Result};
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::sync::Arc;
use std::sync::Mutex;

type Factory = Box<dyn FnOnce() -> Arc<dyn Any + Send + Sync> + Send>;
type ShutdownHook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Lazy, typed-by-name service registry with ordered shutdown hooks.
pub struct Container {
    instances: DashMap<String, Arc<dyn Any + Send + Sync>>,
    factories: Mutex<std::collections::HashMap<String, Factory>>,
    registration_order: Mutex<Vec<String>>,
    shutdown_hooks: Mutex<Vec<(String, ShutdownHook)>>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
            factories: Mutex::new(std::collections::HashMap::new()),
            registration_order: Mutex::new(Vec::new()),
            shutdown_hooks: Mutex::new(Vec::new()),
        }
    }

    fn note_registration(&self, interface: &str) {
        let mut order = self
            .registration_order
            .lock()
            .expect("container registration_order mutex poisoned");
        if !order.iter().any(|existing| existing == interface) {
            order.push(interface.to_string());
        }
    }

    /// Register an already-constructed singleton under `interface`.
    pub fn register<T: Any + Send + Sync>(&self, interface: impl Into<String>, instance: T) {
        let interface = interface.into();
        self.instances.insert(interface.clone(), Arc::new(instance));
        self.note_registration(&interface);
    }

    /// Register a factory that is invoked at most once, on the first
    /// `get` for `interface`. Subsequent calls return the cached
    /// instance; the factory itself is dropped after it runs.
    pub fn register_factory<T, F>(&self, interface: impl Into<String>, factory: F)
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T + Send + 'static,
    {
        let interface = interface.into();
        let boxed: Factory = Box::new(move || Arc::new(factory()) as Arc<dyn Any + Send + Sync>);
        self.factories
            .lock()
            .expect("container factories mutex poisoned")
            .insert(interface.clone(), boxed);
        self.note_registration(&interface);
    }

    /// Register a cleanup hook to run during `shutdown`, in reverse
    /// registration order relative to other hooks.
    pub fn register_shutdown_hook<F, Fut>(&self, interface: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let interface = interface.into();
        let boxed: ShutdownHook = Box::new(move || Box::pin(hook()));
        self.shutdown_hooks
            .lock()
            .expect("container shutdown_hooks mutex poisoned")
            .push((interface, boxed));
    }

    /// Resolve `interface`, running its factory if this is the first
    /// call and no eager instance was registered. Returns
    /// `Error::unknown_service` if neither an instance nor a factory
    /// is registered.
    pub fn get<T: Any + Send + Sync + Clone>(&self, interface: &str) -> Result<T> {
        self.resolve(interface)?
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| Error::internal(format!("service '{interface}' registered under the wrong type")))
    }

    /// Resolve `interface` as a shared `Arc<T>` without requiring
    /// `T: Clone`. Prefer this for services stored behind `Arc` already
    /// (repositories, clients) to avoid a pointless clone-of-the-inner-value.
    pub fn get_arc<T: Any + Send + Sync>(&self, interface: &str) -> Result<Arc<T>> {
        let any = self.resolve(interface)?;
        any.downcast::<T>()
            .map_err(|_| Error::internal(format!("service '{interface}' registered under the wrong type")))
    }

    fn resolve(&self, interface: &str) -> Result<Arc<dyn Any + Send + Sync>> {
        if let Some(existing) = self.instances.get(interface) {
            return Ok(existing.clone());
        }

        let factory = self
            .factories
            .lock()
            .expect("container factories mutex poisoned")
            .remove(interface);

        match factory {
            Some(factory) => {
                let instance = factory();
                self.instances.insert(interface.to_string(), instance.clone());
                Ok(instance)
            }
            None => Err(Error::unknown_service(interface)),
        }
    }

    pub fn is_registered(&self, interface: &str) -> bool {
        self.instances.contains_key(interface)
            || self
                .factories
                .lock()
                .expect("container factories mutex poisoned")
                .contains_key(interface)
    }

    /// Run every registered shutdown hook in reverse registration
    /// order. A failing (panicking) hook is caught and logged; it does
    /// not prevent subsequent hooks from running.
    pub async fn shutdown(&self) {
        let mut hooks = self
            .shutdown_hooks
            .lock()
            .expect("container shutdown_hooks mutex poisoned")
            .drain(..)
            .collect::<Vec<_>>();
        hooks.reverse();

        for (interface, hook) in hooks {
            let future = hook();
            let outcome = std::panic::AssertUnwindSafe(future).catch_unwind().await;
            if outcome.is_err() {
                tracing::warn!(interface = %interface, "shutdown hook panicked, continuing");
            }
        }
    }
}
