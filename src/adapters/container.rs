//! In-process service container adapter.
//!
//! `ServiceContainer` implements the [`ServiceResolver`] port with a map of
//! singletons and factories keyed by type name. `ActionController` is a
//! [`Controller`] assembled from named closures, convenient for small apps and
//! tests where a full controller type is overkill.
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    core::{
        pattern::RouteParams,
        request::{RouteRequest, RouteResponse},
    },
    ports::service_resolver::{ActionError, ActionResult, Controller, ServiceResolver},
};

type Factory = Arc<dyn Fn() -> Arc<dyn Controller> + Send + Sync>;

#[derive(Clone)]
enum Registration {
    Singleton(Arc<dyn Controller>),
    Factory(Factory),
}

/// Type-name keyed controller registry.
#[derive(Clone, Default)]
pub struct ServiceContainer {
    services: HashMap<String, Registration>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared instance returned for every resolution.
    pub fn singleton(&mut self, type_name: impl Into<String>, controller: impl Controller + 'static) -> &mut Self {
        self.services
            .insert(type_name.into(), Registration::Singleton(Arc::new(controller)));
        self
    }

    /// Register a factory invoked on every resolution.
    pub fn factory<F, C>(&mut self, type_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Controller + 'static,
    {
        let factory: Factory = Arc::new(move || Arc::new(factory()) as Arc<dyn Controller>);
        self.services
            .insert(type_name.into(), Registration::Factory(factory));
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.services.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceResolver for ServiceContainer {
    fn resolve(&self, type_name: &str) -> Option<Arc<dyn Controller>> {
        match self.services.get(type_name)? {
            Registration::Singleton(controller) => Some(controller.clone()),
            Registration::Factory(factory) => Some(factory()),
        }
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.services.keys().collect();
        names.sort();
        f.debug_struct("ServiceContainer")
            .field("services", &names)
            .finish()
    }
}

type Action = Arc<dyn Fn(&RouteRequest, RouteResponse, &RouteParams) -> ActionResult + Send + Sync>;

/// A controller whose actions are closures registered by name.
#[derive(Clone, Default)]
pub struct ActionController {
    actions: HashMap<String, Action>,
}

impl ActionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&RouteRequest, RouteResponse, &RouteParams) -> ActionResult + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
}

impl Controller for ActionController {
    fn call(
        &self,
        action: &str,
        request: &RouteRequest,
        response: RouteResponse,
        params: &RouteParams,
    ) -> ActionResult {
        let handler = self
            .actions
            .get(action)
            .ok_or_else(|| ActionError::UnknownAction(action.to_string()))?;
        handler(request, response, params)
    }
}
