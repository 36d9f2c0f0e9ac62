//! Ordered route storage with name and method indices.
use std::{collections::HashMap, sync::Arc};

use http::Method;

use crate::core::{
    error::{RoutingError, RoutingResult},
    pattern::MatchResult,
    route::Route,
};

/// Routes in registration order plus secondary indices.
///
/// Registration order is significant: when several routes for the same method
/// match a path, the one added first wins.
#[derive(Debug, Clone, Default)]
pub struct RouteCollection {
    routes: Vec<Arc<Route>>,
    by_name: HashMap<String, usize>,
    by_method: HashMap<Method, Vec<usize>>,
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. A name that is already taken is rejected and the
    /// collection is left untouched.
    pub fn add(&mut self, route: Route) -> RoutingResult<Arc<Route>> {
        if let Some(name) = route.name() {
            if self.by_name.contains_key(name) {
                return Err(RoutingError::DuplicateRouteName {
                    name: name.to_string(),
                });
            }
        }

        let index = self.routes.len();
        if let Some(name) = route.name() {
            self.by_name.insert(name.to_string(), index);
        }
        for method in route.methods() {
            self.by_method.entry(method.clone()).or_default().push(index);
        }

        tracing::debug!("Registered route #{} {}", index, route);
        let route = Arc::new(route);
        self.routes.push(route.clone());
        Ok(route)
    }

    /// Edit a registered route in place, keeping the name index consistent.
    /// Used by the registration builder while the router is still mutable.
    pub(crate) fn update<F>(&mut self, index: usize, edit: F) -> RoutingResult<Arc<Route>>
    where
        F: FnOnce(&mut Route),
    {
        let Some(slot) = self.routes.get_mut(index) else {
            return Err(RoutingError::RouteNotFound {
                method: Method::GET,
                path: format!("#{index}"),
            });
        };

        let mut route = Route::clone(slot);
        let old_name = route.name().map(str::to_string);
        edit(&mut route);
        let new_name = route.name().map(str::to_string);

        if new_name != old_name {
            if let Some(name) = &new_name {
                if self.by_name.contains_key(name) {
                    return Err(RoutingError::DuplicateRouteName { name: name.clone() });
                }
            }
            if let Some(name) = &old_name {
                self.by_name.remove(name);
            }
            if let Some(name) = new_name {
                self.by_name.insert(name, index);
            }
        }

        let route = Arc::new(route);
        *slot = route.clone();
        Ok(route)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<Route>> {
        self.by_name.get(name).map(|&i| &self.routes[i])
    }

    /// Routes registered for `method`, in registration order.
    pub fn get_by_method<'a>(&'a self, method: &Method) -> impl Iterator<Item = &'a Arc<Route>> + 'a {
        self.by_method
            .get(method)
            .into_iter()
            .flatten()
            .map(move |&i| &self.routes[i])
    }

    pub fn all(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Methods that have at least one route.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.by_method.keys()
    }

    /// First route for `method` whose pattern matches `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<(Arc<Route>, MatchResult)> {
        self.get_by_method(method).find_map(|route| {
            let result = route.matches(path);
            result.is_match().then(|| (route.clone(), result))
        })
    }

    /// Every method (in registration order) of routes matching `path`.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut allowed: Vec<Method> = Vec::new();
        for route in self.routes.iter().filter(|r| r.matches(path).is_match()) {
            for method in route.methods() {
                if !allowed.contains(method) {
                    allowed.push(method.clone());
                }
            }
        }
        allowed
    }
}
