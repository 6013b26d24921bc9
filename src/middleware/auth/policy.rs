//! Route policy registry.
//!
//! Every application route declares how much authentication it needs when it is
//! registered. The declaration is resolved once and recorded in a
//! [`RoutePolicyRegistry`], keyed by `(method, path)`. The gate layer of each path reads
//! its policy from that frozen registry; nothing is recomputed per request.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::{
    Router,
    handler::Handler,
    http::Method,
    middleware,
    routing::{MethodFilter, MethodRouter},
};

use crate::middleware::auth::gate::{GateState, auth_gate};
use crate::services::auth::SessionResolver;

/// Authentication requirement of one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoutePolicy {
    /// A session must be present; the handler always sees one.
    #[default]
    Required,
    /// A session is looked up but its absence never rejects.
    Optional,
    /// No lookup at all.
    Public,
}

impl RoutePolicy {
    /// Collapses the markers declared on one route.
    ///
    /// The explicit opt-out wins: `Public` over `Optional` over `Required`, so a route
    /// inside an otherwise guarded group can be carved out. No marker means `Required`.
    pub fn from_markers(markers: &[PolicyMarker]) -> Self {
        if markers.contains(&PolicyMarker::Public) {
            RoutePolicy::Public
        } else if markers.contains(&PolicyMarker::Optional) {
            RoutePolicy::Optional
        } else {
            RoutePolicy::Required
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutePolicy::Required => "required",
            RoutePolicy::Optional => "optional",
            RoutePolicy::Public => "public",
        }
    }
}

impl fmt::Display for RoutePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker attached to a route at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMarker {
    Public,
    Optional,
    Required,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("route {method} {path} registered more than once")]
    Duplicate { method: Method, path: String },
    #[error("method {0} cannot be routed")]
    UnsupportedMethod(Method),
}

/// Read-only after startup; shared by every gate layer.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicyRegistry {
    entries: BTreeMap<(String, String), RoutePolicy>,
}

impl RoutePolicyRegistry {
    /// Policy of a registered `(method, path)` route; unannotated routes are `Required`.
    ///
    /// `HEAD` falls back to the `GET` declaration of the same path, mirroring how the
    /// router serves it.
    pub fn policy_of(&self, method: &Method, path: &str) -> RoutePolicy {
        let lookup = |method: &Method| {
            self.entries
                .get(&(path.to_string(), method.as_str().to_string()))
                .copied()
        };

        match lookup(method) {
            Some(policy) => policy,
            None if *method == Method::HEAD => lookup(&Method::GET).unwrap_or_default(),
            None => RoutePolicy::default(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, RoutePolicy)> {
        self.entries
            .iter()
            .map(|((path, method), policy)| (path.as_str(), method.as_str(), *policy))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(
        &mut self,
        method: &Method,
        path: &str,
        policy: RoutePolicy,
    ) -> Result<(), PolicyError> {
        let key = (path.to_string(), method.as_str().to_string());
        if self.entries.contains_key(&key) {
            return Err(PolicyError::Duplicate {
                method: method.clone(),
                path: path.to_string(),
            });
        }
        self.entries.insert(key, policy);
        Ok(())
    }
}

/// Router builder that records each route's policy and wraps every path in the gate.
///
/// Routes are collected first; `finish` freezes the registry and attaches one gate
/// layer per path, which reads the policy of the matched method from that registry.
///
/// ```ignore
/// let (router, policies) = PolicyRouter::new(resolver)
///     .public(Method::GET, "/health", health)
///     .optional(Method::GET, "/feed", feed)
///     .required(Method::GET, "/me", me)
///     .finish()?;
/// ```
pub struct PolicyRouter<S> {
    routes: BTreeMap<String, MethodRouter<S>>,
    registry: RoutePolicyRegistry,
    resolver: Arc<dyn SessionResolver>,
    error: Option<PolicyError>,
}

impl<S> PolicyRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(resolver: Arc<dyn SessionResolver>) -> Self {
        Self {
            routes: BTreeMap::new(),
            registry: RoutePolicyRegistry::default(),
            resolver,
            error: None,
        }
    }

    pub fn route<H, T>(
        mut self,
        method: Method,
        path: &str,
        handler: H,
        markers: &[PolicyMarker],
    ) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        if self.error.is_some() {
            return self;
        }

        let filter = match MethodFilter::try_from(method.clone()) {
            Ok(filter) => filter,
            Err(_) => {
                self.error = Some(PolicyError::UnsupportedMethod(method));
                return self;
            }
        };

        let policy = RoutePolicy::from_markers(markers);
        if let Err(err) = self.registry.insert(&method, path, policy) {
            self.error = Some(err);
            return self;
        }

        let method_router = self.routes.remove(path).unwrap_or_else(MethodRouter::new);
        self.routes
            .insert(path.to_string(), method_router.on(filter, handler));
        self
    }

    pub fn public<H, T>(self, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.route(method, path, handler, &[PolicyMarker::Public])
    }

    pub fn optional<H, T>(self, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.route(method, path, handler, &[PolicyMarker::Optional])
    }

    pub fn required<H, T>(self, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.route(method, path, handler, &[PolicyMarker::Required])
    }

    pub fn finish(self) -> Result<(Router<S>, Arc<RoutePolicyRegistry>), PolicyError> {
        let Self {
            routes,
            registry,
            resolver,
            error,
        } = self;
        if let Some(err) = error {
            return Err(err);
        }

        let registry = Arc::new(registry);
        let router = routes
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| {
                let gate = GateState::new(&path, registry.clone(), resolver.clone());
                // route_layer: the gate only runs once a method actually matched.
                let guarded =
                    method_router.route_layer(middleware::from_fn_with_state(gate, auth_gate));
                router.route(&path, guarded)
            });

        Ok((router, registry))
    }
}
