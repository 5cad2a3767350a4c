//! Declarative endpoint registry (`spec.md` §3/§4.3, component C4).

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Method;

use crate::content_type::ContentType;
use crate::error::RenkonError;
use crate::id::{EndpointId, ResponseId};
use crate::message::{Context, Request, ResponseEnvelope};
use crate::path::Path;

/// Boxed future returned by a [`ResponseFactory`].
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// `(Request, Context) -> Response | throws`, per `spec.md` §3.
///
/// Both static responses (content fixed at declaration) and dynamic ones
/// (computed from the request) are represented uniformly as a factory
/// closure: a static response is simply a closure that ignores its
/// arguments and clones a captured [`ResponseEnvelope`].
pub type ResponseFactory =
    Arc<dyn Fn(Request, Context) -> BoxFuture<Result<ResponseEnvelope, RenkonError>> + Send + Sync>;

/// Build a [`ResponseFactory`] for a response whose content never changes.
pub fn static_response(response: ResponseEnvelope) -> ResponseFactory {
    Arc::new(move |_req, _ctx| {
        let response = response.clone();
        Box::pin(async move { Ok(response) })
    })
}

/// Build a [`ResponseFactory`] from an async closure given `(Request, Context)`.
pub fn dynamic_response<F, Fut>(factory: F) -> ResponseFactory
where
    F: Fn(Request, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResponseEnvelope, RenkonError>> + Send + 'static,
{
    Arc::new(move |req, ctx| Box::pin(factory(req, ctx)))
}

/// A declared, immutable-once-registered endpoint.
#[derive(Clone)]
pub struct Endpoint {
    pub id: EndpointId,
    pub path: Path,
    pub method: Method,
    pub description: String,
    pub request_content_type: ContentType,
    pub response_content_type: ContentType,
    responses: BTreeMap<String, ResponseFactory>,
}

impl Endpoint {
    /// Resolve a registered response by id.
    pub fn response(&self, id: &ResponseId) -> Option<&ResponseFactory> {
        self.responses.get(id.as_str())
    }

    /// Iterate over registered response ids (diagnostics).
    pub fn response_ids(&self) -> impl Iterator<Item = &str> {
        self.responses.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("path", &self.path.as_str())
            .field("responses", &self.responses.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for a single [`Endpoint`].
///
/// `Endpoint::id` defaults to `"<METHOD>-<path-string>"` when not overridden
/// via [`id`](Self::id), which is what produces the Endpoint Identity
/// Invariant: two endpoints registered with the same (method, path) and no
/// explicit id collide, and [`EndpointRegistry::register`] rejects the
/// second one.
pub struct EndpointBuilder {
    id: Option<EndpointId>,
    path: Path,
    method: Method,
    description: String,
    request_content_type: ContentType,
    response_content_type: ContentType,
    responses: BTreeMap<String, ResponseFactory>,
}

impl EndpointBuilder {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: None,
            path: Path::new(path),
            method,
            description: String::new(),
            request_content_type: ContentType::Json,
            response_content_type: ContentType::Json,
            responses: BTreeMap::new(),
        }
    }

    /// Convenience constructor for a JSON endpoint (the common case).
    pub fn json(method: Method, path: impl Into<String>) -> Self {
        Self::new(method, path)
    }

    pub fn id(mut self, id: impl Into<EndpointId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.request_content_type = content_type;
        self.response_content_type = content_type;
        self
    }

    pub fn request_content_type(mut self, content_type: ContentType) -> Self {
        self.request_content_type = content_type;
        self
    }

    pub fn response_content_type(mut self, content_type: ContentType) -> Self {
        self.response_content_type = content_type;
        self
    }

    /// Register a static response under `id`.
    pub fn static_response(mut self, id: impl Into<String>, response: ResponseEnvelope) -> Self {
        self.responses
            .insert(id.into(), static_response(response));
        self
    }

    /// Register a dynamic response factory under `id`.
    pub fn response(mut self, id: impl Into<String>, factory: ResponseFactory) -> Self {
        self.responses.insert(id.into(), factory);
        self
    }

    pub fn build(self) -> Endpoint {
        let id = self
            .id
            .unwrap_or_else(|| EndpointId::new(format!("{}-{}", self.method, self.path.as_str())));
        Endpoint {
            id,
            path: self.path,
            method: self.method,
            description: self.description,
            request_content_type: self.request_content_type,
            response_content_type: self.response_content_type,
            responses: self.responses,
        }
    }
}

/// The registry of declared endpoints, frozen after `Server::run()` (see
/// `spec.md` §4.7/§5).
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    by_id: BTreeMap<String, Endpoint>,
    by_method_and_path: BTreeMap<(Method, String), String>,
    /// Registration order, since [`PathMatcher`](crate::path::PathMatcher)
    /// routing is first-registered-wins and a `BTreeMap` alone would
    /// silently re-sort endpoints alphabetically by id.
    order: Vec<String>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint. Fails if another endpoint shares its
    /// (method, path) pair: the Endpoint Identity Invariant.
    pub fn register(&mut self, endpoint: Endpoint) -> Result<(), String> {
        let key = (endpoint.method.clone(), endpoint.path.as_str().to_string());
        if let Some(existing_id) = self.by_method_and_path.get(&key) {
            return Err(format!(
                "endpoint identity collision: '{}' and '{}' both target {} {}",
                existing_id,
                endpoint.id,
                endpoint.method,
                endpoint.path
            ));
        }
        self.by_method_and_path
            .insert(key, endpoint.id.as_str().to_string());
        self.order.push(endpoint.id.as_str().to_string());
        self.by_id.insert(endpoint.id.as_str().to_string(), endpoint);
        Ok(())
    }

    pub fn get(&self, id: &EndpointId) -> Option<&Endpoint> {
        self.by_id.get(id.as_str())
    }

    /// Iterate over endpoints in registration order: the order that
    /// matters for [`PathMatcher`](crate::path::PathMatcher) priority.
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.order.iter().filter_map(move |id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
