//! The server façade (`spec.md` §4.7, component C9): a builder that collects
//! endpoints, action types, and scenarios, then serves them over HTTP.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::{HeaderName, Method, StatusCode};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::action::{Action, ActionTable};
use crate::content_type::{ContentType, ProtobufVariant};
use crate::endpoint::{Endpoint, EndpointRegistry};
use crate::error::RenkonError;
use crate::id::{ActionId, EndpointId, ScenarioId};
use crate::message::{Context, Request as RenkonRequest};
use crate::middleware::{resolve_scenario, resolve_session};
use crate::path::PathMatcher;
use crate::pipeline::PipelineEngine;
use crate::scenario::{Scenario, ScenarioRegistry};

/// Shared, cloneable application state threaded through axum extractors.
///
/// `endpoints` and `actions` are frozen the moment [`Server::run`] installs
/// routes; `scenarios` stays mutable for the lifetime of the server, since
/// `spec.md` §4.7 allows scenario registration at any time.
///
/// `routes` is Renkon's own [`PathMatcher`] table, one per HTTP method,
/// rather than axum's built-in router: axum's route syntax and
/// first-match semantics don't line up with `spec.md` §4.1's
/// first-registered-wins, catch-all-aware path language, so every request
/// is matched through a single axum fallback instead.
#[derive(Clone)]
pub struct AppState {
    pub endpoints: Arc<EndpointRegistry>,
    pub scenarios: ScenarioRegistry,
    pub actions: Arc<ActionTable>,
    pub pipeline: Arc<PipelineEngine>,
    pub(crate) routes: Arc<BTreeMap<String, PathMatcher<EndpointId>>>,
}

fn build_route_table(endpoints: &EndpointRegistry) -> BTreeMap<String, PathMatcher<EndpointId>> {
    let mut table: BTreeMap<String, PathMatcher<EndpointId>> = BTreeMap::new();
    for endpoint in endpoints.iter() {
        table
            .entry(endpoint.method.as_str().to_string())
            .or_default()
            .register(endpoint.path.as_str(), endpoint.id.clone());
    }
    table
}

/// Builder and runtime façade for a Renkon mock server.
///
/// Endpoint and action registration ([`add_endpoint`](Self::add_endpoint),
/// [`add_action`](Self::add_action)) are rejected once [`run`](Self::run) has
/// installed routes: `spec.md` §4.7's one-time route installation
/// invariant. Scenario registration has no such restriction and may be
/// called before, during, or after `run()`.
pub struct Server {
    endpoints: EndpointRegistry,
    actions: ActionTable,
    scenarios: ScenarioRegistry,
    running: Arc<AtomicBool>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self {
            endpoints: EndpointRegistry::new(),
            actions: ActionTable::with_builtins(),
            scenarios: ScenarioRegistry::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_not_running(&self) -> Result<(), RenkonError> {
        if self.running.load(Ordering::SeqCst) {
            Err(RenkonError::RegistrationWhileRunning)
        } else {
            Ok(())
        }
    }

    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> Result<(), RenkonError> {
        self.ensure_not_running()?;
        self.endpoints
            .register(endpoint)
            .map_err(|message| RenkonError::EndpointIdentityCollision { message })
    }

    pub fn add_endpoints(
        &mut self,
        endpoints: impl IntoIterator<Item = Endpoint>,
    ) -> Result<(), RenkonError> {
        for endpoint in endpoints {
            self.add_endpoint(endpoint)?;
        }
        Ok(())
    }

    pub fn add_action(&mut self, id: ActionId, action: Arc<dyn Action>) -> Result<(), RenkonError> {
        self.ensure_not_running()?;
        self.actions.register(id, action);
        Ok(())
    }

    pub fn add_actions(
        &mut self,
        actions: impl IntoIterator<Item = (ActionId, Arc<dyn Action>)>,
    ) -> Result<(), RenkonError> {
        for (id, action) in actions {
            self.add_action(id, action)?;
        }
        Ok(())
    }

    /// Scenario registration is unrestricted: it may be called before,
    /// during, or after `run()`, per `spec.md` §4.7.
    pub fn add_scenario(&self, scenario: Scenario) {
        self.scenarios.add(scenario);
    }

    pub fn remove_scenario(&self, id: &ScenarioId) {
        self.scenarios.remove(id);
    }

    pub fn set_default_scenario(&self, id: Option<ScenarioId>) {
        self.scenarios.set_default(id);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Assemble the `axum::Router` for the currently registered endpoints,
    /// without binding a socket: used directly by in-process tests via
    /// `tower::ServiceExt::oneshot`.
    pub fn router(&self) -> Router {
        let state = AppState {
            routes: Arc::new(build_route_table(&self.endpoints)),
            pipeline: Arc::new(PipelineEngine::new(&self.endpoints)),
            endpoints: Arc::new(self.endpoints.clone()),
            scenarios: self.scenarios.clone(),
            actions: Arc::new(self.actions.clone()),
        };

        Router::new()
            .fallback(handle)
            .layer(axum::middleware::from_fn(resolve_session))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                resolve_scenario,
            ))
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new())
            .with_state(state)
    }

    /// Freeze the registered endpoints and actions, then serve forever on
    /// `addr`, shutting down gracefully on Ctrl-C or SIGTERM.
    pub async fn run(&self, addr: &str) -> Result<(), std::io::Error> {
        self.running.store(true, Ordering::SeqCst);
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "renkon server listening");
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;
        self.running.store(false, Ordering::SeqCst);
        result
    }
}

/// The single handler every route is wired to: decode the request, resolve
/// the endpoint/scenario/session triple already attached by middleware, run
/// it through the pipeline engine, and encode whatever comes back.
async fn handle(
    State(state): State<AppState>,
    Extension(scenario): Extension<Scenario>,
    Extension(session): Extension<crate::id::SessionId>,
    method: Method,
    uri: axum::http::Uri,
    headers: http::HeaderMap,
    body: Bytes,
) -> Response {
    let endpoint = match find_endpoint(&state, &method, uri.path()) {
        Some(endpoint) => endpoint,
        None => return RenkonError::RouteNotFound.into_response(),
    };

    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|value| {
            [
                ContentType::Json,
                ContentType::Protobuf(ProtobufVariant::Grpc),
                ContentType::Protobuf(ProtobufVariant::GrpcWeb),
                ContentType::Protobuf(ProtobufVariant::GrpcWebText),
            ]
            .into_iter()
            .find(|ct| ct.accepts(value))
        });

    if let Some(header_value) = headers.get(http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        if !endpoint.request_content_type.accepts(header_value) {
            return RenkonError::UnsupportedMediaType {
                content_type: header_value.to_string(),
            }
            .into_response();
        }
    }

    let request = RenkonRequest {
        method,
        path: uri.path().to_string(),
        headers,
        body: body.to_vec(),
        content_type,
    };
    let context = Context {
        endpoint: endpoint.id.clone(),
        scenario: scenario.id.clone(),
        session: session.clone(),
    };

    let result = state
        .pipeline
        .dispatch(
            &endpoint,
            &scenario,
            &session,
            &state.actions,
            request,
            context,
        )
        .await;

    match result {
        Ok(envelope) => render(&endpoint, envelope),
        Err(err) => err.into_response(),
    }
}

fn find_endpoint(state: &AppState, method: &Method, path: &str) -> Option<Endpoint> {
    let matcher = state.routes.get(method.as_str())?;
    let matched = matcher.parse(path)?;
    state.endpoints.get(matched.producer).cloned()
}

fn render(endpoint: &Endpoint, envelope: crate::message::ResponseEnvelope) -> Response {
    let content_type = envelope.effective_content_type(endpoint.response_content_type);
    let mut out = Vec::new();
    envelope.encode(content_type, &mut out);

    let mut builder = axum::http::Response::builder().status(envelope.status).header(
        http::header::CONTENT_TYPE,
        content_type.canonical_header(),
    );
    for (name, value) in &envelope.headers {
        if let Ok(header_name) = HeaderName::try_from(name.as_str()) {
            builder = builder.header(header_name, value);
        }
    }
    if let Some(trailers) = &envelope.trailers {
        for (name, value) in trailers {
            let trailer_name = format!("x-renkon-trailer-{name}");
            if let Ok(header_name) = HeaderName::try_from(trailer_name) {
                builder = builder.header(header_name, value);
            }
        }
    }
    builder
        .body(Body::from(out))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionConfiguration;
    use crate::endpoint::EndpointBuilder;
    use crate::message::ResponseEnvelope;
    use crate::middleware::SCENARIO_HEADER;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn unregistered_route_is_not_found_through_the_router() {
        let server = Server::new();
        server.add_scenario(Scenario::new("default"));
        server.set_default_scenario(Some(ScenarioId::new("default")));
        let response = server
            .router()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn registered_endpoint_round_trips_through_the_router() {
        let mut server = Server::new();
        server
            .add_endpoint(
                EndpointBuilder::json(Method::GET, "/accounts")
                    .static_response(
                        "ok",
                        ResponseEnvelope::json(StatusCode::OK, &serde_json::json!([])),
                    )
                    .build(),
            )
            .unwrap();
        server.add_scenario(
            Scenario::new("default").configure(
                crate::id::EndpointId::new("GET-/accounts"),
                vec![ActionConfiguration::new("return-response").with("response-id", "ok")],
            ),
        );
        server.set_default_scenario(Some(ScenarioId::new("default")));

        let response = server
            .router()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/accounts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn unknown_scenario_header_is_rejected_before_dispatch() {
        let mut server = Server::new();
        server
            .add_endpoint(EndpointBuilder::json(Method::GET, "/accounts").build())
            .unwrap();
        let response = server
            .router()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/accounts")
                    .header(SCENARIO_HEADER, "ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn add_endpoint_collision_is_reported_distinctly_from_running_state() {
        let mut server = Server::new();
        server
            .add_endpoint(EndpointBuilder::json(Method::GET, "/accounts").build())
            .unwrap();
        let err = server
            .add_endpoint(EndpointBuilder::json(Method::GET, "/accounts").id("dup").build())
            .unwrap_err();
        assert!(matches!(err, RenkonError::EndpointIdentityCollision { .. }));
    }

    #[test]
    fn add_endpoint_after_running_is_rejected() {
        let mut server = Server::new();
        server.running.store(true, Ordering::SeqCst);
        let err = server
            .add_endpoint(EndpointBuilder::json(Method::GET, "/x").build())
            .unwrap_err();
        assert!(matches!(err, RenkonError::RegistrationWhileRunning));
    }

    #[test]
    fn scenario_registration_is_allowed_while_running() {
        let server = Server::new();
        server.running.store(true, Ordering::SeqCst);
        server.add_scenario(Scenario::new("default"));
        assert!(server.scenarios.contains(&ScenarioId::new("default")));
    }
}
