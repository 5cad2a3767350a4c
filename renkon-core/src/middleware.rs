//! Request-scoped middleware (`spec.md` §4.5, component C7): resolving a
//! scenario and a session before the routed handler ever sees the request.
//!
//! These run as ordinary `axum::middleware::from_fn_with_state` layers
//! rather than through a guard/DI system: Renkon has exactly two pieces of
//! cross-cutting, short-circuiting request state to resolve, not an open
//! set of pluggable authorization rules, so a couple of plain middleware
//! functions are a better fit than this codebase's full guard machinery.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::HeaderValue;

use crate::error::RenkonError;
use crate::id::{ScenarioId, SessionId};
use crate::scenario::Scenario;
use crate::server::AppState;
use crate::session::{new_session_id, SESSION_HEADER};

/// Name of the header a client uses to select a non-default scenario.
pub const SCENARIO_HEADER: &str = "x-renkon-scenario";

/// Resolve the scenario for this request from `x-renkon-scenario`, falling
/// back to the registry's default scenario when the header is absent.
/// Rejects with [`RenkonError::ScenarioUnknown`] or
/// [`RenkonError::ScenarioHeaderMissing`] before the handler runs.
pub async fn resolve_scenario(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let requested = request
        .headers()
        .get(SCENARIO_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let scenario: Scenario = match requested {
        Some(id) => match state.scenarios.get(&ScenarioId::new(id.clone())) {
            Some(scenario) => scenario,
            None => return RenkonError::ScenarioUnknown { id }.into_response(),
        },
        None => match state.scenarios.default_scenario() {
            Some(scenario) => scenario,
            None => return RenkonError::ScenarioHeaderMissing.into_response(),
        },
    };

    request.extensions_mut().insert(scenario);
    next.run(request).await
}

/// Resolve (or mint) the session for this request from `x-renkon-session`,
/// and echo it back on the response so a client that did not send one can
/// pick it up for subsequent requests.
pub async fn resolve_session(mut request: Request, next: Next) -> Response {
    let existing = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(SessionId::new);

    let session = match existing {
        Some(session) => session,
        None => {
            let minted = new_session_id();
            tracing::debug!(session = %minted, "minted a new session id");
            minted
        }
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(session.as_str()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionTable;
    use crate::endpoint::EndpointRegistry;
    use crate::pipeline::PipelineEngine;
    use crate::scenario::ScenarioRegistry;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use http::StatusCode;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn empty_state() -> AppState {
        let endpoints = Arc::new(EndpointRegistry::new());
        AppState {
            pipeline: Arc::new(PipelineEngine::new(&endpoints)),
            routes: Arc::new(std::collections::BTreeMap::new()),
            endpoints,
            scenarios: ScenarioRegistry::new(),
            actions: Arc::new(ActionTable::with_builtins()),
        }
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                resolve_scenario,
            ))
            .layer(axum::middleware::from_fn(resolve_session))
            .with_state(state)
    }

    #[tokio::test]
    async fn missing_scenario_and_no_default_is_forbidden() {
        let response = app(empty_state())
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_scenario_header_is_forbidden() {
        let response = app(empty_state())
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header(SCENARIO_HEADER, "ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn default_scenario_lets_the_request_through() {
        let state = empty_state();
        state.scenarios.add(Scenario::new("default"));
        state.scenarios.set_default(Some(ScenarioId::new("default")));
        let response = app(state)
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn session_header_is_echoed_back_when_sent() {
        let state = empty_state();
        state.scenarios.add(Scenario::new("default"));
        state.scenarios.set_default(Some(ScenarioId::new("default")));
        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header(SESSION_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(SESSION_HEADER).unwrap(),
            "abc-123"
        );
    }

    #[tokio::test]
    async fn a_fresh_session_is_minted_and_echoed_when_absent() {
        let state = empty_state();
        state.scenarios.add(Scenario::new("default"));
        state.scenarios.set_default(Some(ScenarioId::new("default")));
        let response = app(state)
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().get(SESSION_HEADER).is_some());
    }
}
