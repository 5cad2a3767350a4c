//! The pipeline engine (`spec.md` §4.6/§4.7, component C8), the stateful
//! round-robin cursor that decides which configured action answers each
//! request for a given (endpoint, session) pair.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::action::{ActionConfiguration, ActionTable, Outcome};
use crate::endpoint::{Endpoint, EndpointRegistry};
use crate::error::RenkonError;
use crate::id::{EndpointId, SessionId};
use crate::message::{Context, Request, ResponseEnvelope};
use crate::scenario::Scenario;

/// Per-session pipeline state for one endpoint: the action list it was last
/// positioned against, and the cursor into it.
///
/// The cursor advances by exactly **one** per request, via [`enter`](Self::enter),
/// not once per action inspected. A request that lands on an absent action
/// scans forward over the rest of the list to find a response, but that scan
/// is request-local and never touches `cursor`; the next request still
/// resumes at `entry + 1`, not past whatever was scanned this time. The
/// cursor is not reduced modulo the action count as it grows; it is
/// normalized when read and only then incremented, so it grows monotonically
/// (short of wrapping `usize`, which would take far longer than any process
/// lifetime) rather than oscillating in place. The cursor starts at
/// `configured_actions.len()`, which normalizes to index 0 on the first
/// request.
struct Pipeline {
    configured_actions: Vec<ActionConfiguration>,
    cursor: usize,
}

impl Pipeline {
    fn new(configured_actions: Vec<ActionConfiguration>) -> Self {
        let cursor = configured_actions.len();
        Self {
            configured_actions,
            cursor,
        }
    }

    /// Whether this pipeline's last-known action list still matches
    /// `actions` structurally. A mismatch means the scenario was
    /// reconfigured since this session last hit the endpoint.
    fn is_compatible(&self, actions: &[ActionConfiguration]) -> bool {
        self.configured_actions == actions
    }

    /// Adopt a new action list, resetting the cursor so the next request
    /// enters at index 0 of the new list: reconfiguration never tries to
    /// preserve a cursor position that may no longer make sense.
    fn reconfigure(&mut self, actions: Vec<ActionConfiguration>) {
        self.cursor = actions.len();
        self.configured_actions = actions;
    }

    /// Advance the persistent cursor by exactly one request, returning the
    /// index this request enters the action list at. Scanning past absent
    /// actions within the request is the caller's job and must not call this
    /// again for the same request.
    fn enter(&mut self) -> usize {
        let total = self.configured_actions.len();
        let idx = self.cursor % total;
        self.cursor = self.cursor.wrapping_add(1);
        idx
    }
}

/// The per-endpoint table of session pipelines.
///
/// A `DashMap` keyed by session, each entry independently lockable, is the
/// concurrency shape this calls for: requests to *different* sessions on the
/// same endpoint must never block each other, while requests to the *same*
/// session must serialize (two concurrent requests advancing one cursor
/// would race). A single `Mutex` over the whole map would serialize across
/// sessions needlessly; per-entry locking under a sharded map gives both.
struct Responder {
    endpoint: EndpointId,
    sessions: DashMap<String, Arc<Mutex<Pipeline>>>,
}

impl Responder {
    fn new(endpoint: EndpointId) -> Self {
        Self {
            endpoint,
            sessions: DashMap::new(),
        }
    }

    async fn dispatch(
        &self,
        session: &SessionId,
        configured_actions: &[ActionConfiguration],
        actions: &ActionTable,
        endpoint: &Endpoint,
        request: Request,
        context: Context,
    ) -> Result<ResponseEnvelope, RenkonError> {
        if configured_actions.is_empty() {
            return Err(RenkonError::NoActionsConfigured);
        }

        let pipeline_lock = self
            .sessions
            .entry(session.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Pipeline::new(configured_actions.to_vec()))))
            .clone();

        let mut pipeline = pipeline_lock.lock().await;
        if !pipeline.is_compatible(configured_actions) {
            pipeline.reconfigure(configured_actions.to_vec());
        }

        let total = pipeline.configured_actions.len();
        let entry = pipeline.enter();
        for step in 0..total {
            let idx = (entry + step) % total;
            let config = pipeline.configured_actions[idx].clone();
            let action = actions.get(&config.id).ok_or_else(|| RenkonError::UnknownActionType {
                id: config.id.as_str().to_string(),
            })?;

            let span = tracing::info_span!(
                "renkon.pipeline.step",
                endpoint = %self.endpoint,
                session = %session,
                action = %config.id,
                cursor = idx,
            );
            let outcome = action
                .perform(request.clone(), context.clone(), &config, endpoint)
                .instrument(span)
                .await;

            match outcome {
                Outcome::Response(response) => return Ok(response),
                Outcome::Error(err) => return Err(err),
                Outcome::Absent => continue,
            }
        }

        Err(RenkonError::PipelineLooped)
    }
}

/// Owns one [`Responder`] per registered endpoint and is the single entry
/// point request handling calls into once a scenario and session have been
/// resolved.
pub struct PipelineEngine {
    responders: BTreeMap<String, Responder>,
}

impl PipelineEngine {
    pub fn new(endpoints: &EndpointRegistry) -> Self {
        let responders = endpoints
            .iter()
            .map(|endpoint| (endpoint.id.as_str().to_string(), Responder::new(endpoint.id.clone())))
            .collect();
        Self { responders }
    }

    /// Resolve the request against `scenario`'s action list for `endpoint`,
    /// applying the scenario's `delayAllRequests` once up front: this
    /// happens whether or not the resolved actions include a `wait`, per
    /// `spec.md` §9.
    pub async fn dispatch(
        &self,
        endpoint: &Endpoint,
        scenario: &Scenario,
        session: &SessionId,
        actions: &ActionTable,
        request: Request,
        context: Context,
    ) -> Result<ResponseEnvelope, RenkonError> {
        let configured = scenario
            .actions_for(&endpoint.id)
            .ok_or_else(|| RenkonError::EndpointNotInScenario {
                endpoint: endpoint.id.to_string(),
                scenario: scenario.id.to_string(),
            })?;

        if let Some(delay) = scenario.options.delay_all_requests {
            tokio::time::sleep(delay.to_std()).await;
        }

        let responder = self
            .responders
            .get(endpoint.id.as_str())
            .expect("a Responder exists for every endpoint in the registry this engine was built from");
        responder
            .dispatch(session, configured, actions, endpoint, request, context)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointBuilder;
    use crate::id::ScenarioId;
    use http::{HeaderMap, Method, StatusCode};

    fn endpoint_with_two_responses() -> Endpoint {
        EndpointBuilder::json(Method::GET, "/accounts")
            .static_response("a", ResponseEnvelope::new(StatusCode::OK, b"a".to_vec()))
            .static_response("b", ResponseEnvelope::new(StatusCode::OK, b"b".to_vec()))
            .build()
    }

    fn request() -> Request {
        Request {
            method: Method::GET,
            path: "/accounts".into(),
            headers: HeaderMap::new(),
            body: vec![],
            content_type: None,
        }
    }

    fn context(endpoint: EndpointId, scenario: ScenarioId, session: SessionId) -> Context {
        Context {
            endpoint,
            scenario,
            session,
        }
    }

    #[tokio::test]
    async fn round_robins_in_registration_order_starting_from_the_first() {
        let endpoint = endpoint_with_two_responses();
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint.clone()).unwrap();
        let engine = PipelineEngine::new(&registry);
        let actions = ActionTable::with_builtins();
        let scenario = Scenario::new("s").configure(
            endpoint.id.clone(),
            vec![
                ActionConfiguration::new("return-response").with("response-id", "a"),
                ActionConfiguration::new("return-response").with("response-id", "b"),
            ],
        );
        let session = SessionId::new("sess");

        let first = engine
            .dispatch(
                &endpoint,
                &scenario,
                &session,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario.id.clone(), session.clone()),
            )
            .await
            .unwrap();
        assert_eq!(first.content, b"a");

        let second = engine
            .dispatch(
                &endpoint,
                &scenario,
                &session,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario.id.clone(), session.clone()),
            )
            .await
            .unwrap();
        assert_eq!(second.content, b"b");

        let third = engine
            .dispatch(
                &endpoint,
                &scenario,
                &session,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario.id.clone(), session.clone()),
            )
            .await
            .unwrap();
        assert_eq!(third.content, b"a");
    }

    #[tokio::test]
    async fn separate_sessions_get_independent_cursors() {
        let endpoint = endpoint_with_two_responses();
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint.clone()).unwrap();
        let engine = PipelineEngine::new(&registry);
        let actions = ActionTable::with_builtins();
        let scenario = Scenario::new("s").configure(
            endpoint.id.clone(),
            vec![
                ActionConfiguration::new("return-response").with("response-id", "a"),
                ActionConfiguration::new("return-response").with("response-id", "b"),
            ],
        );
        let alice = SessionId::new("alice");
        let bob = SessionId::new("bob");

        let alice_first = engine
            .dispatch(
                &endpoint,
                &scenario,
                &alice,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario.id.clone(), alice.clone()),
            )
            .await
            .unwrap();
        let bob_first = engine
            .dispatch(
                &endpoint,
                &scenario,
                &bob,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario.id.clone(), bob.clone()),
            )
            .await
            .unwrap();
        assert_eq!(alice_first.content, b"a");
        assert_eq!(bob_first.content, b"a");
    }

    #[tokio::test]
    async fn absent_actions_within_a_request_do_not_consume_extra_cursor_steps() {
        // [wait, return-response] over a session: the first request scans
        // past `wait` (absent) to reach the response, but that scan must not
        // advance the persistent cursor more than the single `enter()` per
        // request. So the second request resumes exactly one slot after
        // where the first one entered, landing straight on the response.
        let endpoint = endpoint_with_two_responses();
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint.clone()).unwrap();
        let engine = PipelineEngine::new(&registry);
        let actions = ActionTable::with_builtins();
        let scenario = Scenario::new("s").configure(
            endpoint.id.clone(),
            vec![
                ActionConfiguration::new("wait").with("duration.seconds", 0i64),
                ActionConfiguration::new("return-response").with("response-id", "a"),
            ],
        );
        let session = SessionId::new("sess");

        // First request enters at index 0 (wait, absent), scans to index 1
        // (return-response) within the same request.
        let first = engine
            .dispatch(
                &endpoint,
                &scenario,
                &session,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario.id.clone(), session.clone()),
            )
            .await
            .unwrap();
        assert_eq!(first.content, b"a");

        // Second request must enter at index 1 directly (cursor advanced by
        // one, not by the two steps the first request's scan walked through).
        let second = engine
            .dispatch(
                &endpoint,
                &scenario,
                &session,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario.id.clone(), session.clone()),
            )
            .await
            .unwrap();
        assert_eq!(second.content, b"a");
    }

    #[tokio::test]
    async fn all_absent_actions_produce_pipeline_looped() {
        let endpoint = endpoint_with_two_responses();
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint.clone()).unwrap();
        let engine = PipelineEngine::new(&registry);
        let actions = ActionTable::with_builtins();
        let scenario = Scenario::new("s").configure(
            endpoint.id.clone(),
            vec![
                ActionConfiguration::new("log").with("message", "one"),
                ActionConfiguration::new("log").with("message", "two"),
            ],
        );
        let session = SessionId::new("sess");
        let err = engine
            .dispatch(
                &endpoint,
                &scenario,
                &session,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario.id.clone(), session.clone()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RenkonError::PipelineLooped));
    }

    #[tokio::test]
    async fn structural_reconfiguration_resets_the_cursor() {
        let endpoint = endpoint_with_two_responses();
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint.clone()).unwrap();
        let engine = PipelineEngine::new(&registry);
        let actions = ActionTable::with_builtins();
        let session = SessionId::new("sess");

        let scenario_v1 = Scenario::new("s").configure(
            endpoint.id.clone(),
            vec![
                ActionConfiguration::new("return-response").with("response-id", "a"),
                ActionConfiguration::new("return-response").with("response-id", "b"),
            ],
        );
        engine
            .dispatch(
                &endpoint,
                &scenario_v1,
                &session,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario_v1.id.clone(), session.clone()),
            )
            .await
            .unwrap();

        // Structurally different action list for the same endpoint: the
        // cursor must reset rather than index into the new list using the
        // old position.
        let scenario_v2 = Scenario::new("s").configure(
            endpoint.id.clone(),
            vec![ActionConfiguration::new("return-response").with("response-id", "b")],
        );
        let resp = engine
            .dispatch(
                &endpoint,
                &scenario_v2,
                &session,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario_v2.id.clone(), session.clone()),
            )
            .await
            .unwrap();
        assert_eq!(resp.content, b"b");
    }

    #[tokio::test]
    async fn endpoint_not_configured_in_scenario_is_an_error() {
        let endpoint = endpoint_with_two_responses();
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint.clone()).unwrap();
        let engine = PipelineEngine::new(&registry);
        let actions = ActionTable::with_builtins();
        let scenario = Scenario::new("empty");
        let session = SessionId::new("sess");
        let err = engine
            .dispatch(
                &endpoint,
                &scenario,
                &session,
                &actions,
                request(),
                context(endpoint.id.clone(), scenario.id.clone(), session.clone()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RenkonError::EndpointNotInScenario { .. }));
    }
}
