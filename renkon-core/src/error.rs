//! The error taxonomy from `spec.md` §7, collapsed into one enum that is
//! both a Rust error type and (via `IntoResponse`) an HTTP response,
//! mirroring this codebase's `AppError` convention of a single error enum
//! doing double duty.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

/// Every way a Renkon request can fail, tagged with the `spec.md` §7 surface
/// status code. `RegistrationWhileRunning` and `EndpointIdentityCollision`
/// are never rendered to an HTTP client: both are returned to embedder code
/// from `add_endpoint`/`add_action` as a plain `Result::Err`.
#[derive(Debug, Clone)]
pub enum RenkonError {
    /// No `x-renkon-scenario` header and no default scenario configured.
    ScenarioHeaderMissing,
    /// `x-renkon-scenario` named an id not in the scenario registry.
    ScenarioUnknown { id: String },
    /// The selected scenario has no action list for the routed endpoint.
    EndpointNotInScenario { endpoint: String, scenario: String },
    /// The endpoint's action list for this scenario is empty.
    NoActionsConfigured,
    /// An `ActionConfiguration` named an id absent from the action-type table.
    UnknownActionType { id: String },
    /// `return-response` named a response id absent from the endpoint.
    ResponseNotFound { id: String },
    /// The pipeline completed a full loop without producing a response.
    PipelineLooped,
    /// An action's configuration is missing a required key.
    ConfigurationPropertyMissing { key: String },
    /// An action's configuration has the key but the value will not unbox.
    ConfigurationTypeMismatch { key: String },
    /// Request decode failure (400) or response encode failure (500).
    Codec { message: String, on_response: bool },
    /// The request's `Content-Type` is not supported by the routed endpoint.
    UnsupportedMediaType { content_type: String },
    /// No endpoint matched the request's method and path.
    RouteNotFound,
    /// `add_endpoint`/`add_action` called after `run()`. Never sent over the
    /// wire; surfaced to the embedder as a `Result::Err`.
    RegistrationWhileRunning,
    /// Two endpoints were registered against the same (method, path) pair,
    /// violating the Endpoint Identity Invariant. Never sent over the wire;
    /// surfaced to the embedder as a `Result::Err` from `add_endpoint`.
    EndpointIdentityCollision { message: String },
}

impl RenkonError {
    /// The HTTP status this error surfaces as, per `spec.md` §7.
    pub fn status(&self) -> StatusCode {
        match self {
            RenkonError::ScenarioHeaderMissing | RenkonError::ScenarioUnknown { .. } => {
                StatusCode::FORBIDDEN
            }
            RenkonError::EndpointNotInScenario { .. }
            | RenkonError::UnknownActionType { .. }
            | RenkonError::ResponseNotFound { .. }
            | RenkonError::PipelineLooped
            | RenkonError::ConfigurationPropertyMissing { .. }
            | RenkonError::ConfigurationTypeMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RenkonError::NoActionsConfigured | RenkonError::RouteNotFound => StatusCode::NOT_FOUND,
            RenkonError::Codec { on_response, .. } => {
                if *on_response {
                    StatusCode::INTERNAL_SERVER_ERROR
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            RenkonError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RenkonError::RegistrationWhileRunning
            | RenkonError::EndpointIdentityCollision { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The human-readable reason text required alongside each error kind.
    pub fn reason(&self) -> String {
        match self {
            RenkonError::ScenarioHeaderMissing => {
                "no scenario selected: send 'x-renkon-scenario' or configure a default scenario"
                    .to_string()
            }
            RenkonError::ScenarioUnknown { id } => format!("'{id}' does not exist"),
            RenkonError::EndpointNotInScenario { endpoint, scenario } => format!(
                "scenario '{scenario}' has no actions configured for endpoint '{endpoint}'"
            ),
            RenkonError::NoActionsConfigured => {
                "no actions configured for this endpoint in the selected scenario".to_string()
            }
            RenkonError::UnknownActionType { id } => {
                format!("no action type registered for id '{id}'")
            }
            RenkonError::ResponseNotFound { id } => {
                format!("no response registered under id '{id}' on this endpoint")
            }
            RenkonError::PipelineLooped => {
                "pipeline looped through all actions without producing a response".to_string()
            }
            RenkonError::ConfigurationPropertyMissing { key } => {
                format!("action configuration is missing required key '{key}'")
            }
            RenkonError::ConfigurationTypeMismatch { key } => {
                format!("action configuration key '{key}' could not be unboxed to the expected type")
            }
            RenkonError::Codec { message, .. } => message.clone(),
            RenkonError::UnsupportedMediaType { content_type } => {
                format!("unsupported content type '{content_type}'")
            }
            RenkonError::RouteNotFound => "no endpoint matches this method and path".to_string(),
            RenkonError::RegistrationWhileRunning => {
                "cannot add endpoints or actions while the server is running".to_string()
            }
            RenkonError::EndpointIdentityCollision { message } => message.clone(),
        }
    }

    /// A short machine-readable kind tag, used as the `"error"` field of the
    /// rendered JSON body.
    pub fn kind(&self) -> &'static str {
        match self {
            RenkonError::ScenarioHeaderMissing => "scenario-header-missing",
            RenkonError::ScenarioUnknown { .. } => "scenario-unknown",
            RenkonError::EndpointNotInScenario { .. } => "endpoint-not-in-scenario",
            RenkonError::NoActionsConfigured => "no-actions-configured",
            RenkonError::UnknownActionType { .. } => "unknown-action-type",
            RenkonError::ResponseNotFound { .. } => "response-not-found",
            RenkonError::PipelineLooped => "pipeline-looped",
            RenkonError::ConfigurationPropertyMissing { .. } => "configuration-property-missing",
            RenkonError::ConfigurationTypeMismatch { .. } => "configuration-type-mismatch",
            RenkonError::Codec { .. } => "codec-error",
            RenkonError::UnsupportedMediaType { .. } => "unsupported-media-type",
            RenkonError::RouteNotFound => "route-not-found",
            RenkonError::RegistrationWhileRunning => "registration-while-running",
            RenkonError::EndpointIdentityCollision { .. } => "endpoint-identity-collision",
        }
    }
}

impl std::fmt::Display for RenkonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.reason())
    }
}

impl std::error::Error for RenkonError {}

impl IntoResponse for RenkonError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.kind(),
            "reason": self.reason(),
        });
        (status, Json(body)).into_response()
    }
}
