//! Renkon prelude: import everything needed to wire up a server with a
//! single `use`.
//!
//! ```ignore
//! use renkon_core::prelude::*;
//!
//! let mut server = Server::new();
//! server.add_endpoint(
//!     EndpointBuilder::json(http::Method::GET, "/accounts")
//!         .static_response("empty", ResponseEnvelope::json(http::StatusCode::OK, &serde_json::json!([])))
//!         .build(),
//! ).unwrap();
//! server.add_scenario(Scenario::new("default"));
//! server.set_default_scenario(Some(ScenarioId::new("default")));
//! ```

pub use crate::action::{
    Action, ActionConfiguration, ActionTable, Log, Outcome, ReturnResponse, Wait,
};
pub use crate::content_type::{ContentType, ProtobufVariant};
pub use crate::duration::Duration;
pub use crate::endpoint::{Endpoint, EndpointBuilder, EndpointRegistry, ResponseFactory};
pub use crate::error::RenkonError;
pub use crate::id::{ActionId, EndpointId, ResponseId, ScenarioId, SessionId};
pub use crate::message::{Context, Request, ResponseEnvelope};
pub use crate::scenario::{Scenario, ScenarioOptions, ScenarioRegistry};
pub use crate::server::Server;
pub use crate::value::{BoxedValue, FromBoxed, ToBoxed};
