//! Renkon: an embeddable mock HTTP/gRPC API server whose responses are
//! driven by named scenarios and session-scoped action pipelines rather
//! than a fixed handler per route.
//!
//! Wire up a [`Server`](server::Server) with [`Endpoint`](endpoint::Endpoint)s
//! and [`Scenario`](scenario::Scenario)s, then call `run()` to serve them.
//! See the crate's `prelude` module for the common imports.

pub mod action;
pub mod content_type;
pub mod duration;
pub mod endpoint;
pub mod error;
pub mod id;
pub mod message;
pub mod middleware;
pub mod path;
pub mod pipeline;
pub mod prelude;
pub mod scenario;
pub mod server;
pub mod session;
pub mod value;

pub use action::{Action, ActionConfiguration, ActionTable, Outcome};
pub use content_type::{ContentType, ProtobufVariant};
pub use duration::Duration;
pub use endpoint::{Endpoint, EndpointBuilder, EndpointRegistry};
pub use error::RenkonError;
pub use id::{ActionId, EndpointId, ResponseId, ScenarioId, SessionId};
pub use message::{Context, Request, ResponseEnvelope};
pub use scenario::{Scenario, ScenarioOptions, ScenarioRegistry};
pub use server::Server;
pub use value::{BoxedValue, FromBoxed, ToBoxed};
