//! Actions and their configuration (`spec.md` §4.4, component C5).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::endpoint::{BoxFuture, Endpoint};
use crate::error::RenkonError;
use crate::id::{ActionId, ResponseId};
use crate::message::{Context, Request, ResponseEnvelope};
use crate::value::{BoxedValue, FromBoxed};

/// What an action produced for a single pipeline step.
pub enum Outcome {
    /// A response is ready; the pipeline stops here.
    Response(ResponseEnvelope),
    /// The action failed outright; the pipeline stops here.
    Error(RenkonError),
    /// This action had nothing to contribute; advance to the next one.
    Absent,
}

/// `(Request, Context) -> Response | Error | Absent`, per `spec.md` §4.4.
///
/// Actions also see the [`Endpoint`] they are running against, since
/// `return-response` needs to resolve a response id against that endpoint's
/// response table.
pub trait Action: Send + Sync {
    fn perform(
        &self,
        request: Request,
        context: Context,
        configuration: &ActionConfiguration,
        endpoint: &Endpoint,
    ) -> BoxFuture<Outcome>;
}

/// A configured instance of an action type: which action, plus the
/// configuration dict it was declared with.
///
/// Equality is structural (derived `PartialEq` over `id` and
/// `configuration`): this is what `Pipeline::is_compatible` relies on to
/// decide whether a scenario's action list for an endpoint actually changed
/// since the cursor was last positioned.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionConfiguration {
    pub id: ActionId,
    pub configuration: BTreeMap<String, BoxedValue>,
}

impl ActionConfiguration {
    pub fn new(id: impl Into<ActionId>) -> Self {
        Self {
            id: id.into(),
            configuration: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<BoxedValue>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    /// Fetch and unbox a required configuration value.
    ///
    /// Distinguishes a missing key from a present-but-unconvertible one, per
    /// `spec.md` §7's two separate error kinds.
    pub fn require<T: FromBoxed>(&self, key: &str) -> Result<T, RenkonError> {
        match self.configuration.get(key) {
            None => Err(RenkonError::ConfigurationPropertyMissing { key: key.into() }),
            Some(raw) => T::from_boxed(Some(raw)).ok_or_else(|| {
                RenkonError::ConfigurationTypeMismatch {
                    key: key.to_string(),
                }
            }),
        }
    }

    /// Fetch and unbox an optional configuration value: absent and
    /// unconvertible both fall back to `default`.
    pub fn get_or<T: FromBoxed>(&self, key: &str, default: T) -> T {
        T::from_boxed(self.configuration.get(key)).unwrap_or(default)
    }
}

/// The table of action types a server knows how to run, keyed by
/// [`ActionId`]. Built once at startup from the built-ins plus anything the
/// embedder registers.
#[derive(Clone, Default)]
pub struct ActionTable {
    actions: BTreeMap<String, Arc<dyn Action>>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table pre-populated with `return-response`, `wait`, and `log`.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register(ActionId::new("return-response"), Arc::new(ReturnResponse));
        table.register(ActionId::new("wait"), Arc::new(Wait));
        table.register(ActionId::new("log"), Arc::new(Log));
        table
    }

    pub fn register(&mut self, id: ActionId, action: Arc<dyn Action>) {
        self.actions.insert(id.into_string(), action);
    }

    pub fn get(&self, id: &ActionId) -> Option<Arc<dyn Action>> {
        self.actions.get(id.as_str()).cloned()
    }

    pub fn contains(&self, id: &ActionId) -> bool {
        self.actions.contains_key(id.as_str())
    }
}

/// Returns a fixed, pre-registered response from the endpoint's response
/// table. Configuration: `response-id` (string).
pub struct ReturnResponse;

impl Action for ReturnResponse {
    fn perform(
        &self,
        request: Request,
        context: Context,
        configuration: &ActionConfiguration,
        endpoint: &Endpoint,
    ) -> BoxFuture<Outcome> {
        let response_id = configuration.require::<String>("response-id");
        let factory = response_id
            .and_then(|id| {
                endpoint
                    .response(&ResponseId::new(id.clone()))
                    .cloned()
                    .ok_or(RenkonError::ResponseNotFound { id })
            });
        Box::pin(async move {
            match factory {
                Ok(factory) => match factory(request, context).await {
                    Ok(response) => Outcome::Response(response),
                    Err(err) => Outcome::Error(err),
                },
                Err(err) => Outcome::Error(err),
            }
        })
    }
}

/// Sleeps for a configured duration, then falls through.
///
/// Configuration: `duration.seconds` (int), `duration.attoseconds` (int,
/// default 0). Always produces [`Outcome::Absent`] on success, `wait` never
/// itself answers the request, it only delays the actions after it.
pub struct Wait;

impl Action for Wait {
    fn perform(
        &self,
        _request: Request,
        _context: Context,
        configuration: &ActionConfiguration,
        _endpoint: &Endpoint,
    ) -> BoxFuture<Outcome> {
        let seconds = configuration.require::<i64>("duration.seconds");
        let attoseconds = configuration.get_or::<i64>("duration.attoseconds", 0);
        Box::pin(async move {
            match seconds {
                Ok(seconds) => {
                    let duration = crate::duration::Duration::new(seconds, attoseconds);
                    tokio::time::sleep(duration.to_std()).await;
                    Outcome::Absent
                }
                Err(err) => Outcome::Error(err),
            }
        })
    }
}

/// Emits a `tracing` event with a configured message, then falls through.
///
/// Configuration: `message` (string). This is not part of `spec.md`'s
/// original built-in action set; it exists purely so a scenario author can
/// leave a breadcrumb in server logs without stopping the pipeline.
pub struct Log;

impl Action for Log {
    fn perform(
        &self,
        _request: Request,
        context: Context,
        configuration: &ActionConfiguration,
        _endpoint: &Endpoint,
    ) -> BoxFuture<Outcome> {
        let message = configuration.require::<String>("message");
        Box::pin(async move {
            match message {
                Ok(message) => {
                    tracing::info!(
                        endpoint = %context.endpoint,
                        session = %context.session,
                        %message,
                        "pipeline log action"
                    );
                    Outcome::Absent
                }
                Err(err) => Outcome::Error(err),
            }
        })
    }
}
