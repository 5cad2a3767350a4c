//! Scenarios and the scenario registry (`spec.md` §4.2/§4.6, component C6).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::action::ActionConfiguration;
use crate::duration::Duration;
use crate::id::{EndpointId, ScenarioId};
use crate::value::BoxedValue;

/// Per-scenario options beyond its action lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioOptions {
    /// Upper bound on how long a streaming response under this scenario may
    /// stay open. `None` means unbounded.
    pub maximum_stream_lifetime: Option<Duration>,
    /// Delay applied once, before any pipeline action runs, independent of
    /// whether the configured actions include a `wait`, see `spec.md` §9.
    pub delay_all_requests: Option<Duration>,
    /// Arbitrary embedder-defined options, carried opaquely.
    pub custom_options: BTreeMap<String, BoxedValue>,
}

/// A named, switchable configuration of endpoint action pipelines.
///
/// `endpoints` maps each endpoint this scenario configures to the ordered
/// list of actions its pipeline should cycle through. An endpoint absent
/// from this map is simply not configured under this scenario: routing to
/// it surfaces [`crate::error::RenkonError::EndpointNotInScenario`].
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub id: ScenarioId,
    pub display_name: String,
    pub description: String,
    pub options: ScenarioOptions,
    pub endpoints: BTreeMap<String, Vec<ActionConfiguration>>,
}

impl Scenario {
    pub fn new(id: impl Into<ScenarioId>) -> Self {
        let id = id.into();
        Self {
            display_name: id.as_str().to_string(),
            id,
            description: String::new(),
            options: ScenarioOptions::default(),
            endpoints: BTreeMap::new(),
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn options(mut self, options: ScenarioOptions) -> Self {
        self.options = options;
        self
    }

    /// Declare the action list this scenario plays back for `endpoint`.
    pub fn configure(
        mut self,
        endpoint: impl Into<EndpointId>,
        actions: Vec<ActionConfiguration>,
    ) -> Self {
        self.endpoints.insert(endpoint.into().into_string(), actions);
        self
    }

    pub fn actions_for(&self, endpoint: &EndpointId) -> Option<&[ActionConfiguration]> {
        self.endpoints.get(endpoint.as_str()).map(Vec::as_slice)
    }
}

#[derive(Default)]
struct ScenarioRegistryInner {
    scenarios: BTreeMap<String, Scenario>,
    default: Option<String>,
}

/// The shared, lock-protected table of known scenarios.
///
/// A single `RwLock` over the whole map (rather than per-entry locks) is
/// the right tradeoff here: scenario registration is rare; it happens at
/// setup time or from occasional embedder calls, while reads (resolving
/// the scenario for every incoming request) are frequent and short, which
/// is exactly the access pattern `RwLock` favors over a sharded map.
#[derive(Clone)]
pub struct ScenarioRegistry {
    inner: Arc<RwLock<ScenarioRegistryInner>>,
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ScenarioRegistryInner::default())),
        }
    }

    /// Add (or structurally replace) a scenario. Re-adding a scenario under
    /// an id that already exists overwrites it in place: this is the
    /// Scenario Identity Invariant from `spec.md` §4.6: a scenario's id is
    /// its sole identity, and callers rely on re-registering to redefine one.
    pub fn add(&self, scenario: Scenario) {
        let mut inner = self.inner.write().expect("scenario registry lock poisoned");
        inner.scenarios.insert(scenario.id.as_str().to_string(), scenario);
    }

    pub fn remove(&self, id: &ScenarioId) -> Option<Scenario> {
        let mut inner = self.inner.write().expect("scenario registry lock poisoned");
        let removed = inner.scenarios.remove(id.as_str());
        if inner.default.as_deref() == Some(id.as_str()) {
            inner.default = None;
        }
        removed
    }

    pub fn set_default(&self, id: Option<ScenarioId>) {
        let mut inner = self.inner.write().expect("scenario registry lock poisoned");
        inner.default = id.map(|id| id.as_str().to_string());
    }

    pub fn get(&self, id: &ScenarioId) -> Option<Scenario> {
        let inner = self.inner.read().expect("scenario registry lock poisoned");
        inner.scenarios.get(id.as_str()).cloned()
    }

    pub fn default_scenario(&self) -> Option<Scenario> {
        let inner = self.inner.read().expect("scenario registry lock poisoned");
        let id = inner.default.as_ref()?;
        inner.scenarios.get(id).cloned()
    }

    pub fn contains(&self, id: &ScenarioId) -> bool {
        let inner = self.inner.read().expect("scenario registry lock poisoned");
        inner.scenarios.contains_key(id.as_str())
    }
}
