//! Process-wide set of agents resolved by name.

use std::collections::HashMap;
use std::sync::Arc;

use agent_primitives::AgentName;
use tracing::debug;

use crate::agent::Agent;
use crate::error::{KernelError, KernelResult};

/// Immutable collection of agents, built once at startup.
///
/// Handoff targets are checked when the registry is built, so every declared
/// target of a registered agent resolves at run time.
#[derive(Debug, Default, Clone)]
pub struct AgentRegistry {
    agents: HashMap<AgentName, Arc<Agent>>,
    order: Vec<AgentName>,
}

impl AgentRegistry {
    /// Starts an empty registry builder.
    #[must_use]
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    /// Builds a registry from the supplied agents.
    ///
    /// # Errors
    ///
    /// See [`AgentRegistryBuilder::build`].
    pub fn from_agents<I>(agents: I) -> KernelResult<Self>
    where
        I: IntoIterator<Item = Agent>,
    {
        agents
            .into_iter()
            .fold(Self::builder(), AgentRegistryBuilder::with_agent)
            .build()
    }

    /// Returns the agent registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Agent>> {
        self.agents.get(name)
    }

    /// Returns the agent registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownAgent`] when no such agent exists.
    pub fn require(&self, name: &str) -> KernelResult<Arc<Agent>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| KernelError::UnknownAgent {
                name: name.to_owned(),
            })
    }

    /// Returns `true` when an agent with `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Returns agent names in registration order.
    #[must_use]
    pub fn names(&self) -> &[AgentName] {
        &self.order
    }

    /// Returns the number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` when the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Collects agents before validation.
#[derive(Debug, Default)]
pub struct AgentRegistryBuilder {
    agents: Vec<Agent>,
}

impl AgentRegistryBuilder {
    /// Adds an agent.
    #[must_use]
    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    /// Validates names and handoff targets and freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::DuplicateAgent`] when two agents share a name and
    /// [`KernelError::UnknownHandoffTarget`] when a handoff names an agent
    /// that was not added.
    pub fn build(self) -> KernelResult<AgentRegistry> {
        let mut registry = AgentRegistry::default();
        for agent in self.agents {
            let name = agent.name().clone();
            if registry.agents.contains_key(&name) {
                return Err(KernelError::DuplicateAgent {
                    name: name.to_string(),
                });
            }
            registry.order.push(name.clone());
            registry.agents.insert(name, Arc::new(agent));
        }

        for agent in registry.agents.values() {
            if let Some(missing) = agent
                .handoffs()
                .iter()
                .find(|handoff| !registry.agents.contains_key(&handoff.target))
            {
                return Err(KernelError::UnknownHandoffTarget {
                    agent: agent.name().to_string(),
                    target: missing.target.to_string(),
                });
            }
        }

        debug!(agents = registry.len(), "agent registry built");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str, handoffs: &[&str]) -> Agent {
        handoffs
            .iter()
            .fold(Agent::builder(name), |builder, target| {
                builder.with_handoff(*target)
            })
            .build()
            .unwrap()
    }

    #[test]
    fn cyclic_handoffs_resolve() {
        let registry = AgentRegistry::from_agents([
            agent("Triage", &["Billing", "Support"]),
            agent("Billing", &["Triage"]),
            agent("Support", &["Triage"]),
        ])
        .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.names()[0].as_str(), "Triage");
        let billing = registry.require("Billing").unwrap();
        assert!(billing.handoff_target("Triage").is_some());
        assert!(registry.contains("Support"));
        assert!(matches!(
            registry.require("Nobody"),
            Err(KernelError::UnknownAgent { .. })
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = AgentRegistry::from_agents([agent("Triage", &[]), agent("Triage", &[])])
            .expect_err("duplicate");
        assert!(matches!(err, KernelError::DuplicateAgent { name } if name == "Triage"));
    }

    #[test]
    fn unknown_handoff_targets_are_rejected() {
        let err = AgentRegistry::from_agents([agent("Triage", &["Ghost"])]).expect_err("ghost");
        assert!(matches!(
            err,
            KernelError::UnknownHandoffTarget { target, .. } if target == "Ghost"
        ));
    }
}
