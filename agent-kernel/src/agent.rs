//! Immutable agent definitions.

use agent_adapters::traits::{HandoffDeclaration, ToolDeclaration};
use agent_policy::{Guardrail, GuardrailPipeline};
use agent_primitives::AgentName;
use agent_tools::registry::{ToolBinding, ToolRegistry};

use crate::error::{KernelError, KernelResult};

/// Bundle of instructions, tools, guardrails, and handoff targets.
///
/// Agents never change after [`AgentBuilder::build`]; runs share them through
/// `Arc<Agent>` without synchronisation. Handoff targets are held by name and
/// resolved through the [`AgentRegistry`](crate::AgentRegistry), which lets
/// agents refer to each other in cycles.
#[derive(Debug, Clone)]
pub struct Agent {
    name: AgentName,
    instructions: String,
    tools: ToolRegistry,
    input_guardrails: GuardrailPipeline,
    output_guardrails: GuardrailPipeline,
    handoffs: Vec<HandoffDeclaration>,
}

impl Agent {
    /// Starts building an agent with the supplied display name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// Returns the agent name.
    #[must_use]
    pub fn name(&self) -> &AgentName {
        &self.name
    }

    /// Returns the system instructions given to the model.
    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Returns the bound tools.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Returns the checks applied to the run input.
    #[must_use]
    pub fn input_guardrails(&self) -> &GuardrailPipeline {
        &self.input_guardrails
    }

    /// Returns the checks applied to the final output.
    #[must_use]
    pub fn output_guardrails(&self) -> &GuardrailPipeline {
        &self.output_guardrails
    }

    /// Returns the declared handoff targets.
    #[must_use]
    pub fn handoffs(&self) -> &[HandoffDeclaration] {
        &self.handoffs
    }

    /// Finds a declared handoff target by exact name.
    #[must_use]
    pub fn handoff_target(&self, name: &str) -> Option<&AgentName> {
        self.handoffs
            .iter()
            .map(|handoff| &handoff.target)
            .find(|target| target.as_str() == name)
    }

    /// Describes the bound tools for the model gateway.
    #[must_use]
    pub fn tool_declarations(&self) -> Vec<ToolDeclaration> {
        self.tools
            .list()
            .into_iter()
            .map(|metadata| ToolDeclaration {
                name: metadata.name().as_str().to_owned(),
                description: metadata.description().map(str::to_owned),
                parameters: metadata.parameters().clone(),
            })
            .collect()
    }
}

/// Builder for [`Agent`].
#[derive(Debug)]
pub struct AgentBuilder {
    name: String,
    instructions: String,
    tools: Vec<ToolBinding>,
    input_guardrails: GuardrailPipeline,
    output_guardrails: GuardrailPipeline,
    handoffs: Vec<(String, Option<String>)>,
}

impl AgentBuilder {
    /// Creates a builder with empty instructions, tools, and guardrails.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: String::new(),
            tools: Vec::new(),
            input_guardrails: GuardrailPipeline::new(),
            output_guardrails: GuardrailPipeline::new(),
            handoffs: Vec::new(),
        }
    }

    /// Sets the system instructions.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Binds a tool.
    #[must_use]
    pub fn with_tool(mut self, binding: ToolBinding) -> Self {
        self.tools.push(binding);
        self
    }

    /// Binds several tools, keeping their order.
    #[must_use]
    pub fn with_tools<I>(mut self, bindings: I) -> Self
    where
        I: IntoIterator<Item = ToolBinding>,
    {
        self.tools.extend(bindings);
        self
    }

    /// Appends an input check.
    #[must_use]
    pub fn with_input_guardrail<G>(mut self, guardrail: G) -> Self
    where
        G: Guardrail + 'static,
    {
        self.input_guardrails = self.input_guardrails.with_check(guardrail);
        self
    }

    /// Appends an output check.
    #[must_use]
    pub fn with_output_guardrail<G>(mut self, guardrail: G) -> Self
    where
        G: Guardrail + 'static,
    {
        self.output_guardrails = self.output_guardrails.with_check(guardrail);
        self
    }

    /// Replaces the input pipeline.
    #[must_use]
    pub fn with_input_pipeline(mut self, pipeline: GuardrailPipeline) -> Self {
        self.input_guardrails = pipeline;
        self
    }

    /// Replaces the output pipeline.
    #[must_use]
    pub fn with_output_pipeline(mut self, pipeline: GuardrailPipeline) -> Self {
        self.output_guardrails = pipeline;
        self
    }

    /// Declares a peer agent the model may transfer control to.
    #[must_use]
    pub fn with_handoff(mut self, target: impl Into<String>) -> Self {
        self.handoffs.push((target.into(), None));
        self
    }

    /// Declares a handoff target together with when to pick it.
    #[must_use]
    pub fn with_handoff_described(
        mut self,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.handoffs.push((target.into(), Some(description.into())));
        self
    }

    /// Validates the definition and produces the immutable agent.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidName`] for an invalid agent or target
    /// name, [`KernelError::Tool`] when tool registration fails (duplicate
    /// names, invalid schema), and [`KernelError::InvalidHandoff`] for
    /// self-handoffs or duplicated targets.
    pub fn build(self) -> KernelResult<Agent> {
        let name = AgentName::new(self.name)?;

        let mut tools = ToolRegistry::new();
        for binding in self.tools {
            tools
                .register_binding(binding)
                .map_err(|source| KernelError::Tool {
                    agent: name.to_string(),
                    source,
                })?;
        }

        let mut handoffs: Vec<HandoffDeclaration> = Vec::with_capacity(self.handoffs.len());
        for (target, description) in self.handoffs {
            let target = AgentName::new(target)?;
            if target == name {
                return Err(KernelError::InvalidHandoff {
                    agent: name.to_string(),
                    reason: "an agent cannot hand off to itself".into(),
                });
            }
            if handoffs.iter().any(|existing| existing.target == target) {
                return Err(KernelError::InvalidHandoff {
                    agent: name.to_string(),
                    reason: format!("target `{target}` declared twice"),
                });
            }
            handoffs.push(HandoffDeclaration {
                target,
                description,
            });
        }

        Ok(Agent {
            name,
            instructions: self.instructions,
            tools,
            input_guardrails: self.input_guardrails,
            output_guardrails: self.output_guardrails,
            handoffs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_policy::{MaxLengthGuardrail, Severity};
    use agent_tools::registry::ToolMetadata;
    use serde_json::Value;

    fn echo(name: &str) -> ToolBinding {
        ToolBinding::new(
            ToolMetadata::new(name).unwrap().with_description("echo"),
            |input: Value| async move { Ok(input) },
        )
    }

    #[test]
    fn builds_agent() {
        let agent = Agent::builder("Triage Agent")
            .with_instructions("Route the request")
            .with_tool(echo("lookup"))
            .with_input_guardrail(MaxLengthGuardrail::new(100, Severity::Tripwire).unwrap())
            .with_handoff_described("Sales Agent", "pricing questions")
            .with_handoff("Support Agent")
            .build()
            .unwrap();

        assert_eq!(agent.name().as_str(), "Triage Agent");
        assert_eq!(agent.tool_declarations()[0].name, "lookup");
        assert_eq!(agent.input_guardrails().len(), 1);
        assert!(agent.output_guardrails().is_empty());
        assert!(agent.handoff_target("Sales Agent").is_some());
        assert!(agent.handoff_target("sales agent").is_none());
        assert_eq!(
            agent.handoffs()[0].description.as_deref(),
            Some("pricing questions")
        );
    }

    #[test]
    fn duplicate_tools_are_rejected() {
        let err = Agent::builder("Agent")
            .with_tool(echo("lookup"))
            .with_tool(echo("lookup"))
            .build()
            .expect_err("duplicate tool");
        assert!(matches!(err, KernelError::Tool { .. }));
    }

    #[test]
    fn invalid_handoffs_are_rejected() {
        let err = Agent::builder("Agent")
            .with_handoff("Agent")
            .build()
            .expect_err("self handoff");
        assert!(matches!(err, KernelError::InvalidHandoff { .. }));

        let err = Agent::builder("Agent")
            .with_handoff("Other")
            .with_handoff("Other")
            .build()
            .expect_err("duplicate target");
        assert!(matches!(err, KernelError::InvalidHandoff { .. }));

        let err = Agent::builder("  ").build().expect_err("blank name");
        assert!(matches!(err, KernelError::InvalidName(_)));
    }
}
