//! Validated names for agents and tools.
//!
//! Agent names are display names ("Sales Agent") and only need to be
//! non-blank and bounded. Tool names are shown to the model as callable
//! identifiers and are restricted to a conservative character set.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_AGENT_NAME_LEN: usize = 96;
const MAX_TOOL_NAME_LEN: usize = 64;

/// Unique name of an agent within a registry.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    /// Creates a new agent name after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAgentName`] if the name is blank, too long, or
    /// contains control characters.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidAgentName {
                name,
                reason: "name cannot be empty".into(),
            });
        }

        if name.len() > MAX_AGENT_NAME_LEN {
            return Err(Error::InvalidAgentName {
                name,
                reason: format!("name length must be <= {MAX_AGENT_NAME_LEN}"),
            });
        }

        if name.chars().any(char::is_control) {
            return Err(Error::InvalidAgentName {
                name,
                reason: "name cannot contain control characters".into(),
            });
        }

        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AgentName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AgentName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgentName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AgentName> for String {
    fn from(value: AgentName) -> Self {
        value.0
    }
}

/// Name of a tool, unique within the owning agent.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolName(String);

impl ToolName {
    /// Creates a new tool name after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToolName`] if the name is empty, too long, or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidToolName {
                name,
                reason: "name cannot be empty".into(),
            });
        }

        if name.len() > MAX_TOOL_NAME_LEN {
            return Err(Error::InvalidToolName {
                name,
                reason: format!("name length must be <= {MAX_TOOL_NAME_LEN}"),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(Error::InvalidToolName {
                name,
                reason: "name must contain ascii alphanumeric, dash, or underscore".into(),
            });
        }

        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ToolName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ToolName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ToolName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ToolName> for String {
    fn from(value: ToolName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_names_allow_display_text() {
        let name = AgentName::new("Tech Support Agent").unwrap();
        assert_eq!(name.as_str(), "Tech Support Agent");
    }

    #[test]
    fn rejects_blank_agent_name() {
        let err = AgentName::new("   ").expect_err("blank should fail");
        assert!(matches!(err, Error::InvalidAgentName { .. }));
    }

    #[test]
    fn tool_names_are_identifiers() {
        assert!(ToolName::new("research_topic").is_ok());
        assert!(ToolName::new("edit-text").is_ok());
        let err = ToolName::new("edit text").expect_err("space should fail");
        assert!(matches!(err, Error::InvalidToolName { .. }));
        assert!(ToolName::new("").is_err());
        assert!(ToolName::new("x".repeat(65)).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: AgentName = serde_json::from_str("\"Triage Agent\"").unwrap();
        assert_eq!(ok.as_str(), "Triage Agent");
        assert!(serde_json::from_str::<ToolName>("\"bad name\"").is_err());
    }
}
