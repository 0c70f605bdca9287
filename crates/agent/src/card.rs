//! Agent card describing this agent to callers

use serde::{Deserialize, Serialize};

use crate::tools;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProvider {
    pub organization: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub push_notifications: bool,
    pub state_transition_history: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub version: String,
    pub provider: AgentProvider,
    pub capabilities: AgentCapabilities,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    /// Card for the asset management agent, one skill per tool
    pub fn asset_management() -> Self {
        let skills = tools::catalog()
            .into_iter()
            .map(|(name, description)| AgentSkill {
                id: name.to_string(),
                name: name.replace('_', " "),
                description: description.to_string(),
            })
            .collect();

        Self {
            name: "Asset Management".to_string(),
            description: "An agent that can answer questions related to a customer's managed assets."
                .to_string(),
            version: "1.0.0".to_string(),
            provider: AgentProvider {
                organization: "n-able".to_string(),
            },
            capabilities: AgentCapabilities {
                streaming: true,
                push_notifications: false,
                state_transition_history: true,
            },
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
            skills,
        }
    }
}
