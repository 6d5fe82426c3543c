use serde::{Deserialize, Serialize};

use super::message::{FunctionCall, ToolCall};

/// Definition of a tool the model can call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (currently always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function specification
    pub function: FunctionDefinition,
}

/// Specification of a callable function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the function parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// How the model should select tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// Simple mode: "none", "auto", or "required"
    Mode(ToolChoiceMode),
    /// Force a specific function by name
    Function {
        /// Function to call
        name: String,
    },
}

/// Tool selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    /// Model will not call any tools
    None,
    /// Model decides whether to call tools
    Auto,
    /// Model must call at least one tool
    Required,
}

/// An externally resolved tool the model may invoke during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    /// Stable identifier assigned by the tool host
    pub id: String,
    /// Name exposed to the model
    pub name: String,
    /// Server that hosts the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool input
    #[serde(default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

impl McpTool {
    /// Whether a model-issued call name refers to this tool
    pub fn matches(&self, call_name: &str) -> bool {
        self.name == call_name || self.id == call_name
    }
}

impl From<&McpTool> for ToolDefinition {
    fn from(tool: &McpTool) -> Self {
        Self {
            tool_type: "function".to_owned(),
            function: FunctionDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: Some(tool.input_schema.clone()),
            },
        }
    }
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// A fully accumulated tool call issued by the model
///
/// Arguments are always a parsed JSON value; malformed argument text is
/// replaced by an empty object before a `ToolUse` is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    /// Call identifier assigned by the vendor (or synthesized)
    pub id: String,
    /// Tool name as issued by the model
    pub name: String,
    /// Parsed arguments
    pub arguments: serde_json::Value,
}

impl ToolUse {
    /// Representation stored in the assistant message history
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall {
            id: self.id.clone(),
            function: FunctionCall {
                name: self.name.clone(),
                arguments: self.arguments.to_string(),
            },
        }
    }
}

/// Executed result of a [`ToolUse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The call this responds to
    pub tool_use: ToolUse,
    /// Id of the tool that handled the call
    pub tool_id: String,
    /// Result content handed back to the model
    pub content: String,
    /// Whether the tool failed
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResponse {
    /// Successful tool output
    pub fn success(tool_use: ToolUse, tool: &McpTool, content: impl Into<String>) -> Self {
        Self {
            tool_use,
            tool_id: tool.id.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Failed tool invocation, reported back to the model
    pub fn failure(tool_use: ToolUse, tool: &McpTool, message: impl Into<String>) -> Self {
        Self {
            tool_use,
            tool_id: tool.id.clone(),
            content: message.into(),
            is_error: true,
        }
    }
}
