//! Chat transcript and turn types shared by the completion client, decoder and agent.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::LlmError;

/// Name of the single function the extraction turn declares.
pub const SEARCH_POI_FUNCTION: &str = "search_poi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

/// Message content as the completion API sends it: a string, or `null` when the
/// assistant answered with a function call instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    #[default]
    Absent,
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s.as_str()),
            MessageContent::Absent => None,
        }
    }
}

impl Serialize for MessageContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MessageContent::Text(s) => serializer.serialize_str(s),
            MessageContent::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            None | Some(serde_json::Value::Null) => Ok(MessageContent::Absent),
            Some(serde_json::Value::String(s)) => Ok(MessageContent::Text(s)),
            Some(other) => Err(serde::de::Error::custom(format!(
                "unsupported message content: {}",
                other
            ))),
        }
    }
}

/// A function invocation requested by the model. `arguments` is the raw JSON text the
/// model produced; it is only parsed when the keyword is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallDirective {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// One transcript entry in the wire shape of `/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
    /// Function name on `function` role messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallDirective>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
            name: None,
            function_call: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn that carries a function call and no text.
    pub fn function_call(call: FunctionCallDirective) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Absent,
            name: None,
            function_call: Some(call),
        }
    }

    /// Function-result turn replaying what `name` returned.
    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: MessageContent::Text(content.into()),
            name: Some(name.into()),
            function_call: None,
        }
    }
}

/// Function declaration offered to the model (OpenAI `functions` entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// `search_poi(keyword: string)`, the only function the bot declares.
pub fn search_poi_function() -> FunctionDefinition {
    FunctionDefinition {
        name: SEARCH_POI_FUNCTION.to_string(),
        description: Some("Get the keyword about travel information".to_string()),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "keyword": {
                    "type": "string",
                    "description": "The city, district or attraction to search for, e.g. 台北 or 日月潭"
                }
            },
            "required": ["keyword"]
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    FunctionCall,
    Text,
}

impl fmt::Display for TurnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnKind::FunctionCall => f.write_str("a function call"),
            TurnKind::Text => f.write_str("text content"),
        }
    }
}

/// Outcome of one completed completion turn: exactly one of the two is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnResult {
    FunctionCall(FunctionCallDirective),
    Text(String),
}

impl TurnResult {
    pub fn kind(&self) -> TurnKind {
        match self {
            TurnResult::FunctionCall(_) => TurnKind::FunctionCall,
            TurnResult::Text(_) => TurnKind::Text,
        }
    }

    pub fn into_function_call(self) -> Result<FunctionCallDirective, LlmError> {
        match self {
            TurnResult::FunctionCall(call) => Ok(call),
            TurnResult::Text(_) => Err(LlmError::UnexpectedTurn {
                expected: TurnKind::FunctionCall,
                returned: TurnKind::Text,
            }),
        }
    }

    pub fn into_text(self) -> Result<String, LlmError> {
        match self {
            TurnResult::Text(text) => Ok(text),
            TurnResult::FunctionCall(_) => Err(LlmError::UnexpectedTurn {
                expected: TurnKind::Text,
                returned: TurnKind::FunctionCall,
            }),
        }
    }
}
