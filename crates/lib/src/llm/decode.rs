//! Decoding of `/chat/completions` response bodies and function-call arguments.

use serde::{Deserialize, Serialize};

use super::types::{FunctionCallDirective, MessageContent, TurnResult};
use super::LlmError;

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: MessageContent,
    #[serde(default)]
    function_call: Option<FunctionCallDirective>,
}

/// Arguments object of `search_poi`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SearchPoiArguments {
    #[serde(default)]
    keyword: String,
}

/// Decode a completion body into the top choice's turn. A function call takes
/// precedence over text; a message with neither is malformed.
pub fn decode_completion(body: &[u8]) -> Result<TurnResult, LlmError> {
    let response: CompletionResponse =
        serde_json::from_slice(body).map_err(|e| LlmError::Decode(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::NoChoices)?;
    let message = choice
        .message
        .ok_or_else(|| LlmError::Decode("choice has no message".to_string()))?;
    if let Some(call) = message.function_call {
        if !call.name.trim().is_empty() {
            return Ok(TurnResult::FunctionCall(call));
        }
    }
    match message.content {
        MessageContent::Text(text) if !text.trim().is_empty() => Ok(TurnResult::Text(text)),
        _ => Err(LlmError::Decode(
            "message has neither content nor function_call".to_string(),
        )),
    }
}

/// Keyword from `search_poi` arguments. Empty or malformed arguments yield "".
pub fn decode_keyword(arguments: &str) -> String {
    if arguments.trim().is_empty() {
        return String::new();
    }
    match serde_json::from_str::<SearchPoiArguments>(arguments) {
        Ok(args) => args.keyword.trim().to_string(),
        Err(e) => {
            log::debug!("llm: unparsable search_poi arguments {:?}: {}", arguments, e);
            String::new()
        }
    }
}

/// Arguments JSON for a `search_poi` call with the given keyword.
pub fn encode_keyword(keyword: &str) -> String {
    serde_json::json!({ "keyword": keyword }).to_string()
}
