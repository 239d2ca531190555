//! LLM abstraction and the OpenAI-compatible completion client.
//!
//! One request/response turn per call, either plain completion or with a declared function
//! the model may ask to invoke. No retries or caching at this layer.

mod decode;
mod openai;
mod types;

use async_trait::async_trait;

pub use decode::{decode_completion, decode_keyword, encode_keyword};
pub use openai::OpenAiClient;
pub use types::{
    search_poi_function, ChatMessage, FunctionCallDirective, FunctionDefinition, MessageContent,
    Role, TurnKind, TurnResult, SEARCH_POI_FUNCTION,
};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("completion request could not be encoded: {0}")]
    Marshal(#[source] serde_json::Error),
    #[error("completion request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("completion request timed out")]
    Timeout,
    #[error("completion api error: {status} {body}")]
    Status { status: u16, body: String },
    #[error("reading completion response failed: {0}")]
    BodyRead(#[source] reqwest::Error),
    #[error("malformed completion response: {0}")]
    Decode(String),
    #[error("completion returned no choices")]
    NoChoices,
    #[error("expected {expected} from completion, model returned {returned}")]
    UnexpectedTurn {
        expected: TurnKind,
        returned: TurnKind,
    },
    #[error("completion transcript is empty")]
    EmptyTranscript,
}

impl LlmError {
    fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Transport(e)
        }
    }

    fn from_body(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::BodyRead(e)
        }
    }
}

/// A chat completion backend. `function` declares at most one callable function; when
/// present the model may answer with a function call instead of text.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(
        &self,
        transcript: &[ChatMessage],
        function: Option<&FunctionDefinition>,
    ) -> Result<TurnResult, LlmError>;
}
