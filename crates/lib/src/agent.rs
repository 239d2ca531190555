//! Agent turn for one inbound message: extract a search keyword with a function-call turn,
//! search POIs, then let the model summarize the search result into the reply.
//!
//! When nothing is found the user's message is first rewritten by a plain completion turn and
//! the summarization turn is run on the empty result; the search itself is never repeated.
//! Every call to the model or the POI service happens inline; nothing outlives the turn.

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::llm::{
    decode_keyword, encode_keyword, search_poi_function, ChatMessage, FunctionCallDirective,
    LlmBackend, LlmError, OpenAiClient, TurnResult, SEARCH_POI_FUNCTION,
};
use crate::poi::{PoiClient, PoiError, PoiSearch, PoiSearchResult};
use crate::reply::Reply;

/// Preamble of the not-found rewrite instruction; the user's message is appended.
pub const REWRITE_PROMPT: &str = "你是一個正在規劃旅行的人，請把以下的對話改寫成一個要問旅行社的問題，以台灣的行程為優先，內容簡潔。如果對話內容跟旅遊無關，請改成詢問台灣旅遊建議的問題。\n----\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Rewrite,
    Summarize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => f.write_str("keyword extraction"),
            Stage::Rewrite => f.write_str("rewrite"),
            Stage::Summarize => f.write_str("summarization"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{stage} turn failed: {source}")]
    Llm {
        stage: Stage,
        #[source]
        source: LlmError,
    },
    #[error("poi search failed: {0}")]
    Search(#[from] PoiError),
}

impl AgentError {
    fn llm(stage: Stage) -> impl FnOnce(LlmError) -> AgentError {
        move |source| AgentError::Llm { stage, source }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AgentError::Llm {
                source: LlmError::Timeout,
                ..
            } | AgentError::Search(PoiError::Timeout)
        )
    }
}

/// Everything one run learned about the message. Built per run and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnContext {
    pub message: String,
    /// Empty when the model did not call `search_poi` or sent unusable arguments.
    pub keyword: String,
    pub search: PoiSearchResult,
    /// Rewritten question from the not-found path.
    pub rewritten: Option<String>,
    /// Number of completion turns issued.
    pub llm_turns: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Reply,
    pub context: TurnContext,
}

/// The travel assistant. Cheap to clone; holds no per-message state.
#[derive(Clone)]
pub struct Agent {
    llm: Arc<dyn LlmBackend>,
    poi: Arc<dyn PoiSearch>,
    system_prompt: Option<String>,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmBackend>, poi: Arc<dyn PoiSearch>) -> Self {
        Self {
            llm,
            poi,
            system_prompt: None,
        }
    }

    /// Persona instruction sent as a system message on the extraction turn.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self
    }

    /// Agent backed by the configured completion endpoint and POI service.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let llm = OpenAiClient::from_config(config)?;
        log::info!("agent: using model {}", llm.model());
        let poi = PoiClient::new(&config.poi)?;
        Ok(Self::new(Arc::new(llm), Arc::new(poi))
            .with_system_prompt(config.llm.system_prompt.clone()))
    }

    /// Answer one message; failures are logged once and become [`Reply::Unavailable`].
    pub async fn respond(&self, text: &str) -> Reply {
        match self.run(text).await {
            Ok(outcome) => outcome.reply,
            Err(e) => {
                log::error!("agent: turn aborted: {}", e);
                Reply::Unavailable
            }
        }
    }

    /// Run the full protocol for one message.
    pub async fn run(&self, text: &str) -> Result<Outcome, AgentError> {
        let message = text.trim().to_string();
        let call = self.extract(&message).await?;
        let keyword = call
            .as_ref()
            .map(|c| decode_keyword(&c.arguments))
            .unwrap_or_default();
        log::debug!("agent: keyword {:?}", keyword);

        let search = if keyword.is_empty() {
            PoiSearchResult::empty()
        } else {
            self.poi.search(&keyword).await?
        };

        let mut context = TurnContext {
            message,
            keyword,
            search,
            rewritten: None,
            llm_turns: 1,
        };

        let reply = match call {
            Some(call) if !context.search.is_empty() => {
                let summary = self
                    .summarize(&context.message, call, &context.search.payload)
                    .await?;
                context.llm_turns += 1;
                Reply::Places {
                    summary,
                    places: context.search.records.clone(),
                }
            }
            _ => {
                log::debug!("agent: nothing found, taking the not-found path");
                let instruction = format!("{}{}", REWRITE_PROMPT, context.message);
                let rewritten = self
                    .llm
                    .complete(&[ChatMessage::user(instruction.as_str())], None)
                    .await
                    .and_then(TurnResult::into_text)
                    .map_err(AgentError::llm(Stage::Rewrite))?;
                log::debug!("agent: rewritten question {:?}", rewritten);
                context.rewritten = Some(rewritten);
                context.llm_turns += 1;

                let empty_call = FunctionCallDirective {
                    name: SEARCH_POI_FUNCTION.to_string(),
                    arguments: encode_keyword(&context.keyword),
                };
                let text = self
                    .summarize(&instruction, empty_call, &context.search.payload)
                    .await?;
                context.llm_turns += 1;
                Reply::Text(text)
            }
        };

        Ok(Outcome { reply, context })
    }

    /// Function-call turn. `None` when the model answered in text, called something else or
    /// returned no choices; transport and decode failures abort.
    async fn extract(&self, message: &str) -> Result<Option<FunctionCallDirective>, AgentError> {
        let mut transcript = Vec::with_capacity(2);
        if let Some(ref prompt) = self.system_prompt {
            transcript.push(ChatMessage::system(prompt.as_str()));
        }
        transcript.push(ChatMessage::user(message));

        let function = search_poi_function();
        match self.llm.complete(&transcript, Some(&function)).await {
            Ok(TurnResult::FunctionCall(call)) if call.name == SEARCH_POI_FUNCTION => Ok(Some(call)),
            Ok(TurnResult::FunctionCall(call)) => {
                log::warn!("agent: model called unknown function {}", call.name);
                Ok(None)
            }
            Ok(TurnResult::Text(_)) => {
                log::debug!("agent: model answered without calling {}", SEARCH_POI_FUNCTION);
                Ok(None)
            }
            Err(LlmError::NoChoices) => {
                log::warn!("agent: extraction turn returned no choices");
                Ok(None)
            }
            Err(e) => Err(AgentError::llm(Stage::Extract)(e)),
        }
    }

    /// Replay user turn, function call and function result; the model's text is the answer.
    async fn summarize(
        &self,
        user_turn: &str,
        call: FunctionCallDirective,
        payload: &str,
    ) -> Result<String, AgentError> {
        let transcript = [
            ChatMessage::user(user_turn),
            ChatMessage::function_call(call),
            ChatMessage::function_result(SEARCH_POI_FUNCTION, payload),
        ];
        let function = search_poi_function();
        self.llm
            .complete(&transcript, Some(&function))
            .await
            .and_then(TurnResult::into_text)
            .map_err(AgentError::llm(Stage::Summarize))
    }
}
