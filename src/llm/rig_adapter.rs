//! Adapter bridging rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, CompletionRequestBuilder, Message};
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::provider::{
    ChatRole, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};

/// Wraps a rig completion model behind the provider trait.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        // Pricing is provider- and contract-specific; not tracked per call here.
        (Decimal::ZERO, Decimal::ZERO)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        // rig separates the system preamble, chat history, and the prompt
        // (final message). Split our flat message list accordingly.
        let mut preamble_parts: Vec<String> = Vec::new();
        let mut history: Vec<Message> = Vec::new();

        for msg in &request.messages {
            match msg.role {
                ChatRole::System => preamble_parts.push(msg.content.clone()),
                ChatRole::User => history.push(Message::user(msg.content.clone())),
                ChatRole::Assistant => history.push(Message::assistant(msg.content.clone())),
            }
        }

        let prompt = history.pop().ok_or_else(|| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: "completion request had no non-system message".to_string(),
        })?;

        let mut builder =
            CompletionRequestBuilder::new(self.model.clone(), prompt).messages(history);
        if !preamble_parts.is_empty() {
            builder = builder.preamble(preamble_parts.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature as f64);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens as u64);
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let mut content = String::new();
        for part in response.choice.iter() {
            if let AssistantContent::Text(text) = part {
                content.push_str(&text.text);
            }
        }

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}
