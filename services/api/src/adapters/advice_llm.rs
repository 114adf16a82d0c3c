//! services/api/src/adapters/advice_llm.rs
//!
//! This module contains the adapter for the sleep-advice LLM.
//! It implements the `AdviceGenerationService` port from the `core` crate
//! against any OpenAI-compatible chat-completions endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use sleep_advice_core::ports::{
    AdviceGenerationService, FragmentStream, GenerationOptions, PortError, PortResult,
};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AdviceGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAdviceAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAdviceAdapter {
    /// Creates a new `OpenAiAdviceAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn upstream(e: OpenAIError) -> PortError {
    PortError::Upstream(e.to_string())
}

//=========================================================================================
// `AdviceGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AdviceGenerationService for OpenAiAdviceAdapter {
    /// Opens a streaming chat completion and yields the text of every delta.
    async fn stream_advice(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> PortResult<FragmentStream> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(options.temperature)
            .max_completion_tokens(options.max_tokens)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and map its error into a port error.
        let mut response = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(upstream)?;

        let model = self.model.clone();
        let fragments = async_stream::stream! {
            while let Some(chunk) = response.next().await {
                match chunk {
                    Ok(chunk) => {
                        let text: String = chunk
                            .choices
                            .into_iter()
                            .filter_map(|choice| choice.delta.content)
                            .collect();
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                    Err(e) => {
                        yield Err(upstream(e));
                        break;
                    }
                }
            }
            debug!("Advice stream from {} ended.", model);
        };

        Ok(Box::pin(fragments))
    }
}
