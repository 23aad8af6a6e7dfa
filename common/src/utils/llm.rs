use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestUserMessage, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;

use crate::{error::AppError, utils::config::AppConfig};

/// Text generation capability consumed by the query engines.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier reported by health checks.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, AppError>;
}

/// Chat-completions backed generator for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct LlmProvider {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    max_output_tokens: u32,
}

impl LlmProvider {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: String, max_output_tokens: u32) -> Self {
        Self {
            client,
            model,
            max_output_tokens,
        }
    }

    pub fn from_config(config: &AppConfig, client: Arc<Client<OpenAIConfig>>) -> Self {
        Self::new(
            client,
            config.generation_model.clone(),
            config.max_output_tokens,
        )
    }

    fn build_request(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> Result<CreateChatCompletionRequest, AppError> {
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestUserMessage::from(prompt.to_owned()).into()])
            .temperature(temperature)
            .max_completion_tokens(self.max_output_tokens)
            .build()
            .map_err(|err| AppError::Generation(format!("invalid chat request: {err}")))
    }
}

#[async_trait]
impl Generator for LlmProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, AppError> {
        let request = self.build_request(prompt, temperature)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|err| AppError::Generation(err.to_string()))?;

        let answer = first_message_content(response)?;
        debug!(
            model = %self.model,
            temperature,
            answer_chars = answer.chars().count(),
            "generation completed"
        );
        Ok(answer)
    }
}

fn first_message_content(response: CreateChatCompletionResponse) -> Result<String, AppError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AppError::Generation("No content found in LLM response".into()))
}

/// Generator doubles shared by the test suites of dependent crates.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::Generator;
    use crate::error::AppError;

    /// Returns a fixed answer and records every prompt it receives.
    pub struct ScriptedGenerator {
        answer: String,
        calls: Mutex<Vec<(String, f32)>>,
        failure: Mutex<Option<String>>,
    }

    impl ScriptedGenerator {
        pub fn new(answer: impl Into<String>) -> Self {
            Self {
                answer: answer.into(),
                calls: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
            }
        }

        /// Makes the next call fail with a generation error carrying `message`.
        pub fn fail_next(&self, message: impl Into<String>) {
            if let Ok(mut failure) = self.failure.lock() {
                *failure = Some(message.into());
            }
        }

        /// Prompts and temperatures received so far, oldest first.
        pub fn calls(&self) -> Vec<(String, f32)> {
            self.calls
                .lock()
                .map(|calls| calls.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, AppError> {
            if let Some(message) = self.failure.lock().ok().and_then(|mut f| f.take()) {
                return Err(AppError::Generation(message));
            }
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((prompt.to_owned(), temperature));
            }
            Ok(self.answer.clone())
        }
    }
}
