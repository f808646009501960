use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use ordermate_core::config::AppConfig;

use crate::evaluator::{Evaluation, Evaluator};
use crate::learning::LearningLog;
use crate::llm::{DraftFields, LlmClient, LlmError, LlmOutput};
use crate::prompt::{PromptBuilder, PromptInput};

#[derive(Clone, Debug, PartialEq)]
pub struct OrchestratorSettings {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
    pub evaluation_enabled: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.llm.max_attempts.max(1),
            timeout: Duration::from_secs(config.llm.timeout_secs.max(1)),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            evaluation_enabled: config.evaluation.enabled,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Generation {
    /// `evaluation` is `None` when evaluation is switched off.
    Drafted { draft: DraftFields, evaluation: Option<Evaluation>, attempts: u32 },
    Failed { attempts: u32, error: LlmError },
}

pub struct ResponseOrchestrator {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptBuilder>,
    evaluator: Arc<dyn Evaluator>,
    learning: Arc<LearningLog>,
    settings: OrchestratorSettings,
}

impl ResponseOrchestrator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompts: Arc<PromptBuilder>,
        evaluator: Arc<dyn Evaluator>,
        learning: Arc<LearningLog>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self { client, prompts, evaluator, learning, settings }
    }

    pub fn learning_focus(&self) -> Option<String> {
        self.learning.focus()
    }

    /// Up to `max_attempts` drafts. Failed feedback is appended to the next
    /// prompt; if no draft passes, the last one is used with the evaluator's
    /// suggestion in place of its text.
    pub async fn build_reply(&self, input: &PromptInput<'_>) -> Generation {
        let mut feedback: Vec<String> = Vec::new();
        let mut rejected: Option<(DraftFields, Evaluation)> = None;
        let mut last_error = LlmError::Transport("no attempt made".to_string());
        let mut attempts = 0;

        while attempts < self.settings.max_attempts {
            attempts += 1;
            let request = match self.prompts.completion(
                input,
                &feedback,
                self.settings.temperature,
                self.settings.max_tokens,
            ) {
                Ok(request) => request,
                Err(error) => {
                    last_error = LlmError::InvalidResponse(format!("prompt render: {error}"));
                    break;
                }
            };

            let raw = match tokio::time::timeout(self.settings.timeout, self.client.complete(&request)).await {
                Ok(Ok(raw)) => raw,
                Ok(Err(error)) => {
                    warn!(
                        event_name = "orchestrator.attempt.failed",
                        attempt = attempts,
                        model = self.client.model_id(),
                        error = %error,
                        "llm call failed"
                    );
                    let retryable = error.is_retryable();
                    last_error = error;
                    if !retryable {
                        break;
                    }
                    continue;
                }
                Err(_) => {
                    let elapsed_ms = self.settings.timeout.as_millis() as u64;
                    warn!(
                        event_name = "orchestrator.attempt.timeout",
                        attempt = attempts,
                        timeout_ms = elapsed_ms,
                        "llm call timed out"
                    );
                    last_error = LlmError::Timeout(elapsed_ms);
                    continue;
                }
            };

            let output = LlmOutput::parse(&raw);
            if matches!(output, LlmOutput::PlainText(_)) {
                debug!(event_name = "orchestrator.output.plain_text", attempt = attempts, "model ignored the JSON contract");
            }
            let draft = output.into_fields();

            if !self.settings.evaluation_enabled {
                return Generation::Drafted { draft, evaluation: None, attempts };
            }

            let evaluation = self.evaluator.check(&draft, input, attempts).await;
            self.learning.record(&evaluation);
            if evaluation.pass {
                info!(event_name = "orchestrator.draft.accepted", attempts, "draft passed evaluation");
                return Generation::Drafted { draft, evaluation: Some(evaluation), attempts };
            }

            info!(
                event_name = "orchestrator.draft.rejected",
                attempt = attempts,
                feedback = %evaluation.feedback,
                "draft failed evaluation"
            );
            feedback.push(evaluation.feedback.clone());
            rejected = Some((draft, evaluation));
        }

        match rejected {
            Some((mut draft, evaluation)) => {
                if let Some(suggestion) = &evaluation.suggestion {
                    draft.reply_text = suggestion.clone();
                }
                Generation::Drafted { draft, evaluation: Some(evaluation), attempts }
            }
            None => Generation::Failed { attempts, error: last_error },
        }
    }
}
