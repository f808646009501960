//! Agent Runtime - model-assisted reply generation around a deterministic cart
//!
//! This crate wires the conversation pipeline together:
//! - Routes each message through the deterministic fast paths in `ordermate-core`
//! - Drafts free-form replies with an LLM, evaluates and retries them
//! - Filters model-proposed cart items before they reach the cart engine
//! - Repairs replies that misreport the cart or leak evaluation output
//!
//! # Architecture
//!
//! 1. **Prompting** (`prompt`) - Tera templates over menu, cart and history
//! 2. **Generation** (`orchestrator`) - bounded attempts with evaluator feedback
//! 3. **Evaluation** (`evaluator`, `learning`) - rubric checks, optional model judge
//! 4. **Guardrails** (`guardrails`) - which proposed items may be added
//! 5. **Post-processing** (`postprocess`) - ordered reply repair policies
//! 6. **Runtime** (`runtime`) - one inbound message in, one reply out
//!
//! # Safety Principle
//!
//! The LLM is strictly a drafter. It NEVER decides prices, totals or whether
//! an order is placed. Those are deterministic decisions made by the cart engine.

pub mod evaluator;
pub mod guardrails;
pub mod learning;
pub mod llm;
pub mod orchestrator;
pub mod postprocess;
pub mod prompt;
pub mod providers;
pub mod runtime;

#[cfg(test)]
mod testing;

pub use llm::{LlmClient, LlmError};
pub use orchestrator::{Generation, OrchestratorSettings, ResponseOrchestrator};
pub use providers::client_from_config;
pub use runtime::{ConversationRuntime, RuntimeBuilder, RuntimeDeps, RuntimeError};
