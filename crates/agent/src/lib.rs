//! Conversation and policy orchestration for Discovery AI.
//!
//! One chat turn flows through four parts:
//!
//! 1. **Inject**: [`IntentPolicyInjector`] may append the mandatory
//!    email instruction to the user's message
//! 2. **Assemble**: [`PromptAssembler`] pairs the rendered system template
//!    with that message
//! 3. **Converse**: [`ModelOrchestrator`] splices in conversation memory,
//!    calls the model with the tool registry and runs its tool calls
//! 4. **Classify**: [`ComplianceClassifier`] guesses from the reply whether
//!    the email went out
//!
//! The injector and the classifier are plain string heuristics kept apart
//! from the orchestration flow so either can be replaced without touching
//! the other steps.

pub mod compliance;
pub mod orchestrator;
pub mod policy;
pub mod prompt;

#[cfg(test)]
mod test_helpers;

pub use compliance::{ComplianceClassifier, ComplianceVerdict};
pub use orchestrator::{FailureKind, ModelOrchestrator, TurnOutcome};
pub use policy::{Injection, IntentPolicyInjector, PolicyMode, PolicyTrigger};
pub use prompt::{Prompt, PromptAssembler, PromptError, SystemTemplate};
