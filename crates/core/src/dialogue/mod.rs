pub mod machine;
pub mod states;

pub use machine::{context_hint, DialogueMachine};
pub use states::{
    AssistantCue, DialogueSignals, DialogueState, DialogueTransition, TurnOutcome, UserCue,
};
