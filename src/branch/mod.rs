pub mod controller;
pub mod validator;

pub use controller::{
    BranchCreationController, FlowFailure, FlowFailureKind, FlowOutcome, FlowState, Prompter,
    RecoveryAction, Selection, SuggestionSource,
};
pub use validator::{validate_branch_name, BranchNameError};
