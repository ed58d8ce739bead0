//! This crate provides the core logic for a formal-language simulator.
//! It includes step-by-step simulators for finite automata, pushdown automata and
//! Turing machines, a bounded derivation search for context-free grammars, and modules
//! for parsing, validating and loading their definitions.

pub mod analyzer;
pub mod cfg;
pub mod fa;
pub mod loader;
pub mod parser;
pub mod pda;
pub mod program;
pub mod tm;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the `analyze` function and `AnalysisError` enum from the analyzer module.
pub use analyzer::{analyze, AnalysisError};
pub use cfg::{CfgResult, DerivationStep, Deriver};
pub use fa::{determinize, FaResult, FaSimulator, FaStep};
/// Re-exports the `ProgramLoader` struct from the loader module.
pub use loader::ProgramLoader;
/// Re-exports the `parse` function from the parser module.
pub use parser::parse;
pub use pda::{PdaResult, PdaSimulator, PdaStep};
pub use program::{Machine, Program, Run};
pub use tm::{Tape, TmResult, TmSimulator, TmStep};
/// Re-exports the definition, budget and error types from the types module.
pub use types::{
    Budget, CancelToken, Config, ContextFreeGrammar, Direction, EpsilonMode, FaMode,
    FiniteAutomaton, FormalLanguageError, Outcome, PdaMode, Production, PushdownAutomaton,
    Symbol, TuringMachine, EPSILON, MAX_PROGRAM_SIZE,
};
