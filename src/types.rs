//! This module defines the core data structures shared by every simulator: symbols and
//! reserved markers, the four machine definitions, run budgets, configuration and the
//! error type.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::Rule;

/// An atomic input, stack or tape token.
pub type Symbol = char;

/// The marker for "consume nothing" / "no specific stack top" / empty production.
pub const EPSILON: Symbol = 'ε';
/// The blank symbol used when a Turing machine definition does not name one.
pub const DEFAULT_BLANK_SYMBOL: Symbol = '_';
/// The maximum allowed size for a textual definition in bytes.
pub const MAX_PROGRAM_SIZE: usize = 65536; // 64KB
/// Default number of transitions a PDA may fire before the run is abandoned.
pub const PDA_MAX_STEPS: usize = 100;
/// Default number of head moves a Turing machine may make before the run is abandoned.
pub const TM_MAX_STEPS: usize = 1000;
/// Default ceiling for iterative deepening in the CFG derivation search.
pub const CFG_MAX_DEPTH: usize = 20;

/// A single DFA/NFA transition. Several transitions may share `(from, symbol)`,
/// which is how nondeterminism is expressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaTransition {
    pub from: String,
    pub to: String,
    pub symbol: Symbol,
}

/// A deterministic or nondeterministic finite automaton.
///
/// Whether the automaton is run as a DFA or an NFA is decided by the caller through
/// [`FaMode`], not by the definition itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiniteAutomaton {
    pub states: Vec<String>,
    pub alphabet: Vec<Symbol>,
    pub transitions: Vec<FaTransition>,
    pub start_state: String,
    #[serde(default)]
    pub accept_states: Vec<String>,
}

/// A single PDA transition.
///
/// `input` and `pop` may be [`EPSILON`]. `push` is written top-first: after the
/// transition fires, `push[0]` is the new top of the stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PdaTransition {
    pub from: String,
    pub input: Symbol,
    pub pop: Symbol,
    pub to: String,
    #[serde(default)]
    pub push: Vec<Symbol>,
}

/// A pushdown automaton accepting by final state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushdownAutomaton {
    pub states: Vec<String>,
    pub input_alphabet: Vec<Symbol>,
    pub stack_alphabet: Vec<Symbol>,
    pub transitions: Vec<PdaTransition>,
    pub start_state: String,
    pub initial_stack_symbol: Symbol,
    #[serde(default)]
    pub accept_states: Vec<String>,
}

/// Represents the possible directions a Turing machine head can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one position to the left.
    Left,
    /// Move the head one position to the right.
    Right,
    /// Keep the head in the same position.
    Stay,
}

/// A single Turing machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TmTransition {
    pub state: String,
    pub read: Symbol,
    pub write: Symbol,
    pub direction: Direction,
    pub next_state: String,
}

/// A single-tape Turing machine with designated accept and reject states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuringMachine {
    pub states: Vec<String>,
    pub alphabet: Vec<Symbol>,
    pub tape_alphabet: Vec<Symbol>,
    pub transitions: Vec<TmTransition>,
    pub start_state: String,
    pub accept_state: String,
    pub reject_state: String,
    #[serde(default = "default_blank")]
    pub blank_symbol: Symbol,
}

fn default_blank() -> Symbol {
    DEFAULT_BLANK_SYMBOL
}

/// A grammar rule `left -> right`. An empty `right` (or one holding only ε) is an
/// ε-production.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Production {
    pub left: String,
    pub right: Vec<String>,
}

impl Production {
    /// Returns the right-hand side with ε markers dropped.
    pub fn body(&self) -> impl Iterator<Item = &str> {
        self.right
            .iter()
            .map(String::as_str)
            .filter(|symbol| !is_epsilon(symbol))
    }
}

/// A context-free grammar. Terminals may be longer than one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFreeGrammar {
    pub terminals: Vec<String>,
    pub non_terminals: Vec<String>,
    pub productions: Vec<Production>,
    pub start_symbol: String,
}

/// Returns true if `symbol` is the written form of ε.
pub fn is_epsilon(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    matches!((chars.next(), chars.next()), (Some(EPSILON), None)) || symbol == "eps"
}

/// How a run ended.
///
/// `BudgetExhausted` and `Cancelled` are undetermined: the machine neither accepted
/// nor was shown to reject within the resources it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Accepted,
    Rejected,
    BudgetExhausted,
    Cancelled,
}

impl Outcome {
    pub fn is_accepted(self) -> bool {
        self == Outcome::Accepted
    }

    /// Returns true for outcomes that settle membership either way.
    pub fn is_decided(self) -> bool {
        matches!(self, Outcome::Accepted | Outcome::Rejected)
    }
}

/// A cooperative cancellation flag shared between a caller and a running simulation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Resources granted to a single run.
///
/// `limit` counts fired transitions for the PDA and TM steppers, explored
/// configurations for the PDA search, and the deepening ceiling for CFG derivation.
#[derive(Debug, Clone)]
pub struct Budget {
    pub limit: usize,
    pub cancel: CancelToken,
}

impl Budget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The execution mode for a finite automaton.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaMode {
    /// Track a single current state, taking the first matching transition.
    #[default]
    Dfa,
    /// Track the set of all reachable states.
    Nfa,
}

/// How transitions labeled with [`EPSILON`] behave in NFA mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpsilonMode {
    /// ε is an ordinary symbol; an ε-transition only fires on a literal `ε` in the input.
    #[default]
    Literal,
    /// ε-transitions are followed automatically before the run and after every symbol.
    Closure,
}

/// How the PDA stepper resolves competing transitions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdaMode {
    /// Take the first applicable transition in authoring order, never backtracking.
    #[default]
    FirstMatch,
    /// Explore every applicable transition breadth-first within the budget.
    Search,
}

/// Run configuration. Every field falls back to its default when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pda_max_steps: usize,
    pub tm_max_steps: usize,
    pub cfg_max_depth: usize,
    pub epsilon: EpsilonMode,
    pub pda_mode: PdaMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pda_max_steps: PDA_MAX_STEPS,
            tm_max_steps: TM_MAX_STEPS,
            cfg_max_depth: CFG_MAX_DEPTH,
            epsilon: EpsilonMode::default(),
            pda_mode: PdaMode::default(),
        }
    }
}

impl Config {
    pub fn pda_budget(&self) -> Budget {
        Budget::new(self.pda_max_steps)
    }

    pub fn tm_budget(&self) -> Budget {
        Budget::new(self.tm_max_steps)
    }

    pub fn cfg_budget(&self) -> Budget {
        Budget::new(self.cfg_max_depth)
    }
}

/// Represents the errors that can occur while loading or building a definition.
///
/// Rejections, stuck machines and exhausted budgets are not errors; they are reported
/// through [`Outcome`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormalLanguageError {
    /// Indicates an error during the parsing of a textual definition.
    #[error("Program parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// Indicates a definition that is structurally unusable.
    #[error("Program validation error: {0}")]
    ValidationError(String),
    /// Indicates an error related to file system operations.
    #[error("File error: {0}")]
    FileError(String),
    /// Indicates a JSON definition or configuration that could not be decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for FormalLanguageError {
    fn from(error: serde_json::Error) -> Self {
        FormalLanguageError::SerializationError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_serialization() {
        let left_json = serde_json::to_string(&Direction::Left).unwrap();
        let stay_json = serde_json::to_string(&Direction::Stay).unwrap();

        assert_eq!(left_json, "\"Left\"");
        assert_eq!(stay_json, "\"Stay\"");

        let left: Direction = serde_json::from_str(&left_json).unwrap();
        assert_eq!(left, Direction::Left);
    }

    #[test]
    fn test_epsilon_spellings() {
        assert!(is_epsilon("ε"));
        assert!(is_epsilon("eps"));
        assert!(!is_epsilon("εε"));
        assert!(!is_epsilon("e"));
        assert!(!is_epsilon(""));
    }

    #[test]
    fn test_production_body_drops_epsilon() {
        let production = Production {
            left: "S".into(),
            right: vec!["a".into(), "ε".into(), "S".into()],
        };

        assert_eq!(production.body().collect::<Vec<_>>(), vec!["a", "S"]);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"tm_max_steps": 5}"#).unwrap();

        assert_eq!(config.tm_max_steps, 5);
        assert_eq!(config.pda_max_steps, PDA_MAX_STEPS);
        assert_eq!(config.cfg_max_depth, CFG_MAX_DEPTH);
        assert_eq!(config.epsilon, EpsilonMode::Literal);
        assert_eq!(config.pda_mode, PdaMode::FirstMatch);
    }

    #[test]
    fn test_turing_machine_default_blank() {
        let json = r#"{
            "states": ["q0"], "alphabet": [], "tape_alphabet": [], "transitions": [],
            "start_state": "q0", "accept_state": "qa", "reject_state": "qr"
        }"#;
        let machine: TuringMachine = serde_json::from_str(json).unwrap();

        assert_eq!(machine.blank_symbol, DEFAULT_BLANK_SYMBOL);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let budget = Budget::new(10).with_cancel(token.clone());

        assert!(!budget.is_cancelled());
        token.cancel();
        assert!(budget.is_cancelled());
    }

    #[test]
    fn test_outcome_decided() {
        assert!(Outcome::Accepted.is_decided());
        assert!(Outcome::Rejected.is_decided());
        assert!(!Outcome::BudgetExhausted.is_decided());
        assert!(!Outcome::Cancelled.is_decided());
        assert!(!Outcome::Rejected.is_accepted());
    }

    #[test]
    fn test_error_display() {
        let error = FormalLanguageError::ValidationError("Missing start state".to_string());

        assert_eq!(
            error.to_string(),
            "Program validation error: Missing start state"
        );
    }
}
