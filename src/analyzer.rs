//! This module validates machine and grammar definitions before they are run. Only
//! declaration consistency is checked: every referenced state or symbol must be
//! declared and the designated start/accept/reject names must exist. Behavioral
//! properties such as DFA totality or PDA determinism are left to the caller.

use crate::program::{Machine, Program};
use crate::types::{
    is_epsilon, ContextFreeGrammar, FiniteAutomaton, FormalLanguageError, PushdownAutomaton,
    Symbol, TuringMachine,
};
use std::collections::HashSet;

/// Represents the problems that can be found while analyzing a definition.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    /// The definition declares no states at all.
    EmptyStates,
    /// A state name is declared more than once.
    DuplicateStates(Vec<String>),
    /// No start state (or start symbol) is designated.
    MissingStartState,
    /// The designated start state is not one of the declared states.
    UndeclaredStartState(String),
    /// Accept, reject or transition endpoints that are not declared states.
    UndeclaredStates(Vec<String>),
    /// A Turing machine whose accept and reject states coincide.
    ConflictingHaltStates(String),
    /// The PDA initial stack symbol is missing from the stack alphabet.
    UndeclaredStackSymbol(Symbol),
    /// The Turing machine blank is missing from the tape alphabet.
    UndeclaredBlank(Symbol),
    /// The grammar start symbol is not a declared non-terminal.
    InvalidStartSymbol(String),
    /// A production left-hand side that is not a declared non-terminal.
    InvalidProductionHeads(Vec<String>),
    /// Production symbols that are neither terminals nor non-terminals.
    UndeclaredSymbols(Vec<String>),
    /// Symbols declared both as terminals and as non-terminals.
    AmbiguousSymbols(Vec<String>),
}

impl From<AnalysisError> for FormalLanguageError {
    /// Converts an `AnalysisError` into a `FormalLanguageError::ValidationError`.
    fn from(error: AnalysisError) -> Self {
        let msg = match error {
            AnalysisError::EmptyStates => "No states defined".to_string(),
            AnalysisError::DuplicateStates(states) => {
                format!("States declared more than once: {:?}", states)
            }
            AnalysisError::MissingStartState => "Missing start state".to_string(),
            AnalysisError::UndeclaredStartState(state) => {
                format!("Start state is not a declared state: {}", state)
            }
            AnalysisError::UndeclaredStates(states) => {
                format!("References to undeclared states: {:?}", states)
            }
            AnalysisError::ConflictingHaltStates(state) => {
                format!("Accept and reject state are both '{}'", state)
            }
            AnalysisError::UndeclaredStackSymbol(symbol) => {
                format!("Initial stack symbol '{}' is not in the stack alphabet", symbol)
            }
            AnalysisError::UndeclaredBlank(symbol) => {
                format!("Blank symbol '{}' is not in the tape alphabet", symbol)
            }
            AnalysisError::InvalidStartSymbol(symbol) => {
                format!("Start symbol is not a declared non-terminal: {}", symbol)
            }
            AnalysisError::InvalidProductionHeads(heads) => {
                format!("Productions for undeclared non-terminals: {:?}", heads)
            }
            AnalysisError::UndeclaredSymbols(symbols) => {
                format!("Productions use undeclared symbols: {:?}", symbols)
            }
            AnalysisError::AmbiguousSymbols(symbols) => {
                format!("Symbols declared as both terminal and non-terminal: {:?}", symbols)
            }
        };

        FormalLanguageError::ValidationError(msg)
    }
}

/// Analyzes any program definition, dispatching on the kind of machine it holds.
pub fn analyze(program: &Program) -> Result<(), FormalLanguageError> {
    match &program.machine {
        Machine::Dfa(automaton) | Machine::Nfa(automaton) => analyze_fa(automaton),
        Machine::Pda(automaton) => analyze_pda(automaton),
        Machine::Tm(machine) => analyze_tm(machine),
        Machine::Cfg(grammar) => analyze_cfg(grammar),
    }
}

/// Analyzes a finite automaton.
pub fn analyze_fa(automaton: &FiniteAutomaton) -> Result<(), FormalLanguageError> {
    first_error([
        check_states(&automaton.states),
        check_start_state(&automaton.states, &automaton.start_state),
        check_declared(
            &automaton.states,
            automaton.accept_states.iter().chain(
                automaton
                    .transitions
                    .iter()
                    .flat_map(|t| [&t.from, &t.to]),
            ),
        ),
    ])
}

/// Analyzes a pushdown automaton.
pub fn analyze_pda(automaton: &PushdownAutomaton) -> Result<(), FormalLanguageError> {
    first_error([
        check_states(&automaton.states),
        check_start_state(&automaton.states, &automaton.start_state),
        check_declared(
            &automaton.states,
            automaton.accept_states.iter().chain(
                automaton
                    .transitions
                    .iter()
                    .flat_map(|t| [&t.from, &t.to]),
            ),
        ),
        check_stack_symbol(automaton),
    ])
}

/// Analyzes a Turing machine.
pub fn analyze_tm(machine: &TuringMachine) -> Result<(), FormalLanguageError> {
    first_error([
        check_states(&machine.states),
        check_start_state(&machine.states, &machine.start_state),
        check_declared(
            &machine.states,
            [&machine.accept_state, &machine.reject_state]
                .into_iter()
                .chain(
                    machine
                        .transitions
                        .iter()
                        .flat_map(|t| [&t.state, &t.next_state]),
                ),
        ),
        check_halt_states(machine),
        check_blank(machine),
    ])
}

/// Analyzes a context-free grammar.
pub fn analyze_cfg(grammar: &ContextFreeGrammar) -> Result<(), FormalLanguageError> {
    first_error([
        check_symbol_overlap(grammar),
        check_start_symbol(grammar),
        check_production_heads(grammar),
        check_production_symbols(grammar),
    ])
}

/// Returns the first failed check, in the order the checks were listed.
fn first_error<const N: usize>(
    results: [Result<(), AnalysisError>; N],
) -> Result<(), FormalLanguageError> {
    match results.into_iter().find_map(Result::err) {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Checks that at least one state is declared and that no name is declared twice.
fn check_states(states: &[String]) -> Result<(), AnalysisError> {
    if states.is_empty() {
        return Err(AnalysisError::EmptyStates);
    }

    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = states
        .iter()
        .filter(|state| !seen.insert(state.as_str()))
        .cloned()
        .collect();

    if !duplicates.is_empty() {
        duplicates.sort();
        duplicates.dedup();
        return Err(AnalysisError::DuplicateStates(duplicates));
    }

    Ok(())
}

/// Checks that a start state is designated and declared.
fn check_start_state(states: &[String], start: &str) -> Result<(), AnalysisError> {
    if start.is_empty() {
        return Err(AnalysisError::MissingStartState);
    }

    if !states.iter().any(|state| state == start) {
        return Err(AnalysisError::UndeclaredStartState(start.to_string()));
    }

    Ok(())
}

/// Checks that every referenced state name is declared.
fn check_declared<'a>(
    states: &[String],
    references: impl IntoIterator<Item = &'a String>,
) -> Result<(), AnalysisError> {
    let declared: HashSet<&str> = states.iter().map(String::as_str).collect();

    let mut undeclared: Vec<String> = references
        .into_iter()
        .filter(|state| !declared.contains(state.as_str()))
        .cloned()
        .collect();

    if !undeclared.is_empty() {
        // Sort the states to make it deterministic
        undeclared.sort();
        undeclared.dedup();
        return Err(AnalysisError::UndeclaredStates(undeclared));
    }

    Ok(())
}

fn check_stack_symbol(automaton: &PushdownAutomaton) -> Result<(), AnalysisError> {
    if !automaton
        .stack_alphabet
        .contains(&automaton.initial_stack_symbol)
    {
        return Err(AnalysisError::UndeclaredStackSymbol(
            automaton.initial_stack_symbol,
        ));
    }

    Ok(())
}

fn check_halt_states(machine: &TuringMachine) -> Result<(), AnalysisError> {
    if machine.accept_state == machine.reject_state {
        return Err(AnalysisError::ConflictingHaltStates(
            machine.accept_state.clone(),
        ));
    }

    Ok(())
}

fn check_blank(machine: &TuringMachine) -> Result<(), AnalysisError> {
    if !machine.tape_alphabet.contains(&machine.blank_symbol) {
        return Err(AnalysisError::UndeclaredBlank(machine.blank_symbol));
    }

    Ok(())
}

fn check_symbol_overlap(grammar: &ContextFreeGrammar) -> Result<(), AnalysisError> {
    let terminals: HashSet<&String> = grammar.terminals.iter().collect();
    let mut overlap: Vec<String> = grammar
        .non_terminals
        .iter()
        .filter(|symbol| terminals.contains(symbol))
        .cloned()
        .collect();

    if !overlap.is_empty() {
        overlap.sort();
        overlap.dedup();
        return Err(AnalysisError::AmbiguousSymbols(overlap));
    }

    Ok(())
}

fn check_start_symbol(grammar: &ContextFreeGrammar) -> Result<(), AnalysisError> {
    if grammar.start_symbol.is_empty() {
        return Err(AnalysisError::MissingStartState);
    }

    if !grammar.non_terminals.contains(&grammar.start_symbol) {
        return Err(AnalysisError::InvalidStartSymbol(
            grammar.start_symbol.clone(),
        ));
    }

    Ok(())
}

fn check_production_heads(grammar: &ContextFreeGrammar) -> Result<(), AnalysisError> {
    let mut invalid: Vec<String> = grammar
        .productions
        .iter()
        .filter(|production| !grammar.non_terminals.contains(&production.left))
        .map(|production| production.left.clone())
        .collect();

    if !invalid.is_empty() {
        invalid.sort();
        invalid.dedup();
        return Err(AnalysisError::InvalidProductionHeads(invalid));
    }

    Ok(())
}

fn check_production_symbols(grammar: &ContextFreeGrammar) -> Result<(), AnalysisError> {
    let declared: HashSet<&str> = grammar
        .terminals
        .iter()
        .chain(&grammar.non_terminals)
        .map(String::as_str)
        .collect();

    let mut undeclared: Vec<String> = grammar
        .productions
        .iter()
        .flat_map(|production| &production.right)
        .filter(|symbol| !is_epsilon(symbol) && !declared.contains(symbol.as_str()))
        .cloned()
        .collect();

    if !undeclared.is_empty() {
        undeclared.sort();
        undeclared.dedup();
        return Err(AnalysisError::UndeclaredSymbols(undeclared));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, FaTransition, PdaTransition, Production, TmTransition};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn create_test_automaton() -> FiniteAutomaton {
        FiniteAutomaton {
            states: strings(&["q0", "q1"]),
            alphabet: vec!['a'],
            transitions: vec![FaTransition {
                from: "q0".into(),
                to: "q1".into(),
                symbol: 'a',
            }],
            start_state: "q0".into(),
            accept_states: strings(&["q1"]),
        }
    }

    fn create_test_machine() -> TuringMachine {
        TuringMachine {
            states: strings(&["q0", "qa", "qr"]),
            alphabet: vec!['0'],
            tape_alphabet: vec!['0', '_'],
            transitions: vec![TmTransition {
                state: "q0".into(),
                read: '0',
                write: '0',
                direction: Direction::Right,
                next_state: "qa".into(),
            }],
            start_state: "q0".into(),
            accept_state: "qa".into(),
            reject_state: "qr".into(),
            blank_symbol: '_',
        }
    }

    fn create_test_grammar() -> ContextFreeGrammar {
        ContextFreeGrammar {
            terminals: strings(&["a"]),
            non_terminals: strings(&["S"]),
            productions: vec![Production {
                left: "S".into(),
                right: strings(&["a", "S"]),
            }],
            start_symbol: "S".into(),
        }
    }

    #[test]
    fn test_valid_automaton() {
        assert!(analyze_fa(&create_test_automaton()).is_ok());
    }

    #[test]
    fn test_missing_start_state() {
        let mut automaton = create_test_automaton();
        automaton.start_state.clear();

        let error = analyze_fa(&automaton).unwrap_err();
        assert_eq!(
            error,
            FormalLanguageError::ValidationError("Missing start state".into())
        );
    }

    #[test]
    fn test_undeclared_start_state() {
        let mut automaton = create_test_automaton();
        automaton.start_state = "q9".into();

        assert_eq!(
            check_start_state(&automaton.states, &automaton.start_state),
            Err(AnalysisError::UndeclaredStartState("q9".into()))
        );
    }

    #[test]
    fn test_undeclared_transition_states() {
        let mut automaton = create_test_automaton();
        automaton.transitions.push(FaTransition {
            from: "q7".into(),
            to: "q8".into(),
            symbol: 'a',
        });
        automaton.accept_states.push("q8".into());

        let result = check_declared(
            &automaton.states,
            automaton
                .accept_states
                .iter()
                .chain(automaton.transitions.iter().flat_map(|t| [&t.from, &t.to])),
        );
        assert_eq!(
            result,
            Err(AnalysisError::UndeclaredStates(strings(&["q7", "q8"])))
        );
    }

    #[test]
    fn test_empty_and_duplicate_states() {
        assert_eq!(check_states(&[]), Err(AnalysisError::EmptyStates));
        assert_eq!(
            check_states(&strings(&["q0", "q1", "q0"])),
            Err(AnalysisError::DuplicateStates(strings(&["q0"])))
        );
    }

    #[test]
    fn test_pda_stack_symbol() {
        let automaton = PushdownAutomaton {
            states: strings(&["q0"]),
            input_alphabet: vec!['a'],
            stack_alphabet: vec!['A'],
            transitions: vec![PdaTransition {
                from: "q0".into(),
                input: 'a',
                pop: 'Z',
                to: "q0".into(),
                push: vec!['A'],
            }],
            start_state: "q0".into(),
            initial_stack_symbol: 'Z',
            accept_states: vec![],
        };

        let error = analyze_pda(&automaton).unwrap_err();
        assert!(error
            .to_string()
            .contains("Initial stack symbol 'Z' is not in the stack alphabet"));
    }

    #[test]
    fn test_valid_machine() {
        assert!(analyze_tm(&create_test_machine()).is_ok());
    }

    #[test]
    fn test_machine_halt_states_conflict() {
        let mut machine = create_test_machine();
        machine.reject_state = "qa".into();

        assert_eq!(
            check_halt_states(&machine),
            Err(AnalysisError::ConflictingHaltStates("qa".into()))
        );
    }

    #[test]
    fn test_machine_undeclared_reject_state() {
        let mut machine = create_test_machine();
        machine.states.retain(|state| state != "qr");

        let error = analyze_tm(&machine).unwrap_err();
        assert!(error.to_string().contains("qr"));
    }

    #[test]
    fn test_machine_blank_not_in_tape_alphabet() {
        let mut machine = create_test_machine();
        machine.blank_symbol = '#';

        assert_eq!(check_blank(&machine), Err(AnalysisError::UndeclaredBlank('#')));
    }

    #[test]
    fn test_valid_grammar() {
        assert!(analyze_cfg(&create_test_grammar()).is_ok());
    }

    #[test]
    fn test_grammar_start_symbol() {
        let mut grammar = create_test_grammar();
        grammar.start_symbol = "T".into();

        let error = analyze_cfg(&grammar).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Program validation error: Start symbol is not a declared non-terminal: T"
        );
    }

    #[test]
    fn test_grammar_undeclared_symbols() {
        let mut grammar = create_test_grammar();
        grammar.productions.push(Production {
            left: "S".into(),
            right: strings(&["b", "ε"]),
        });

        assert_eq!(
            check_production_symbols(&grammar),
            Err(AnalysisError::UndeclaredSymbols(strings(&["b"])))
        );
    }

    #[test]
    fn test_grammar_production_heads_and_overlap() {
        let mut grammar = create_test_grammar();
        grammar.productions.push(Production {
            left: "A".into(),
            right: vec![],
        });
        assert_eq!(
            check_production_heads(&grammar),
            Err(AnalysisError::InvalidProductionHeads(strings(&["A"])))
        );

        grammar.terminals.push("S".into());
        assert_eq!(
            check_symbol_overlap(&grammar),
            Err(AnalysisError::AmbiguousSymbols(strings(&["S"])))
        );
    }
}
