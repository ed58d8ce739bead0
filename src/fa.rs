//! This module defines the `FaSimulator`, which steps a DFA or NFA over an input string
//! one symbol at a time and records every configuration it passes through.
//!
//! In NFA mode the simulator carries the whole set of current states, which amounts to
//! an on-the-fly subset construction. [`determinize`] performs the same construction
//! ahead of time.

use crate::analyzer::analyze_fa;
use crate::types::{
    CancelToken, EpsilonMode, FaMode, FaTransition, FiniteAutomaton, FormalLanguageError,
    Outcome, Symbol, EPSILON,
};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// An ordered set of state names. Ordering keeps traces reproducible.
pub type StateSet = BTreeSet<String>;

/// One configuration of a finite automaton run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaStep {
    /// The current state (DFA) or states (NFA).
    pub states: StateSet,
    /// The symbol read to reach this configuration, `None` for the initial one.
    pub symbol: Option<Symbol>,
    /// The transitions fired while reading `symbol`.
    pub transitions: Vec<FaTransition>,
    /// The input left to consume.
    pub remaining: String,
    /// Set on the final step only.
    pub halt: Option<Outcome>,
}

/// The result of running a finite automaton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaResult {
    pub accepted: bool,
    pub outcome: Outcome,
    pub steps: Vec<FaStep>,
    pub final_states: StateSet,
}

impl FaResult {
    /// Returns the single final state of a DFA run.
    pub fn final_state(&self) -> Option<&str> {
        match self.final_states.len() {
            1 => self.final_states.iter().next().map(String::as_str),
            _ => None,
        }
    }
}

/// Simulates a validated finite automaton.
#[derive(Debug, Clone)]
pub struct FaSimulator {
    automaton: FiniteAutomaton,
    mode: FaMode,
    epsilon: EpsilonMode,
    rules: HashMap<String, Vec<FaTransition>>,
    accept: HashSet<String>,
}

impl FaSimulator {
    /// Validates `automaton` and prepares it for simulation in the given mode.
    pub fn build(automaton: FiniteAutomaton, mode: FaMode) -> Result<Self, FormalLanguageError> {
        analyze_fa(&automaton)?;

        Ok(Self {
            rules: group_rules(&automaton),
            accept: automaton.accept_states.iter().cloned().collect(),
            automaton,
            mode,
            epsilon: EpsilonMode::default(),
        })
    }

    /// Selects how ε-labeled transitions behave. Only NFA mode honors `Closure`.
    pub fn with_epsilon(mut self, epsilon: EpsilonMode) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn automaton(&self) -> &FiniteAutomaton {
        &self.automaton
    }

    pub fn mode(&self) -> FaMode {
        self.mode
    }

    /// Runs the automaton over `input`.
    pub fn simulate(&self, input: &str) -> FaResult {
        self.simulate_with(input, &CancelToken::default())
    }

    /// Runs the automaton over `input`, checking `cancel` before every symbol.
    pub fn simulate_with(&self, input: &str, cancel: &CancelToken) -> FaResult {
        debug!("Running {:?} over {:?}", self.mode, input);

        let mut states = self.close(StateSet::from([self.automaton.start_state.clone()]));
        let mut steps = vec![FaStep {
            states: states.clone(),
            symbol: None,
            transitions: Vec::new(),
            remaining: input.to_string(),
            halt: None,
        }];

        for (index, symbol) in input.char_indices() {
            if cancel.is_cancelled() {
                return finish(steps, states, Outcome::Cancelled);
            }

            let (next, fired) = self.next(&states, symbol);

            if next.is_empty() {
                // Stuck: record where the run stopped without consuming `symbol`.
                trace!("No transition from {:?} on {:?}", states, symbol);
                steps.push(FaStep {
                    states: states.clone(),
                    symbol: Some(symbol),
                    transitions: Vec::new(),
                    remaining: input[index..].to_string(),
                    halt: None,
                });
                return finish(steps, states, Outcome::Rejected);
            }

            trace!("{:?} --{}--> {:?}", states, symbol, next);
            states = next;
            steps.push(FaStep {
                states: states.clone(),
                symbol: Some(symbol),
                transitions: fired,
                remaining: input[index + symbol.len_utf8()..].to_string(),
                halt: None,
            });
        }

        let outcome = if states.iter().any(|state| self.accept.contains(state)) {
            Outcome::Accepted
        } else {
            Outcome::Rejected
        };

        finish(steps, states, outcome)
    }

    /// Computes the configuration reached from `states` by reading `symbol`.
    fn next(&self, states: &StateSet, symbol: Symbol) -> (StateSet, Vec<FaTransition>) {
        let closing = self.closes_over_epsilon();
        let mut next = StateSet::new();
        let mut fired = Vec::new();

        for state in states {
            let matching = self
                .outgoing(state)
                .filter(|t| t.symbol == symbol && !(closing && t.symbol == EPSILON));

            for transition in matching {
                next.insert(transition.to.clone());
                fired.push(transition.clone());

                if self.mode == FaMode::Dfa {
                    break;
                }
            }
        }

        (self.close(next), fired)
    }

    /// Extends `states` with everything reachable over ε-transitions when closure is on.
    fn close(&self, mut states: StateSet) -> StateSet {
        if !self.closes_over_epsilon() {
            return states;
        }

        let mut queue: VecDeque<String> = states.iter().cloned().collect();
        while let Some(state) = queue.pop_front() {
            for transition in self.outgoing(&state).filter(|t| t.symbol == EPSILON) {
                if states.insert(transition.to.clone()) {
                    queue.push_back(transition.to.clone());
                }
            }
        }

        states
    }

    fn closes_over_epsilon(&self) -> bool {
        self.mode == FaMode::Nfa && self.epsilon == EpsilonMode::Closure
    }

    fn outgoing<'a>(&'a self, state: &str) -> impl Iterator<Item = &'a FaTransition> {
        self.rules.get(state).into_iter().flatten()
    }
}

/// Marks the last step with `outcome` and assembles the result.
fn finish(mut steps: Vec<FaStep>, final_states: StateSet, outcome: Outcome) -> FaResult {
    debug!("Finite automaton halted: {:?} in {:?}", outcome, final_states);

    if let Some(last) = steps.last_mut() {
        last.halt = Some(outcome);
    }

    FaResult {
        accepted: outcome.is_accepted(),
        outcome,
        steps,
        final_states,
    }
}

/// Groups transitions by source state, preserving authoring order.
fn group_rules(automaton: &FiniteAutomaton) -> HashMap<String, Vec<FaTransition>> {
    let mut rules: HashMap<String, Vec<FaTransition>> = HashMap::new();
    for transition in &automaton.transitions {
        rules
            .entry(transition.from.clone())
            .or_default()
            .push(transition.clone());
    }
    rules
}

/// Formats a state set as the name of the DFA state standing for it, e.g. `{q0,q1}`.
pub fn subset_name(states: &StateSet) -> String {
    let names: Vec<&str> = states.iter().map(String::as_str).collect();
    format!("{{{}}}", names.join(","))
}

/// Converts an automaton into an equivalent DFA by explicit subset construction.
///
/// ε is treated as a literal symbol, exactly as the NFA stepper does in
/// [`EpsilonMode::Literal`]. The empty subset is left out, so a subset with no
/// successor on some symbol is simply missing that transition.
pub fn determinize(automaton: &FiniteAutomaton) -> FiniteAutomaton {
    let rules = group_rules(automaton);

    let mut alphabet: Vec<Symbol> = Vec::new();
    for symbol in automaton
        .alphabet
        .iter()
        .chain(automaton.transitions.iter().map(|t| &t.symbol))
    {
        if !alphabet.contains(symbol) {
            alphabet.push(*symbol);
        }
    }

    let accept: HashSet<&String> = automaton.accept_states.iter().collect();
    let start = StateSet::from([automaton.start_state.clone()]);

    let mut seen: HashSet<StateSet> = HashSet::from([start.clone()]);
    let mut queue = VecDeque::from([start.clone()]);
    let mut states = Vec::new();
    let mut accept_states = Vec::new();
    let mut transitions = Vec::new();

    while let Some(subset) = queue.pop_front() {
        let name = subset_name(&subset);
        if subset.iter().any(|state| accept.contains(state)) {
            accept_states.push(name.clone());
        }

        for &symbol in &alphabet {
            let next: StateSet = subset
                .iter()
                .flat_map(|state| rules.get(state).into_iter().flatten())
                .filter(|t| t.symbol == symbol)
                .map(|t| t.to.clone())
                .collect();

            if next.is_empty() {
                continue;
            }

            transitions.push(FaTransition {
                from: name.clone(),
                to: subset_name(&next),
                symbol,
            });

            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }

        states.push(name);
    }

    FiniteAutomaton {
        states,
        alphabet,
        transitions,
        start_state: subset_name(&start),
        accept_states,
    }
}
