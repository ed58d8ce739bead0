//! This module defines the `TmSimulator`, which runs a single-tape Turing machine, and
//! the `Tape` it operates on. The tape grows by one blank cell whenever the head steps
//! past either end.

use crate::analyzer::analyze_tm;
use crate::types::{
    Budget, Direction, FormalLanguageError, Outcome, Symbol, TmTransition, TuringMachine,
};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A growable tape with a read/write head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tape {
    cells: Vec<Symbol>,
    head: usize,
    blank: Symbol,
}

impl Tape {
    /// Creates a tape holding `input` with the head on its first cell. An empty input
    /// yields a single blank cell.
    pub fn new(input: &str, blank: Symbol) -> Self {
        let mut cells: Vec<Symbol> = input.chars().collect();
        if cells.is_empty() {
            cells.push(blank);
        }

        Self {
            cells,
            head: 0,
            blank,
        }
    }

    pub fn read(&self) -> Symbol {
        self.cells[self.head]
    }

    pub fn write(&mut self, symbol: Symbol) {
        self.cells[self.head] = symbol;
    }

    /// Moves the head, extending the tape with a blank when it falls off an edge.
    pub fn shift(&mut self, direction: Direction) {
        match direction {
            Direction::Left => {
                if self.head == 0 {
                    // Extend tape to the left
                    self.cells.insert(0, self.blank);
                } else {
                    self.head -= 1;
                }
            }
            Direction::Right => {
                self.head += 1;
                if self.head >= self.cells.len() {
                    self.cells.push(self.blank);
                }
            }
            Direction::Stay => {}
        }
    }

    pub fn cells(&self) -> &[Symbol] {
        &self.cells
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn blank(&self) -> Symbol {
        self.blank
    }

    /// Returns the tape contents with leading and trailing blanks removed.
    pub fn contents(&self) -> String {
        trim_blanks(&self.cells, self.blank)
    }
}

fn trim_blanks(cells: &[Symbol], blank: Symbol) -> String {
    let start = cells.iter().position(|&c| c != blank);
    let end = cells.iter().rposition(|&c| c != blank);

    match (start, end) {
        (Some(start), Some(end)) => cells[start..=end].iter().collect(),
        _ => String::new(),
    }
}

/// One configuration of a Turing machine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmStep {
    pub state: String,
    pub tape: Vec<Symbol>,
    pub head: usize,
    /// The transition applied to reach this configuration. A missing rule shows up as a
    /// synthetic transition into the reject state that leaves the tape unchanged.
    pub transition: Option<TmTransition>,
    /// Set on the final step only.
    pub halt: Option<Outcome>,
}

/// The result of running a Turing machine.
///
/// `accepted` and `rejected` are both false when the run was cut short by its budget
/// or by cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmResult {
    pub accepted: bool,
    pub rejected: bool,
    pub outcome: Outcome,
    pub steps: Vec<TmStep>,
    pub final_state: String,
    pub final_tape: Tape,
}

impl TmResult {
    /// Returns the final tape contents without blank padding.
    pub fn tape_contents(&self) -> String {
        self.final_tape.contents()
    }
}

/// Simulates a validated Turing machine.
#[derive(Debug, Clone)]
pub struct TmSimulator {
    machine: TuringMachine,
    rules: HashMap<String, Vec<TmTransition>>,
}

impl TmSimulator {
    /// Validates `machine` and indexes its transitions by state.
    pub fn build(machine: TuringMachine) -> Result<Self, FormalLanguageError> {
        analyze_tm(&machine)?;

        let mut rules: HashMap<String, Vec<TmTransition>> = HashMap::new();
        for transition in &machine.transitions {
            rules
                .entry(transition.state.clone())
                .or_default()
                .push(transition.clone());
        }

        Ok(Self { machine, rules })
    }

    pub fn machine(&self) -> &TuringMachine {
        &self.machine
    }

    /// Finds the first transition for `state` reading `symbol`.
    pub fn transition(&self, state: &str, symbol: Symbol) -> Option<&TmTransition> {
        self.rules
            .get(state)
            .and_then(|transitions| transitions.iter().find(|t| t.read == symbol))
    }

    /// Runs the machine over `input` until it halts or `budget` runs out.
    pub fn simulate(&self, input: &str, budget: &Budget) -> TmResult {
        debug!(
            "Running Turing machine over {:?} with a budget of {}",
            input, budget.limit
        );

        let machine = &self.machine;
        let mut state = machine.start_state.clone();
        let mut tape = Tape::new(input, machine.blank_symbol);
        let mut steps = vec![record(&state, &tape, None)];
        let mut moves = 0;

        let outcome = loop {
            if state == machine.accept_state {
                break Outcome::Accepted;
            }
            if state == machine.reject_state {
                break Outcome::Rejected;
            }
            if budget.is_cancelled() {
                break Outcome::Cancelled;
            }
            if moves >= budget.limit {
                break Outcome::BudgetExhausted;
            }

            let symbol = tape.read();
            let transition = match self.transition(&state, symbol) {
                Some(t) => t.clone(),
                None => {
                    trace!("No rule for {} reading {:?}; rejecting", state, symbol);
                    let synthetic = TmTransition {
                        state: state.clone(),
                        read: symbol,
                        write: symbol,
                        direction: Direction::Stay,
                        next_state: machine.reject_state.clone(),
                    };
                    state = machine.reject_state.clone();
                    steps.push(record(&state, &tape, Some(synthetic)));
                    break Outcome::Rejected;
                }
            };

            tape.write(transition.write);
            tape.shift(transition.direction);
            state = transition.next_state.clone();
            moves += 1;

            trace!("{} at {} over {:?}", state, tape.head(), tape.cells());
            steps.push(record(&state, &tape, Some(transition)));
        };

        debug!("Turing machine halted: {:?} in {} after {} moves", outcome, state, moves);

        if let Some(last) = steps.last_mut() {
            last.halt = Some(outcome);
        }

        TmResult {
            accepted: outcome == Outcome::Accepted,
            rejected: outcome == Outcome::Rejected,
            outcome,
            steps,
            final_state: state,
            final_tape: tape,
        }
    }
}

fn record(state: &str, tape: &Tape, transition: Option<TmTransition>) -> TmStep {
    TmStep {
        state: state.to_string(),
        tape: tape.cells().to_vec(),
        head: tape.head(),
        transition,
        halt: None,
    }
}
