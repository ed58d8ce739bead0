//! This module defines the `PdaSimulator`, which runs a pushdown automaton over an input
//! string while threading an explicit stack through every step.
//!
//! The default [`PdaMode::FirstMatch`] fires the first applicable transition and never
//! backtracks, so machines that depend on choosing between competing transitions may be
//! rejected wrongly. [`PdaMode::Search`] explores every applicable transition
//! breadth-first instead.

use crate::analyzer::analyze_pda;
use crate::types::{
    Budget, FormalLanguageError, Outcome, PdaMode, PdaTransition, PushdownAutomaton, Symbol,
    EPSILON,
};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// One configuration of a PDA run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdaStep {
    pub state: String,
    /// Bottom first; the last element is the top of the stack.
    pub stack: Vec<Symbol>,
    /// Number of input symbols consumed so far.
    pub position: usize,
    pub remaining: String,
    /// The transition fired to reach this configuration, `None` for the initial one.
    pub transition: Option<PdaTransition>,
    /// Set on the final step only.
    pub halt: Option<Outcome>,
}

/// The result of running a pushdown automaton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdaResult {
    pub accepted: bool,
    pub outcome: Outcome,
    pub steps: Vec<PdaStep>,
    pub final_state: String,
    pub final_stack: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Configuration {
    state: String,
    position: usize,
    stack: Vec<Symbol>,
}

/// Simulates a validated pushdown automaton.
#[derive(Debug, Clone)]
pub struct PdaSimulator {
    automaton: PushdownAutomaton,
    mode: PdaMode,
    accept: HashSet<String>,
}

impl PdaSimulator {
    /// Validates `automaton` and prepares it for simulation.
    pub fn build(automaton: PushdownAutomaton) -> Result<Self, FormalLanguageError> {
        analyze_pda(&automaton)?;

        Ok(Self {
            accept: automaton.accept_states.iter().cloned().collect(),
            automaton,
            mode: PdaMode::default(),
        })
    }

    pub fn with_mode(mut self, mode: PdaMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn automaton(&self) -> &PushdownAutomaton {
        &self.automaton
    }

    /// Runs the automaton over `input` within `budget`.
    pub fn simulate(&self, input: &str, budget: &Budget) -> PdaResult {
        debug!(
            "Running PDA ({:?}) over {:?} with a budget of {}",
            self.mode, input, budget.limit
        );

        let input: Vec<Symbol> = input.chars().collect();
        match self.mode {
            PdaMode::FirstMatch => self.first_match(&input, budget),
            PdaMode::Search => self.search(&input, budget),
        }
    }

    fn initial(&self) -> Configuration {
        Configuration {
            state: self.automaton.start_state.clone(),
            position: 0,
            stack: vec![self.automaton.initial_stack_symbol],
        }
    }

    /// Steps through the first applicable transition until none applies.
    fn first_match(&self, input: &[Symbol], budget: &Budget) -> PdaResult {
        let mut config = self.initial();
        let mut steps = vec![record(&config, input, None)];
        let mut fired = 0;

        let outcome = loop {
            if budget.is_cancelled() {
                break Outcome::Cancelled;
            }

            let Some(transition) = self.candidates(&config, input).next().cloned() else {
                break self.verdict(&config, input);
            };

            if fired >= budget.limit {
                break Outcome::BudgetExhausted;
            }

            config = apply(&config, &transition);
            fired += 1;
            trace!(
                "{} at {} with stack {:?}",
                config.state,
                config.position,
                config.stack
            );
            steps.push(record(&config, input, Some(transition)));
        };

        finish(steps, config, outcome)
    }

    /// Explores all applicable transitions breadth-first.
    ///
    /// A configuration is accepting as soon as it has consumed the whole input in an
    /// accept state. When nothing accepts, the trace leads to the configuration that
    /// consumed the most input.
    fn search(&self, input: &[Symbol], budget: &Budget) -> PdaResult {
        let initial = self.initial();
        let mut nodes: Vec<(Configuration, Option<(usize, PdaTransition)>)> =
            vec![(initial.clone(), None)];
        let mut seen = HashSet::from([initial]);
        let mut queue = VecDeque::from([0]);
        let mut best = 0;
        let mut explored = 0;

        let outcome = loop {
            if budget.is_cancelled() {
                break Outcome::Cancelled;
            }

            let Some(index) = queue.pop_front() else {
                break Outcome::Rejected;
            };

            let config = nodes[index].0.clone();
            if config.position == input.len() && self.accept.contains(&config.state) {
                best = index;
                break Outcome::Accepted;
            }

            if config.position > nodes[best].0.position {
                best = index;
            }

            if explored >= budget.limit {
                break Outcome::BudgetExhausted;
            }
            explored += 1;

            for transition in self.candidates(&config, input) {
                let next = apply(&config, transition);
                if seen.insert(next.clone()) {
                    nodes.push((next, Some((index, transition.clone()))));
                    queue.push_back(nodes.len() - 1);
                }
            }
        };

        trace!("Explored {} of {} configurations", explored, nodes.len());

        // Walk parent links back from the chosen configuration.
        let mut path = Vec::new();
        let mut cursor = Some(best);
        while let Some(index) = cursor {
            let (config, parent) = &nodes[index];
            path.push(record(config, input, parent.as_ref().map(|(_, t)| t.clone())));
            cursor = parent.as_ref().map(|(parent, _)| *parent);
        }
        path.reverse();

        finish(path, nodes[best].0.clone(), outcome)
    }

    /// Yields applicable transitions: input-consuming ones first, then ε-moves, each
    /// group in authoring order.
    fn candidates<'a>(
        &'a self,
        config: &'a Configuration,
        input: &'a [Symbol],
    ) -> impl Iterator<Item = &'a PdaTransition> + 'a {
        let symbol = input.get(config.position).copied();
        let from_here = move |t: &&PdaTransition| {
            t.from == config.state
                && (t.pop == EPSILON || config.stack.last() == Some(&t.pop))
        };

        let consuming = self
            .automaton
            .transitions
            .iter()
            .filter(from_here)
            .filter(move |t| t.input != EPSILON && Some(t.input) == symbol);
        let silent = self
            .automaton
            .transitions
            .iter()
            .filter(from_here)
            .filter(|t| t.input == EPSILON);

        consuming.chain(silent)
    }

    fn verdict(&self, config: &Configuration, input: &[Symbol]) -> Outcome {
        if config.position == input.len() && self.accept.contains(&config.state) {
            Outcome::Accepted
        } else {
            Outcome::Rejected
        }
    }
}

/// Fires `transition` from `config`: pop if required, then push so that `push[0]` ends
/// up on top.
fn apply(config: &Configuration, transition: &PdaTransition) -> Configuration {
    let mut stack = config.stack.clone();
    if transition.pop != EPSILON {
        stack.pop();
    }
    stack.extend(
        transition
            .push
            .iter()
            .rev()
            .filter(|symbol| **symbol != EPSILON),
    );

    Configuration {
        state: transition.to.clone(),
        position: if transition.input == EPSILON {
            config.position
        } else {
            config.position + 1
        },
        stack,
    }
}

fn record(config: &Configuration, input: &[Symbol], transition: Option<PdaTransition>) -> PdaStep {
    PdaStep {
        state: config.state.clone(),
        stack: config.stack.clone(),
        position: config.position,
        remaining: input[config.position.min(input.len())..].iter().collect(),
        transition,
        halt: None,
    }
}

fn finish(mut steps: Vec<PdaStep>, config: Configuration, outcome: Outcome) -> PdaResult {
    debug!("PDA halted: {:?} in {}", outcome, config.state);

    if let Some(last) = steps.last_mut() {
        last.halt = Some(outcome);
    }

    PdaResult {
        accepted: outcome.is_accepted(),
        outcome,
        steps,
        final_state: config.state,
        final_stack: config.stack,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PDA_MAX_STEPS;

    fn transition(from: &str, input: Symbol, pop: Symbol, to: &str, push: &str) -> PdaTransition {
        PdaTransition {
            from: from.into(),
            input,
            pop,
            to: to.into(),
            push: push.chars().collect(),
        }
    }

    /// Balanced parentheses, accepting by final state once only `Z` is left.
    fn create_balanced_parens() -> PushdownAutomaton {
        PushdownAutomaton {
            states: vec!["q0".into(), "q1".into()],
            input_alphabet: vec!['(', ')'],
            stack_alphabet: vec!['(', 'Z'],
            transitions: vec![
                transition("q0", '(', EPSILON, "q0", "("),
                transition("q0", ')', '(', "q0", ""),
                transition("q0", EPSILON, 'Z', "q1", "Z"),
            ],
            start_state: "q0".into(),
            initial_stack_symbol: 'Z',
            accept_states: vec!["q1".into()],
        }
    }

    /// Even-length palindromes over {a, b}; needs a guess for the middle.
    fn create_even_palindromes() -> PushdownAutomaton {
        PushdownAutomaton {
            states: vec!["push".into(), "pop".into(), "done".into()],
            input_alphabet: vec!['a', 'b'],
            stack_alphabet: vec!['a', 'b', 'Z'],
            transitions: vec![
                transition("push", 'a', EPSILON, "push", "a"),
                transition("push", 'b', EPSILON, "push", "b"),
                transition("push", EPSILON, EPSILON, "pop", ""),
                transition("pop", 'a', 'a', "pop", ""),
                transition("pop", 'b', 'b', "pop", ""),
                transition("pop", EPSILON, 'Z', "done", "Z"),
            ],
            start_state: "push".into(),
            initial_stack_symbol: 'Z',
            accept_states: vec!["done".into()],
        }
    }

    fn budget() -> Budget {
        Budget::new(PDA_MAX_STEPS)
    }

    #[test]
    fn test_balanced_accepted() {
        let simulator = PdaSimulator::build(create_balanced_parens()).unwrap();
        let result = simulator.simulate("(())", &budget());

        assert!(result.accepted);
        assert_eq!(result.final_state, "q1");
        assert_eq!(result.final_stack, vec!['Z']);
        // initial + four symbols + closing ε-move
        assert_eq!(result.steps.len(), 6);
        assert_eq!(result.steps[2].stack, vec!['Z', '(', '(']);
        assert_eq!(result.steps[2].remaining, "))");
        assert_eq!(result.steps.last().unwrap().halt, Some(Outcome::Accepted));
    }

    #[test]
    fn test_unbalanced_rejected() {
        let simulator = PdaSimulator::build(create_balanced_parens()).unwrap();

        let result = simulator.simulate("(()", &budget());
        assert!(!result.accepted);
        assert_eq!(result.outcome, Outcome::Rejected);
        assert_eq!(result.final_state, "q0");

        let result = simulator.simulate("())", &budget());
        assert_eq!(result.outcome, Outcome::Rejected);
        assert_eq!(result.final_state, "q1");
        assert_eq!(result.steps.last().unwrap().remaining, ")");
    }

    #[test]
    fn test_push_order_puts_first_symbol_on_top() {
        let automaton = PushdownAutomaton {
            states: vec!["q0".into(), "q1".into()],
            input_alphabet: vec!['a'],
            stack_alphabet: vec!['X', 'Y', 'Z'],
            transitions: vec![transition("q0", 'a', 'Z', "q1", "XYZ")],
            start_state: "q0".into(),
            initial_stack_symbol: 'Z',
            accept_states: vec!["q1".into()],
        };

        let result = PdaSimulator::build(automaton)
            .unwrap()
            .simulate("a", &budget());
        assert!(result.accepted);
        assert_eq!(result.final_stack, vec!['Z', 'Y', 'X']);
    }

    #[test]
    fn test_pop_on_empty_stack_never_fires() {
        let automaton = PushdownAutomaton {
            states: vec!["q0".into(), "q1".into()],
            input_alphabet: vec!['a'],
            stack_alphabet: vec!['Z'],
            transitions: vec![
                transition("q0", 'a', 'Z', "q0", ""),
                transition("q0", 'a', 'Z', "q1", ""),
            ],
            start_state: "q0".into(),
            initial_stack_symbol: 'Z',
            accept_states: vec!["q1".into()],
        };

        let result = PdaSimulator::build(automaton)
            .unwrap()
            .simulate("aa", &budget());
        assert_eq!(result.outcome, Outcome::Rejected);
        assert!(result.final_stack.is_empty());
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps.last().unwrap().position, 1);
    }

    #[test]
    fn test_epsilon_loop_exhausts_budget() {
        let automaton = PushdownAutomaton {
            states: vec!["q0".into()],
            input_alphabet: vec![],
            stack_alphabet: vec!['Z'],
            transitions: vec![transition("q0", EPSILON, EPSILON, "q0", "")],
            start_state: "q0".into(),
            initial_stack_symbol: 'Z',
            accept_states: vec!["q0".into()],
        };

        let result = PdaSimulator::build(automaton)
            .unwrap()
            .simulate("", &Budget::new(7));
        assert_eq!(result.outcome, Outcome::BudgetExhausted);
        assert!(!result.accepted);
        assert_eq!(result.steps.len(), 8);
    }

    #[test]
    fn test_first_match_misses_nondeterministic_choice() {
        let simulator = PdaSimulator::build(create_even_palindromes()).unwrap();
        let result = simulator.simulate("abba", &budget());

        // Consuming moves always win, so the middle is never guessed.
        assert_eq!(result.outcome, Outcome::Rejected);
    }

    #[test]
    fn test_search_finds_nondeterministic_choice() {
        let simulator = PdaSimulator::build(create_even_palindromes())
            .unwrap()
            .with_mode(PdaMode::Search);
        assert_eq!(simulator.automaton().start_state, "push");

        let result = simulator.simulate("abba", &budget());
        assert!(result.accepted);
        assert_eq!(result.final_state, "done");
        assert_eq!(result.steps.first().unwrap().transition, None);
        assert_eq!(result.steps.last().unwrap().remaining, "");

        let result = simulator.simulate("abab", &budget());
        assert_eq!(result.outcome, Outcome::Rejected);
    }

    #[test]
    fn test_search_respects_budget() {
        let simulator = PdaSimulator::build(create_even_palindromes())
            .unwrap()
            .with_mode(PdaMode::Search);

        let result = simulator.simulate("abbaabba", &Budget::new(3));
        assert_eq!(result.outcome, Outcome::BudgetExhausted);
    }

    #[test]
    fn test_cancelled_before_first_step() {
        let simulator = PdaSimulator::build(create_balanced_parens()).unwrap();
        let budget = budget();
        budget.cancel.cancel();

        let result = simulator.simulate("()", &budget);
        assert_eq!(result.outcome, Outcome::Cancelled);
        assert_eq!(result.steps.len(), 1);
    }
}
