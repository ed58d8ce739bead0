//! This module ties a named definition to the simulator that runs it. A `Program` is
//! what the parser and loader produce; `Program::run` hands back a `Run` carrying the
//! verdict and the full trace for whatever presentation layer sits on top.

use crate::cfg::{CfgResult, Deriver};
use crate::fa::{FaResult, FaSimulator};
use crate::pda::{PdaResult, PdaSimulator};
use crate::tm::{TmResult, TmSimulator};
use crate::types::{
    CancelToken, Config, ContextFreeGrammar, FaMode, FiniteAutomaton, FormalLanguageError,
    Outcome, PushdownAutomaton, TuringMachine,
};
use serde::{Deserialize, Serialize};

/// A named machine or grammar definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub machine: Machine,
}

/// The kinds of definition the engine can run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Machine {
    Dfa(FiniteAutomaton),
    Nfa(FiniteAutomaton),
    Pda(PushdownAutomaton),
    Tm(TuringMachine),
    Cfg(ContextFreeGrammar),
}

impl Machine {
    /// Returns the keyword used for this kind in definitions.
    pub fn kind(&self) -> &'static str {
        match self {
            Machine::Dfa(_) => "dfa",
            Machine::Nfa(_) => "nfa",
            Machine::Pda(_) => "pda",
            Machine::Tm(_) => "tm",
            Machine::Cfg(_) => "cfg",
        }
    }
}

/// The result of running a program against one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Run {
    Fa(FaResult),
    Pda(PdaResult),
    Tm(TmResult),
    Cfg(CfgResult),
}

impl Run {
    pub fn outcome(&self) -> Outcome {
        match self {
            Run::Fa(result) => result.outcome,
            Run::Pda(result) => result.outcome,
            Run::Tm(result) => result.outcome,
            Run::Cfg(result) => result.outcome,
        }
    }

    /// Accepted by the automaton, or derivable from the grammar.
    pub fn accepted(&self) -> bool {
        self.outcome().is_accepted()
    }

    /// Returns the number of recorded configurations or sentential forms.
    pub fn step_count(&self) -> usize {
        match self {
            Run::Fa(result) => result.steps.len(),
            Run::Pda(result) => result.steps.len(),
            Run::Tm(result) => result.steps.len(),
            Run::Cfg(result) => result.derivation.len(),
        }
    }
}

impl Program {
    /// Builds the matching simulator and runs it over `input`.
    ///
    /// # Returns
    ///
    /// * `Ok(Run)` whatever the verdict; rejection is not an error.
    /// * `Err(FormalLanguageError::ValidationError)` if the definition is malformed.
    pub fn run(&self, input: &str, config: &Config) -> Result<Run, FormalLanguageError> {
        self.run_with(input, config, &CancelToken::default())
    }

    /// Like [`Program::run`], stopping early once `cancel` is triggered.
    pub fn run_with(
        &self,
        input: &str,
        config: &Config,
        cancel: &CancelToken,
    ) -> Result<Run, FormalLanguageError> {
        let run = match &self.machine {
            Machine::Dfa(automaton) => Run::Fa(
                FaSimulator::build(automaton.clone(), FaMode::Dfa)?.simulate_with(input, cancel),
            ),
            Machine::Nfa(automaton) => Run::Fa(
                FaSimulator::build(automaton.clone(), FaMode::Nfa)?
                    .with_epsilon(config.epsilon)
                    .simulate_with(input, cancel),
            ),
            Machine::Pda(automaton) => Run::Pda(
                PdaSimulator::build(automaton.clone())?
                    .with_mode(config.pda_mode)
                    .simulate(input, &config.pda_budget().with_cancel(cancel.clone())),
            ),
            Machine::Tm(machine) => Run::Tm(
                TmSimulator::build(machine.clone())?
                    .simulate(input, &config.tm_budget().with_cancel(cancel.clone())),
            ),
            Machine::Cfg(grammar) => Run::Cfg(
                Deriver::build(grammar.clone())?
                    .derive(input, &config.cfg_budget().with_cancel(cancel.clone())),
            ),
        };

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Direction, EpsilonMode, FaTransition, PdaMode, PdaTransition, Production, TmTransition,
        EPSILON,
    };

    fn create_test_program() -> Program {
        Program {
            name: "Only a".into(),
            machine: Machine::Dfa(FiniteAutomaton {
                states: vec!["s".into(), "t".into()],
                alphabet: vec!['a'],
                transitions: vec![FaTransition {
                    from: "s".into(),
                    to: "t".into(),
                    symbol: 'a',
                }],
                start_state: "s".into(),
                accept_states: vec!["t".into()],
            }),
        }
    }

    #[test]
    fn test_run_dispatches_to_simulator() {
        let program = create_test_program();
        let run = program.run("a", &Config::default()).unwrap();

        assert!(run.accepted());
        assert_eq!(run.step_count(), 2);
        assert!(matches!(run, Run::Fa(_)));

        let run = program.run("aa", &Config::default()).unwrap();
        assert_eq!(run.outcome(), Outcome::Rejected);
    }

    #[test]
    fn test_run_fails_fast_on_malformed_definition() {
        let mut program = create_test_program();
        if let Machine::Dfa(automaton) = &mut program.machine {
            automaton.start_state = "missing".into();
        }

        let result = program.run("a", &Config::default());
        assert!(matches!(
            result,
            Err(FormalLanguageError::ValidationError(_))
        ));
    }

    #[test]
    fn test_cfg_respects_configured_depth() {
        let program = Program {
            name: "Counter".into(),
            machine: Machine::Cfg(ContextFreeGrammar {
                terminals: vec!["a".into()],
                non_terminals: vec!["S".into()],
                productions: vec![
                    Production {
                        left: "S".into(),
                        right: vec!["a".into(), "S".into()],
                    },
                    Production {
                        left: "S".into(),
                        right: vec![],
                    },
                ],
                start_symbol: "S".into(),
            }),
        };

        let shallow = Config {
            cfg_max_depth: 2,
            ..Config::default()
        };
        assert_eq!(
            program.run("aaa", &shallow).unwrap().outcome(),
            Outcome::BudgetExhausted
        );
        assert!(program.run("aaa", &Config::default()).unwrap().accepted());
    }

    fn pda_transition(from: &str, input: char, pop: char, to: &str, push: &str) -> PdaTransition {
        PdaTransition {
            from: from.into(),
            input,
            pop,
            to: to.into(),
            push: push.chars().collect(),
        }
    }

    #[test]
    fn test_epsilon_mode_reaches_nfa() {
        let program = Program {
            name: "Skip".into(),
            machine: Machine::Nfa(FiniteAutomaton {
                states: vec!["s".into(), "t".into()],
                alphabet: vec!['a'],
                transitions: vec![
                    FaTransition {
                        from: "s".into(),
                        to: "t".into(),
                        symbol: EPSILON,
                    },
                    FaTransition {
                        from: "t".into(),
                        to: "t".into(),
                        symbol: 'a',
                    },
                ],
                start_state: "s".into(),
                accept_states: vec!["t".into()],
            }),
        };

        let literal = program.run("a", &Config::default()).unwrap();
        assert_eq!(literal.outcome(), Outcome::Rejected);

        let closure = Config {
            epsilon: EpsilonMode::Closure,
            ..Config::default()
        };
        assert!(program.run("a", &closure).unwrap().accepted());
    }

    #[test]
    fn test_pda_mode_reaches_pda() {
        let program = Program {
            name: "Even palindromes".into(),
            machine: Machine::Pda(PushdownAutomaton {
                states: vec!["push".into(), "pop".into(), "done".into()],
                input_alphabet: vec!['a', 'b'],
                stack_alphabet: vec!['a', 'b', 'Z'],
                transitions: vec![
                    pda_transition("push", 'a', EPSILON, "push", "a"),
                    pda_transition("push", 'b', EPSILON, "push", "b"),
                    pda_transition("push", EPSILON, EPSILON, "pop", ""),
                    pda_transition("pop", 'a', 'a', "pop", ""),
                    pda_transition("pop", 'b', 'b', "pop", ""),
                    pda_transition("pop", EPSILON, 'Z', "done", "Z"),
                ],
                start_state: "push".into(),
                initial_stack_symbol: 'Z',
                accept_states: vec!["done".into()],
            }),
        };

        assert!(!program.run("abba", &Config::default()).unwrap().accepted());

        let search = Config {
            pda_mode: PdaMode::Search,
            ..Config::default()
        };
        assert!(program.run("abba", &search).unwrap().accepted());
    }

    #[test]
    fn test_run_with_cancelled_token() {
        let program = Program {
            name: "Runs right".into(),
            machine: Machine::Tm(TuringMachine {
                states: vec!["q0".into(), "qa".into(), "qr".into()],
                alphabet: vec!['1'],
                tape_alphabet: vec!['1', '_'],
                transitions: vec![TmTransition {
                    state: "q0".into(),
                    read: '1',
                    write: '1',
                    direction: Direction::Right,
                    next_state: "q0".into(),
                }],
                start_state: "q0".into(),
                accept_state: "qa".into(),
                reject_state: "qr".into(),
                blank_symbol: '_',
            }),
        };

        let cancel = CancelToken::new();
        cancel.cancel();

        let run = program.run_with("111", &Config::default(), &cancel).unwrap();
        assert_eq!(run.outcome(), Outcome::Cancelled);
        let Run::Tm(result) = run else {
            panic!("Expected a TM run");
        };
        assert!(!result.rejected);
        assert!(!result.accepted);
        assert_eq!(result.steps.len(), 1);

        // an untouched token lets the same machine halt
        let run = program.run_with("111", &Config::default(), &CancelToken::new()).unwrap();
        assert_eq!(run.outcome(), Outcome::Rejected);
    }

    #[test]
    fn test_program_json_shape() {
        let program = create_test_program();
        let json = serde_json::to_value(&program).unwrap();

        assert_eq!(json["machine"]["type"], "dfa");
        assert_eq!(json["machine"]["start_state"], "s");

        let decoded: Program = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, program);
        assert_eq!(decoded.machine.kind(), "dfa");
    }

    #[test]
    fn test_run_json_is_tagged() {
        let run = create_test_program()
            .run("a", &Config::default())
            .unwrap();
        let json = serde_json::to_value(&run).unwrap();

        assert_eq!(json["kind"], "fa");
        assert_eq!(json["outcome"], "Accepted");
    }
}
