//! This module defines the `Deriver`, which decides whether a target string is derivable
//! from a context-free grammar by iterative-deepening search over leftmost derivations.
//!
//! Depth ceilings `1..=limit` are tried in turn. Productions are tried in authoring
//! order, so the derivation returned is the first one found at the smallest depth that
//! admits one. A branch is abandoned as soon as its terminals outgrow the target or stop
//! matching the target's prefix. Neither check ever discards a branch that could still
//! succeed.

use crate::analyzer::analyze_cfg;
use crate::types::{Budget, ContextFreeGrammar, FormalLanguageError, Outcome, Production};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One sentential form of a derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationStep {
    pub form: Vec<String>,
    /// The production applied to reach this form, `None` for the start symbol.
    pub production: Option<Production>,
}

impl DerivationStep {
    /// Renders the sentential form as one string.
    pub fn sentential(&self) -> String {
        self.form.concat()
    }
}

/// The result of a derivation search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgResult {
    pub can_derive: bool,
    /// `Rejected` when the whole search space was exhausted, `BudgetExhausted` when the
    /// depth ceiling cut the search short.
    pub outcome: Outcome,
    /// Empty unless a derivation was found.
    pub derivation: Vec<DerivationStep>,
    /// The depth ceiling at which the derivation was found.
    pub depth: Option<usize>,
}

type Id = u32;

#[derive(Debug, Clone)]
struct Expansion {
    production: Production,
    body: Vec<Id>,
}

/// Searches derivations of a validated grammar.
#[derive(Debug, Clone)]
pub struct Deriver {
    grammar: ContextFreeGrammar,
    names: Vec<String>,
    non_terminal: Vec<bool>,
    rules: Vec<Vec<Expansion>>,
    start: Id,
}

impl Deriver {
    /// Validates `grammar` and interns its symbols.
    pub fn build(grammar: ContextFreeGrammar) -> Result<Self, FormalLanguageError> {
        analyze_cfg(&grammar)?;

        let mut ids: HashMap<String, Id> = HashMap::new();
        let mut names = Vec::new();
        let mut non_terminal = Vec::new();
        for (symbol, is_non_terminal) in grammar
            .non_terminals
            .iter()
            .map(|s| (s, true))
            .chain(grammar.terminals.iter().map(|s| (s, false)))
        {
            if !ids.contains_key(symbol) {
                ids.insert(symbol.clone(), names.len() as Id);
                names.push(symbol.clone());
                non_terminal.push(is_non_terminal);
            }
        }

        let mut rules: Vec<Vec<Expansion>> = vec![Vec::new(); names.len()];
        for production in &grammar.productions {
            let body = production.body().filter_map(|s| ids.get(s).copied()).collect();
            if let Some(&head) = ids.get(&production.left) {
                rules[head as usize].push(Expansion {
                    production: production.clone(),
                    body,
                });
            }
        }

        let start = ids.get(&grammar.start_symbol).copied().ok_or_else(|| {
            FormalLanguageError::ValidationError(format!(
                "Start symbol is not a declared non-terminal: {}",
                grammar.start_symbol
            ))
        })?;

        Ok(Self {
            grammar,
            names,
            non_terminal,
            rules,
            start,
        })
    }

    pub fn grammar(&self) -> &ContextFreeGrammar {
        &self.grammar
    }

    /// Searches for a leftmost derivation of `target`, deepening up to `budget.limit`.
    pub fn derive(&self, target: &str, budget: &Budget) -> CfgResult {
        debug!(
            "Deriving {:?} from {} up to depth {}",
            target, self.grammar.start_symbol, budget.limit
        );

        let mut search = Search {
            deriver: self,
            target,
            budget,
            failed: HashMap::new(),
            on_path: HashSet::new(),
            cut_off: false,
            cancelled: false,
        };

        for max_depth in 1..=budget.limit {
            search.failed.clear();
            search.on_path.clear();
            search.cut_off = false;

            if let Some(path) = search.run(self.start, max_depth) {
                debug!("Derived {:?} at depth {}", target, max_depth);
                return CfgResult {
                    can_derive: true,
                    outcome: Outcome::Accepted,
                    derivation: self.trace(path),
                    depth: Some(max_depth),
                };
            }

            if search.cancelled {
                return failure(Outcome::Cancelled);
            }

            if !search.cut_off {
                debug!("No derivation of {:?} exists", target);
                return failure(Outcome::Rejected);
            }

            trace!("Nothing within depth {}; deepening", max_depth);
        }

        debug!("No derivation of {:?} within depth {}", target, budget.limit);
        failure(Outcome::BudgetExhausted)
    }

    fn trace(&self, path: Vec<(&Expansion, Vec<Id>)>) -> Vec<DerivationStep> {
        let mut steps = vec![DerivationStep {
            form: vec![self.grammar.start_symbol.clone()],
            production: None,
        }];

        steps.extend(path.into_iter().map(|(rule, form)| DerivationStep {
            form: form.iter().map(|&id| self.names[id as usize].clone()).collect(),
            production: Some(rule.production.clone()),
        }));

        steps
    }

    fn is_non_terminal(&self, id: Id) -> bool {
        self.non_terminal[id as usize]
    }

    fn text(&self, id: Id) -> &str {
        &self.names[id as usize]
    }
}

fn failure(outcome: Outcome) -> CfgResult {
    CfgResult {
        can_derive: false,
        outcome,
        derivation: Vec::new(),
        depth: None,
    }
}

/// State of one search. Each round of deepening reuses it after clearing `failed`.
struct Search<'a> {
    deriver: &'a Deriver,
    target: &'a str,
    budget: &'a Budget,
    /// Forms already shown to fail, with the largest remaining depth that was tried.
    failed: HashMap<Vec<Id>, usize>,
    /// Forms on the branch currently being explored.
    on_path: HashSet<Vec<Id>>,
    /// Set when a branch was abandoned only because the depth ceiling was hit.
    cut_off: bool,
    cancelled: bool,
}

/// A sentential form whose expansions are still being tried.
struct Frame<'a> {
    form: Vec<Id>,
    remaining: usize,
    /// Position of the leftmost non-terminal.
    index: usize,
    rules: &'a [Expansion],
    next: usize,
    /// The rule that produced `form`, `None` for the start symbol.
    via: Option<&'a Expansion>,
}

enum Visit {
    Matched,
    Dead,
    Open(usize),
}

impl<'a> Search<'a> {
    /// Depth-first search below `start` with at most `max_depth` expansions. Returns the
    /// rules applied and the forms they produced, in order, or `None` if `target` is not
    /// reachable.
    ///
    /// Frames live on the heap so a deep budget cannot exhaust the thread stack.
    fn run(&mut self, start: Id, max_depth: usize) -> Option<Vec<(&'a Expansion, Vec<Id>)>> {
        let deriver = self.deriver;
        let form = vec![start];

        let index = match self.visit(&form, max_depth) {
            Visit::Matched => return Some(Vec::new()),
            Visit::Dead => return None,
            Visit::Open(index) => index,
        };

        self.on_path.insert(form.clone());
        let mut stack = vec![Frame {
            rules: &deriver.rules[form[index] as usize],
            form,
            remaining: max_depth,
            index,
            next: 0,
            via: None,
        }];

        while let Some(frame) = stack.last_mut() {
            if self.cancelled {
                return None;
            }

            let rules = frame.rules;
            let Some(rule) = rules.get(frame.next) else {
                if let Some(done) = stack.pop() {
                    self.on_path.remove(&done.form);
                    self.failed.insert(done.form, done.remaining);
                }
                continue;
            };
            frame.next += 1;

            let mut next = Vec::with_capacity(frame.form.len() + rule.body.len());
            next.extend_from_slice(&frame.form[..frame.index]);
            next.extend_from_slice(&rule.body);
            next.extend_from_slice(&frame.form[frame.index + 1..]);
            let remaining = frame.remaining - 1;

            match self.visit(&next, remaining) {
                Visit::Matched => {
                    let mut path: Vec<_> = stack
                        .iter()
                        .filter_map(|f| f.via.map(|via| (via, f.form.clone())))
                        .collect();
                    path.push((rule, next));
                    return Some(path);
                }
                Visit::Dead => {}
                Visit::Open(index) => {
                    self.on_path.insert(next.clone());
                    stack.push(Frame {
                        rules: &deriver.rules[next[index] as usize],
                        form: next,
                        remaining,
                        index,
                        next: 0,
                        via: Some(rule),
                    });
                }
            }
        }

        None
    }

    /// Decides whether `form` is the target, cannot lead to it, or must be expanded at
    /// its leftmost non-terminal.
    fn visit(&mut self, form: &[Id], remaining: usize) -> Visit {
        if self.budget.is_cancelled() {
            self.cancelled = true;
            return Visit::Dead;
        }

        let deriver = self.deriver;
        let Some(index) = form.iter().position(|&id| deriver.is_non_terminal(id)) else {
            return if self.matches(form) == Some(self.target.len()) {
                Visit::Matched
            } else {
                Visit::Dead
            };
        };

        let terminal_len: usize = form
            .iter()
            .filter(|&&id| !deriver.is_non_terminal(id))
            .map(|&id| deriver.text(id).len())
            .sum();
        if terminal_len > self.target.len() || self.matches(&form[..index]).is_none() {
            return Visit::Dead;
        }

        // A form repeated on its own branch is never part of a shortest derivation.
        if self.on_path.contains(form) {
            return Visit::Dead;
        }

        if remaining == 0 {
            self.cut_off = true;
            return Visit::Dead;
        }

        if self.failed.get(form).is_some_and(|&tried| tried >= remaining) {
            return Visit::Dead;
        }

        Visit::Open(index)
    }

    /// Matches the terminals of `symbols` against the start of the target, returning
    /// the number of bytes matched.
    fn matches(&self, symbols: &[Id]) -> Option<usize> {
        let mut offset = 0;
        for &id in symbols {
            let text = self.deriver.text(id);
            if !self.target[offset..].starts_with(text) {
                return None;
            }
            offset += text.len();
        }
        Some(offset)
    }
}
