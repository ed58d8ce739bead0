//! This module provides the parser for textual machine and grammar definitions, utilizing
//! the `pest` crate. The grammar lives in `grammar.pest`; the functions here turn the
//! parse tree into a validated `Program`.

use crate::{
    analyzer::analyze,
    program::{Machine, Program},
    types::{
        is_epsilon, ContextFreeGrammar, Direction, FaTransition, FiniteAutomaton,
        FormalLanguageError, PdaTransition, Production, PushdownAutomaton, Symbol, TmTransition,
        TuringMachine, DEFAULT_BLANK_SYMBOL, EPSILON, MAX_PROGRAM_SIZE,
    },
};
use pest::{
    error::{Error, ErrorVariant},
    iterators::Pair,
    Parser as PestParser, Span,
};
use pest_derive::Parser as PestParser;
use std::collections::HashSet;

/// Derives a `PestParser` for the definition grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct DefinitionParser;

/// Parses the given input string into a `Program` struct.
///
/// This is the main entry point for parsing textual definitions. The parsed program is
/// validated before being returned.
///
/// # Arguments
///
/// * `input` - A string slice containing the definition.
///
/// # Returns
///
/// * `Ok(Program)` if the input is successfully parsed and validated.
/// * `Err(FormalLanguageError::ParseError)` if there are any syntax errors.
/// * `Err(FormalLanguageError::ValidationError)` if the definition fails validation.
pub fn parse(input: &str) -> Result<Program, FormalLanguageError> {
    if input.len() > MAX_PROGRAM_SIZE {
        return Err(FormalLanguageError::ValidationError(format!(
            "Program is larger than {} bytes",
            MAX_PROGRAM_SIZE
        )));
    }

    let root = DefinitionParser::parse(Rule::program, input.trim())
        .map_err(|e| FormalLanguageError::ParseError(e.into()))?
        .next()
        .ok_or_else(|| FormalLanguageError::ValidationError("Empty program".to_string()))?;

    let program = parse_program(root)?;

    // Analyze the parsed program
    analyze(&program)?;

    Ok(program)
}

/// A symbol as written, with quotes removed.
#[derive(Debug, Clone)]
struct Token<'i> {
    text: String,
    span: Span<'i>,
}

/// The right-hand side items of a transition line.
#[derive(Debug, Clone)]
enum Target<'i> {
    Symbol(Token<'i>),
    Stack(Vec<Token<'i>>),
}

#[derive(Debug, Clone)]
struct TransitionLine<'i> {
    left: Vec<Token<'i>>,
    right: Vec<Target<'i>>,
    span: Span<'i>,
}

#[derive(Debug, Clone)]
struct ProductionLine<'i> {
    head: Token<'i>,
    alternatives: Vec<Vec<Token<'i>>>,
}

#[derive(Debug, Clone)]
struct Field<'i> {
    key: String,
    values: Vec<Token<'i>>,
    span: Span<'i>,
}

/// The top-level sections of a definition, before they are interpreted for a kind.
#[derive(Debug, Default)]
struct Sections<'i> {
    name: Option<String>,
    kind: Option<String>,
    fields: Vec<Field<'i>>,
    transitions: Option<(Vec<TransitionLine<'i>>, Span<'i>)>,
    productions: Option<(Vec<ProductionLine<'i>>, Span<'i>)>,
}

/// Parses the top-level structure of a definition from a `Pair<Rule::program>`.
fn parse_program(pair: Pair<Rule>) -> Result<Program, FormalLanguageError> {
    let mut sections = Sections::default();
    let mut seen = HashSet::new();

    for p in pair.into_inner() {
        let span = p.as_span();

        match p.as_rule() {
            Rule::name => {
                check_unique_rule("name", span, &mut seen)?;
                sections.name = Some(parse_inner_string(p).trim().to_string());
            }
            Rule::kind => {
                check_unique_rule("type", span, &mut seen)?;
                sections.kind = Some(parse_inner_string(p).to_string());
            }
            Rule::field => {
                let field = parse_field(p);
                match field.key.as_str() {
                    "type" => {
                        let found = field.values.first().map_or("", |t| t.text.as_str());
                        return Err(parse_error(
                            &format!("Unsupported type: '{found}', expected one of 'dfa', 'nfa', 'pda', 'tm', 'cfg'"),
                            span,
                        ));
                    }
                    "name" => return Err(parse_error("Program name cannot be empty", span)),
                    key => check_unique_rule(key, span, &mut seen)?,
                }
                sections.fields.push(field);
            }
            Rule::transitions => {
                check_unique_rule("transitions", span, &mut seen)?;
                let lines = p
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::transition)
                    .map(parse_transition_line)
                    .collect();
                sections.transitions = Some((lines, span));
            }
            Rule::productions => {
                check_unique_rule("productions", span, &mut seen)?;
                let lines = p
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::production)
                    .map(parse_production_line)
                    .collect();
                sections.productions = Some((lines, span));
            }
            _ => {} // Skip EOI
        }
    }

    // Handle mandatory checks
    let name = check_required_rule(sections.name.take(), "name")?;
    let kind = check_required_rule(sections.kind.take(), "type")?;

    let machine = match kind.as_str() {
        "dfa" => Machine::Dfa(build_finite_automaton(&sections)?),
        "nfa" => Machine::Nfa(build_finite_automaton(&sections)?),
        "pda" => Machine::Pda(build_pushdown_automaton(&sections)?),
        "tm" => Machine::Tm(build_turing_machine(&sections)?),
        "cfg" => Machine::Cfg(build_grammar(&sections)?),
        other => {
            return Err(FormalLanguageError::ValidationError(format!(
                "Unsupported type: '{other}'"
            )))
        }
    };

    Ok(Program { name, machine })
}

fn parse_field(pair: Pair<Rule>) -> Field {
    let span = pair.as_span();
    let mut key = String::new();
    let mut values = Vec::new();

    // Rule: field > key, symbols?
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::key => key = p.as_str().to_string(),
            Rule::symbols => values = parse_symbols(p),
            _ => {}
        }
    }

    Field { key, values, span }
}

/// Parses a transition line: `symbols -> targets`.
fn parse_transition_line(pair: Pair<Rule>) -> TransitionLine {
    let span = pair.as_span();
    let mut left = Vec::new();
    let mut right = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::symbols => left = parse_symbols(p),
            Rule::targets => {
                for target in p.into_inner() {
                    match target.as_rule() {
                        Rule::stack => right.push(Target::Stack(
                            target
                                .into_inner()
                                .flat_map(parse_symbols)
                                .collect(),
                        )),
                        Rule::symbol => right.push(Target::Symbol(parse_token(target))),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    TransitionLine { left, right, span }
}

/// Parses a production line: `head -> alternative | alternative ...`.
fn parse_production_line(pair: Pair<Rule>) -> ProductionLine {
    let span = pair.as_span();
    let mut head = None;
    let mut alternatives = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::symbol => head = Some(parse_token(p)),
            Rule::alternative => alternatives.push(p.into_inner().map(parse_token).collect()),
            _ => {}
        }
    }

    ProductionLine {
        head: head.unwrap_or(Token {
            text: String::new(),
            span,
        }),
        alternatives,
    }
}

fn parse_symbols(pair: Pair<Rule>) -> Vec<Token> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::symbol)
        .map(parse_token)
        .collect()
}

/// Parses a symbol, handling quoted and unquoted forms.
fn parse_token(pair: Pair<Rule>) -> Token {
    let raw = pair.as_str();
    let text = match raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(inner) if !inner.is_empty() => inner,
        _ => raw,
    };

    Token {
        text: text.to_string(),
        span: pair.as_span(),
    }
}

/// Converts a token into a single-character symbol, mapping ε spellings to [`EPSILON`].
fn parse_symbol(token: &Token) -> Result<Symbol, FormalLanguageError> {
    if is_epsilon(&token.text) {
        return Ok(EPSILON);
    }

    let mut chars = token.text.chars();
    match (chars.next(), chars.next()) {
        (Some(symbol), None) => Ok(symbol),
        _ => Err(parse_error(
            &format!("Symbol '{}' must be a single character", token.text),
            token.span,
        )),
    }
}

/// Parses a direction. Supports '<' or 'L' for Left, '>' or 'R' for Right, and '-' or
/// 'S' for Stay.
fn parse_direction(token: &Token) -> Result<Direction, FormalLanguageError> {
    match token.text.as_str() {
        "<" | "L" => Ok(Direction::Left),
        ">" | "R" => Ok(Direction::Right),
        "-" | "S" => Ok(Direction::Stay),
        other => Err(parse_error(
            &format!("Unsupported direction: {}", other),
            token.span,
        )),
    }
}

fn build_finite_automaton(sections: &Sections) -> Result<FiniteAutomaton, FormalLanguageError> {
    sections.check_keys("finite automaton", &["states", "alphabet", "start", "accept"])?;
    sections.reject_productions()?;

    let mut transitions = Vec::new();
    for line in sections.transition_lines() {
        let (from, symbol) = match line.left.as_slice() {
            [from, symbol] => (from, symbol),
            _ => return Err(arity_error("from, symbol -> to", line)),
        };
        let symbol = parse_symbol(symbol)?;

        let targets = line.symbol_targets();
        if targets.is_empty() || targets.len() != line.right.len() {
            return Err(arity_error("from, symbol -> to", line));
        }

        transitions.extend(targets.into_iter().map(|to| FaTransition {
            from: from.text.clone(),
            to: to.text.clone(),
            symbol,
        }));
    }

    Ok(FiniteAutomaton {
        states: names(sections.required("states")?),
        alphabet: symbols(sections.list("alphabet"))?,
        transitions,
        start_state: sections.required_single("start")?.text.clone(),
        accept_states: names(sections.list("accept")),
    })
}

fn build_pushdown_automaton(
    sections: &Sections,
) -> Result<PushdownAutomaton, FormalLanguageError> {
    sections.check_keys(
        "pushdown automaton",
        &["states", "input", "stack", "start", "initial", "accept"],
    )?;
    sections.reject_productions()?;

    let mut transitions = Vec::new();
    for line in sections.transition_lines() {
        let usage = "from, input, pop -> to, [push, ...]";
        let (from, input, pop) = match line.left.as_slice() {
            [from, input, pop] => (from, input, pop),
            _ => return Err(arity_error(usage, line)),
        };
        let (to, push) = match line.right.as_slice() {
            [Target::Symbol(to), Target::Stack(push)] => (to, symbols(push)?),
            [Target::Symbol(to), Target::Symbol(push)] => {
                let push = parse_symbol(push)?;
                (to, if push == EPSILON { vec![] } else { vec![push] })
            }
            _ => return Err(arity_error(usage, line)),
        };

        transitions.push(PdaTransition {
            from: from.text.clone(),
            input: parse_symbol(input)?,
            pop: parse_symbol(pop)?,
            to: to.text.clone(),
            push,
        });
    }

    Ok(PushdownAutomaton {
        states: names(sections.required("states")?),
        input_alphabet: symbols(sections.list("input"))?,
        stack_alphabet: symbols(sections.required("stack")?)?,
        transitions,
        start_state: sections.required_single("start")?.text.clone(),
        initial_stack_symbol: parse_symbol(sections.required_single("initial")?)?,
        accept_states: names(sections.list("accept")),
    })
}

fn build_turing_machine(sections: &Sections) -> Result<TuringMachine, FormalLanguageError> {
    sections.check_keys(
        "Turing machine",
        &["states", "alphabet", "tape", "start", "accept", "reject", "blank"],
    )?;
    sections.reject_productions()?;

    let blank = match sections.single("blank")? {
        Some(token) => parse_symbol(token)?,
        None => DEFAULT_BLANK_SYMBOL,
    };

    let mut transitions = Vec::new();
    for line in sections.transition_lines() {
        let usage = "state, read -> write, direction, next";
        let (state, read) = match line.left.as_slice() {
            [state, read] => (state, read),
            _ => return Err(arity_error(usage, line)),
        };
        let (write, direction, next) = match line.right.as_slice() {
            [Target::Symbol(write), Target::Symbol(direction), Target::Symbol(next)] => {
                (write, direction, next)
            }
            _ => return Err(arity_error(usage, line)),
        };

        transitions.push(TmTransition {
            state: state.text.clone(),
            read: parse_symbol(read)?,
            write: parse_symbol(write)?,
            direction: parse_direction(direction)?,
            next_state: next.text.clone(),
        });
    }

    let alphabet = symbols(sections.list("alphabet"))?;
    let tape_alphabet = if sections.has("tape") {
        symbols(sections.list("tape"))?
    } else {
        // Infer the tape alphabet from everything the machine can see or write.
        let mut inferred = alphabet.clone();
        let used = transitions.iter().flat_map(|t| [t.read, t.write]);
        for symbol in std::iter::once(blank).chain(used) {
            if !inferred.contains(&symbol) {
                inferred.push(symbol);
            }
        }
        inferred
    };

    Ok(TuringMachine {
        states: names(sections.required("states")?),
        alphabet,
        tape_alphabet,
        transitions,
        start_state: sections.required_single("start")?.text.clone(),
        accept_state: sections.required_single("accept")?.text.clone(),
        reject_state: sections.required_single("reject")?.text.clone(),
        blank_symbol: blank,
    })
}

fn build_grammar(sections: &Sections) -> Result<ContextFreeGrammar, FormalLanguageError> {
    sections.check_keys("grammar", &["terminals", "nonterminals", "start"])?;
    if let Some((_, span)) = &sections.transitions {
        return Err(parse_error(
            "'transitions' section is not allowed in a grammar",
            *span,
        ));
    }

    let lines = sections
        .productions
        .as_ref()
        .map(|(lines, _)| lines.as_slice())
        .unwrap_or_default();

    let mut productions = Vec::new();
    for line in lines {
        for alternative in &line.alternatives {
            productions.push(Production {
                left: line.head.text.clone(),
                right: alternative.iter().map(|t| t.text.clone()).collect(),
            });
        }
    }

    let non_terminals = names(sections.required("nonterminals")?);
    let terminals = if sections.has("terminals") {
        names(sections.list("terminals"))
    } else {
        // Everything on a right-hand side that is not a non-terminal.
        let mut inferred: Vec<String> = Vec::new();
        for symbol in productions.iter().flat_map(|p| p.body()) {
            if !non_terminals.iter().any(|n| n == symbol) && !inferred.iter().any(|t| t == symbol)
            {
                inferred.push(symbol.to_string());
            }
        }
        inferred
    };

    Ok(ContextFreeGrammar {
        terminals,
        non_terminals,
        productions,
        start_symbol: sections.required_single("start")?.text.clone(),
    })
}

impl<'i> Sections<'i> {
    fn field(&self, key: &str) -> Option<&Field<'i>> {
        self.fields.iter().find(|field| field.key == key)
    }

    fn has(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    fn list(&self, key: &str) -> &[Token<'i>] {
        self.field(key)
            .map(|field| field.values.as_slice())
            .unwrap_or_default()
    }

    fn required(&self, key: &str) -> Result<&[Token<'i>], FormalLanguageError> {
        match self.field(key) {
            Some(field) if !field.values.is_empty() => Ok(field.values.as_slice()),
            Some(field) => Err(parse_error(&format!("'{key}' cannot be empty"), field.span)),
            None => check_required_rule(None, key),
        }
    }

    fn single(&self, key: &str) -> Result<Option<&Token<'i>>, FormalLanguageError> {
        match self.field(key) {
            Some(field) if field.values.len() == 1 => Ok(field.values.first()),
            Some(field) => Err(parse_error(
                &format!("'{key}' expects exactly one value"),
                field.span,
            )),
            None => Ok(None),
        }
    }

    fn required_single(&self, key: &str) -> Result<&Token<'i>, FormalLanguageError> {
        check_required_rule(self.single(key)?, key)
    }

    /// Rejects keys that do not belong to the kind being built.
    fn check_keys(&self, kind: &str, allowed: &[&str]) -> Result<(), FormalLanguageError> {
        match self.fields.iter().find(|f| !allowed.contains(&f.key.as_str())) {
            Some(field) => Err(parse_error(
                &format!(
                    "Unknown key '{}' for a {kind}, expected {}",
                    field.key,
                    format_rules(allowed)
                ),
                field.span,
            )),
            None => Ok(()),
        }
    }

    fn reject_productions(&self) -> Result<(), FormalLanguageError> {
        match &self.productions {
            Some((_, span)) => Err(parse_error(
                "'productions' section is only allowed in a grammar",
                *span,
            )),
            None => Ok(()),
        }
    }

    fn transition_lines(&self) -> &[TransitionLine<'i>] {
        self.transitions
            .as_ref()
            .map(|(lines, _)| lines.as_slice())
            .unwrap_or_default()
    }
}

impl<'i> TransitionLine<'i> {
    fn symbol_targets(&self) -> Vec<&Token<'i>> {
        self.right
            .iter()
            .filter_map(|target| match target {
                Target::Symbol(token) => Some(token),
                Target::Stack(_) => None,
            })
            .collect()
    }
}

fn names(tokens: &[Token]) -> Vec<String> {
    tokens.iter().map(|t| t.text.clone()).collect()
}

fn symbols(tokens: &[Token]) -> Result<Vec<Symbol>, FormalLanguageError> {
    tokens.iter().map(parse_symbol).collect()
}

/// Extracts the inner string content from a `Pair`.
fn parse_inner_string(pair: Pair<Rule>) -> &str {
    pair.into_inner().next().map_or("", |p| p.as_str())
}

/// Creates a `FormalLanguageError::ParseError` from a message and a `Span`.
fn parse_error(msg: &str, span: Span) -> FormalLanguageError {
    FormalLanguageError::ParseError(Box::new(Error::new_from_span(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        span,
    )))
}

fn arity_error(usage: &str, line: &TransitionLine) -> FormalLanguageError {
    parse_error(&format!("Expected a transition of the form '{usage}'"), line.span)
}

/// Checks if a given section has already been declared.
fn check_unique_rule(
    name: &str,
    span: Span,
    seen: &mut HashSet<String>,
) -> Result<(), FormalLanguageError> {
    if !seen.insert(name.to_string()) {
        return Err(parse_error(
            &format!("Duplicate \"{name}:\" declaration"),
            span,
        ));
    }

    Ok(())
}

/// Checks if a required section is present, returning an `Err` if it's missing.
fn check_required_rule<T>(value: Option<T>, name: &str) -> Result<T, FormalLanguageError> {
    value.ok_or_else(|| FormalLanguageError::ValidationError(format!("Missing '{name}' section")))
}

/// Formats a list of rule names into a human-readable string for error messages.
fn format_rules(names: &[&str]) -> String {
    names
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
