use clap::Parser;
use formlang::{
    loader::ProgramLoader, CfgResult, Config, EpsilonMode, FaResult, FormalLanguageError,
    PdaMode, PdaResult, Program, Run, TmResult,
};
use log::{debug, info};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// The definition file to run (`.fl` text or `.json`)
    #[clap(short, long)]
    program: PathBuf,

    /// An input word; repeat for several. Read line by line from stdin when omitted
    #[clap(short, long)]
    input: Vec<String>,

    /// Print each step of the execution
    #[clap(short = 'd', long)]
    debug: bool,

    /// Print each run as JSON
    #[clap(short, long)]
    json: bool,

    /// A JSON run configuration
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Step budget for pushdown automata
    #[clap(long)]
    pda_max_steps: Option<usize>,

    /// Step budget for Turing machines
    #[clap(long)]
    tm_max_steps: Option<usize>,

    /// Depth ceiling for grammar derivations
    #[clap(long)]
    cfg_max_depth: Option<usize>,

    /// Follow ε-transitions of NFAs by closure instead of as literal symbols
    #[clap(long)]
    epsilon_closure: bool,

    /// Explore every PDA branch instead of the first applicable transition
    #[clap(long)]
    pda_search: bool,
}

impl Cli {
    fn config(&self) -> Result<Config, FormalLanguageError> {
        let mut config = match &self.config {
            Some(path) => ProgramLoader::load_config(path)?,
            None => Config::default(),
        };

        if let Some(steps) = self.pda_max_steps {
            config.pda_max_steps = steps;
        }
        if let Some(steps) = self.tm_max_steps {
            config.tm_max_steps = steps;
        }
        if let Some(depth) = self.cfg_max_depth {
            config.cfg_max_depth = depth;
        }
        if self.epsilon_closure {
            config.epsilon = EpsilonMode::Closure;
        }
        if self.pda_search {
            config.pda_mode = PdaMode::Search;
        }

        Ok(config)
    }

    fn inputs(&self) -> Result<Vec<String>, FormalLanguageError> {
        if !self.input.is_empty() || atty::is(atty::Stream::Stdin) {
            return collect_inputs(&self.input, None::<io::Empty>);
        }

        collect_inputs(&self.input, Some(io::stdin().lock()))
    }
}

/// Returns the words given as flags, or else the lines of `stdin`. Having no word at all
/// is an error; an empty word must be passed explicitly with `-i ""`.
fn collect_inputs(
    words: &[String],
    stdin: Option<impl BufRead>,
) -> Result<Vec<String>, FormalLanguageError> {
    let inputs = match stdin {
        Some(reader) if words.is_empty() => reader
            .lines()
            .collect::<Result<_, _>>()
            .map_err(|e| FormalLanguageError::FileError(format!("Failed to read stdin: {}", e)))?,
        _ => words.to_vec(),
    };

    if inputs.is_empty() {
        return Err(FormalLanguageError::ValidationError(
            "No input words; pass -i <word> or pipe words on stdin".to_string(),
        ));
    }

    Ok(inputs)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(2)
        }
    }
}

/// Runs every input and reports whether all of them were accepted.
fn run(cli: &Cli) -> Result<bool, FormalLanguageError> {
    let program = ProgramLoader::load_program(&cli.program)?;
    let config = cli.config()?;
    info!("Loaded {} '{}'", program.machine.kind(), program.name);
    debug!("Using {:?}", config);

    let mut all_accepted = true;
    for input in cli.inputs()? {
        let run = program.run(&input, &config)?;
        all_accepted &= run.accepted();

        if cli.json {
            println!("{}", serde_json::to_string(&run)?);
            continue;
        }

        if cli.debug {
            print_trace(&program, &run);
        }
        println!("{:?}: {:?}", input, run.outcome());
    }

    Ok(all_accepted)
}

fn print_trace(program: &Program, run: &Run) {
    println!("{} ({})", program.name, program.machine.kind());

    match run {
        Run::Fa(result) => print_fa(result),
        Run::Pda(result) => print_pda(result),
        Run::Tm(result) => print_tm(result),
        Run::Cfg(result) => print_cfg(result),
    }
}

fn print_fa(result: &FaResult) {
    for (i, step) in result.steps.iter().enumerate() {
        let states: Vec<&str> = step.states.iter().map(String::as_str).collect();
        println!(
            "Step: {}, Read: {}, States: {{{}}}, Remaining: {:?}",
            i,
            step.symbol.map_or("-".to_string(), |s| s.to_string()),
            states.join(", "),
            step.remaining
        );
    }
}

fn print_pda(result: &PdaResult) {
    for (i, step) in result.steps.iter().enumerate() {
        println!(
            "Step: {}, State: {}, Stack: {}, Remaining: {:?}",
            i,
            step.state,
            step.stack.iter().collect::<String>(),
            step.remaining
        );
    }
}

fn print_tm(result: &TmResult) {
    for (i, step) in result.steps.iter().enumerate() {
        println!(
            "Step: {}, State: {}, Tape: {}, Head: {}",
            i,
            step.state,
            step.tape.iter().collect::<String>(),
            step.head
        );
    }
    println!("Final tape: {}", result.tape_contents());
}

fn print_cfg(result: &CfgResult) {
    if result.derivation.is_empty() {
        println!("No derivation found");
        return;
    }

    let forms: Vec<String> = result
        .derivation
        .iter()
        .map(|step| match step.sentential() {
            form if form.is_empty() => "ε".to_string(),
            form => form,
        })
        .collect();
    println!("{}", forms.join(" => "));
}
