//! # Drove CLI
//!
//! Command-line interface for assembling and running compiled models.
//!
//! Usage:
//!   drove run <model.json>
//!   drove dump <model.json>
//!   drove check <model.json>
//!
//! Examples:
//!   drove run demos/paint.json
//!   drove run --seed 7 --procedure setup demos/paint.json
//!   RUST_LOG=drove_vm=trace drove run demos/paint.json
//!
//! A model file holds the world description, the compiled procedures and an
//! optional `run` section:
//!
//! ```json
//! {
//!   "world": { "width": 3, "height": 3, "turtles": 2, "seed": 1 },
//!   "procedures": [ { "name": "go", "body": [] } ],
//!   "run": { "procedure": "go", "agents": "observer", "max_steps": 1000 }
//! }
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use drove_vm::{
    AgentKind, AgentRef, AgentSet, AssemblerOptions, Engine, Error, ErrorKind, Notifier, ProgramDef, SimpleWorld,
    StepOutcome, Value, World, WorldSpec,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_PROCEDURE: &str = "go";
const DEFAULT_MAX_STEPS: usize = 100_000;

const EXIT_RUNTIME: u8 = 1;
const EXIT_INPUT: u8 = 2;
const EXIT_DEFECT: u8 = 70;

#[derive(Parser)]
#[command(name = "drove")]
#[command(author, version, about = "Drove - run compiled agent-based models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logs (trace with -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only print model output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a model and run one of its procedures
    Run {
        /// Path to the model JSON file
        model: PathBuf,

        /// Seed for the world's main random stream
        #[arg(long)]
        seed: Option<u64>,

        /// Procedure to run (default: go)
        #[arg(short, long)]
        procedure: Option<String>,

        /// Agents running the procedure (default: observer)
        #[arg(short, long, value_enum)]
        agents: Option<Target>,

        /// Maximum engine steps before giving up
        #[arg(short, long)]
        max_steps: Option<usize>,

        /// Accept unresolved identifiers; they fail when reached
        #[arg(long)]
        forgiving: bool,
    },
    /// Print the assembled instruction streams
    Dump {
        model: PathBuf,

        #[arg(long)]
        forgiving: bool,
    },
    /// Assemble a model and report whether it is valid
    Check {
        model: PathBuf,

        #[arg(long)]
        forgiving: bool,
    },
}

/// Which agents a job runs for
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Target {
    Observer,
    Turtles,
    Patches,
    Links,
}

impl Target {
    fn agentset(self, world: &dyn World) -> AgentSet {
        match self {
            Target::Observer => AgentSet::from_agent(AgentRef::OBSERVER),
            Target::Turtles => world.agents(AgentKind::Turtle),
            Target::Patches => world.agents(AgentKind::Patch),
            Target::Links => world.agents(AgentKind::Link),
        }
    }
}

// =============================================================================
// Model files
// =============================================================================

/// A compiled model as stored on disk
#[derive(Debug, Deserialize)]
struct Model {
    #[serde(default)]
    world: WorldSpec,
    #[serde(flatten)]
    program: ProgramDef,
    #[serde(default)]
    run: RunConfig,
}

/// Run settings; the model's `run` section merged with command-line flags
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct RunConfig {
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    procedure: Option<String>,
    #[serde(default)]
    agents: Option<Target>,
    #[serde(default)]
    max_steps: Option<usize>,
}

impl RunConfig {
    /// Flags win over the model file
    fn merge(self, flags: RunConfig) -> RunConfig {
        RunConfig {
            seed: flags.seed.or(self.seed),
            procedure: flags.procedure.or(self.procedure),
            agents: flags.agents.or(self.agents),
            max_steps: flags.max_steps.or(self.max_steps),
        }
    }

    fn procedure(&self) -> &str {
        self.procedure.as_deref().unwrap_or(DEFAULT_PROCEDURE)
    }

    fn agents(&self) -> Target {
        self.agents.unwrap_or(Target::Observer)
    }

    fn max_steps(&self) -> usize {
        self.max_steps.unwrap_or(DEFAULT_MAX_STEPS)
    }
}

fn load_model(path: &Path) -> drove_vm::Result<Model> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| {
        Error::parse_failed(format!("{}: {}", path.display(), err)).set_source(err)
    })
}

fn build_world(model: &Model, config: &RunConfig) -> drove_vm::Result<SimpleWorld> {
    let mut spec = model.world.clone();
    if let Some(seed) = config.seed {
        spec.seed = seed;
    }
    SimpleWorld::from_spec(&spec)
}

// =============================================================================
// Running
// =============================================================================

/// Prints model output as it is produced and keeps a copy
#[derive(Debug, Default)]
struct Console {
    echo: bool,
    outputs: Vec<String>,
    changes: usize,
}

impl Notifier for Console {
    fn variable_changed(&mut self, agent: AgentRef, slot: usize, value: &Value) {
        tracing::trace!(%agent, slot, %value, "variable changed");
        self.changes += 1;
    }

    fn output(&mut self, text: &str) {
        if self.echo {
            println!("{}", text);
        }
        self.outputs.push(text.to_string());
    }
}

/// What a finished run leaves behind
struct RunReport {
    outcome: StepOutcome,
    outputs: Vec<String>,
    changes: usize,
    steps: usize,
    snapshot: serde_json::Value,
}

fn run_model(model: &Model, config: &RunConfig, options: AssemblerOptions, echo: bool) -> drove_vm::Result<RunReport> {
    let world = build_world(model, config)?;
    let limits = drove_vm::Limits {
        max_steps: config.max_steps(),
        ..drove_vm::Limits::default()
    };
    let mut engine = Engine::with_options(world, &model.program, options)?
        .with_notifier(Console { echo, ..Console::default() })
        .with_limits(limits);

    let agentset = config.agents().agentset(engine.world());
    let mut job = engine.job(config.procedure(), agentset)?;
    tracing::info!(procedure = config.procedure(), agents = job.pending(), "starting run");

    let outcome = engine.run(&mut job)?;
    let console = engine.notifier();
    Ok(RunReport {
        outputs: console.outputs.clone(),
        changes: console.changes,
        steps: job.steps(),
        snapshot: engine.world().snapshot(),
        outcome,
    })
}

fn assemble(model: &Model, options: AssemblerOptions) -> drove_vm::Result<Engine<SimpleWorld>> {
    let world = build_world(model, &model.run)?;
    Engine::with_options(world, &model.program, options)
}

fn exit_code(err: &Error) -> u8 {
    if err.is_fatal() {
        return EXIT_DEFECT;
    }
    match err.kind() {
        ErrorKind::AssemblyFailed
        | ErrorKind::ProcedureNotFound
        | ErrorKind::ParseFailed
        | ErrorKind::SerializationFailed
        | ErrorKind::ConfigInvalid
        | ErrorKind::InvalidArgument
        | ErrorKind::FileNotFound
        | ErrorKind::PermissionDenied
        | ErrorKind::IoFailed => EXIT_INPUT,
        _ => EXIT_RUNTIME,
    }
}

fn report_error(err: &Error) -> ExitCode {
    eprintln!("Error: {}", err);
    if let Some(site) = drove_vm::ExecutionSite::from_error(err) {
        eprintln!("  at {}", site);
    }
    ExitCode::from(exit_code(err))
}

fn run_command(path: &Path, flags: RunConfig, forgiving: bool, quiet: bool) -> ExitCode {
    let model = match load_model(path) {
        Ok(model) => model,
        Err(err) => return report_error(&err),
    };
    let config = model.run.clone().merge(flags);
    let options = AssemblerOptions { forgiving };

    let report = match run_model(&model, &config, options, true) {
        Ok(report) => report,
        Err(err) => return report_error(&err),
    };

    match report.outcome {
        StepOutcome::Failed(err) => {
            if !quiet {
                eprintln!("\n=== RUN FAILED after {} steps ===\n", report.steps);
            }
            report_error(&err)
        }
        _ => {
            if !quiet {
                println!(
                    "\n=== RUN COMPLETE ({} steps, {} outputs, {} changes) ===\n",
                    report.steps,
                    report.outputs.len(),
                    report.changes
                );
                println!("{}", serde_json::to_string_pretty(&report.snapshot).unwrap_or_default());
            }
            ExitCode::SUCCESS
        }
    }
}

fn dump_command(path: &Path, forgiving: bool) -> ExitCode {
    let result = load_model(path).and_then(|model| assemble(&model, AssemblerOptions { forgiving }));
    match result {
        Ok(engine) => {
            engine.program().pretty_print(engine.world());
            ExitCode::SUCCESS
        }
        Err(err) => report_error(&err),
    }
}

fn check_command(path: &Path, forgiving: bool, quiet: bool) -> ExitCode {
    let result = load_model(path).and_then(|model| assemble(&model, AssemblerOptions { forgiving }));
    match result {
        Ok(engine) => {
            if !quiet {
                let instructions: usize = engine.program().procedures.iter().map(|p| p.code.len()).sum();
                println!(
                    "{}: ok ({} procedures, {} instructions)",
                    path.display(),
                    engine.program().procedures.len(),
                    instructions
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => report_error(&err),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "drove_vm=debug,drove=debug",
        (false, _) => "drove_vm=trace,drove=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run {
            model,
            seed,
            procedure,
            agents,
            max_steps,
            forgiving,
        } => {
            let flags = RunConfig {
                seed,
                procedure,
                agents,
                max_steps,
            };
            run_command(&model, flags, forgiving, cli.quiet)
        }
        Commands::Dump { model, forgiving } => dump_command(&model, forgiving),
        Commands::Check { model, forgiving } => check_command(&model, forgiving, cli.quiet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_model(json: serde_json::Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", json).unwrap();
        file
    }

    fn paint_model() -> serde_json::Value {
        serde_json::json!({
            "world": { "width": 2, "height": 1, "seed": 3 },
            "procedures": [{
                "name": "go",
                "body": [
                    { "prim": "ask", "args": [{ "prim": "patches" }], "blocks": [[
                        { "prim": "set_patch_variable", "vn": 3, "args": [{ "prim": "constant", "value": 15.0 }] }
                    ]] },
                    { "prim": "print", "args": [{ "prim": "constant", "value": "painted" }] }
                ]
            }],
            "run": { "procedure": "go", "max_steps": 50 }
        })
    }

    #[test]
    fn test_load_and_run_model() {
        let file = write_model(paint_model());
        let model = load_model(file.path()).unwrap();
        assert_eq!(model.world.width, 2);
        assert_eq!(model.run.max_steps, Some(50));

        let report = run_model(&model, &model.run, AssemblerOptions::default(), false).unwrap();
        assert!(report.outcome.is_finished());
        assert_eq!(report.outputs, vec!["painted"]);
        assert_eq!(report.changes, 2);

        let patches = report.snapshot["patches"].as_array().unwrap();
        assert_eq!(patches.len(), 2);
        for patch in patches {
            assert_eq!(patch["pcolor"], serde_json::json!(15.0));
        }
    }

    #[test]
    fn test_flags_override_model() {
        let from_file = RunConfig {
            seed: Some(1),
            procedure: Some("setup".to_string()),
            agents: None,
            max_steps: Some(10),
        };
        let flags = RunConfig {
            seed: Some(9),
            agents: Some(Target::Patches),
            ..RunConfig::default()
        };
        let merged = from_file.merge(flags);
        assert_eq!(merged.seed, Some(9));
        assert_eq!(merged.procedure(), "setup");
        assert_eq!(merged.agents(), Target::Patches);
        assert_eq!(merged.max_steps(), 10);

        let empty = RunConfig::default();
        assert_eq!(empty.procedure(), DEFAULT_PROCEDURE);
        assert_eq!(empty.agents(), Target::Observer);
        assert_eq!(empty.max_steps(), DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_runtime_failure_is_reported() {
        let file = write_model(serde_json::json!({
            "procedures": [{
                "name": "go",
                "body": [{ "prim": "print", "args": [{ "prim": "div", "args": [
                    { "prim": "constant", "value": 1.0 },
                    { "prim": "constant", "value": 0.0 }
                ] }] }]
            }]
        }));
        let model = load_model(file.path()).unwrap();
        let report = run_model(&model, &model.run, AssemblerOptions::default(), false).unwrap();
        match report.outcome {
            StepOutcome::Failed(err) => {
                assert_eq!(err.kind(), ErrorKind::Runtime);
                assert_eq!(exit_code(&err), EXIT_RUNTIME);
            }
            _ => panic!("expected a failed run"),
        }
    }

    #[test]
    fn test_unknown_identifier_needs_forgiving() {
        let file = write_model(serde_json::json!({
            "procedures": [{
                "name": "go",
                "body": [{ "prim": "print", "args": [{ "prim": "unknown_identifier", "name": "foo" }] }]
            }]
        }));
        let model = load_model(file.path()).unwrap();

        let err = assemble(&model, AssemblerOptions::default()).err().unwrap();
        assert_eq!(exit_code(&err), EXIT_INPUT);

        assert!(assemble(&model, AssemblerOptions { forgiving: true }).is_ok());
        let err = run_model(&model, &model.run, AssemblerOptions { forgiving: true }, false)
            .err()
            .unwrap();
        assert_eq!(exit_code(&err), EXIT_DEFECT);
    }

    #[test]
    fn test_input_errors() {
        let missing = load_model(Path::new("/nonexistent/model.json")).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::FileNotFound);
        assert_eq!(exit_code(&missing), EXIT_INPUT);

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let garbled = load_model(file.path()).unwrap_err();
        assert_eq!(garbled.kind(), ErrorKind::ParseFailed);

        let model = load_model(write_model(paint_model()).path()).unwrap();
        let config = RunConfig {
            procedure: Some("missing".to_string()),
            ..RunConfig::default()
        };
        let err = run_model(&model, &config, AssemblerOptions::default(), false)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ProcedureNotFound);
    }

    #[test]
    fn test_seed_flag_reseeds_world() {
        let model = load_model(
            write_model(serde_json::json!({
                "world": { "seed": 1 },
                "procedures": [{ "name": "go", "body": [
                    { "prim": "print", "args": [{ "prim": "random", "args": [{ "prim": "constant", "value": 1000000.0 }] }] }
                ] }]
            }))
            .path(),
        )
        .unwrap();
        let draw = |seed: Option<u64>| {
            let config = RunConfig { seed, ..RunConfig::default() };
            run_model(&model, &config, AssemblerOptions::default(), false)
                .unwrap()
                .outputs
        };
        assert_eq!(draw(None), draw(Some(1)));
        assert_eq!(draw(Some(5)), draw(Some(5)));
    }
}
