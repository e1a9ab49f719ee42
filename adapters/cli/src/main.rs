#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line harness that runs a blocks-world simulation to completion.

mod logging;
mod script;

use std::{fs::File, path::Path, path::PathBuf, thread, time::Duration};

use anyhow::{bail, Context, Result};
use blocks_world_system_environment::{
    ConflictPolicy, Environment, FirstComeFirstServed, PassThrough, ScriptedAgent,
};
use blocks_world_system_perturbation::{Config, DynamicPerturbation};
use blocks_world_world::World;
use clap::{Parser, ValueEnum};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "blocks-world",
    version,
    about = "Turn-based multi-agent blocks-world simulation"
)]
struct Cli {
    /// World-state file describing the initial world.
    #[arg(long)]
    initial: PathBuf,
    /// Goal world-state file; one agent joins per goal.
    #[arg(long = "goal", required = true)]
    goals: Vec<PathBuf>,
    /// Action script for the agent of the goal at the same position.
    #[arg(long = "script")]
    scripts: Vec<PathBuf>,
    /// Probability that a cycle perturbs the unobserved part of the world.
    #[arg(long, default_value_t = 0.0)]
    dynamicity: f32,
    /// Seed of the perturbation generator; random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Cycles to run before giving up.
    #[arg(long, default_value_t = 1_000)]
    max_steps: u64,
    /// Pause between cycles, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
    /// How conflicting actions of different agents are settled.
    #[arg(long, value_enum, default_value_t = ConflictMode::PassThrough)]
    conflicts: ConflictMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ConflictMode {
    /// Actions run in agent order; later ones may fail.
    PassThrough,
    /// Later conflicting actions wait for the next cycle.
    FirstComeFirstServed,
}

impl ConflictMode {
    fn policy(self) -> Box<dyn ConflictPolicy> {
        match self {
            Self::PassThrough => Box::new(PassThrough),
            Self::FirstComeFirstServed => Box::new(FirstComeFirstServed),
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    if cli.scripts.len() > cli.goals.len() {
        bail!(
            "{} scripts given for {} goals",
            cli.scripts.len(),
            cli.goals.len()
        );
    }

    let initial = load_world(&cli.initial)?;
    let mut environment = Environment::new(initial)
        .context("assign stations")?
        .with_conflict_policy(cli.conflicts.policy());

    if cli.dynamicity > 0.0 {
        let seed = cli.seed.unwrap_or_else(rand::random);
        println!("Random seed is: {seed}");
        info!(seed, dynamicity = cli.dynamicity, "perturbation enabled");
        let perturbation = DynamicPerturbation::new(Config::new(cli.dynamicity, seed))
            .context("configure perturbation")?;
        environment = environment.with_perturbation(Box::new(perturbation));
    }

    for (index, goal) in cli.goals.iter().enumerate() {
        let desired = load_world(goal)?;
        let actions = match cli.scripts.get(index) {
            Some(path) => script::load(path)?,
            None => Vec::new(),
        };
        let agent = ScriptedAgent::new(agent_name(index), actions);
        let _ = environment.add_agent(Box::new(agent), desired, None);
    }

    println!("{environment}");
    for cycle in 1..=cli.max_steps {
        let finished = environment
            .step()
            .with_context(|| format!("cycle {cycle}"))?;
        println!("--- cycle {cycle} ---");
        println!("{environment}");
        if finished {
            println!("ALL AGENTS COMPLETED");
            return Ok(());
        }
        if cli.delay_ms > 0 {
            thread::sleep(Duration::from_millis(cli.delay_ms));
        }
    }
    bail!("agents did not complete within {} cycles", cli.max_steps)
}

fn load_world(path: &Path) -> Result<World> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    World::from_reader(file).with_context(|| format!("load world state {}", path.display()))
}

/// `*A` through `*Z`, then `*A1`, `*B1`, ...
fn agent_name(index: usize) -> String {
    let letter = char::from(b'A' + (index % 26) as u8);
    match index / 26 {
        0 => format!("*{letter}"),
        round => format!("*{letter}{round}"),
    }
}
