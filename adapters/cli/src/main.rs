#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays intent scripts against Block Cascade rulesets.

mod render;
mod script;

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use cascade_core::{Event, Ruleset, BUILTIN_RULESETS};
use cascade_session::{IntentOutcome, Session};
use cascade_world::{ChainObserver, Grid};
use clap::Parser;

use crate::script::Step;

/// Headless Block Cascade driver.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Built-in ruleset to play.
    #[arg(long, default_value = "tetris")]
    ruleset: String,
    /// TOML file describing a custom ruleset; takes precedence over `--ruleset`.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for the piece generator.
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
    /// Intent script: L R D H U X C for intents, `.` for a tick.
    #[arg(long, default_value = "")]
    script: String,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    /// Pause after every chain step, in milliseconds.
    #[arg(long, default_value_t = 0)]
    chain_delay_ms: u64,
    /// Print the selected ruleset as TOML and exit.
    #[arg(long)]
    dump_ruleset: bool,
    /// Print every engine event and each chain step.
    #[arg(long)]
    verbose: bool,
}

struct ChainPrinter {
    verbose: bool,
}

impl ChainObserver for ChainPrinter {
    fn on_chain_step(&mut self, grid: &Grid, chain: u32) {
        if self.verbose {
            println!("[engine] chain {chain}");
            println!("{}", render::board(grid.rows(), None));
        }
    }
}

/// Entry point for the Block Cascade command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let ruleset = load_ruleset(&cli)?;

    if cli.dump_ruleset {
        let text = toml::to_string_pretty(&ruleset).context("failed to encode ruleset as toml")?;
        println!("{text}");
        return Ok(());
    }

    let steps = script::parse(&cli.script).context("failed to parse intent script")?;
    let name = ruleset.name.clone();
    let mut session = Session::with_observer(
        ruleset,
        cli.seed,
        Box::new(ChainPrinter {
            verbose: cli.verbose,
        }),
        Duration::from_millis(cli.chain_delay_ms),
    )
    .with_context(|| format!("ruleset `{name}` is not playable"))?;
    println!("[engine] playing {name} with seed {:#x}", cli.seed);
    report(&mut session, cli.verbose);

    let tick = Duration::from_millis(cli.tick_ms);
    for step in steps {
        match step {
            Step::Intent(intent) => {
                let outcome = session.handle_intent(intent);
                if cli.verbose && outcome != IntentOutcome::Applied {
                    println!("[engine] {intent:?} {outcome:?}");
                }
            }
            Step::Tick => session.advance_time(tick),
        }
        report(&mut session, cli.verbose);
    }

    println!("{}", render::snapshot(&session.snapshot()));
    Ok(())
}

fn load_ruleset(cli: &Cli) -> Result<Ruleset> {
    let ruleset = match &cli.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read ruleset at {}", path.display()))?;
            toml::from_str::<Ruleset>(&contents)
                .with_context(|| format!("failed to parse ruleset toml at {}", path.display()))?
        }
        None => Ruleset::builtin(&cli.ruleset).with_context(|| {
            format!(
                "unknown ruleset `{}`; expected one of {}",
                cli.ruleset,
                BUILTIN_RULESETS.join(", ")
            )
        })?,
    };
    ruleset
        .validate()
        .with_context(|| format!("ruleset `{}` is invalid", ruleset.name))?;
    Ok(ruleset)
}

fn report(session: &mut Session, verbose: bool) {
    for event in session.drain_events() {
        let notable = match &event {
            Event::CascadeSettled { chain, .. } => *chain > 0,
            Event::RowsCleared { .. }
            | Event::WinReached { .. }
            | Event::GameOver { .. }
            | Event::GameReset => true,
            _ => false,
        };
        if verbose || notable {
            println!("[engine] {event:?}");
        }
    }
}
