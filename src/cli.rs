use std::io;
use std::path::Path;

use crate::config::{config_path_from_env, load_config, EngineConfig};
use crate::error::Result;
use crate::export::{read_finalists_json, write_finalists_json, write_leaderboard_csv};
use crate::parallel::WorkerPool;
use crate::pool::RankedPool;
use crate::sim::{SimConfig, SimulationSummary, ToyGenome, World};

const DEFAULT_TICKS: u64 = 500;
const DEFAULT_SEED: u64 = 7;
const USAGE: &str = "usage: podium <simulate|export|leaderboard|config>";

/// Flags that consume the following argument.
const VALUE_FLAGS: [&str; 2] = ["--workers", "--finalists"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Simulate,
    Export,
    Leaderboard,
    Config,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("simulate") => Some(Command::Simulate),
        Some("export") => Some(Command::Export),
        Some("leaderboard") => Some(Command::Leaderboard),
        Some("config") => Some(Command::Config),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Simulate) => handle_simulate(args),
        Some(Command::Export) => handle_export(args),
        Some(Command::Leaderboard) => handle_leaderboard(args),
        Some(Command::Config) => handle_config(args),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

fn handle_simulate(args: &[String]) -> i32 {
    let positional = positionals(args);
    let ticks = parse_u64_arg(positional.first().copied(), "ticks", DEFAULT_TICKS);
    let seed = parse_u64_arg(positional.get(1).copied(), "seed", DEFAULT_SEED);

    let summary = match run_world(args, ticks, seed) {
        Ok((summary, _)) => summary,
        Err(err) => {
            eprintln!("simulation failed: {err}");
            return 1;
        }
    };

    if args.iter().any(|arg| arg == "--table") {
        println!("ticks\tspawned\ttrial_ships\tdeaths\tpromoted\tdiscarded\tfinalists");
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            summary.ticks,
            summary.spawned,
            summary.trial_ships,
            summary.deaths,
            summary.promoted,
            summary.discarded,
            summary.finalists
        );
        return 0;
    }
    print_json(&summary)
}

fn handle_export(args: &[String]) -> i32 {
    let positional = positionals(args);
    let Some(path) = positional.first().copied() else {
        eprintln!("usage: podium export <path.json> [ticks] [seed] [--workers N] [--finalists PATH]");
        return 2;
    };
    let ticks = parse_u64_arg(positional.get(1).copied(), "ticks", DEFAULT_TICKS);
    let seed = parse_u64_arg(positional.get(2).copied(), "seed", DEFAULT_SEED);

    let result = run_world(args, ticks, seed).and_then(|(summary, world)| {
        let snapshot = world.coordinator().finals().snapshot();
        let written = write_finalists_json(path, &*snapshot)?;
        let csv_path = Path::new(path).with_extension("csv");
        let file = std::fs::File::create(&csv_path)?;
        write_leaderboard_csv(file, &snapshot.records())?;
        Ok((summary, written, csv_path))
    });

    match result {
        Ok((summary, written, csv_path)) => {
            eprintln!(
                "export complete: records={written}, json='{path}', csv='{}'",
                csv_path.display()
            );
            print_json(&summary)
        }
        Err(err) => {
            eprintln!("export failed: {err}");
            1
        }
    }
}

fn handle_leaderboard(args: &[String]) -> i32 {
    let positional = positionals(args);
    let Some(path) = positional.first().copied() else {
        eprintln!("usage: podium leaderboard <path.json>");
        return 2;
    };
    let result = load_engine_config().and_then(|engine| {
        let export = read_finalists_json::<ToyGenome>(path)?;
        let pool = RankedPool::from_records(engine.finals, export.records);
        let records = pool.snapshot().records();
        write_leaderboard_csv(io::stdout().lock(), &records)
    });
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("leaderboard failed: {err}");
            1
        }
    }
}

fn handle_config(args: &[String]) -> i32 {
    let path = positionals(args)
        .first()
        .map(|path| path.to_string())
        .unwrap_or_else(config_path_from_env);
    match load_config(&path) {
        Ok(config) => print_json(&config),
        Err(err) => {
            eprintln!("config '{path}' rejected: {err}");
            1
        }
    }
}

fn load_engine_config() -> Result<EngineConfig> {
    load_config(&config_path_from_env())
}

fn run_world(args: &[String], ticks: u64, seed: u64) -> Result<(SimulationSummary, World)> {
    let engine = load_engine_config()?;
    let workers = WorkerPool::with_workers(flag_u64(args, "--workers").unwrap_or(0) as usize)?;
    let sim = SimConfig::default();
    let mut world = match flag_value(args, "--finalists") {
        Some(path) => {
            let export = read_finalists_json::<ToyGenome>(path)?;
            tracing::info!(records = export.records.len(), path, "resuming from finalists");
            let finals = RankedPool::from_records(engine.finals, export.records);
            World::with_finalists(engine, finals, sim, seed, workers)
        }
        None => World::new(engine, sim, seed, workers),
    };
    let summary = world.run(ticks)?;
    Ok((summary, world))
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize output: {err}");
            1
        }
    }
}

/// Arguments after the command that are not flags or flag values.
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = args.iter().skip(2);
    while let Some(arg) = rest.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            rest.next();
        } else if !arg.starts_with("--") {
            out.push(arg.as_str());
        }
    }
    out
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

fn flag_u64(args: &[String], flag: &str) -> Option<u64> {
    let raw = flag_value(args, flag)?;
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            eprintln!("invalid {flag} '{raw}', ignoring");
            None
        }
    }
}

fn parse_u64_arg(raw: Option<&str>, name: &str, default: u64) -> u64 {
    raw.and_then(|value| value.parse::<u64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}
