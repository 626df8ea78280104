//! sim-runner: headless runner for the grid epidemic simulation.
//!
//! Usage:
//!   sim-runner                                  # 50x50 grid, 100 steps
//!   sim-runner --cases 10 --seed 7 --until-clear
//!   sim-runner --config run.json --db run.db --snapshot-interval 10
//!   sim-runner --seed 7 --ipc-mode              # JSON lines on stdin/stdout
//!
//! Flags take either `--flag value` or `--flag=value`.

use anyhow::{bail, Result};
use contagion_core::{
    config::{DistanceMetric, EdgePolicy, SimConfig},
    engine::SimEngine,
    recorder::{RunRecorder, DEFAULT_SNAPSHOT_INTERVAL},
    snapshot::{SimulationSnapshot, StateCounts},
    store::SimStore,
    types::Step,
};
use std::env;
use std::io::{self, BufRead, Write};

/// Rows in the end-of-run summary table.
const SUMMARY_ROWS: u64 = 15;

const VALUE_FLAGS: &[&str] = &[
    "--config", "--size", "--width", "--height", "--population", "--cases",
    "--duration", "--infection", "--radius", "--illness-days", "--death",
    "--max-step", "--seed", "--metric", "--edge", "--db", "--snapshot-interval",
    "--run-id",
];

const SWITCHES: &[&str] = &["--until-clear", "--ipc-mode"];

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetSnapshot,
    GetCounts,
    Step { count: u64 },
    Quit,
}

#[derive(serde::Serialize)]
struct CountsReply {
    step: Step,
    counts: StateCounts,
    percentages: contagion_core::snapshot::StatePercentages,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = normalize_args(env::args())?;
    let config = build_config(&args)?;
    let duration = parse_arg(&args, "--duration", 100u64)?;
    let until_clear = has_flag(&args, "--until-clear");
    let ipc_mode = has_flag(&args, "--ipc-mode");
    let db = find_value(&args, "--db");
    let snapshot_interval = parse_arg(&args, "--snapshot-interval", DEFAULT_SNAPSHOT_INTERVAL)?;
    let run_id = find_value(&args, "--run-id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("run-{}", uuid::Uuid::new_v4()));

    let mut engine = SimEngine::new(run_id.clone());
    let initial = engine.initialize(config)?;

    let recorder = match db {
        Some(path) => {
            let store = SimStore::open(path)?;
            store.migrate()?;
            let recorder = RunRecorder::new(run_id.clone(), store, snapshot_interval);
            let seed = engine.seed().unwrap_or_default();
            if let Some(config) = engine.config() {
                recorder.begin(config, seed, &initial, engine.last_events())?;
            }
            Some(recorder)
        }
        None => None,
    };

    if ipc_mode {
        run_ipc_loop(&mut engine, recorder.as_ref())?;
    } else {
        print_header(&engine, &run_id, duration, db);
        let history = run_batch(&mut engine, recorder.as_ref(), duration, until_clear)?;
        print_summary(&history, duration);
    }

    engine.finish()?;
    Ok(())
}

/// Step `duration` times (or until nobody is infected) and keep the
/// counts of every step for the summary.
fn run_batch(
    engine: &mut SimEngine,
    recorder: Option<&RunRecorder>,
    duration: u64,
    until_clear: bool,
) -> Result<Vec<(Step, StateCounts)>> {
    let mut history = vec![(0, engine.snapshot()?.counts())];
    for _ in 0..duration {
        let snapshot = engine.step()?;
        let counts = snapshot.counts();
        record(recorder, engine, &snapshot);
        history.push((snapshot.step(), counts));
        if until_clear && counts.is_outbreak_over() {
            log::info!("outbreak over at step {}", snapshot.step());
            break;
        }
    }
    Ok(history)
}

/// A recording failure is reported and the run carries on.
fn record(recorder: Option<&RunRecorder>, engine: &SimEngine, snapshot: &SimulationSnapshot) {
    if let Some(recorder) = recorder {
        if let Err(e) = recorder.record_step(snapshot, engine.last_events()) {
            log::warn!("step={} not recorded: {e}", snapshot.step());
        }
    }
}

fn run_ipc_loop(engine: &mut SimEngine, recorder: Option<&RunRecorder>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let reply = match serde_json::from_str::<IpcCommand>(&buffer) {
            Ok(IpcCommand::Quit) => break,
            Ok(cmd) => handle_command(engine, recorder, cmd).unwrap_or_else(|e| {
                log::warn!("ipc command failed: {e}");
                error_line(&e)
            }),
            Err(e) => error_line(&e),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

/// Run one IPC command and render its JSON reply. A failed step is
/// reported to the client and leaves the engine on its last good step.
fn handle_command(
    engine: &mut SimEngine,
    recorder: Option<&RunRecorder>,
    cmd: IpcCommand,
) -> Result<String> {
    let reply = match cmd {
        IpcCommand::Step { count } => {
            for _ in 0..count {
                let snapshot = engine.step()?;
                record(recorder, engine, &snapshot);
            }
            serde_json::to_string(&counts_reply(engine)?)?
        }
        IpcCommand::GetCounts => serde_json::to_string(&counts_reply(engine)?)?,
        IpcCommand::GetSnapshot => serde_json::to_string(&engine.snapshot()?)?,
        IpcCommand::Quit => String::new(),
    };
    Ok(reply)
}

fn error_line(e: &dyn std::fmt::Display) -> String {
    serde_json::json!({ "error": e.to_string() }).to_string()
}

fn counts_reply(engine: &SimEngine) -> Result<CountsReply> {
    let snapshot = engine.snapshot()?;
    let counts = snapshot.counts();
    Ok(CountsReply {
        step: snapshot.step(),
        counts,
        percentages: counts.percentages(),
    })
}

fn print_header(engine: &SimEngine, run_id: &str, duration: u64, db: Option<&str>) {
    println!("Grid epidemic: sim-runner");
    println!("  run_id:     {run_id}");
    if let Some(seed) = engine.seed() {
        println!("  seed:       {seed}");
    }
    if let Some(c) = engine.config() {
        println!("  grid:       {}x{} ({:?}, {:?})", c.grid_width, c.grid_height, c.distance_metric, c.edge_policy);
        println!("  population: {} ({} initial cases)", c.population_size, c.initial_infected_count);
        println!(
            "  p={} radius={} illness={} steps f={}",
            c.transmission_probability, c.infection_radius, c.illness_duration, c.fatality_probability
        );
    }
    println!("  steps:      {duration}");
    println!("  db:         {}", db.unwrap_or("(none)"));
    println!();
}

/// Counts at 15 roughly evenly spaced steps across the run.
fn print_summary(history: &[(Step, StateCounts)], duration: u64) {
    println!("=== RUN SUMMARY ===");
    println!("  {:>6} {:>12} {:>10} {:>10} {:>10}", "step", "susceptible", "infected", "recovered", "deceased");
    let last = history.last().map(|(step, _)| *step).unwrap_or(0);
    for step in summary_steps(duration) {
        if step > last {
            break;
        }
        if let Some((_, c)) = history.iter().find(|(s, _)| *s == step) {
            let pct = c.percentages();
            println!(
                "  {:>6} {:>11.1}% {:>9.1}% {:>9.1}% {:>9.1}%",
                step, pct.susceptible, pct.infected, pct.recovered, pct.deceased
            );
        }
    }
    if let Some((step, c)) = history.last() {
        println!();
        println!("  final step:     {step}");
        println!("  susceptible:    {}", c.susceptible);
        println!("  infected:       {}", c.infected);
        println!("  recovered:      {}", c.recovered);
        println!("  deceased:       {}", c.deceased);
    }
}

fn summary_steps(duration: u64) -> Vec<Step> {
    let mut steps: Vec<Step> = (0..SUMMARY_ROWS)
        .map(|i| duration * i / (SUMMARY_ROWS - 1))
        .collect();
    steps.dedup();
    steps
}

/// Defaults, then the optional JSON file, then individual flags.
fn build_config(args: &[String]) -> Result<SimConfig> {
    let mut config = match find_value(args, "--config") {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };

    if let Some(size) = find_value(args, "--size") {
        let n: u32 = size.parse()?;
        config.grid_width = n;
        config.grid_height = n;
        // One person per cell, as in a fully occupied grid.
        config.population_size = n.saturating_mul(n);
    }
    config.grid_width = parse_arg(args, "--width", config.grid_width)?;
    config.grid_height = parse_arg(args, "--height", config.grid_height)?;
    config.population_size = parse_arg(args, "--population", config.population_size)?;
    config.initial_infected_count = parse_arg(args, "--cases", config.initial_infected_count)?;
    config.transmission_probability = parse_arg(args, "--infection", config.transmission_probability)?;
    config.infection_radius = parse_arg(args, "--radius", config.infection_radius)?;
    config.illness_duration = parse_arg(args, "--illness-days", config.illness_duration)?;
    config.fatality_probability = parse_arg(args, "--death", config.fatality_probability)?;
    config.max_step = parse_arg(args, "--max-step", config.max_step)?;
    if let Some(seed) = find_value(args, "--seed") {
        config.rng_seed = Some(seed.parse()?);
    }
    if let Some(metric) = find_value(args, "--metric") {
        config.distance_metric = match metric {
            "chebyshev" => DistanceMetric::Chebyshev,
            "euclidean" => DistanceMetric::Euclidean,
            other => bail!("unknown --metric '{other}' (expected chebyshev or euclidean)"),
        };
    }
    if let Some(edge) = find_value(args, "--edge") {
        config.edge_policy = match edge {
            "clamp" => EdgePolicy::Clamp,
            "reflect" => EdgePolicy::Reflect,
            other => bail!("unknown --edge '{other}' (expected clamp or reflect)"),
        };
    }
    Ok(config)
}

/// Split `--flag=value` into two arguments and reject anything that is
/// not a known flag, so a typo never falls back to a default silently.
fn normalize_args(raw: impl IntoIterator<Item = String>) -> Result<Vec<String>> {
    let mut raw = raw.into_iter();
    let mut args: Vec<String> = raw.next().into_iter().collect();
    for arg in raw {
        match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                args.push(flag.to_string());
                args.push(value.to_string());
            }
            _ => args.push(arg),
        }
    }

    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        if SWITCHES.contains(&arg) {
            i += 1;
        } else if VALUE_FLAGS.contains(&arg) {
            if i + 1 >= args.len() {
                bail!("missing value for {arg}");
            }
            i += 2;
        } else {
            bail!("unrecognised argument '{arg}'");
        }
    }
    Ok(args)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn find_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T>(args: &[String], flag: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match find_value(args, flag) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value '{raw}' for {flag}: {e}")),
        None => Ok(default),
    }
}
