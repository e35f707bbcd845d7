//! Civ Sim - headless runner
//!
//! Generates a world, registers AI nations and runs ticks, or resumes a save.
//! Also dumps journal files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use civ_sim::core::logging;
use civ_sim::journal::EventKind;
use civ_sim::{CivError, ErrorCode, GameConfig, Journal, NationSpec, Result, SimulationParams, Simulation};

/// Civ Sim - emergent civilizations without scripts
#[derive(Parser, Debug)]
#[command(name = "civ-sim")]
#[command(about = "Run and inspect civilization simulations")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new world and run it
    Run {
        #[arg(long, default_value_t = 80)]
        width: u32,

        #[arg(long, default_value_t = 48)]
        height: u32,

        /// Random seed for reproducible runs
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of AI nations
        #[arg(long, default_value_t = 4)]
        nations: usize,

        /// Settlements seeded per nation
        #[arg(long, default_value_t = 3)]
        settlements: usize,

        #[arg(long, default_value_t = 120)]
        ticks: u64,

        #[arg(long, default_value_t = 1.0)]
        dt: f32,

        /// `key=value` game options
        #[arg(long)]
        config: Option<PathBuf>,

        /// TOML simulation parameters
        #[arg(long)]
        params: Option<PathBuf>,

        /// Write a save file when done
        #[arg(long)]
        save: Option<PathBuf>,

        /// Binary event journal
        #[arg(long)]
        journal: Option<PathBuf>,
    },
    /// Resume a save file
    Load {
        save: PathBuf,

        #[arg(long, default_value_t = 12)]
        ticks: u64,

        #[arg(long, default_value_t = 1.0)]
        dt: f32,

        /// Save again afterwards
        #[arg(long)]
        resave: bool,
    },
    /// Print a histogram of a journal file
    Journal { file: PathBuf },
}

const NATION_NAMES: [&str; 8] = ["Avar", "Berun", "Casso", "Dalm", "Eskar", "Fenn", "Gorath", "Hylle"];

fn main() -> ExitCode {
    logging::init("civ_sim=info");
    let args = Args::parse();

    let result = match args.command {
        Command::Run {
            width,
            height,
            seed,
            nations,
            settlements,
            ticks,
            dt,
            config,
            params,
            save,
            journal,
        } => run_new(RunOptions {
            width,
            height,
            seed,
            nations,
            settlements,
            ticks,
            dt,
            config,
            params,
            save,
            journal,
        }),
        Command::Load {
            save,
            ticks,
            dt,
            resave,
        } => resume(&save, ticks, dt, resave),
        Command::Journal { file } => dump_journal(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(e: &CivError) -> u8 {
    match e.code() {
        ErrorCode::Ok => 0,
        ErrorCode::NullPointer => 2,
        ErrorCode::OutOfMemory => 3,
        ErrorCode::InvalidArgument => 4,
        ErrorCode::NotFound => 5,
        ErrorCode::InvalidState => 6,
        ErrorCode::Io => 7,
    }
}

struct RunOptions {
    width: u32,
    height: u32,
    seed: u64,
    nations: usize,
    settlements: usize,
    ticks: u64,
    dt: f32,
    config: Option<PathBuf>,
    params: Option<PathBuf>,
    save: Option<PathBuf>,
    journal: Option<PathBuf>,
}

fn run_new(opts: RunOptions) -> Result<()> {
    let config = match &opts.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    let params = match &opts.params {
        Some(path) => SimulationParams::load(path)?,
        None => SimulationParams::default(),
    };

    let mut sim = Simulation::new(config, params, opts.width, opts.height, opts.seed)?;
    if let Some(path) = &opts.journal {
        sim.attach_journal(path.clone());
    }
    if let Some(path) = &opts.save {
        sim.set_autosave_path(path.clone());
    }

    for i in 0..opts.nations {
        let name = NATION_NAMES[i % NATION_NAMES.len()];
        let id = format!("N{}", i + 1);
        sim.add_nation(NationSpec::new(&id, name))?;
        let founded = sim.seed_settlements(&id, opts.settlements)?;
        if founded.len() < opts.settlements {
            tracing::warn!("{} found room for only {} settlements", name, founded.len());
        }
    }

    sim.start()?;
    advance(&mut sim, opts.ticks, opts.dt)?;

    if let Some(path) = &opts.save {
        sim.save(path)?;
        println!("saved to {}", path.display());
    }
    sim.shutdown();
    Ok(())
}

fn resume(path: &Path, ticks: u64, dt: f32, resave: bool) -> Result<()> {
    let mut sim = Simulation::load(path)?;
    println!(
        "loaded '{}' at tick {} (year {})",
        sim.config().name,
        sim.clock().current_tick(),
        sim.current_year()
    );
    advance(&mut sim, ticks, dt)?;
    if resave {
        sim.save(path)?;
    }
    Ok(())
}

/// Run ticks, printing a status table once per simulated year
fn advance(sim: &mut Simulation, ticks: u64, dt: f32) -> Result<()> {
    let per_year = civ_sim::simulation::TICKS_PER_YEAR;
    let mut done = 0;
    while done < ticks {
        let step = (ticks - done).min(per_year);
        sim.run(step, dt)?;
        done += step;
        print_status(sim)?;
    }
    Ok(())
}

fn print_status(sim: &Simulation) -> Result<()> {
    println!("\n=== Year {} (tick {}) ===", sim.current_year(), sim.clock().current_tick());
    let ids: Vec<String> = sim.nations().map(|n| n.id.clone()).collect();
    for id in ids {
        let s = sim.nation_summary(&id)?;
        println!(
            "  {:<8} {:<28} settlements {:>3}  pop {:>8}  tiles {:>4}  treasury {:>8.1}  units {:>3}",
            s.name, s.government, s.settlements, s.population, s.territory, s.treasury, s.units
        );
    }
    Ok(())
}

fn dump_journal(path: &Path) -> Result<()> {
    let journal = Journal::load(path, &Default::default())?;
    println!("{}: {} events", path.display(), journal.len());
    for (kind, count) in journal.histogram() {
        let name = EventKind::from_tag(kind).map_or("unknown", EventKind::name);
        println!("  {:<22} {:>8}", name, count);
    }
    Ok(())
}
