//! Command-line front end: load an octal memory image, start
//! processor 1 and run until the machine stops.

mod dump;
mod image;

use std::path::PathBuf;

use clap::Parser;
use tracing::{event, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use cpu::{ExecutionStop, MemoryConfiguration, NoChannels, B5500};

use dump::RegisterDump;
use image::{load_image, parse_octal};

#[derive(Debug, Parser)]
#[command(name = "b5500", about = "Emulate the Burroughs B5500 processors")]
struct Args {
    /// Octal memory image to load (lines of `address: word ...`).
    image: PathBuf,

    /// Octal address processor 1 starts at, in control state.
    #[arg(long, default_value = "20", value_parser = parse_octal)]
    entry: u64,

    /// Stop after this many syllables.
    #[arg(long)]
    limit: Option<u64>,

    /// Fitted memory size in octal words (at most 100000).
    #[arg(long, value_parser = parse_octal)]
    memory_words: Option<u64>,
}

fn run_emulator(args: &Args) -> Result<ExecutionStop, Box<dyn std::error::Error>> {
    let config = match args.memory_words {
        None => MemoryConfiguration::default(),
        Some(words) => MemoryConfiguration {
            words: words as usize,
        },
    };
    let mut machine = B5500::new(&config, Box::new(NoChannels));
    let loaded = load_image(&args.image, &mut machine.mem)?;
    event!(
        Level::INFO,
        "loaded {loaded} words from {}",
        args.image.display()
    );
    if args.entry >= machine.mem.size() as u64 {
        return Err(format!("entry address {:#o} is outside memory", args.entry).into());
    }
    machine.start_p1(args.entry as Addr);
    let outcome = machine.run(args.limit);
    println!(
        "stopped after {} syllables: {}",
        outcome.syllables, outcome.stop
    );
    let mut dump = RegisterDump::new();
    dump.write(&machine.cpus, &machine.shared)?;
    dump.finish();
    Ok(outcome.stop)
}

fn main() {
    let args = Args::parse();

    // See the tracing-subscriber documentation for how to select
    // trace messages with RUST_LOG.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    match run_emulator(&args) {
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Ok(ExecutionStop::Unimplemented(_)) => std::process::exit(2),
        Ok(_) => std::process::exit(0),
    }
}
