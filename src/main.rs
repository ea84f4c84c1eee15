use std::io::{self, Read};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use memspace::{Arena, Program};

/// Run an allocation script against a first-fit memory arena.
#[derive(Parser)]
#[command(name = "memspace")]
#[command(author, version, about, long_about = None)]
struct Options {
    /// Script to run, read from stdin when omitted
    script: Option<String>,

    /// Size of the arena in words
    #[arg(short, long, default_value_t = 100)]
    size: usize,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // logs go to stderr so stdout only carries what the script prints
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_script(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("failed to read script {path}"))
        }
        None => {
            let mut src = String::new();
            io::stdin()
                .read_to_string(&mut src)
                .context("failed to read script from stdin")?;
            Ok(src)
        }
    }
}

fn main() -> Result<()> {
    let options = Options::parse();
    setup_logging(options.verbose);

    let src = read_script(options.script.as_deref())?;
    let program = Program::parse(&src)?;

    let mut arena = Arena::new(options.size);
    info!(size = options.size, "running script");

    let stdout = io::stdout();
    program.execute(&mut arena, &mut stdout.lock())?;

    Ok(())
}
