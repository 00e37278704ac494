//! ELIZA CLI: interactive rule-driven conversation.
//!
//! Thin wrapper over the `eliza` library crate.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use eliza::{Eliza, load_script};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Artificial reply delay range, in milliseconds.
const SLEEP_MS: std::ops::Range<u64> = 1500..2000;

/// ELIZA, a rule-driven conversational agent.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Rule script to load. A `.json` file is read as a snapshot.
    #[arg(long, default_value = "script.txt")]
    script: PathBuf,

    /// PRNG seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Pause 1.5 to 2 seconds before each reply.
    #[arg(long)]
    sleep: bool,

    /// Never inject typos into replies.
    #[arg(long)]
    no_typos: bool,

    /// Print the loaded script as JSON and exit.
    #[arg(long)]
    dump_json: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let script = load_script(&args.script)
        .with_context(|| format!("cannot load script {}", args.script.display()))?;

    if args.dump_json {
        println!("{}", script.to_json()?);
        return Ok(());
    }

    let seed = args.seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    });
    debug!(seed, script = %args.script.display(), "starting conversation");

    let mut eliza = Eliza::new(&script, SmallRng::seed_from_u64(seed))
        .with_context(|| format!("cannot compile script {}", args.script.display()))?;
    if args.no_typos {
        eliza.set_typo_odds(None);
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    writeln!(stdout, "Eliza: {}", eliza.welcome())?;

    let mut lines = stdin.lock().lines();
    loop {
        write!(stdout, ">> ")?;
        stdout.flush()?;

        let Some(line) = lines.next() else {
            writeln!(stdout)?;
            break;
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let started = Instant::now();
        let reply = eliza.respond(&line);
        if args.sleep {
            let pause = reply_delay(started.elapsed(), &mut rand::rng());
            debug!(?pause, "delaying reply");
            thread::sleep(pause);
        }

        writeln!(stdout, "Eliza: {reply}")?;
        stdout.flush()?;

        if !eliza.is_active() {
            break;
        }
    }

    Ok(())
}

/// Total pause before a reply: the time spent computing it plus a random
/// 1.5 to 2 second think time.
fn reply_delay<R: Rng + ?Sized>(processing: Duration, rng: &mut R) -> Duration {
    processing + Duration::from_millis(rng.random_range(SLEEP_MS))
}
