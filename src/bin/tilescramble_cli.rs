//! tilescramble CLI: scramble, unscramble and seed recovery for scripts.
//! Build with: cargo build --release --bin tilescramble-cli
//!
//! Configuration comes from `--config <file.json>` or `TILESCRAMBLE_*`
//! environment variables. Logs go to stderr (`RUST_LOG` to adjust).

use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tilescramble_lib::{ScrambleMetadata, Scrambler, ScramblerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tilescramble-cli", about = "Reversible key-derived image tile scrambling")]
struct Cli {
    /// JSON configuration file (defaults to TILESCRAMBLE_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scramble an image; writes PNG plus metadata JSON
    Scramble {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Where to write the metadata record (default: stdout)
        #[arg(short, long)]
        metadata: Option<PathBuf>,
        /// MIME type of the input; non-image types pass through untouched
        #[arg(long, default_value = "image/png")]
        mime: String,
    },
    /// Restore a scrambled image using its metadata record
    Unscramble {
        input: PathBuf,
        #[arg(short, long)]
        metadata: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the permutation seed for a metadata record
    Seed {
        #[arg(short, long)]
        metadata: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = load_config(cli.config.as_deref()).and_then(|config| {
        let scrambler = Scrambler::new(config);
        match cli.command {
            Commands::Scramble { input, output, metadata, mime } => {
                run_scramble(&scrambler, &input, &output, metadata.as_deref(), &mime)
            }
            Commands::Unscramble { input, metadata, output } => {
                run_unscramble(&scrambler, &input, &metadata, &output)
            }
            Commands::Seed { metadata } => run_seed(&scrambler, &metadata),
        }
    });
    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<ScramblerConfig, Box<dyn Error>> {
    let config = match path {
        Some(path) => ScramblerConfig::from_json_file(path)?,
        None => ScramblerConfig::from_env()?,
    };
    Ok(config)
}

fn run_scramble(
    scrambler: &Scrambler,
    input: &Path,
    output: &Path,
    metadata_path: Option<&Path>,
    mime: &str,
) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(input)?;
    let (out_bytes, metadata) = match scrambler.scramble_if_needed(&bytes, mime)? {
        Some(scrambled) => {
            eprintln!("Scrambled {}x{}", scrambled.width, scrambled.height);
            (scrambled.bytes, scrambled.metadata)
        }
        None => {
            eprintln!("No transform performed; copying input unchanged");
            (bytes, ScrambleMetadata::disabled(scrambler.config().version()))
        }
    };
    fs::write(output, out_bytes)?;
    eprintln!("Wrote {}", output.display());

    let json = serde_json::to_string_pretty(&metadata)?;
    match metadata_path {
        Some(path) => {
            fs::write(path, &json)?;
            eprintln!("Wrote {}", path.display());
        }
        None => io::stdout().write_all(json.as_bytes())?,
    }
    Ok(())
}

fn run_unscramble(scrambler: &Scrambler, input: &Path, metadata_path: &Path, output: &Path) -> Result<(), Box<dyn Error>> {
    let metadata = ScrambleMetadata::from_json(&fs::read_to_string(metadata_path)?)?;
    let bytes = fs::read(input)?;
    let restored = scrambler.unscramble(&bytes, &metadata)?;
    fs::write(output, restored)?;
    eprintln!("Wrote {}", output.display());
    Ok(())
}

fn run_seed(scrambler: &Scrambler, metadata_path: &Path) -> Result<(), Box<dyn Error>> {
    let document = fs::read_to_string(metadata_path)?;
    let seed = scrambler.recover_permutation_seed_json(Some(document.as_str()))?;
    let json = serde_json::to_string_pretty(&seed)?;
    io::stdout().write_all(json.as_bytes())?;
    Ok(())
}
