use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use shroud_core::interp::Interpreter;
use shroud_core::{LoopStrategy, Obfuscator, ObfuscatorConfig};

/// Shroud - a source-to-source obfuscator for small scripts
#[derive(Parser, Debug, Clone)]
#[command(name = "shroud")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input script to obfuscate
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to a JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// RNG seed; the same seed and input give identical output
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Loop lowering strategy (plain, collatz)
    #[arg(long, value_name = "STRATEGY")]
    loop_strategy: Option<String>,

    /// Per-expression identity wrap probability (0.0 - 1.0)
    #[arg(long, value_name = "CHANCE")]
    identity_chance: Option<f64>,

    /// Number of junk injection sweeps
    #[arg(long, value_name = "N")]
    junk_passes: Option<u32>,

    /// Skip junk statement injection
    #[arg(long)]
    no_junk: bool,

    /// Skip fixed-outcome conditional wrapping
    #[arg(long)]
    no_conditionals: bool,

    /// Skip identity expression wrapping
    #[arg(long)]
    no_identity: bool,

    /// Skip integer literal encoding
    #[arg(long)]
    no_numbers: bool,

    /// Skip loop rewriting
    #[arg(long)]
    no_loops: bool,

    /// Skip identifier renaming
    #[arg(long)]
    no_rename: bool,

    /// Execute input and output and compare their printed lines
    #[arg(long)]
    verify: bool,

    /// Write a default shroud.json and exit
    #[arg(long)]
    init: bool,
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for per-pass detail
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.init {
        let path = Path::new("shroud.json");
        ObfuscatorConfig::init_file(path)?;
        info!(path = %path.display(), "wrote default configuration");
        return Ok(());
    }

    let Some(input) = cli.file.clone() else {
        bail!("no input file specified; see --help");
    };

    let config = build_config(&cli)?;
    debug!(?config, "effective configuration");

    let source = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let obfuscator = Obfuscator::new(config);
    let output = obfuscator
        .obfuscate_source(&source)
        .with_context(|| format!("failed to obfuscate {}", input.display()))?;

    if cli.verify {
        verify(&source, &output)?;
        info!("verification passed: printed output is unchanged");
    }

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "obfuscated output written");
        }
        None => print!("{output}"),
    }
    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<ObfuscatorConfig> {
    let mut config = match &cli.config {
        Some(path) => ObfuscatorConfig::from_file(path)?,
        None => ObfuscatorConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(strategy) = &cli.loop_strategy {
        config.loops.strategy = match strategy.as_str() {
            "plain" => LoopStrategy::Plain,
            "collatz" => LoopStrategy::Collatz,
            other => bail!("unknown loop strategy {other:?} (expected plain or collatz)"),
        };
    }
    if let Some(chance) = cli.identity_chance {
        if !(0.0..=1.0).contains(&chance) {
            bail!("identity chance must be between 0.0 and 1.0");
        }
        config.identity.chance = chance;
    }
    if let Some(passes) = cli.junk_passes {
        config.junk.passes = passes;
    }
    config.junk.enabled &= !cli.no_junk;
    config.conditionals.enabled &= !cli.no_conditionals;
    config.identity.enabled &= !cli.no_identity;
    config.numbers.enabled &= !cli.no_numbers;
    config.loops.enabled &= !cli.no_loops;
    config.rename.enabled &= !cli.no_rename;
    Ok(config)
}

/// Run both programs under the bundled evaluator and compare printed lines.
fn verify(source: &str, output: &str) -> anyhow::Result<()> {
    let before = execute(source).context("failed to execute the input program")?;
    let after = execute(output).context("failed to execute the obfuscated program")?;
    if before != after {
        bail!(
            "verification failed: printed output changed\n  before: {before:?}\n  after:  {after:?}"
        );
    }
    Ok(())
}

fn execute(source: &str) -> anyhow::Result<Vec<String>> {
    let program = shroud_core::parser::parse(source)?;
    let mut interp = Interpreter::new();
    interp.run(&program)?;
    Ok(interp.output().to_vec())
}
