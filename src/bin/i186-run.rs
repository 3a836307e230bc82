use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use i186_rs::{Cpu, CpuConfig, LinearMemory, Outcome};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run a real-mode ROM image on the i186-rs interpreter"
)]
struct Opts {
    /// Image mapped so that it ends at the top of the 1 MiB address space.
    #[arg(value_name = "BINFILE")]
    input: PathBuf,
    #[arg(long, default_value_t = 10_000_000)]
    max_steps: u64,
    /// JSON file with `CpuConfig` overrides.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reference image compared against memory from address 0.
    #[arg(long)]
    expect: Option<PathBuf>,
    /// Print the final CPU state as JSON.
    #[arg(long)]
    dump_state: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<CpuConfig> {
    let Some(path) = path else {
        return Ok(CpuConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let cfg = load_config(opts.config.as_ref())?;

    let bytes = std::fs::read(&opts.input)
        .with_context(|| format!("reading image {}", opts.input.display()))?;
    let mut mem = LinearMemory::new();
    mem.load_top(&bytes)?;

    let mut cpu = Cpu::new(cfg);
    let outcome = cpu.run(&mut mem, opts.max_steps)?;
    info!(?outcome, "finished");
    if outcome == Outcome::Waiting {
        eprintln!("stopped on WAIT");
    }

    let mut mismatches = 0usize;
    if let Some(path) = &opts.expect {
        let reference = std::fs::read(path)
            .with_context(|| format!("reading reference {}", path.display()))?;
        for (addr, (&want, &got)) in reference.iter().zip(&mem.mem).enumerate() {
            if want != got {
                println!("{addr:05X}: expected {want:02X}, got {got:02X}");
                mismatches += 1;
            }
        }
        println!("{mismatches} mismatching bytes");
    }

    if opts.dump_state {
        println!("{}", serde_json::to_string_pretty(&cpu)?);
    }

    if mismatches > 0 {
        anyhow::bail!("memory differs from the reference image");
    }
    Ok(())
}
