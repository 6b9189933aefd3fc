use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use mipswind::host::{Rdram, Snapshot};
use mipswind::{Limits, Walker};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prints the call stack of a stopped N64 from a register dump and an RDRAM dump.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON register dump: `{"pc": ..., "gp": [... 32 values ...]}`.
    #[arg(long)]
    regs: PathBuf,
    /// Raw big-endian RDRAM dump.
    #[arg(long)]
    rdram: PathBuf,
    /// Bytes to scan backwards per frame when looking for a prologue.
    #[arg(long, default_value_t = Limits::DEFAULT.scan_budget)]
    scan_budget: u32,
    /// Maximum number of frames to print.
    #[arg(long, default_value_t = Limits::DEFAULT.frame_cap)]
    frame_cap: usize,
}

#[derive(Debug, Deserialize)]
struct RegisterDump {
    pc: u32,
    gp: Vec<u64>,
}

impl RegisterDump {
    fn into_snapshot(self, rdram: Rdram) -> Result<Snapshot> {
        let gprs: [u64; 32] = self
            .gp
            .try_into()
            .map_err(|gp: Vec<u64>| anyhow!("expected 32 registers, found {}", gp.len()))?;
        Ok(Snapshot::from_gprs(self.pc, &gprs, rdram))
    }
}

fn load(args: &Args) -> Result<Snapshot> {
    let regs = fs::read_to_string(&args.regs)
        .with_context(|| format!("reading {}", args.regs.display()))?;
    let dump: RegisterDump = serde_json::from_str(&regs)
        .with_context(|| format!("parsing register dump {}", args.regs.display()))?;

    let rdram = Rdram::from_bytes(
        fs::read(&args.rdram).with_context(|| format!("reading {}", args.rdram.display()))?,
    );
    if rdram.is_empty() {
        tracing::warn!("{} is empty, every stack read will be 0", args.rdram.display());
    }
    tracing::debug!(bytes = rdram.len(), "loaded rdram");

    dump.into_snapshot(rdram)
}

fn main() -> Result<()> {
    let registry = tracing_subscriber::Registry::default().with(
        EnvFilter::builder()
            .with_default_directive(tracing::Level::WARN.into())
            .from_env()?,
    );

    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    registry.with(tree_layer).init();

    let args = Args::parse();
    let limits = Limits::new(args.scan_budget, args.frame_cap)?;
    let cpu = load(&args)?;

    let walker = Walker::new(limits);
    tracing::debug!(limits = ?walker.limits(), "walking");
    let backtrace = walker.walk(&cpu);
    print!("{backtrace}");

    Ok(())
}
