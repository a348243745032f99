//! intrinsic-hoist CLI
//!
//! Lowers x86 vector intrinsics in textual LLVM-style IR.
//!
//! # Usage
//!
//! ```bash
//! # Lower every recognized intrinsic, print the result
//! intrinsic-hoist kernel.ll
//!
//! # Only lowerings that match the hardware exactly, write to a file
//! intrinsic-hoist kernel.ll --preset exact -o kernel.portable.ll
//!
//! # Statistics as JSON
//! intrinsic-hoist kernel.ll --emit stats
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use intrinsic_hoist::{HoistConfig, IntrinsicKind, MalformedPolicy};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitType {
    /// Emit the lowered IR (default)
    Ir,
    /// Emit hoisting statistics as JSON
    Stats,
    /// Emit nothing (check only)
    None,
}

#[derive(Parser, Debug)]
#[command(
    name = "intrinsic-hoist",
    version,
    about = "Lowers x86 SSE2/FMA intrinsics in LLVM-style IR into portable vector operations",
    long_about = r#"
intrinsic-hoist

Replaces calls to recognized x86 intrinsics with equivalent sequences of
portable vector instructions. Unrecognized calls are left untouched.

RECOGNIZED INTRINSICS:
  llvm.x86.sse2.psll.q         shift-left-quad
  llvm.x86.sse2.psrl.q         shift-right-quad
  llvm.x86.fma.vfmadd.pd       fused-multiply-add
  llvm.x86.sse2.sqrt.pd        sqrt
  llvm.x86.sse2.psad.bw        sum-abs-diff          (inexact)
  llvm.x86.sse2.pavg.w         average-words         (inexact)
  llvm.x86.sse2.pmins.w        min-signed-words
  llvm.x86.sse2.cmp.pd         compare-packed
  llvm.x86.sse2.cmp.sd         compare-scalar
  llvm.x86.sse2.pmulu.dq       multiply-unsigned-dwords
  llvm.x86.sse2.pmadd.wd       multiply-add-words    (inexact)
  llvm.x86.sse2.packuswb.128   pack-unsigned-bytes   (inexact)
  llvm.x86.sse2.pmovmskb.128   move-mask-bytes

PRESETS:
  --preset default   all rules
  --preset exact     disables the inexact rules
"#
)]
struct Args {
    /// Input IR file (.ll)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file path (stdout if omitted)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Use a preset configuration
    #[arg(long, value_name = "NAME", conflicts_with = "config")]
    preset: Option<String>,

    /// Load the configuration from a JSON file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable a rule (id or LLVM name); may be repeated
    #[arg(long, value_name = "KIND")]
    disable: Vec<IntrinsicKind>,

    /// What to do with recognized calls whose operands do not fit
    #[arg(long, value_enum)]
    on_malformed: Option<MalformedPolicy>,

    /// Output type
    #[arg(long, value_enum, default_value = "ir")]
    emit: EmitType,

    /// Keep intrinsic declarations that are no longer called
    #[arg(long)]
    keep_declarations: bool,

    /// Skip the verifier
    #[arg(long)]
    no_verify: bool,

    /// Suppress configuration warnings
    #[arg(long)]
    no_warnings: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(args: &Args) -> Result<HoistConfig> {
    let mut config = if let Some(path) = &args.config {
        HoistConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?
    } else if let Some(preset_name) = &args.preset {
        HoistConfig::preset(preset_name).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown preset '{}'. Available presets: {}",
                preset_name,
                HoistConfig::preset_names().join(", ")
            )
        })?
    } else {
        HoistConfig::default()
    };

    for kind in &args.disable {
        config.disable(*kind);
    }
    if let Some(policy) = args.on_malformed {
        config.on_malformed = policy;
    }
    if args.keep_declarations {
        config.strip_dead_declarations = false;
    }
    if args.no_verify {
        config.verify = false;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn write_output(output: Option<&PathBuf>, text: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config = build_config(&args)?;

    // Show configuration warnings unless suppressed
    if !args.no_warnings {
        for warning in config.check_warnings() {
            eprintln!("warning: {}", warning);
        }
    }

    if args.verbose {
        eprintln!("Configuration:");
        if let Some(preset) = &args.preset {
            eprintln!("  preset:        {}", preset);
        }
        let disabled: Vec<&str> = config.disabled.iter().map(|k| k.id()).collect();
        eprintln!("  disabled:      [{}]", disabled.join(", "));
        eprintln!("  on-malformed:  {:?}", config.on_malformed);
        eprintln!("  stage:         {}", config.stage);
        eprintln!("  strip decls:   {}", config.strip_dead_declarations);
        eprintln!("  verify:        {}", config.verify);
    }

    // Verify input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let (module, stats) = intrinsic_hoist::hoist_file(&args.input, &config)?;

    match args.emit {
        EmitType::Ir => write_output(args.output.as_ref(), &module.to_string())?,
        EmitType::Stats => {
            let json = serde_json::to_string_pretty(&stats).context("Failed to serialize statistics")?;
            write_output(args.output.as_ref(), &format!("{}\n", json))?;
        }
        EmitType::None => {}
    }

    if args.verbose {
        stats.display();
    }

    Ok(())
}
