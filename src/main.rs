use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gremlin_ir::{BasicPipeline, Design};
use gremlin_verify::{Verdict, VerifyOptions};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Bug injection and bounded verification for netlist designs
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark candidate state wires (mux-tree roots)
    Detect {
        /// Serialized design (JSON)
        design: PathBuf,
        /// Where to write the marked design (defaults to in place)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Abstract marked mux trees into AMT cells
    Extract {
        design: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Expand AMT tables through their selector drivers
    Expand {
        design: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Lower AMT cells back to primitive logic
    Map {
        design: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Produce designs with buggy AMTs
    InjectAmt {
        design: PathBuf,
        /// Generated designs are stored in this directory
        #[arg(long)]
        output_dir: PathBuf,
        /// Desired number of bugs to inject
        #[arg(long, default_value_t = 1000)]
        num_bugs: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Produce designs with driver mix-ups
    InjectDriver {
        design: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 1000)]
        num_bugs: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Compose host and reference into a miter module
    CreateMiter {
        /// Design containing `host` and `reference` modules
        design: PathBuf,
        /// Observable wires that must exist in both modules
        #[arg(long = "observable", required = true)]
        observables: Vec<String>,
        /// The bug is a driver mix-up (buggy wire) rather than an AMT bug
        #[arg(long)]
        driver: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compose the miter and run the two-phase bounded verification
    VerifyMiter {
        design: PathBuf,
        #[arg(long = "observable", required = true)]
        observables: Vec<String>,
        #[arg(long)]
        driver: bool,
        #[arg(long, default_value_t = 20)]
        max_sensitization: i32,
        #[arg(long, default_value_t = 32)]
        max_propagation: i32,
        /// Per-solve timeout in seconds (0 disables)
        #[arg(long, default_value_t = 0)]
        timeout: u64,
        /// Force all unconstrained initial registers to zero
        #[arg(long)]
        set_init_zero: bool,
        /// Enable four-valued (undef) modeling
        #[arg(long)]
        enable_undef: bool,
    },
}

fn load_design(path: &PathBuf) -> Result<Design> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read design {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("cannot parse design {}", path.display()))
}

fn store_design(design: &Design, path: &PathBuf) -> Result<()> {
    let text = serde_json::to_string_pretty(design)?;
    fs::write(path, text).with_context(|| format!("cannot write design {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_log::LogTracer::init().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .init();

    match cli.command {
        Commands::Detect { design, output } => {
            let mut d = load_design(&design)?;
            let marked = gremlin_amt::detect::detect_design(&mut d);
            log::info!("marked {marked} candidate wires");
            store_design(&d, &output.unwrap_or(design))?;
        }
        Commands::Extract { design, output } => {
            let mut d = load_design(&design)?;
            let created = gremlin_amt::extract::extract_design(&mut d);
            log::info!("extracted {created} AMT cells");
            store_design(&d, &output.unwrap_or(design))?;
        }
        Commands::Expand { design, output } => {
            let mut d = load_design(&design)?;
            let expanded = gremlin_amt::expand::expand_design(&mut d);
            log::info!("expanded {expanded} AMT tables");
            store_design(&d, &output.unwrap_or(design))?;
        }
        Commands::Map { design, output } => {
            let mut d = load_design(&design)?;
            let mapped = gremlin_amt::map::map_design(&mut d);
            log::info!("mapped {mapped} AMT cells");
            store_design(&d, &output.unwrap_or(design))?;
        }
        Commands::InjectAmt { design, output_dir, num_bugs, seed } => {
            let mut d = load_design(&design)?;
            let opts = gremlin_inject::InjectOptions::new(output_dir)
                .with_num_bugs(num_bugs)
                .with_seed(seed);
            let count = gremlin_inject::inject_amt_bugs(&mut d, &opts)?;
            log::info!("wrote {count} AMT bug variants");
        }
        Commands::InjectDriver { design, output_dir, num_bugs, seed } => {
            let mut d = load_design(&design)?;
            let opts = gremlin_inject::InjectOptions::new(output_dir)
                .with_num_bugs(num_bugs)
                .with_seed(seed);
            let count = gremlin_inject::inject_driver_bugs(&mut d, &opts)?;
            log::info!("wrote {count} driver bug variants");
        }
        Commands::CreateMiter { design, observables, driver, output } => {
            let mut d = load_design(&design)?;
            let mut pipeline = BasicPipeline::new();
            if driver {
                gremlin_verify::create_driver_miter(&mut d, &observables, &mut pipeline)?;
            } else {
                gremlin_verify::create_amt_miter(&mut d, &observables, &mut pipeline)?;
            }
            store_design(&d, &output.unwrap_or(design))?;
        }
        Commands::VerifyMiter {
            design,
            observables,
            driver,
            max_sensitization,
            max_propagation,
            timeout,
            set_init_zero,
            enable_undef,
        } => {
            if max_sensitization < 1 || max_propagation < 1 {
                bail!("sensitization and propagation bounds must be positive");
            }
            let mut d = load_design(&design)?;
            let mut pipeline = BasicPipeline::new();
            let opts = VerifyOptions {
                max_sensitization,
                max_propagation,
                timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
                set_init_zero,
                model_undef: enable_undef,
                ..Default::default()
            };
            let verdict = if driver {
                gremlin_verify::create_driver_miter(&mut d, &observables, &mut pipeline)?;
                gremlin_verify::verify_miter(&d, None, &opts)?
            } else {
                let info = gremlin_verify::create_amt_miter(&mut d, &observables, &mut pipeline)?;
                gremlin_verify::verify_miter(&d, Some(&info.selections), &opts)?
            };
            match verdict {
                Verdict::Propagated { sensitized_at, propagated_at } => {
                    log::info!(
                        "propagated: sensitized at step {sensitized_at}, observable at step {propagated_at}"
                    );
                }
                Verdict::NotSensitized => log::info!("not sensitized within the bound"),
                Verdict::NotPropagated { sensitized_at } => {
                    log::info!("sensitized at step {sensitized_at} but not propagated");
                }
                Verdict::Timeout { phase } => log::warn!("timed out during {phase:?}"),
            }
        }
    }
    Ok(())
}
