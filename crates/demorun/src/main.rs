use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use demorun::abi::{check_demo_abi, describe_exports};
use demorun::parser::parse_wasm;
use demorun::{source, Demo, DemoRunner, RunOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// demorun — load a WebAssembly demo, call `tick`, read `image_buffer`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Log debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a WAT module to a Wasm binary
    Build {
        /// Input WebAssembly text (.wat)
        input: PathBuf,

        /// Output binary (defaults to the input with a .wasm extension)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List exports and check the demo ABI
    Inspect {
        /// Module (.wat or .wasm)
        module: PathBuf,
    },

    /// Run a demo and summarize its image buffer
    Run {
        /// Module (.wat or .wasm)
        module: PathBuf,

        /// Number of ticks to run
        #[arg(long, default_value_t = 1)]
        ticks: u64,

        /// Write the raw image buffer to this file
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Memory page cap
        #[arg(long)]
        max_pages: Option<usize>,

        /// Instruction budget per tick (0 = unlimited)
        #[arg(long)]
        fuel: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Build { input, output } => {
            let output = output.unwrap_or_else(|| source::default_output(&input));
            let bytes = source::build(&input, &output)?;
            println!("wrote {} ({} bytes)", output.display(), bytes);
        }
        Command::Inspect { module } => inspect(&module)?,
        Command::Run {
            module,
            ticks,
            dump,
            max_pages,
            fuel,
        } => {
            let options = run_options(max_pages, fuel);
            run(&module, ticks, dump.as_deref(), &options)?;
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_options(max_pages: Option<usize>, fuel: Option<u64>) -> RunOptions {
    let defaults = RunOptions::default();
    RunOptions {
        max_pages: max_pages.unwrap_or(defaults.max_pages),
        fuel: match fuel {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.fuel,
        },
        ..defaults
    }
}

fn inspect(path: &Path) -> Result<()> {
    let wasm = source::load(path)?;
    let parsed = parse_wasm(&wasm).context("failed to parse WebAssembly module")?;
    println!("{}", path.display());
    for line in describe_exports(&parsed) {
        println!("  {}", line);
    }
    match check_demo_abi(&parsed) {
        Ok(abi) => println!(
            "demo ABI: ok (image_buffer {} page(s))",
            abi.min_pages
        ),
        Err(e) => println!("demo ABI: {}", e),
    }
    Ok(())
}

fn run(path: &Path, ticks: u64, dump: Option<&Path>, options: &RunOptions) -> Result<()> {
    let demo = Demo::load(path, options)?;
    let mut runner = DemoRunner::new(demo);
    runner
        .run(ticks)
        .with_context(|| format!("tick {} trapped", runner.ticks() + 1))?;

    let buffer = runner.demo().image_buffer();
    println!("{}", summarize(buffer, runner.ticks()));

    if let Some(dump) = dump {
        fs::write(dump, buffer).with_context(|| format!("failed to write {}", dump.display()))?;
        tracing::info!(path = %dump.display(), bytes = buffer.len(), "dumped image buffer");
    }
    Ok(())
}

/// One-line description of an image buffer.
fn summarize(buffer: &[u8], ticks: u64) -> String {
    let mut seen = [false; 256];
    for &b in buffer {
        seen[b as usize] = true;
    }
    let distinct = seen.iter().filter(|&&s| s).count();
    let head = buffer
        .iter()
        .take(16)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "ticks: {}, image_buffer: {} bytes, {} distinct value(s), head: {}",
        ticks,
        buffer.len(),
        distinct,
        head
    )
}
