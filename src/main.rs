use blurhash_map::config::{self, Overrides, Settings};
use blurhash_map::encoder::ProcessEncoder;
use blurhash_map::pipeline::Pipeline;
use blurhash_map::sync::SyncEvent;
use blurhash_map::{output, watch};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use tracing::error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "blurhash-map")]
#[command(about = "Keep blur hashes in sync with a directory of images")]
#[command(long_about = "\
Keep blur hashes in sync with a directory of images

Every image under the asset root gets a side-car file holding its blur hash,
and all side-cars are collected into one JSON index:

  assets/
  ├── hero.jpg
  ├── hero.jpg.hash        # side-car, written by blurhash-map
  └── gallery/
      ├── 01.png
      └── 01.png.hash

  hashmap.json             # [[\"/hero.jpg\",\"LKO2...\"],[\"/gallery/01.png\",\"L9Sg...\"]]

Settings come from stock defaults, then blurhash-map.toml (or --config), then
command-line flags. Run 'blurhash-map gen-config' for a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./blurhash-map.toml, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Asset root directory
    #[arg(short, long, global = true)]
    assets: Option<PathBuf>,

    /// Comma-separated image extensions (jpg,jpeg,png,bmp,webp)
    #[arg(short, long, global = true)]
    extensions: Option<String>,

    /// Horizontal hash components (1-9)
    #[arg(short = 'x', long, global = true)]
    component_x: Option<u32>,

    /// Vertical hash components (1-9)
    #[arg(short = 'y', long, global = true)]
    component_y: Option<u32>,

    /// Index file to write
    #[arg(short, long, global = true)]
    target: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug). RUST_LOG wins.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hash every image lacking a side-car and write the index
    Init,
    /// Initialize, then keep side-cars and index in sync with changes
    Watch,
    /// Report missing and orphaned side-cars without changing anything
    Check,
    /// Print a stock blurhash-map.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let overrides = Overrides {
        assets: cli.assets,
        extensions: cli.extensions,
        component_x: cli.component_x,
        component_y: cli.component_y,
        target: cli.target,
    };
    let settings = config::load_config(cli.config.as_deref(), &overrides)?.validate()?;
    output::print_settings(&settings);

    match cli.command {
        Command::Init => run_init(settings),
        Command::Watch => run_watch(settings),
        Command::Check => run_check(settings),
        Command::GenConfig => Ok(()),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "blurhash_map=warn",
        1 => "blurhash_map=info",
        _ => "blurhash_map=debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Print sync events as they arrive. The thread ends once every sender is
/// dropped.
fn spawn_printer() -> (Sender<SyncEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_sync_event(&event) {
                println!("{}", line);
            }
        }
    });
    (tx, printer)
}

fn run_init(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let encoder = ProcessEncoder::new(&settings.encoder);
    let (tx, printer) = spawn_printer();
    let pipeline = Pipeline::new(settings, encoder).with_events(tx);

    let result = pipeline.initialize();
    drop(pipeline);
    printer.join().map_err(|_| "output thread panicked")?;

    output::print_init_report(&result?);
    Ok(())
}

fn run_watch(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let encoder = ProcessEncoder::new(&settings.encoder);
    let (tx, printer) = spawn_printer();
    let pipeline = Pipeline::new(settings, encoder).with_events(tx);

    match pipeline.initialize() {
        Ok(report) => output::print_init_report(&report),
        Err(e) => error!(error = %e, "initial index not written, retrying after next change"),
    }

    let result = watch::watch(pipeline.settings(), |batch| {
        let stats = pipeline.on_change_batch(&batch);
        output::print_batch_summary(&stats);
        // Failures are reported through events and retried on the next batch.
        let _ = pipeline.rebuild();
    });

    drop(pipeline);
    printer.join().map_err(|_| "output thread panicked")?;
    result?;
    Ok(())
}

fn run_check(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let encoder = ProcessEncoder::new(&settings.encoder);
    let report = Pipeline::new(settings, encoder).check();
    output::print_check_report(&report);
    if !report.is_clean() {
        return Err("side-cars out of sync; run 'blurhash-map init' to repair".into());
    }
    Ok(())
}
