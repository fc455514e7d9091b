mod logging;

use clap::{Args, Parser, Subcommand};
use previewer::config::{self, PipelineConfig};
use previewer::format::ImageKind;
use previewer::imaging::{RustBackend, get_dimensions};
use previewer::output::{self, DeriveEvent};
use previewer::store::AssetId;
use previewer::{FsStore, persist, pipeline, planner};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "previewer")]
#[command(about = "Derive preview images from uploaded sources")]
#[command(long_about = "\
Derive preview images from uploaded sources

Every source image is turned into the variants listed under [resize.*] in
the config, in order, and written to an asset store directory:

  assets/
  ├── 5f5e1000a1b2c3d4e5f60718         # orig
  ├── 5f5e1000a1b2c3d4e5f60718.json    # content type + length
  ├── 5f5e1000a1b2c3d4e5f60718_md
  ├── 5f5e1000a1b2c3d4e5f60718_md.json
  └── ...

Each variant is derived from the variant named by `from`, else from `orig`,
else from the source itself.

Run 'previewer gen-config' to generate a documented previewer.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive and store previews for a file or every image in a directory
    Derive(DeriveArgs),
    /// Show which base and size each variant would get, without rendering
    Plan(PlanArgs),
    /// Print a stock previewer.toml with all options documented
    GenConfig,
}

#[derive(Args)]
struct DeriveArgs {
    /// Source image or directory of images
    path: PathBuf,

    /// Asset store directory
    #[arg(long, default_value = "assets")]
    store: PathBuf,

    /// Run timestamp in seconds since the epoch (default: source mtime).
    /// Only accepted for a single file
    #[arg(long)]
    date: Option<u64>,

    /// Print one JSON descriptor per source instead of the summary view
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PlanArgs {
    /// Source image to read dimensions from
    #[arg(required_unless_present = "size")]
    path: Option<PathBuf>,

    /// Source dimensions as WIDTHxHEIGHT, instead of reading a file
    #[arg(long, value_parser = parse_size, conflicts_with = "path")]
    size: Option<(u32, u32)>,

    /// Source format when using --size
    #[arg(long = "type", default_value = "jpeg")]
    kind: ImageKind,

    /// Source byte length when using --size, for skip_size decisions
    #[arg(long, default_value_t = u64::MAX)]
    length: u64,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid dimension `{v}`: {e}"))
    };
    Ok((parse(w)?, parse(h)?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Derive(args) => derive(&config, &args)?,
        Command::Plan(args) => plan(&config, &args)?,
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Orig ids claimed so far in one batch.
///
/// The orig id depends only on the run timestamp, so two sources with the
/// same timestamp would overwrite each other's assets.
#[derive(Default)]
struct IssuedIds(Mutex<HashSet<AssetId>>);

impl IssuedIds {
    /// Claim the id a run at `date` writes under.
    fn claim(&self, date: SystemTime) -> Result<AssetId, String> {
        let id = persist::orig_asset_id(date);
        let mut issued = self.0.lock().map_err(|_| "id registry poisoned".to_string())?;
        if !issued.insert(id.clone()) {
            return Err(format!(
                "asset id {id} is already used by another source in this batch"
            ));
        }
        Ok(id)
    }
}

fn derive(config: &PipelineConfig, args: &DeriveArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.date.is_some() && args.path.is_dir() {
        return Err(format!(
            "--date gives every source the same asset id; {} is a directory",
            args.path.display()
        )
        .into());
    }
    let sources = collect_sources(&args.path)?;
    if sources.is_empty() {
        return Err(format!("no images found in {}", args.path.display()).into());
    }
    init_thread_pool(&config.processing);
    let store = FsStore::new(&args.store);
    let issued = IssuedIds::default();
    info!(sources = sources.len(), store = %args.store.display(), "deriving previews");

    let json = args.json;
    let (tx, rx) = std::sync::mpsc::channel::<DeriveEvent>();
    let printer = std::thread::spawn(move || {
        let (mut derived, mut failed) = (0, 0);
        for event in rx {
            match &event {
                DeriveEvent::Derived { descriptor, .. } => {
                    derived += 1;
                    if json {
                        match serde_json::to_string(descriptor) {
                            Ok(line) => println!("{}", line),
                            Err(e) => error!(error = %e, "failed to serialize descriptor"),
                        }
                        continue;
                    }
                }
                DeriveEvent::Failed { .. } => failed += 1,
            }
            if !json {
                output::print_derive_event(&event);
            }
        }
        (derived, failed)
    });

    sources
        .par_iter()
        .enumerate()
        .for_each_with(tx, |tx, (i, path)| {
            let source_path = path.display().to_string();
            let event = match derive_one(config, &store, &issued, path, args.date) {
                Ok(descriptor) => DeriveEvent::Derived {
                    index: i + 1,
                    source_path,
                    descriptor,
                },
                Err(e) => {
                    error!(source = source_path.as_str(), error = %e, "derivation failed");
                    DeriveEvent::Failed {
                        index: i + 1,
                        source_path,
                        error: e.to_string(),
                    }
                }
            };
            // The printer only stops once every sender is dropped.
            let _ = tx.send(event);
        });

    let (derived, failed) = printer
        .join()
        .map_err(|_| "output thread panicked")?;
    if !json {
        println!();
        println!("{}", output::format_derive_summary(derived, failed));
    }
    if failed > 0 {
        return Err(format!("{failed} of {} sources failed", derived + failed).into());
    }
    Ok(())
}

fn derive_one(
    config: &PipelineConfig,
    store: &FsStore,
    issued: &IssuedIds,
    path: &Path,
    date: Option<u64>,
) -> Result<previewer::AssetDescriptor, Box<dyn std::error::Error + Send + Sync>> {
    let date = match date {
        Some(secs) => UNIX_EPOCH + Duration::from_secs(secs),
        None => std::fs::metadata(path)?
            .modified()
            .unwrap_or_else(|_| SystemTime::now()),
    };
    issued.claim(date)?;
    let file = std::fs::File::open(path)?;
    Ok(pipeline::derive_previews(
        std::io::BufReader::new(file),
        config,
        date,
        store,
    )?)
}

/// A file is taken as-is; a directory is walked for files with an image extension.
fn collect_sources(path: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut sources = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        let is_image = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.parse::<ImageKind>().is_ok());
        if entry.file_type().is_file() && is_image {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

fn plan(config: &PipelineConfig, args: &PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let (kind, dimensions, length) = match (&args.path, args.size) {
        (Some(path), _) => {
            let bytes = std::fs::read(path)?;
            let (kind, dimensions) = get_dimensions(&RustBackend::new(), &bytes, config.ext)?;
            (kind, dimensions, bytes.len() as u64)
        }
        (None, Some(size)) => (args.kind, size, args.length),
        (None, None) => return Err("either a path or --size is required".into()),
    };

    let rows = planner::plan_run(config, kind, dimensions, length);
    output::print_plan(kind, dimensions, length, &rows);
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
