mod cli;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use hl_av::{FfmpegEncoder, ToolRegistry};
use hl_core::config::Config;
use hl_core::{QualityCatalog, QualityProfile, RunId, DEFAULT_QUALITY_NAMES};
use hl_pipeline::{ConversionRequest, Converter, ProgressSender};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Options of the `convert` subcommand that shape the request.
struct ConvertOptions {
    source: String,
    qualities: Vec<String>,
    run_id: Option<String>,
    catalog: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    delete_source: bool,
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG overrides the per-crate defaults entirely.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsladder=debug,hl_core=debug,hl_av=debug,hl_media=debug,hl_pipeline=debug".to_string()
        } else {
            "hlsladder=info,hl_core=info,hl_av=info,hl_media=info,hl_pipeline=info".to_string()
        }
    });

    // Logs go to stderr so that `--json` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Map an error to the process exit status of its underlying
/// [`hl_core::Error`], or 1 for anything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<hl_core::Error>())
        .and_then(|e| u8::try_from(e.exit_code()).ok())
        .unwrap_or(1)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Convert {
            source,
            qualities,
            run_id,
            catalog,
            input_dir,
            output_dir,
            delete_source,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let opts = ConvertOptions {
                source,
                qualities,
                run_id,
                catalog,
                input_dir,
                output_dir,
                delete_source,
                json,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert(config, opts))
        }
        Commands::Qualities { catalog, json } => {
            list_qualities(cli.config.as_deref(), catalog.as_deref(), json)
        }
        Commands::CheckTools { json } => {
            let config = load_config(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(&config, json))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hlsladder {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load the config file if one was given (errors surface), defaults otherwise.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) => Config::load(p)?,
        None => Config::load_or_default(None),
    };
    for warning in config.validate() {
        tracing::warn!("Config: {warning}");
    }
    Ok(config)
}

/// Read a JSON array of quality profiles. Validation is left to the caller.
fn load_catalog_profiles(path: &Path) -> hl_core::Result<Vec<QualityProfile>> {
    let json = std::fs::read_to_string(path).map_err(|e| hl_core::Error::io(path, e))?;
    serde_json::from_str(&json).map_err(|e| {
        hl_core::Error::Validation(format!("catalog {}: {e}", path.display()))
    })
}

async fn convert(mut config: Config, opts: ConvertOptions) -> Result<()> {
    // A source given as a path carries its own input directory.
    let source_path = Path::new(&opts.source);
    let source_name = match source_path.parent() {
        Some(parent) if opts.input_dir.is_none() && !parent.as_os_str().is_empty() => {
            config.paths.input_dir = parent.to_path_buf();
            source_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        }
        _ => opts.source.clone(),
    };
    if let Some(dir) = opts.input_dir {
        config.paths.input_dir = dir;
    }
    if let Some(dir) = opts.output_dir {
        config.paths.output_dir = dir;
    }

    let tools = ToolRegistry::discover(&config.tools);
    let converter = Converter::from_config(&config, Arc::new(FfmpegEncoder::new(tools)))?;

    let mut request = ConversionRequest::new(source_name);
    if !opts.qualities.is_empty() {
        request = request.with_qualities(opts.qualities);
    }
    if let Some(path) = opts.catalog {
        request = request.with_catalog(load_catalog_profiles(&path)?);
    }
    if let Some(id) = opts.run_id {
        request = request.with_run_id(RunId::from_caller(id)?);
    }
    if opts.delete_source {
        request = request.with_delete_source(true);
    }
    if !opts.json {
        request = request.with_progress(console_progress());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; cancelling conversion");
            on_interrupt.cancel();
        }
    });
    request = request.with_cancellation(cancel);

    let report = converter.convert(request).await?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nConversion complete (run {})", report.run_id);
    for job in &report.jobs {
        println!("  ✓ {}", job.quality);
    }
    if report.source_deleted {
        println!("Source file deleted");
    }
    println!("Master manifest: {}", report.master_manifest.display());

    Ok(())
}

/// Progress printer: one line per quality at start, every 10%, and at 100%.
fn console_progress() -> ProgressSender {
    let printed: Mutex<HashMap<String, u8>> = Mutex::new(HashMap::new());
    ProgressSender::new(move |quality, percent| {
        let mut printed = printed.lock();
        let due = match printed.get(quality) {
            None => true,
            Some(&last) => percent == 100 || percent >= last + 10,
        };
        if due {
            printed.insert(quality.to_string(), percent);
            println!("[{quality:>5}] {percent:>3}%");
        }
    })
}

fn list_qualities(config_path: Option<&Path>, catalog_path: Option<&Path>, json: bool) -> Result<()> {
    let catalog = match catalog_path {
        Some(p) => QualityCatalog::new(load_catalog_profiles(p)?)?,
        None => load_config(config_path)?.quality_catalog()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    println!(
        "  {:<6} {:<10} {:>8} {:>8} {:>8}  {}",
        "NAME", "RESOLUTION", "BITRATE", "MAXRATE", "BUFSIZE", "MANIFEST"
    );
    for p in catalog.profiles() {
        let marker = if DEFAULT_QUALITY_NAMES.contains(&p.name.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<6} {:<10} {:>8} {:>8} {:>8}  {}",
            marker, p.name, p.resolution, p.bitrate, p.max_bitrate, p.buffer_size, p.manifest_filename
        );
    }
    println!("\n* encoded when no qualities are requested");

    Ok(())
}

async fn check_tools(config: &Config, json: bool) -> Result<()> {
    let registry = ToolRegistry::discover(&config.tools);
    let tools = registry.check_all().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    println!("Checking external tools...\n");
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg or set tools.ffmpeg_path.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let catalog = config.quality_catalog();
    println!("  Input dir: {}", config.paths.input_dir.display());
    println!("  Output dir: {}", config.paths.output_dir.display());
    println!(
        "  Encode timeout: {}s",
        config.tools.encode_timeout_secs
    );
    match &catalog {
        Ok(c) if config.conversion.catalog.is_some() => println!("  Catalog: custom ({} qualities)", c.len()),
        Ok(c) => println!("  Catalog: built-in ({} qualities)", c.len()),
        Err(e) => println!("  Catalog: invalid ({e})"),
    }
    println!(
        "  Delete source on success: {}",
        config.conversion.delete_source_on_success
    );

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {w}");
        }
    }

    catalog?;
    Ok(())
}
