use clap::Parser;
use fbx2glb::batch::{BatchOptions, CancelToken, batch_convert};
use fbx2glb::capability::Capabilities;
use fbx2glb::cli::{MethodList, ToolArgs, init_logging, method_order};
use fbx2glb::dispatch::Dispatcher;
use fbx2glb::exit;
use fbx2glb::filesystem::RealFileSystem;
use fbx2glb::process::SystemRunner;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

/// Convert every FBX file in a directory to GLB.
#[derive(Parser)]
#[command(name = "fbx2glb-batch", version)]
struct Args {
    /// Directory containing FBX files
    source_dir: PathBuf,

    /// Output directory, defaults to next to each source file
    output_dir: Option<PathBuf>,

    /// Include subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Conversion methods to try in order, e.g. fbx2gltf,blender
    #[arg(short, long, value_name = "METHODS")]
    method: Option<MethodList>,

    /// Overwrite existing output files
    #[arg(short, long)]
    force: bool,

    /// Number of files to convert at once, 0 for one per CPU
    #[arg(short, long, value_name = "WORKERS")]
    parallel: Option<usize>,

    /// Show debug output
    #[arg(short, long)]
    verbose: bool,

    /// Use Draco mesh compression (fbx2gltf)
    #[arg(long)]
    draco: bool,

    /// Do not optimize textures (fbx2gltf)
    #[arg(long)]
    no_texture_optimization: bool,

    /// Write a JSON report of every conversion to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    #[command(flatten)]
    tools: ToolArgs,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match args.tools.load_config() {
        Ok(config) => config,
        Err(error) => {
            error!("{error}");
            return ExitCode::from(exit::CONVERSION_FAILED);
        }
    };
    let capabilities = Capabilities::detect(&args.tools.tool_paths(&config), &SystemRunner);

    let conversion = config
        .conversion_options()
        .force(args.force)
        .verbose(args.verbose)
        .draco(args.draco)
        .no_texture_optimization(args.no_texture_optimization)
        .timeout(args.tools.timeout(&config));
    let options = BatchOptions::new()
        .recursive(args.recursive)
        .output_dir(args.output_dir)
        .workers(args.parallel.or(config.workers).unwrap_or(1))
        .methods(method_order(args.method.as_ref(), &config))
        .conversion(conversion);

    let dispatcher = Dispatcher::new(&capabilities, &SystemRunner, &RealFileSystem);
    let report = match batch_convert(&dispatcher, &args.source_dir, &options, &CancelToken::new())
    {
        Ok(report) => report,
        Err(error) => {
            error!("{error}");
            return ExitCode::from(exit::CONVERSION_FAILED);
        }
    };

    if let Some(path) = &args.report {
        let written = serde_json::to_vec_pretty(&report)
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(path, json));
        match written {
            Ok(()) => info!("Report written to {}", path.display()),
            Err(error) => error!("Could not write report {}: {error}", path.display()),
        }
    }

    if report.is_success() {
        ExitCode::from(exit::SUCCESS)
    } else {
        ExitCode::from(exit::CONVERSION_FAILED)
    }
}
