use clap::Parser;
use fbx2glb::cli::init_logging;
use fbx2glb::component::{ComponentOptions, generate_component};
use fbx2glb::filesystem::RealFileSystem;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

/// Generate a React Three Fiber component for a 3D model.
#[derive(Parser)]
#[command(name = "fbx2glb-component", version)]
struct Args {
    /// Model file, FBX or GLB
    input: PathBuf,

    /// Component file to write, defaults to src/components/models/<Name>.tsx
    output: Option<PathBuf>,

    /// Component name, derived from the file name by default
    #[arg(long)]
    name: Option<String>,

    /// Overwrite the component file if it exists
    #[arg(short, long)]
    force: bool,

    /// Show debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(error) => {
            error!("Could not determine the working directory: {error}");
            return ExitCode::FAILURE;
        }
    };
    let options = ComponentOptions {
        output: args.output,
        name: args.name,
        force: args.force,
    };
    match generate_component(&RealFileSystem, &args.input, &cwd, &options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}
