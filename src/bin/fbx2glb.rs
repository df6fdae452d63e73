use clap::Parser;
use fbx2glb::capability::Capabilities;
use fbx2glb::cli::{MethodList, ToolArgs, dependency_report, init_logging, method_order};
use fbx2glb::dispatch::Dispatcher;
use fbx2glb::exit;
use fbx2glb::filesystem::RealFileSystem;
use fbx2glb::process::SystemRunner;
use fbx2glb::request::ConversionRequest;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

/// Convert an FBX model to GLB, falling back through the installed converters.
#[derive(Parser)]
#[command(name = "fbx2glb", version)]
struct Args {
    /// FBX file to convert
    #[arg(required_unless_present = "check_dependencies")]
    input: Option<PathBuf>,

    /// Where to write the GLB, defaults to the input with a .glb extension
    output: Option<PathBuf>,

    /// Conversion methods to try in order, e.g. fbx2gltf,blender
    #[arg(short, long, value_name = "METHODS")]
    method: Option<MethodList>,

    /// Overwrite the output file if it exists
    #[arg(short, long)]
    force: bool,

    /// Show debug output and the output of the conversion tools
    #[arg(short, long)]
    verbose: bool,

    /// Rotate the model to face up (Blender)
    #[arg(long)]
    fix_axis: bool,

    /// Re-save the FBX file with a current SDK before converting
    #[arg(long)]
    upgrade_fbx: bool,

    /// List the available conversion tools and exit
    #[arg(long)]
    check_dependencies: bool,

    /// Use Draco mesh compression (fbx2gltf)
    #[arg(long)]
    draco: bool,

    /// Keep vertex attribute information (fbx2gltf)
    #[arg(long)]
    keep_attribute_info: bool,

    /// Do not optimize textures (fbx2gltf)
    #[arg(long)]
    no_texture_optimization: bool,

    /// Print the conversion outcome as JSON
    #[arg(long)]
    json: bool,

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
            return ExitCode::from(exit::INPUT_OR_IO);
        }
    };
    let capabilities = Capabilities::detect(&args.tools.tool_paths(&config), &SystemRunner);

    if args.check_dependencies {
        println!("{}", dependency_report(&capabilities));
        return if capabilities.any_available() {
            ExitCode::from(exit::SUCCESS)
        } else {
            ExitCode::from(exit::NO_METHOD_AVAILABLE)
        };
    }
    let Some(input) = args.input else {
        return ExitCode::from(exit::USAGE);
    };

    let options = config
        .conversion_options()
        .force(args.force)
        .verbose(args.verbose)
        .fix_axis(args.fix_axis)
        .upgrade_first(args.upgrade_fbx)
        .draco(args.draco)
        .keep_attribute_info(args.keep_attribute_info)
        .no_texture_optimization(args.no_texture_optimization)
        .timeout(args.tools.timeout(&config));
    let mut request = ConversionRequest::new(input)
        .with_methods(method_order(args.method.as_ref(), &config))
        .with_options(options);
    if let Some(output) = args.output {
        request = request.with_output(output);
    }

    let dispatcher = Dispatcher::new(&capabilities, &SystemRunner, &RealFileSystem);
    let outcome = dispatcher.dispatch(&request);

    if args.json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{json}"),
            Err(error) => error!("Could not serialize outcome: {error}"),
        }
    }
    if !outcome.is_success() {
        error!("{}", outcome.failure_summary());
    }
    ExitCode::from(exit::for_outcome(&outcome))
}
