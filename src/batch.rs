//! Converting whole directories.
//!
//! The batch layer only fans requests out to the [`Dispatcher`] and collects what comes
//! back, every file gets exactly the same treatment as a single conversion would.

use crate::dispatch::Dispatcher;
use crate::error::ConvertError;
use crate::outcome::ConversionOutcome;
use crate::request::{ConversionOptions, ConversionRequest, MethodOrder};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug)]
pub enum BatchError {
    SourceNotADirectory(PathBuf),
    Walk(walkdir::Error),
    #[cfg(feature = "parallel")]
    Pool(rayon::ThreadPoolBuildError),
}

impl Display for BatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::SourceNotADirectory(path) => write!(
                f,
                "source directory '{}' does not exist or is not a directory",
                path.display()
            ),
            BatchError::Walk(error) => write!(f, "could not list FBX files: {error}"),
            #[cfg(feature = "parallel")]
            BatchError::Pool(error) => write!(f, "could not start worker pool: {error}"),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BatchError::Walk(error) => Some(error),
            #[cfg(feature = "parallel")]
            BatchError::Pool(error) => Some(error),
            _ => None,
        }
    }
}

impl From<walkdir::Error> for BatchError {
    fn from(error: walkdir::Error) -> Self {
        BatchError::Walk(error)
    }
}

#[cfg(feature = "parallel")]
impl From<rayon::ThreadPoolBuildError> for BatchError {
    fn from(error: rayon::ThreadPoolBuildError) -> Self {
        BatchError::Pool(error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    recursive: bool,
    output_dir: Option<PathBuf>,
    /// `1` converts one file at a time, `0` uses one worker per CPU.
    workers: usize,
    methods: MethodOrder,
    conversion: ConversionOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            output_dir: None,
            workers: 1,
            methods: MethodOrder::Auto,
            conversion: ConversionOptions::default(),
        }
    }
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn output_dir<P: Into<PathBuf>>(mut self, output_dir: Option<P>) -> Self {
        self.output_dir = output_dir.map(Into::into);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn methods(mut self, methods: MethodOrder) -> Self {
        self.methods = methods;
        self
    }

    pub fn conversion(mut self, conversion: ConversionOptions) -> Self {
        self.conversion = conversion;
        self
    }
}

/// Stops a running batch from starting new conversions. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub source: PathBuf,
    pub outcome: ConversionOutcome,
}

/// Aggregated result of a batch, in the order the files were found.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub successes: Vec<ConversionOutcome>,
    pub failures: Vec<BatchFailure>,
    /// Files that were never started because the batch was cancelled.
    pub cancelled: Vec<PathBuf>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.cancelled.is_empty()
    }

    /// Number of files that were actually dispatched.
    pub fn processed(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn log_summary(&self) {
        info!(
            "Conversion complete: {} succeeded, {} failed",
            self.successes.len(),
            self.failures.len()
        );
        if !self.cancelled.is_empty() {
            warn!("{} files skipped after cancellation", self.cancelled.len());
        }
        if !self.failures.is_empty() {
            warn!("Failed conversions:");
            for failure in &self.failures {
                for line in failure.outcome.failure_summary().lines() {
                    warn!("  {line}");
                }
            }
        }
    }
}

/// Lists the `.fbx` files in `source`, sorted by path. The extension is matched ignoring case.
pub fn find_fbx_files(source: &Path, recursive: bool) -> Result<Vec<PathBuf>, BatchError> {
    if !source.is_dir() {
        return Err(BatchError::SourceNotADirectory(source.to_path_buf()));
    }
    let mut walker = walkdir::WalkDir::new(source).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_fbx(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_fbx(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("fbx"))
}

/// Where the GLB for `file` goes: mirrored under `output_dir`, or next to the source.
pub fn output_path_for(file: &Path, source: &Path, output_dir: Option<&Path>) -> PathBuf {
    match output_dir {
        Some(output_dir) => {
            let relative = file.strip_prefix(source).unwrap_or(file);
            output_dir.join(relative).with_extension("glb")
        }
        None => file.with_extension("glb"),
    }
}

/// One request per file, carrying the batch-wide methods and options.
pub fn plan(files: &[PathBuf], source: &Path, options: &BatchOptions) -> Vec<ConversionRequest> {
    files
        .iter()
        .map(|file| {
            ConversionRequest::new(file)
                .with_output(output_path_for(file, source, options.output_dir.as_deref()))
                .with_methods(options.methods.clone())
                .with_options(options.conversion.clone())
        })
        .collect()
}

/// The first request for every output path. `a.fbx` and `a.FBX` both map to `a.glb`, only
/// the first of them may write it.
fn output_owners(requests: &[ConversionRequest]) -> HashMap<&Path, &Path> {
    let mut owners = HashMap::new();
    for request in requests {
        owners.entry(request.output()).or_insert(request.input());
    }
    owners
}

/// Dispatches every request, with up to `workers` conversions running at once.
///
/// Requests whose output is already claimed by an earlier request fail with
/// [`ConvertError::DuplicateOutput`] without being dispatched.
#[instrument(skip_all, fields(files = requests.len(), workers = workers))]
pub fn run_batch(
    dispatcher: &Dispatcher,
    requests: &[ConversionRequest],
    workers: usize,
    cancel: &CancelToken,
) -> Result<BatchReport, BatchError> {
    let owners = output_owners(requests);
    let convert = |request: &ConversionRequest| -> Result<ConversionOutcome, PathBuf> {
        if cancel.is_cancelled() {
            return Err(request.input().to_path_buf());
        }
        let owner = owners.get(request.output()).copied().unwrap_or(request.input());
        if owner != request.input() {
            warn!(
                "Skipping {}: {} is also converted from {}",
                request.input().display(),
                request.output().display(),
                owner.display()
            );
            let mut outcome = ConversionOutcome::new(request);
            outcome.error = Some(ConvertError::DuplicateOutput {
                output: request.output().to_path_buf(),
                claimed_by: owner.to_path_buf(),
            });
            return Ok(outcome);
        }
        let outcome = dispatcher.dispatch(request);
        if outcome.is_success() {
            info!("✅ {} → {}", request.input().display(), request.output().display());
        } else {
            info!("❌ {}", request.input().display());
        }
        Ok(outcome)
    };

    #[cfg(feature = "parallel")]
    let results: Vec<Result<ConversionOutcome, PathBuf>> = if workers == 1 {
        requests.iter().map(convert).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        pool.install(|| requests.par_iter().map(convert).collect())
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<ConversionOutcome, PathBuf>> = {
        if workers != 1 {
            warn!("Built without the parallel feature, converting one file at a time");
        }
        requests.iter().map(convert).collect()
    };

    let mut report = BatchReport::default();
    for result in results {
        match result {
            Ok(outcome) if outcome.is_success() => report.successes.push(outcome),
            Ok(outcome) => report.failures.push(BatchFailure {
                source: outcome.input.clone(),
                outcome,
            }),
            Err(skipped) => report.cancelled.push(skipped),
        }
    }
    Ok(report)
}

/// Finds the FBX files under `source` and converts them all.
pub fn batch_convert(
    dispatcher: &Dispatcher,
    source: &Path,
    options: &BatchOptions,
    cancel: &CancelToken,
) -> Result<BatchReport, BatchError> {
    let files = find_fbx_files(source, options.recursive)?;
    if files.is_empty() {
        warn!("No FBX files found in '{}'", source.display());
        return Ok(BatchReport::default());
    }
    info!("Found {} FBX files to convert", files.len());
    info!("  Source directory: {}", source.display());
    match &options.output_dir {
        Some(output_dir) => info!("  Output directory: {}", output_dir.display()),
        None => info!("  Output directory: same as source"),
    }
    info!("  Recursive: {}", if options.recursive { "yes" } else { "no" });
    info!(
        "  Force overwrite: {}",
        if options.conversion.is_force() { "yes" } else { "no" }
    );

    let requests = plan(&files, source, options);
    let report = run_batch(dispatcher, &requests, options.workers, cancel)?;
    report.log_summary();
    Ok(report)
}
