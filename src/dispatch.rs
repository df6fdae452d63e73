//! The fallback dispatcher.
//!
//! Methods are tried strictly in the requested order, unavailable ones are skipped, and the
//! first one that produces a valid GLB wins. Every backend writes to a staging file next to
//! the output which is only renamed over the output once it has been verified, so a failing
//! method never leaves a broken file at the output path.

use crate::backend::{Backend, RunContext, remove_scratch, resaved_name, verify_glb};
use crate::capability::Capabilities;
use crate::error::{ConvertError, MethodError};
use crate::fbx_version::detect_fbx_version;
use crate::filesystem::{FileSystem, ScratchDir};
use crate::method::Method;
use crate::outcome::{Attempt, ConversionOutcome, UpgradeRecord};
use crate::process::ProcessRunner;
use crate::request::{ConversionOptions, ConversionRequest};
use crate::upgrade::Upgrader;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info_span, instrument};

const MB: f64 = 1024.0 * 1024.0;

pub struct Dispatcher<'a> {
    capabilities: &'a Capabilities,
    runner: &'a dyn ProcessRunner,
    fs: &'a dyn FileSystem,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        capabilities: &'a Capabilities,
        runner: &'a dyn ProcessRunner,
        fs: &'a dyn FileSystem,
    ) -> Self {
        Self {
            capabilities,
            runner,
            fs,
        }
    }

    /// Converts one file. Always returns exactly one outcome, failures included.
    #[instrument(skip_all, fields(input = ?request.input(), output = ?request.output()))]
    pub fn dispatch(&self, request: &ConversionRequest) -> ConversionOutcome {
        let mut outcome = ConversionOutcome::new(request);
        if let Err(error) = self.run(request, &mut outcome) {
            warn!("{}: {error}", request.input().display());
            outcome.error = Some(error);
        }
        outcome
    }

    fn run(
        &self,
        request: &ConversionRequest,
        outcome: &mut ConversionOutcome,
    ) -> Result<(), ConvertError> {
        let input = request.input();
        let output = request.output();
        let options = request.options();

        if !self.fs.exists(input) {
            return Err(ConvertError::InputNotFound(input.to_path_buf()));
        }
        if self.fs.exists(output) && !options.force {
            return Err(ConvertError::AlreadyExists(output.to_path_buf()));
        }

        let order = request.methods().resolve();
        let backends = self.backends(&order, options);
        if backends.is_empty() {
            return Err(ConvertError::NoMethodAvailable {
                diagnostics: self.diagnostics(&order),
            });
        }

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                self.fs.create_dir_all(parent)?;
            }
        }

        let ctx = RunContext {
            runner: self.runner,
            fs: self.fs,
            timeout: options.timeout,
            echo: options.verbose,
        };

        let upgraded = if options.upgrade_first {
            self.upgrade(input, options, &ctx, outcome)?
        } else {
            None
        };
        let source = upgraded.as_ref().map_or(input, |(_, path)| path.as_path());
        let result = self.attempt_all(source, output, &backends, &ctx, outcome);
        if let Some((_scratch, upgraded)) = &upgraded {
            remove_scratch(self.fs, upgraded);
        }
        result?;

        self.log_sizes(input, output);
        Ok(())
    }

    fn backends(&self, order: &[Method], options: &ConversionOptions) -> Vec<Backend> {
        order
            .iter()
            .filter_map(|method| {
                let backend = Backend::resolve(*method, self.capabilities, options);
                if backend.is_none() {
                    debug!(
                        "Skipping {method}: {}",
                        self.capabilities
                            .availability(*method)
                            .diagnostic()
                            .unwrap_or("unavailable")
                    );
                }
                backend
            })
            .collect()
    }

    fn diagnostics(&self, order: &[Method]) -> Vec<(Method, String)> {
        order
            .iter()
            .map(|method| {
                let diagnostic = self
                    .capabilities
                    .availability(*method)
                    .diagnostic()
                    .unwrap_or("unavailable")
                    .to_string();
                (*method, diagnostic)
            })
            .collect()
    }

    /// Re-saves the input into a scratch directory. Returns the upgraded file when the upgrade
    /// worked, the directory has to outlive the conversion attempts.
    fn upgrade(
        &self,
        input: &Path,
        options: &ConversionOptions,
        ctx: &RunContext,
        outcome: &mut ConversionOutcome,
    ) -> Result<Option<(ScratchDir, PathBuf)>, ConvertError> {
        let _span = info_span!("upgrade").entered();
        let version = match detect_fbx_version(self.fs, input) {
            Ok(version) => {
                info!("Detected {version}");
                if !version.needs_upgrade() {
                    debug!("{} does not need an upgrade, upgrading as requested", input.display());
                }
                Some(version)
            }
            Err(error) => {
                warn!("Could not read FBX header of {}: {error}", input.display());
                None
            }
        };

        let scratch = self.fs.scratch_dir()?;
        let upgraded = scratch.join(resaved_name(input));
        let (tool, result) = match Upgrader::resolve(self.capabilities, options) {
            Ok(upgrader) => {
                info!("Upgrading FBX file {} using {}", input.display(), upgrader.name());
                (Some(upgrader.name()), upgrader.upgrade(input, &upgraded, ctx))
            }
            Err(error) => (None, Err(error)),
        };

        let reason = result.as_ref().err().map(ToString::to_string);
        outcome.upgrade = Some(UpgradeRecord {
            version,
            tool,
            result,
        });
        match reason {
            None => Ok(Some((scratch, upgraded))),
            Some(reason) => {
                remove_scratch(self.fs, &upgraded);
                if options.upgrade_mandatory {
                    Err(ConvertError::UpgradeFailed { reason })
                } else {
                    warn!("FBX upgrade failed ({reason}), converting the original file");
                    Ok(None)
                }
            }
        }
    }

    fn attempt_all(
        &self,
        source: &Path,
        output: &Path,
        backends: &[Backend],
        ctx: &RunContext,
        outcome: &mut ConversionOutcome,
    ) -> Result<(), ConvertError> {
        for backend in backends {
            let method = backend.method();
            let staging = staging_path(output, method);
            self.discard(&staging)?;

            info!(
                "Converting '{}' to '{}' using {method}",
                source.display(),
                output.display()
            );
            let _span = info_span!("attempt", %method).entered();
            let started = Instant::now();
            let result = backend
                .convert(source, &staging, ctx)
                .and_then(|()| verify_glb(self.fs, &staging))
                .and_then(|()| self.fs.rename(&staging, output).map_err(MethodError::from));
            let elapsed = started.elapsed();

            match result {
                Ok(()) => {
                    outcome.attempts.push(Attempt {
                        method,
                        result: Ok(()),
                        elapsed,
                    });
                    outcome.method_used = Some(method);
                    return Ok(());
                }
                Err(error) => {
                    warn!("{method} failed for '{}': {error}", source.display());
                    outcome.attempts.push(Attempt {
                        method,
                        result: Err(error),
                        elapsed,
                    });
                    self.discard(&staging)?;
                }
            }
        }
        Err(ConvertError::AllMethodsFailed {
            attempted: outcome.attempted_methods(),
        })
    }

    /// Deletes a leftover staging file. Not being able to is fatal for the request.
    fn discard(&self, path: &Path) -> Result<(), ConvertError> {
        if self.fs.exists(path) {
            self.fs
                .remove_file(path)
                .map_err(|error| ConvertError::PartialWrite {
                    path: path.to_path_buf(),
                    error,
                })?;
        }
        Ok(())
    }

    fn log_sizes(&self, input: &Path, output: &Path) {
        let (Ok(input_len), Ok(output_len)) = (self.fs.file_len(input), self.fs.file_len(output))
        else {
            return;
        };
        let input_mb = input_len as f64 / MB;
        let output_mb = output_len as f64 / MB;
        let reduction = if input_len > 0 {
            (1.0 - output_len as f64 / input_len as f64) * 100.0
        } else {
            0.0
        };
        info!("Conversion successful: {} → {}", input.display(), output.display());
        info!("File size: {input_mb:.2} MB → {output_mb:.2} MB ({reduction:.1}% reduction)");
    }
}

/// `dir/.name.<method>.partial.glb`, next to the output so the final rename stays on one
/// file system.
pub fn staging_path(output: &Path, method: Method) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    output.with_file_name(format!(".{stem}.{method}.partial.glb"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Availability, ToolPaths};
    use crate::filesystem::MemoryFileSystem;
    use crate::request::MethodOrder;
    use crate::testing::{Script, ScriptedRunner, fbx_bytes, fbx_bytes_with_version, glb_bytes};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn fs_with_input() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.write_file(Path::new("a.fbx"), &fbx_bytes()).unwrap();
        fs
    }

    fn request(methods: &[Method]) -> ConversionRequest {
        ConversionRequest::new("a.fbx")
            .with_output("a.glb")
            .with_methods(MethodOrder::Explicit(methods.to_vec()))
    }

    fn statuses(outcome: &ConversionOutcome) -> Vec<(Method, bool)> {
        outcome
            .attempts
            .iter()
            .map(|attempt| (attempt.method, attempt.succeeded()))
            .collect()
    }

    #[test]
    fn single_method_success() {
        let fs = fs_with_input();
        let runner = ScriptedRunner::new(&fs).tool("fbx2gltf", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let outcome = dispatcher.dispatch(&request(&[Method::Fbx2gltf]));

        assert!(outcome.is_success());
        assert_eq!(outcome.method_used, Some(Method::Fbx2gltf));
        assert_eq!(statuses(&outcome), vec![(Method::Fbx2gltf, true)]);
        assert_eq!(fs.get_file("a.glb"), Some(glb_bytes()));
        assert_eq!(
            fs.list_files(),
            vec!["a.fbx".to_string(), "a.glb".to_string()]
        );
        let report = serde_json::to_value(&outcome).unwrap();
        assert_eq!(report["success"], json!(true));
        assert_eq!(report["methodUsed"], json!("fbx2gltf"));
        assert_eq!(report["attempts"][0]["method"], json!("fbx2gltf"));
        assert_eq!(report["attempts"][0]["status"], json!("ok"));
    }

    #[test]
    fn skips_unavailable_and_stops_at_first_success() {
        let fs = fs_with_input();
        // FBX SDK missing, fbx2gltf fails, Blender works
        let runner = ScriptedRunner::new(&fs)
            .tool(
                "fbx2gltf",
                Script::Fail {
                    code: 1,
                    stderr: "Unsupported FBX version",
                },
            )
            .tool("blender", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let outcome =
            dispatcher.dispatch(&request(&[Method::FbxSdk, Method::Fbx2gltf, Method::Blender]));

        assert!(outcome.is_success());
        assert_eq!(outcome.method_used, Some(Method::Blender));
        assert_eq!(
            statuses(&outcome),
            vec![(Method::Fbx2gltf, false), (Method::Blender, true)]
        );
        assert_eq!(runner.conversions(), vec!["fbx2gltf", "blender"]);
    }

    #[test]
    fn never_runs_methods_after_success() {
        let fs = fs_with_input();
        let runner = ScriptedRunner::new(&fs)
            .tool("fbx2gltf", Script::Succeed)
            .tool("blender", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let outcome = dispatcher.dispatch(&request(&[Method::Fbx2gltf, Method::Blender]));

        assert_eq!(statuses(&outcome), vec![(Method::Fbx2gltf, true)]);
        assert_eq!(runner.conversions(), vec!["fbx2gltf"]);
    }

    #[test]
    fn no_method_available() {
        let fs = fs_with_input();
        let runner = ScriptedRunner::new(&fs).tool("fbx2gltf", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let outcome = dispatcher.dispatch(&request(&[Method::Blender]));

        assert!(!outcome.is_success());
        assert!(outcome.attempts.is_empty());
        match &outcome.error {
            Some(ConvertError::NoMethodAvailable { diagnostics }) => {
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].0, Method::Blender);
                assert!(diagnostics[0].1.contains("not found on PATH"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(fs.list_files(), vec!["a.fbx".to_string()]);
        assert!(runner.conversions().is_empty());
    }

    #[test]
    fn existing_output_without_force() {
        let fs = fs_with_input();
        fs.write_file(Path::new("a.glb"), b"previous").unwrap();
        let runner = ScriptedRunner::new(&fs).tool("fbx2gltf", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let outcome = dispatcher.dispatch(&request(&[Method::Fbx2gltf]));

        assert!(matches!(outcome.error, Some(ConvertError::AlreadyExists(_))));
        assert!(runner.conversions().is_empty());
        assert_eq!(fs.get_file("a.glb"), Some(b"previous".to_vec()));
    }

    #[test]
    fn force_keeps_previous_output_when_everything_fails() {
        let fs = fs_with_input();
        fs.write_file(Path::new("a.glb"), b"previous").unwrap();
        let runner = ScriptedRunner::new(&fs)
            .tool("fbx2gltf", Script::PartialThenFail)
            .tool("blender", Script::WriteGarbage);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let request = request(&[Method::Fbx2gltf, Method::Blender])
            .with_options(ConversionOptions::new().force(true));
        let outcome = dispatcher.dispatch(&request);

        assert!(matches!(
            outcome.error,
            Some(ConvertError::AllMethodsFailed { .. })
        ));
        assert_eq!(
            statuses(&outcome),
            vec![(Method::Fbx2gltf, false), (Method::Blender, false)]
        );
        assert!(matches!(
            outcome.attempts[1].result,
            Err(MethodError::InvalidOutput { .. })
        ));
        assert_eq!(fs.get_file("a.glb"), Some(b"previous".to_vec()));
        // no staging leftovers
        assert_eq!(
            fs.list_files(),
            vec!["a.fbx".to_string(), "a.glb".to_string()]
        );
    }

    #[test]
    fn force_overwrites_on_success() {
        let fs = fs_with_input();
        fs.write_file(Path::new("a.glb"), b"previous").unwrap();
        let runner = ScriptedRunner::new(&fs)
            .tool("fbx2gltf", Script::NoOutput)
            .tool("blender", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let request = request(&[Method::Fbx2gltf, Method::Blender])
            .with_options(ConversionOptions::new().force(true));
        let outcome = dispatcher.dispatch(&request);

        assert!(outcome.is_success());
        assert!(matches!(
            outcome.attempts[0].result,
            Err(MethodError::MissingOutput(_))
        ));
        assert_eq!(fs.get_file("a.glb"), Some(glb_bytes()));
    }

    #[test]
    fn timeout_is_recorded_and_next_method_runs() {
        let fs = fs_with_input();
        let runner = ScriptedRunner::new(&fs)
            .tool("fbx2gltf", Script::Timeout)
            .tool("blender", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let request = request(&[Method::Fbx2gltf, Method::Blender]).with_options(
            ConversionOptions::new().timeout(Some(Duration::from_secs(5))),
        );
        let outcome = dispatcher.dispatch(&request);

        assert!(outcome.is_success());
        assert!(matches!(
            outcome.attempts[0].result,
            Err(MethodError::Timeout(limit)) if limit == Duration::from_secs(5)
        ));
        let timed = &runner.invocations()[runner.invocations().len() - 2];
        assert_eq!(timed.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn missing_input() {
        let fs = MemoryFileSystem::new();
        let runner = ScriptedRunner::new(&fs).tool("fbx2gltf", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let outcome = dispatcher.dispatch(&request(&[Method::Fbx2gltf]));

        assert!(matches!(outcome.error, Some(ConvertError::InputNotFound(_))));
    }

    #[test]
    fn upgrade_unavailable_is_not_fatal() {
        let fs = fs_with_input();
        let runner = ScriptedRunner::new(&fs).tool("fbx2gltf", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let request = request(&[Method::Fbx2gltf])
            .with_options(ConversionOptions::new().upgrade_first(true));
        let outcome = dispatcher.dispatch(&request);

        assert!(outcome.is_success());
        let upgrade = outcome.upgrade.as_ref().unwrap();
        assert_eq!(upgrade.tool, None);
        assert!(matches!(upgrade.result, Err(MethodError::Unavailable(_))));
        assert_eq!(upgrade.version.unwrap().to_string(), "Binary FBX 7.4");
    }

    #[test]
    fn mandatory_upgrade_failure_stops_dispatch() {
        let fs = fs_with_input();
        let runner = ScriptedRunner::new(&fs).tool("fbx2gltf", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let request = request(&[Method::Fbx2gltf]).with_options(
            ConversionOptions::new()
                .upgrade_first(true)
                .upgrade_mandatory(true),
        );
        let outcome = dispatcher.dispatch(&request);

        assert!(matches!(
            outcome.error,
            Some(ConvertError::UpgradeFailed { .. })
        ));
        assert!(outcome.attempts.is_empty());
        assert!(runner.conversions().is_empty());
    }

    #[test]
    fn upgraded_file_feeds_the_attempts() {
        let fs = MemoryFileSystem::new();
        fs.write_file(Path::new("a.fbx"), &fbx_bytes_with_version(6100))
            .unwrap();
        let runner = ScriptedRunner::new(&fs)
            .tool("upgrade_fbx", Script::Succeed)
            .tool("fbx2gltf", Script::Succeed);
        let capabilities = Capabilities::detect(&ToolPaths::default(), &runner);
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let request = request(&[Method::Fbx2gltf])
            .with_options(ConversionOptions::new().upgrade_first(true));
        let outcome = dispatcher.dispatch(&request);

        assert!(outcome.is_success());
        let upgrade = outcome.upgrade.as_ref().unwrap();
        assert_eq!(upgrade.tool, Some("upgrade-tool"));
        assert!(upgrade.version.unwrap().needs_upgrade());

        let invocations = runner.invocations();
        let conversion = invocations.last().unwrap();
        let upgraded_input = conversion
            .args
            .iter()
            .position(|arg| arg == "--input")
            .map(|i| PathBuf::from(&conversion.args[i + 1]))
            .unwrap();
        assert_eq!(upgraded_input, PathBuf::from("/scratch/0/a.fbx"));
        // temporary upgrade output is removed again
        assert_eq!(
            fs.list_files(),
            vec!["a.fbx".to_string(), "a.glb".to_string()]
        );
    }

    #[test]
    fn undeletable_staging_file_is_partial_write() {
        struct StickyFileSystem(MemoryFileSystem);

        impl FileSystem for StickyFileSystem {
            fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
                self.0.read_file(path)
            }
            fn write_file(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
                self.0.write_file(path, data)
            }
            fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
                self.0.create_dir_all(path)
            }
            fn exists(&self, path: &Path) -> bool {
                self.0.exists(path)
            }
            fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
                self.0.rename(from, to)
            }
            fn remove_file(&self, _path: &Path) -> std::io::Result<()> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                ))
            }
            fn file_len(&self, path: &Path) -> std::io::Result<u64> {
                self.0.file_len(path)
            }
            fn scratch_dir(&self) -> std::io::Result<ScratchDir> {
                self.0.scratch_dir()
            }
        }

        let memory = fs_with_input();
        let fs = StickyFileSystem(memory.clone());
        let runner = ScriptedRunner::new(&memory)
            .tool("fbx2gltf", Script::WriteGarbage)
            .tool("blender", Script::Succeed);
        let capabilities = Capabilities::from_tools(
            Availability::found("fbx2gltf"),
            Availability::found("blender"),
            Availability::missing("not found on PATH"),
        );
        let dispatcher = Dispatcher::new(&capabilities, &runner, &fs);

        let outcome = dispatcher.dispatch(&request(&[Method::Fbx2gltf, Method::Blender]));

        assert!(matches!(
            outcome.error,
            Some(ConvertError::PartialWrite { .. })
        ));
        assert_eq!(statuses(&outcome), vec![(Method::Fbx2gltf, false)]);
        assert_eq!(runner.conversions(), vec!["fbx2gltf"]);
    }

    #[test]
    fn staging_path_sits_next_to_output() {
        assert_eq!(
            staging_path(Path::new("out/models/robot.glb"), Method::Blender),
            PathBuf::from("out/models/.robot.blender.partial.glb")
        );
    }
}
