use super::{RunContext, remove_scratch, run_tool};
use crate::error::MethodError;
use crate::process::Invocation;
use crate::request::ConversionOptions;
use std::path::{Path, PathBuf};

/// Facebook's `fbx2gltf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fbx2gltf {
    pub program: PathBuf,
    pub draco: bool,
    pub keep_attribute_info: bool,
    pub no_texture_optimization: bool,
}

impl Fbx2gltf {
    pub fn new(program: &Path, options: &ConversionOptions) -> Self {
        Self {
            program: program.to_path_buf(),
            draco: options.draco,
            keep_attribute_info: options.keep_attribute_info,
            no_texture_optimization: options.no_texture_optimization,
        }
    }

    /// fbx2gltf appends `.glb` to the `--output` it is given, so it gets the path without
    /// the extension. The output path stays the last argument.
    pub fn invocation(&self, input: &Path, output_base: &Path) -> Invocation {
        let mut invocation = Invocation::new(&self.program).arg("--binary");
        if self.draco {
            invocation = invocation.arg("--draco");
        }
        if self.keep_attribute_info {
            invocation = invocation.arg("--keep-attribute-info");
        }
        if self.no_texture_optimization {
            invocation = invocation.arg("--no-texture-optimization");
        }
        invocation
            .arg("--input")
            .arg(input)
            .arg("--output")
            .arg(output_base)
    }

    pub fn convert(&self, input: &Path, output: &Path, ctx: &RunContext) -> Result<(), MethodError> {
        let base = output.with_extension("");
        let result = run_tool(ctx, self.invocation(input, &base));
        if let Err(error) = result {
            remove_scratch(ctx.fs, &base);
            return Err(error);
        }
        // older builds write exactly the path they were given
        if !ctx.fs.exists(output) && ctx.fs.exists(&base) {
            ctx.fs.rename(&base, output)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::{FileSystem, MemoryFileSystem};
    use crate::testing::{Script, ScriptedRunner};
    use pretty_assertions::assert_eq;
    use std::ffi::OsString;

    #[test]
    fn command_line() {
        let options = ConversionOptions::new().draco(true).keep_attribute_info(true);
        let backend = Fbx2gltf::new(Path::new("fbx2gltf"), &options);
        let invocation = backend.invocation(Path::new("a.fbx"), Path::new(".a.partial"));
        let args: Vec<OsString> = [
            "--binary",
            "--draco",
            "--keep-attribute-info",
            "--input",
            "a.fbx",
            "--output",
            ".a.partial",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        assert_eq!(invocation.args, args);
    }

    #[test]
    fn output_without_extension_is_renamed() {
        let fs = MemoryFileSystem::new();
        let runner = ScriptedRunner::new(&fs).tool("fbx2gltf", Script::Succeed);
        let ctx = RunContext {
            runner: &runner,
            fs: &fs,
            timeout: None,
            echo: false,
        };
        let backend = Fbx2gltf::new(Path::new("fbx2gltf"), &ConversionOptions::default());
        backend
            .convert(Path::new("a.fbx"), Path::new("out/.a.partial.glb"), &ctx)
            .unwrap();
        assert_eq!(fs.list_files(), vec!["out/.a.partial.glb".to_string()]);
    }

    #[test]
    fn failure_removes_stray_output() {
        let fs = MemoryFileSystem::new();
        let runner = ScriptedRunner::new(&fs).tool("fbx2gltf", Script::PartialThenFail);
        let ctx = RunContext {
            runner: &runner,
            fs: &fs,
            timeout: None,
            echo: false,
        };
        let backend = Fbx2gltf::new(Path::new("fbx2gltf"), &ConversionOptions::default());
        let error = backend
            .convert(Path::new("a.fbx"), Path::new("a.partial.glb"), &ctx)
            .unwrap_err();
        assert_eq!(error.to_string(), "exited with code 1: crashed while writing");
        assert!(!fs.exists(Path::new("a.partial")));
    }
}
