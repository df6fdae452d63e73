use super::{RunContext, remove_scratch, run_tool};
use crate::error::MethodError;
use crate::process::Invocation;
use crate::request::ConversionOptions;
use std::path::{Path, PathBuf};

/// Blender in background mode.
///
/// The Python script is written to a private scratch directory for every run. Paths are passed after
/// `--` so they never have to be quoted into the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blender {
    pub program: PathBuf,
    pub fix_axis: bool,
    pub export_yup: bool,
    pub preserve_animations: bool,
    pub optimize_meshes: bool,
}

const SCRIPT_PRELUDE: &str = r#"import sys

import bpy

argv = sys.argv[sys.argv.index("--") + 1:]
input_path, output_path = argv[0], argv[1]

bpy.ops.wm.read_factory_settings(use_empty=True)
"#;

impl Blender {
    pub fn new(program: &Path, options: &ConversionOptions) -> Self {
        Self {
            program: program.to_path_buf(),
            fix_axis: options.fix_axis,
            export_yup: options.export_yup,
            preserve_animations: options.preserve_animations,
            optimize_meshes: options.optimize_meshes,
        }
    }

    /// Imports the FBX file and exports everything as GLB.
    pub fn conversion_script(&self) -> String {
        let mut script = String::from(SCRIPT_PRELUDE);
        script.push_str(&format!(
            r#"
import_args = dict(
    filepath=input_path,
    use_custom_props=True,
    use_custom_props_enum_as_string=True,
    use_anim={animations},
    use_image_search=True,
)
if {fix_axis}:
    import_args.update(use_manual_orientation=True, axis_forward="-Z", axis_up="Y")
bpy.ops.import_scene.fbx(**import_args)

bpy.ops.export_scene.gltf(
    filepath=output_path,
    export_format="GLB",
    export_animations={animations},
    export_texcoords=True,
    export_normals=True,
    export_materials="EXPORT",
    export_cameras=True,
    export_yup={yup},
    export_apply={apply},
)
print("Conversion completed successfully")
"#,
            animations = py_bool(self.preserve_animations),
            fix_axis = py_bool(self.fix_axis),
            yup = py_bool(self.export_yup),
            apply = py_bool(self.optimize_meshes),
        ));
        script
    }

    /// Imports with minimal settings and writes the scene back as a current FBX version.
    pub fn resave_script(&self) -> String {
        let mut script = String::from(SCRIPT_PRELUDE);
        script.push_str(
            r#"
bpy.ops.import_scene.fbx(
    filepath=input_path,
    use_custom_props=False,
    use_anim=False,
    use_image_search=False,
)
bpy.ops.export_scene.fbx(
    filepath=output_path,
    use_selection=False,
    apply_scale_options="FBX_SCALE_ALL",
    object_types={"MESH", "ARMATURE", "EMPTY", "CAMERA", "LIGHT"},
    add_leaf_bones=False,
    bake_anim=True,
    bake_anim_use_all_actions=True,
    embed_textures=False,
)
print("FBX upgrade completed successfully")
"#,
        );
        script
    }

    pub fn invocation(&self, script: &Path, input: &Path, output: &Path) -> Invocation {
        Invocation::new(&self.program)
            .args(["--background", "--python-exit-code", "1", "--python"])
            .arg(script)
            .arg("--")
            .arg(input)
            .arg(output)
    }

    pub fn convert(&self, input: &Path, output: &Path, ctx: &RunContext) -> Result<(), MethodError> {
        self.run_script(&self.conversion_script(), input, output, ctx)
    }

    pub fn resave(&self, input: &Path, output: &Path, ctx: &RunContext) -> Result<(), MethodError> {
        self.run_script(&self.resave_script(), input, output, ctx)?;
        if !ctx.fs.exists(output) {
            return Err(MethodError::MissingOutput(output.to_path_buf()));
        }
        Ok(())
    }

    fn run_script(
        &self,
        script: &str,
        input: &Path,
        output: &Path,
        ctx: &RunContext,
    ) -> Result<(), MethodError> {
        let scratch = ctx.fs.scratch_dir()?;
        let script_path = scratch.join("fbx2glb.py");
        ctx.fs.write_file(&script_path, script.as_bytes())?;
        let result = run_tool(ctx, self.invocation(&script_path, input, output));
        remove_scratch(ctx.fs, &script_path);
        result.map(|_| ())
    }
}

fn py_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}
