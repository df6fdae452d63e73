use crate::method::Method;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which methods to try, and in which order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MethodOrder {
    /// [`Method::DEFAULT_ORDER`]: FBX SDK, then fbx2gltf, then Blender.
    #[default]
    Auto,
    Explicit(Vec<Method>),
}

impl MethodOrder {
    /// The concrete order, with repeated methods dropped after their first occurrence.
    pub fn resolve(&self) -> Vec<Method> {
        let requested: &[Method] = match self {
            MethodOrder::Auto => &Method::DEFAULT_ORDER,
            MethodOrder::Explicit(methods) => methods,
        };
        let mut order = Vec::with_capacity(requested.len());
        for method in requested {
            if !order.contains(method) {
                order.push(*method);
            }
        }
        order
    }
}

/// Flags that change how a file is converted.
///
/// Use [`ConversionOptions::new`] and chain the setters:
///
/// ```
/// use fbx2glb::request::ConversionOptions;
///
/// let options = ConversionOptions::new().force(true).fix_axis(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    pub(crate) force: bool,
    pub(crate) verbose: bool,
    pub(crate) fix_axis: bool,
    pub(crate) export_yup: bool,
    pub(crate) upgrade_first: bool,
    pub(crate) upgrade_mandatory: bool,
    pub(crate) preserve_animations: bool,
    pub(crate) optimize_meshes: bool,
    pub(crate) draco: bool,
    pub(crate) keep_attribute_info: bool,
    pub(crate) no_texture_optimization: bool,
    pub(crate) timeout: Option<Duration>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            force: false,
            verbose: false,
            fix_axis: false,
            export_yup: true,
            upgrade_first: false,
            upgrade_mandatory: false,
            preserve_animations: true,
            optimize_meshes: true,
            draco: false,
            keep_attribute_info: false,
            no_texture_optimization: false,
            timeout: None,
        }
    }
}

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite an existing output file. Default: `false`
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Let the external tools print to the terminal instead of capturing their output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Reorient the model so that it faces up (Blender only). Default: `false`
    pub fn fix_axis(mut self, fix_axis: bool) -> Self {
        self.fix_axis = fix_axis;
        self
    }

    /// Export with Y pointing up (Blender only). Default: `true`
    pub fn export_yup(mut self, export_yup: bool) -> Self {
        self.export_yup = export_yup;
        self
    }

    /// Re-save the FBX file with a newer SDK before converting. Default: `false`
    pub fn upgrade_first(mut self, upgrade_first: bool) -> Self {
        self.upgrade_first = upgrade_first;
        self
    }

    /// Fail the request when the upgrade step fails instead of converting the original file.
    pub fn upgrade_mandatory(mut self, upgrade_mandatory: bool) -> Self {
        self.upgrade_mandatory = upgrade_mandatory;
        self
    }

    pub fn preserve_animations(mut self, preserve_animations: bool) -> Self {
        self.preserve_animations = preserve_animations;
        self
    }

    pub fn optimize_meshes(mut self, optimize_meshes: bool) -> Self {
        self.optimize_meshes = optimize_meshes;
        self
    }

    /// Draco mesh compression (fbx2gltf only).
    pub fn draco(mut self, draco: bool) -> Self {
        self.draco = draco;
        self
    }

    pub fn keep_attribute_info(mut self, keep_attribute_info: bool) -> Self {
        self.keep_attribute_info = keep_attribute_info;
        self
    }

    pub fn no_texture_optimization(mut self, no_texture_optimization: bool) -> Self {
        self.no_texture_optimization = no_texture_optimization;
        self
    }

    /// Kill any single external tool run that takes longer than this.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_force(&self) -> bool {
        self.force
    }
}

/// One file to convert. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    input: PathBuf,
    output: PathBuf,
    methods: MethodOrder,
    options: ConversionOptions,
}

impl ConversionRequest {
    /// A request writing next to the input, with the extension replaced by `.glb`.
    pub fn new<P: Into<PathBuf>>(input: P) -> Self {
        let input = input.into();
        let output = input.with_extension("glb");
        Self {
            input,
            output,
            methods: MethodOrder::Auto,
            options: ConversionOptions::default(),
        }
    }

    pub fn with_output<P: Into<PathBuf>>(mut self, output: P) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_methods(mut self, methods: MethodOrder) -> Self {
        self.methods = methods;
        self
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn methods(&self) -> &MethodOrder {
        &self.methods
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }
}
