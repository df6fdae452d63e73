//! React Three Fiber component stubs for converted models.
//!
//! The generated `.tsx` file loads the GLB with `useGLTF`, wires up `useAnimations` and
//! documents what was found in the model. Details come from the GLB itself when one is
//! available, otherwise from hints in the file name.

use crate::filesystem::FileSystem;
use log::{debug, info, warn};
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Directory the component goes to when no output path is given.
pub const DEFAULT_COMPONENT_DIR: &str = "src/components/models";

const MIXAMO_HINTS: [&str; 3] = ["mixamo", "xbot", "ybot"];
const ANIMATION_HINTS: [&str; 8] = [
    "idle", "walk", "run", "jump", "attack", "death", "dance", "samba",
];
const MIXAMO_NODE_PATTERNS: [&str; 4] = ["mixamo", "Hips", "Spine", "mixamorig"];
const ROOT_BONE_NAMES: [&str; 5] = ["Hips", "root", "Armature", "Bip01", "Root"];

static JS_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationInfo {
    pub name: String,
    /// Seconds.
    pub duration: f32,
}

/// What the component documentation says about the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub filename: String,
    pub animations: Vec<AnimationInfo>,
    pub has_skeleton: bool,
    pub node_count: usize,
    pub mesh_count: usize,
    pub bone_count: usize,
    pub is_mixamo: bool,
    pub root_bone: Option<String>,
}

impl ModelInfo {
    fn empty(filename: String) -> Self {
        Self {
            filename,
            animations: Vec::new(),
            has_skeleton: false,
            node_count: 0,
            mesh_count: 0,
            bone_count: 0,
            is_mixamo: false,
            root_bone: None,
        }
    }

    /// Guesses from the file name alone.
    pub fn from_file_name(path: &Path) -> Self {
        let filename = file_name(path);
        let lower = filename.to_lowercase();
        let mut info = ModelInfo::empty(filename);
        if MIXAMO_HINTS.iter().any(|hint| lower.contains(hint)) {
            info.is_mixamo = true;
            info.has_skeleton = true;
            info.bone_count = 1;
        }
        info.animations = ANIMATION_HINTS
            .iter()
            .filter(|hint| lower.contains(*hint))
            .map(|hint| AnimationInfo {
                name: capitalize(hint),
                duration: 1.0,
            })
            .collect();
        if info.animations.is_empty() {
            info.animations.push(AnimationInfo {
                name: "Animation".to_string(),
                duration: 1.0,
            });
        }
        info
    }

    /// Reads nodes, meshes, skins and animations from a `.glb` or `.gltf` document.
    pub fn from_gltf(path: &Path, data: &[u8]) -> Result<Self, gltf::Error> {
        let document = gltf::Gltf::from_slice(data)?;
        let mut info = ModelInfo::empty(file_name(path));
        info.node_count = document.nodes().count();
        info.mesh_count = document.meshes().count();
        info.bone_count = document.skins().map(|skin| skin.joints().count()).sum();
        info.has_skeleton = info.bone_count > 0;
        info.is_mixamo = document.nodes().any(|node| {
            node.name()
                .is_some_and(|name| MIXAMO_NODE_PATTERNS.iter().any(|p| name.contains(p)))
        });
        info.root_bone = root_bone(&document);
        info.animations = document
            .animations()
            .map(|animation| AnimationInfo {
                name: animation
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Animation{}", animation.index())),
                duration: animation_duration(&animation),
            })
            .collect();
        Ok(info)
    }
}

fn root_bone(document: &gltf::Gltf) -> Option<String> {
    let joint_names: Vec<String> = document
        .skins()
        .flat_map(|skin| skin.joints())
        .filter_map(|joint| joint.name().map(str::to_string))
        .collect();
    joint_names
        .iter()
        .find(|name| ROOT_BONE_NAMES.iter().any(|root| name.contains(root)))
        .or_else(|| joint_names.first())
        .cloned()
}

/// Latest keyframe time over all channels, taken from the accessor bounds.
fn animation_duration(animation: &gltf::Animation) -> f32 {
    animation
        .channels()
        .filter_map(|channel| {
            channel
                .sampler()
                .input()
                .max()
                .and_then(|max| max.as_array()?.first()?.as_f64())
        })
        .fold(0.0, f64::max) as f32
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Inspects the model, preferring an already converted `.glb` next to an `.fbx` input.
pub fn analyze_model(fs: &dyn FileSystem, input: &Path) -> ModelInfo {
    let is_fbx = input
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("fbx"));
    let gltf_source = if is_fbx {
        Some(input.with_extension("glb")).filter(|glb| fs.exists(glb))
    } else {
        Some(input.to_path_buf())
    };

    let info = gltf_source
        .and_then(|source| {
            let data = fs.read_file(&source).ok()?;
            match ModelInfo::from_gltf(&source, &data) {
                Ok(mut info) => {
                    info.filename = file_name(input);
                    Some(info)
                }
                Err(error) => {
                    warn!("Could not analyze {}: {error}", source.display());
                    None
                }
            }
        })
        .unwrap_or_else(|| ModelInfo::from_file_name(input));
    debug!("Model analysis: {info:?}");
    info
}

/// `walking-robot_v2.fbx` becomes `WalkingRobotV2Model`. Names that would start with a digit
/// get a `Model` prefix as well.
pub fn component_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    let mut name: String = cleaned.split_whitespace().map(capitalize).collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "Model");
    }
    name.push_str("Model");
    name
}

/// Whether `name` can be used as the exported function name.
pub fn is_valid_component_name(name: &str) -> bool {
    JS_IDENTIFIER.is_match(name)
}

/// The URL the component loads the model from.
///
/// Models inside the working directory keep their relative path, with a leading `public/`
/// dropped since that is where bundlers serve static files from. Anything else is expected
/// under `/models/`. FBX inputs point at the GLB that will be converted from them.
pub fn model_url(input: &Path, cwd: &Path) -> String {
    let absolute = if input.is_absolute() {
        input.to_path_buf()
    } else {
        cwd.join(input)
    };
    let url = match absolute.strip_prefix(cwd) {
        Ok(relative) => {
            let mut parts: Vec<String> = relative
                .components()
                .filter_map(|component| match component {
                    Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect();
            if parts.len() > 1 && parts[0] == "public" {
                parts.remove(0);
            }
            format!("/{}", parts.join("/"))
        }
        Err(_) => format!("/models/{}", file_name(input)),
    };
    replace_fbx_extension(url)
}

fn replace_fbx_extension(url: String) -> String {
    if url.to_lowercase().ends_with(".fbx") {
        format!("{}.glb", &url[..url.len() - 4])
    } else {
        url
    }
}

const TEMPLATE: &str = r#"import { useRef, useEffect, useState } from 'react';
import { useFrame, useThree } from '@react-three/fiber';
import { useGLTF, useAnimations } from '@react-three/drei';
import * as THREE from 'three';

/**
 * Component for the {{NAME}} 3D model
 * Generated by fbx2glb from {{FILENAME}}
 *
 * Animations: {{ANIMATION_LIST}}
 * {{SKELETON_INFO}}
 * Nodes: {{NODE_COUNT}}
 * Meshes: {{MESH_COUNT}}
 */
export function {{NAME}}({
  position = [0, 0, 0],
  rotation = [0, 0, 0],
  scale = [1, 1, 1],
  animation = {{DEFAULT_ANIMATION}},
  animationSpeed = 1.0,
  debug = false,
  ...props
}) {
  const group = useRef();
  const { scene, animations } = useGLTF({{MODEL_URL}});
  const { actions, names } = useAnimations(animations, group);
  const [currentAnimation, setCurrentAnimation] = useState(animation);

  // Handle animation changes
  useEffect(() => {
    if (!actions || Object.keys(actions).length === 0) return;

    // Stop any playing animations
    Object.values(actions).forEach(action => action?.stop());

    // If animation is defined and exists, play it
    if (currentAnimation && actions[currentAnimation]) {
      const action = actions[currentAnimation];
      action.reset().play();
      action.setEffectiveTimeScale(animationSpeed);

      if (debug) {
        console.log(`Playing animation: ${currentAnimation}`);
      }
    }

    return () => {
      // Cleanup animations on unmount
      Object.values(actions).forEach(action => action?.stop());
    };
  }, [actions, currentAnimation, animationSpeed, debug]);

  // Update animation speed when it changes
  useEffect(() => {
    if (!actions || !currentAnimation || !actions[currentAnimation]) return;
    actions[currentAnimation].setEffectiveTimeScale(animationSpeed);
  }, [animationSpeed, actions, currentAnimation]);

  // Change animation
  const setAnimation = (animName) => {
    if (animName && actions && actions[animName]) {
      setCurrentAnimation(animName);
    }
  };

  useEffect(() => {
    if (debug) {
      console.log('Model loaded:', scene);
      console.log('Available animations:', names);
      console.log('Animation actions:', actions);
    }
  }, [scene, animations, actions, names, debug]);

  return (
    <group ref={group} position={position} rotation={rotation} scale={scale} {...props}>
      <primitive object={scene} />
    </group>
  );
}

{{NAME}}.setAnimation = (group, animName) => {
  if (!group.current) return;
  const actions = group.current._currentActions;
  if (actions && actions[animName]) {
    Object.values(actions).forEach(action => action?.stop());
    actions[animName].reset().play();
  }
};

// List available animations
{{NAME}}.animations = [{{ANIMATION_NAMES}}];

// Preload the model
useGLTF.preload({{MODEL_URL}});
"#;

/// A single quoted JavaScript string literal.
fn js_string(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('\'');
    for c in value.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '\'' => literal.push_str("\\'"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\u{2028}' => literal.push_str("\\u2028"),
            '\u{2029}' => literal.push_str("\\u2029"),
            c => literal.push(c),
        }
    }
    literal.push('\'');
    literal
}

/// Text that goes inside the `/** */` block, which must not be closed early.
fn comment_text(value: &str) -> String {
    value.replace("*/", "* /").replace(['\n', '\r'], " ")
}

/// Fills in the component template. `name` has to be a valid identifier, see
/// [`is_valid_component_name`].
pub fn render_component(name: &str, model_url: &str, info: &ModelInfo) -> String {
    let names: Vec<String> = info
        .animations
        .iter()
        .map(|animation| js_string(&animation.name))
        .collect();
    let animation_list = if names.is_empty() {
        "None".to_string()
    } else {
        names.join(", ")
    };
    let default_animation = names
        .first()
        .cloned()
        .unwrap_or_else(|| "undefined".to_string());
    let mut skeleton_info = if info.has_skeleton {
        match info.bone_count {
            1 => "Has skeleton (1 bone)".to_string(),
            bones => format!("Has skeleton ({bones} bones)"),
        }
    } else {
        "No skeleton".to_string()
    };
    if let Some(root_bone) = &info.root_bone {
        skeleton_info.push_str(&format!(", root bone: '{root_bone}'"));
    }

    TEMPLATE
        .replace("{{NAME}}", name)
        .replace("{{FILENAME}}", &comment_text(&info.filename))
        .replace("{{ANIMATION_LIST}}", &comment_text(&animation_list))
        .replace("{{SKELETON_INFO}}", &comment_text(&skeleton_info))
        .replace("{{NODE_COUNT}}", &info.node_count.to_string())
        .replace("{{MESH_COUNT}}", &info.mesh_count.to_string())
        .replace("{{DEFAULT_ANIMATION}}", &default_animation)
        .replace("{{ANIMATION_NAMES}}", &names.join(", "))
        .replace("{{MODEL_URL}}", &js_string(model_url))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentOptions {
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub force: bool,
}

#[derive(Debug)]
pub enum ComponentError {
    InputNotFound(PathBuf),
    AlreadyExists(PathBuf),
    InvalidName(String),
    Io(io::Error),
}

impl Display for ComponentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentError::InputNotFound(path) => {
                write!(f, "input file '{}' does not exist", path.display())
            }
            ComponentError::AlreadyExists(path) => write!(
                f,
                "output file '{}' already exists, use --force to overwrite",
                path.display()
            ),
            ComponentError::InvalidName(name) => write!(
                f,
                "'{name}' is not a valid component name, use letters, digits, '_' or '$' and do not start with a digit"
            ),
            ComponentError::Io(error) => write!(f, "IO error: {error}"),
        }
    }
}

impl Error for ComponentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ComponentError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for ComponentError {
    fn from(error: io::Error) -> Self {
        ComponentError::Io(error)
    }
}

/// Writes a component for `input` and returns where it was written.
pub fn generate_component(
    fs: &dyn FileSystem,
    input: &Path,
    cwd: &Path,
    options: &ComponentOptions,
) -> Result<PathBuf, ComponentError> {
    if !fs.exists(input) {
        return Err(ComponentError::InputNotFound(input.to_path_buf()));
    }
    let info = analyze_model(fs, input);
    let name = options
        .name
        .clone()
        .unwrap_or_else(|| component_name(input));
    if !is_valid_component_name(&name) {
        return Err(ComponentError::InvalidName(name));
    }
    let output = options.output.clone().unwrap_or_else(|| {
        cwd.join(DEFAULT_COMPONENT_DIR)
            .join(format!("{}.tsx", sanitize_filename::sanitize(&name)))
    });
    if fs.exists(&output) && !options.force {
        return Err(ComponentError::AlreadyExists(output));
    }
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs.create_dir_all(parent)?;
        }
    }

    let code = render_component(&name, &model_url(input, cwd), &info);
    fs.write_file(&output, code.as_bytes())?;
    info!("Component '{name}' generated successfully: {}", output.display());
    Ok(output)
}
