//! intropack build core
//!
//! Prepares a demo's shader program for inclusion in a size-coded
//! executable. A shader provider parses the authored source into sections
//! and a variable list; the resolver folds constants into the text and
//! eliminates everything unreachable; the packer collapses the surviving
//! uniforms into one dense array per type; the minifier bridge round-trips
//! the result through the external identifier minifier and re-attaches the
//! shortened names to their semantic slots. Code generation then emits the
//! C++ data the engine compiles in.

use std::collections::BTreeMap;
use tracing::info;

pub mod codegen;
pub mod config;
pub mod error;
pub mod hooks;
pub mod minify;
pub mod packer;
pub mod providers;
pub mod resolver;
pub mod rewrite;
pub mod variables;

pub use error::BuildError;

use config::Config;
use minify::MinifyTool;
use providers::ShaderProvider;
use variables::{ShaderDefinition, VariableKind};

/// Runs the shader preparation pipeline for one build.
///
/// Seeds the resolution constants from the configuration, lets `provider`
/// populate the definition, resolves and packs it, round-trips it through
/// `minifier` when one is configured, and finalizes the declarations the
/// shader compiles with. The stages run strictly in sequence; the first
/// error aborts the build.
///
/// # Errors
/// Any [`BuildError`] from the provider, the resolver or the minifier
/// bridge, plus [`BuildError::MalformedShader`] when the source defines no
/// pass at all.
pub fn build_shader(config: &Config, provider: &dyn ShaderProvider, minifier: Option<&dyn MinifyTool>) -> Result<ShaderDefinition, BuildError> {
    let mut definition = ShaderDefinition::default();
    seed_resolution_constants(config, &mut definition);

    provider.provide(&mut definition)?;
    if definition.passes.is_empty() {
        return Err(BuildError::MalformedShader("shader should define at least one pass".to_string()));
    }

    resolver::resolve(&mut definition)?;
    packer::pack_uniforms(&mut definition);

    if let Some(tool) = minifier {
        minify::minify(&mut definition, tool, &config.paths.build)?;
    }

    finalize(&mut definition);
    info!(
        "shader prepared: {} variables kept, {} uniform arrays, {} passes",
        definition.variables.iter().filter(|variable| variable.active).count(),
        definition.uniform_arrays.len(),
        definition.passes.len()
    );
    Ok(definition)
}

/// Seeds `resolutionWidth`/`resolutionHeight` constants when the demo
/// renders at a fixed resolution; capture mode takes precedence over the
/// configured display resolution.
fn seed_resolution_constants(config: &Config, definition: &mut ShaderDefinition) {
    let resolution = match &config.capture {
        Some(capture) => Some((capture.width, capture.height)),
        None => config.demo.resolution.fixed(),
    };
    if let Some((width, height)) = resolution {
        definition.push_const("float", "resolutionWidth", &width.to_string());
        definition.push_const("float", "resolutionHeight", &height.to_string());
    }
}

/// Rebuilds the declaration prefix of the common code from the surviving
/// variables: the uniform arrays first, then the non-uniform globals grouped
/// by type, all under their minified names when minification ran. The
/// prolog becomes the bare `#version` line when the source carried one.
fn finalize(definition: &mut ShaderDefinition) {
    let array_renames: Vec<(String, String)> = definition
        .uniform_arrays
        .values()
        .filter_map(|array| array.minified_name.as_ref().map(|minified| (array.name.clone(), minified.clone())))
        .collect();

    let mut globals_by_type: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for variable in &definition.variables {
        if !variable.active || matches!(variable.kind, VariableKind::Uniform) {
            continue;
        }
        let mut declarator = variable.minified_name.clone().unwrap_or_else(|| variable.name.clone());
        if let VariableKind::Const { value } = &variable.kind {
            // A surviving const value may reference a packed uniform array;
            // keep it consistent with the minified declarations around it.
            let mut value = value.clone();
            for (original, minified) in &array_renames {
                value = rewrite::replace_word(&value, original, minified);
            }
            declarator.push_str(&format!(" = {value}"));
        }
        globals_by_type.entry(variable.ty.clone()).or_default().push(declarator);
    }

    if let Some(version) = &definition.glsl_version {
        definition.prolog_code = Some(format!("#version {version}\n"));
    }

    let mut declarations = String::new();
    for (ty, array) in &definition.uniform_arrays {
        declarations.push_str(&format!(
            "uniform {ty} {}[{}];",
            array.minified_name.as_deref().unwrap_or(&array.name),
            array.members.len()
        ));
    }
    for (ty, declarators) in &globals_by_type {
        declarations.push_str(&format!("{ty} {};", declarators.join(",")));
    }
    definition.common_code = format!("{declarations}{}", definition.common_code);
}
