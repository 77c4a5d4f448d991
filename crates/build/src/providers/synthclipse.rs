//! Synthclipse shader sources
//!
//! Synthclipse `.stoy` sources carry their global declarations above a
//! `// START` marker and reference a preset file for tuned constants. The
//! provider turns the selected preset into const variables, maps the
//! editor's `synth_Resolution` onto the build's resolution variables, and
//! emits the part below the marker as the single fragment pass.

use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::config::Config;
use crate::error::BuildError;
use crate::variables::{Pass, ShaderDefinition, VariableKind};

use super::{ShaderProvider, parse_global_declarations, parse_glsl_version};

/// Provider for Synthclipse `.stoy` sources.
pub struct SynthclipseShaderProvider<'a> {
    config: &'a Config,
}

impl<'a> SynthclipseShaderProvider<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Loads the constants of the configured preset into the variable list.
    /// A missing preset file or preset name is only warned about; the shader
    /// may not use tuned constants at all.
    fn load_preset_constants(&self, definition: &mut ShaderDefinition, contents: &str, directory: &Path) -> Result<(), BuildError> {
        let preset_file = Regex::new(r#"//!\s+<preset\s+file="(.+?)"\s*/>"#).unwrap();
        let Some(captures) = preset_file.captures(contents) else {
            warn!("shader does not have any preset file");
            return Ok(());
        };
        let preset_contents = fs::read_to_string(directory.join(&captures[1]))?;

        let preset_block = Regex::new(r#"(?s)/\*!(.*?<preset\s+name="(\w+?)".*?)\*/"#).unwrap();
        let constant = Regex::new(r"(?m)^\s*(\w+) = <.*?> (.*?)\r?$").unwrap();

        let mut preset_found = false;
        for block in preset_block.captures_iter(&preset_contents) {
            if &block[2] != self.config.demo.shader_provider.constants_preset {
                continue;
            }
            preset_found = true;

            for entry in constant.captures_iter(block.get(1).unwrap().as_str()) {
                let name = &entry[1];
                let components: Vec<&str> = entry[2].split(", ").collect();
                match components.len() {
                    1 => definition.push_const("float", name, components[0]),
                    2..=4 => {
                        let ty = format!("vec{}", components.len());
                        let value = format!("{ty}({})", components.join(", "));
                        definition.push_const(&ty, name, &value);
                    }
                    _ => {}
                }
            }
        }
        if !preset_found {
            warn!("preset {:?} was not found", self.config.demo.shader_provider.constants_preset);
        }
        Ok(())
    }
}

impl ShaderProvider for SynthclipseShaderProvider<'_> {
    fn provide(&self, definition: &mut ShaderDefinition) -> Result<(), BuildError> {
        let directory = &self.config.directory;
        let contents = fs::read_to_string(directory.join(&self.config.demo.shader_provider.filename))?;

        definition.glsl_version = parse_glsl_version(&contents);

        self.load_preset_constants(definition, &contents, directory)?;

        let start = Regex::new(r"(?s)^(.+?)//[ \t]*START(.+)$").unwrap();
        let Some(split) = start.captures(&contents) else {
            return Err(BuildError::MissingMagicMarker("// START"));
        };
        let prolog = split.get(1).unwrap().as_str();
        let body = split.get(2).unwrap().as_str();

        // A fixed resolution folds to integer literals from the config; the
        // trailing dot turns them into the float literals shader code needs.
        let resolution_suffix = if self.config.force_resolution() { "." } else { "" };
        let fragment = strip_synthclipse_only(body)
            .replace("synth_Resolution.x", &format!("resolutionWidth{resolution_suffix}"))
            .replace("synth_Resolution.y", &format!("resolutionHeight{resolution_suffix}"));
        definition.passes.push(Pass {
            vertex_code: None,
            fragment_code: Some(fragment),
        });

        parse_global_declarations(definition, prolog)?;

        // The editor's resolution vector becomes a const over the build's
        // resolution variables and moves to the front of the list, so it
        // folds before anything that references it.
        if let Some(position) = definition.variables.iter().position(|variable| variable.name == "synth_Resolution") {
            let mut variable = definition.variables.remove(position);
            variable.kind = VariableKind::Const {
                value: "vec2(resolutionWidth, resolutionHeight)".to_string(),
            };
            definition.variables.insert(0, variable);

            if !self.config.force_resolution() {
                definition.push_uniform("float", "resolutionWidth");
                definition.push_uniform("float", "resolutionHeight");
            }
        }

        Ok(())
    }
}

/// Resolves `SYNTHCLIPSE_ONLY` conditionals: editor-only code is removed,
/// build-side branches are kept.
fn strip_synthclipse_only(code: &str) -> String {
    let only = Regex::new(r"(?s)#ifdef\s+SYNTHCLIPSE_ONLY.*?(?:#else(.*?))?#endif").unwrap();
    let not_only = Regex::new(r"(?s)#ifndef\s+SYNTHCLIPSE_ONLY(.*?)(?:#else.*?)?#endif").unwrap();

    let code = only.replace_all(code, "$1");
    not_only.replace_all(&code, "$1").into_owned()
}
