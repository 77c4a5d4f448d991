//! Shader providers
//!
//! A provider reads the demo's authored shader source and populates the
//! definition with its section texts, passes, and the initial variable list.
//! Which provider runs is a configuration choice; everything downstream of
//! the provider is format-agnostic.

mod simple;
mod synthclipse;

pub use simple::SimpleShaderProvider;
pub use synthclipse::SynthclipseShaderProvider;

use regex::Regex;

use crate::config::Config;
use crate::error::BuildError;
use crate::variables::{ShaderDefinition, Variable};

/// Populates an empty definition from an authored shader source.
pub trait ShaderProvider {
    /// Fills in section texts, passes and the initial variable list.
    ///
    /// # Errors
    /// I/O errors reading the source, [`BuildError::MissingMagicMarker`] for
    /// a source without its required structure, and
    /// [`BuildError::MalformedShader`] for declarations that cannot be
    /// accepted.
    fn provide(&self, definition: &mut ShaderDefinition) -> Result<(), BuildError>;
}

/// Instantiates the provider selected by `demo.shader-provider.tool`.
pub fn from_config(config: &Config) -> Result<Box<dyn ShaderProvider + '_>, BuildError> {
    match config.demo.shader_provider.tool.as_str() {
        "simple" => Ok(Box::new(SimpleShaderProvider::new(config))),
        "synthclipse" => Ok(Box::new(SynthclipseShaderProvider::new(config))),
        other => Err(BuildError::Config(format!("demo.shader-provider.tool {other:?} is not valid"))),
    }
}

/// Captures the `#version` directive, when the source carries one.
pub(crate) fn parse_glsl_version(contents: &str) -> Option<String> {
    let version = Regex::new(r"(?m)^#version (.+?)\r?$").unwrap();
    version.captures(contents).map(|captures| captures[1].trim().to_string())
}

/// Parses global declarations out of `code` into the variable list.
///
/// Recognized forms are `const type name = value;`, `uniform type name;` and
/// `type name;`, each optionally followed by a `//! key:value ...`
/// annotation comment. `precision` statements are skipped. A value on a
/// non-const declaration, or a const without one, is fatal.
pub(crate) fn parse_global_declarations(definition: &mut ShaderDefinition, code: &str) -> Result<(), BuildError> {
    let declaration =
        Regex::new(r"(?m)(?:(const|precision|uniform)\s+)?(\w+)\s+(\w+)\s*(?:=\s*([^;]+))?;(?:[ \t]*//!(.+))?\r?$").unwrap();
    // `-` is allowed so that flags like `no-replace` parse as one key.
    let annotation = Regex::new(r"([\w-]+)(?::([\w-]+))?").unwrap();

    for captures in declaration.captures_iter(code) {
        let qualifier = captures.get(1).map(|m| m.as_str());
        if qualifier == Some("precision") {
            continue;
        }
        let ty = &captures[2];
        let name = &captures[3];
        let value = captures.get(4).map(|m| m.as_str().trim());

        let mut variable = match (qualifier, value) {
            (Some("const"), Some(value)) => Variable::constant(ty, name, value),
            (Some("uniform"), None) => Variable::uniform(ty, name),
            (None, None) => Variable::regular(ty, name),
            _ => {
                return Err(BuildError::MalformedShader(format!("variable {name:?} has a value and is not const")));
            }
        };

        if let Some(annotations) = captures.get(5) {
            for entry in annotation.captures_iter(annotations.as_str()) {
                let value = entry.get(2).map_or_else(|| "true".to_string(), |m| m.as_str().to_string());
                variable.annotations.insert(entry[1].to_string(), value);
            }
        }

        definition.variables.push(variable);
    }
    Ok(())
}
