//! Pragma-sectioned shader sources
//!
//! The simple provider reads a single `.frag` file whose sections are
//! delimited by `#pragma` markers: `attributes`, `varyings`, `outputs`,
//! `common`, and `vertex <n>` / `fragment <n>` for the passes. Everything
//! before the first marker is the prolog, which is where the global variable
//! declarations live.

use regex::Regex;
use std::fs;

use crate::config::Config;
use crate::error::BuildError;
use crate::variables::ShaderDefinition;

use super::{ShaderProvider, parse_global_declarations, parse_glsl_version};

/// Provider for pragma-sectioned shader sources.
pub struct SimpleShaderProvider<'a> {
    config: &'a Config,
}

/// Where the text between two markers belongs.
enum Target {
    Prolog,
    Attributes,
    Common,
    Outputs,
    Varyings,
    Vertex(usize),
    Fragment(usize),
}

impl<'a> SimpleShaderProvider<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }
}

impl ShaderProvider for SimpleShaderProvider<'_> {
    fn provide(&self, definition: &mut ShaderDefinition) -> Result<(), BuildError> {
        let path = self.config.directory.join(&self.config.demo.shader_provider.filename);
        let contents = fs::read_to_string(&path)?;

        definition.glsl_version = parse_glsl_version(&contents);

        // The marker line is consumed including its newline; an unrecognized
        // pragma stays inside the section it appears in.
        let marker = Regex::new(r"(?m)^#pragma[ \t]+(.+?)[ \t]*\r?(?:\n|\z)").unwrap();

        let mut prolog = String::new();
        let mut current = Target::Prolog;
        let mut start = 0;
        for captures in marker.captures_iter(&contents) {
            let Some(target) = parse_target(captures.get(1).unwrap().as_str()) else {
                continue;
            };
            let whole = captures.get(0).unwrap();
            store(definition, &mut prolog, &current, clean_section(&contents[start..whole.start()]));
            start = whole.end();
            current = target;
        }
        store(definition, &mut prolog, &current, clean_section(&contents[start..]));

        parse_global_declarations(definition, &prolog)
    }
}

fn parse_target(directive: &str) -> Option<Target> {
    match directive {
        "attributes" => Some(Target::Attributes),
        "common" => Some(Target::Common),
        "outputs" => Some(Target::Outputs),
        "varyings" => Some(Target::Varyings),
        _ => {
            if let Some(index) = directive.strip_prefix("vertex ") {
                index.trim().parse().ok().map(Target::Vertex)
            } else if let Some(index) = directive.strip_prefix("fragment ") {
                index.trim().parse().ok().map(Target::Fragment)
            } else {
                None
            }
        }
    }
}

fn store(definition: &mut ShaderDefinition, prolog: &mut String, target: &Target, code: String) {
    match target {
        Target::Prolog => *prolog = code,
        Target::Attributes => definition.attributes_code = Some(code),
        Target::Common => definition.common_code = code,
        Target::Outputs => definition.outputs_code = Some(code),
        Target::Varyings => definition.varyings_code = Some(code),
        Target::Vertex(index) => definition.ensure_pass(*index).vertex_code = Some(code),
        Target::Fragment(index) => definition.ensure_pass(*index).fragment_code = Some(code),
    }
}

/// Resolves `BUILD_ONLY` conditionals for the build and normalizes the
/// `void main<suffix>()` entry points editors need for standalone preview.
fn clean_section(code: &str) -> String {
    let build_only = Regex::new(r"(?s)#ifdef\s+BUILD_ONLY(.*?)(?:#else.*?)?#endif").unwrap();
    let not_build_only = Regex::new(r"(?s)#ifndef\s+BUILD_ONLY.*?(?:#else(.*?))?#endif").unwrap();
    let main_suffix = Regex::new(r"void main\w+\(\)").unwrap();

    let code = build_only.replace_all(code, "$1");
    let code = not_build_only.replace_all(&code, "$1");
    main_suffix.replace_all(&code, "void main()").into_owned()
}
