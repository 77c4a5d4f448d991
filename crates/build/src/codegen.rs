//! Generated source emission
//!
//! Turns the finalized shader definition into the C++ sources the demo
//! executable is compiled from: a data header carrying the uniform array
//! macros and the escaped shader strings, and the main source produced by
//! expanding hook tokens in the engine template.

use regex::Regex;
use std::fmt::Write;

use crate::config::Config;
use crate::error::BuildError;
use crate::hooks::{self, Hooks};
use crate::variables::ShaderDefinition;

/// Renders the `demo-data.hpp` header.
///
/// Per uniform array the header carries the (possibly minified) lookup name,
/// the element count, the static backing array and one `uniform<Name>` macro
/// per member slot, so host code addresses uniforms by semantic name while
/// paying for a single location lookup per type. Shader sections follow as
/// escaped string constants behind `HAS_*` guards, then the pass table and
/// the resolution, duration and hook switches.
pub fn demo_data_header(config: &Config, definition: &ShaderDefinition, hooks: &Hooks) -> String {
    let mut lines: Vec<String> = vec!["#pragma once".to_string(), String::new()];

    if config.debug {
        lines.push("#define DEBUG".to_string());
        lines.push(String::new());
    }

    let mut debug_locations = String::new();
    for (ty, array) in &definition.uniform_arrays {
        let ty_upper = ty.to_uppercase();
        let name_macro = format!("{ty_upper}_UNIFORM_NAME");
        let count_macro = format!("{ty_upper}_UNIFORM_COUNT");
        let array_name = format!("{ty}Uniforms");
        // Samplers are bound through integer texture units on the host side.
        let cpp_ty = if ty.starts_with("sampler") { "int" } else { ty.as_str() };

        lines.push(format!("#define {name_macro} \"{}\"", array.minified_name.as_deref().unwrap_or(&array.name)));
        lines.push(format!("#define {count_macro} {}", array.members.len()));
        lines.push(format!("static {cpp_ty} {array_name}[{count_macro}];"));

        for (slot, &member) in array.members.iter().enumerate() {
            let variable = &definition.variables[member];
            lines.push(format!("#define uniform{} {array_name}[{slot}]", uniform_macro_name(&variable.name)));
        }
        lines.push(String::new());

        let _ = writeln!(
            debug_locations,
            "std::cout << \"{ty}: \" << glGetUniformLocation(PROGRAM, {name_macro}) << std::endl; \\"
        );
    }
    lines.push("#define DEBUG_DISPLAY_UNIFORM_LOCATIONS(PROGRAM) \\".to_string());
    lines.push(debug_locations);

    let (vertex_specific, fragment_specific) = stage_declarations(definition);

    let mut prolog = definition.prolog_code.clone().unwrap_or_default();
    let mut common = definition.common_code.clone();
    // Without stage-specific declarations both stages compile from the same
    // strings, so the prolog can ride along in the common code.
    if !prolog.is_empty() && vertex_specific.is_empty() && fragment_specific.is_empty() {
        common = format!("{prolog}{common}");
        prolog.clear();
    }

    if !prolog.is_empty() {
        lines.push("#define HAS_SHADER_PROLOG_CODE".to_string());
        lines.push(format!("static const char *shaderPrologCode = \"{}\";", escape(&prolog)));
        lines.push(String::new());
    }
    if !vertex_specific.is_empty() {
        lines.push("#define HAS_SHADER_VERTEX_SPECIFIC_CODE".to_string());
        lines.push(format!("static const char *shaderVertexSpecificCode = \"{}\";", escape(&vertex_specific)));
        lines.push(String::new());
    }
    if !fragment_specific.is_empty() {
        lines.push("#define HAS_SHADER_FRAGMENT_SPECIFIC_CODE".to_string());
        lines.push(format!("static const char *shaderFragmentSpecificCode = \"{}\";", escape(&fragment_specific)));
        lines.push(String::new());
    }
    if !common.is_empty() {
        lines.push("#define HAS_SHADER_COMMON_CODE".to_string());
        lines.push(format!("static const char *shaderCommonCode = \"{}\";", escape(&common)));
        lines.push(String::new());
    }

    lines.push(format!("#define PASS_COUNT {}", definition.passes.len()));
    lines.push("static const char *shaderPassCodes[] = {".to_string());
    for (index, pass) in definition.passes.iter().enumerate() {
        match &pass.vertex_code {
            Some(code) => {
                lines.push(format!("#define HAS_SHADER_PASS_{index}_VERTEX_CODE"));
                lines.push(format!("\"{}\",", escape(code)));
            }
            None => lines.push("nullptr,".to_string()),
        }
        match &pass.fragment_code {
            Some(code) => {
                lines.push(format!("#define HAS_SHADER_PASS_{index}_FRAGMENT_CODE"));
                lines.push(format!("\"{}\",", escape(code)));
            }
            None => lines.push("nullptr,".to_string()),
        }
    }
    lines.push("};".to_string());
    lines.push(String::new());

    if let Some(capture) = &config.capture {
        lines.push("#define CAPTURE".to_string());
        lines.push(format!("#define CAPTURE_FPS {}", capture.fps));
        lines.push("#define FORCE_RESOLUTION".to_string());
        lines.push(format!("static const constexpr int resolutionWidth = {};", capture.width));
        lines.push(format!("static const constexpr int resolutionHeight = {};", capture.height));
    } else {
        lines.push("static void captureFrame() {}".to_string());

        if let Some((width, height)) = config.demo.resolution.fixed() {
            lines.push("#define FORCE_RESOLUTION".to_string());
            lines.push(format!("static const constexpr int resolutionWidth = {width};"));
            lines.push(format!("static const constexpr int resolutionHeight = {height};"));
        }
        if let Some(scale) = config.demo.resolution.scale {
            if scale > 0.0 && scale != 1.0 {
                lines.push(format!("#define SCALE_RESOLUTION {scale}"));
            }
        }
    }
    lines.push(String::new());

    if let Some(duration) = config.demo.duration {
        lines.push(format!("#define DURATION {duration}"));
        lines.push(String::new());
    }
    if config.demo.duration.is_some() || config.capture.is_some() || config.demo.close_when_finished {
        lines.push("#define CLOSE_WHEN_FINISHED".to_string());
        lines.push(String::new());
    }
    if config.demo.loading_black_screen {
        lines.push("#define LOADING_BLACK_SCREEN".to_string());
        lines.push(String::new());
    }

    for name in hooks.keys() {
        lines.push(format!("#define HAS_HOOK_{}", name.to_uppercase()));
    }

    lines.join("\n")
}

/// Renders the demo's main source by expanding the hook tokens in the engine
/// template.
///
/// # Errors
/// [`BuildError::CyclicHookReference`] when a hook chain references itself.
pub fn main_source(hooks: &Hooks, template: &str) -> Result<String, BuildError> {
    hooks::replace_hooks(hooks, template)
}

/// Derives the per-stage `in`/`out` declarations from the attributes,
/// varyings and outputs sections: attributes enter the vertex stage,
/// varyings leave it and enter the fragment stage, outputs leave the
/// fragment stage.
fn stage_declarations(definition: &ShaderDefinition) -> (String, String) {
    let stage_variable = Regex::new(r"\w+ [\w,]+;").unwrap();
    let mut vertex_specific = String::new();
    let mut fragment_specific = String::new();

    if let Some(code) = &definition.attributes_code {
        for declaration in stage_variable.find_iter(code) {
            vertex_specific.push_str(&format!("in {}", declaration.as_str()));
        }
    }
    if let Some(code) = &definition.varyings_code {
        for declaration in stage_variable.find_iter(code) {
            vertex_specific.push_str(&format!("out {}", declaration.as_str()));
            fragment_specific.push_str(&format!("in {}", declaration.as_str()));
        }
    }
    if let Some(code) = &definition.outputs_code {
        for declaration in stage_variable.find_iter(code) {
            fragment_specific.push_str(&format!("out {}", declaration.as_str()));
        }
    }

    (vertex_specific, fragment_specific)
}

/// Escapes shader text for embedding in a C++ string literal, the same way
/// the engine expects it: newlines become `\n`, carriage returns are
/// dropped, quotes are escaped.
fn escape(code: &str) -> String {
    code.replace('\n', "\\n").replace('\r', "").replace('"', "\\\"")
}

/// `camera_pos` → `CameraPos`-style macro suffix: the leading letter and
/// every letter after an underscore are uppercased, underscores dropped.
fn uniform_macro_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = true;
    for character in name.chars() {
        if character == '_' {
            uppercase_next = true;
        } else if uppercase_next {
            result.push(character.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(character);
        }
    }
    result
}
