//! Minifier bridge
//!
//! Delegates identifier shortening to the external minifier executable and
//! recovers, after the fact, which shortened identifier corresponds to which
//! semantic slot. The resolved shader is serialized into one composite
//! document whose sections are delimited by a separator marker the tool
//! passes through verbatim; the renamed output is split on the same marker
//! and mapped back onto the definition strictly by position. The whole
//! exchange depends on a 1:1 segment correspondence; any structural
//! mismatch aborts the build before a single field is mutated.

use regex::Regex;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use crate::error::BuildError;
use crate::rewrite;
use crate::variables::{ShaderDefinition, VariableKind};

/// Marker line the minifier is configured to pass through verbatim.
const SEPARATOR: &str = "#pragma separator";

/// Abstraction over the external minifier executable, so tests can stand in
/// a stub that writes a prepared output document.
pub trait MinifyTool {
    /// Minifies `input` into `output`.
    ///
    /// The tool must preserve `#pragma` comment markers verbatim and rename
    /// every top-level declared identifier exactly once, in declaration
    /// order.
    ///
    /// # Errors
    /// [`BuildError::ToolFailed`] when the tool exits unsuccessfully, or an
    /// I/O error from spawning it.
    fn run(&self, input: &Path, output: &Path) -> Result<(), BuildError>;
}

/// Invokes the Shader Minifier executable, through mono off Windows.
pub struct ShaderMinifierTool {
    /// Path to the minifier executable.
    pub executable: PathBuf,
    /// Mono runtime used to host the executable on non-Windows platforms.
    pub mono: Option<PathBuf>,
}

impl MinifyTool for ShaderMinifierTool {
    fn run(&self, input: &Path, output: &Path) -> Result<(), BuildError> {
        let mut command = match &self.mono {
            Some(mono) => {
                let mut command = Command::new(mono);
                command.arg(&self.executable);
                command
            }
            None => Command::new(&self.executable),
        };
        command
            .arg("--format")
            .arg("none")
            .arg("--field-names")
            .arg("none")
            .arg("-o")
            .arg(output)
            .arg("--")
            .arg(input);

        info!("running shader minifier: {command:?}");
        let status = command.status()?;
        if !status.success() {
            return Err(BuildError::ToolFailed {
                tool: self.executable.display().to_string(),
                status,
            });
        }
        Ok(())
    }
}

/// Round-trips the definition through the external minifier.
///
/// Writes the composite document under `build_directory`, runs the tool, and
/// back-fills `minified_name` on every uniform array and surviving
/// non-uniform global, matched by position. Section and pass texts are
/// replaced with their minified counterparts. The definition is only mutated
/// once the entire output has been parsed and every count check has passed.
///
/// # Errors
/// [`BuildError::MalformedMinifierOutput`] on any structural mismatch
/// between the document sent and the document received; tool and I/O errors
/// are propagated as-is.
pub fn minify(definition: &mut ShaderDefinition, tool: &dyn MinifyTool, build_directory: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(build_directory)?;
    let input_path = build_directory.join("shader.glsl");
    let output_path = build_directory.join("shader.min.glsl");

    // A stale output from a previous run must never be mistaken for this
    // run's result.
    if output_path.exists() {
        fs::remove_file(&output_path)?;
    }

    let document = serialize_document(definition);
    let segment_count = 6 + definition
        .passes
        .iter()
        .map(|pass| usize::from(pass.vertex_code.is_some()) + usize::from(pass.fragment_code.is_some()))
        .sum::<usize>();

    fs::write(&input_path, &document)?;
    info!("minifying shader ({segment_count} segments)");
    tool.run(&input_path, &output_path)?;

    let contents = fs::read_to_string(&output_path)?;
    let mut segments = Segments::split(&contents, segment_count)?;

    let minified_arrays = parse_uniform_array_names(&segments.take_part()?);
    if minified_arrays.len() != definition.uniform_arrays.len() {
        return Err(BuildError::MalformedMinifierOutput(format!(
            "expected {} uniform array declarations, found {}",
            definition.uniform_arrays.len(),
            minified_arrays.len()
        )));
    }

    let minified_globals = parse_global_names(&segments.take_part()?)?;
    let global_indices: Vec<usize> = definition
        .variables
        .iter()
        .enumerate()
        .filter(|(_, variable)| variable.active && !matches!(variable.kind, VariableKind::Uniform))
        .map(|(index, _)| index)
        .collect();
    if minified_globals.len() != global_indices.len() {
        return Err(BuildError::MalformedMinifierOutput(format!(
            "expected {} global declarations, found {}",
            global_indices.len(),
            minified_globals.len()
        )));
    }

    let mut attributes = segments.take_part()?;
    let mut varyings = segments.take_part()?;
    let mut outputs = segments.take_part()?;
    let mut common = segments.take_part()?;
    let mut passes: Vec<(Option<String>, Option<String>)> = Vec::with_capacity(definition.passes.len());
    for pass in &definition.passes {
        let vertex = if pass.vertex_code.is_some() { Some(segments.take_part()?) } else { None };
        let fragment = if pass.fragment_code.is_some() { Some(segments.take_part()?) } else { None };
        passes.push((vertex, fragment));
    }
    segments.finish()?;

    // Known minifier edge case: an internal reference to a uniform array can
    // survive un-renamed inside later segments. Patch those with the
    // recovered names.
    let renames: Vec<(String, String)> = definition
        .uniform_arrays
        .values()
        .map(|array| array.name.clone())
        .zip(minified_arrays.iter().cloned())
        .filter(|(original, minified)| original != minified)
        .collect();
    let apply_renames = |text: &mut String| {
        for (original, minified) in &renames {
            *text = rewrite::replace_word(text, original, minified);
        }
    };
    apply_renames(&mut attributes);
    apply_renames(&mut varyings);
    apply_renames(&mut outputs);
    apply_renames(&mut common);
    for (vertex, fragment) in &mut passes {
        if let Some(code) = vertex {
            apply_renames(code);
        }
        if let Some(code) = fragment {
            apply_renames(code);
        }
    }

    // Commit. Everything past this point is infallible.
    for (array, minified) in definition.uniform_arrays.values_mut().zip(minified_arrays) {
        array.minified_name = Some(minified);
    }
    for (index, minified) in global_indices.into_iter().zip(minified_globals) {
        definition.variables[index].minified_name = Some(minified);
    }
    if definition.attributes_code.is_some() {
        definition.attributes_code = Some(attributes);
    }
    if definition.varyings_code.is_some() {
        definition.varyings_code = Some(varyings);
    }
    if definition.outputs_code.is_some() {
        definition.outputs_code = Some(outputs);
    }
    definition.common_code = common;
    for (pass, (vertex, fragment)) in definition.passes.iter_mut().zip(passes) {
        if vertex.is_some() {
            pass.vertex_code = vertex;
        }
        if fragment.is_some() {
            pass.fragment_code = fragment;
        }
    }

    Ok(())
}

/// Serializes the definition into the separator-delimited composite
/// document: uniform array declarations, non-uniform global declarations,
/// attributes, varyings, outputs, common code, then one segment per present
/// pass stage, vertex before fragment.
fn serialize_document(definition: &ShaderDefinition) -> String {
    let mut segments: Vec<String> = Vec::new();

    let uniform_declarations: String = definition
        .uniform_arrays
        .iter()
        .map(|(ty, array)| format!("uniform {ty} {}[{}];\n", array.name, array.members.len()))
        .collect();
    segments.push(uniform_declarations);

    let global_declarations: String = definition
        .variables
        .iter()
        .filter(|variable| variable.active)
        .filter_map(|variable| match &variable.kind {
            VariableKind::Const { value } => Some(format!("const {} {} = {};\n", variable.ty, variable.name, value)),
            VariableKind::Regular => Some(format!("{} {};\n", variable.ty, variable.name)),
            VariableKind::Uniform => None,
        })
        .collect();
    segments.push(global_declarations);

    segments.push(definition.attributes_code.clone().unwrap_or_default());
    segments.push(definition.varyings_code.clone().unwrap_or_default());
    segments.push(definition.outputs_code.clone().unwrap_or_default());
    segments.push(definition.common_code.clone());

    for pass in &definition.passes {
        if let Some(code) = &pass.vertex_code {
            segments.push(code.clone());
        }
        if let Some(code) = &pass.fragment_code {
            segments.push(code.clone());
        }
    }

    segments.join(&format!("\n{SEPARATOR}\n"))
}

/// The minifier's output, split back into positional segments.
struct Segments {
    parts: VecDeque<String>,
}

impl Segments {
    fn split(contents: &str, expected: usize) -> Result<Self, BuildError> {
        let parts: VecDeque<String> = contents.split(SEPARATOR).map(|part| part.trim().to_string()).collect();
        if parts.len() != expected {
            return Err(BuildError::MalformedMinifierOutput(format!(
                "expected {expected} segments, found {}",
                parts.len()
            )));
        }
        Ok(Self { parts })
    }

    fn take_part(&mut self) -> Result<String, BuildError> {
        self.parts
            .pop_front()
            .ok_or_else(|| BuildError::MalformedMinifierOutput("ran out of segments".to_string()))
    }

    fn finish(self) -> Result<(), BuildError> {
        if self.parts.is_empty() {
            Ok(())
        } else {
            Err(BuildError::MalformedMinifierOutput(format!(
                "{} unconsumed segments remain",
                self.parts.len()
            )))
        }
    }
}

/// Extracts the declared array names, in order, from the uniform segment.
/// The declarations follow the fixed `uniform type name[count];` pattern.
fn parse_uniform_array_names(segment: &str) -> Vec<String> {
    let declaration = Regex::new(r"uniform\s+\w+\s+(\w+)\s*\[\s*\d+\s*\]").unwrap();
    declaration.captures_iter(segment).map(|captures| captures[1].to_string()).collect()
}

/// Extracts the declared names, in order, from the globals segment. The
/// minifier may merge same-typed declarations into comma lists, so each
/// statement is split on top-level commas before taking the leading
/// identifier of every declarator.
fn parse_global_names(segment: &str) -> Result<Vec<String>, BuildError> {
    let declaration = Regex::new(r"(?:const\s+)?\w+\s+([^;]+);").unwrap();
    let identifier = Regex::new(r"^\s*([A-Za-z_]\w*)").unwrap();

    let mut names = Vec::new();
    for captures in declaration.captures_iter(segment) {
        for declarator in split_top_level(captures.get(1).unwrap().as_str()) {
            let name = identifier
                .captures(declarator)
                .ok_or_else(|| BuildError::MalformedMinifierOutput(format!("unrecognized declarator {declarator:?}")))?;
            names.push(name[1].to_string());
        }
    }
    Ok(names)
}

/// Splits a declarator list on commas outside parentheses and brackets.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (offset, character) in list.char_indices() {
        match character {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..offset]);
                start = offset + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer;

    struct StubTool {
        output: String,
    }

    impl MinifyTool for StubTool {
        fn run(&self, _input: &Path, output: &Path) -> Result<(), BuildError> {
            fs::write(output, &self.output)?;
            Ok(())
        }
    }

    fn packed_definition() -> ShaderDefinition {
        let mut definition = ShaderDefinition::default();
        definition.common_code = "float luma() { return beat; }".to_string();
        definition.ensure_pass(0).fragment_code = Some("void main() { c = beat + offset + glow; }".to_string());
        definition.push_uniform("float", "beat");
        definition.push_uniform("vec2", "offset");
        definition.push_regular("vec3", "glow");
        packer::pack_uniforms(&mut definition);
        definition
    }

    fn join_segments(segments: &[&str]) -> String {
        segments.join(&format!("\n{SEPARATOR}\n"))
    }

    #[test]
    fn test_round_trip_maps_names_by_position() {
        let tool = StubTool {
            output: join_segments(&[
                "uniform float a[1];uniform vec2 b[1];",
                "vec3 c;",
                "",
                "",
                "",
                "float d() { return a[0]; }",
                // `floatUniforms` left un-renamed on purpose: the bridge
                // must patch it with the recovered name.
                "void main() { c = floatUniforms[0] + b[0] + c; }",
            ]),
        };

        let mut definition = packed_definition();
        let directory = tempfile::tempdir().unwrap();
        minify(&mut definition, &tool, directory.path()).unwrap();

        assert_eq!(definition.uniform_arrays["float"].minified_name.as_deref(), Some("a"));
        assert_eq!(definition.uniform_arrays["vec2"].minified_name.as_deref(), Some("b"));
        assert_eq!(definition.variables[2].minified_name.as_deref(), Some("c"));
        assert_eq!(definition.common_code, "float d() { return a[0]; }");
        assert_eq!(definition.passes[0].fragment_code.as_deref(), Some("void main() { c = a[0] + b[0] + c; }"));
        // Sections that were never provided stay unset.
        assert!(definition.attributes_code.is_none());
    }

    #[test]
    fn test_segment_count_mismatch_is_fatal_and_mutates_nothing() {
        // One segment short of the seven that were sent.
        let tool = StubTool {
            output: join_segments(&["uniform float a[1];uniform vec2 b[1];", "vec3 c;", "", "", "", "float d();"]),
        };

        let mut definition = packed_definition();
        let untouched = format!("{definition:?}");
        let directory = tempfile::tempdir().unwrap();

        let error = minify(&mut definition, &tool, directory.path()).unwrap_err();
        assert!(matches!(error, BuildError::MalformedMinifierOutput(_)));
        assert_eq!(format!("{definition:?}"), untouched);
    }

    #[test]
    fn test_uniform_declaration_count_mismatch_is_fatal() {
        let tool = StubTool {
            output: join_segments(&[
                "uniform float a[1];",
                "vec3 c;",
                "",
                "",
                "",
                "float d();",
                "void main() {}",
            ]),
        };

        let mut definition = packed_definition();
        let untouched = format!("{definition:?}");
        let directory = tempfile::tempdir().unwrap();

        let error = minify(&mut definition, &tool, directory.path()).unwrap_err();
        assert!(matches!(error, BuildError::MalformedMinifierOutput(_)));
        assert_eq!(format!("{definition:?}"), untouched);
    }

    #[test]
    fn test_stale_output_is_removed_before_the_tool_runs() {
        let directory = tempfile::tempdir().unwrap();
        // Leave a plausible output from a previous run lying around, and use
        // a tool that fails without writing anything.
        fs::write(directory.path().join("shader.min.glsl"), "stale").unwrap();

        struct FailingTool;
        impl MinifyTool for FailingTool {
            fn run(&self, _input: &Path, _output: &Path) -> Result<(), BuildError> {
                Err(BuildError::MalformedShader("tool stand-in failure".to_string()))
            }
        }

        let mut definition = packed_definition();
        assert!(minify(&mut definition, &FailingTool, directory.path()).is_err());
        assert!(!directory.path().join("shader.min.glsl").exists());
    }

    #[test]
    fn test_parse_global_names_handles_merged_declarations() {
        let names = parse_global_names("const float m=2.,n=vec2(1.,3.).x;vec2 o;").unwrap();
        assert_eq!(names, vec!["m".to_string(), "n".to_string(), "o".to_string()]);
    }

    #[test]
    fn test_parse_global_names_rejects_garbage_declarators() {
        assert!(parse_global_names("float 2x;").is_err());
    }

    #[test]
    fn test_serialized_document_orders_segments() {
        let definition = packed_definition();
        let document = serialize_document(&definition);
        let parts: Vec<&str> = document.split(SEPARATOR).collect();

        assert_eq!(parts.len(), 7);
        assert!(parts[0].contains("uniform float floatUniforms[1];"));
        assert!(parts[0].contains("uniform vec2 vec2Uniforms[1];"));
        assert!(parts[1].contains("vec3 glow;"));
        assert!(parts[5].contains("luma"));
        assert!(parts[6].contains("void main()"));
    }
}
