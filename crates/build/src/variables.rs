//! Shader variable model
//!
//! The typed record set every pipeline stage consumes and produces: the
//! global variables parsed out of the shader source, the per-type uniform
//! arrays they are packed into, and the sectioned shader text they are
//! resolved against.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::rewrite;

/// Discriminates the three ways a shader global can be declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VariableKind {
    /// A named constant carrying its shader-expression value. The value text
    /// may reference other variable names until the resolver folds them.
    Const {
        /// Shader expression the constant was declared with.
        value: String,
    },
    /// A plain global, written by the shader itself at run time.
    Regular,
    /// A value uploaded by the host program every frame.
    Uniform,
}

/// One global variable of the shader program.
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    /// Identifier as written in the source.
    pub name: String,
    /// Semantic type tag, e.g. `float`, `vec2`, `sampler2D`.
    pub ty: String,
    pub kind: VariableKind,
    /// Cleared to permanently exclude the variable from codegen; a variable
    /// is never reactivated.
    pub active: bool,
    /// Name assigned by the external minifier, when minification ran.
    pub minified_name: Option<String>,
    /// `//!` annotations from the declaration site (`no-replace`, ...).
    /// Flag annotations are stored with the value `"true"`.
    pub annotations: BTreeMap<String, String>,
}

impl Variable {
    /// Creates an active constant with the given value expression.
    pub fn constant(ty: &str, name: &str, value: &str) -> Self {
        Self::new(ty, name, VariableKind::Const { value: value.to_string() })
    }

    /// Creates an active regular global.
    pub fn regular(ty: &str, name: &str) -> Self {
        Self::new(ty, name, VariableKind::Regular)
    }

    /// Creates an active uniform.
    pub fn uniform(ty: &str, name: &str) -> Self {
        Self::new(ty, name, VariableKind::Uniform)
    }

    fn new(ty: &str, name: &str, kind: VariableKind) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            kind,
            active: true,
            minified_name: None,
            annotations: BTreeMap::new(),
        }
    }

    /// Whether the declaration carries the given flag annotation.
    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotations.contains_key(key)
    }
}

/// One dense per-type array of packed uniforms.
#[derive(Debug, Clone, Serialize)]
pub struct UniformArray {
    /// Generated identifier, `<type>Uniforms`.
    pub name: String,
    /// Name assigned by the external minifier, when minification ran.
    pub minified_name: Option<String>,
    /// Indices into [`ShaderDefinition::variables`], in packing order.
    /// Position `i` is array slot `i`; the order is immutable once assigned.
    /// It is the contract that lets the minifier bridge and the generated
    /// host code map slots back to semantic names.
    pub members: Vec<usize>,
}

/// One rendering pass of the shader program.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Pass {
    pub vertex_code: Option<String>,
    pub fragment_code: Option<String>,
}

/// The aggregate the whole pipeline mutates in place.
///
/// Created empty, populated by a shader provider, resolved, packed,
/// optionally minified, and finally consumed once by code generation. One
/// build run owns one definition; nothing retains it across runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShaderDefinition {
    /// GLSL version captured from the source, e.g. `"450"`.
    pub glsl_version: Option<String>,
    pub prolog_code: Option<String>,
    pub attributes_code: Option<String>,
    pub varyings_code: Option<String>,
    pub outputs_code: Option<String>,
    pub common_code: String,
    pub passes: Vec<Pass>,
    /// Uniform arrays keyed by type. The sorted key order is the
    /// type-iteration order shared by the packer, the minifier bridge and
    /// code generation.
    pub uniform_arrays: BTreeMap<String, UniformArray>,
    pub variables: Vec<Variable>,
}

impl ShaderDefinition {
    /// Appends an active constant to the variable list.
    pub fn push_const(&mut self, ty: &str, name: &str, value: &str) {
        self.variables.push(Variable::constant(ty, name, value));
    }

    /// Appends an active regular global to the variable list.
    pub fn push_regular(&mut self, ty: &str, name: &str) {
        self.variables.push(Variable::regular(ty, name));
    }

    /// Appends an active uniform to the variable list.
    pub fn push_uniform(&mut self, ty: &str, name: &str) {
        self.variables.push(Variable::uniform(ty, name));
    }

    /// Returns whether `name` occurs as a whole word in the prolog, the
    /// common code, or any pass.
    pub fn references_name(&self, name: &str) -> bool {
        if self.prolog_code.as_deref().is_some_and(|code| rewrite::contains_word(code, name)) {
            return true;
        }
        if rewrite::contains_word(&self.common_code, name) {
            return true;
        }
        self.passes.iter().any(|pass| {
            pass.vertex_code.as_deref().is_some_and(|code| rewrite::contains_word(code, name))
                || pass.fragment_code.as_deref().is_some_and(|code| rewrite::contains_word(code, name))
        })
    }

    /// Rewrites every whole-word occurrence of `name` in the prolog, the
    /// common code and all passes.
    pub fn rewrite_code(&mut self, name: &str, replacement: &str) {
        if let Some(code) = &mut self.prolog_code {
            *code = rewrite::replace_word(code, name, replacement);
        }
        self.common_code = rewrite::replace_word(&self.common_code, name, replacement);
        for pass in &mut self.passes {
            if let Some(code) = &mut pass.vertex_code {
                *code = rewrite::replace_word(code, name, replacement);
            }
            if let Some(code) = &mut pass.fragment_code {
                *code = rewrite::replace_word(code, name, replacement);
            }
        }
    }

    /// Grows the pass list so that `index` is addressable.
    pub fn ensure_pass(&mut self, index: usize) -> &mut Pass {
        while self.passes.len() <= index {
            self.passes.push(Pass::default());
        }
        &mut self.passes[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_name_covers_all_sections() {
        let mut definition = ShaderDefinition {
            common_code: "void main() {}".to_string(),
            ..Default::default()
        };
        definition.ensure_pass(0).fragment_code = Some("color = tint;".to_string());

        assert!(definition.references_name("tint"));
        assert!(!definition.references_name("tin"));

        definition.prolog_code = Some("precision highp float; // tuned".to_string());
        assert!(definition.references_name("highp"));
    }

    #[test]
    fn test_rewrite_code_touches_every_section() {
        let mut definition = ShaderDefinition {
            prolog_code: Some("scale".to_string()),
            common_code: "x * scale".to_string(),
            ..Default::default()
        };
        definition.ensure_pass(1).vertex_code = Some("pos * scale".to_string());

        definition.rewrite_code("scale", "2.0");

        assert_eq!(definition.prolog_code.as_deref(), Some("2.0"));
        assert_eq!(definition.common_code, "x * 2.0");
        assert_eq!(definition.passes[1].vertex_code.as_deref(), Some("pos * 2.0"));
        // pass 0 was created as a gap and stays empty
        assert!(definition.passes[0].vertex_code.is_none());
    }
}
