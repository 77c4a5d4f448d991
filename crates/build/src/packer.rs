//! Uniform packing
//!
//! Packs every surviving uniform into one dense array per type and rewrites
//! all references to the indexed form. A demo executable pays a fixed
//! per-uniform location lookup and upload call; one array and one
//! `glUniform*v` call per type amortizes that cost across every uniform of
//! the type.

use tracing::debug;

use crate::rewrite;
use crate::variables::{ShaderDefinition, UniformArray, VariableKind};

/// Assigns every active uniform an array slot and rewrites its occurrences.
///
/// Uniforms are visited in declaration order; each is appended to the
/// `<type>Uniforms` array for its type, receiving the next free slot. The
/// slot therefore equals the variable's 0-based rank among active uniforms
/// of the same type, which is the deterministic numbering the generated host
/// code relies on. Every whole-word occurrence of the uniform's name, in
/// the shader text and in the values of still-active constants, becomes
/// `<arrayName>[<slot>]`, so no bare uniform identifier remains afterwards.
pub fn pack_uniforms(definition: &mut ShaderDefinition) {
    for index in 0..definition.variables.len() {
        let variable = &definition.variables[index];
        if !variable.active || !matches!(variable.kind, VariableKind::Uniform) {
            continue;
        }
        let ty = variable.ty.clone();
        let name = variable.name.clone();

        let replacement = {
            let array = definition
                .uniform_arrays
                .entry(ty.clone())
                .or_insert_with(|| UniformArray {
                    name: format!("{ty}Uniforms"),
                    minified_name: None,
                    members: Vec::new(),
                });
            let slot = array.members.len();
            array.members.push(index);
            format!("{}[{}]", array.name, slot)
        };

        debug!("packing uniform {name:?} as {replacement}");

        definition.rewrite_code(&name, &replacement);
        for other in &mut definition.variables {
            if !other.active {
                continue;
            }
            if let VariableKind::Const { value } = &mut other.kind {
                *value = rewrite::replace_word(value, &name, &replacement);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Variable;

    #[test]
    fn test_slots_follow_declaration_order() {
        let mut definition = ShaderDefinition::default();
        definition.ensure_pass(0).fragment_code = Some("c = x + y * z;".to_string());
        definition.push_uniform("float", "x");
        definition.push_uniform("float", "y");
        definition.push_uniform("float", "z");

        pack_uniforms(&mut definition);

        let array = &definition.uniform_arrays["float"];
        assert_eq!(array.name, "floatUniforms");
        assert_eq!(array.members, vec![0, 1, 2]);
        assert_eq!(
            definition.passes[0].fragment_code.as_deref(),
            Some("c = floatUniforms[0] + floatUniforms[1] * floatUniforms[2];")
        );
    }

    #[test]
    fn test_arrays_are_grouped_by_type() {
        let mut definition = ShaderDefinition::default();
        definition.common_code = "f(beat, cam, fade);".to_string();
        definition.push_uniform("float", "beat");
        definition.push_uniform("vec3", "cam");
        definition.push_uniform("float", "fade");

        pack_uniforms(&mut definition);

        assert_eq!(definition.uniform_arrays["float"].members, vec![0, 2]);
        assert_eq!(definition.uniform_arrays["vec3"].members, vec![1]);
        assert_eq!(definition.common_code, "f(floatUniforms[0], vec3Uniforms[0], floatUniforms[1]);");
    }

    #[test]
    fn test_inactive_uniforms_are_skipped() {
        let mut definition = ShaderDefinition::default();
        definition.common_code = "g(live);".to_string();
        definition.push_uniform("float", "dead");
        definition.variables[0].active = false;
        definition.push_uniform("float", "live");

        pack_uniforms(&mut definition);

        // The surviving uniform takes slot 0; the deactivated one is gone.
        assert_eq!(definition.uniform_arrays["float"].members, vec![1]);
        assert_eq!(definition.common_code, "g(floatUniforms[0]);");
    }

    #[test]
    fn test_const_values_are_rewritten() {
        let mut definition = ShaderDefinition::default();
        definition.common_code = "r = ratio;".to_string();
        definition.push_uniform("float", "width");
        let mut pinned = Variable::constant("float", "ratio", "width / 2.0");
        pinned.annotations.insert(crate::resolver::NO_REPLACE.to_string(), "true".to_string());
        definition.variables.push(pinned);
        definition.common_code.push_str(" s = width;");

        pack_uniforms(&mut definition);

        let VariableKind::Const { value } = &definition.variables[1].kind else {
            panic!("expected const");
        };
        assert_eq!(value, "floatUniforms[0] / 2.0");
        assert_eq!(definition.common_code, "r = ratio; s = floatUniforms[0];");
    }
}
