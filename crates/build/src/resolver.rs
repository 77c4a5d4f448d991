//! Constant folding and dead-variable elimination
//!
//! Link-time dead code elimination plus inlining, run on the shader variable
//! graph instead of a call graph: constants whose dependencies are fully
//! resolved are substituted into their use sites and deactivated, then every
//! variable no longer reachable from the shader text is deactivated too.
//! Unreachable declarations are pure byte waste in a size-coded binary.

use std::collections::{HashSet, VecDeque};
use tracing::debug;

use crate::error::BuildError;
use crate::rewrite;
use crate::variables::{ShaderDefinition, VariableKind};

/// Annotation that pins a const as a real global declaration instead of
/// folding it into its use sites.
pub const NO_REPLACE: &str = "no-replace";

/// Folds constants and deactivates unreachable variables, in place.
///
/// Constants are processed through a work queue: a const with no unresolved
/// references to other variables is substituted (whole-word) into the shader
/// text and into the values of the constants that reference it, then
/// deactivated. Resolving a const may make its dependents foldable, so they
/// are re-enqueued as their last dependency disappears.
///
/// The const dependency graph must be acyclic. Any const left with
/// unresolved references once the queue drains (a cycle, or a reference to
/// a const that can never fold, such as a [`NO_REPLACE`] one) aborts the
/// build rather than producing a declaration whose value would name a
/// variable the minifier later renames.
///
/// Running the resolver on an already-resolved definition changes nothing.
///
/// # Errors
/// [`BuildError::UnresolvedDependency`] naming the offending variables.
pub fn resolve(definition: &mut ShaderDefinition) -> Result<(), BuildError> {
    let count = definition.variables.len();

    // Dependency edges between constants: a const's value referencing
    // another active const's name, and the inverse. References to uniforms
    // or regulars are not edges; those names survive folding and are
    // rewritten later by the packer.
    let mut references_others: Vec<HashSet<usize>> = vec![HashSet::new(); count];
    let mut referenced_by_others: Vec<HashSet<usize>> = vec![HashSet::new(); count];

    for index in 0..count {
        if !definition.variables[index].active {
            continue;
        }
        let VariableKind::Const { value } = &definition.variables[index].kind else {
            continue;
        };
        for other in 0..count {
            if other == index || !definition.variables[other].active {
                continue;
            }
            if !matches!(definition.variables[other].kind, VariableKind::Const { .. }) {
                continue;
            }
            if rewrite::contains_word(value, &definition.variables[other].name) {
                references_others[index].insert(other);
                referenced_by_others[other].insert(index);
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..count).filter(|&index| definition.variables[index].active).collect();

    while let Some(index) = queue.pop_front() {
        let variable = &definition.variables[index];
        if !variable.active || variable.has_annotation(NO_REPLACE) {
            continue;
        }
        let VariableKind::Const { value } = &variable.kind else {
            continue;
        };
        if !references_others[index].is_empty() {
            // Still waiting on another fold; re-enqueued when the last
            // dependency resolves.
            continue;
        }

        let name = variable.name.clone();
        let value = value.clone();
        debug!("replacing references to constant {name:?} by its value {value:?}");

        if definition.references_name(&name) {
            definition.rewrite_code(&name, &value);
        }

        let mut dependents: Vec<usize> = referenced_by_others[index].iter().copied().collect();
        dependents.sort_unstable();
        for dependent in dependents {
            if let VariableKind::Const { value: dependent_value } = &mut definition.variables[dependent].kind {
                *dependent_value = rewrite::replace_word(dependent_value, &name, &value);
            }
            references_others[dependent].remove(&index);
            if references_others[dependent].is_empty() {
                queue.push_back(dependent);
            }
        }
        referenced_by_others[index].clear();

        // Folded constants never survive to codegen.
        definition.variables[index].active = false;
    }

    let mut unresolved: Vec<String> = (0..count)
        .filter(|&index| definition.variables[index].active && !references_others[index].is_empty())
        .map(|index| definition.variables[index].name.clone())
        .collect();
    if !unresolved.is_empty() {
        unresolved.sort();
        return Err(BuildError::UnresolvedDependency { names: unresolved });
    }

    deactivate_unreferenced(definition);

    Ok(())
}

/// Deactivates, to a fixpoint, every variable that is neither referenced in
/// the shader text nor referenced from the value of a still-active variable.
fn deactivate_unreferenced(definition: &mut ShaderDefinition) {
    loop {
        let mut changed = false;
        for index in 0..definition.variables.len() {
            if !definition.variables[index].active {
                continue;
            }
            let name = definition.variables[index].name.clone();

            let referenced_by_variable = definition.variables.iter().enumerate().any(|(other, variable)| {
                other != index
                    && variable.active
                    && matches!(&variable.kind, VariableKind::Const { value } if rewrite::contains_word(value, &name))
            });
            if referenced_by_variable || definition.references_name(&name) {
                continue;
            }

            debug!("global variable {name:?} is not referenced and won't be used");
            definition.variables[index].active = false;
            changed = true;
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Variable;

    fn definition_with_fragment(code: &str) -> ShaderDefinition {
        let mut definition = ShaderDefinition::default();
        definition.ensure_pass(0).fragment_code = Some(code.to_string());
        definition
    }

    #[test]
    fn test_chained_constants_fold_into_shader_text() {
        // A appears only inside B's value, B appears once in the shader.
        let mut definition = definition_with_fragment("float r = B;");
        definition.push_const("float", "A", "1.0");
        definition.push_const("float", "B", "A * 2.0");

        resolve(&mut definition).unwrap();

        assert!(!definition.variables[0].active);
        assert!(!definition.variables[1].active);
        assert_eq!(definition.passes[0].fragment_code.as_deref(), Some("float r = 1.0 * 2.0;"));
    }

    #[test]
    fn test_fold_order_is_dependency_driven() {
        // B is declared before A but depends on it; the queue must fold A
        // first and revisit B.
        let mut definition = definition_with_fragment("float r = B + C;");
        definition.push_const("float", "B", "A + A");
        definition.push_const("float", "A", "3.0");
        definition.push_const("float", "C", "0.5");

        resolve(&mut definition).unwrap();

        assert_eq!(definition.passes[0].fragment_code.as_deref(), Some("float r = 3.0 + 3.0 + 0.5;"));
        assert!(definition.variables.iter().all(|variable| !variable.active));
    }

    #[test]
    fn test_unreferenced_variables_are_deactivated() {
        let mut definition = definition_with_fragment("color = vec3(used);");
        definition.push_uniform("float", "used");
        definition.push_uniform("float", "unused");
        definition.push_regular("vec2", "scratch");
        definition.push_const("float", "orphan", "4.0");

        resolve(&mut definition).unwrap();

        assert!(definition.variables[0].active);
        assert!(!definition.variables[1].active);
        assert!(!definition.variables[2].active);
        assert!(!definition.variables[3].active);
        // The orphan const folded nowhere: its name must be gone everywhere.
        assert!(!definition.references_name("orphan"));
    }

    #[test]
    fn test_elimination_cascades_through_dead_chains() {
        // `keeper` is referenced only by a no-replace const that is itself
        // unreferenced; both must end up inactive.
        let mut definition = definition_with_fragment("color = vec3(1.0);");
        definition.push_uniform("float", "keeper");
        let mut pinned = Variable::constant("float", "pinned", "keeper");
        pinned.annotations.insert(NO_REPLACE.to_string(), "true".to_string());
        definition.variables.push(pinned);

        resolve(&mut definition).unwrap();

        assert!(definition.variables.iter().all(|variable| !variable.active));
    }

    #[test]
    fn test_const_value_referencing_uniforms_folds() {
        // A reference to a uniform is not an unresolved dependency: the name
        // survives folding and the packer rewrites it afterwards.
        let mut definition = definition_with_fragment("vec2 r = res;");
        definition.push_const("vec2", "res", "vec2(width, height)");
        definition.push_uniform("float", "width");
        definition.push_uniform("float", "height");

        resolve(&mut definition).unwrap();

        assert!(!definition.variables[0].active);
        assert!(definition.variables[1].active);
        assert!(definition.variables[2].active);
        assert_eq!(definition.passes[0].fragment_code.as_deref(), Some("vec2 r = vec2(width, height);"));
    }

    #[test]
    fn test_no_replace_const_survives() {
        let mut definition = definition_with_fragment("color = vec3(pinned);");
        let mut pinned = Variable::constant("float", "pinned", "0.5");
        pinned.annotations.insert(NO_REPLACE.to_string(), "true".to_string());
        definition.variables.push(pinned);

        resolve(&mut definition).unwrap();

        assert!(definition.variables[0].active);
        // The value was not substituted into the shader text.
        assert_eq!(definition.passes[0].fragment_code.as_deref(), Some("color = vec3(pinned);"));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let mut definition = definition_with_fragment("float r = A;");
        definition.push_const("float", "A", "B + 1.0");
        definition.push_const("float", "B", "A + 1.0");

        let error = resolve(&mut definition).unwrap_err();
        match error {
            BuildError::UnresolvedDependency { names } => {
                assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("expected UnresolvedDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_to_no_replace_const_is_fatal() {
        // `derived` can never fold its reference away because `pinned` stays
        // a real declaration; codegen would emit a stale name.
        let mut definition = definition_with_fragment("float r = derived + pinned;");
        let mut pinned = Variable::constant("float", "pinned", "0.5");
        pinned.annotations.insert(NO_REPLACE.to_string(), "true".to_string());
        definition.variables.push(pinned);
        definition.push_const("float", "derived", "pinned * 2.0");

        let error = resolve(&mut definition).unwrap_err();
        assert!(matches!(error, BuildError::UnresolvedDependency { names } if names == vec!["derived".to_string()]));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut definition = definition_with_fragment("float r = B * fade;");
        definition.push_const("float", "A", "1.0");
        definition.push_const("float", "B", "A * 2.0");
        definition.push_uniform("float", "fade");
        definition.push_uniform("float", "unused");

        resolve(&mut definition).unwrap();
        let resolved = definition.clone();
        resolve(&mut definition).unwrap();

        assert_eq!(format!("{definition:?}"), format!("{resolved:?}"));
    }
}
