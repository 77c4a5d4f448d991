//! Hook collection and injection
//!
//! Hook source files are segmented into named blocks by `#pragma hook
//! <name>` marker lines; blocks with the same name accumulate across files.
//! Templates reference blocks through `REPLACE_HOOK_<NAME>` tokens, which
//! expand recursively: a hook's content may itself contain tokens for other
//! hooks. Expansion is a bounded-depth traversal so a self-referencing hook
//! is reported instead of overflowing the stack.

use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::BuildError;
use crate::rewrite;

/// Named hook blocks, accumulated in collection order.
pub type Hooks = BTreeMap<String, String>;

/// Expansion depth past which a hook chain is assumed to be cyclic.
const MAX_EXPANSION_DEPTH: usize = 16;

/// Splits `contents` into named blocks and appends them to `hooks`.
///
/// Text between a `#pragma hook <name>` line and the next marker (or the end
/// of the file) belongs to that name; text before the first marker is an
/// unnamed preamble and is dropped. A block whose name was already collected
/// is concatenated, not overwritten.
pub fn add_hooks(hooks: &mut Hooks, contents: &str) {
    // The marker line is consumed including its newline, so block content
    // starts on the following line.
    let marker = Regex::new(r"(?m)^#pragma[ \t]+hook[ \t]+(\w+)[ \t]*\r?(?:\n|\z)").unwrap();

    let mut block_start = 0;
    let mut block_name: Option<&str> = None;
    for captures in marker.captures_iter(contents) {
        let whole = captures.get(0).unwrap();
        if let Some(name) = block_name {
            hooks.entry(name.to_string()).or_default().push_str(&contents[block_start..whole.start()]);
        }
        block_start = whole.end();
        block_name = Some(captures.get(1).unwrap().as_str());
    }
    if let Some(name) = block_name {
        hooks.entry(name.to_string()).or_default().push_str(&contents[block_start..]);
    }
}

/// Reads a hook source file and collects its blocks into `hooks`.
pub fn add_hooks_file(hooks: &mut Hooks, path: &Path) -> Result<(), BuildError> {
    let contents = fs::read_to_string(path)?;
    add_hooks(hooks, &contents);
    Ok(())
}

/// Substitutes every `REPLACE_HOOK_<NAME>` token in `template` with the
/// corresponding block's content, recursively.
///
/// # Errors
/// [`BuildError::CyclicHookReference`] when expansion exceeds the depth
/// bound, which only happens when a hook chain references itself.
pub fn replace_hooks(hooks: &Hooks, template: &str) -> Result<String, BuildError> {
    expand(hooks, template, 0)
}

fn expand(hooks: &Hooks, text: &str, depth: usize) -> Result<String, BuildError> {
    let mut result = text.to_string();
    for (name, code) in hooks {
        let token = format!("REPLACE_HOOK_{}", name.to_uppercase());
        if !rewrite::contains_word(&result, &token) {
            continue;
        }
        if depth >= MAX_EXPANSION_DEPTH {
            return Err(BuildError::CyclicHookReference(name.clone()));
        }
        let expanded = expand(hooks, code, depth + 1)?;
        result = rewrite::replace_word(&result, &token, &expanded);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_are_split_on_markers() {
        let mut hooks = Hooks::new();
        add_hooks(
            &mut hooks,
            "// preamble is dropped\n#pragma hook declarations\nint frame;\n#pragma hook frame\nframe++;\n",
        );

        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks["declarations"], "int frame;\n");
        assert_eq!(hooks["frame"], "frame++;\n");
    }

    #[test]
    fn test_same_named_blocks_accumulate() {
        let mut hooks = Hooks::new();
        add_hooks(&mut hooks, "#pragma hook audio\nopen();\n");
        add_hooks(&mut hooks, "#pragma hook audio\nplay();\n");

        assert_eq!(hooks["audio"], "open();\nplay();\n");
    }

    #[test]
    fn test_tokens_expand_recursively() {
        let mut hooks = Hooks::new();
        add_hooks(&mut hooks, "#pragma hook outer\nbefore(); REPLACE_HOOK_INNER done();\n#pragma hook inner\ninner();");

        let result = replace_hooks(&hooks, "REPLACE_HOOK_OUTER").unwrap();
        assert_eq!(result, "before(); inner(); done();\n");
    }

    #[test]
    fn test_missing_token_is_left_alone() {
        let hooks = Hooks::new();
        let result = replace_hooks(&hooks, "REPLACE_HOOK_ABSENT").unwrap();
        assert_eq!(result, "REPLACE_HOOK_ABSENT");
    }

    #[test]
    fn test_self_reference_is_detected() {
        let mut hooks = Hooks::new();
        add_hooks(&mut hooks, "#pragma hook loop\nREPLACE_HOOK_LOOP\n");

        let error = replace_hooks(&hooks, "REPLACE_HOOK_LOOP").unwrap_err();
        assert!(matches!(error, BuildError::CyclicHookReference(name) if name == "loop"));
    }
}
