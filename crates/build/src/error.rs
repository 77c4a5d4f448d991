//! Build error taxonomy
//!
//! Every failure in the shader pipeline is fatal: the build aborts on the
//! first error and no partial artifact is considered valid. Each of these
//! conditions indicates a malformed shader source or a tooling contract
//! violation that requires a human fix, not a retry.

use thiserror::Error;

/// Errors raised by the shader preparation pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A const value still references other variables after the folding
    /// queue drained: a dependency cycle, or a reference that can never be
    /// folded (such as a `no-replace` const).
    #[error("unresolved constant dependencies: {}", .names.join(", "))]
    UnresolvedDependency {
        /// Names of the variables left with unresolved references.
        names: Vec<String>,
    },

    /// The external minifier returned a document whose structure does not
    /// match what was sent. Slot metadata can only be re-attached through an
    /// exact 1:1 segment correspondence, so there is no recovery path.
    #[error("shader minifier output is not well-formed: {0}")]
    MalformedMinifierOutput(String),

    /// A shader source lacks the structural marker its provider requires.
    #[error("shader does not contain required section marker {0:?}")]
    MissingMagicMarker(&'static str),

    /// A hook expands into itself, directly or through other hooks.
    #[error("hook {0:?} expands into itself")]
    CyclicHookReference(String),

    /// A declaration or section the shader provider cannot accept.
    #[error("malformed shader source: {0}")]
    MalformedShader(String),

    /// Invalid or incomplete configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An external tool exited unsuccessfully.
    #[error("{tool} exited with {status}")]
    ToolFailed {
        /// Displayable name of the tool that failed.
        tool: String,
        /// Exit status reported by the operating system.
        status: std::process::ExitStatus,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Yaml(#[from] serde_norway::Error),
}
