use std::fmt;

use thiserror::Error;

use super::ShaderType;

/// Pipeline stage a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors raised while building or driving a [`ProgramBinding`](super::ProgramBinding).
#[derive(Debug, Error)]
pub enum BindingError {
    /// The shader source did not parse or validate. `log` is the compiler output.
    #[error("{stage} shader of `{program}` failed to compile:\n{log}")]
    Compile {
        program: String,
        stage: Stage,
        log: String,
    },

    #[error("program `{program}` failed to link: {reason}")]
    Link { program: String, reason: String },

    #[error("uniform `{name}` is declared as {declared}, got {provided}")]
    TypeMismatch {
        name: String,
        declared: ShaderType,
        provided: ShaderType,
    },

    #[error("`{name}` in program `{program}` uses an unsupported type: {detail}")]
    Unsupported {
        program: String,
        name: String,
        detail: String,
    },

    /// Per-object blocks need a bind group made of uniform buffers only.
    #[error("group {group} of program `{program}` holds more than uniform buffers")]
    SharedGroup { program: String, group: u32 },
}
