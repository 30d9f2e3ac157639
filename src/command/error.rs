//! Command error types.

use std::fmt;

/// Why a command line could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Operands missing or not 32-bit integers.
    Malformed { reason: String },

    /// Operands were fine but the verb is not one we know.
    Unknown { verb: String },

    /// `DIV` with a zero divisor.
    DivisionByZero,
}

impl CommandError {
    /// Check if this is an unknown-verb error.
    pub fn is_unknown(&self) -> bool {
        matches!(self, CommandError::Unknown { .. })
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Malformed { reason } => write!(f, "malformed command: {}", reason),
            CommandError::Unknown { verb } => write!(f, "unknown verb '{}'", verb),
            CommandError::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

impl std::error::Error for CommandError {}
