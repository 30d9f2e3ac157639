//! Command grammar of the line protocol.
//!
//! A command is one line: `VERB,a,b` for arithmetic on 32-bit signed
//! integers, or `KILL` to shut the server down.
//!
//! ```text
//! ADD,2,3   -> 2 + 3 = 5
//! DIV,7,2   -> 7 / 2 = 3
//! KILL      -> Killing server
//! ```

mod error;
mod job;

pub use error::CommandError;
pub use job::CommandJob;

use std::fmt;

/// Reply sent when the server kills itself.
pub const KILL_RESPONSE: &str = "Killing server";

/// Arithmetic operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "ADD" => Some(Op::Add),
            "SUB" => Some(Op::Sub),
            "MUL" => Some(Op::Mul),
            "DIV" => Some(Op::Div),
            _ => None,
        }
    }

    fn symbol(self) -> char {
        match self {
            Op::Add => '+',
            Op::Sub => '-',
            Op::Mul => '*',
            Op::Div => '/',
        }
    }

    /// 32-bit two's complement arithmetic: results wrap on overflow.
    fn apply(self, a: i32, b: i32) -> Result<i32, CommandError> {
        match self {
            Op::Add => Ok(a.wrapping_add(b)),
            Op::Sub => Ok(a.wrapping_sub(b)),
            Op::Mul => Ok(a.wrapping_mul(b)),
            Op::Div if b == 0 => Err(CommandError::DivisionByZero),
            Op::Div => Ok(a.wrapping_div(b)),
        }
    }
}

/// A parsed command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Arith { op: Op, a: i32, b: i32 },
    Kill,
}

impl Command {
    /// Parse one command line (without its line terminator).
    ///
    /// Operands are checked before the verb, so `FOO,1,2` is unknown but
    /// `FOO,x` is malformed. A first field of `KILL` kills.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut parts = line.split(',');
        let verb = parts.next().unwrap_or_default();

        if verb == "KILL" {
            return Ok(Command::Kill);
        }

        let a = parse_operand(parts.next())?;
        let b = parse_operand(parts.next())?;

        match Op::from_verb(verb) {
            Some(op) => Ok(Command::Arith { op, a, b }),
            None => Err(CommandError::Unknown {
                verb: verb.to_string(),
            }),
        }
    }

    /// Evaluate to the reply text.
    pub fn evaluate(&self) -> Result<String, CommandError> {
        match *self {
            Command::Kill => Ok(KILL_RESPONSE.to_string()),
            Command::Arith { op, a, b } => {
                let result = op.apply(a, b)?;
                Ok(format!("{} {} {} = {}", a, op.symbol(), b, result))
            }
        }
    }

    pub fn is_kill(&self) -> bool {
        matches!(self, Command::Kill)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Kill => write!(f, "KILL"),
            Command::Arith { op, a, b } => {
                let verb = match op {
                    Op::Add => "ADD",
                    Op::Sub => "SUB",
                    Op::Mul => "MUL",
                    Op::Div => "DIV",
                };
                write!(f, "{},{},{}", verb, a, b)
            }
        }
    }
}

fn parse_operand(part: Option<&str>) -> Result<i32, CommandError> {
    let part = part.ok_or_else(|| CommandError::Malformed {
        reason: "missing operand".into(),
    })?;
    part.parse().map_err(|e| CommandError::Malformed {
        reason: format!("'{}': {}", part, e),
    })
}

/// Reply line for a command line, whatever the outcome.
pub fn response_for(line: &str, outcome: &Result<String, CommandError>) -> String {
    match outcome {
        Ok(reply) => reply.clone(),
        Err(e) if e.is_unknown() => format!("Unknown command {}", line),
        Err(_) => format!("Error occurred when executing command: {}", line),
    }
}

/// Parse and evaluate `line` in one go.
pub fn run(line: &str) -> Result<String, CommandError> {
    Command::parse(line)?.evaluate()
}
