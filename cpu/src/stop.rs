//! Reasons the emulator stops fetching syllables.
//!
//! A processor fault (divide by zero, flag bit, presence bit and so
//! on) is not a stop.  Faults set a bit in the Q register and the
//! machine keeps running until the interrupt is serviced.  The
//! variants here are the conditions that genuinely end a run.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

/// Why `run` returned instead of executing another syllable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExecutionStop {
    /// A halt was requested and processor 1 honoured it (ZP1).
    Halted,
    /// Processor 1 has stopped and processor 2 is not running, so no
    /// syllable can ever execute again.
    ProcessorsIdle,
    /// The syllable decoded to an operator this emulator does not
    /// implement.
    Unimplemented(WordOp),
    /// The caller's syllable limit ran out.
    LimitReached,
}

impl Display for ExecutionStop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStop::Halted => f.write_str("halt requested"),
            ExecutionStop::ProcessorsIdle => f.write_str("all processors idle"),
            ExecutionStop::Unimplemented(op) => {
                write!(f, "operator {op} is not implemented")
            }
            ExecutionStop::LimitReached => f.write_str("syllable limit reached"),
        }
    }
}

impl Error for ExecutionStop {}
