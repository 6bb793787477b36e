//! The core memory unit.
//!
//! Memory is a flat array of 48-bit words, at most 32768 of them,
//! shared by both processors and the I/O channels.  The first 0o1000
//! words hold interrupt vector cells and other reserved state and may
//! only be touched in control state; a normal-state access below that
//! boundary fails the same way an out-of-range access does, and the
//! processor turns the failure into an invalid-address fault.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::{Addr, Word, WORD_MASK};

/// Largest supported memory, in words.
pub const MAX_MEMORY_WORDS: usize = 0o100000;

/// Normal-state accesses below this address are refused.
pub const PROTECTED_LIMIT: Addr = 0o1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryConfiguration {
    pub words: usize,
}

impl Default for MemoryConfiguration {
    fn default() -> MemoryConfiguration {
        MemoryConfiguration {
            words: MAX_MEMORY_WORDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemoryOpFailure {
    /// The address is beyond the fitted memory.
    NotMapped(Addr),
    /// A normal-state access landed in the reserved low area.
    Protected(Addr),
}

impl Display for MemoryOpFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MemoryOpFailure::NotMapped(addr) => {
                write!(f, "address {addr:#o} is not mapped")
            }
            MemoryOpFailure::Protected(addr) => {
                write!(f, "address {addr:#o} is protected from normal-state access")
            }
        }
    }
}

impl Error for MemoryOpFailure {}

#[derive(Debug)]
pub struct MemoryUnit {
    words: Vec<Word>,
}

impl MemoryUnit {
    pub fn new(config: &MemoryConfiguration) -> MemoryUnit {
        let size = config.words.min(MAX_MEMORY_WORDS);
        MemoryUnit {
            words: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.words.len()
    }

    fn check(&self, addr: Addr, normal_state: bool) -> Result<usize, MemoryOpFailure> {
        let index = usize::from(addr);
        if index >= self.words.len() {
            Err(MemoryOpFailure::NotMapped(addr))
        } else if normal_state && addr < PROTECTED_LIMIT {
            Err(MemoryOpFailure::Protected(addr))
        } else {
            Ok(index)
        }
    }

    pub fn fetch(&self, addr: Addr, normal_state: bool) -> Result<Word, MemoryOpFailure> {
        self.check(addr, normal_state).map(|i| self.words[i])
    }

    pub fn store(
        &mut self,
        addr: Addr,
        value: Word,
        normal_state: bool,
    ) -> Result<(), MemoryOpFailure> {
        let i = self.check(addr, normal_state)?;
        self.words[i] = value & WORD_MASK;
        Ok(())
    }

    /// Raw word access for the channel subsystem, which transfers
    /// whole buffers without the processor's state checks.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut [Word] {
        &mut self.words
    }

    /// Unchecked access for loaders and tests; panics on an unmapped
    /// address.
    pub fn set(&mut self, addr: Addr, value: Word) {
        self.words[usize::from(addr)] = value & WORD_MASK;
    }

    /// Unchecked read for loaders and tests.
    pub fn get(&self, addr: Addr) -> Word {
        self.words[usize::from(addr)]
    }
}
