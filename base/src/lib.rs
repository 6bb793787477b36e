//! The `base` crate defines the B5500-related things which are useful
//! in both a simulator and other associated tools.  The idea is that
//! if you want to write, say, a cross-assembler for the machine, it
//! would depend on the base crate but would not need to depend on the
//! simulator library itself.

pub mod cw;
pub mod prelude;
pub mod syllable;
pub mod word;
