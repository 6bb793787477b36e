//! Emulation of the Burroughs B5500 central processors.
//!
//! The crate models the machine the way the hardware was organised:
//! a [`MemoryUnit`] shared by everything, up to two processors whose
//! registers live in [`CpuState`], the cabinet-level interrupt state
//! in [`SharedState`], and an I/O channel abstraction behind the
//! [`Channels`] trait.  [`B5500`] ties them together and steps the
//! machine one syllable at a time.
//!
//! Faults (divide by zero, presence bit, invalid address and the
//! rest) do not stop execution; they set a bit in the faulting
//! processor's Q register and the program continues until control
//! state interrogates the interrupt system.  Only the conditions in
//! [`ExecutionStop`] end a run.

pub mod channel;
pub mod irq;
pub mod memory;
pub mod processor;
pub mod stop;
mod system;

pub use channel::{Channels, NoChannels};
pub use memory::{MemoryConfiguration, MemoryUnit};
pub use processor::{CpuIndex, CpuState, Processor, SharedState};
pub use stop::ExecutionStop;
pub use system::{RunOutcome, B5500, P2_INITIATE_CELL};
