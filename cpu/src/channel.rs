//! I/O channels.
//!
//! The processor side of I/O is tiny: IIO hands an I/O descriptor
//! address to a free channel, TIO/TUS read back status words, and the
//! interrupt machinery releases a channel when its completion is
//! serviced.  Everything else (what a channel actually does with the
//! descriptor) lives behind this trait, so the emulator core does not
//! care whether it is talking to a line printer model or a test
//! double.
//!
//! `poll` is called once per emulated step and returns the IAR bits
//! the channels newly raise, which keeps channel completion on the
//! same single thread as the processors.

use std::fmt::Debug;

use base::prelude::{Addr, Word};

use crate::memory::MemoryUnit;

pub trait Channels: Debug {
    /// Index of a free channel, if any.
    fn find_chan(&self) -> Option<usize>;

    /// Begin the I/O described by the descriptor at `iod_addr`.
    fn start_io(&mut self, chan: usize, iod_addr: Addr, mem: &mut MemoryUnit);

    /// The channel's completion interrupt has been serviced; it may
    /// accept work again.
    fn chan_release(&mut self, chan: usize);

    /// Advance channel time by one step; returns IAR bits to raise.
    fn poll(&mut self, mem: &mut MemoryUnit) -> u16;

    /// Status word for the TUS operator.
    fn terminal_status(&self) -> Word;

    /// Status word for the TIO operator.
    fn io_status(&self) -> Word;
}

/// A machine with no peripherals fitted.  IIO finds no free channel,
/// which raises the I/O-busy interrupt, and that is the correct
/// behaviour for a cabinet with no channels in it.
#[derive(Debug, Default)]
pub struct NoChannels;

impl Channels for NoChannels {
    fn find_chan(&self) -> Option<usize> {
        None
    }

    fn start_io(&mut self, _chan: usize, _iod_addr: Addr, _mem: &mut MemoryUnit) {}

    fn chan_release(&mut self, _chan: usize) {}

    fn poll(&mut self, _mem: &mut MemoryUnit) -> u16 {
        0
    }

    fn terminal_status(&self) -> Word {
        0
    }

    fn io_status(&self) -> Word {
        0
    }
}
