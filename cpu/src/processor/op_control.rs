//! Control-state operators and the interrupt save/restore sequences.
//!
//! The two-phase fault protocol meets its second phase here.  ITI
//! scans (own Q, IAR, stopped P2's Q, in that priority) and services
//! exactly one condition per execution by clearing its bit and
//! vectoring to its cell.  `store_interrupt` is the single state-save
//! sequence shared by SFI, SFT and forced interrupts; `initiate` is
//! its inverse, consuming an INCW.  The saved context lands at fixed
//! offsets from R: the INCW at R+0o10, the initiate RCW at R+0o11 and
//! the packed Q word at R+0o12.
//!
//! All of the group-0o51 operators, ZP1 included, are no-ops in
//! normal state, as on the hardware; user code cannot reach them.

use tracing::{event, Level};

use base::prelude::*;

use crate::irq::{self, Pending, INTERRUPT_ENTRY, IRQ_IO_BUSY, IRQ_P2_BUSY};
use crate::stop::ExecutionStop;

use super::{Abandon, OpResult, Processor};

/// Memory cell holding the INCW consumed by IP2; IIO parks the I/O
/// descriptor pointer here for the channel subsystem.
pub const IO_CONTROL_CELL: Addr = 0o10;

/// Offsets from R of the interrupt save area.
pub const SAVE_INCW: Addr = 0o10;
pub const SAVE_RCW: Addr = 0o11;
pub const SAVE_Q: Addr = 0o12;

impl Processor<'_> {
    /// ITI: service at most one pending interrupt.
    pub(crate) fn op_interrogate_interrupts(&mut self) -> OpResult {
        if self.state.ncsf {
            return Ok(());
        }
        let p2_q = if self.index.is_p1() && !self.shared.p2_run {
            Some(self.shared.q[1])
        } else {
            None
        };
        let pending = irq::next_pending(self.q(), self.shared.iar, !self.index.is_p1(), p2_q);
        match pending {
            None => self.check_idle()?,
            Some(Pending::Own { bit, vector }) => {
                self.shared.q[self.index.number()] &= !bit;
                self.vector_to(vector);
            }
            Some(Pending::Machine {
                bit,
                vector,
                channel,
            }) => {
                self.shared.iar &= !bit;
                if let Some(ch) = channel {
                    self.channels.chan_release(ch);
                }
                self.vector_to(vector);
            }
            Some(Pending::Other { bit, vector }) => {
                self.shared.q[1] &= !bit;
                self.vector_to(vector);
            }
        }
        Ok(())
    }

    fn vector_to(&mut self, cell: Addr) {
        event!(
            Level::DEBUG,
            "{:?}: vectoring to interrupt cell {cell:#o}",
            self.index
        );
        self.jump_to(cell, 0);
    }

    /// An ITI that found nothing, executed by processor 1, is the
    /// place to recognise the operating system's idle loop (ITI
    /// followed by a branch back to it) and let the host sleep.
    fn check_idle(&mut self) -> OpResult {
        if !self.index.is_p1() {
            return Ok(());
        }
        let here = self.cursor_index();
        let litc_3 = 3 << 2;
        let bbw = WordOp::BBW.syllable();
        if self.peek_syllable(here)? == litc_3 && self.peek_syllable(here + 1)? == bbw {
            event!(Level::TRACE, "idle loop recognised at C={:#o}", self.state.c);
            self.shared.idle = true;
        }
        Ok(())
    }

    fn peek_syllable(&mut self, index: u32) -> Result<u16, Abandon> {
        let c = ((index / 4) & u32::from(CORE as Addr)) as Addr;
        let w = self.fetch_word(c)?;
        Ok(syllable_of(w, (index % 4) as u8))
    }

    /// SFI and SFT, and (with `forced`) the hardware's own response
    /// to a pending interrupt in normal state.
    pub(crate) fn op_store_for_interrupt(&mut self, forced: bool, test: bool) -> OpResult {
        if self.state.ncsf && !forced {
            return Ok(());
        }
        self.store_interrupt(forced, test)
    }

    /// The single state-save sequence.  Stack registers spill in an
    /// order `initiate` can undo (character mode saves the loop word
    /// and source address too), then the context words land in the
    /// save area at R.
    pub(crate) fn store_interrupt(&mut self, forced: bool, test: bool) -> OpResult {
        let arof = self.state.arof;
        let brof = self.state.brof;
        if self.state.cwmf {
            if arof {
                let a = self.state.a;
                self.spill(a)?;
            }
            if brof {
                let b = self.state.b;
                self.spill(b)?;
            }
            let lcw = Lcw {
                m: self.state.m,
                ..Lcw::from_word(self.state.x)
            };
            self.spill(lcw.to_word())?;
        } else {
            if brof {
                let b = self.state.b;
                self.spill(b)?;
            }
            if arof {
                let a = self.state.a;
                self.spill(a)?;
            }
        }
        let incw = Incw {
            s: self.state.s,
            r: self.state.r,
            ncsf: self.state.ncsf,
            salf: self.state.salf,
            msff: self.state.msff,
            cwmf: self.state.cwmf,
            varf: self.state.varf,
            arof,
            brof,
        };
        let rcw = Rcw {
            c: self.state.c,
            l: self.state.l,
            f: self.state.f,
            g: self.state.gh >> 3,
            h: self.state.gh & 7,
            k: self.state.kv >> 3,
            v: self.state.kv & 7,
            varf: self.state.varf,
        };
        let r = self.state.r;
        self.store_word_unfenced(r + SAVE_INCW, incw.to_word())?;
        self.store_word_unfenced(r + SAVE_RCW, rcw.to_word())?;
        let q = self.q();
        self.shared.q[self.index.number()] = 0;
        self.store_word_unfenced(r + SAVE_Q, FLAG | Word::from(q))?;
        self.state.r = 0;
        self.state.msff = false;
        self.state.salf = false;
        self.state.cwmf = false;
        self.state.varf = false;
        self.state.arof = false;
        self.state.brof = false;
        self.state.prof = false;
        self.state.trof = false;
        self.state.ncsf = false;
        if test {
            self.jump_to(0, 0);
        } else if forced {
            if self.index.is_p1() {
                self.vector_to(INTERRUPT_ENTRY);
            } else {
                // Processor 2 parks itself and tells processor 1.
                self.state.hltf = true;
                self.shared.p2_run = false;
                self.shared.iar |= IRQ_P2_BUSY;
            }
        }
        Ok(())
    }

    /// Restore a context from an INCW, popping the initiate RCW (and
    /// in character mode the loop word) plus whichever top-of-stack
    /// registers the INCW says were valid.
    pub(crate) fn initiate(&mut self, incw: Incw) -> OpResult {
        // Pop with control-state rights; the INCW's own state takes
        // over at the end.
        self.state.ncsf = false;
        self.state.s = incw.s;
        self.state.r = incw.r;
        self.state.salf = incw.salf;
        self.state.msff = incw.msff;
        self.state.cwmf = incw.cwmf;
        self.state.arof = false;
        self.state.brof = false;
        let rcw = Rcw::from_word(self.unspill()?);
        self.state.c = rcw.c;
        self.state.l = rcw.l;
        self.state.f = rcw.f;
        self.state.gh = rcw.gh();
        self.state.kv = rcw.kv();
        self.state.varf = rcw.varf;
        if incw.cwmf {
            let lcw = Lcw::from_word(self.unspill()?);
            self.state.m = lcw.m;
            self.state.x = Lcw { m: 0, ..lcw }.to_word();
            if incw.brof {
                self.state.b = self.unspill()?;
                self.state.brof = true;
            }
            if incw.arof {
                self.state.a = self.unspill()?;
                self.state.arof = true;
            }
        } else {
            if incw.arof {
                self.state.a = self.unspill()?;
                self.state.arof = true;
            }
            if incw.brof {
                self.state.b = self.unspill()?;
                self.state.brof = true;
            }
        }
        self.state.prof = false;
        self.state.trof = false;
        // Processor 2 has no control-state hardware: it always comes
        // up in normal state whatever the INCW says.
        self.state.ncsf = incw.ncsf || !self.index.is_p1();
        self.state.hltf = false;
        event!(
            Level::DEBUG,
            "{:?}: initiated at C={:#o} L={} (ncsf {})",
            self.index,
            self.state.c,
            self.state.l,
            self.state.ncsf,
        );
        Ok(())
    }

    /// IP1: consume the INCW on top of the stack and become that
    /// context.
    pub(crate) fn op_initiate_p1(&mut self) -> OpResult {
        if self.state.ncsf {
            return Ok(());
        }
        let w = self.pop()?;
        self.initiate(Incw::from_word(w))
    }

    /// IP2: ask the system to start processor 2 from the INCW in the
    /// I/O control cell.  Only processor 1 can do this.
    pub(crate) fn op_initiate_p2(&mut self) -> OpResult {
        if self.state.ncsf || !self.index.is_p1() {
            return Ok(());
        }
        self.empty_ab()?;
        self.shared.start_p2 = true;
        Ok(())
    }

    /// IIO: consume the I/O descriptor pointer from the top of the
    /// stack, park it in the control cell and hand it to a free
    /// channel, or report all channels busy.
    pub(crate) fn op_initiate_io(&mut self) -> OpResult {
        if self.state.ncsf {
            return Ok(());
        }
        let w = self.save_tos()?;
        self.state.s = self.state.s.wrapping_sub(1) & (CORE as Addr);
        self.store_word_unfenced(IO_CONTROL_CELL, w)?;
        let iod_addr = core_field(w);
        match self.channels.find_chan() {
            None => {
                self.shared.iar |= IRQ_IO_BUSY;
            }
            Some(ch) => {
                event!(Level::DEBUG, "starting I/O on channel {ch} from {iod_addr:#o}");
                self.channels.start_io(ch, iod_addr, self.mem);
            }
        }
        Ok(())
    }

    /// PRL and IOR: clear or set the presence bit of the word a
    /// popped pointer names, releasing or re-arming an I/O area.
    pub(crate) fn op_release(&mut self, set_present: bool) -> OpResult {
        if self.state.ncsf {
            return Ok(());
        }
        let a = self.pop()?;
        let addr = if Descriptor::is_flagged(a) {
            Descriptor(a).address()
        } else {
            core_field(a)
        };
        let w = self.fetch_word(addr)?;
        let w = if set_present {
            w | PRESENT
        } else {
            w & !PRESENT & WORD_MASK
        };
        self.store_word(addr, w)
    }

    pub(crate) fn op_halt_p2(&mut self) -> OpResult {
        if self.state.ncsf || !self.index.is_p1() {
            return Ok(());
        }
        self.shared.p2_run = false;
        self.shared.iar |= IRQ_P2_BUSY;
        Ok(())
    }

    pub(crate) fn op_terminal_status(&mut self) -> OpResult {
        if self.state.ncsf {
            return Ok(());
        }
        let w = self.channels.terminal_status();
        self.push(w)
    }

    pub(crate) fn op_io_status(&mut self) -> OpResult {
        if self.state.ncsf {
            return Ok(());
        }
        let w = self.channels.io_status();
        self.push(w)
    }

    /// RTR: read the interval timer into the stack.
    pub(crate) fn op_read_timer(&mut self) -> OpResult {
        if self.state.ncsf {
            return Ok(());
        }
        let t = self.shared.timer;
        self.push(integer(i64::from(t)))
    }

    /// ZP1: the halt-button poll point.
    pub(crate) fn op_halt_check(&mut self) -> OpResult {
        if self.state.ncsf {
            return Ok(());
        }
        if self.shared.halt_requested && self.index.is_p1() {
            self.state.hltf = true;
            return Err(Abandon::Stop(ExecutionStop::Halted));
        }
        Ok(())
    }
}
