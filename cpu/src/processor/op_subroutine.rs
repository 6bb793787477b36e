//! Subroutine linkage: operand and descriptor calls, stack marks,
//! program-descriptor entry, the return family, and entry to and exit
//! from character mode.
//!
//! Linkage runs through two control words in the memory stack.  MKS
//! (or the entry sequence itself) pushes an MSCW recording the
//! caller's frame; the entry pushes an RCW recording the program
//! cursor, with its F field linking back to the MSCW.  F points at
//! the newest RCW, so returns find everything from F alone.

use tracing::{event, Level};

use base::prelude::*;

use super::{OpResult, Processor};

impl Processor<'_> {
    /// OPDC: fetch a word at a relative address and treat it as an
    /// operand.
    pub(crate) fn operand_call(&mut self, off: u16) -> OpResult {
        let addr = self.relative_addr(off);
        let w = self.fetch_word(addr)?;
        self.enter_operand(w)
    }

    /// DESC: fetch a word at a relative address and treat it as a
    /// descriptor, building one when the word is a plain operand.
    pub(crate) fn descriptor_call(&mut self, off: u16) -> OpResult {
        let addr = self.relative_addr(off);
        let w = self.fetch_word(addr)?;
        self.enter_descriptor(w, addr)
    }

    /// Operand semantics for a fetched word: plain words push, data
    /// descriptors load the word they describe, program descriptors
    /// enter the subroutine.  COC shares this path.
    pub(crate) fn enter_operand(&mut self, w: Word) -> OpResult {
        if !Descriptor::is_flagged(w) {
            return self.push(w);
        }
        let d = Descriptor(w);
        if d.is_program() {
            self.enter_subr(&d, false)
        } else {
            self.presence_check(&d)?;
            let v = self.fetch_word(d.address())?;
            self.push(v)
        }
    }

    /// Descriptor semantics for a fetched word.  CDC shares this
    /// path; `addr` is where the word was found, used to manufacture
    /// a descriptor for a plain operand.
    pub(crate) fn enter_descriptor(&mut self, w: Word, addr: Addr) -> OpResult {
        if !Descriptor::is_flagged(w) {
            return self.push(Descriptor::data(addr, 0));
        }
        let d = Descriptor(w);
        if d.is_program() {
            self.enter_subr(&d, true)
        } else {
            self.presence_check(&d)?;
            self.push(w)
        }
    }

    /// COC/CDC: the descriptor was built by the program and sits on
    /// top of the stack instead of in memory.
    pub(crate) fn op_construct_call(&mut self, descriptor_style: bool) -> OpResult {
        let w = self.pop()?;
        if !descriptor_style {
            return self.enter_operand(w);
        }
        if Descriptor::is_flagged(w) {
            self.enter_descriptor(w, 0)
        } else {
            // A constructed plain operand has no home; give it one on
            // the stack and describe that.
            self.spill(w)?;
            let here = self.state.s;
            self.push(Descriptor::data(here, 0))
        }
    }

    /// MKS: mark the stack for an upcoming call.
    pub(crate) fn op_mark_stack(&mut self) -> OpResult {
        self.empty_ab()?;
        let mscw = Mscw {
            f: self.state.f,
            r: self.state.r,
            salf: self.state.salf,
            msff: self.state.msff,
        };
        self.spill(mscw.to_word())?;
        self.state.f = self.state.s;
        self.state.msff = true;
        Ok(())
    }

    fn push_rcw(&mut self) -> OpResult {
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
        self.spill(rcw.to_word())?;
        self.state.f = self.state.s;
        Ok(())
    }

    /// Enter a program descriptor.
    ///
    /// The argument flag must agree with the mark-stack flip-flop: an
    /// entry with neither (a descriptor touched incidentally) is a
    /// no-op, and a mismatch synthesizes the missing MSCW so the
    /// return path always finds a complete linkage pair.
    pub(crate) fn enter_subr(&mut self, d: &Descriptor, via_desc: bool) -> OpResult {
        self.presence_check(d)?;
        if !d.args() && !self.state.msff {
            return Ok(());
        }
        event!(
            Level::TRACE,
            "{:?}: entering subroutine at {:#o} (char mode {})",
            self.index,
            d.address(),
            d.char_mode(),
        );
        self.empty_ab()?;
        if d.args() != self.state.msff {
            let mscw = Mscw {
                f: self.state.f,
                r: self.state.r,
                salf: self.state.salf,
                msff: self.state.msff,
            };
            self.spill(mscw.to_word())?;
            self.state.f = self.state.s;
        }
        self.push_rcw()?;
        self.jump_to(d.address(), 0);
        self.state.salf = true;
        self.state.msff = false;
        self.state.varf = via_desc;
        if d.char_mode() {
            self.state.cwmf = true;
            self.state.r = 0;
            self.state.gh = 0;
            self.state.kv = 0;
            self.state.m = 0;
            self.state.x = 0;
        }
        Ok(())
    }

    /// CMN: enter character mode in line, with the same MSCW/RCW pair
    /// a call would leave so that EXC returns exactly here.  The word
    /// popped from the stack sets the source cursor; the destination
    /// starts on top of it.
    pub(crate) fn op_enter_char_mode(&mut self) -> OpResult {
        let ptr = self.pop()?;
        self.empty_ab()?;
        let mscw = Mscw {
            f: self.state.f,
            r: self.state.r,
            salf: self.state.salf,
            msff: self.state.msff,
        };
        self.spill(mscw.to_word())?;
        self.state.f = self.state.s;
        self.push_rcw()?;
        self.state.cwmf = true;
        self.state.salf = true;
        self.state.msff = false;
        self.state.varf = false;
        self.state.r = 0;
        self.state.x = 0;
        if Descriptor::is_flagged(ptr) {
            let p = Pointer::from_word(ptr);
            self.state.m = p.addr;
            self.state.gh = p.offsets();
        } else {
            self.state.m = core_field(ptr);
            self.state.gh = 0;
        }
        self.state.s = self.state.m;
        self.state.kv = self.state.gh;
        self.state.arof = false;
        self.state.brof = false;
        Ok(())
    }

    /// The return family.  RTN restores the full MSCW context and
    /// pushes the subroutine's value; XIT restores the context and
    /// discards the value; RTS returns a value but leaves the MSCW
    /// chain alone; BRT merely unwinds to the RCW.
    pub(crate) fn op_return(&mut self, op: WordOp) -> OpResult {
        let (restore_mscw, with_value) = match op {
            WordOp::RTN => (true, true),
            WordOp::XIT => (true, false),
            WordOp::RTS => (false, true),
            WordOp::BRT => (false, false),
            _ => unreachable!("not a return operator: {op}"),
        };
        let value = if with_value { Some(self.pop()?) } else { None };
        self.exit_via_rcw(restore_mscw)?;
        if let Some(v) = value {
            self.push(v)?;
        }
        Ok(())
    }

    /// Unwind through the RCW at F (and, when asked, the MSCW it
    /// links to), restoring the saved cursor and frame.  Shared by
    /// the word-mode returns and character mode's EXC.
    pub(crate) fn exit_via_rcw(&mut self, restore_mscw: bool) -> OpResult {
        let rcw = Rcw::from_word(self.fetch_word(self.state.f)?);
        self.jump_to(rcw.c, rcw.l);
        self.state.gh = rcw.gh();
        self.state.kv = rcw.kv();
        self.state.varf = rcw.varf;
        if restore_mscw {
            let mscw = Mscw::from_word(self.fetch_word(rcw.f)?);
            self.state.s = rcw.f.wrapping_sub(1) & (CORE as Addr);
            self.state.f = mscw.f;
            self.state.r = mscw.r;
            self.state.salf = mscw.salf;
            self.state.msff = mscw.msff;
        } else {
            self.state.s = self.state.f.wrapping_sub(1) & (CORE as Addr);
            self.state.f = rcw.f;
        }
        self.state.cwmf = false;
        self.state.arof = false;
        self.state.brof = false;
        Ok(())
    }
}
