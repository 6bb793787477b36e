//! The processor proper.
//!
//! `CpuState` is one processor's register file.  `Processor` is a
//! short-lived view that borrows one processor's registers together
//! with the things both processors share (memory, the IAR, the I/O
//! channels) and executes syllables against them.  The system object
//! builds a fresh `Processor` for whichever processor's turn it is.
//!
//! Execution of a single syllable either completes, or abandons with
//! a fault already recorded in the Q register, or stops the machine.
//! The `Abandon` type carries the latter two cases through `?` so the
//! operator implementations read linearly.

mod arith;
mod charmode;
mod op_control;
mod op_subroutine;
mod op_word;
mod stack;

pub use op_control::IO_CONTROL_CELL;

#[cfg(test)]
mod tests;

use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

use crate::channel::Channels;
use crate::irq::Q_INVALID_ADDR;
use crate::memory::{MemoryOpFailure, MemoryUnit};
use crate::stop::ExecutionStop;

use arith::DivideVariant;

/// Which of the two processors a `Processor` view is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CpuIndex {
    P1,
    P2,
}

impl CpuIndex {
    pub fn is_p1(self) -> bool {
        matches!(self, CpuIndex::P1)
    }

    pub fn number(self) -> usize {
        match self {
            CpuIndex::P1 => 0,
            CpuIndex::P2 => 1,
        }
    }
}

/// One processor's registers.
///
/// A and B are the two top-of-stack words, valid only when their
/// occupancy flip-flop (AROF, BROF) is set; S points at the highest
/// stack word actually in memory.  C and L locate the next program
/// syllable, with P caching the current program word (PROF) and T the
/// fetched syllable (TROF).  In character mode M/GH is the source
/// cursor and S/KV the destination cursor, R holds the tally, and
/// MSFF doubles as the true/false flip-flop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpuState {
    pub a: Word,
    pub b: Word,
    pub x: Word,
    pub y: Word,
    pub arof: bool,
    pub brof: bool,
    pub m: Addr,
    pub s: Addr,
    pub f: Addr,
    pub r: Addr,
    pub c: Addr,
    pub l: u8,
    pub p: Word,
    pub prof: bool,
    pub t: u16,
    pub trof: bool,
    pub gh: u8,
    pub kv: u8,
    pub ncsf: bool,
    pub salf: bool,
    pub cwmf: bool,
    pub msff: bool,
    pub varf: bool,
    pub hltf: bool,
}

impl CpuState {
    pub fn reset(&mut self) {
        *self = CpuState {
            hltf: true,
            ..CpuState::default()
        };
    }
}

/// State owned by the cabinet rather than either processor.  The Q
/// registers live here too so that processor 1 can service a stopped
/// processor 2's faults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SharedState {
    /// Machine-wide interrupt address register.
    pub iar: u16,
    /// Per-processor fault conditions, indexed by `CpuIndex::number`.
    pub q: [u16; 2],
    /// Free-running interval timer, read by RTR.
    pub timer: u8,
    /// Processor 2 is executing.
    pub p2_run: bool,
    /// IP2 was executed; the system initiates processor 2 before its
    /// next turn.
    pub start_p2: bool,
    /// The operator asked the machine to halt (honoured by ZP1).
    pub halt_requested: bool,
    /// Processor 1 was caught in the idle loop with nothing pending.
    pub idle: bool,
}

/// Why the current syllable did not run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Abandon {
    /// A fault was recorded in Q; execution continues with the next
    /// syllable.
    Fault,
    Stop(ExecutionStop),
}

impl From<ExecutionStop> for Abandon {
    fn from(stop: ExecutionStop) -> Abandon {
        Abandon::Stop(stop)
    }
}

pub(crate) type OpResult = Result<(), Abandon>;

/// A borrowed view of one processor plus the shared machine state.
#[derive(Debug)]
pub struct Processor<'a> {
    pub state: &'a mut CpuState,
    pub shared: &'a mut SharedState,
    pub mem: &'a mut MemoryUnit,
    pub channels: &'a mut dyn Channels,
    pub index: CpuIndex,
}

impl Processor<'_> {
    /// This processor's Q register.
    pub fn q(&self) -> u16 {
        self.shared.q[self.index.number()]
    }

    /// Record a fault condition.  Arithmetic and flag faults are only
    /// recorded in normal state; control-state code is trusted to
    /// cope on its own.
    pub(crate) fn raise(&mut self, bit: u16) {
        if self.state.ncsf {
            self.raise_always(bit);
        }
    }

    pub(crate) fn raise_always(&mut self, bit: u16) {
        event!(
            Level::DEBUG,
            "{:?}: fault condition {:#o} raised at C={:#o} L={}",
            self.index,
            bit,
            self.state.c,
            self.state.l,
        );
        self.shared.q[self.index.number()] |= bit;
    }

    /// Read a word, converting failure into an invalid-address fault.
    pub(crate) fn fetch_word(&mut self, addr: Addr) -> Result<Word, Abandon> {
        match self.mem.fetch(addr, self.state.ncsf) {
            Ok(w) => Ok(w),
            Err(e) => Err(self.address_fault(e)),
        }
    }

    pub(crate) fn store_word(&mut self, addr: Addr, value: Word) -> OpResult {
        match self.mem.store(addr, value, self.state.ncsf) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.address_fault(e)),
        }
    }

    /// Store with control-state rights, for the hardware save
    /// sequences that run regardless of the current state.
    pub(crate) fn store_word_unfenced(&mut self, addr: Addr, value: Word) -> OpResult {
        match self.mem.store(addr, value, false) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.address_fault(e)),
        }
    }

    fn address_fault(&mut self, e: MemoryOpFailure) -> Abandon {
        event!(Level::DEBUG, "{:?}: {}", self.index, e);
        // Invalid addresses are recorded even in control state;
        // nothing else would make the failure visible.
        self.raise_always(Q_INVALID_ADDR);
        Abandon::Fault
    }

    /// Execute one syllable.  A fault abandons the syllable but is
    /// not a stop; the fault sits in Q until serviced.
    pub fn step(&mut self) -> Result<(), ExecutionStop> {
        match self.execute_one() {
            Ok(()) => Ok(()),
            Err(Abandon::Fault) => Ok(()),
            Err(Abandon::Stop(stop)) => Err(stop),
        }
    }

    fn execute_one(&mut self) -> OpResult {
        self.fetch_syllable()?;
        let t = self.state.t;
        self.state.trof = false;
        if self.state.cwmf {
            self.execute_char(t)
        } else {
            self.execute_word(t)
        }
    }

    /// Fill T from the program word cache, advancing C/L past the
    /// fetched syllable.
    pub(crate) fn fetch_syllable(&mut self) -> OpResult {
        if !self.state.trof {
            if !self.state.prof {
                self.state.p = self.fetch_word(self.state.c)?;
                self.state.prof = true;
            }
            self.state.t = syllable_of(self.state.p, self.state.l);
            self.state.trof = true;
            self.advance_cursor();
        }
        Ok(())
    }

    fn advance_cursor(&mut self) {
        if self.state.l == 3 {
            self.state.l = 0;
            self.state.c = (self.state.c + 1) & (CORE as Addr);
            self.state.prof = false;
        } else {
            self.state.l += 1;
        }
    }

    /// The cursor as a flat syllable index.
    pub(crate) fn cursor_index(&self) -> u32 {
        u32::from(self.state.c) * 4 + u32::from(self.state.l)
    }

    /// Move the cursor to a flat syllable index and drop the caches.
    pub(crate) fn set_cursor_index(&mut self, index: u32) {
        self.state.c = ((index / 4) & u32::from(CORE as Addr)) as Addr;
        self.state.l = (index % 4) as u8;
        self.state.prof = false;
        self.state.trof = false;
    }

    pub(crate) fn jump_to(&mut self, c: Addr, l: u8) {
        self.state.c = c & (CORE as Addr);
        self.state.l = l & 3;
        self.state.prof = false;
        self.state.trof = false;
    }

    /// Displace the cursor by a syllable count.
    pub(crate) fn branch_syllables(&mut self, disp: u32, forward: bool) {
        let here = self.cursor_index();
        let target = if forward {
            here.wrapping_add(disp)
        } else {
            here.wrapping_sub(disp)
        };
        self.set_cursor_index(target);
    }

    /// Map a 10-bit address syllable field to an absolute address.
    ///
    /// Outside a subroutine the whole field indexes the program
    /// reference table at R.  Inside one (SALF set) the top bits pick
    /// the base: 0 means R with a 9-bit index, 10 means F upward with
    /// 8 bits, 110 means C with 7 bits, and 111 means F downward with
    /// 7 bits (the caller's arguments).
    pub(crate) fn relative_addr(&self, off: u16) -> Addr {
        let off = off & 0o1777;
        let addr = if !self.state.salf {
            self.state.r.wrapping_add(off)
        } else if off & 0o1000 == 0 {
            self.state.r.wrapping_add(off & 0o777)
        } else if off & 0o400 == 0 {
            self.state.f.wrapping_add(off & 0o377)
        } else if off & 0o200 == 0 {
            self.state.c.wrapping_add(off & 0o177)
        } else {
            self.state.f.wrapping_sub(off & 0o177)
        };
        addr & (CORE as Addr)
    }

    fn execute_word(&mut self, t: u16) -> OpResult {
        match WordSyllable::decode(t) {
            WordSyllable::Litc(v) => self.push(integer(i64::from(v))),
            WordSyllable::Opdc(off) => self.operand_call(off),
            WordSyllable::Desc(off) => self.descriptor_call(off),
            WordSyllable::Opr(None) => {
                // The hardware treated undefined operator patterns as
                // no-ops.
                event!(Level::WARN, "undefined operator {t:04o} ignored");
                Ok(())
            }
            WordSyllable::Opr(Some(op)) => self.execute_operator(op),
        }
    }

    fn execute_operator(&mut self, op: WordOp) -> OpResult {
        use WordOp::*;
        match op {
            ADD => self.op_add(false),
            SUB => self.op_add(true),
            MUL => self.op_multiply(),
            DIV => self.op_divide(DivideVariant::Quotient),
            IDV => self.op_divide(DivideVariant::Integer),
            RDV => self.op_divide(DivideVariant::Remainder),
            DLA => self.op_double_add(false),
            DLS => self.op_double_add(true),
            DLM => self.op_double_multiply(),
            DLD => self.op_double_divide(),
            LNG | MOP | MDS => self.op_unary_logical(op),
            LOR | LND | LQV => self.op_binary_logical(op),
            EQL | NEQ | GTR | GEQ | LSS | LEQ => self.op_relational(op),
            BBC => self.op_branch_conditional(false),
            BFC => self.op_branch_conditional(true),
            BBW => self.op_branch_unconditional(false),
            BFW => self.op_branch_unconditional(true),
            STD => self.op_store(true, Integerize::Never),
            SND => self.op_store(false, Integerize::Never),
            ISD => self.op_store(true, Integerize::Always),
            ISN => self.op_store(false, Integerize::Always),
            CID => self.op_store(true, Integerize::WhenMarked),
            CIN => self.op_store(false, Integerize::WhenMarked),
            LOD => self.op_load(),
            DUP => self.op_duplicate(),
            XCH => self.op_exchange(),
            DEL => self.op_delete(),
            SSN => self.op_set_sign(true),
            SSP => self.op_set_sign(false),
            CHS => self.op_change_sign(),
            MKS => self.op_mark_stack(),
            CMN => self.op_enter_char_mode(),
            COC => self.op_construct_call(false),
            CDC => self.op_construct_call(true),
            RTN | RTS | XIT | BRT => self.op_return(op),
            FTF | FTC | CTC | CTF | ISO | TRB | FCL | FCE => self.op_field(op),
            INX => self.op_index(),
            ITI => self.op_interrogate_interrupts(),
            SFI => self.op_store_for_interrupt(false, false),
            SFT => self.op_store_for_interrupt(false, true),
            IP1 => self.op_initiate_p1(),
            IP2 => self.op_initiate_p2(),
            IIO => self.op_initiate_io(),
            PRL => self.op_release(false),
            IOR => self.op_release(true),
            HP2 => self.op_halt_p2(),
            TUS => self.op_terminal_status(),
            TIO => self.op_io_status(),
            RTR => self.op_read_timer(),
            ZP1 => self.op_halt_check(),
            IFT => Err(Abandon::Stop(ExecutionStop::Unimplemented(IFT))),
        }
    }
}

/// When a store operator forces its operand to an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Integerize {
    Never,
    Always,
    /// Only when the target descriptor carries the integer bit.
    WhenMarked,
}

