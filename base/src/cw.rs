//! Fixed-layout control words.
//!
//! The machine saves and restores processor state through a small
//! family of Flag=1 words: the Mark Stack Control Word (MSCW) records
//! the caller's frame at a procedure mark, the Return Control Word
//! (RCW) records the program cursor and character-mode cursors at a
//! call, the Initiate Control Word (INCW) records everything needed to
//! cold-start a processor context, and the Loop Control Word (LCW)
//! records a character-mode loop.  Each is represented here as a plain
//! struct with exact `from_word`/`to_word` conversions so the emulator
//! never manipulates their fields through raw shifts.

use super::word::{
    core_field, f_field, l_field, r_field, to_core, to_f, to_l, to_r, Addr, Word, ARGF, CONTIN,
    CORE, DFLAG, FLAG, INTEGR, MODEF, PRESENT, PROGF, WCOUNT, WCOUNT_V,
};

const MSCW_SALF: Word = 0o0200000000000000; // bit 43
const MSCW_MSFF: Word = 0o0100000000000000; // bit 42

const RCW_G_V: u32 = 32;
const RCW_H_V: u32 = 35;
const RCW_K_V: u32 = 38;
const RCW_V_V: u32 = 41;
const RCW_VARF: Word = 0o0400000000000000; // bit 44

const INCW_R_V: u32 = 15;
const INCW_NCSF: Word = 1 << 24;
const INCW_SALF: Word = 1 << 25;
const INCW_MSFF: Word = 1 << 26;
const INCW_CWMF: Word = 1 << 27;
const INCW_VARF: Word = 1 << 28;
const INCW_AROF: Word = 1 << 29;
const INCW_BROF: Word = 1 << 30;

const LCW_REPEAT_V: u32 = 32;

/// Mark Stack Control Word: the caller's frame pointer, register-file
/// base and subroutine/mark flags, pushed by MKS and consumed on
/// return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mscw {
    pub f: Addr,
    pub r: Addr,
    pub salf: bool,
    pub msff: bool,
}

impl Mscw {
    pub fn to_word(self) -> Word {
        let mut w = FLAG | PRESENT | to_f(self.f) | to_r(self.r);
        if self.salf {
            w |= MSCW_SALF;
        }
        if self.msff {
            w |= MSCW_MSFF;
        }
        w
    }

    pub fn from_word(w: Word) -> Mscw {
        Mscw {
            f: f_field(w),
            r: r_field(w),
            salf: w & MSCW_SALF != 0,
            msff: w & MSCW_MSFF != 0,
        }
    }
}

/// Return Control Word: program cursor (C, L), frame link F, both
/// character-mode cursor offsets, and the variant flag.  Word-mode and
/// character-mode calls share the layout; word-mode simply leaves the
/// cursor fields zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rcw {
    pub c: Addr,
    pub l: u8,
    pub f: Addr,
    pub g: u8,
    pub h: u8,
    pub k: u8,
    pub v: u8,
    pub varf: bool,
}

impl Rcw {
    pub fn to_word(self) -> Word {
        let mut w = FLAG | PRESENT | to_core(self.c) | to_f(self.f) | to_l(self.l);
        w |= Word::from(self.g & 7) << RCW_G_V;
        w |= Word::from(self.h & 7) << RCW_H_V;
        w |= Word::from(self.k & 7) << RCW_K_V;
        w |= Word::from(self.v & 7) << RCW_V_V;
        if self.varf {
            w |= RCW_VARF;
        }
        w
    }

    pub fn from_word(w: Word) -> Rcw {
        Rcw {
            c: core_field(w),
            l: l_field(w),
            f: f_field(w),
            g: ((w >> RCW_G_V) & 7) as u8,
            h: ((w >> RCW_H_V) & 7) as u8,
            k: ((w >> RCW_K_V) & 7) as u8,
            v: ((w >> RCW_V_V) & 7) as u8,
            varf: w & RCW_VARF != 0,
        }
    }

    /// The packed source cursor offset (character and bit).
    pub fn gh(&self) -> u8 {
        (self.g << 3) | self.h
    }

    /// The packed destination cursor offset.
    pub fn kv(&self) -> u8 {
        (self.k << 3) | self.v
    }
}

/// Initiate Control Word: the complete stack/mode context needed to
/// start (or resume) a processor, written by the interrupt store
/// sequence and consumed by processor initiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Incw {
    pub s: Addr,
    pub r: Addr,
    pub ncsf: bool,
    pub salf: bool,
    pub msff: bool,
    pub cwmf: bool,
    pub varf: bool,
    pub arof: bool,
    pub brof: bool,
}

impl Incw {
    pub fn to_word(self) -> Word {
        let mut w = FLAG | to_core(self.s) | Word::from(self.r >> 6) << INCW_R_V;
        if self.ncsf {
            w |= INCW_NCSF;
        }
        if self.salf {
            w |= INCW_SALF;
        }
        if self.msff {
            w |= INCW_MSFF;
        }
        if self.cwmf {
            w |= INCW_CWMF;
        }
        if self.varf {
            w |= INCW_VARF;
        }
        if self.arof {
            w |= INCW_AROF;
        }
        if self.brof {
            w |= INCW_BROF;
        }
        w
    }

    pub fn from_word(w: Word) -> Incw {
        Incw {
            s: core_field(w),
            r: (((w >> INCW_R_V) & 0o777) as Addr) << 6,
            ncsf: w & INCW_NCSF != 0,
            salf: w & INCW_SALF != 0,
            msff: w & INCW_MSFF != 0,
            cwmf: w & INCW_CWMF != 0,
            varf: w & INCW_VARF != 0,
            arof: w & INCW_AROF != 0,
            brof: w & INCW_BROF != 0,
        }
    }
}

/// Loop Control Word: the remaining repeat count and the program
/// cursor of the loop body, held in the X register while a
/// character-mode loop runs.  The `m` field is only meaningful in the
/// copy saved by the interrupt store sequence, where it preserves the
/// source word address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lcw {
    pub repeat: u8,
    pub c: Addr,
    pub l: u8,
    pub m: Addr,
}

impl Lcw {
    pub fn to_word(self) -> Word {
        FLAG | to_core(self.c)
            | to_l(self.l)
            | to_f(self.m)
            | Word::from(self.repeat & 0o77) << LCW_REPEAT_V
    }

    pub fn from_word(w: Word) -> Lcw {
        Lcw {
            repeat: ((w >> LCW_REPEAT_V) & 0o77) as u8,
            c: core_field(w),
            l: l_field(w),
            m: f_field(w),
        }
    }
}

/// A character-mode address word: a word address plus character and
/// bit offsets, packed with the cursor offsets in the same positions
/// the RCW uses.  Built and consumed by the cursor store and recall
/// operators (SCA, SSA, RSA, TSA and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pointer {
    pub addr: Addr,
    pub ch: u8,
    pub bit: u8,
}

impl Pointer {
    pub fn to_word(self) -> Word {
        FLAG | PRESENT
            | to_core(self.addr)
            | Word::from(self.ch & 7) << RCW_G_V
            | Word::from(self.bit & 7) << RCW_H_V
    }

    pub fn from_word(w: Word) -> Pointer {
        Pointer {
            addr: core_field(w),
            ch: ((w >> RCW_G_V) & 7) as u8,
            bit: ((w >> RCW_H_V) & 7) as u8,
        }
    }

    /// Packed character-and-bit offset in GH/KV form.
    pub fn offsets(&self) -> u8 {
        (self.ch << 3) | self.bit
    }
}

/// Read-only view of a descriptor word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub Word);

impl Descriptor {
    pub fn is_flagged(w: Word) -> bool {
        w & FLAG != 0
    }

    pub fn present(&self) -> bool {
        self.0 & PRESENT != 0
    }

    pub fn is_program(&self) -> bool {
        self.0 & PROGF != 0
    }

    /// Program descriptor expects a marked stack (arguments).
    pub fn args(&self) -> bool {
        self.0 & ARGF != 0
    }

    /// Program descriptor enters character mode.
    pub fn char_mode(&self) -> bool {
        self.0 & MODEF != 0
    }

    pub fn integer(&self) -> bool {
        self.0 & INTEGR != 0
    }

    pub fn continuity(&self) -> bool {
        self.0 & CONTIN != 0
    }

    pub fn double(&self) -> bool {
        self.0 & DFLAG != 0
    }

    pub fn word_count(&self) -> u16 {
        ((self.0 & WCOUNT) >> WCOUNT_V) as u16
    }

    pub fn address(&self) -> Addr {
        (self.0 & CORE) as Addr
    }

    /// Build a present data descriptor (used by DESC when the target
    /// is a plain operand).
    pub fn data(address: Addr, word_count: u16) -> Word {
        FLAG | PRESENT | (Word::from(word_count) << WCOUNT_V) & WCOUNT | to_core(address)
    }
}
