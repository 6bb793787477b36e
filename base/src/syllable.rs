//! Instruction syllables.
//!
//! A syllable is a 12-bit instruction unit; four of them pack into one
//! 48-bit program word, syllable 0 leftmost.  In word mode the low two
//! bits of the syllable select the class:
//!
//! | low bits | class | remaining 10 bits            |
//! | -------- | ----- | ---------------------------- |
//! | 00       | LITC  | literal value                |
//! | 01       | OPR   | operator (group and variant) |
//! | 10       | OPDC  | operand-call address         |
//! | 11       | DESC  | descriptor-call address      |
//!
//! An operator syllable subdivides again: its low six bits name an
//! operator group and its high six bits a variant within the group, so
//! operators read naturally as four octal digits ending in an odd
//! class digit (the arithmetic group is 0oVV01, the relational group
//! 0oVV15, and so on).  In character mode the low six bits of every
//! syllable are the opcode and the high six bits are a repeat or
//! length field.
//!
//! Decoding is table-driven: undecodable operators map to `None`, and
//! the executor treats them as no-ops rather than stopping, which is
//! what the hardware did.

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

use super::word::Word;

pub const SYLLABLE_MASK: u16 = 0o7777;

/// Extract syllable `l` (0 = leftmost) of a program word.
#[inline]
pub fn syllable_of(w: Word, l: u8) -> u16 {
    debug_assert!(l < 4);
    ((w >> (36 - 12 * u32::from(l))) as u16) & SYLLABLE_MASK
}

/// A decoded word-mode syllable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSyllable {
    /// Push a 10-bit literal.
    Litc(u16),
    /// Operand call on a 10-bit relative address.
    Opdc(u16),
    /// Descriptor call on a 10-bit relative address.
    Desc(u16),
    /// A named operator, or `None` for an undefined operator pattern.
    Opr(Option<WordOp>),
}

impl WordSyllable {
    pub fn decode(t: u16) -> WordSyllable {
        let rest = (t >> 2) & 0o1777;
        match t & 3 {
            0 => WordSyllable::Litc(rest),
            2 => WordSyllable::Opdc(rest),
            3 => WordSyllable::Desc(rest),
            _ => WordSyllable::Opr(WordOp::decode(t)),
        }
    }
}

macro_rules! word_ops {
    ($( $name:ident = ($group:literal, $variant:literal) ),* $(,)?) => {
        /// The word-mode operator set.  Each operator is identified by
        /// its (group, variant) pair; `syllable()` and `decode()`
        /// convert between the enum and the packed 12-bit form.
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum WordOp {
            $( $name, )*
        }

        impl WordOp {
            pub const ALL: &'static [WordOp] = &[ $( WordOp::$name, )* ];

            /// The packed syllable value of this operator.
            pub fn syllable(self) -> u16 {
                match self {
                    $( WordOp::$name => ($variant << 6) | $group, )*
                }
            }

            /// Decode an operator syllable; `None` if the group/variant
            /// pair names nothing.
            pub fn decode(t: u16) -> Option<WordOp> {
                let group = t & 0o77;
                let variant = (t >> 6) & 0o77;
                match (group, variant) {
                    $( ($group, $variant) => Some(WordOp::$name), )*
                    _ => None,
                }
            }
        }

        impl Display for WordOp {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $( WordOp::$name => stringify!($name), )*
                })
            }
        }
    };
}

word_ops! {
    // Arithmetic (group 0o01).
    ADD = (0o01, 0o01),
    SUB = (0o01, 0o03),
    MUL = (0o01, 0o04),
    DIV = (0o01, 0o10),
    IDV = (0o01, 0o30),
    RDV = (0o01, 0o70),
    // Double-precision arithmetic (group 0o05).
    DLA = (0o05, 0o01),
    DLS = (0o05, 0o03),
    DLM = (0o05, 0o04),
    DLD = (0o05, 0o10),
    // Logical (group 0o11).
    LNG = (0o11, 0o01),
    LOR = (0o11, 0o02),
    LND = (0o11, 0o04),
    LQV = (0o11, 0o10),
    MOP = (0o11, 0o20),
    MDS = (0o11, 0o40),
    // Relational (group 0o15).
    EQL = (0o15, 0o01),
    NEQ = (0o15, 0o02),
    GTR = (0o15, 0o04),
    GEQ = (0o15, 0o10),
    LSS = (0o15, 0o20),
    LEQ = (0o15, 0o40),
    // Branches (group 0o21).
    BBC = (0o21, 0o01),
    BFC = (0o21, 0o02),
    BBW = (0o21, 0o04),
    BFW = (0o21, 0o10),
    // Store and load (group 0o25).
    STD = (0o25, 0o01),
    SND = (0o25, 0o02),
    ISD = (0o25, 0o04),
    ISN = (0o25, 0o10),
    LOD = (0o25, 0o20),
    CID = (0o25, 0o41),
    CIN = (0o25, 0o42),
    // Stack and sign manipulation (group 0o31).
    DUP = (0o31, 0o01),
    XCH = (0o31, 0o02),
    DEL = (0o31, 0o04),
    SSN = (0o31, 0o10),
    CHS = (0o31, 0o20),
    SSP = (0o31, 0o40),
    // Subroutine linkage (group 0o35).
    MKS = (0o35, 0o01),
    CMN = (0o35, 0o02),
    COC = (0o35, 0o03),
    RTN = (0o35, 0o04),
    CDC = (0o35, 0o05),
    RTS = (0o35, 0o10),
    XIT = (0o35, 0o20),
    BRT = (0o35, 0o40),
    // Bit-field operators (group 0o41).
    FTF = (0o41, 0o01),
    FTC = (0o41, 0o02),
    CTC = (0o41, 0o04),
    CTF = (0o41, 0o10),
    ISO = (0o41, 0o20),
    TRB = (0o41, 0o21),
    FCL = (0o41, 0o22),
    FCE = (0o41, 0o24),
    // Indexing (group 0o45).
    INX = (0o45, 0o01),
    // Control state and I/O (group 0o51).
    ITI = (0o51, 0o01),
    SFI = (0o51, 0o02),
    SFT = (0o51, 0o03),
    IP1 = (0o51, 0o04),
    IP2 = (0o51, 0o05),
    IIO = (0o51, 0o06),
    PRL = (0o51, 0o07),
    IOR = (0o51, 0o10),
    HP2 = (0o51, 0o11),
    TUS = (0o51, 0o12),
    TIO = (0o51, 0o14),
    RTR = (0o51, 0o15),
    ZP1 = (0o51, 0o16),
    IFT = (0o51, 0o17),
}

macro_rules! char_ops {
    ($( $name:ident = $code:literal ),* $(,)?) => {
        /// The character-mode operator set.  The opcode lives in the
        /// low six bits of the syllable; the high six bits carry the
        /// repeat or field-length count.
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum CharOp {
            $( $name, )*
        }

        impl CharOp {
            pub const ALL: &'static [CharOp] = &[ $( CharOp::$name, )* ];

            pub fn opcode(self) -> u16 {
                match self {
                    $( CharOp::$name => $code, )*
                }
            }

            /// Build a full syllable from this opcode and a repeat
            /// field.
            pub fn syllable(self, field: u8) -> u16 {
                (u16::from(field & 0o77) << 6) | self.opcode()
            }

            pub fn decode(t: u16) -> Option<CharOp> {
                match t & 0o77 {
                    $( $code => Some(CharOp::$name), )*
                    _ => None,
                }
            }
        }

        impl Display for CharOp {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $( CharOp::$name => stringify!($name), )*
                })
            }
        }
    };
}

char_ops! {
    EXC = 0o00,
    TRS = 0o01,
    TRN = 0o02,
    TRZ = 0o03,
    TRP = 0o04,
    TBN = 0o05,
    CEQ = 0o10,
    CNE = 0o11,
    CGR = 0o12,
    CEG = 0o13,
    CLS = 0o14,
    CEL = 0o15,
    FAD = 0o20,
    FSU = 0o21,
    OCV = 0o22,
    ICV = 0o23,
    BIT = 0o24,
    BIS = 0o25,
    BIR = 0o26,
    SFS = 0o30,
    SRS = 0o31,
    SFD = 0o32,
    SRD = 0o33,
    BNS = 0o34,
    ENS = 0o35,
    JFC = 0o40,
    JRC = 0o41,
    JNC = 0o42,
    JFW = 0o43,
    JRW = 0o44,
    CRF = 0o45,
    RSA = 0o50,
    RDA = 0o51,
    RCA = 0o52,
    SCA = 0o53,
    SDA = 0o54,
    SSA = 0o55,
    TSA = 0o56,
    TDA = 0o57,
}

/// The repeat/field count of a character-mode syllable.
#[inline]
pub fn char_field(t: u16) -> u8 {
    ((t >> 6) & 0o77) as u8
}

/// Pack four syllables into a program word.
pub fn pack_syllables(s: [u16; 4]) -> Word {
    s.iter().fold(0u64, |w, syl| {
        (w << 12) | u64::from(syl & SYLLABLE_MASK)
    })
}
