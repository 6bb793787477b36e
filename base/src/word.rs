//! The B5500 uses 48-bit words, stored here in the low bits of a
//! `u64`.  A word has no static type beyond two leading bits: the Flag
//! bit distinguishes operands (Flag=0) from control words and
//! descriptors (Flag=1), and within the Flag=1 family further sub-flags
//! distinguish data descriptors from program descriptors.  Everything
//! else about a word's interpretation is contextual, so this module
//! provides only pure field extraction and construction functions; the
//! meaning of a field belongs to the caller.
//!
//! An operand holds a sign-magnitude floating-point number whose
//! mantissa is 13 octal digits (39 bits) and whose exponent is a power
//! of eight, six bits plus a sign bit.  The machine's arithmetic is
//! therefore octal-digit arithmetic, not BCD; the `NORM` mask selects
//! the top 3-bit digit of the mantissa.

use std::fmt::{self, Formatter};

/// One 48-bit machine word, kept in the low bits of a u64.  The upper
/// 16 bits of the u64 are always zero for a well-formed word.
pub type Word = u64;

/// A 15-bit core-memory address.
pub type Addr = u16;

pub const WORD_MASK: Word = 0o7777777777777777;

/// The word-or-control flag, bit 47.
pub const FLAG: Word = 0o4000000000000000;
/// Everything below the flag bit.
pub const FWORD: Word = 0o3777777777777777;
/// Mantissa sign, bit 46 (set = negative).
pub const MSIGN: Word = 0o2000000000000000;
/// Exponent sign, bit 45 (set = negative).
pub const ESIGN: Word = 0o1000000000000000;
/// Exponent magnitude, bits 44-39.
pub const EXPO: Word = 0o0770000000000000;
pub const EXPO_V: u32 = 39;
/// Mantissa, bits 38-0: thirteen octal digits.
pub const MANT: Word = 0o0007777777777777;
/// The leading octal digit of the mantissa, bits 38-36.
pub const NORM: Word = 0o0007000000000000;

/// Descriptor presence bit, bit 46.  A clear presence bit on a
/// referenced descriptor is the machine's page-fault equivalent.
pub const PRESENT: Word = 0o2000000000000000;
/// Double-precision data flag on a data descriptor, bit 45.
pub const DFLAG: Word = 0o1000000000000000;
/// Program-descriptor flag, bit 44.
pub const PROGF: Word = 0o0400000000000000;
/// Argument flag on a program descriptor, bit 43: entry expects a
/// marked stack.
pub const ARGF: Word = 0o0200000000000000;
/// Mode flag on a program descriptor, bit 42: entry runs in character
/// mode.
pub const MODEF: Word = 0o0100000000000000;
/// Integer bit on a data descriptor, bit 41.
pub const INTEGR: Word = 0o0040000000000000;
/// Continuity bit on a data descriptor, bit 40.
pub const CONTIN: Word = 0o0020000000000000;
/// Word count of a data descriptor, bits 39-30.
pub const WCOUNT: Word = 0o0017770000000000;
pub const WCOUNT_V: u32 = 30;
/// Core address field, bits 14-0.
pub const CORE: Word = 0o0000000000077777;

/// F (frame pointer) field of a control word, bits 29-15.
pub const FFIELD: Word = 0o0000007777700000;
pub const FFIELD_V: u32 = 15;
/// L (syllable selector) field of a control word, bits 31-30.
pub const LFIELD: Word = 0o0000030000000000;
pub const LFIELD_V: u32 = 30;
/// R (register-file base) field of a control word, bits 41-33.  R's
/// low six bits are always zero, so only address bits 14-6 are stored.
pub const RFIELD: Word = 0o0077700000000000;
pub const RFIELD_V: u32 = 33;

/// Largest representable exponent magnitude.
pub const EXPO_MAX: i32 = 0o77;

pub const CHARS_PER_WORD: u32 = 8;
pub const CHAR_MASK: Word = 0o77;

#[inline]
pub fn core_field(w: Word) -> Addr {
    (w & CORE) as Addr
}

#[inline]
pub fn to_core(a: Addr) -> Word {
    Word::from(a) & CORE
}

#[inline]
pub fn f_field(w: Word) -> Addr {
    ((w & FFIELD) >> FFIELD_V) as Addr
}

#[inline]
pub fn to_f(a: Addr) -> Word {
    (Word::from(a) << FFIELD_V) & FFIELD
}

#[inline]
pub fn l_field(w: Word) -> u8 {
    ((w & LFIELD) >> LFIELD_V) as u8
}

#[inline]
pub fn to_l(l: u8) -> Word {
    (Word::from(l) << LFIELD_V) & LFIELD
}

/// Extract the register-file base as a full 15-bit address (low six
/// bits zero).
#[inline]
pub fn r_field(w: Word) -> Addr {
    (((w & RFIELD) >> RFIELD_V) as Addr) << 6
}

#[inline]
pub fn to_r(r: Addr) -> Word {
    (Word::from(r >> 6) << RFIELD_V) & RFIELD
}

#[inline]
pub fn wcount_field(w: Word) -> u16 {
    ((w & WCOUNT) >> WCOUNT_V) as u16
}

#[inline]
pub fn to_wcount(n: u16) -> Word {
    (Word::from(n) << WCOUNT_V) & WCOUNT
}

/// Extract the six-bit character at position `i` (0 = leftmost).
#[inline]
pub fn char_at(w: Word, i: u32) -> u8 {
    debug_assert!(i < CHARS_PER_WORD);
    ((w >> (42 - 6 * i)) & CHAR_MASK) as u8
}

/// Replace the six-bit character at position `i` (0 = leftmost).
#[inline]
pub fn with_char(w: Word, i: u32, c: u8) -> Word {
    debug_assert!(i < CHARS_PER_WORD);
    let shift = 42 - 6 * i;
    (w & !(CHAR_MASK << shift)) | (Word::from(c) & CHAR_MASK) << shift
}

/// A decomposed operand word.  The exponent is a power of eight; the
/// mantissa is an unsigned 13-digit octal integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub negative: bool,
    pub exponent: i32,
    pub mantissa: u64,
}

impl Operand {
    pub const ZERO: Operand = Operand {
        negative: false,
        exponent: 0,
        mantissa: 0,
    };

    /// True if the operand represents zero, whatever its sign and
    /// exponent bits say.
    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }
}

/// Build an operand word.  The exponent must lie in -63..=63 and the
/// mantissa must fit in 13 octal digits; both are masked, not checked,
/// because the arithmetic kernel performs its own range signalling.
pub fn operand(negative: bool, exponent: i32, mantissa: u64) -> Word {
    let mut w = mantissa & MANT;
    w |= (Word::from(exponent.unsigned_abs() as u16) << EXPO_V) & EXPO;
    if exponent < 0 {
        w |= ESIGN;
    }
    if negative {
        w |= MSIGN;
    }
    w
}

/// Take an operand word apart.  The combined sign-and-magnitude
/// exponent field reads as 0..=0o177, with 0o100..=0o177 the negative
/// range.
pub fn decompose(w: Word) -> Operand {
    let magnitude = ((w & EXPO) >> EXPO_V) as i32;
    Operand {
        negative: w & MSIGN != 0,
        exponent: if w & ESIGN != 0 { -magnitude } else { magnitude },
        mantissa: w & MANT,
    }
}

/// Build an integer operand word (exponent zero) from a signed value
/// with |v| < 8^13.
pub fn integer(v: i64) -> Word {
    operand(v < 0, 0, v.unsigned_abs())
}

/// Octal pretty-printer for words, used by register dumps and tracing.
pub struct OctalWord(pub Word);

impl fmt::Display for OctalWord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:>016o}", self.0 & WORD_MASK)
    }
}
