//! The octal floating-point kernel.
//!
//! Operands are sign-and-magnitude: a 13-octal-digit mantissa scaled
//! by a signed power of eight.  There is no hidden normalisation;
//! integers simply carry exponent zero, and the kernel goes out of
//! its way to keep exact results in that form (an addition of two
//! integers that fits is returned as an integer, an exact quotient is
//! shifted back down to exponent zero).
//!
//! Every function here is pure: it takes operand words, returns the
//! result word(s) plus the fault bits the operation earned.  The
//! caller decides whether the machine is in a state where the faults
//! are recorded.  A divide fault returns `None` instead of a result
//! and must leave the stack untouched.
//!
//! Alignment and reduction keep one guard digit; the final result is
//! rounded to nearest when the guard digit is 4 or more, except when
//! the mantissa is already saturated.

use base::prelude::*;

use crate::irq::{Q_DIV_ZERO, Q_EXPO_OVER, Q_EXPO_UNDER, Q_INT_OVER};

/// 26-digit mantissa mask for double precision.
const D26: u128 = ((MANT as u128) << 39) | (MANT as u128);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DivideVariant {
    /// DIV: rounded quotient.
    Quotient,
    /// IDV: integer quotient, truncated toward zero.
    Integer,
    /// RDV: remainder after integer division.
    Remainder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
    Less,
    Equal,
    Greater,
}

/// Encode a result, signalling exponent range faults.  A zero
/// mantissa always encodes as all-zero.
fn seal(negative: bool, exponent: i32, mantissa: u64) -> (Word, u16) {
    if mantissa == 0 {
        return (0, 0);
    }
    let q = if exponent > EXPO_MAX {
        Q_EXPO_OVER
    } else if exponent < -EXPO_MAX {
        Q_EXPO_UNDER
    } else {
        0
    };
    (operand(negative, exponent, mantissa), q)
}

fn seal2(negative: bool, exponent: i32, mantissa: u128) -> ((Word, Word), u16) {
    if mantissa == 0 {
        return ((0, 0), 0);
    }
    let (hi, q) = seal(negative, exponent, (mantissa >> 39) as u64);
    let lo = operand(false, 0, (mantissa & (MANT as u128)) as u64);
    ((hi, lo), q)
}

/// Add (or subtract) two operand words.
pub(crate) fn add(bw: Word, aw: Word, subtract: bool) -> (Word, u16) {
    let mut a = decompose(aw);
    let b = decompose(bw);
    if subtract {
        a.negative = !a.negative;
    }
    if a.is_zero() {
        return seal(b.negative, b.exponent, b.mantissa);
    }
    if b.is_zero() {
        return seal(a.negative, a.exponent, a.mantissa);
    }
    // Mantissas shifted up one guard digit, magnitudes.
    let mut am = a.mantissa << 3;
    let mut bm = b.mantissa << 3;
    let mut ae = a.exponent;
    let mut be = b.exponent;
    // Align: stretch the larger-exponent operand left while it has
    // room, otherwise squeeze the other right into its guard digit.
    while ae != be {
        if ae > be {
            if am < (1 << 39) {
                am <<= 3;
                ae -= 1;
            } else {
                bm >>= 3;
                be += 1;
            }
        } else if bm < (1 << 39) {
            bm <<= 3;
            be -= 1;
        } else {
            am >>= 3;
            ae += 1;
        }
    }
    let sa = if a.negative { -(am as i64) } else { am as i64 };
    let sb = if b.negative { -(bm as i64) } else { bm as i64 };
    let sum = sb + sa;
    let negative = sum < 0;
    let mut m = sum.unsigned_abs();
    let mut e = ae;
    while m > (MANT << 3) | 7 {
        m >>= 3;
        e += 1;
    }
    let guard = m & 7;
    let mut m = m >> 3;
    if guard >= 4 && m != MANT {
        m += 1;
    }
    seal(negative, e, m)
}

/// Compare operand B against operand A through the adder, so that
/// values equal after alignment and rounding compare equal.
pub(crate) fn compare(bw: Word, aw: Word) -> Relation {
    let (diff, _) = add(bw, aw, true);
    let d = decompose(diff);
    if d.is_zero() {
        Relation::Equal
    } else if d.negative {
        Relation::Less
    } else {
        Relation::Greater
    }
}

/// Multiply two operand words.  The product is formed exactly in 26
/// digits and reduced; a product that fits 13 digits comes back with
/// the summed exponent untouched, so integer times integer stays an
/// integer.
pub(crate) fn multiply(bw: Word, aw: Word) -> (Word, u16) {
    let a = decompose(aw);
    let b = decompose(bw);
    if a.is_zero() || b.is_zero() {
        return (0, 0);
    }
    let mut p = u128::from(a.mantissa) * u128::from(b.mantissa);
    let mut e = a.exponent + b.exponent;
    let mut round = 0;
    while p > u128::from(MANT) {
        round = (p & 7) as u64;
        p >>= 3;
        e += 1;
    }
    let mut m = p as u64;
    if round >= 4 && m != MANT {
        m += 1;
    }
    seal(a.negative != b.negative, e, m)
}

/// Long division producing a fixed number of significant octal
/// digits.  Returns the digits, the next (rounding) digit, and the
/// exponent adjustment relative to a plain `r / d`.
fn long_divide(mut r: u128, mut d: u128, digits: u32) -> (u128, u32, i32) {
    debug_assert!(r != 0 && d != 0);
    let mut e = 0i32;
    while r < d {
        r <<= 3;
        e -= 1;
    }
    while d << 3 <= r {
        d <<= 3;
        e += 1;
    }
    let mut m: u128 = 0;
    for _ in 0..digits {
        m = (m << 3) | (r / d);
        r = (r % d) << 3;
    }
    let round = (r / d) as u32;
    (m, round, e - (digits as i32 - 1))
}

/// Shift an exact value back toward exponent zero.
fn denormalize(mut m: u64, mut e: i32) -> (u64, i32) {
    while e < 0 && m != 0 && m & 7 == 0 {
        m >>= 3;
        e += 1;
    }
    (m, e)
}

/// Truncate a (mantissa, exponent) magnitude to an integer.  `None`
/// means the integer part does not fit 13 digits.
fn truncate_to_integer(mut m: u64, mut e: i32) -> Option<u64> {
    while e > 0 {
        if m > MANT >> 3 {
            return None;
        }
        m <<= 3;
        e -= 1;
    }
    if e < 0 {
        let shift = (-e).min(14) as u32;
        m >>= 3 * shift;
    }
    Some(m)
}

/// Divide operand B (the dividend) by operand A (the divisor, on top
/// of the stack).  A fault returns `None`: the caller must leave the
/// stack exactly as it was.
pub(crate) fn divide(bw: Word, aw: Word, variant: DivideVariant) -> (Option<Word>, u16) {
    let a = decompose(aw);
    let b = decompose(bw);
    if a.is_zero() {
        return (None, Q_DIV_ZERO);
    }
    if b.is_zero() {
        return (Some(0), 0);
    }
    let negative = a.negative != b.negative;
    let (m, round, adj) = long_divide(u128::from(b.mantissa), u128::from(a.mantissa), 13);
    let e = b.exponent - a.exponent + adj;
    match variant {
        DivideVariant::Quotient => {
            let mut m = m as u64;
            if round >= 4 && m != MANT {
                m += 1;
            }
            let (m, e) = denormalize(m, e);
            let (w, q) = seal(negative, e, m);
            (Some(w), q)
        }
        DivideVariant::Integer => match truncate_to_integer(m as u64, e) {
            None => (None, Q_INT_OVER),
            Some(m) => {
                let (w, q) = seal(negative, 0, m);
                (Some(w), q)
            }
        },
        DivideVariant::Remainder => remainder(&b, &a, m as u64, e),
    }
}

/// B minus A times the truncated quotient, computed exactly.  The
/// quotient magnitude arrives as `(qm, qe)` from the long division.
fn remainder(b: &Operand, a: &Operand, qm: u64, qe: i32) -> (Option<Word>, u16) {
    let qi = match truncate_to_integer(qm, qe) {
        None => return (None, Q_INT_OVER),
        Some(v) => v,
    };
    // Align both magnitudes at the smaller exponent.  Operands more
    // than 26 digits apart have no representable remainder.
    let emin = a.exponent.min(b.exponent);
    let sa = a.exponent - emin;
    let sb = b.exponent - emin;
    if sa > 26 || sb > 26 {
        return (None, Q_INT_OVER);
    }
    let am = u128::from(a.mantissa) << (3 * sa);
    let bm = u128::from(b.mantissa) << (3 * sb);
    // qi is the floor of |B| / |A|, so this cannot underflow.
    let mut rm = bm - u128::from(qi) * am;
    let mut e = emin;
    while rm > u128::from(MANT) {
        if rm & 7 != 0 {
            return (None, Q_INT_OVER);
        }
        rm >>= 3;
        e += 1;
    }
    let (m, e) = denormalize(rm as u64, e);
    let (w, q) = seal(b.negative, e, m);
    (Some(w), q)
}

/// Round an operand to an integer-form word (exponent zero).  `None`
/// with the integer-overflow bit when the value has too many digits.
pub(crate) fn integerize(w: Word) -> (Option<Word>, u16) {
    let o = decompose(w);
    if o.is_zero() {
        return (Some(0), 0);
    }
    let mut m = o.mantissa;
    let mut e = o.exponent;
    while e > 0 {
        if m > MANT >> 3 {
            return (None, Q_INT_OVER);
        }
        m <<= 3;
        e -= 1;
    }
    if e < 0 {
        let shift = (-e).min(14);
        let mut round = 0;
        for _ in 0..shift {
            round = m & 7;
            m >>= 3;
        }
        if round >= 4 {
            m += 1;
        }
    }
    if m == 0 {
        return (Some(0), 0);
    }
    (Some(operand(o.negative, 0, m)), 0)
}

fn decompose2(hi: Word, lo: Word) -> (bool, i32, u128) {
    let h = decompose(hi);
    let m = (u128::from(h.mantissa) << 39) | u128::from(lo & MANT);
    (h.negative, h.exponent, m)
}

/// Double-precision add/subtract: 26-digit mantissas, the high word
/// carrying sign and exponent.
pub(crate) fn double_add(b: (Word, Word), a: (Word, Word), subtract: bool) -> ((Word, Word), u16) {
    let (mut aneg, ae0, am0) = decompose2(a.0, a.1);
    let (bneg, be0, bm0) = decompose2(b.0, b.1);
    if subtract {
        aneg = !aneg;
    }
    if am0 == 0 {
        return seal2(bneg, be0, bm0);
    }
    if bm0 == 0 {
        return seal2(aneg, ae0, am0);
    }
    let mut am = am0 << 3;
    let mut bm = bm0 << 3;
    let mut ae = ae0;
    let mut be = be0;
    while ae != be {
        if ae > be {
            if am < (1 << 78) {
                am <<= 3;
                ae -= 1;
            } else {
                bm >>= 3;
                be += 1;
            }
        } else if bm < (1 << 78) {
            bm <<= 3;
            be -= 1;
        } else {
            am >>= 3;
            ae += 1;
        }
    }
    let sa = if aneg { -(am as i128) } else { am as i128 };
    let sb = if bneg { -(bm as i128) } else { bm as i128 };
    let sum = sb + sa;
    let negative = sum < 0;
    let mut m = sum.unsigned_abs();
    let mut e = ae;
    while m > (D26 << 3) | 7 {
        m >>= 3;
        e += 1;
    }
    let guard = m & 7;
    let mut m = m >> 3;
    if guard >= 4 && m != D26 {
        m += 1;
    }
    seal2(negative, e, m)
}

/// Double-precision multiply via three 13-digit partial products.
pub(crate) fn double_multiply(b: (Word, Word), a: (Word, Word)) -> ((Word, Word), u16) {
    let (aneg, ae, am) = decompose2(a.0, a.1);
    let (bneg, be, bm) = decompose2(b.0, b.1);
    if am == 0 || bm == 0 {
        return ((0, 0), 0);
    }
    let (ah, al) = (am >> 39, am & u128::from(MANT));
    let (bh, bl) = (bm >> 39, bm & u128::from(MANT));
    let p_lo = al * bl;
    let p_mid = ah * bl + al * bh;
    let p_hi = ah * bh;
    // Canonical base-8^13 limbs.
    let mut tl = p_lo & u128::from(MANT);
    let mut tm = p_mid + (p_lo >> 39);
    let mut th = p_hi + (tm >> 39);
    tm &= u128::from(MANT);
    let mut e = ae + be;
    let mut round = 0;
    while th != 0 {
        round = (tl & 7) as u32;
        tl = (tl >> 3) | ((tm & 7) << 36);
        tm = (tm >> 3) | ((th & 7) << 36);
        th >>= 3;
        e += 1;
    }
    let mut m = (tm << 39) | tl;
    if round >= 4 && m != D26 {
        m += 1;
    }
    seal2(aneg != bneg, e, m)
}

/// Double-precision divide with a rounded 26-digit quotient.
pub(crate) fn double_divide(b: (Word, Word), a: (Word, Word)) -> (Option<(Word, Word)>, u16) {
    let (aneg, ae, am) = decompose2(a.0, a.1);
    let (bneg, be, bm) = decompose2(b.0, b.1);
    if am == 0 {
        return (None, Q_DIV_ZERO);
    }
    if bm == 0 {
        return (Some((0, 0)), 0);
    }
    let (mut m, round, adj) = long_divide(bm, am, 26);
    let mut e = be - ae + adj;
    if round >= 4 && m != D26 {
        m += 1;
    }
    while e < 0 && m != 0 && m & 7 == 0 {
        m >>= 3;
        e += 1;
    }
    let (pair, q) = seal2(aneg != bneg, e, m);
    (Some(pair), q)
}
