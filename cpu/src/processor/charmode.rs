//! Character mode.
//!
//! In character mode the register file is repurposed: M/GH is the
//! source cursor (word address, character 0-7 from the left, bit 0-5
//! within the character) with A caching the source word, and S/KV is
//! the destination cursor with B caching the destination word.  R
//! holds a tally, X holds the active loop control word, and MSFF
//! serves as the true/false flip-flop (TFFF) that the comparison and
//! jump operators share.
//!
//! The destination cache is written back whenever the cursor leaves
//! the word and once more when an operator finishes, so memory is
//! always current between syllables.

use std::cmp::Ordering;

use tracing::{event, Level};

use base::prelude::*;

use super::arith;
use super::{Abandon, OpResult, Processor};

/// Internal-code blank, used when suppressing leading zeros.
const BLANK: u8 = 0o60;

/// Zone bits marking a negative decimal field on its first character.
const NEG_ZONE: u8 = 0o40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Source,
    Dest,
}

impl Processor<'_> {
    pub(crate) fn execute_char(&mut self, t: u16) -> OpResult {
        let Some(op) = CharOp::decode(t) else {
            event!(Level::WARN, "undefined character operator {t:04o} ignored");
            return Ok(());
        };
        self.exec_char_op(op, char_field(t))
    }

    fn exec_char_op(&mut self, op: CharOp, field: u8) -> OpResult {
        use CharOp::*;
        match op {
            EXC => self.exit_via_rcw(true),
            TRS => self.char_transfer(field, Transfer::Verbatim),
            TRN => self.char_transfer(field, Transfer::Numeric),
            TRZ => self.char_transfer(field, Transfer::Zones),
            TRP => self.char_transfer_program(field),
            TBN => self.char_blank_leading(field),
            CEQ | CNE | CGR | CEG | CLS | CEL => self.char_compare(op, field),
            FAD => self.char_decimal(field, false),
            FSU => self.char_decimal(field, true),
            OCV => self.char_convert_out(field),
            ICV => self.char_convert_in(field),
            BIT => self.char_bit_test(),
            BIS => self.char_bit_store(field, true),
            BIR => self.char_bit_store(field, false),
            SFS => self.char_skip(field, Cursor::Source, true),
            SRS => self.char_skip(field, Cursor::Source, false),
            SFD => self.char_skip(field, Cursor::Dest, true),
            SRD => self.char_skip(field, Cursor::Dest, false),
            BNS => self.char_begin_loop(field),
            ENS => self.char_end_loop(),
            JFC => self.char_jump(field, true, Some(false)),
            JRC => self.char_jump(field, false, Some(false)),
            JNC => self.char_jump(field, true, Some(true)),
            JFW => self.char_jump(field, true, None),
            JRW => self.char_jump(field, false, None),
            CRF => self.char_call_repeat(),
            RSA => self.char_recall(Cursor::Source, field),
            RDA => self.char_recall(Cursor::Dest, field),
            RCA => self.char_recall_control(field),
            SCA => self.char_store_control(field),
            SSA => self.char_store_address(Cursor::Source, field),
            SDA => self.char_store_address(Cursor::Dest, field),
            TSA => self.char_take_address(Cursor::Source),
            TDA => self.char_take_address(Cursor::Dest),
        }
    }

    fn src_g(&self) -> u32 {
        u32::from(self.state.gh >> 3)
    }

    fn dst_k(&self) -> u32 {
        u32::from(self.state.kv >> 3)
    }

    fn fill_src(&mut self) -> OpResult {
        if !self.state.arof {
            self.state.a = self.fetch_word(self.state.m)?;
            self.state.arof = true;
        }
        Ok(())
    }

    fn fill_dst(&mut self) -> OpResult {
        if !self.state.brof {
            self.state.b = self.fetch_word(self.state.s)?;
            self.state.brof = true;
        }
        Ok(())
    }

    /// Write the destination cache back without invalidating it.
    fn flush_dst(&mut self) -> OpResult {
        if self.state.brof {
            let b = self.state.b;
            self.store_word(self.state.s, b)?;
        }
        Ok(())
    }

    fn next_src_char(&mut self) {
        let g = self.state.gh >> 3;
        if g == 7 {
            self.state.m = self.state.m.wrapping_add(1) & (CORE as Addr);
            self.state.gh = 0;
            self.state.arof = false;
        } else {
            self.state.gh = (g + 1) << 3;
        }
    }

    fn prev_src_char(&mut self) {
        let g = self.state.gh >> 3;
        if g == 0 {
            self.state.m = self.state.m.wrapping_sub(1) & (CORE as Addr);
            self.state.gh = 7 << 3;
            self.state.arof = false;
        } else {
            self.state.gh = (g - 1) << 3;
        }
    }

    fn next_dst_char(&mut self) -> OpResult {
        let k = self.state.kv >> 3;
        if k == 7 {
            self.flush_dst()?;
            self.state.s = self.state.s.wrapping_add(1) & (CORE as Addr);
            self.state.kv = 0;
            self.state.brof = false;
        } else {
            self.state.kv = (k + 1) << 3;
        }
        Ok(())
    }

    fn prev_dst_char(&mut self) -> OpResult {
        let k = self.state.kv >> 3;
        if k == 0 {
            self.flush_dst()?;
            self.state.s = self.state.s.wrapping_sub(1) & (CORE as Addr);
            self.state.kv = 7 << 3;
            self.state.brof = false;
        } else {
            self.state.kv = (k - 1) << 3;
        }
        Ok(())
    }

    fn next_src_bit(&mut self) {
        if self.state.gh & 7 == 5 {
            self.next_src_char();
        } else {
            self.state.gh += 1;
        }
    }

    fn next_dst_bit(&mut self) -> OpResult {
        if self.state.kv & 7 == 5 {
            self.next_dst_char()
        } else {
            self.state.kv += 1;
            Ok(())
        }
    }

    fn char_transfer(&mut self, n: u8, kind: Transfer) -> OpResult {
        for _ in 0..n {
            self.fill_src()?;
            let ch = char_at(self.state.a, self.src_g());
            self.fill_dst()?;
            let k = self.dst_k();
            let old = char_at(self.state.b, k);
            let new = match kind {
                Transfer::Verbatim => ch,
                Transfer::Numeric => ch & 0o17,
                Transfer::Zones => (old & 0o17) | (ch & 0o60),
            };
            self.state.b = with_char(self.state.b, k, new);
            self.next_src_char();
            self.next_dst_char()?;
        }
        self.flush_dst()
    }

    /// TRP: characters come from the program stream, two per
    /// syllable.
    fn char_transfer_program(&mut self, n: u8) -> OpResult {
        let mut cur = 0u16;
        for i in 0..n {
            if i % 2 == 0 {
                self.fetch_syllable()?;
                cur = self.state.t;
                self.state.trof = false;
            }
            let ch = ((cur >> (6 * (1 - u32::from(i) % 2))) & 0o77) as u8;
            self.fill_dst()?;
            let k = self.dst_k();
            self.state.b = with_char(self.state.b, k, ch);
            self.next_dst_char()?;
        }
        self.flush_dst()
    }

    /// TBN: replace leading zero digits in the destination field with
    /// blanks.  TFFF records whether a significant digit stopped the
    /// scan, and the tally counts the blanks written.
    fn char_blank_leading(&mut self, n: u8) -> OpResult {
        self.state.msff = false;
        let mut blanks: Addr = 0;
        for _ in 0..n {
            self.fill_dst()?;
            let k = self.dst_k();
            if char_at(self.state.b, k) & 0o17 == 0 {
                self.state.b = with_char(self.state.b, k, BLANK);
                blanks += 1;
                self.next_dst_char()?;
            } else {
                self.state.msff = true;
                break;
            }
        }
        self.state.r = blanks;
        self.flush_dst()
    }

    /// The six field comparisons: relation of the destination field
    /// to the source field in 6-bit collation order, left to right,
    /// into TFFF.  Both cursors cross the whole field either way.
    fn char_compare(&mut self, op: CharOp, n: u8) -> OpResult {
        let mut rel = Ordering::Equal;
        for _ in 0..n {
            self.fill_src()?;
            self.fill_dst()?;
            let sc = char_at(self.state.a, self.src_g());
            let dc = char_at(self.state.b, self.dst_k());
            if rel == Ordering::Equal {
                rel = dc.cmp(&sc);
            }
            self.next_src_char();
            self.next_dst_char()?;
        }
        self.state.msff = match op {
            CharOp::CEQ => rel == Ordering::Equal,
            CharOp::CNE => rel != Ordering::Equal,
            CharOp::CGR => rel == Ordering::Greater,
            CharOp::CEG => rel != Ordering::Less,
            CharOp::CLS => rel == Ordering::Less,
            CharOp::CEL => rel != Ordering::Greater,
            _ => unreachable!("not a comparison operator: {op}"),
        };
        Ok(())
    }

    /// FAD/FSU: signed decimal field arithmetic, destination plus or
    /// minus source, digit by digit.  The sign rides in the zone bits
    /// of the first character; TFFF reports overflow out of the
    /// field.
    fn char_decimal(&mut self, n: u8, subtract: bool) -> OpResult {
        if n == 0 {
            return Ok(());
        }
        let n = usize::from(n);
        let mut src = Vec::with_capacity(n);
        let mut src_neg = false;
        for i in 0..n {
            self.fill_src()?;
            let ch = char_at(self.state.a, self.src_g());
            if i == 0 {
                src_neg = ch & 0o60 == NEG_ZONE;
            }
            src.push(ch & 0o17);
            self.next_src_char();
        }
        let (s0, kv0) = (self.state.s, self.state.kv);
        let mut dst = Vec::with_capacity(n);
        let mut dst_neg = false;
        for i in 0..n {
            self.fill_dst()?;
            let ch = char_at(self.state.b, self.dst_k());
            if i == 0 {
                dst_neg = ch & 0o60 == NEG_ZONE;
            }
            dst.push(ch & 0o17);
            self.next_dst_char()?;
        }
        // Rewind for the result pass; nothing was modified yet.
        self.state.s = s0;
        self.state.kv = kv0;
        self.state.brof = false;
        let src_neg = src_neg != subtract;
        let (digits, neg, overflow) = decimal_sum(&dst, dst_neg, &src, src_neg);
        self.state.msff = overflow;
        for (i, d) in digits.iter().enumerate() {
            self.fill_dst()?;
            let k = self.dst_k();
            let zone = if i == 0 && neg { NEG_ZONE } else { 0 };
            self.state.b = with_char(self.state.b, k, d | zone);
            self.next_dst_char()?;
        }
        self.flush_dst()
    }

    /// OCV: take the whole word under the source cursor as an
    /// operand, write it as a signed decimal character field.  A
    /// field of 0 means 8 characters.
    fn char_convert_out(&mut self, field: u8) -> OpResult {
        let n = usize::from(if field == 0 { 8 } else { field });
        self.fill_src()?;
        let value = match arith::integerize(self.state.a) {
            (None, q) => {
                self.raise(q);
                return Err(Abandon::Fault);
            }
            (Some(w), _) => decompose(w),
        };
        // The source word is consumed whole.
        self.state.m = self.state.m.wrapping_add(1) & (CORE as Addr);
        self.state.gh = 0;
        self.state.arof = false;
        let mut digits = vec![0u8; n];
        let mut mag = value.mantissa;
        for d in digits.iter_mut().rev() {
            *d = (mag % 10) as u8;
            mag /= 10;
        }
        self.state.msff = mag != 0;
        for (i, d) in digits.iter().enumerate() {
            self.fill_dst()?;
            let k = self.dst_k();
            let zone = if i == 0 && value.negative { NEG_ZONE } else { 0 };
            self.state.b = with_char(self.state.b, k, d | zone);
            self.next_dst_char()?;
        }
        self.flush_dst()
    }

    /// ICV: read a decimal character field at the source, store the
    /// binary word at the destination cursor's word.  A field of 0
    /// means 8 characters.
    fn char_convert_in(&mut self, field: u8) -> OpResult {
        let n = if field == 0 { 8 } else { field };
        let mut value: u128 = 0;
        let mut neg = false;
        for i in 0..n {
            self.fill_src()?;
            let ch = char_at(self.state.a, self.src_g());
            if i == 0 {
                neg = ch & 0o60 == NEG_ZONE;
            }
            value = value
                .saturating_mul(10)
                .saturating_add(u128::from(ch & 0o17));
            self.next_src_char();
        }
        if value > u128::from(MANT) {
            self.state.msff = true;
            value &= u128::from(MANT);
        }
        self.flush_dst()?;
        let w = operand(neg, 0, value as u64);
        self.store_word(self.state.s, w)?;
        self.state.s = self.state.s.wrapping_add(1) & (CORE as Addr);
        self.state.kv = 0;
        self.state.brof = false;
        Ok(())
    }

    /// BIT: test the source bit under the cursor into TFFF, then step
    /// one bit.
    fn char_bit_test(&mut self) -> OpResult {
        self.fill_src()?;
        let pos = 47 - (6 * self.src_g() + u32::from(self.state.gh & 7));
        self.state.msff = self.state.a >> pos & 1 == 1;
        self.next_src_bit();
        Ok(())
    }

    /// BIS/BIR: set or clear `n` destination bits, advancing the bit
    /// cursor.
    fn char_bit_store(&mut self, n: u8, set: bool) -> OpResult {
        for _ in 0..n {
            self.fill_dst()?;
            let pos = 47 - (6 * self.dst_k() + u32::from(self.state.kv & 7));
            if set {
                self.state.b |= 1 << pos;
            } else {
                self.state.b &= !(1 << pos);
            }
            self.next_dst_bit()?;
        }
        self.flush_dst()
    }

    fn char_skip(&mut self, n: u8, cursor: Cursor, forward: bool) -> OpResult {
        for _ in 0..n {
            match (cursor, forward) {
                (Cursor::Source, true) => self.next_src_char(),
                (Cursor::Source, false) => self.prev_src_char(),
                (Cursor::Dest, true) => self.next_dst_char()?,
                (Cursor::Dest, false) => self.prev_dst_char()?,
            }
        }
        Ok(())
    }

    /// BNS: stack the current loop word at F and open a new loop over
    /// the syllables that follow.
    fn char_begin_loop(&mut self, field: u8) -> OpResult {
        self.state.f = self.state.f.wrapping_add(1) & (CORE as Addr);
        let x = self.state.x;
        self.store_word(self.state.f, x)?;
        let lcw = Lcw {
            repeat: if field == 0 { 1 } else { field },
            c: self.state.c,
            l: self.state.l,
            m: 0,
        };
        self.state.x = lcw.to_word();
        Ok(())
    }

    /// ENS: jump back to the loop head, or on the final pass restore
    /// the enclosing loop word from F.
    fn char_end_loop(&mut self) -> OpResult {
        let mut lcw = Lcw::from_word(self.state.x);
        if lcw.repeat > 1 {
            lcw.repeat -= 1;
            self.state.x = lcw.to_word();
            self.jump_to(lcw.c, lcw.l);
        } else {
            self.state.x = self.fetch_word(self.state.f)?;
            self.state.f = self.state.f.wrapping_sub(1) & (CORE as Addr);
        }
        Ok(())
    }

    /// `want` is the TFFF value that takes the jump; `None` is
    /// unconditional.
    fn char_jump(&mut self, field: u8, forward: bool, want: Option<bool>) -> OpResult {
        let take = match want {
            None => true,
            Some(v) => self.state.msff == v,
        };
        if take {
            self.branch_syllables(u32::from(field), forward);
        }
        Ok(())
    }

    /// CRF: the repeat field of the next syllable comes from the word
    /// at S instead of the program.
    fn char_call_repeat(&mut self) -> OpResult {
        self.flush_dst()?;
        self.state.brof = false;
        let w = self.fetch_word(self.state.s)?;
        self.state.s = self.state.s.wrapping_sub(1) & (CORE as Addr);
        self.state.kv = 0;
        let count = (w & 0o77) as u8;
        self.fetch_syllable()?;
        let t = self.state.t;
        self.state.trof = false;
        match CharOp::decode(t) {
            None => Ok(()),
            Some(op) => self.exec_char_op(op, count),
        }
    }

    fn pointer_from(w: Word) -> Pointer {
        if Descriptor::is_flagged(w) {
            Pointer::from_word(w)
        } else {
            Pointer {
                addr: core_field(w),
                ch: 0,
                bit: 0,
            }
        }
    }

    fn set_cursor(&mut self, cursor: Cursor, p: Pointer) -> OpResult {
        match cursor {
            Cursor::Source => {
                self.state.m = p.addr;
                self.state.gh = p.offsets();
                self.state.arof = false;
            }
            Cursor::Dest => {
                self.flush_dst()?;
                self.state.s = p.addr;
                self.state.kv = p.offsets();
                self.state.brof = false;
            }
        }
        Ok(())
    }

    /// RSA/RDA: recall an address word from `F - field`.
    fn char_recall(&mut self, cursor: Cursor, field: u8) -> OpResult {
        let addr = self.state.f.wrapping_sub(Addr::from(field)) & (CORE as Addr);
        let w = self.fetch_word(addr)?;
        self.set_cursor(cursor, Self::pointer_from(w))
    }

    /// RCA: recall a program cursor from `F - field` and jump there.
    fn char_recall_control(&mut self, field: u8) -> OpResult {
        let addr = self.state.f.wrapping_sub(Addr::from(field)) & (CORE as Addr);
        let w = self.fetch_word(addr)?;
        self.jump_to(core_field(w), l_field(w));
        Ok(())
    }

    /// SCA: store the program cursor at `F - field`.
    fn char_store_control(&mut self, field: u8) -> OpResult {
        let addr = self.state.f.wrapping_sub(Addr::from(field)) & (CORE as Addr);
        let w = FLAG | to_core(self.state.c) | to_l(self.state.l);
        self.store_word(addr, w)
    }

    /// SSA/SDA: store a cursor as an address word at `F - field`.
    fn char_store_address(&mut self, cursor: Cursor, field: u8) -> OpResult {
        let addr = self.state.f.wrapping_sub(Addr::from(field)) & (CORE as Addr);
        let p = match cursor {
            Cursor::Source => Pointer {
                addr: self.state.m,
                ch: self.state.gh >> 3,
                bit: self.state.gh & 7,
            },
            Cursor::Dest => Pointer {
                addr: self.state.s,
                ch: self.state.kv >> 3,
                bit: self.state.kv & 7,
            },
        };
        self.store_word(addr, p.to_word())
    }

    /// TSA/TDA: take an address word from the source stream.
    fn char_take_address(&mut self, cursor: Cursor) -> OpResult {
        self.fill_src()?;
        let w = self.state.a;
        self.state.m = self.state.m.wrapping_add(1) & (CORE as Addr);
        self.state.gh = 0;
        self.state.arof = false;
        self.set_cursor(cursor, Self::pointer_from(w))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Verbatim,
    Numeric,
    Zones,
}

/// Signed decimal addition over fixed-width digit fields, most
/// significant digit first.  Returns the result digits, its sign, and
/// whether a carry overflowed the field.
fn decimal_sum(b: &[u8], b_neg: bool, a: &[u8], a_neg: bool) -> (Vec<u8>, bool, bool) {
    let n = b.len();
    debug_assert_eq!(n, a.len());
    if a_neg == b_neg {
        let mut out = vec![0u8; n];
        let mut carry = 0u8;
        for i in (0..n).rev() {
            let t = b[i] + a[i] + carry;
            out[i] = t % 10;
            carry = t / 10;
        }
        (out, b_neg, carry != 0)
    } else {
        let (hi, lo, neg) = if b.iter().ge(a.iter()) {
            (b, a, b_neg)
        } else {
            (a, b, a_neg)
        };
        let mut out = vec![0u8; n];
        let mut borrow = 0u8;
        for i in (0..n).rev() {
            let need = lo[i] + borrow;
            if hi[i] >= need {
                out[i] = hi[i] - need;
                borrow = 0;
            } else {
                out[i] = hi[i] + 10 - need;
                borrow = 1;
            }
        }
        let zero = out.iter().all(|d| *d == 0);
        (out, neg && !zero, false)
    }
}
