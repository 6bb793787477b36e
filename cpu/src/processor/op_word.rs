//! Word-mode operators: arithmetic, logical, relational, branches,
//! stores, stack manipulation and the bit-field group.
//!
//! The operand convention throughout: A is the top of stack, B the
//! word under it.  Binary operators leave their result in B and
//! invalidate A, which is how the hardware's adder path worked and
//! keeps the result on top without a register move.

use base::prelude::*;

use crate::irq::{Q_FLAG_BIT, Q_PRES_BIT};

use super::arith::{self, DivideVariant, Relation};
use super::{Abandon, Integerize, OpResult, Processor};

impl Processor<'_> {
    /// Record fault bits earned by an arithmetic result.
    pub(crate) fn report(&mut self, q: u16) {
        if q != 0 {
            self.raise(q);
        }
    }

    /// Fault unless the descriptor's presence bit is set.  Only
    /// normal-state code is stopped by absence.
    pub(crate) fn presence_check(&mut self, d: &Descriptor) -> OpResult {
        if !d.present() && self.state.ncsf {
            self.raise(Q_PRES_BIT);
            return Err(Abandon::Fault);
        }
        Ok(())
    }

    pub(crate) fn op_add(&mut self, subtract: bool) -> OpResult {
        self.fill_ab()?;
        let (w, q) = arith::add(self.state.b, self.state.a, subtract);
        self.report(q);
        self.state.b = w;
        self.state.arof = false;
        Ok(())
    }

    pub(crate) fn op_multiply(&mut self) -> OpResult {
        self.fill_ab()?;
        let (w, q) = arith::multiply(self.state.b, self.state.a);
        self.report(q);
        self.state.b = w;
        self.state.arof = false;
        Ok(())
    }

    pub(crate) fn op_divide(&mut self, variant: DivideVariant) -> OpResult {
        self.fill_ab()?;
        match arith::divide(self.state.b, self.state.a, variant) {
            (None, q) => {
                // Fault: both operands stay on the stack for the MCP
                // to inspect.
                self.report(q);
                Err(Abandon::Fault)
            }
            (Some(w), q) => {
                self.report(q);
                self.state.b = w;
                self.state.arof = false;
                Ok(())
            }
        }
    }

    /// Pop the four words of a pair of double operands: the stack
    /// holds B-high, B-low, A-high, A-low with A-low on top.
    fn double_operands(&mut self) -> Result<((Word, Word), (Word, Word)), Abandon> {
        let a_lo = self.pop()?;
        let a_hi = self.pop()?;
        let b_lo = self.pop()?;
        let b_hi = self.pop()?;
        Ok(((b_hi, b_lo), (a_hi, a_lo)))
    }

    fn push_double(&mut self, pair: (Word, Word)) -> OpResult {
        self.push(pair.0)?;
        self.push(pair.1)
    }

    fn unpop_double(&mut self, b: (Word, Word), a: (Word, Word)) -> OpResult {
        self.push(b.0)?;
        self.push(b.1)?;
        self.push(a.0)?;
        self.push(a.1)
    }

    pub(crate) fn op_double_add(&mut self, subtract: bool) -> OpResult {
        let (b, a) = self.double_operands()?;
        let (pair, q) = arith::double_add(b, a, subtract);
        self.report(q);
        self.push_double(pair)
    }

    pub(crate) fn op_double_multiply(&mut self) -> OpResult {
        let (b, a) = self.double_operands()?;
        let (pair, q) = arith::double_multiply(b, a);
        self.report(q);
        self.push_double(pair)
    }

    pub(crate) fn op_double_divide(&mut self) -> OpResult {
        let (b, a) = self.double_operands()?;
        match arith::double_divide(b, a) {
            (None, q) => {
                self.report(q);
                self.unpop_double(b, a)?;
                Err(Abandon::Fault)
            }
            (Some(pair), q) => {
                self.report(q);
                self.push_double(pair)
            }
        }
    }

    pub(crate) fn op_unary_logical(&mut self, op: WordOp) -> OpResult {
        self.fill_a()?;
        self.state.a = match op {
            // Complement everything but the flag, which is cleared:
            // the result is always an operand.
            WordOp::LNG => !self.state.a & FWORD,
            WordOp::MOP => self.state.a & !FLAG & WORD_MASK,
            WordOp::MDS => self.state.a | FLAG,
            _ => unreachable!("not a unary logical operator: {op}"),
        };
        Ok(())
    }

    pub(crate) fn op_binary_logical(&mut self, op: WordOp) -> OpResult {
        self.fill_ab()?;
        let a = self.state.a;
        let b = self.state.b;
        // Full 48-bit operations, flag included.
        self.state.b = match op {
            WordOp::LOR => a | b,
            WordOp::LND => a & b,
            WordOp::LQV => !(a ^ b) & WORD_MASK,
            _ => unreachable!("not a binary logical operator: {op}"),
        };
        self.state.arof = false;
        Ok(())
    }

    pub(crate) fn op_relational(&mut self, op: WordOp) -> OpResult {
        self.fill_ab()?;
        let rel = arith::compare(self.state.b, self.state.a);
        let truth = match op {
            WordOp::EQL => rel == Relation::Equal,
            WordOp::NEQ => rel != Relation::Equal,
            WordOp::GTR => rel == Relation::Greater,
            WordOp::GEQ => rel != Relation::Less,
            WordOp::LSS => rel == Relation::Less,
            WordOp::LEQ => rel != Relation::Greater,
            _ => unreachable!("not a relational operator: {op}"),
        };
        self.state.b = integer(i64::from(truth));
        self.state.arof = false;
        Ok(())
    }

    /// Resolve the branch target word in A: either a syllable
    /// displacement or a descriptor naming an absolute word.
    fn take_branch(&mut self, forward: bool) -> OpResult {
        let a = self.state.a;
        if Descriptor::is_flagged(a) {
            let d = Descriptor(a);
            self.presence_check(&d)?;
            self.state.arof = false;
            self.jump_to(d.address(), 0);
        } else {
            let disp = match arith::integerize(a) {
                (None, q) => {
                    self.report(q);
                    return Err(Abandon::Fault);
                }
                (Some(v), _) => decompose(v).mantissa as u32,
            };
            self.state.arof = false;
            self.branch_syllables(disp, forward);
        }
        Ok(())
    }

    pub(crate) fn op_branch_unconditional(&mut self, forward: bool) -> OpResult {
        self.fill_a()?;
        self.take_branch(forward)
    }

    /// The displacement is on top in A; the condition under it in B.
    /// The branch is taken when the condition's low bit is zero
    /// (false); both words are consumed either way.
    pub(crate) fn op_branch_conditional(&mut self, forward: bool) -> OpResult {
        self.fill_ab()?;
        let branch = self.state.b & 1 == 0;
        self.state.brof = false;
        if branch {
            self.take_branch(forward)
        } else {
            self.state.arof = false;
            Ok(())
        }
    }

    /// The store group: A holds the target descriptor, B the value.
    pub(crate) fn op_store(&mut self, destructive: bool, mode: Integerize) -> OpResult {
        self.fill_ab()?;
        let a = self.state.a;
        let d = Descriptor(a);
        if Descriptor::is_flagged(a) {
            self.presence_check(&d)?;
        } else if self.state.ncsf {
            self.raise(Q_FLAG_BIT);
            return Err(Abandon::Fault);
        }
        // Control state may store through a bare operand's address
        // field.
        let integerize = match mode {
            Integerize::Never => false,
            Integerize::Always => true,
            Integerize::WhenMarked => d.integer(),
        };
        let value = if integerize {
            match arith::integerize(self.state.b) {
                (None, q) => {
                    self.report(q);
                    return Err(Abandon::Fault);
                }
                (Some(v), _) => v,
            }
        } else {
            self.state.b
        };
        self.store_word(d.address(), value)?;
        self.state.arof = false;
        if destructive {
            self.state.brof = false;
        } else {
            self.state.b = value;
        }
        Ok(())
    }

    pub(crate) fn op_load(&mut self) -> OpResult {
        self.fill_a()?;
        let a = self.state.a;
        let addr = if Descriptor::is_flagged(a) {
            let d = Descriptor(a);
            self.presence_check(&d)?;
            d.address()
        } else {
            core_field(a)
        };
        self.state.a = self.fetch_word(addr)?;
        Ok(())
    }

    pub(crate) fn op_duplicate(&mut self) -> OpResult {
        self.fill_a()?;
        let a = self.state.a;
        self.push(a)
    }

    pub(crate) fn op_exchange(&mut self) -> OpResult {
        self.fill_ab()?;
        std::mem::swap(&mut self.state.a, &mut self.state.b);
        Ok(())
    }

    pub(crate) fn op_delete(&mut self) -> OpResult {
        if self.state.arof {
            self.state.arof = false;
        } else if self.state.brof {
            self.state.brof = false;
        } else {
            self.state.s = self.state.s.wrapping_sub(1) & (CORE as Addr);
        }
        Ok(())
    }

    pub(crate) fn op_set_sign(&mut self, negative: bool) -> OpResult {
        self.fill_a()?;
        if negative {
            self.state.a |= MSIGN;
        } else {
            self.state.a &= !MSIGN;
        }
        Ok(())
    }

    pub(crate) fn op_change_sign(&mut self) -> OpResult {
        self.fill_a()?;
        self.state.a ^= MSIGN;
        Ok(())
    }

    /// The bit-field group.  A control word is popped first: its low
    /// six bits are the field length, bits 6-11 the source start and
    /// bits 12-17 the destination start, both counted from the left
    /// of the 48-bit word.
    pub(crate) fn op_field(&mut self, op: WordOp) -> OpResult {
        let ctrl = self.pop()?;
        let n = (ctrl & 0o77) as u32;
        let src = ((ctrl >> 6) & 0o77) as u32;
        let dst = ((ctrl >> 12) & 0o77) as u32;
        if op == WordOp::ISO {
            self.fill_a()?;
            self.state.a = field_extract(self.state.a, src, n);
            return Ok(());
        }
        self.fill_ab()?;
        let a = self.state.a;
        let b = self.state.b;
        self.state.b = match op {
            WordOp::FTF => field_insert(b, dst, field_extract(a, src, n), n),
            WordOp::FTC => integer(field_extract(a, src, n) as i64),
            WordOp::CTF => field_insert(b, dst, a & low_mask(n), n),
            WordOp::CTC => (b & !low_mask(n)) | (a & low_mask(n)),
            WordOp::TRB => b | field_insert(0, dst, field_extract(a, src, n), n),
            WordOp::FCE => integer(i64::from(
                field_extract(a, src, n) == field_extract(b, dst, n),
            )),
            WordOp::FCL => integer(i64::from(
                field_extract(b, dst, n) < field_extract(a, src, n),
            )),
            _ => unreachable!("not a field operator: {op}"),
        };
        self.state.arof = false;
        Ok(())
    }

    /// INX: B holds a descriptor, A the index.  The descriptor's
    /// address is advanced by the index; an index at or past the word
    /// count is an index error and changes nothing.
    pub(crate) fn op_index(&mut self) -> OpResult {
        self.fill_ab()?;
        let dw = self.state.b;
        if !Descriptor::is_flagged(dw) && self.state.ncsf {
            self.raise(Q_FLAG_BIT);
            return Err(Abandon::Fault);
        }
        let index = match arith::integerize(self.state.a) {
            (None, q) => {
                self.report(q);
                return Err(Abandon::Fault);
            }
            (Some(v), _) => decompose(v),
        };
        let d = Descriptor(dw);
        if (index.negative && index.mantissa != 0) || index.mantissa >= u64::from(d.word_count()) {
            self.raise(crate::irq::Q_INDEX_ERROR);
            return Err(Abandon::Fault);
        }
        let addr = d.address().wrapping_add(index.mantissa as Addr) & (CORE as Addr);
        self.state.b = (dw & !CORE) | to_core(addr);
        self.state.arof = false;
        Ok(())
    }
}

/// Extract `n` bits starting `start` bits from the left of the word,
/// right-justified.
pub(crate) fn field_extract(w: Word, start: u32, n: u32) -> Word {
    if start >= 48 || n == 0 {
        return 0;
    }
    let n = n.min(48 - start);
    (w >> (48 - start - n)) & low_mask(n)
}

/// Insert the low `n` bits of `bits` into `w`, `start` bits from the
/// left.
pub(crate) fn field_insert(w: Word, start: u32, bits: Word, n: u32) -> Word {
    if start >= 48 || n == 0 {
        return w;
    }
    let n = n.min(48 - start);
    let shift = 48 - start - n;
    (w & !(low_mask(n) << shift)) | ((bits & low_mask(n)) << shift)
}

fn low_mask(n: u32) -> Word {
    if n >= 48 {
        WORD_MASK
    } else {
        (1 << n) - 1
    }
}
