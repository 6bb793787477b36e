//! Top-of-stack discipline.
//!
//! The A and B registers cache the top two stack words; S points at
//! the highest word actually in memory.  Fill primitives make a
//! register valid (promoting B to A or reading at S), empty
//! primitives spill registers to memory preserving order (B below A).
//! Pushing past the fence at the R block boundary is a stack-overflow
//! fault in normal state, recorded but not refused.

use base::prelude::*;

use crate::irq::Q_STK_OVERFL;

use super::{Abandon, OpResult, Processor};

impl Processor<'_> {
    pub(crate) fn spill(&mut self, w: Word) -> OpResult {
        self.state.s = self.state.s.wrapping_add(1) & (CORE as Addr);
        if self.state.s & 0o77700 == self.state.r {
            self.raise(Q_STK_OVERFL);
        }
        self.store_word(self.state.s, w)
    }

    pub(crate) fn unspill(&mut self) -> Result<Word, Abandon> {
        let w = self.fetch_word(self.state.s)?;
        self.state.s = self.state.s.wrapping_sub(1) & (CORE as Addr);
        Ok(w)
    }

    /// Make A valid.
    pub(crate) fn fill_a(&mut self) -> OpResult {
        if self.state.arof {
            // already valid
        } else if self.state.brof {
            self.state.a = self.state.b;
            self.state.arof = true;
            self.state.brof = false;
        } else {
            self.state.a = self.unspill()?;
            self.state.arof = true;
        }
        Ok(())
    }

    /// Make B valid without touching A.
    pub(crate) fn fill_b(&mut self) -> OpResult {
        if !self.state.brof {
            self.state.b = self.unspill()?;
            self.state.brof = true;
        }
        Ok(())
    }

    /// Make both registers valid, A above B.
    pub(crate) fn fill_ab(&mut self) -> OpResult {
        self.fill_a()?;
        self.fill_b()
    }

    /// Make the top-of-stack word current in memory at S and return
    /// it.  A is spilled when cached, else B, else the word already
    /// at S is re-spilled.  I/O initiation consumes the word from
    /// memory afterwards.
    pub(crate) fn save_tos(&mut self) -> Result<Word, Abandon> {
        if self.state.arof {
            let a = self.state.a;
            self.spill(a)?;
            self.state.arof = false;
            Ok(a)
        } else if self.state.brof {
            let b = self.state.b;
            self.spill(b)?;
            self.state.brof = false;
            Ok(b)
        } else {
            let w = self.fetch_word(self.state.s)?;
            self.spill(w)?;
            Ok(w)
        }
    }

    /// Spill B only.
    pub(crate) fn empty_b(&mut self) -> OpResult {
        if self.state.brof {
            let b = self.state.b;
            self.spill(b)?;
            self.state.brof = false;
        }
        Ok(())
    }

    /// Spill both registers, B below A.
    pub(crate) fn empty_ab(&mut self) -> OpResult {
        self.empty_b()?;
        if self.state.arof {
            let a = self.state.a;
            self.spill(a)?;
            self.state.arof = false;
        }
        Ok(())
    }

    /// Push a word onto the stack.  The old top slides into B, and
    /// the old B spills.
    pub(crate) fn push(&mut self, w: Word) -> OpResult {
        if self.state.arof {
            if self.state.brof {
                let b = self.state.b;
                self.spill(b)?;
            }
            self.state.b = self.state.a;
            self.state.brof = true;
        }
        self.state.a = w;
        self.state.arof = true;
        Ok(())
    }

    /// Pop the top word off the stack.
    pub(crate) fn pop(&mut self) -> Result<Word, Abandon> {
        self.fill_a()?;
        self.state.arof = false;
        Ok(self.state.a)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::Machine;
    use crate::irq::Q_STK_OVERFL;

    #[test]
    fn push_and_pop_preserve_order() {
        let mut m = Machine::new();
        let mut p = m.proc();
        p.state.s = 0o2000;
        for v in [10, 20, 30, 40] {
            p.push(v).expect("push");
        }
        // Two words must have spilled.
        assert_eq!(p.state.s, 0o2002);
        for want in [40, 30, 20, 10] {
            assert_eq!(p.pop().expect("pop"), want);
        }
        assert_eq!(p.state.s, 0o2000);
    }

    #[test]
    fn fill_a_promotes_b_first() {
        let mut m = Machine::new();
        let mut p = m.proc();
        p.state.b = 77;
        p.state.brof = true;
        p.fill_a().expect("fill");
        assert!(p.state.arof);
        assert!(!p.state.brof);
        assert_eq!(p.state.a, 77);
    }

    #[test]
    fn empty_ab_spills_b_below_a() {
        let mut m = Machine::new();
        let mut p = m.proc();
        p.state.s = 0o2000;
        p.state.a = 2;
        p.state.b = 1;
        p.state.arof = true;
        p.state.brof = true;
        p.empty_ab().expect("empty");
        assert_eq!(p.mem.get(0o2001), 1);
        assert_eq!(p.mem.get(0o2002), 2);
        assert_eq!(p.state.s, 0o2002);
        assert!(!p.state.arof && !p.state.brof);
    }

    #[test]
    fn save_tos_prefers_the_a_register() {
        let mut m = Machine::new();
        let mut p = m.proc();
        p.state.s = 0o2000;
        p.state.a = 7;
        p.state.b = 3;
        p.state.arof = true;
        p.state.brof = true;
        assert_eq!(p.save_tos().expect("save"), 7);
        assert_eq!(p.mem.get(0o2001), 7);
        assert!(!p.state.arof);
        assert!(p.state.brof, "only the top word moves");
    }

    #[test]
    fn save_tos_respills_from_memory_when_nothing_is_cached() {
        let mut m = Machine::new();
        m.mem.set(0o2000, 11);
        let mut p = m.proc();
        p.state.s = 0o2000;
        assert_eq!(p.save_tos().expect("save"), 11);
        assert_eq!(p.mem.get(0o2001), 11);
        assert_eq!(p.state.s, 0o2001);
    }

    #[test]
    fn pushing_past_the_fence_is_an_overflow_fault() {
        let mut m = Machine::new();
        let mut p = m.proc();
        p.state.ncsf = true;
        p.state.r = 0o2100;
        p.state.s = 0o2077;
        p.state.a = 1;
        p.state.b = 2;
        p.state.arof = true;
        p.state.brof = true;
        // The third push spills B into the fenced block.
        p.push(3).expect("push");
        assert_ne!(p.q() & Q_STK_OVERFL, 0);
    }

    #[test]
    fn control_state_ignores_the_fence() {
        let mut m = Machine::new();
        let mut p = m.proc();
        p.state.r = 0o2100;
        p.state.s = 0o2077;
        p.state.a = 1;
        p.state.b = 2;
        p.state.arof = true;
        p.state.brof = true;
        p.push(3).expect("push");
        assert_eq!(p.q(), 0);
    }
}
