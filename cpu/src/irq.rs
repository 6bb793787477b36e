//! Interrupt bookkeeping.
//!
//! Two registers drive interrupt handling.  The machine-wide IAR
//! collects conditions raised outside any processor (the interval
//! timer, I/O channel completions, the keyboard, processor 2 going
//! busy).  Each processor additionally has a Q register of its own
//! fault conditions (divide by zero, presence bit and so on), set at
//! the point of fault and serviced later.
//!
//! Servicing is a pure priority scan: `next_pending` looks at the
//! current processor's Q, the IAR, and (when processor 2 is stopped)
//! processor 2's Q, and names at most one condition.  The caller
//! clears the corresponding bit and vectors to the condition's cell.
//! The scan itself never mutates anything, which keeps it easy to
//! test.

use base::prelude::Addr;

// IAR bits, low bit first.  The bit order is the service order within
// the IAR.
pub const IRQ_TIMER: u16 = 0o001;
pub const IRQ_IO_BUSY: u16 = 0o002;
pub const IRQ_KEYBOARD: u16 = 0o004;
pub const IRQ_CHAN1: u16 = 0o010;
pub const IRQ_CHAN2: u16 = 0o020;
pub const IRQ_CHAN3: u16 = 0o040;
pub const IRQ_CHAN4: u16 = 0o100;
pub const IRQ_P2_BUSY: u16 = 0o200;

// Q register bits, one per processor fault condition.
pub const Q_MEM_PARITY: u16 = 0o0001;
pub const Q_INVALID_ADDR: u16 = 0o0002;
pub const Q_STK_OVERFL: u16 = 0o0004;
pub const Q_FLAG_BIT: u16 = 0o0010;
pub const Q_INDEX_ERROR: u16 = 0o0020;
pub const Q_EXPO_OVER: u16 = 0o0040;
pub const Q_EXPO_UNDER: u16 = 0o0100;
pub const Q_INT_OVER: u16 = 0o0200;
pub const Q_DIV_ZERO: u16 = 0o0400;
pub const Q_PRES_BIT: u16 = 0o1000;
pub const Q_COM_OPR: u16 = 0o2000;

/// Control state entry point for a forced interrupt on processor 1.
pub const INTERRUPT_ENTRY: Addr = 0o20;

/// Interrupt vector cells for IAR conditions, indexed by bit number.
const IAR_VECTOR: [Addr; 8] = [
    0o22, // interval timer
    0o23, // I/O channels all busy
    0o24, // keyboard request
    0o30, // channel 1 finished
    0o31, // channel 2 finished
    0o32, // channel 3 finished
    0o33, // channel 4 finished
    0o34, // processor 2 busy
];

/// Vector cell for a processor 1 fault condition; processor 2's cells
/// sit 0o20 higher.
fn condition_vector(bit: u16) -> Addr {
    match bit {
        Q_MEM_PARITY => 0o60,
        Q_INVALID_ADDR => 0o61,
        Q_STK_OVERFL => 0o62,
        Q_FLAG_BIT => 0o63,
        Q_INDEX_ERROR => 0o64,
        Q_EXPO_OVER => 0o65,
        Q_EXPO_UNDER => 0o66,
        Q_INT_OVER => 0o67,
        Q_DIV_ZERO => 0o70,
        Q_PRES_BIT => 0o71,
        Q_COM_OPR => 0o72,
        _ => unreachable!("not a single Q condition: {bit:#o}"),
    }
}

/// The one condition an ITI should service next, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    /// A fault in the servicing processor's own Q register.
    Own { bit: u16, vector: Addr },
    /// A machine-wide condition in the IAR.  `channel` names the I/O
    /// channel to release for the channel-finished conditions.
    Machine {
        bit: u16,
        vector: Addr,
        channel: Option<usize>,
    },
    /// A fault in stopped processor 2's Q register, serviced on its
    /// behalf by processor 1.
    Other { bit: u16, vector: Addr },
}

// Memory parity and invalid address outrank everything, then the IAR,
// then the processor's remaining own faults, with stack overflow last
// among them.
const EARLY_OWN: [u16; 2] = [Q_MEM_PARITY, Q_INVALID_ADDR];
const LATE_OWN: [u16; 9] = [
    Q_FLAG_BIT,
    Q_INDEX_ERROR,
    Q_EXPO_OVER,
    Q_EXPO_UNDER,
    Q_INT_OVER,
    Q_DIV_ZERO,
    Q_PRES_BIT,
    Q_COM_OPR,
    Q_STK_OVERFL,
];

fn scan_q(q: u16) -> Option<u16> {
    EARLY_OWN
        .iter()
        .chain(LATE_OWN.iter())
        .copied()
        .find(|bit| q & bit != 0)
}

/// Priority scan over the servicing processor's Q, the IAR, and
/// (if supplied) stopped processor 2's Q.  `second` shifts the own
/// vector cells to processor 2's block.
pub fn next_pending(q: u16, iar: u16, second: bool, p2_q: Option<u16>) -> Option<Pending> {
    let own_offset: Addr = if second { 0o20 } else { 0 };
    for bit in EARLY_OWN {
        if q & bit != 0 {
            return Some(Pending::Own {
                bit,
                vector: condition_vector(bit) + own_offset,
            });
        }
    }
    if iar != 0 {
        let n = iar.trailing_zeros() as usize;
        if n < IAR_VECTOR.len() {
            let bit = 1 << n;
            let channel = match bit {
                IRQ_CHAN1 => Some(0),
                IRQ_CHAN2 => Some(1),
                IRQ_CHAN3 => Some(2),
                IRQ_CHAN4 => Some(3),
                _ => None,
            };
            return Some(Pending::Machine {
                bit,
                vector: IAR_VECTOR[n],
                channel,
            });
        }
    }
    for bit in LATE_OWN {
        if q & bit != 0 {
            return Some(Pending::Own {
                bit,
                vector: condition_vector(bit) + own_offset,
            });
        }
    }
    if let Some(q2) = p2_q {
        if let Some(bit) = scan_q(q2) {
            return Some(Pending::Other {
                bit,
                vector: condition_vector(bit) + 0o20,
            });
        }
    }
    None
}
