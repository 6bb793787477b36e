//! Whole-processor tests: programs in memory executed syllable by
//! syllable, plus direct exercises of the linkage and interrupt
//! sequences.

use base::prelude::*;

use crate::channel::NoChannels;
use crate::irq::{
    Q_COM_OPR, Q_FLAG_BIT, Q_INDEX_ERROR, Q_INVALID_ADDR, Q_STK_OVERFL, IRQ_IO_BUSY, IRQ_P2_BUSY,
    IRQ_TIMER,
};
use crate::memory::{MemoryConfiguration, MemoryUnit};

use super::{CpuIndex, CpuState, Integerize, Processor, SharedState};

/// One processor, the shared state and a full memory, wired up the way
/// the system object does it.
pub(crate) struct Machine {
    pub(crate) cpu: CpuState,
    pub(crate) shared: SharedState,
    pub(crate) mem: MemoryUnit,
    channels: NoChannels,
}

impl Machine {
    pub(crate) fn new() -> Machine {
        Machine {
            cpu: CpuState::default(),
            shared: SharedState::default(),
            mem: MemoryUnit::new(&MemoryConfiguration::default()),
            channels: NoChannels,
        }
    }

    pub(crate) fn proc(&mut self) -> Processor<'_> {
        self.proc_as(CpuIndex::P1)
    }

    pub(crate) fn proc_as(&mut self, index: CpuIndex) -> Processor<'_> {
        Processor {
            state: &mut self.cpu,
            shared: &mut self.shared,
            mem: &mut self.mem,
            channels: &mut self.channels,
            index,
        }
    }
}

fn litc(v: u16) -> u16 {
    v << 2
}

fn opdc(off: u16) -> u16 {
    (off << 2) | 2
}

fn opr(op: WordOp) -> u16 {
    op.syllable()
}

fn load_program(m: &mut Machine, addr: Addr, syllables: &[u16]) {
    for (i, chunk) in syllables.chunks(4).enumerate() {
        let mut s = [0u16; 4];
        s[..chunk.len()].copy_from_slice(chunk);
        m.mem.set(addr + i as Addr, pack_syllables(s));
    }
}

fn word_of_chars(cs: [u8; 8]) -> Word {
    cs.iter()
        .enumerate()
        .fold(0, |w, (i, c)| with_char(w, i as u32, *c))
}

fn run(m: &mut Machine, steps: usize) {
    for _ in 0..steps {
        m.proc().step().expect("program stopped unexpectedly");
    }
}

/// A machine in normal state with an empty stack at 0o3000 and the
/// cursor at `entry`.
fn user_machine(entry: Addr) -> Machine {
    let mut m = Machine::new();
    m.cpu.ncsf = true;
    m.cpu.s = 0o3000;
    m.cpu.f = 0o2700;
    m.cpu.r = 0o2000;
    m.cpu.c = entry;
    m
}

mod word_mode {
    use super::*;

    #[test]
    fn literals_add() {
        let mut m = user_machine(0o1100);
        load_program(&mut m, 0o1100, &[litc(5), litc(3), opr(WordOp::ADD)]);
        run(&mut m, 3);
        assert!(m.cpu.brof);
        assert!(!m.cpu.arof);
        assert_eq!(m.cpu.b, integer(8), "5 + 3 must stay an exact integer");
        assert_eq!(m.shared.q[0], 0);
    }

    #[test]
    fn subtraction_can_go_negative() {
        let mut m = user_machine(0o1100);
        load_program(&mut m, 0o1100, &[litc(7), litc(9), opr(WordOp::SUB)]);
        run(&mut m, 3);
        assert_eq!(m.cpu.b, integer(-2));
    }

    #[test]
    fn relational_leaves_truth_in_b() {
        let mut m = user_machine(0o1100);
        load_program(&mut m, 0o1100, &[litc(3), litc(5), opr(WordOp::LSS)]);
        run(&mut m, 3);
        assert_eq!(m.cpu.b, integer(1), "3 < 5");

        let mut m = user_machine(0o1100);
        load_program(&mut m, 0o1100, &[litc(3), litc(5), opr(WordOp::GTR)]);
        run(&mut m, 3);
        assert_eq!(m.cpu.b, integer(0));
    }

    #[test]
    fn conditional_branch_not_taken_when_condition_is_true() {
        let mut m = user_machine(0o1100);
        load_program(
            &mut m,
            0o1100,
            &[
                litc(1),
                litc(4),
                opr(WordOp::BFC),
                litc(0o10),
                litc(0o20),
                litc(0o30),
                litc(0o40),
                litc(0o50),
            ],
        );
        run(&mut m, 4);
        assert_eq!(m.cpu.a, integer(0o10), "fell through to the next syllable");
    }

    #[test]
    fn conditional_branch_taken_when_condition_is_false() {
        let mut m = user_machine(0o1100);
        load_program(
            &mut m,
            0o1100,
            &[
                litc(0),
                litc(4),
                opr(WordOp::BFC),
                litc(0o10),
                litc(0o20),
                litc(0o30),
                litc(0o40),
                litc(0o50),
            ],
        );
        run(&mut m, 4);
        // The displacement counts from the syllable after the branch.
        assert_eq!(m.cpu.a, integer(0o50));
    }

    #[test]
    fn destructive_store_through_a_descriptor() {
        let mut m = user_machine(0);
        m.proc().push(integer(42)).unwrap();
        m.proc().push(Descriptor::data(0o1500, 1)).unwrap();
        m.proc().op_store(true, Integerize::Never).unwrap();
        assert_eq!(m.mem.get(0o1500), integer(42));
        assert!(!m.cpu.arof);
        assert!(!m.cpu.brof, "STD consumes the value");
    }

    #[test]
    fn nondestructive_store_keeps_the_value() {
        let mut m = user_machine(0);
        m.proc().push(integer(42)).unwrap();
        m.proc().push(Descriptor::data(0o1500, 1)).unwrap();
        m.proc().op_store(false, Integerize::Never).unwrap();
        assert_eq!(m.mem.get(0o1500), integer(42));
        assert!(m.cpu.brof);
        assert_eq!(m.cpu.b, integer(42));
    }

    #[test]
    fn integerizing_store_rounds() {
        let mut m = user_machine(0);
        // 4 times 8 to the -1: one half, which rounds up.
        m.proc().push(operand(false, -1, 4)).unwrap();
        m.proc().push(Descriptor::data(0o1500, 1)).unwrap();
        m.proc().op_store(true, Integerize::Always).unwrap();
        assert_eq!(m.mem.get(0o1500), integer(1));
    }

    #[test]
    fn storing_through_a_plain_word_is_a_flag_fault() {
        let mut m = user_machine(0);
        m.proc().push(integer(42)).unwrap();
        m.proc().push(integer(0o1500)).unwrap();
        assert!(m.proc().op_store(true, Integerize::Never).is_err());
        assert_ne!(m.shared.q[0] & Q_FLAG_BIT, 0);
        assert_eq!(m.mem.get(0o1500), 0, "nothing was stored");
    }

    #[test]
    fn control_state_stores_through_a_bare_address() {
        let mut m = user_machine(0);
        m.cpu.ncsf = false;
        m.proc().push(integer(42)).unwrap();
        m.proc().push(integer(0o500)).unwrap();
        m.proc().op_store(true, Integerize::Never).unwrap();
        assert_eq!(m.mem.get(0o500), integer(42));
        assert_eq!(m.shared.q[0], 0);
    }

    #[test]
    fn index_advances_a_descriptor() {
        let mut m = user_machine(0);
        m.proc().push(Descriptor::data(0o500, 5)).unwrap();
        m.proc().push(integer(3)).unwrap();
        m.proc().op_index().unwrap();
        let d = Descriptor(m.cpu.b);
        assert_eq!(d.address(), 0o503);
        assert_eq!(d.word_count(), 5);
        assert!(!m.cpu.arof);
    }

    #[test]
    fn index_past_the_word_count_faults_and_changes_nothing() {
        let mut m = user_machine(0);
        m.proc().push(Descriptor::data(0o500, 5)).unwrap();
        m.proc().push(integer(7)).unwrap();
        assert!(m.proc().op_index().is_err());
        assert_ne!(m.shared.q[0] & Q_INDEX_ERROR, 0);
        assert_eq!(Descriptor(m.cpu.b).address(), 0o500, "descriptor untouched");
        assert_eq!(m.cpu.a, integer(7), "index untouched");
    }
}

mod linkage {
    use super::*;

    /// FLAG and PRESENT plus the program bit.
    fn program_descriptor(addr: Addr, args: bool) -> Word {
        let base = FLAG | PRESENT | PROGF | to_core(addr);
        if args {
            base | ARGF
        } else {
            base
        }
    }

    #[test]
    fn unmarked_call_without_arguments_is_a_no_op() {
        let mut m = user_machine(0o1300);
        m.mem.set(0o2005, program_descriptor(0o1400, false));
        load_program(&mut m, 0o1300, &[opdc(5)]);
        run(&mut m, 1);
        assert_eq!(m.cpu.c, 0o1300);
        assert_eq!(m.cpu.l, 1, "cursor just moved past the syllable");
        assert!(!m.cpu.arof);
        assert!(!m.cpu.salf);
    }

    #[test]
    fn mark_call_and_return() {
        let mut m = user_machine(0o1300);
        m.mem.set(0o2005, program_descriptor(0o1400, true));
        load_program(
            &mut m,
            0o1300,
            &[opr(WordOp::MKS), litc(7), opdc(5)],
        );
        load_program(&mut m, 0o1400, &[litc(0o12), opr(WordOp::RTN)]);
        run(&mut m, 3);
        // Inside the subroutine: MSCW at 0o3001, the argument above
        // it, the RCW on top with F pointing at it.
        assert_eq!(m.cpu.c, 0o1400);
        assert_eq!(m.cpu.l, 0);
        assert!(m.cpu.salf);
        assert!(!m.cpu.msff);
        assert_eq!(m.cpu.f, 0o3003);
        let rcw = Rcw::from_word(m.mem.get(0o3003));
        assert_eq!((rcw.c, rcw.l), (0o1300, 3));
        assert_eq!(rcw.f, 0o3001, "RCW links to the mark");
        assert_eq!(m.mem.get(0o3002), integer(7), "argument sits under the RCW");
        let mscw = Mscw::from_word(m.mem.get(0o3001));
        assert_eq!(mscw.f, 0o2700);
        assert!(!mscw.msff);

        run(&mut m, 2);
        // RTN unwound the pair and pushed the value.
        assert_eq!((m.cpu.c, m.cpu.l), (0o1300, 3));
        assert_eq!(m.cpu.s, 0o3000);
        assert_eq!(m.cpu.f, 0o2700);
        assert!(!m.cpu.salf);
        assert!(!m.cpu.msff);
        assert!(m.cpu.arof);
        assert_eq!(m.cpu.a, integer(0o12));
    }

    #[test]
    fn argument_mismatch_synthesizes_the_missing_mark() {
        let mut m = user_machine(0o1300);
        m.mem.set(0o2005, program_descriptor(0o1400, true));
        load_program(&mut m, 0o1300, &[opdc(5)]);
        run(&mut m, 1);
        assert_eq!(m.cpu.c, 0o1400);
        let rcw = Rcw::from_word(m.mem.get(m.cpu.f));
        let mscw = Mscw::from_word(m.mem.get(rcw.f));
        assert_eq!(rcw.f, m.cpu.f - 1, "mark sits directly under the RCW");
        assert_eq!(mscw.f, 0o2700);
        assert_eq!(mscw.r, 0o2000);
    }

    #[test]
    fn absent_program_descriptor_is_a_presence_fault() {
        let mut m = user_machine(0o1300);
        m.mem.set(0o2005, FLAG | PROGF | ARGF | to_core(0o1400));
        load_program(&mut m, 0o1300, &[opdc(5)]);
        run(&mut m, 1);
        assert_ne!(m.shared.q[0] & crate::irq::Q_PRES_BIT, 0);
        assert_eq!(m.cpu.c, 0o1300, "the call was abandoned");
    }

    #[test]
    fn char_mode_entry_and_exit_round_trip() {
        let mut m = user_machine(0o1100);
        m.cpu.l = 1;
        let ptr = Pointer {
            addr: 0o1500,
            ch: 2,
            bit: 0,
        };
        m.proc().push(ptr.to_word()).unwrap();
        m.proc().op_enter_char_mode().unwrap();
        assert!(m.cpu.cwmf);
        assert!(m.cpu.salf);
        assert!(!m.cpu.msff);
        assert_eq!(m.cpu.r, 0);
        assert_eq!(m.cpu.m, 0o1500);
        assert_eq!(m.cpu.gh, 2 << 3);
        assert_eq!(m.cpu.s, 0o1500, "destination starts at the source");
        assert_eq!(m.cpu.kv, 2 << 3);
        assert_eq!(m.cpu.f, 0o3002);

        m.proc().exit_via_rcw(true).unwrap();
        assert!(!m.cpu.cwmf);
        assert!(!m.cpu.salf);
        assert_eq!(m.cpu.s, 0o3000);
        assert_eq!(m.cpu.f, 0o2700);
        assert_eq!(m.cpu.r, 0o2000);
        assert_eq!((m.cpu.c, m.cpu.l), (0o1100, 1));
    }
}

mod interrupts {
    use super::*;

    #[test]
    fn iti_services_one_condition_in_priority_order() {
        let mut m = Machine::new();
        m.shared.q[0] = Q_INVALID_ADDR | Q_STK_OVERFL;
        m.proc().op_interrogate_interrupts().unwrap();
        assert_eq!((m.cpu.c, m.cpu.l), (0o61, 0), "invalid address first");
        assert_eq!(m.shared.q[0], Q_STK_OVERFL);

        m.proc().op_interrogate_interrupts().unwrap();
        assert_eq!(m.cpu.c, 0o62, "stack overflow next");
        assert_eq!(m.shared.q[0], 0);
    }

    #[test]
    fn machine_interrupts_come_before_late_own_faults() {
        let mut m = Machine::new();
        m.shared.q[0] = Q_FLAG_BIT;
        m.shared.iar = IRQ_TIMER;
        m.proc().op_interrogate_interrupts().unwrap();
        assert_eq!(m.cpu.c, 0o22, "the timer cell");
        assert_eq!(m.shared.iar, 0);
        assert_eq!(m.shared.q[0], Q_FLAG_BIT, "the fault waits its turn");

        m.proc().op_interrogate_interrupts().unwrap();
        assert_eq!(m.cpu.c, 0o63);
    }

    #[test]
    fn p1_services_a_stopped_p2s_fault() {
        let mut m = Machine::new();
        m.shared.q[1] = Q_COM_OPR;
        m.shared.p2_run = false;
        m.proc().op_interrogate_interrupts().unwrap();
        assert_eq!(m.cpu.c, 0o112, "the second processor's cell block");
        assert_eq!(m.shared.q[1], 0);
    }

    #[test]
    fn empty_iti_before_a_tight_branch_means_idle() {
        let mut m = Machine::new();
        m.cpu.c = 0o200;
        load_program(
            &mut m,
            0o200,
            &[opr(WordOp::ITI), litc(3), opr(WordOp::BBW)],
        );
        run(&mut m, 1);
        assert!(m.shared.idle);
    }

    #[test]
    fn iti_is_a_no_op_in_normal_state() {
        let mut m = user_machine(0o1200);
        m.shared.q[0] = Q_STK_OVERFL;
        load_program(&mut m, 0o1200, &[opr(WordOp::ITI)]);
        run(&mut m, 1);
        assert_eq!((m.cpu.c, m.cpu.l), (0o1200, 1));
        assert_eq!(m.shared.q[0], Q_STK_OVERFL, "nothing serviced");
    }

    #[test]
    fn forced_interrupt_saves_and_initiate_restores() {
        let mut m = user_machine(0o411);
        m.cpu.l = 2;
        m.cpu.salf = true;
        m.proc().push(integer(5)).unwrap();
        m.proc().push(integer(6)).unwrap();
        let before = m.cpu.clone();

        m.proc().store_interrupt(true, false).unwrap();
        assert!(!m.cpu.ncsf);
        assert_eq!((m.cpu.c, m.cpu.l), (crate::irq::INTERRUPT_ENTRY, 0));
        assert_eq!(m.cpu.r, 0);
        assert!(!m.cpu.salf && !m.cpu.arof && !m.cpu.brof);

        // The saved context sits at fixed offsets from the old R.
        let saved = Incw::from_word(m.mem.get(0o2010));
        assert!(saved.ncsf);
        assert!(saved.salf);
        assert!(saved.arof && saved.brof);
        assert_eq!(saved.s, 0o3002, "both cached words were spilled");
        assert_eq!(m.mem.get(0o2012) & FLAG, FLAG, "packed Q word is flagged");

        // What the operating system does to resume: put the initiate
        // RCW back on top of the stack and initiate from the INCW.
        let top = saved.s + 1;
        let ircw = m.mem.get(0o2011);
        m.mem.set(top, ircw);
        let incw = Incw { s: top, ..saved };
        m.proc().initiate(incw).unwrap();

        assert_eq!((m.cpu.c, m.cpu.l), (before.c, before.l));
        assert_eq!(m.cpu.s, before.s);
        assert_eq!(m.cpu.f, before.f);
        assert_eq!(m.cpu.r, before.r);
        assert_eq!(m.cpu.ncsf, before.ncsf);
        assert_eq!(m.cpu.salf, before.salf);
        assert_eq!(m.cpu.a, integer(6));
        assert_eq!(m.cpu.b, integer(5));
        assert!(m.cpu.arof && m.cpu.brof);
        assert!(!m.cpu.hltf);
    }

    #[test]
    fn processor_two_always_initiates_in_normal_state() {
        let mut m = Machine::new();
        let rcw = Rcw {
            c: 0o1300,
            f: 0o4000,
            ..Rcw::default()
        };
        m.mem.set(0o4001, rcw.to_word());
        let incw = Incw {
            s: 0o4001,
            r: 0o4100,
            ncsf: false,
            ..Incw::default()
        };
        m.proc_as(CpuIndex::P2).initiate(incw).unwrap();
        assert!(m.cpu.ncsf, "the INCW cannot grant processor 2 control state");
        // A control-state operator stays a no-op for it.
        m.shared.timer = 0o42;
        m.proc_as(CpuIndex::P2).op_read_timer().unwrap();
        assert!(!m.cpu.arof, "RTR refused");
    }

    #[test]
    fn io_initiation_consumes_the_descriptor_pointer() {
        let mut m = Machine::new();
        m.cpu.s = 0o2000;
        m.proc().push(integer(0o1750)).unwrap();
        m.proc().op_initiate_io().unwrap();
        assert_eq!(m.mem.get(0o10), integer(0o1750), "parked in the control cell");
        assert_eq!(m.cpu.s, 0o2000, "the pointer word is consumed");
        assert!(!m.cpu.arof);
        assert_ne!(m.shared.iar & IRQ_IO_BUSY, 0, "no channels fitted");
    }

    #[test]
    fn forced_interrupt_parks_processor_two() {
        let mut m = Machine::new();
        m.shared.p2_run = true;
        m.cpu.ncsf = true;
        m.cpu.r = 0o4000;
        m.cpu.s = 0o4100;
        m.cpu.c = 0o450;
        m.proc_as(CpuIndex::P2)
            .store_interrupt(true, false)
            .unwrap();
        assert!(m.cpu.hltf);
        assert!(!m.shared.p2_run);
        assert_ne!(m.shared.iar & IRQ_P2_BUSY, 0);
        let saved = Incw::from_word(m.mem.get(0o4010));
        assert!(saved.ncsf);
        assert_eq!(saved.s, 0o4100);
    }
}

mod char_mode {
    use super::*;

    /// A machine already in character mode, source at 0o1500 and
    /// destination at 0o1600.
    fn char_machine() -> Machine {
        let mut m = Machine::new();
        m.cpu.ncsf = true;
        m.cpu.cwmf = true;
        m.cpu.f = 0o2700;
        m.cpu.m = 0o1500;
        m.cpu.s = 0o1600;
        m
    }

    fn exec(m: &mut Machine, op: CharOp, field: u8) {
        let t = op.syllable(field);
        m.proc().execute_char(t).unwrap();
    }

    #[test]
    fn transfer_crosses_word_boundaries() {
        let mut m = char_machine();
        m.mem
            .set(0o1500, word_of_chars([1, 2, 3, 4, 5, 6, 7, 0o10]));
        m.mem
            .set(0o1501, word_of_chars([0o11, 0o12, 0, 0, 0, 0, 0, 0]));
        exec(&mut m, CharOp::TRS, 10);
        assert_eq!(m.mem.get(0o1600), word_of_chars([1, 2, 3, 4, 5, 6, 7, 0o10]));
        assert_eq!(char_at(m.mem.get(0o1601), 0), 0o11);
        assert_eq!(char_at(m.mem.get(0o1601), 1), 0o12);
        assert_eq!(m.cpu.m, 0o1501);
        assert_eq!(m.cpu.gh, 2 << 3);
        assert_eq!(m.cpu.s, 0o1601);
        assert_eq!(m.cpu.kv, 2 << 3);
    }

    #[test]
    fn numeric_transfer_strips_zones() {
        let mut m = char_machine();
        m.mem.set(0o1500, word_of_chars([0o65, 0o42, 0, 0, 0, 0, 0, 0]));
        exec(&mut m, CharOp::TRN, 2);
        assert_eq!(char_at(m.mem.get(0o1600), 0), 0o05);
        assert_eq!(char_at(m.mem.get(0o1600), 1), 0o02);
    }

    #[test]
    fn zone_transfer_keeps_the_digits() {
        let mut m = char_machine();
        m.mem.set(0o1500, word_of_chars([0o40, 0, 0, 0, 0, 0, 0, 0]));
        m.mem.set(0o1600, word_of_chars([0o07, 0, 0, 0, 0, 0, 0, 0]));
        exec(&mut m, CharOp::TRZ, 1);
        assert_eq!(char_at(m.mem.get(0o1600), 0), 0o47);
    }

    #[test]
    fn comparison_sets_the_flip_flop() {
        let mut m = char_machine();
        m.mem.set(0o1500, word_of_chars([0o21, 0o22, 0o24, 0, 0, 0, 0, 0]));
        m.mem.set(0o1600, word_of_chars([0o21, 0o22, 0o23, 0, 0, 0, 0, 0]));
        exec(&mut m, CharOp::CLS, 3);
        assert!(m.cpu.msff, "destination collates low");
        assert_eq!(m.cpu.gh, 3 << 3, "the whole field is crossed");
        assert_eq!(m.cpu.kv, 3 << 3);

        let mut m = char_machine();
        m.mem.set(0o1500, word_of_chars([0o21, 0o22, 0, 0, 0, 0, 0, 0]));
        m.mem.set(0o1600, word_of_chars([0o21, 0o22, 0, 0, 0, 0, 0, 0]));
        exec(&mut m, CharOp::CEQ, 2);
        assert!(m.cpu.msff);
    }

    #[test]
    fn decimal_add_carries() {
        let mut m = char_machine();
        m.mem.set(0o1500, word_of_chars([0, 1, 7, 0, 0, 0, 0, 0]));
        m.mem.set(0o1600, word_of_chars([0, 2, 5, 0, 0, 0, 0, 0]));
        exec(&mut m, CharOp::FAD, 3);
        let d = m.mem.get(0o1600);
        assert_eq!(
            (char_at(d, 0), char_at(d, 1), char_at(d, 2)),
            (0, 4, 2),
            "025 + 017 = 042"
        );
        assert!(!m.cpu.msff);
    }

    #[test]
    fn decimal_subtract_flips_the_sign() {
        let mut m = char_machine();
        m.mem.set(0o1500, word_of_chars([0, 4, 7, 0, 0, 0, 0, 0]));
        m.mem.set(0o1600, word_of_chars([0, 2, 5, 0, 0, 0, 0, 0]));
        exec(&mut m, CharOp::FSU, 3);
        let d = m.mem.get(0o1600);
        assert_eq!(char_at(d, 0), 0o40, "sign zone on the first character");
        assert_eq!((char_at(d, 1), char_at(d, 2)), (2, 2), "025 - 047 = -022");
        assert!(!m.cpu.msff);
    }

    #[test]
    fn decimal_overflow_sets_the_flip_flop() {
        let mut m = char_machine();
        m.mem.set(0o1500, word_of_chars([9, 9, 0, 0, 0, 0, 0, 0]));
        m.mem.set(0o1600, word_of_chars([0, 1, 0, 0, 0, 0, 0, 0]));
        exec(&mut m, CharOp::FAD, 2);
        assert!(m.cpu.msff, "99 + 01 does not fit two digits");
    }

    #[test]
    fn input_convert_builds_an_integer() {
        let mut m = char_machine();
        m.mem.set(0o1500, word_of_chars([0, 0, 0, 4, 2, 0, 0, 0]));
        exec(&mut m, CharOp::ICV, 5);
        assert_eq!(m.mem.get(0o1600), integer(42));
        assert_eq!(m.cpu.s, 0o1601, "a whole destination word was consumed");
    }

    #[test]
    fn output_convert_writes_signed_digits() {
        let mut m = char_machine();
        m.mem.set(0o1500, integer(-7));
        exec(&mut m, CharOp::OCV, 3);
        let d = m.mem.get(0o1600);
        assert_eq!(char_at(d, 0), 0o40, "zero digit with the sign zone");
        assert_eq!((char_at(d, 1), char_at(d, 2)), (0, 7));
        assert_eq!(m.cpu.m, 0o1501, "a whole source word was consumed");
    }

    #[test]
    fn blanking_stops_at_the_first_significant_digit() {
        let mut m = char_machine();
        m.mem.set(0o1600, word_of_chars([0, 0, 4, 2, 0, 0, 0, 0]));
        exec(&mut m, CharOp::TBN, 4);
        let d = m.mem.get(0o1600);
        assert_eq!((char_at(d, 0), char_at(d, 1)), (0o60, 0o60));
        assert_eq!(char_at(d, 2), 4, "untouched");
        assert!(m.cpu.msff);
        assert_eq!(m.cpu.r, 2, "tally counts the blanks");
        assert_eq!(m.cpu.kv, 2 << 3);
    }

    #[test]
    fn bit_operators_use_the_bit_cursor() {
        let mut m = char_machine();
        m.mem.set(0o1500, 1 << 46);
        exec(&mut m, CharOp::BIT, 0);
        assert!(!m.cpu.msff, "bit 0 of character 0 is clear");
        exec(&mut m, CharOp::BIT, 0);
        assert!(m.cpu.msff, "bit 1 is set");
        assert_eq!(m.cpu.gh, 2, "two bits consumed");

        exec(&mut m, CharOp::BIS, 4);
        let d = m.mem.get(0o1600);
        assert_eq!(d >> 44, 0o17, "four bits set from the top");
    }

    #[test]
    fn jumps_follow_the_flip_flop() {
        let mut m = char_machine();
        m.cpu.c = 0o1200;
        m.cpu.l = 1;
        m.cpu.msff = false;
        exec(&mut m, CharOp::JFC, 5);
        assert_eq!(
            (m.cpu.c, m.cpu.l),
            (0o1201, 2),
            "five syllables past word 0o1200 syllable 1"
        );

        m.cpu.msff = true;
        exec(&mut m, CharOp::JFC, 5);
        assert_eq!((m.cpu.c, m.cpu.l), (0o1201, 2), "not taken");

        exec(&mut m, CharOp::JRW, 6);
        assert_eq!((m.cpu.c, m.cpu.l), (0o1200, 0));
    }

    #[test]
    fn loops_repeat_and_nest() {
        let mut m = char_machine();
        m.cpu.c = 0o150;
        m.cpu.l = 2;
        m.cpu.x = 0o1234;
        exec(&mut m, CharOp::BNS, 3);
        assert_eq!(m.cpu.f, 0o2701);
        assert_eq!(m.mem.get(0o2701), 0o1234, "outer loop word stacked");

        // Wander off and close the loop: two repeats jump back.
        m.cpu.c = 0o160;
        m.cpu.l = 0;
        exec(&mut m, CharOp::ENS, 0);
        assert_eq!((m.cpu.c, m.cpu.l), (0o150, 2));
        m.cpu.c = 0o160;
        exec(&mut m, CharOp::ENS, 0);
        assert_eq!((m.cpu.c, m.cpu.l), (0o150, 2));
        m.cpu.c = 0o160;
        exec(&mut m, CharOp::ENS, 0);
        assert_eq!((m.cpu.c, m.cpu.l), (0o160, 2), "final pass falls through");
        assert_eq!(m.cpu.x, 0o1234, "outer loop word restored");
        assert_eq!(m.cpu.f, 0o2700);
    }

    #[test]
    fn cursors_store_and_recall() {
        let mut m = char_machine();
        m.cpu.gh = (3 << 3) | 2;
        exec(&mut m, CharOp::SSA, 2);
        let p = Pointer::from_word(m.mem.get(0o2676));
        assert_eq!((p.addr, p.ch, p.bit), (0o1500, 3, 2));

        m.cpu.m = 0o777;
        m.cpu.gh = 0;
        exec(&mut m, CharOp::RSA, 2);
        assert_eq!(m.cpu.m, 0o1500);
        assert_eq!(m.cpu.gh, (3 << 3) | 2);
        assert!(!m.cpu.arof);
    }

    #[test]
    fn program_cursor_stores_and_recalls() {
        let mut m = char_machine();
        m.cpu.c = 0o210;
        m.cpu.l = 3;
        exec(&mut m, CharOp::SCA, 1);
        m.cpu.c = 0o1300;
        m.cpu.l = 0;
        exec(&mut m, CharOp::RCA, 1);
        assert_eq!((m.cpu.c, m.cpu.l), (0o210, 3));
    }

    #[test]
    fn take_address_reads_a_pointer_from_the_source() {
        let mut m = char_machine();
        let p = Pointer {
            addr: 0o1700,
            ch: 1,
            bit: 0,
        };
        m.mem.set(0o1500, p.to_word());
        exec(&mut m, CharOp::TDA, 0);
        assert_eq!(m.cpu.s, 0o1700);
        assert_eq!(m.cpu.kv, 1 << 3);
        assert_eq!(m.cpu.m, 0o1501, "the pointer word is consumed");
    }

    #[test]
    fn call_repeat_overrides_the_next_field() {
        let mut m = char_machine();
        m.cpu.c = 0o1200;
        m.cpu.l = 0;
        // Repeat count 3 on the stack at S; source "XYZ".
        m.mem.set(0o1600, 3);
        m.mem.set(0o1500, word_of_chars([0o27, 0o30, 0o31, 0, 0, 0, 0, 0]));
        load_program(&mut m, 0o1200, &[CharOp::TRS.syllable(0o77)]);
        m.cpu.s = 0o1600;
        exec(&mut m, CharOp::CRF, 0);
        // S popped down to 0o1577, which became the destination.
        assert_eq!(char_at(m.mem.get(0o1577), 0), 0o27);
        assert_eq!(char_at(m.mem.get(0o1577), 2), 0o31);
        assert_eq!(m.cpu.kv, 3 << 3, "three characters, not 0o77");
    }

    #[test]
    fn skips_move_without_transferring() {
        let mut m = char_machine();
        exec(&mut m, CharOp::SFS, 11);
        assert_eq!(m.cpu.m, 0o1501);
        assert_eq!(m.cpu.gh, 3 << 3);
        exec(&mut m, CharOp::SRS, 4);
        assert_eq!(m.cpu.m, 0o1500);
        assert_eq!(m.cpu.gh, 7 << 3);
        exec(&mut m, CharOp::SRD, 1);
        assert_eq!(m.cpu.s, 0o1577);
        assert_eq!(m.cpu.kv, 7 << 3);
    }

    #[test]
    fn program_transfer_takes_two_characters_per_syllable() {
        let mut m = char_machine();
        m.cpu.c = 0o1200;
        m.cpu.l = 1;
        // Three syllables of literal text follow the operator.
        m.mem.set(
            0o1200,
            pack_syllables([0, 0o2122, 0o2324, 0o2526]),
        );
        exec(&mut m, CharOp::TRP, 5);
        let d = m.mem.get(0o1600);
        assert_eq!(
            (0..5).map(|i| char_at(d, i)).collect::<Vec<_>>(),
            vec![0o21, 0o22, 0o23, 0o24, 0o25]
        );
        assert_eq!((m.cpu.c, m.cpu.l), (0o1201, 0), "cursor past the text");
    }
}
