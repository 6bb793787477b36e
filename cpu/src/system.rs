//! The whole machine: two processors, one memory, the shared
//! interrupt state and the I/O channels, stepped syllable by
//! syllable.
//!
//! Processor 1 runs first in each step; processor 2, once initiated,
//! runs in the same step.  The forced-interrupt check happens before a
//! processor's syllable: a processor sitting in normal state with
//! anything pending in the IAR or its Q register is interrupted
//! instead of executing.

use tracing::{event, Level};

use base::prelude::*;

use crate::channel::Channels;
use crate::irq::IRQ_TIMER;
use crate::memory::{MemoryConfiguration, MemoryUnit};
use crate::processor::{Abandon, CpuIndex, CpuState, Processor, SharedState};
use crate::stop::ExecutionStop;

/// Syllables between interval-timer counts.
const TIMER_INTERVAL: u64 = 1024;

/// The cell IP2 reads its INCW from.
pub const P2_INITIATE_CELL: Addr = crate::processor::IO_CONTROL_CELL;

#[derive(Debug)]
pub struct B5500 {
    pub mem: MemoryUnit,
    pub cpus: [CpuState; 2],
    pub shared: SharedState,
    channels: Box<dyn Channels>,
    ticks: u64,
}

/// How a run ended, with the number of syllables executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub syllables: u64,
    pub stop: ExecutionStop,
}

impl B5500 {
    pub fn new(config: &MemoryConfiguration, channels: Box<dyn Channels>) -> B5500 {
        let mut cpus = [CpuState::default(), CpuState::default()];
        for cpu in &mut cpus {
            cpu.reset();
        }
        B5500 {
            mem: MemoryUnit::new(config),
            cpus,
            shared: SharedState::default(),
            channels,
            ticks: 0,
        }
    }

    /// Both processors halted, shared state cleared, memory kept.
    pub fn reset(&mut self) {
        for cpu in &mut self.cpus {
            cpu.reset();
        }
        self.shared = SharedState::default();
        self.ticks = 0;
    }

    /// Wake processor 1 in control state at `entry`, as the load
    /// button did.
    pub fn start_p1(&mut self, entry: Addr) {
        let cpu = &mut self.cpus[0];
        cpu.c = entry;
        cpu.l = 0;
        cpu.prof = false;
        cpu.trof = false;
        cpu.ncsf = false;
        cpu.hltf = false;
        event!(Level::INFO, "processor 1 started at {entry:#o}");
    }

    pub fn processor(&mut self, index: CpuIndex) -> Processor<'_> {
        Processor {
            state: &mut self.cpus[index.number()],
            shared: &mut self.shared,
            mem: &mut self.mem,
            channels: self.channels.as_mut(),
            index,
        }
    }

    /// Execute one syllable on each running processor.  Returns the
    /// number of syllables executed.
    pub fn step(&mut self) -> Result<u64, ExecutionStop> {
        self.ticks += 1;
        let posted = self.channels.poll(&mut self.mem);
        if posted != 0 {
            self.shared.iar |= posted;
        }
        if self.ticks % TIMER_INTERVAL == 0 {
            self.shared.timer = self.shared.timer.wrapping_add(1) & 0o77;
            if self.shared.timer == 0 {
                self.shared.iar |= IRQ_TIMER;
            }
        }
        if self.shared.iar != 0 {
            self.shared.idle = false;
        }
        if self.shared.start_p2 {
            self.initiate_p2()?;
        }
        if self.shared.idle {
            // Nothing pending and the idle loop recognised: there is
            // no work left for either processor.
            return Err(ExecutionStop::ProcessorsIdle);
        }
        let mut executed = 0;
        if self.cpus[0].hltf {
            if !self.shared.p2_run {
                return Err(ExecutionStop::ProcessorsIdle);
            }
        } else {
            self.force_or_step(CpuIndex::P1)?;
            executed += 1;
        }
        if self.shared.p2_run && !self.cpus[1].hltf {
            self.force_or_step(CpuIndex::P2)?;
            executed += 1;
        }
        Ok(executed)
    }

    /// A normal-state processor with anything pending is interrupted
    /// in place of its next syllable.
    fn force_or_step(&mut self, index: CpuIndex) -> Result<(), ExecutionStop> {
        let pending = match index {
            CpuIndex::P1 => self.shared.iar | self.shared.q[0],
            CpuIndex::P2 => self.shared.q[1],
        };
        if self.cpus[index.number()].ncsf && pending != 0 {
            let mut p = self.processor(index);
            return match p.store_interrupt(true, false) {
                Ok(()) | Err(Abandon::Fault) => Ok(()),
                Err(Abandon::Stop(stop)) => Err(stop),
            };
        }
        self.processor(index).step()
    }

    fn initiate_p2(&mut self) -> Result<(), ExecutionStop> {
        self.shared.start_p2 = false;
        let incw = Incw::from_word(self.mem.get(P2_INITIATE_CELL));
        let mut p = self.processor(CpuIndex::P2);
        match p.initiate(incw) {
            Ok(()) => {
                self.shared.p2_run = true;
                Ok(())
            }
            Err(Abandon::Fault) => Ok(()),
            Err(Abandon::Stop(stop)) => Err(stop),
        }
    }

    /// Step until something stops the machine or the syllable limit
    /// runs out.
    pub fn run(&mut self, limit: Option<u64>) -> RunOutcome {
        let mut syllables = 0;
        loop {
            if let Some(max) = limit {
                if syllables >= max {
                    return RunOutcome {
                        syllables,
                        stop: ExecutionStop::LimitReached,
                    };
                }
            }
            match self.step() {
                Ok(n) => syllables += n,
                Err(stop) => {
                    event!(Level::INFO, "run stopped after {syllables} syllables: {stop}");
                    return RunOutcome { syllables, stop };
                }
            }
        }
    }
}
