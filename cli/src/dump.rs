//! Coloured register dump written when a run stops.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::{event, Level};

use base::prelude::OctalWord;
use cpu::{CpuState, SharedState};

fn colour_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

pub struct RegisterDump {
    stream: StandardStream,
}

impl RegisterDump {
    pub fn new() -> RegisterDump {
        RegisterDump {
            stream: StandardStream::stdout(colour_choice()),
        }
    }

    fn heading(&mut self, text: &str) -> std::io::Result<()> {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Cyan)).set_bold(true);
        self.stream.set_color(&spec)?;
        writeln!(self.stream, "{text}")?;
        self.stream.reset()
    }

    fn flag(name: &str, value: bool) -> String {
        format!("{name}={}", u8::from(value))
    }

    fn write_cpu(&mut self, label: &str, cpu: &CpuState) -> std::io::Result<()> {
        self.heading(label)?;
        writeln!(
            self.stream,
            "  A={} ({}) B={} ({})",
            OctalWord(cpu.a),
            Self::flag("AROF", cpu.arof),
            OctalWord(cpu.b),
            Self::flag("BROF", cpu.brof),
        )?;
        writeln!(
            self.stream,
            "  C={:05o} L={} S={:05o} F={:05o} R={:05o} M={:05o}",
            cpu.c, cpu.l, cpu.s, cpu.f, cpu.r, cpu.m,
        )?;
        writeln!(
            self.stream,
            "  X={} GH={:02o} KV={:02o}",
            OctalWord(cpu.x),
            cpu.gh,
            cpu.kv
        )?;
        writeln!(
            self.stream,
            "  {} {} {} {} {} {}",
            Self::flag("NCSF", cpu.ncsf),
            Self::flag("SALF", cpu.salf),
            Self::flag("CWMF", cpu.cwmf),
            Self::flag("MSFF", cpu.msff),
            Self::flag("VARF", cpu.varf),
            Self::flag("HLTF", cpu.hltf),
        )
    }

    pub fn write(&mut self, cpus: &[CpuState; 2], shared: &SharedState) -> std::io::Result<()> {
        self.write_cpu("processor 1", &cpus[0])?;
        if shared.p2_run || !cpus[1].hltf {
            self.write_cpu("processor 2", &cpus[1])?;
        }
        self.heading("interrupt state")?;
        writeln!(
            self.stream,
            "  IAR={:04o} Q1={:04o} Q2={:04o} TIMER={:02o}",
            shared.iar, shared.q[0], shared.q[1], shared.timer,
        )
    }

    pub fn finish(&mut self) {
        if let Err(e) = self.stream.reset() {
            event!(Level::ERROR, "failed to reset terminal: {e}");
        }
    }
}

impl Default for RegisterDump {
    fn default() -> RegisterDump {
        RegisterDump::new()
    }
}
