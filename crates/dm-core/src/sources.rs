//! Catalog of the standard diagnostic sources.
//!
//! Each source pairs one or more process stages with the decoder for the
//! last stage's capture. Multi-stage sources are pipelines: stage N's
//! stdout feeds stage N+1's stdin.
//!
//! Every tool that prints wall-clock times runs with `TZ=UTC`, so decoded
//! timestamps share the UTC basis of the run stamps and strace epochs.

use crate::decode::DecoderKind;
use crate::process::{Capture, ProcessSpec};

/// Sysstat tools print locale-dependent timestamps unless told otherwise.
const SYSSTAT_ENV: [(&str, &str); 2] = [("S_TIME_FORMAT", "ISO"), ("LC_ALL", "C")];

const UTC_CLOCK: (&str, &str) = ("TZ", "UTC");

const NVIDIA_QUERY_FIELDS: &str = "timestamp,index,pstate,accounting.buffer_size,\
memory.total,memory.free,memory.used,compute_mode,utilization.gpu,utilization.memory,\
encoder.stats.sessionCount,encoder.stats.averageFps,encoder.stats.averageLatency,\
clocks.gr,clocks.sm,clocks.mem,clocks.video";

/// One monitored source: its process stages and its decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    name: String,
    stages: Vec<ProcessSpec>,
    decoder: DecoderKind,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, stages: Vec<ProcessSpec>, decoder: DecoderKind) -> Self {
        SourceSpec {
            name: name.into(),
            stages,
            decoder,
        }
    }

    /// Single-stage source.
    pub fn single(spec: ProcessSpec, decoder: DecoderKind) -> Self {
        SourceSpec {
            name: spec.name().to_string(),
            stages: vec![spec],
            decoder,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[ProcessSpec] {
        &self.stages
    }

    pub fn decoder(&self) -> DecoderKind {
        self.decoder
    }
}

/// Which optional sources to enable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSelection {
    pub include_network: bool,
    pub trace_pid: Option<u32>,
    pub nvidia_gpu: bool,
}

/// The standard source set, in registration order.
pub fn standard(selection: &SourceSelection, max_samples: u64) -> Vec<SourceSpec> {
    let mut sources = Vec::new();
    if let Some(pid) = selection.trace_pid {
        sources.push(strace(pid));
    }
    if selection.include_network {
        sources.push(nethogs());
    }
    if selection.nvidia_gpu {
        sources.push(nvidia_smi());
        sources.push(nvidia_smi_dmon());
        sources.push(nvidia_smi_pmon());
    }
    sources.push(vmstat(max_samples));
    sources.push(mpstat(max_samples));
    sources.push(iostat(max_samples));
    sources
}

pub fn vmstat(max_samples: u64) -> SourceSpec {
    SourceSpec::single(
        utc_clock(ProcessSpec::new(
            "vmstat",
            ["vmstat", "-t", "-n", "1", max_samples.to_string().as_str()],
        )),
        DecoderKind::Vmstat,
    )
}

pub fn mpstat(max_samples: u64) -> SourceSpec {
    SourceSpec::single(
        sysstat(ProcessSpec::new(
            "mpstat",
            ["mpstat", "-P", "ALL", "1", max_samples.to_string().as_str()],
        )),
        DecoderKind::Mpstat,
    )
}

pub fn iostat(max_samples: u64) -> SourceSpec {
    SourceSpec::single(
        sysstat(ProcessSpec::new(
            "iostat",
            ["iostat", "-mxt", "-o", "JSON", "1", max_samples.to_string().as_str()],
        )),
        DecoderKind::Iostat,
    )
}

/// `nethogs` piped through `ts` for per-line timestamps.
pub fn nethogs() -> SourceSpec {
    SourceSpec::new(
        "nethogs",
        vec![
            ProcessSpec::new("nethogs-raw", ["nethogs", "-a", "-t", "-d", "1"])
                .with_capture(Capture::Pipe),
            utc_clock(ProcessSpec::new("nethogs", ["ts", "%Y-%m-%dT%H:%M:%.S"])),
        ],
        DecoderKind::Nethogs,
    )
}

/// Syscall trace of one process; strace writes its own output file.
pub fn strace(pid: u32) -> SourceSpec {
    SourceSpec::single(
        ProcessSpec::new(
            format!("strace-{}", pid),
            ["strace", "-tttTvxC", "-p", pid.to_string().as_str()],
        )
        .with_capture(Capture::OutputFlag("-o".to_string())),
        DecoderKind::Strace,
    )
}

pub fn nvidia_smi() -> SourceSpec {
    SourceSpec::single(
        utc_clock(ProcessSpec::new(
            "nvidia-smi",
            [
                "nvidia-smi",
                format!("--query-gpu={}", NVIDIA_QUERY_FIELDS).as_str(),
                "--format=csv,noheader,nounits",
                "-l",
                "1",
            ],
        )),
        DecoderKind::NvidiaSmiQuery,
    )
}

pub fn nvidia_smi_dmon() -> SourceSpec {
    SourceSpec::single(
        utc_clock(ProcessSpec::new(
            "nvidia-smi-dmon",
            ["nvidia-smi", "dmon", "-d", "1", "-o", "DT", "-s", "pucvmet"],
        )),
        DecoderKind::NvidiaSmiDmon,
    )
}

pub fn nvidia_smi_pmon() -> SourceSpec {
    SourceSpec::single(
        utc_clock(ProcessSpec::new(
            "nvidia-smi-pmon",
            ["nvidia-smi", "pmon", "-d", "1", "-o", "DT", "-s", "um"],
        )),
        DecoderKind::NvidiaSmiPmon,
    )
}

fn sysstat(spec: ProcessSpec) -> ProcessSpec {
    SYSSTAT_ENV
        .iter()
        .fold(utc_clock(spec), |spec, (key, value)| spec.with_env(*key, *value))
}

fn utc_clock(spec: ProcessSpec) -> ProcessSpec {
    spec.with_env(UTC_CLOCK.0, UTC_CLOCK.1)
}
