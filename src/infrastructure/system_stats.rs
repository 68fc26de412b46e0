//! Host and process statistics sampled through `sysinfo`

use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Pid, ProcessesToUpdate, RefreshKind, System};

/// One reading of host memory, CPU and own-process statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSample {
    pub total_memory: u64,
    pub free_memory: u64,
    pub available_memory: u64,
    pub used_memory: u64,
    pub total_swap: u64,
    pub used_swap: u64,
    /// Utilization per logical CPU, in percent
    pub cpu_utilization: Vec<f32>,
    pub process_resident_memory: u64,
    pub process_virtual_memory: u64,
    pub process_cpu_usage: f32,
}

pub struct SystemStats {
    system: System,
    pid: Option<Pid>,
}

impl SystemStats {
    pub fn new() -> Self {
        // CPU usage is computed between two refreshes; this is the first one.
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        Self {
            system,
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn sample(&mut self) -> HostSample {
        self.system.refresh_memory();
        self.system.refresh_cpu_usage();

        let mut sample = HostSample {
            total_memory: self.system.total_memory(),
            free_memory: self.system.free_memory(),
            available_memory: self.system.available_memory(),
            used_memory: self.system.used_memory(),
            total_swap: self.system.total_swap(),
            used_swap: self.system.used_swap(),
            cpu_utilization: self.system.cpus().iter().map(|cpu| cpu.cpu_usage()).collect(),
            ..Default::default()
        };

        if let Some(pid) = self.pid {
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            if let Some(process) = self.system.process(pid) {
                sample.process_resident_memory = process.memory();
                sample.process_virtual_memory = process.virtual_memory();
                sample.process_cpu_usage = process.cpu_usage();
            }
        }

        sample
    }
}

impl Default for SystemStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_reports_host_memory() {
        let mut stats = SystemStats::new();
        let sample = stats.sample();

        assert!(sample.total_memory > 0);
        assert!(!sample.cpu_utilization.is_empty());
        assert!(sample.process_resident_memory > 0);
    }
}
