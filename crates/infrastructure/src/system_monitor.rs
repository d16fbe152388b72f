use chrono::Utc;
use std::sync::Mutex;
use sysinfo::{Disks, Pid, System};
use tracing::debug;

use taskmill_domain::entities::{HostMetricSample, ProcessMetricSample};
use taskmill_domain::ports::MetricsSource;

/// 基于 sysinfo 的系统指标采集器
///
/// 对外无状态：内部的 `System` 只是 sysinfo 要求的采样缓存，
/// 用互斥锁保护后可被多个 worker 并发调用。
pub struct SystemMonitor {
    system: Mutex<System>,
}

impl SystemMonitor {
    pub fn new() -> Self {
        let mut system = System::new_all();
        // CPU 占用率依赖两次刷新之间的差值，先做一次基线刷新
        system.refresh_cpu();
        Self {
            system: Mutex::new(system),
        }
    }

    /// 根分区磁盘占用百分比；读不到时返回 0
    fn disk_usage_pct() -> f64 {
        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| disks.iter().next());

        match root {
            Some(disk) if disk.total_space() > 0 => {
                let used = disk.total_space() - disk.available_space();
                used as f64 / disk.total_space() as f64 * 100.0
            }
            _ => 0.0,
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SystemMonitor {
    fn sample_host(&self) -> HostMetricSample {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_cpu();
        system.refresh_memory();

        let cpu_pct = system.global_cpu_info().cpu_usage() as f64;
        let ram_pct = if system.total_memory() > 0 {
            system.used_memory() as f64 / system.total_memory() as f64 * 100.0
        } else {
            0.0
        };

        HostMetricSample {
            cpu_pct,
            ram_pct,
            disk_pct: Self::disk_usage_pct(),
            load1: System::load_average().one,
            gpu_pct: 0.0,
            recorded_at: Utc::now(),
        }
    }

    fn sample_process(&self, pid: u32) -> ProcessMetricSample {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let pid = Pid::from_u32(pid);
        if !system.refresh_process(pid) {
            debug!("进程已退出，返回零值样本: pid={}", pid);
            return ProcessMetricSample {
                cpu_pct: 0.0,
                ram_pct: 0.0,
                disk_pct: 0.0,
                recorded_at: Utc::now(),
            };
        }

        let (cpu_pct, ram_pct) = match system.process(pid) {
            Some(process) => {
                let ram = if system.total_memory() > 0 {
                    process.memory() as f64 / system.total_memory() as f64 * 100.0
                } else {
                    0.0
                };
                (process.cpu_usage() as f64, ram)
            }
            None => (0.0, 0.0),
        };

        ProcessMetricSample {
            cpu_pct,
            ram_pct,
            disk_pct: 0.0,
            recorded_at: Utc::now(),
        }
    }
}
