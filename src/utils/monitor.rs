use std::time::{Duration, Instant};
use uuid::Uuid;

#[cfg(feature = "cli")]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

/// 稽核流程的階段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditPhase {
    ReportsLoaded,
    AnalysisFinished,
    Persisted,
}

impl AuditPhase {
    pub fn label(&self) -> &'static str {
        match self {
            AuditPhase::ReportsLoaded => "reports_loaded",
            AuditPhase::AnalysisFinished => "analysis_finished",
            AuditPhase::Persisted => "persisted",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessStats {
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
}

/// 行程資源取樣；多個稽核並行時共用同一個實例
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    peak_memory_mb: AtomicU64,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_processes(ProcessRefreshKind::everything()),
        );

        Self {
            system: Mutex::new(system),
            pid: sysinfo::get_current_pid().ok(),
            peak_memory_mb: AtomicU64::new(0),
            enabled,
        }
    }

    pub fn sample(&self) -> Option<ProcessStats> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;
        let peak = self.peak_memory_mb.fetch_max(memory_mb, Ordering::Relaxed).max(memory_mb);

        Some(ProcessStats {
            cpu_usage: process.cpu_usage(),
            memory_mb,
            peak_memory_mb: peak,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// 非 CLI 環境提供空實現
#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn sample(&self) -> Option<ProcessStats> {
        None
    }

    pub fn is_enabled(&self) -> bool {
        false
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl SystemMonitor {
    pub fn track(&self, audit_id: Uuid) -> PhaseTracker<'_> {
        let now = Instant::now();
        PhaseTracker {
            monitor: self,
            audit_id,
            started: now,
            last: now,
            phases: Vec::new(),
        }
    }
}

/// 單次稽核的階段計時
pub struct PhaseTracker<'a> {
    monitor: &'a SystemMonitor,
    audit_id: Uuid,
    started: Instant,
    last: Instant,
    phases: Vec<(AuditPhase, Duration)>,
}

impl PhaseTracker<'_> {
    pub fn phase(&mut self, phase: AuditPhase) {
        let now = Instant::now();
        let took = now.duration_since(self.last);
        self.last = now;
        self.phases.push((phase, took));

        if let Some(stats) = self.monitor.sample() {
            tracing::info!(
                audit_id = %self.audit_id,
                phase = phase.label(),
                took_ms = took.as_millis() as u64,
                cpu = stats.cpu_usage,
                memory_mb = stats.memory_mb,
                "📊 Audit phase finished"
            );
        }
    }

    pub fn phases(&self) -> &[(AuditPhase, Duration)] {
        &self.phases
    }

    pub fn finish(self) -> Duration {
        let total = self.started.elapsed();
        if let Some(stats) = self.monitor.sample() {
            let slowest = self
                .phases
                .iter()
                .max_by_key(|(_, took)| *took)
                .map(|(phase, _)| phase.label())
                .unwrap_or("none");
            tracing::info!(
                audit_id = %self.audit_id,
                total_ms = total.as_millis() as u64,
                peak_memory_mb = stats.peak_memory_mb,
                slowest_phase = slowest,
                "📊 Audit resource summary"
            );
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.sample().is_none());
    }

    #[test]
    fn test_tracker_records_phases_in_order() {
        let monitor = SystemMonitor::default();
        let mut tracker = monitor.track(Uuid::new_v4());
        tracker.phase(AuditPhase::ReportsLoaded);
        tracker.phase(AuditPhase::AnalysisFinished);

        let recorded: Vec<AuditPhase> = tracker.phases().iter().map(|(p, _)| *p).collect();
        assert_eq!(recorded, vec![AuditPhase::ReportsLoaded, AuditPhase::AnalysisFinished]);
        let total = tracker.finish();
        assert!(total >= Duration::ZERO);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_enabled_monitor_tracks_peak_memory() {
        let monitor = SystemMonitor::new(true);
        if let Some(first) = monitor.sample() {
            let second = monitor.sample().unwrap();
            assert!(second.peak_memory_mb >= first.memory_mb);
        }
    }
}
