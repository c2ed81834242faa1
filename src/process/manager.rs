use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sysinfo::{Pid, System};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::types::{CommandOutput, ProcessConfig, ProcessInfo, ProcessStats, RestartAction};
use super::ProcessError;

/// How long a graceful stop waits before killing.
pub const GRACEFUL_STOP: Duration = Duration::from_secs(5);
pub const MAX_STATS: usize = 1000;

struct Managed {
    config: ProcessConfig,
    child: Child,
    pid: u32,
    started_at: DateTime<Utc>,
}

struct Inner {
    processes: Mutex<HashMap<String, Managed>>,
    stats: Mutex<HashMap<String, VecDeque<ProcessStats>>>,
    system: Mutex<System>,
    monitor: Mutex<Option<CancellationToken>>,
}

/// Supervises named child processes. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ProcessManager {
    inner: Arc<Inner>,
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessManager")
            .field("processes", &self.names())
            .finish()
    }
}

fn build_command(config: &ProcessConfig) -> Command {
    let niceness = config.priority.niceness();
    let mut cmd = if cfg!(unix) && niceness != 0 {
        let mut c = Command::new("nice");
        c.arg("-n").arg(niceness.to_string()).arg(&config.command);
        c
    } else {
        Command::new(&config.command)
    };
    cmd.args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

impl ProcessManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                processes: Mutex::new(HashMap::new()),
                stats: Mutex::new(HashMap::new()),
                system: Mutex::new(System::new()),
                monitor: Mutex::new(None),
            }),
        }
    }

    fn names(&self) -> Vec<String> {
        let processes = self.inner.processes.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = processes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.inner
            .processes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    pub fn pid(&self, name: &str) -> Option<u32> {
        self.inner
            .processes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|m| m.pid)
    }

    /// Spawn and register a process. Returns `Ok(false)` if one with the same
    /// name is already running.
    pub async fn start_process(&self, config: ProcessConfig) -> Result<bool, ProcessError> {
        if config.command.trim().is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        let timeout = match config.timeout.filter(|s| *s != 0.0) {
            Some(secs) => Some(Duration::try_from_secs_f64(secs).map_err(|_| ProcessError::InvalidTimeout(secs))?),
            None => None,
        };
        if self.is_running(&config.name) {
            warn!("Process {} is already running", config.name);
            return Ok(false);
        }

        let child = build_command(&config).spawn().map_err(|source| ProcessError::Spawn {
            command: config.command.clone(),
            source,
        })?;
        let pid = child.id().unwrap_or_default();
        let name = config.name.clone();

        self.inner.processes.lock().unwrap_or_else(|e| e.into_inner()).insert(
            name.clone(),
            Managed {
                config,
                child,
                pid,
                started_at: Utc::now(),
            },
        );
        info!("Started process {} (PID: {})", name, pid);

        if let Some(limit) = timeout {
            let manager = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                if manager.pid(&name) == Some(pid) {
                    warn!("Process {} exceeded its {:?} timeout", name, limit);
                    manager.stop_process(&name, false).await;
                }
            });
        }
        Ok(true)
    }

    /// Stop a process, gracefully unless `force`. Returns false for unknown names.
    pub async fn stop_process(&self, name: &str, force: bool) -> bool {
        let managed = self
            .inner
            .processes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        let Some(mut managed) = managed else {
            warn!("Process {} not found", name);
            return false;
        };

        if !force && cfg!(unix) && managed.pid != 0 {
            let signalled = Command::new("kill")
                .arg("-TERM")
                .arg(managed.pid.to_string())
                .status()
                .await
                .map(|s| s.success())
                .unwrap_or(false);
            if signalled {
                match tokio::time::timeout(GRACEFUL_STOP, managed.child.wait()).await {
                    Ok(_) => {
                        info!("Stopped process {}", name);
                        return true;
                    }
                    Err(_) => warn!("Process {} ignored SIGTERM, killing", name),
                }
            }
        }

        if let Err(e) = managed.child.kill().await {
            debug!("Kill of {} reported: {}", name, e);
        }
        info!("Stopped process {}", name);
        true
    }

    pub async fn restart_process(&self, name: &str) -> Result<bool, ProcessError> {
        let config = self
            .inner
            .processes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|m| m.config.clone())
            .ok_or_else(|| ProcessError::NotFound(name.to_string()))?;

        self.stop_process(name, false).await;
        self.start_process(config).await
    }

    /// Run a command to completion, capturing its output.
    pub async fn run_command(
        &self,
        command: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ProcessError> {
        self.run_command_with_env(command, args, &BTreeMap::new(), timeout).await
    }

    /// [`ProcessManager::run_command`] with extra environment variables.
    pub async fn run_command_with_env(
        &self,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ProcessError> {
        if command.trim().is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        let started = Instant::now();
        let mut cmd = Command::new(command);
        cmd.args(args).envs(env).stdin(Stdio::null()).kill_on_drop(true);

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| ProcessError::Timeout(limit))?,
            None => cmd.output().await,
        }
        .map_err(|source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// Most recent samples for `name`, oldest first.
    pub fn process_stats(&self, name: &str, limit: Option<usize>) -> Vec<ProcessStats> {
        let stats = self.inner.stats.lock().unwrap_or_else(|e| e.into_inner());
        let Some(history) = stats.get(name) else {
            return Vec::new();
        };
        let skip = limit.map_or(0, |n| history.len().saturating_sub(n));
        history.iter().skip(skip).cloned().collect()
    }

    pub fn all_processes(&self) -> BTreeMap<String, ProcessInfo> {
        let processes = self.inner.processes.lock().unwrap_or_else(|e| e.into_inner());
        let stats = self.inner.stats.lock().unwrap_or_else(|e| e.into_inner());
        processes
            .iter()
            .map(|(name, m)| {
                let latest = stats.get(name).and_then(|h| h.back());
                (
                    name.clone(),
                    ProcessInfo {
                        pid: m.pid,
                        started_at: m.started_at,
                        cpu_percent: latest.map(|s| s.cpu_percent),
                        memory_percent: latest.map(|s| s.memory_percent),
                    },
                )
            })
            .collect()
    }

    fn record_stats(&self, name: &str, sample: ProcessStats) {
        let mut stats = self.inner.stats.lock().unwrap_or_else(|e| e.into_inner());
        let history = stats.entry(name.to_string()).or_default();
        if history.len() >= MAX_STATS {
            history.pop_front();
        }
        history.push_back(sample);
    }

    fn sample(&self, pid: u32) -> Option<ProcessStats> {
        let mut system = self.inner.system.lock().unwrap_or_else(|e| e.into_inner());
        let pid = Pid::from_u32(pid);
        system.refresh_memory();
        if !system.refresh_process(pid) {
            return None;
        }
        let total = system.total_memory();
        let process = system.process(pid)?;
        let memory_percent = if total == 0 {
            0.0
        } else {
            process.memory() as f64 / total as f64 * 100.0
        };
        Some(ProcessStats {
            timestamp: Utc::now(),
            cpu_percent: process.cpu_usage() as f64,
            memory_percent,
            num_threads: process.tasks().map(|t| t.len()),
        })
    }

    /// Current usage of a managed process, or of host processes with this
    /// executable name (summed) when no managed process has that name.
    pub fn probe(&self, name: &str) -> Option<ProcessStats> {
        if let Some(pid) = self.pid(name) {
            return self.sample(pid);
        }
        let mut system = self.inner.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();
        system.refresh_processes();
        let total = system.total_memory();
        let mut found = false;
        let (mut cpu, mut memory, mut threads) = (0.0, 0u64, 0usize);
        for process in system.processes_by_name(name) {
            found = true;
            cpu += process.cpu_usage() as f64;
            memory += process.memory();
            threads += process.tasks().map_or(0, |t| t.len());
        }
        found.then(|| ProcessStats {
            timestamp: Utc::now(),
            cpu_percent: cpu,
            memory_percent: if total == 0 { 0.0 } else { memory as f64 / total as f64 * 100.0 },
            num_threads: (threads > 0).then_some(threads),
        })
    }

    /// One supervision pass: reap exits, sample survivors and enforce limits.
    pub async fn monitor_once(&self) {
        let mut restarts = Vec::new();
        let mut alive = Vec::new();
        {
            let mut processes = self.inner.processes.lock().unwrap_or_else(|e| e.into_inner());
            let mut exited = Vec::new();
            for (name, managed) in processes.iter_mut() {
                match managed.child.try_wait() {
                    Ok(Some(status)) => exited.push((name.clone(), status.code())),
                    Ok(None) => alive.push((name.clone(), managed.pid, managed.config.clone())),
                    Err(e) => error!("Error polling process {}: {}", name, e),
                }
            }
            for (name, code) in exited {
                warn!("Process {} exited with code {:?}", name, code);
                if let Some(m) = processes.remove(&name) {
                    if m.config.restart_policy.on_exit == RestartAction::Restart {
                        restarts.push(m.config);
                    }
                }
            }
        }

        for config in restarts {
            info!("Restarting process {}", config.name);
            let name = config.name.clone();
            if let Err(e) = self.start_process(config).await {
                error!("Failed to restart {}: {}", name, e);
            }
        }

        for (name, pid, config) in alive {
            let Some(stats) = self.sample(pid) else {
                continue;
            };
            let cpu = stats.cpu_percent;
            let memory = stats.memory_percent;
            self.record_stats(&name, stats);

            let policy = config.restart_policy;
            if let Some(limit) = config.cpu_limit.filter(|l| cpu > *l) {
                warn!("Process {} exceeded CPU limit: {:.1}% > {:.1}%", name, cpu, limit);
                self.apply(&name, policy.on_cpu).await;
                continue;
            }
            if let Some(limit) = config.memory_limit.filter(|l| memory > *l) {
                warn!("Process {} exceeded memory limit: {:.1}% > {:.1}%", name, memory, limit);
                self.apply(&name, policy.on_memory).await;
            }
        }
    }

    async fn apply(&self, name: &str, action: RestartAction) {
        match action {
            RestartAction::Restart => {
                if let Err(e) = self.restart_process(name).await {
                    error!("Failed to restart {}: {}", name, e);
                }
            }
            RestartAction::Stop => {
                self.stop_process(name, false).await;
            }
            RestartAction::Ignore => {}
        }
    }

    /// Run [`ProcessManager::monitor_once`] every `interval` until
    /// [`ProcessManager::stop_monitoring`]. Returns false if already running.
    pub fn start_monitoring(&self, interval: Duration) -> bool {
        let token = {
            let mut monitor = self.inner.monitor.lock().unwrap_or_else(|e| e.into_inner());
            if monitor.is_some() {
                return false;
            }
            let token = CancellationToken::new();
            *monitor = Some(token.clone());
            token
        };

        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => manager.monitor_once().await,
                }
            }
            debug!("Process monitoring stopped");
        });
        info!("Process monitoring started");
        true
    }

    pub fn stop_monitoring(&self) {
        if let Some(token) = self.inner.monitor.lock().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
        }
    }

    pub async fn export_stats(&self, path: impl AsRef<Path>) -> Result<(), ProcessError> {
        let snapshot: BTreeMap<String, Vec<ProcessStats>> = {
            let stats = self.inner.stats.lock().unwrap_or_else(|e| e.into_inner());
            stats
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
                .collect()
        };
        let body = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path.as_ref(), body).await?;
        info!("Exported process stats to {}", path.as_ref().display());
        Ok(())
    }

    /// Replace the stats history with the contents of `path`. Returns the
    /// number of processes loaded.
    pub async fn import_stats(&self, path: impl AsRef<Path>) -> Result<usize, ProcessError> {
        let body = tokio::fs::read(path.as_ref()).await?;
        let snapshot: BTreeMap<String, Vec<ProcessStats>> = serde_json::from_slice(&body)?;
        let count = snapshot.len();
        let mut stats = self.inner.stats.lock().unwrap_or_else(|e| e.into_inner());
        *stats = snapshot
            .into_iter()
            .map(|(k, mut v)| {
                let skip = v.len().saturating_sub(MAX_STATS);
                v.drain(..skip);
                (k, v.into_iter().collect())
            })
            .collect();
        info!("Imported process stats from {}", path.as_ref().display());
        Ok(count)
    }

    pub async fn cleanup(&self) {
        self.stop_monitoring();
        for name in self.names() {
            self.stop_process(&name, false).await;
        }
        info!("Process manager cleaned up");
    }
}
