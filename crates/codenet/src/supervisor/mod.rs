//! Child process supervision for the agent network.
//!
//! The supervisor launches the network service, agents and helper scripts,
//! sends each child's output to its own timestamped log file, and stops every
//! child it started with a bounded grace period. Records are kept in launch order.

mod launch;
mod record;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Child;

use crate::resolver::{ExecutableResolver, ResolveError};

pub use launch::{LaunchSpec, UTF8_ENV, create_log_file};
pub use record::{ChildKind, ChildProcessRecord, ChildStatus};

/// Default time a child gets to exit after the graceful terminate signal.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

pub const DEFAULT_AGENT_CONFIG: &str = "code-navigator.yaml";
pub const DEFAULT_SCRIPT: &str = "code-connector.py";

/// Read the grace period from `CODENET_GRACE_PERIOD_MS`, falling back to the default.
pub fn grace_period_from_env() -> Duration {
    std::env::var("CODENET_GRACE_PERIOD_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_GRACE_PERIOD)
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("network directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("agent configuration does not exist: {}", .0.display())]
    MissingConfig(PathBuf),
    #[error("script does not exist: {}", .0.display())]
    MissingScript(PathBuf),
    #[error(transparent)]
    ExecutableNotFound(#[from] ResolveError),
    #[error("failed to create log file in {}: {source}", .dir.display())]
    LogFile {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} exited before its pid could be recorded")]
    MissingPid(String),
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Directory holding agent configurations and helper scripts.
    pub agents_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Interpreter used for helper scripts.
    pub python: PathBuf,
    /// Explicit runtime executable; searched relative to `python` when unset.
    pub openagents: Option<PathBuf>,
    pub grace_period: Duration,
}

impl SupervisorConfig {
    pub fn new(agents_dir: impl Into<PathBuf>) -> Self {
        let agents_dir = agents_dir.into();
        Self {
            log_dir: agents_dir.join("logs"),
            agents_dir,
            python: PathBuf::from("python3"),
            openagents: None,
            grace_period: grace_period_from_env(),
        }
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_openagents(mut self, path: impl Into<PathBuf>) -> Self {
        self.openagents = Some(path.into());
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// The network lives one level above the agents directory.
    ///
    /// A single-component relative agents dir has `.` as its parent; the
    /// filesystem root is its own parent.
    pub fn network_dir(&self) -> PathBuf {
        match self.agents_dir.parent() {
            Some(p) if p.as_os_str().is_empty() => PathBuf::from("."),
            Some(p) => p.to_path_buf(),
            None => self.agents_dir.clone(),
        }
    }

    pub fn resolver(&self) -> ExecutableResolver {
        match &self.openagents {
            Some(path) => ExecutableResolver::explicit(path),
            None => ExecutableResolver::for_python(&self.python),
        }
    }
}

struct SupervisedChild {
    record: ChildProcessRecord,
    child: Child,
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    children: Vec<SupervisedChild>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            children: Vec::new(),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn resolve_runtime(&self) -> Result<PathBuf, ResolveError> {
        self.config.resolver().resolve()
    }

    pub fn network_spec(&self) -> Result<LaunchSpec, LaunchError> {
        let network_dir = self.config.network_dir();
        if !network_dir.is_dir() {
            return Err(LaunchError::MissingDirectory(network_dir));
        }
        let runtime = self.resolve_runtime()?;
        Ok(
            LaunchSpec::new(ChildKind::Network, "network", runtime, &network_dir)
                .args(["network", "start"])
                .arg(network_dir),
        )
    }

    pub fn agent_spec(&self, yaml_name: &str) -> Result<LaunchSpec, LaunchError> {
        let yaml = self.config.agents_dir.join(yaml_name);
        if !yaml.is_file() {
            return Err(LaunchError::MissingConfig(yaml));
        }
        let runtime = self.resolve_runtime()?;
        Ok(LaunchSpec::new(
            ChildKind::Agent,
            format!("agent_{}", file_stem(&yaml)),
            runtime,
            &self.config.agents_dir,
        )
        .args(["agent", "start"])
        .arg(yaml))
    }

    pub fn script_spec(&self, script_name: &str) -> Result<LaunchSpec, LaunchError> {
        let script = self.config.agents_dir.join(script_name);
        if !script.is_file() {
            return Err(LaunchError::MissingScript(script));
        }
        Ok(LaunchSpec::new(
            ChildKind::Script,
            format!("script_{}", file_stem(&script)),
            &self.config.python,
            &self.config.agents_dir,
        )
        .arg(script))
    }

    pub fn start_network(&mut self) -> Result<ChildProcessRecord, LaunchError> {
        let spec = self.network_spec()?;
        self.spawn(spec)
    }

    pub fn start_agent(&mut self, yaml_name: &str) -> Result<ChildProcessRecord, LaunchError> {
        let spec = self.agent_spec(yaml_name)?;
        self.spawn(spec)
    }

    pub fn start_script(&mut self, script_name: &str) -> Result<ChildProcessRecord, LaunchError> {
        let spec = self.script_spec(script_name)?;
        self.spawn(spec)
    }

    /// Start `spec` with output redirected to a fresh log file and register it.
    ///
    /// Must be called from within a tokio runtime. Nothing is registered on error.
    pub fn spawn(&mut self, spec: LaunchSpec) -> Result<ChildProcessRecord, LaunchError> {
        let (log_path, log_file) =
            create_log_file(&self.config.log_dir, &spec.name).map_err(|source| {
                LaunchError::LogFile {
                    dir: self.config.log_dir.clone(),
                    source,
                }
            })?;

        let child = spec
            .spawn_with_log(&log_file)
            .map_err(|source| LaunchError::Spawn {
                name: spec.name.clone(),
                source,
            })?;
        let pid = child
            .id()
            .ok_or_else(|| LaunchError::MissingPid(spec.name.clone()))?;

        let record = ChildProcessRecord {
            kind: spec.kind,
            name: spec.name,
            pid,
            log_path,
            working_dir: spec.working_dir,
            status: ChildStatus::Running,
        };
        tracing::info!(
            kind = %record.kind,
            name = %record.name,
            pid,
            log = %record.log_path.display(),
            cwd = %record.working_dir.display(),
            "Child launched"
        );

        self.children.push(SupervisedChild {
            record: record.clone(),
            child,
        });
        Ok(record)
    }

    /// Public fields of every tracked child, in launch order.
    pub fn status_snapshot(&self) -> Vec<ChildProcessRecord> {
        self.children.iter().map(|c| c.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Stop every child in launch order, then clear the registry.
    ///
    /// Each child gets the graceful terminate signal and up to the grace
    /// period to exit before it is killed. A failure stopping one child is
    /// recorded as [`ChildStatus::Failed`] and never affects the others.
    pub async fn stop_all(&mut self) -> Vec<ChildProcessRecord> {
        let grace = self.config.grace_period;
        let mut stopped = Vec::with_capacity(self.children.len());

        for SupervisedChild { mut record, mut child } in self.children.drain(..) {
            record.status = match stop_child(&mut child, grace).await {
                Ok(()) => {
                    tracing::info!(name = %record.name, pid = record.pid, "Child stopped");
                    ChildStatus::Stopped
                }
                Err(e) => {
                    tracing::warn!(
                        name = %record.name,
                        pid = record.pid,
                        error = %e,
                        "Failed to stop child"
                    );
                    ChildStatus::Failed
                }
            };
            stopped.push(record);
        }

        stopped
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn stop_child(child: &mut Child, grace: Duration) -> io::Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    terminate(child)?;
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status.map(|_| ()),
        Err(_) => {
            tracing::debug!(pid = ?child.id(), "Grace period elapsed, killing child");
            child.kill().await
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;

    /// Agents dir inside a network dir, with a fake runtime that just sleeps.
    struct Layout {
        _root: tempfile::TempDir,
        agents_dir: PathBuf,
        runtime: PathBuf,
    }

    fn layout(runtime_script: &str) -> Layout {
        let root = tempfile::tempdir().unwrap();
        let network_dir = root.path().canonicalize().unwrap();
        let agents_dir = network_dir.join("agents");
        std::fs::create_dir(&agents_dir).unwrap();

        let runtime = network_dir.join("openagents");
        std::fs::write(&runtime, runtime_script).unwrap();
        std::fs::set_permissions(&runtime, std::fs::Permissions::from_mode(0o755)).unwrap();

        Layout {
            _root: root,
            agents_dir,
            runtime,
        }
    }

    fn supervisor(layout: &Layout) -> ProcessSupervisor {
        ProcessSupervisor::new(
            SupervisorConfig::new(&layout.agents_dir)
                .with_openagents(&layout.runtime)
                .with_python("/bin/sh")
                .with_grace_period(Duration::from_millis(500)),
        )
    }

    async fn wait_for_log(path: &Path, needle: &str) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let text = std::fs::read_to_string(path).unwrap_or_default();
            if text.contains(needle) || Instant::now() > deadline {
                return text;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[test]
    fn config_defaults() {
        let config = SupervisorConfig::new("/srv/net/agents");
        assert_eq!(config.log_dir, PathBuf::from("/srv/net/agents/logs"));
        assert_eq!(config.network_dir(), PathBuf::from("/srv/net"));
        assert_eq!(config.python, PathBuf::from("python3"));
        assert!(config.openagents.is_none());
    }

    #[test]
    fn network_dir_of_relative_and_root_paths() {
        assert_eq!(
            SupervisorConfig::new("agents").network_dir(),
            PathBuf::from(".")
        );
        assert_eq!(
            SupervisorConfig::new("net/agents").network_dir(),
            PathBuf::from("net")
        );
        assert_eq!(SupervisorConfig::new("/agents").network_dir(), PathBuf::from("/"));
        assert_eq!(SupervisorConfig::new("/").network_dir(), PathBuf::from("/"));
    }

    #[test]
    fn launch_rules_per_kind() {
        let layout = layout("#!/bin/sh\nexec sleep 30\n");
        std::fs::write(layout.agents_dir.join("nav.yaml"), "name: nav\n").unwrap();
        std::fs::write(layout.agents_dir.join("helper.py"), "").unwrap();
        let sup = supervisor(&layout);
        let network_dir = layout.agents_dir.parent().unwrap().to_path_buf();

        let network = sup.network_spec().unwrap();
        assert_eq!(network.kind, ChildKind::Network);
        assert_eq!(network.name, "network");
        assert_eq!(network.program, layout.runtime);
        assert_eq!(network.working_dir, network_dir);
        assert_eq!(
            network.args,
            vec![
                OsString::from("network"),
                OsString::from("start"),
                network_dir.clone().into_os_string()
            ]
        );

        let agent = sup.agent_spec("nav.yaml").unwrap();
        assert_eq!(agent.name, "agent_nav");
        assert_eq!(agent.working_dir, layout.agents_dir);
        assert_eq!(
            agent.args.last().unwrap(),
            layout.agents_dir.join("nav.yaml").as_os_str()
        );

        let script = sup.script_spec("helper.py").unwrap();
        assert_eq!(script.name, "script_helper");
        assert_eq!(script.program, PathBuf::from("/bin/sh"));
        assert_eq!(script.working_dir, layout.agents_dir);
    }

    #[tokio::test]
    async fn missing_config_registers_nothing() {
        let layout = layout("#!/bin/sh\nexec sleep 30\n");
        let mut sup = supervisor(&layout);

        let err = sup.start_agent("absent.yaml").unwrap_err();
        assert!(matches!(err, LaunchError::MissingConfig(_)));
        let err = sup.start_script("absent.py").unwrap_err();
        assert!(matches!(err, LaunchError::MissingScript(_)));
        assert!(sup.is_empty());
    }

    #[tokio::test]
    async fn missing_network_dir_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let agents_dir = root.path().join("gone").join("agents");
        let mut sup = ProcessSupervisor::new(SupervisorConfig::new(agents_dir));

        let err = sup.start_network().unwrap_err();
        assert!(matches!(err, LaunchError::MissingDirectory(_)));
        assert!(sup.is_empty());
    }

    #[tokio::test]
    async fn missing_runtime_is_reported() {
        let layout = layout("");
        std::fs::write(layout.agents_dir.join("nav.yaml"), "").unwrap();
        let mut sup = ProcessSupervisor::new(
            SupervisorConfig::new(&layout.agents_dir).with_openagents("/nonexistent/openagents"),
        );

        let err = sup.start_agent("nav.yaml").unwrap_err();
        assert!(matches!(err, LaunchError::ExecutableNotFound(_)));
        assert!(err.to_string().contains("/nonexistent/openagents"));
        assert!(sup.is_empty());
    }

    #[tokio::test]
    async fn output_env_and_cwd_go_to_log() {
        let layout = layout("");
        let mut sup = supervisor(&layout);

        let spec = LaunchSpec::new(ChildKind::Script, "script_env", "/bin/sh", &layout.agents_dir)
            .arg("-c")
            .arg("echo out; echo err >&2; echo \"$PYTHONUTF8 $PYTHONIOENCODING $EXTRA\"; pwd; echo done")
            .env("EXTRA", "extra");
        let record = sup.spawn(spec).unwrap();
        assert_eq!(record.status, ChildStatus::Running);
        assert!(record.log_path.starts_with(layout.agents_dir.join("logs")));

        let log = wait_for_log(&record.log_path, "done").await;
        assert!(log.contains("out\n"));
        assert!(log.contains("err\n"));
        assert!(log.contains("1 utf-8 extra\n"));
        assert!(log.contains(&format!("{}\n", layout.agents_dir.display())));

        let stopped = sup.stop_all().await;
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].status, ChildStatus::Stopped);
    }

    #[tokio::test]
    async fn launch_all_then_stop_all() {
        let layout = layout("#!/bin/sh\nexec sleep 30\n");
        std::fs::write(layout.agents_dir.join(DEFAULT_AGENT_CONFIG), "").unwrap();
        std::fs::write(layout.agents_dir.join(DEFAULT_SCRIPT), "exec sleep 30\n").unwrap();
        let mut sup = supervisor(&layout);

        sup.start_network().unwrap();
        sup.start_agent(DEFAULT_AGENT_CONFIG).unwrap();
        sup.start_script(DEFAULT_SCRIPT).unwrap();

        let snapshot = sup.status_snapshot();
        let kinds: Vec<_> = snapshot.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, [ChildKind::Network, ChildKind::Agent, ChildKind::Script]);
        assert_eq!(snapshot[1].name, "agent_code-navigator");
        assert_eq!(snapshot[2].name, "script_code-connector");
        let mut pids: Vec<_> = snapshot.iter().map(|r| r.pid).collect();
        pids.sort_unstable();
        pids.dedup();
        assert_eq!(pids.len(), 3);
        assert!(snapshot.iter().all(|r| r.status == ChildStatus::Running));

        let stopped = sup.stop_all().await;
        assert_eq!(stopped.len(), 3);
        assert!(stopped.iter().all(|r| r.status == ChildStatus::Stopped));
        assert!(sup.is_empty());
        assert!(sup.status_snapshot().is_empty());
    }

    #[tokio::test]
    async fn stubborn_child_is_killed_without_blocking_others() {
        let layout = layout("");
        let mut sup = ProcessSupervisor::new(
            SupervisorConfig::new(&layout.agents_dir).with_grace_period(Duration::from_millis(200)),
        );

        let stubborn = LaunchSpec::new(ChildKind::Script, "stubborn", "/bin/sh", &layout.agents_dir)
            .args(["-c", "trap '' TERM; echo ready; exec sleep 30"]);
        let polite = LaunchSpec::new(ChildKind::Script, "polite", "/bin/sh", &layout.agents_dir)
            .args(["-c", "exec sleep 30"]);

        let stubborn_record = sup.spawn(stubborn).unwrap();
        sup.spawn(polite).unwrap();
        wait_for_log(&stubborn_record.log_path, "ready").await;

        let started = Instant::now();
        let stopped = sup.stop_all().await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(stopped.len(), 2);
        assert_eq!(stopped[0].name, "stubborn");
        assert_eq!(stopped[1].name, "polite");
        assert!(stopped.iter().all(|r| r.status == ChildStatus::Stopped));
        assert!(sup.is_empty());
    }

    #[tokio::test]
    async fn already_exited_child_counts_as_stopped() {
        let layout = layout("");
        let mut sup = supervisor(&layout);

        let record = sup
            .spawn(
                LaunchSpec::new(ChildKind::Script, "quick", "/bin/sh", &layout.agents_dir)
                    .args(["-c", "echo bye"]),
            )
            .unwrap();
        wait_for_log(&record.log_path, "bye").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stopped = sup.stop_all().await;
        assert_eq!(stopped[0].status, ChildStatus::Stopped);
    }

    #[tokio::test]
    async fn stop_all_on_empty_registry_is_a_noop() {
        let mut sup = ProcessSupervisor::new(SupervisorConfig::new("/tmp/agents"));
        assert!(sup.stop_all().await.is_empty());
    }
}
