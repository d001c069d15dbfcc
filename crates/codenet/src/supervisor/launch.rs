//! Launch specifications and per-child log files.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

use super::record::ChildKind;

/// Variables forcing UTF-8 text I/O in Python-based children.
pub const UTF8_ENV: [(&str, &str); 2] = [("PYTHONIOENCODING", "utf-8"), ("PYTHONUTF8", "1")];

/// Everything needed to start one supervised child.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub kind: ChildKind,
    /// Log label, also used as the log file prefix.
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
    /// Added on top of the inherited environment and [`UTF8_ENV`].
    pub env: Vec<(OsString, OsString)>,
}

impl LaunchSpec {
    pub fn new(
        kind: ChildKind,
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub(super) fn command(&self, log: &File) -> io::Result<Command> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.working_dir)
            .envs(UTF8_ENV)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log.try_clone()?))
            // Children outlive a dropped handle; only stop_all ends them.
            .kill_on_drop(false);
        Ok(cmd)
    }

    pub(super) fn spawn_with_log(&self, log: &File) -> io::Result<Child> {
        self.command(log)?.spawn()
    }
}

/// Create a fresh `<name>_<YYYYMMDD_HHMMSS>.log` in `log_dir`.
///
/// Existing logs are never truncated: a same-second collision gets a numeric suffix.
pub fn create_log_file(log_dir: &Path, name: &str) -> io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(log_dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    let mut attempt = 0u32;
    loop {
        let file_name = if attempt == 0 {
            format!("{name}_{stamp}.log")
        } else {
            format!("{name}_{stamp}_{attempt}.log")
        };
        let path = log_dir.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < 1000 => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_name_has_label_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _file) = create_log_file(dir.path(), "network").unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        let stamp = name
            .strip_prefix("network_")
            .and_then(|s| s.strip_suffix(".log"))
            .unwrap();
        // YYYYMMDD_HHMMSS, possibly followed by a collision suffix.
        let (date, rest) = stamp.split_once('_').unwrap();
        assert_eq!(date.len(), 8);
        assert!(date.chars().all(|c| c.is_ascii_digit()));
        assert!(rest[..6].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn collisions_never_reuse_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|_| create_log_file(dir.path(), "agent_x").unwrap().0)
            .collect();

        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_ne!(paths[0], paths[2]);
    }

    #[test]
    fn missing_log_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("deep");
        let (path, _) = create_log_file(&nested, "script_a").unwrap();
        assert!(path.starts_with(&nested));
        assert!(path.is_file());
    }

    #[test]
    fn spec_builder_collects_args_and_env() {
        let spec = LaunchSpec::new(ChildKind::Agent, "agent_nav", "/bin/openagents", "/srv")
            .args(["agent", "start"])
            .arg("/srv/nav.yaml")
            .env("EXTRA", "1");

        assert_eq!(spec.args, vec!["agent", "start", "/srv/nav.yaml"]);
        assert_eq!(spec.env, vec![(OsString::from("EXTRA"), OsString::from("1"))]);
    }
}
