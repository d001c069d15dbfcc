//! Hand-rolled argument parsing for the connector and launcher binaries.
//!
//! Parsers return `Err(message)` on bad input; an empty message means `--help`.
//! Callers print the usage block and exit with code 2.

use std::path::PathBuf;
use std::time::Duration;

use codenet::DEFAULT_AGENT_ID;
use codenet::dispatcher::DEFAULT_CHANNEL;
use codenet::supervisor::{DEFAULT_AGENT_CONFIG, DEFAULT_SCRIPT};

pub const CONNECTOR_USAGE: &str = "\
Usage: code-connector [options]

Options:
  --host <host>         Agent network host [default: localhost]
  --port <port>         Agent network port [default: 8700]
  --http-port <port>    Port for the local HTTP bridge [default: 8888]
  --agent-id <id>       Agent id used as sender and in /health [default: code-analyzer]
  --channel <name>      Destination channel [default: code-insights-stream]";

pub const LAUNCHER_USAGE: &str = "\
Usage: codenet-launcher <all|network|agent|script> [options]

Commands:
  all        Start the network, the agent and the helper script, in that order
  network    Start only the network
  agent      Start only the agent
  script     Start only the helper script

Options:
  --agents-dir <dir>     Directory with agent configs and scripts [default: .]
  --log-dir <dir>        Log directory [default: <agents-dir>/logs]
  --agent-config <file>  Agent YAML inside the agents dir [default: code-navigator.yaml]
  --script <file>        Helper script inside the agents dir [default: code-connector.py]
  --python <path>        Interpreter for the helper script [default: python3]
  --openagents <path>    Runtime executable [default: searched next to the interpreter]
  --grace-ms <ms>        Grace period before a child is killed [default: 3000]";

/// Print `message` and the usage block to stderr, then exit with code 2.
pub fn usage_exit(message: &str, usage: &str) -> ! {
    if !message.is_empty() {
        eprintln!("error: {message}");
        eprintln!();
    }
    eprintln!("{usage}");
    std::process::exit(2);
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn number<T: std::str::FromStr>(raw: &str, flag: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("{flag} expects a number, got '{raw}'"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorArgs {
    pub host: String,
    pub port: u16,
    pub http_port: u16,
    pub agent_id: String,
    pub channel: String,
}

impl Default for ConnectorArgs {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8700,
            http_port: 8888,
            agent_id: DEFAULT_AGENT_ID.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

/// Parse connector arguments. `args[0]` is the program name.
pub fn parse_connector_args(args: &[String]) -> Result<ConnectorArgs, String> {
    let mut parsed = ConnectorArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => parsed.host = value(args, &mut i, "--host")?.to_string(),
            "--port" => parsed.port = number(value(args, &mut i, "--port")?, "--port")?,
            "--http-port" => {
                parsed.http_port = number(value(args, &mut i, "--http-port")?, "--http-port")?
            }
            "--agent-id" => parsed.agent_id = value(args, &mut i, "--agent-id")?.to_string(),
            "--channel" => parsed.channel = value(args, &mut i, "--channel")?.to_string(),
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchCommand {
    All,
    Network,
    Agent,
    Script,
}

impl std::str::FromStr for LaunchCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "network" => Ok(Self::Network),
            "agent" => Ok(Self::Agent),
            "script" => Ok(Self::Script),
            other => Err(format!(
                "unknown command '{other}', expected all, network, agent or script"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherArgs {
    pub command: LaunchCommand,
    pub agents_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub agent_config: String,
    pub script: String,
    pub python: Option<PathBuf>,
    pub openagents: Option<PathBuf>,
    pub grace_period: Option<Duration>,
}

/// Parse launcher arguments. `args[0]` is the program name.
pub fn parse_launcher_args(args: &[String]) -> Result<LauncherArgs, String> {
    let mut command: Option<LaunchCommand> = None;
    let mut agents_dir = PathBuf::from(".");
    let mut log_dir = None;
    let mut agent_config = DEFAULT_AGENT_CONFIG.to_string();
    let mut script = DEFAULT_SCRIPT.to_string();
    let mut python = None;
    let mut openagents = None;
    let mut grace_period = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--agents-dir" => agents_dir = PathBuf::from(value(args, &mut i, "--agents-dir")?),
            "--log-dir" => log_dir = Some(PathBuf::from(value(args, &mut i, "--log-dir")?)),
            "--agent-config" => {
                agent_config = value(args, &mut i, "--agent-config")?.to_string()
            }
            "--script" => script = value(args, &mut i, "--script")?.to_string(),
            "--python" => python = Some(PathBuf::from(value(args, &mut i, "--python")?)),
            "--openagents" => {
                openagents = Some(PathBuf::from(value(args, &mut i, "--openagents")?))
            }
            "--grace-ms" => {
                let ms: u64 = number(value(args, &mut i, "--grace-ms")?, "--grace-ms")?;
                grace_period = Some(Duration::from_millis(ms));
            }
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => {
                if command.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                command = Some(arg.parse()?);
            }
        }
        i += 1;
    }

    Ok(LauncherArgs {
        command: command.ok_or("missing required argument: <command>")?,
        agents_dir,
        log_dir,
        agent_config,
        script,
        python,
        openagents,
        grace_period,
    })
}
