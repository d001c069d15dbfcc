//! Launcher: starts the agent network processes and keeps them until a signal arrives.
//!
//! The launch result is printed once on stdout between `<<<START_INFO>>>` and
//! `<<<END_INFO>>>` for the controlling application. Logs go to stderr.

use std::io::Write;
use std::process::ExitCode;

use tracing::{error, info};

use codenet::status;
use codenet::{
    ChildProcessRecord, LaunchError, LifecycleController, ProcessSupervisor, ShutdownSignals,
    SupervisorConfig,
};
use codenet_agents::cli::{
    LAUNCHER_USAGE, LaunchCommand, LauncherArgs, parse_launcher_args, usage_exit,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_launcher_args(&argv) {
        Ok(args) => args,
        Err(msg) => usage_exit(&msg, LAUNCHER_USAGE),
    };

    codenet_agents::init_tracing();

    // Before any child exists, so an early SIGTERM still goes through stop_all.
    let mut signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            let msg = format!("failed to install signal handlers: {e}");
            error!(error = %msg, "Launch failed");
            emit(&status::render_error(&msg));
            return ExitCode::from(1);
        }
    };

    let mut supervisor = ProcessSupervisor::new(supervisor_config(&args));

    let report = match launch(&mut supervisor, &args) {
        Ok(records) => status::render_records(&records).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match report {
        Ok(report) => emit(&report),
        Err(msg) => {
            // Children started before the failure are left running.
            error!(error = %msg, running = supervisor.len(), "Launch failed");
            emit(&status::render_error(&msg));
            return ExitCode::from(1);
        }
    }

    info!("All processes started, supervising");
    let controller = LifecycleController::new(supervisor);
    let (signal, stopped) = controller.run_until_signal(&mut signals).await;
    info!(%signal, stopped = stopped.len(), "Launcher exiting");

    ExitCode::SUCCESS
}

fn supervisor_config(args: &LauncherArgs) -> SupervisorConfig {
    let agents_dir = args
        .agents_dir
        .canonicalize()
        .unwrap_or_else(|_| args.agents_dir.clone());

    let mut config = SupervisorConfig::new(agents_dir);
    if let Some(log_dir) = &args.log_dir {
        config = config.with_log_dir(log_dir);
    }
    if let Some(python) = &args.python {
        config = config.with_python(python);
    }
    if let Some(openagents) = &args.openagents {
        config = config.with_openagents(openagents);
    }
    if let Some(grace) = args.grace_period {
        config = config.with_grace_period(grace);
    }
    config
}

fn launch(
    supervisor: &mut ProcessSupervisor,
    args: &LauncherArgs,
) -> Result<Vec<ChildProcessRecord>, LaunchError> {
    let config = supervisor.config();
    info!(
        agents_dir = %config.agents_dir.display(),
        network_dir = %config.network_dir().display(),
        log_dir = %config.log_dir.display(),
        "Launcher paths"
    );
    if args.command != LaunchCommand::Script {
        let runtime = supervisor.resolve_runtime()?;
        info!(runtime = %runtime.display(), "Using agent runtime");
    }

    let mut records = Vec::new();
    if matches!(args.command, LaunchCommand::All | LaunchCommand::Network) {
        records.push(supervisor.start_network()?);
    }
    if matches!(args.command, LaunchCommand::All | LaunchCommand::Agent) {
        records.push(supervisor.start_agent(&args.agent_config)?);
    }
    if matches!(args.command, LaunchCommand::All | LaunchCommand::Script) {
        records.push(supervisor.start_script(&args.script)?);
    }
    Ok(records)
}

fn emit(report: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(report.as_bytes());
    let _ = stdout.flush();
}
