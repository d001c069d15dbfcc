//! Code connector: local HTTP bridge relaying analysis requests to the agent network.
//!
//! The dispatcher runs on this binary's single-threaded runtime; the HTTP
//! listener runs on its own thread and hands requests over through
//! `codenet::handoff`.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use codenet::handoff::{self, submit_timeout_from_env};
use codenet::{
    BridgeConfig, CODENET_VERSION, Dispatcher, DispatcherConfig, NetworkSink, NetworkSinkConfig,
    ShutdownSignals, start_bridge,
};
use codenet_agents::cli::{CONNECTOR_USAGE, parse_connector_args, usage_exit};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_connector_args(&argv) {
        Ok(args) => args,
        Err(msg) => usage_exit(&msg, CONNECTOR_USAGE),
    };

    codenet_agents::init_tracing();
    info!(version = CODENET_VERSION, "Starting code connector");
    let mut signals = ShutdownSignals::install()?;

    let sink = NetworkSink::new(
        NetworkSinkConfig::default()
            .with_host(&args.host)
            .with_port(args.port)
            .with_agent_id(&args.agent_id),
    )?;
    if sink.probe().await {
        info!(url = sink.base_url(), "Connected to agent network");
    } else {
        warn!(
            url = sink.base_url(),
            "Agent network not reachable, requests are dropped until it is"
        );
    }

    let (submitter, rx) = handoff::channel(Handle::current(), submit_timeout_from_env());
    let cancel = CancellationToken::new();
    let dispatcher = Dispatcher::new(
        DispatcherConfig::default().with_channel(&args.channel),
        rx,
        Arc::new(sink),
        cancel.clone(),
    );
    let dispatcher_task = tokio::spawn(dispatcher.run());

    let bridge = start_bridge(
        BridgeConfig::default()
            .with_port(args.http_port)
            .with_agent_id(&args.agent_id),
        submitter,
    )?;

    let signal = signals.recv().await;
    info!(%signal, "Shutting down code connector");

    // In-flight requests still need this runtime to confirm their enqueue.
    tokio::task::spawn_blocking(move || bridge.shutdown()).await??;
    cancel.cancel();
    dispatcher_task.await?;

    info!("Code connector stopped");
    Ok(())
}
