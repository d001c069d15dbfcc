//! codenet: local control plane for a code-learning agent network.
//!
//! Two independent halves:
//! - the request bridge (`transport::http`) accepts analysis requests on its own
//!   thread and hands them to the [`Dispatcher`], which relays them to a channel
//!   on the agent network;
//! - the [`ProcessSupervisor`] launches the network, agents and helper scripts,
//!   and the [`LifecycleController`] stops them all on shutdown.

mod health;
mod version;

pub mod dispatcher;
pub mod handoff;
pub mod lifecycle;
pub mod request;
pub mod resolver;
pub mod sink;
pub mod status;
pub mod supervisor;
pub mod transport;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use handoff::{SubmitError, Submitter};
pub use health::{DEFAULT_AGENT_ID, HealthResponse, HealthStatus};
pub use lifecycle::{LifecycleController, ShutdownSignal, ShutdownSignals};
pub use request::{AnalysisRequest, DecodeError};
pub use resolver::{ExecutableResolver, ResolveError};
pub use sink::{MessagingSink, NetworkSink, NetworkSinkConfig, SinkError};
pub use supervisor::{
    ChildKind, ChildProcessRecord, ChildStatus, LaunchError, LaunchSpec, ProcessSupervisor,
    SupervisorConfig,
};
pub use transport::{BridgeConfig, BridgeHandle, start_bridge};
pub use version::CODENET_VERSION;
