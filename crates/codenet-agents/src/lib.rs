//! codenet-agents: connector and launcher entry points for codenet.

pub mod cli;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn base_level(value: Option<&str>) -> &'static str {
    match value {
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

fn filter_directives(level: &str) -> String {
    format!(
        "codenet={level},codenet_agents={level},code_connector={level},codenet_launcher={level}",
        level = level
    )
}

/// Initialize tracing with CODENET_LOG and LOG_FORMAT support.
///
/// Logs always go to stderr; stdout is reserved for the launcher's status report.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = base_level(std::env::var("CODENET_LOG").ok().as_deref());
        EnvFilter::new(filter_directives(level))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels() {
        assert_eq!(base_level(None), "info");
        assert_eq!(base_level(Some("debug")), "debug");
        assert_eq!(base_level(Some("warning")), "warn");
        assert_eq!(base_level(Some("error")), "error");
        assert_eq!(base_level(Some("loud")), "info");
    }

    #[test]
    fn directives_cover_every_target() {
        let directives = filter_directives("warn");
        assert_eq!(
            directives,
            "codenet=warn,codenet_agents=warn,code_connector=warn,codenet_launcher=warn"
        );
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn init_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }
}
