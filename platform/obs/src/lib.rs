use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceCell<()> = OnceCell::new();

/// Configuration for tracing initialization.
#[derive(Clone, Debug)]
pub struct ObsConfig {
    pub service_name: &'static str,
    pub env_filter: Option<String>,
    /// Emit ANSI colours. Off when stderr is piped into another tool.
    pub ansi: bool,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            service_name: "deal-desk",
            env_filter: None,
            ansi: true,
        }
    }
}

impl ObsConfig {
    /// Quiet profile for the stdio tool loop: warnings only, no colour.
    pub fn for_tools() -> Self {
        Self {
            env_filter: Some("warn".to_string()),
            ansi: false,
            ..Self::default()
        }
    }
}

/// Install the tracing subscriber. Output goes to stderr so that stdout stays
/// free for tool responses.
pub fn init_tracing(config: ObsConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let filter = std::env::var("RUST_LOG")
        .ok()
        .or(config.env_filter)
        .unwrap_or_else(|| "info".to_string());

    let env_filter = EnvFilter::try_new(filter)?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    INIT.set(())
        .map_err(|_| anyhow!("tracing already initialized"))?;
    tracing::debug!(service = config.service_name, "tracing initialized");
    Ok(())
}
