//! throttle-proxy daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────┐
//!                     │                 THROTTLE PROXY                 │
//!                     │                                               │
//!   Client            │  ┌──────────┐   ┌──────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│   net    │──▶│   http   │──▶│   relay   │──┼──▶ Origin /
//!                     │  │ listener │   │  parser  │   │http|tunnel│  │    CONNECT target
//!                     │  └──────────┘   └──────────┘   └─────┬─────┘  │
//!                     │                                      │ pace   │
//!                     │                                ┌─────▼─────┐  │
//!   Admin API / CLI ──┼──▶ control::ProxyService ────▶ │  throttle │  │
//!                     │                                │  profile  │  │
//!                     │                                └───────────┘  │
//!                     │  config · observability · lifecycle           │
//!                     └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use throttle_proxy::config::{load_config, ProxyConfig};
use throttle_proxy::lifecycle;
use throttle_proxy::observability::logging::init_logging;
use throttle_proxy::ProfileName;

#[derive(Parser)]
#[command(name = "throttle-proxy", version)]
#[command(
    about = "Local HTTP/HTTPS proxy that emulates slow or offline networks",
    long_about = None
)]
struct Args {
    /// TOML config file; watched for changes while running
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preferred listening port (fallback ports still apply)
    #[arg(short, long)]
    port: Option<u16>,

    /// Initial throttle profile, e.g. `slow_3g`
    #[arg(long)]
    profile: Option<ProfileName>,

    /// Interface to bind
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = args.port {
        config.listener.preferred_port = port;
    }
    if let Some(profile) = args.profile {
        config.throttle.profile = profile;
    }
    if let Some(bind) = args.bind {
        config.listener.bind_host = bind;
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "throttle-proxy starting");
    tracing::info!(
        bind_host = %config.listener.bind_host,
        preferred_port = config.listener.preferred_port,
        fallback_ports = ?config.listener.fallback_ports,
        profile = %config.throttle.profile,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    lifecycle::run(config, args.config).await?;
    Ok(())
}
