//! linechat-server: a line-oriented chat server
//!
//! Clients name themselves with their first line and then talk with:
//! - /members_count and /members_list
//! - /message <nickname> <text> and /message_all <text>
//! - /close

mod shutdown;

use anyhow::Result;
use linechat::{Config, Server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "linechat.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let mut config = Config::load_or_default(&path)?;
    config.apply_env()?;

    init_tracing(&config.log_filter);

    let server = Server::bind(config).inspect_err(|e| error!(error = %e, "failed to start"))?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "fatal error in event loop");
                return Err(e.into());
            }
        }
        signal = shutdown::wait_for_signal() => {
            let signal = signal?;
            info!(%signal, "chat server was terminated");
        }
    }

    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
