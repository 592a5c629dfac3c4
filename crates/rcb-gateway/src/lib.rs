//! rconbridge gateway — event bus, RCON client, command dispatcher, and
//! the HTTP ingress/egress surface, wired together by [`Bridge`].

pub mod bus;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod rcon;

#[cfg(test)]
pub(crate) mod testing;

pub use bus::EventBus;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::error;

use rcb_types::config::BridgeConfig;

use rcon::{RconClient, RemoteConsole};

/// Command announced on the remote console after authentication.
const CONNECT_ANNOUNCEMENT: &str = "say RCON bridge connected";

/// The assembled bridge — owns the bus and the RCON client.
pub struct Bridge {
    config: BridgeConfig,
    bus: EventBus,
    rcon: Arc<RconClient>,
}

impl Bridge {
    /// Wire up the components. Does not open any connection.
    pub fn new(config: BridgeConfig) -> Self {
        let rcon = Arc::new(RconClient::new(config.rcon.clone()));
        Self {
            config,
            bus: EventBus::new(),
            rcon,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Connect to the RCON server, start the dispatcher, and serve HTTP
    /// until shutdown. A failed RCON connect is logged and the bridge
    /// keeps serving — commands resolve to the no-op result until an
    /// operator restarts it with a reachable server.
    pub async fn run(&self) -> Result<()> {
        match self.rcon.connect().await {
            Ok(()) => self.rcon.notify(CONNECT_ANNOUNCEMENT).await,
            Err(e) => error!("rcon connect failed: {e}"),
        }

        let console: Arc<dyn RemoteConsole> = self.rcon.clone();
        dispatch::start(&self.bus, console, self.config.rcon.reply_timeout());

        let state = Arc::new(http::AppState {
            bus: self.bus.clone(),
            rcon: Arc::clone(&self.rcon),
            started_at: Utc::now(),
        });
        let result = http::serve(state, &self.config.http.host, self.config.http.port).await;

        self.rcon.disconnect().await;
        result
    }
}
