use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub http: HttpConfig,
    pub rcon: RconConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret for the RCON handshake. The `RCON_PASSWORD`
    /// environment variable takes priority at load time.
    #[serde(default)]
    pub password: String,
    /// How long a command waits for its reply before resolving to the
    /// no-reply sentinel.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
}

fn default_reply_timeout_ms() -> u64 {
    2000
}

impl RconConfig {
    pub fn reply_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reply_timeout_ms)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            rcon: RconConfig {
                host: "127.0.0.1".to_string(),
                port: 25575,
                password: String::new(),
                reply_timeout_ms: default_reply_timeout_ms(),
            },
        }
    }
}
