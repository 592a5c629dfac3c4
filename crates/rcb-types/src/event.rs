use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Device value that marks an envelope as carrying a command message.
pub const COMMAND_DEVICE: &str = "message";

/// Outer webhook envelope: a device identifier plus a JSON-encoded payload.
///
/// The `message` field is itself JSON text and needs a second parse before
/// the command descriptor becomes visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEnvelope {
    pub device: String,
    pub message: String,
}

/// Decoded inner payload of a command envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandMessage {
    #[serde(default)]
    pub function: Option<CommandDescriptor>,
}

/// A named command with its parameter object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub cmd: String,
    #[serde(default)]
    pub params: Value,
}

/// A block position in a named world.
///
/// All four fields are mandatory; deserialization failure is how parameter
/// validation fails, so no remote command is ever built from a partial or
/// mistyped coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub world: String,
}

/// Terminal result of a toggle operation as observers see it.
///
/// Failure is a value, not an error: every failure path collapses to
/// [`ToggleResult::NoOp`], which serializes as the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleResult {
    #[serde(rename = "on")]
    On,
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "")]
    NoOp,
}

impl std::fmt::Display for ToggleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
            Self::NoOp => write!(f, ""),
        }
    }
}

impl std::str::FromStr for ToggleResult {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "" => Ok(Self::NoOp),
            _ => Err(anyhow::anyhow!("unknown toggle result: {}", s)),
        }
    }
}

/// Outcome record published to the outbound topic for every recognized
/// command, success or not, so observers can correlate cause and effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub cmd: String,
    pub params: Value,
    pub result: ToggleResult,
}
