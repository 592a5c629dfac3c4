//! Command dispatcher — drains the inbound topic and runs remote commands.
//!
//! Inbound payloads are queued and processed strictly one at a time: each
//! event's remote exchanges finish before the next event starts, which
//! keeps at most one RCON request in flight without any extra machinery.
//! Malformed or irrelevant payloads are expected noise and are dropped
//! after a debug line, never escalated.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use rcb_types::event::{
    CommandDescriptor, CommandMessage, CommandOutcome, DeviceEnvelope, COMMAND_DEVICE,
};

use crate::bus::{EventBus, SubscriptionToken, TOPIC_INBOUND, TOPIC_OUTBOUND};
use crate::commands;
use crate::rcon::RemoteConsole;

/// Subscribe the dispatcher to the inbound topic and start its worker
/// task. The returned token detaches it again.
pub fn start(
    bus: &EventBus,
    console: Arc<dyn RemoteConsole>,
    reply_timeout: Duration,
) -> SubscriptionToken {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let token = bus.subscribe(
        TOPIC_INBOUND,
        Arc::new(move |payload: &str| {
            tx.send(payload.to_string())
                .map_err(|_| anyhow::anyhow!("dispatcher queue closed"))
        }),
    );

    let bus = bus.clone();
    tokio::spawn(async move {
        info!("command dispatcher started");
        while let Some(payload) = rx.recv().await {
            handle_event(&bus, console.as_ref(), reply_timeout, &payload).await;
        }
        info!("command dispatcher stopped");
    });

    token
}

/// Decode one inbound payload and, if it names a known command, run it and
/// publish the outcome — success or not, so observers always see a
/// terminal result for every recognized command.
async fn handle_event(
    bus: &EventBus,
    console: &dyn RemoteConsole,
    reply_timeout: Duration,
    payload: &str,
) {
    let Some(descriptor) = decode_command(payload) else {
        return;
    };

    let result = match descriptor.cmd.as_str() {
        commands::CMD_TOGGLE_REDSTONE_BLOCK => {
            commands::toggle_redstone_block(console, &descriptor.params, reply_timeout).await
        }
        other => {
            debug!(cmd = other, "unknown command");
            return;
        }
    };

    let outcome = CommandOutcome {
        cmd: descriptor.cmd,
        params: descriptor.params,
        result,
    };
    match serde_json::to_string(&outcome) {
        Ok(json) => bus.publish(TOPIC_OUTBOUND, &json),
        Err(e) => warn!("failed to encode command outcome: {e}"),
    }
}

/// Unwrap the two-level envelope: the payload must parse as a
/// [`DeviceEnvelope`] from the `message` device, and its `message` field
/// must parse again into a command descriptor.
fn decode_command(payload: &str) -> Option<CommandDescriptor> {
    let envelope: DeviceEnvelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("discarding non-envelope payload: {e}");
            return None;
        }
    };
    if envelope.device != COMMAND_DEVICE {
        debug!(device = %envelope.device, "ignoring envelope from other device");
        return None;
    }
    let message: CommandMessage = match serde_json::from_str(&envelope.message) {
        Ok(message) => message,
        Err(e) => {
            debug!("discarding unparsable command message: {e}");
            return None;
        }
    };
    message.function
}
