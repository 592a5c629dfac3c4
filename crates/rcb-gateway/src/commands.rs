//! Remote command implementations.
//!
//! One operation so far: toggling a block between the redstone and iron
//! materials. The read-then-write sequence is not protected against a
//! concurrent external edit of the same coordinate between the two steps;
//! the server's own command serialization is the only safety net, which is
//! acceptable for a single administrative client.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use rcb_types::event::{BlockPos, ToggleResult};

use crate::rcon::RemoteConsole;

/// Command name recognized by the dispatcher.
pub const CMD_TOGGLE_REDSTONE_BLOCK: &str = "toggleRedstoneBlock";

/// Material written when toggling a block on.
pub const BLOCK_ON: &str = "minecraft:redstone_block";

/// Material written when toggling a block off.
pub const BLOCK_OFF: &str = "minecraft:iron_block";

/// Swap the block at the given coordinate between the two known materials.
///
/// Reads the block identifier, then writes the opposite material if the
/// identifier matches one of the two constants exactly. Identifiers are
/// compared verbatim, so a decorated id such as
/// `minecraft:redstone_lamp[lit=true]` matches neither and is a no-op.
/// Every failure path — bad parameters, no reply, a busy console, an
/// unconfirmed write — resolves to [`ToggleResult::NoOp`].
pub async fn toggle_redstone_block(
    console: &dyn RemoteConsole,
    params: &Value,
    timeout: Duration,
) -> ToggleResult {
    let pos: BlockPos = match serde_json::from_value(params.clone()) {
        Ok(pos) => pos,
        Err(e) => {
            debug!("toggle params rejected: {e}");
            return ToggleResult::NoOp;
        }
    };

    let read = format!("ugetblock {} {} {} {}", pos.x, pos.y, pos.z, pos.world);
    let block = match console.exec(&read, timeout).await {
        Ok(Some(block)) => block,
        Ok(None) => return ToggleResult::NoOp,
        Err(e) => {
            debug!("block read failed: {e}");
            return ToggleResult::NoOp;
        }
    };

    match block.as_str() {
        BLOCK_ON => {
            if set_block(console, &pos, BLOCK_OFF, timeout).await {
                ToggleResult::Off
            } else {
                ToggleResult::NoOp
            }
        }
        BLOCK_OFF => {
            if set_block(console, &pos, BLOCK_ON, timeout).await {
                ToggleResult::On
            } else {
                ToggleResult::NoOp
            }
        }
        other => {
            debug!(block = other, "block is neither known material");
            ToggleResult::NoOp
        }
    }
}

/// Replace the block at `pos`. An empty reply is the server's success
/// signal; anything else, including the no-reply sentinel, is failure.
async fn set_block(
    console: &dyn RemoteConsole,
    pos: &BlockPos,
    block: &str,
    timeout: Duration,
) -> bool {
    let cmd = format!(
        "usetblock {} {} {} {} {} replace",
        pos.x, pos.y, pos.z, pos.world, block
    );
    match console.exec(&cmd, timeout).await {
        Ok(Some(reply)) => reply.is_empty(),
        Ok(None) => false,
        Err(e) => {
            debug!("block write failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::testing::ScriptedConsole;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn params() -> Value {
        json!({"x": 1, "y": 2, "z": 3, "world": "overworld"})
    }

    #[tokio::test]
    async fn on_material_toggles_off_with_one_read_one_write() {
        let console = ScriptedConsole::new();
        console.push_reply(BLOCK_ON);
        console.push_reply("");

        let result = toggle_redstone_block(&console, &params(), TIMEOUT).await;
        assert_eq!(result, ToggleResult::Off);
        assert_eq!(
            console.commands(),
            vec![
                "ugetblock 1 2 3 overworld".to_string(),
                format!("usetblock 1 2 3 overworld {BLOCK_OFF} replace"),
            ]
        );
    }

    #[tokio::test]
    async fn off_material_toggles_on() {
        let console = ScriptedConsole::new();
        console.push_reply(BLOCK_OFF);
        console.push_reply("");

        let result = toggle_redstone_block(&console, &params(), TIMEOUT).await;
        assert_eq!(result, ToggleResult::On);
        assert_eq!(
            console.commands()[1],
            format!("usetblock 1 2 3 overworld {BLOCK_ON} replace")
        );
    }

    #[tokio::test]
    async fn unknown_material_reads_once_writes_nothing() {
        let console = ScriptedConsole::new();
        console.push_reply("minecraft:stone");

        let result = toggle_redstone_block(&console, &params(), TIMEOUT).await;
        assert_eq!(result, ToggleResult::NoOp);
        assert_eq!(console.commands().len(), 1);
    }

    #[tokio::test]
    async fn decorated_identifier_is_not_a_match() {
        let console = ScriptedConsole::new();
        console.push_reply("minecraft:redstone_lamp[lit=true]");

        let result = toggle_redstone_block(&console, &params(), TIMEOUT).await;
        assert_eq!(result, ToggleResult::NoOp);
        assert_eq!(console.commands().len(), 1);
    }

    #[tokio::test]
    async fn no_reply_on_read_is_a_no_op() {
        let console = ScriptedConsole::new();
        console.push_no_reply();

        let result = toggle_redstone_block(&console, &params(), TIMEOUT).await;
        assert_eq!(result, ToggleResult::NoOp);
        assert_eq!(console.commands().len(), 1);
    }

    #[tokio::test]
    async fn unconfirmed_write_is_a_no_op() {
        let console = ScriptedConsole::new();
        console.push_reply(BLOCK_ON);
        console.push_reply("Unknown command");

        let result = toggle_redstone_block(&console, &params(), TIMEOUT).await;
        assert_eq!(result, ToggleResult::NoOp);
        assert_eq!(console.commands().len(), 2);
    }

    #[tokio::test]
    async fn busy_console_is_a_no_op() {
        let console = ScriptedConsole::new();
        console.push_busy();

        let result = toggle_redstone_block(&console, &params(), TIMEOUT).await;
        assert_eq!(result, ToggleResult::NoOp);
    }

    #[tokio::test]
    async fn invalid_params_issue_no_commands() {
        let console = ScriptedConsole::new();
        for bad in [
            json!({"x": 1, "y": 2, "z": 3}),
            json!({"x": 1.5, "y": 2, "z": 3, "world": "overworld"}),
            json!({"x": "1", "y": 2, "z": 3, "world": "overworld"}),
            json!({"x": 1, "y": 2, "z": 3, "world": 9}),
            json!([1, 2, 3, "overworld"]),
            json!(null),
        ] {
            let result = toggle_redstone_block(&console, &bad, TIMEOUT).await;
            assert_eq!(result, ToggleResult::NoOp, "params: {bad}");
        }
        assert!(console.commands().is_empty());
    }
}
