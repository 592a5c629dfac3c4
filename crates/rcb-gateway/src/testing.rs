//! Test doubles shared by the gateway's unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::rcon::{RconError, RemoteConsole};

/// A scripted console: queued replies are handed out one per `exec`, and
/// every command is recorded for assertions. An empty queue yields the
/// no-reply sentinel.
#[derive(Default)]
pub struct ScriptedConsole {
    replies: Mutex<VecDeque<Result<Option<String>, RconError>>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(Some(body.to_string())));
    }

    pub fn push_no_reply(&self) {
        self.replies.lock().unwrap().push_back(Ok(None));
    }

    pub fn push_busy(&self) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(RconError::Busy));
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteConsole for ScriptedConsole {
    async fn exec(&self, command: &str, _timeout: Duration) -> Result<Option<String>, RconError> {
        self.commands.lock().unwrap().push(command.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None))
    }

    async fn notify(&self, _command: &str) {}
}
