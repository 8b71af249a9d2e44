//! Operational commands
//!
//! The host's console maps its sync commands onto these; every command
//! yields a printable report and never fails the host.

use std::fmt::Write as _;
use std::str::FromStr;

use symsync_core::SyncError;
use symsync_diffusion::Connector;
use symsync_wire::{keys, MsgType, Payload};

use crate::{SyncNode, SyncStats};

/// Console commands understood by a sync node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncCommand {
    Start,
    Stop,
    Status,
    State,
    Debug,
}

impl SyncCommand {
    pub const ALL: &'static [SyncCommand] = &[
        SyncCommand::Start,
        SyncCommand::Stop,
        SyncCommand::Status,
        SyncCommand::State,
        SyncCommand::Debug,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SyncCommand::Start => "start",
            SyncCommand::Stop => "stop",
            SyncCommand::Status => "status",
            SyncCommand::State => "state",
            SyncCommand::Debug => "debug",
        }
    }

    pub fn parse(input: &str) -> Result<Self, SyncError> {
        let word = input.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(word))
            .ok_or_else(|| SyncError::UnknownCommand(word.to_string()))
    }
}

impl FromStr for SyncCommand {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl SyncNode {
    /// Run a console command and describe the result
    pub async fn execute(&self, command: SyncCommand) -> String {
        if !self.is_active() {
            return format!("sync is not active on this node ({})", command.name());
        }
        match command {
            SyncCommand::Start => match self.start().await {
                Ok(()) => {
                    let listener = self
                        .listener_addr()
                        .map_or_else(|| "none".to_string(), |a| a.to_string());
                    format!(
                        "sync started: actor {}, role {}, listener {}, connectors {}",
                        self.actor(),
                        self.role(),
                        listener,
                        self.connector_count()
                    )
                }
                Err(e) => format!("sync start failed: {}", e),
            },
            SyncCommand::Stop => {
                self.stop();
                "sync stopped".to_string()
            }
            SyncCommand::Status => self.status_report(),
            SyncCommand::State => self.state_report(),
            SyncCommand::Debug => self.debug_report(),
        }
    }

    fn status_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "actor {} role {} running {} connectors {}",
            self.actor(),
            self.role(),
            self.is_running(),
            self.connector_count()
        );
        let _ = writeln!(out, "{}", SyncStats::statistic_title());
        let _ = writeln!(out, "{}", self.stats().statistic_line(false));
        let connectors = self.router().connectors().snapshot();
        if !connectors.is_empty() {
            let _ = writeln!(out, "{}", Connector::statistic_title());
            for connector in connectors.iter() {
                let _ = writeln!(out, "{}", connector.statistic_line(false));
            }
        }
        out
    }

    fn state_report(&self) -> String {
        let ids = self.inner.scene.object_ids();
        let mut out = String::new();
        let _ = writeln!(out, "actor {}: {} objects", self.actor(), ids.len());
        for id in &ids {
            let name = self
                .inner
                .scene
                .object(*id)
                .and_then(|o| o.name().map(str::to_string))
                .unwrap_or_default();
            let _ = writeln!(out, "  {} {}", id, name);
        }

        if self.router().is_relay() {
            let payload = Payload::new()
                .with(keys::ACTOR_ID, self.actor().as_str())
                .with(keys::OBJECT_COUNT, ids.len() as u64);
            self.inner.send_special(MsgType::SyncStateReport, &payload);
        }
        out
    }

    fn debug_report(&self) -> String {
        let mut out = String::new();
        for id in self.prims().ids() {
            let Some(prim) = self.prim_info(id) else {
                continue;
            };
            let _ = writeln!(out, "{} ({} properties)", id, prim.len());
            for info in prim.iter() {
                let _ = writeln!(
                    out,
                    "  {:<24} {:>20} {:<12} {:?}",
                    info.property(),
                    info.timestamp(),
                    info.origin(),
                    info.source()
                );
            }
        }
        if out.is_empty() {
            out.push_str("no sync state\n");
        }
        out
    }
}
