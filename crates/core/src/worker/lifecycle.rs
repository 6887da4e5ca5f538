//! Worker lifecycle as a pure state machine.
//!
//! Each transition checks the current state, moves to the next one, and
//! returns the effects the host must carry out. Nothing here touches storage,
//! the network, or clients.

use std::collections::HashSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::messages::Message;
use super::names::CacheNames;
use crate::Error;

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work requested by a transition, executed in order by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Derive the precache list and write it into `partition`.
    Precache { partition: String },
    /// Move a waiting worker on to activation.
    Activate,
    /// Delete this application's partitions not in `keep`.
    DeleteStalePartitions { keep: HashSet<String> },
    ClaimClients { version: String },
    Broadcast(Message),
    /// Answer the sender of the message being handled.
    Reply(Message),
    CompleteActivation,
}

#[derive(Debug, Clone)]
pub struct LifecycleMachine {
    state: WorkerState,
    version: String,
    names: CacheNames,
    skip_waiting: bool,
}

impl LifecycleMachine {
    pub fn new(names: CacheNames, version: impl Into<String>, skip_waiting: bool) -> Self {
        Self { state: WorkerState::Installing, version: version.into(), names, skip_waiting }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn require(&self, expected: WorkerState, operation: &str) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState { state: self.state.to_string(), operation: operation.into() })
        }
    }

    fn enter(&mut self, next: WorkerState) {
        tracing::info!(version = %self.version, from = %self.state, to = %next, "worker state change");
        self.state = next;
    }

    /// Begin installing this version.
    pub fn install(&self) -> Result<Vec<Effect>, Error> {
        self.require(WorkerState::Installing, "install")?;
        Ok(vec![Effect::Precache { partition: self.names.static_partition() }])
    }

    /// Precache finished; wait, or skip straight to activation.
    pub fn install_complete(&mut self) -> Result<Vec<Effect>, Error> {
        self.require(WorkerState::Installing, "complete install")?;
        self.enter(WorkerState::Waiting);
        Ok(if self.skip_waiting { vec![Effect::Activate] } else { Vec::new() })
    }

    /// Stale partitions go first, then clients are claimed and told.
    pub fn activate(&mut self) -> Result<Vec<Effect>, Error> {
        self.require(WorkerState::Waiting, "activate")?;
        self.enter(WorkerState::Activating);
        Ok(vec![
            Effect::DeleteStalePartitions { keep: self.names.current_set() },
            Effect::ClaimClients { version: self.version.clone() },
            Effect::Broadcast(Message::SwUpdated { version: self.version.clone() }),
            Effect::CompleteActivation,
        ])
    }

    pub fn activation_complete(&mut self) -> Result<(), Error> {
        self.require(WorkerState::Activating, "complete activation")?;
        self.enter(WorkerState::Active);
        Ok(())
    }

    /// The previous worker has no clients left.
    pub fn clients_released(&self) -> Vec<Effect> {
        if self.state == WorkerState::Waiting { vec![Effect::Activate] } else { Vec::new() }
    }

    pub fn handle_message(&self, message: &Message) -> Result<Vec<Effect>, Error> {
        if self.state == WorkerState::Redundant {
            return Err(Error::InvalidState { state: self.state.to_string(), operation: "handle messages".into() });
        }
        match message {
            Message::CheckForUpdates => Ok(vec![Effect::Reply(Message::VersionInfo { version: self.version.clone() })]),
            Message::SkipWaiting if self.state == WorkerState::Waiting => Ok(vec![Effect::Activate]),
            Message::SkipWaiting => {
                tracing::debug!(state = %self.state, "skip waiting ignored outside waiting state");
                Ok(Vec::new())
            }
            Message::SwUpdated { .. } | Message::VersionInfo { .. } => {
                Err(Error::InvalidInput(format!("{message:?} is sent by the worker, not to it")))
            }
        }
    }

    /// A newer version took over.
    pub fn supersede(&mut self) {
        if self.state != WorkerState::Redundant {
            self.enter(WorkerState::Redundant);
        }
    }

    /// Install or activation failed; this worker will never serve.
    pub fn fail(&mut self) {
        self.supersede();
    }
}
