//! In-memory port doubles for unit tests

use crate::error::{AppError, Result};
use crate::services::alarms::AlarmPort;
use crate::services::grants::GrantPort;
use crate::services::trigger::{TriggerId, TriggerPayload};
use crate::storage::ExternalUri;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCall {
    Register(TriggerId),
    Cancel(TriggerId),
}

/// Alarm service that only records what it was asked to do
#[derive(Default)]
pub struct FakeAlarms {
    live: Mutex<BTreeMap<TriggerId, TriggerPayload>>,
    calls: Mutex<Vec<AlarmCall>>,
    rejected: Mutex<HashSet<i64>>,
}

impl FakeAlarms {
    pub fn live(&self) -> BTreeSet<TriggerId> {
        self.live.lock().unwrap().keys().copied().collect()
    }

    pub fn payload(&self, trigger: TriggerId) -> Option<TriggerPayload> {
        self.live.lock().unwrap().get(&trigger).cloned()
    }

    pub fn calls(&self) -> Vec<AlarmCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Simulate a reboot: every pending trigger is lost
    pub fn forget_all(&self) {
        self.live.lock().unwrap().clear();
    }

    /// Refuse exact scheduling for this timestamp
    pub fn reject(&self, timestamp: i64) {
        self.rejected.lock().unwrap().insert(timestamp);
    }
}

#[async_trait]
impl AlarmPort for FakeAlarms {
    async fn register(
        &self,
        trigger: TriggerId,
        _when_millis: i64,
        payload: TriggerPayload,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(AlarmCall::Register(trigger));
        if self.rejected.lock().unwrap().contains(&trigger.timestamp()) {
            return Err(AppError::CapabilityDenied("exact alarms revoked".into()));
        }
        self.live.lock().unwrap().insert(trigger, payload);
        Ok(())
    }

    async fn cancel(&self, trigger: TriggerId) -> Result<()> {
        self.calls.lock().unwrap().push(AlarmCall::Cancel(trigger));
        self.live.lock().unwrap().remove(&trigger);
        Ok(())
    }
}

/// Grant registry held in memory
#[derive(Default)]
pub struct FakeGrants {
    granted: Mutex<BTreeSet<String>>,
    denied: Mutex<HashSet<String>>,
}

impl FakeGrants {
    pub fn deny(&self, uri: &str) {
        self.denied.lock().unwrap().insert(uri.to_string());
    }

    pub fn grant_directly(&self, uri: &str) {
        self.granted.lock().unwrap().insert(uri.to_string());
    }
}

#[async_trait]
impl GrantPort for FakeGrants {
    async fn take_persistable(&self, uri: &ExternalUri) -> Result<()> {
        if self.denied.lock().unwrap().contains(uri.as_str()) {
            return Err(AppError::CapabilityDenied(uri.to_string()));
        }
        self.granted.lock().unwrap().insert(uri.as_str().to_string());
        Ok(())
    }

    async fn release_persistable(&self, uri: &ExternalUri) -> Result<bool> {
        Ok(self.granted.lock().unwrap().remove(uri.as_str()))
    }

    async fn is_granted(&self, uri: &ExternalUri) -> Result<bool> {
        Ok(self.granted.lock().unwrap().contains(uri.as_str()))
    }

    async fn persisted(&self) -> Result<Vec<String>> {
        Ok(self.granted.lock().unwrap().iter().cloned().collect())
    }
}
