//! Shared helpers for integration tests

#![allow(dead_code)]

use chrono::Utc;
use notekeep::app::AppState;
use notekeep::services::{ChannelNotifier, TriggerId, TriggerPayload};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub const HOUR: i64 = 3_600_000;

pub fn now() -> i64 {
    Utc::now().timestamp_millis()
}

/// Open a full application stack rooted at `dir`
pub async fn open_state(dir: &Path) -> (AppState, UnboundedReceiver<TriggerPayload>) {
    let (notifier, rx) = ChannelNotifier::new();
    let state = AppState::initialize(dir, Arc::new(notifier)).await.unwrap();
    (state, rx)
}

pub fn triggers(id: i64, timestamps: &[i64]) -> BTreeSet<TriggerId> {
    timestamps.iter().map(|&t| TriggerId::derive(id, t)).collect()
}

pub async fn live(state: &AppState) -> BTreeSet<TriggerId> {
    state.alarms.live_triggers().await.into_iter().collect()
}
