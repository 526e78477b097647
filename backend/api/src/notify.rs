//! Outbound reminder dispatch.
//!
//! Delivery (e-mail/SMS) belongs to the external notification service;
//! this module only POSTs the reminder payload to its webhook. Dispatch is
//! fire-and-forget from the caller's point of view: the HTTP response is
//! sent before delivery completes, and a failed dispatch is logged, never
//! surfaced, and never touches ledger state.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::AppState;

const RETRY_DELAY_SECS: u64 = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ReminderPayload {
    pub student_ids: Vec<i64>,
    pub message: String,
    pub sent_at: i64,
}

/// POST the payload to the webhook, retrying once on a transport error.
pub async fn dispatch(client: &Client, webhook_url: &str, payload: &ReminderPayload) -> bool {
    for attempt in 0..2 {
        match client.post(webhook_url).json(payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(
                    "reminder dispatched to {} students",
                    payload.student_ids.len()
                );
                return true;
            }
            Ok(resp) => {
                warn!("reminder webhook answered {}", resp.status());
            }
            Err(e) => {
                warn!("reminder dispatch failed: {e}");
            }
        }
        if attempt == 0 {
            tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
        }
    }
    false
}

/// Spawn the dispatch in the background and return immediately.
pub fn spawn_dispatch(state: Arc<AppState>, payload: ReminderPayload) {
    tokio::spawn(async move {
        match state.config.notify_webhook_url.as_deref() {
            Some(url) => {
                dispatch(&state.http, url, &payload).await;
            }
            None => {
                info!(
                    "NOTIFY_WEBHOOK_URL unset; dropping reminder for {} students",
                    payload.student_ids.len()
                );
            }
        }
    });
}
