//! Event classification.
//!
//! GitHub identifies the event type in the `X-GitHub-Event` header, but the
//! classifier works from the payload shape alone: a `zen` field marks a ping, a
//! `ref` plus `before` marks a push. Anything else is not for us.

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use pipeline::{CommitSha, GitRef, PingEvent, PushEvent, RepositoryUrl, WebhookEvent};

use crate::payload::{PingPayload, PushPayload};

/// Why a payload was not turned into a [`WebhookEvent`].
///
/// None of these are reported to the sender; the caller logs and drops.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Payload is neither a ping nor a push")]
    Unrecognised,

    #[error("{kind} payload is malformed: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Push payload has no usable '{0}'")]
    MissingField(&'static str),
}

/// Decodes and classifies a raw webhook body.
pub fn classify(body: &[u8]) -> Result<WebhookEvent, ClassifyError> {
    let value: Value = serde_json::from_slice(body).map_err(ClassifyError::InvalidJson)?;
    classify_value(value)
}

/// Classifies an already decoded payload.
pub fn classify_value(value: Value) -> Result<WebhookEvent, ClassifyError> {
    let is_ping = value.get("zen").is_some();
    let is_push = value.get("ref").is_some() && value.get("before").is_some();

    if is_ping {
        let payload: PingPayload = serde_json::from_value(value)
            .map_err(|source| ClassifyError::Malformed { kind: "ping", source })?;
        debug!("Classified payload as ping");
        return Ok(WebhookEvent::Ping(ping_event(payload)));
    }
    if is_push {
        let payload: PushPayload = serde_json::from_value(value)
            .map_err(|source| ClassifyError::Malformed { kind: "push", source })?;
        debug!(reference = %payload.reference, "Classified payload as push");
        return push_event(payload).map(WebhookEvent::Push);
    }
    Err(ClassifyError::Unrecognised)
}

fn ping_event(payload: PingPayload) -> PingEvent {
    PingEvent {
        repository_name: payload.repository.and_then(|r| r.full_name),
        zen_message: payload.zen,
    }
}

fn push_event(payload: PushPayload) -> Result<PushEvent, ClassifyError> {
    let repository_urls: BTreeSet<RepositoryUrl> = payload
        .repository
        .url_forms()
        .filter_map(RepositoryUrl::new)
        .collect();
    if repository_urls.is_empty() {
        return Err(ClassifyError::MissingField("repository.clone_url"));
    }

    let head = payload
        .after
        .filter(|a| !a.is_empty())
        .or_else(|| payload.head_commit.map(|c| c.id))
        .and_then(CommitSha::new)
        .ok_or(ClassifyError::MissingField("after"))?;

    Ok(PushEvent {
        repository_urls,
        repository_name: payload.repository.full_name,
        ref_name: GitRef::new(payload.reference).ok_or(ClassifyError::MissingField("ref"))?,
        head_commit: head,
        before_commit: CommitSha::new(payload.before).ok_or(ClassifyError::MissingField("before"))?,
    })
}
