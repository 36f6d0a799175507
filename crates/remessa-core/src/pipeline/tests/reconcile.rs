//! Asynchronous reconciliation: delivery events correlated back to sent
//! jobs, idempotent replays, and complaint-driven suppression.

use serde_json::json;

use crate::event::DeliveryEvent;
use crate::intake::{self, EnqueueOutcome};
use crate::job::{DeliveryStatus, JobSource, JobStatus};
use crate::now_ms;
use crate::pipeline::{apply_event, claimer, EventApplied};
use crate::storage::Storage;

use super::common::{request, test_storage};

fn event(event_type: &str, email_id: Option<&str>) -> DeliveryEvent {
    let mut data = json!({ "to": ["user0@example.com"] });
    if let Some(id) = email_id {
        data["email_id"] = json!(id);
    }
    serde_json::from_value(json!({
        "type": event_type,
        "created_at": "2025-01-02T03:04:05.000Z",
        "data": data,
    }))
    .unwrap()
}

/// Enqueue, claim, and mark one job sent; returns its provider message ID.
fn sent_job(storage: &dyn Storage, tenant: &str, to_email: &str) -> String {
    let req = request(tenant, to_email, JobSource::Broadcast);
    intake::enqueue(storage, req, 1000).unwrap();
    let outcome = claimer::claim_cycle(storage, 200, 300, now_ms(), 90_000).unwrap();
    let (key, job) = &outcome.claimed[0];
    let provider_id = format!("msg_{}", job.id);
    storage.mark_sent(key, &provider_id, now_ms()).unwrap().unwrap();
    provider_id
}

#[test]
fn bounce_event_updates_the_delivery_projection() {
    let (storage, _dir) = test_storage();
    let provider_id = sent_job(storage.as_ref(), "t1", "user0@example.com");

    let applied =
        apply_event(storage.as_ref(), &event("email.bounced", Some(&provider_id)), 5000).unwrap();
    assert_eq!(applied, EventApplied::Updated);

    let jobs = storage.list_jobs(&[]).unwrap();
    assert_eq!(jobs[0].1.status, JobStatus::Sent);
    assert_eq!(jobs[0].1.delivery, Some(DeliveryStatus::Bounced));
    assert_eq!(jobs[0].1.delivery_updated_at, Some(5000));
}

#[test]
fn sent_event_is_recorded_but_writes_no_projection() {
    let (storage, _dir) = test_storage();
    let provider_id = sent_job(storage.as_ref(), "t1", "user0@example.com");

    let applied =
        apply_event(storage.as_ref(), &event("email.sent", Some(&provider_id)), 5000).unwrap();
    assert_eq!(applied, EventApplied::RecordedOnly);
    assert_eq!(storage.list_jobs(&[]).unwrap()[0].1.delivery, None);
}

#[test]
fn unknown_event_type_is_ignored() {
    let (storage, _dir) = test_storage();
    let applied =
        apply_event(storage.as_ref(), &event("email.snoozed", Some("msg_x")), 5000).unwrap();
    assert_eq!(applied, EventApplied::UnknownType);
}

#[test]
fn event_without_email_id_cannot_correlate() {
    let (storage, _dir) = test_storage();
    let applied = apply_event(storage.as_ref(), &event("email.delivered", None), 5000).unwrap();
    assert_eq!(applied, EventApplied::MissingEmailId);
}

#[test]
fn oversized_email_id_cannot_correlate() {
    let (storage, _dir) = test_storage();
    let huge_id = "x".repeat(70_000);
    let applied =
        apply_event(storage.as_ref(), &event("email.bounced", Some(&huge_id)), 5000).unwrap();
    assert_eq!(applied, EventApplied::MissingEmailId);
}

#[test]
fn complaint_skips_oversized_recipients() {
    let (storage, _dir) = test_storage();
    let provider_id = sent_job(storage.as_ref(), "t1", "user0@example.com");

    let huge_addr = format!("{}@x.com", "a".repeat(70_000));
    let ev: DeliveryEvent = serde_json::from_value(json!({
        "type": "email.complained",
        "created_at": "2025-01-02T03:04:05.000Z",
        "data": { "email_id": provider_id, "to": [huge_addr, "user0@example.com"] },
    }))
    .unwrap();
    let applied = apply_event(storage.as_ref(), &ev, 5000).unwrap();
    assert_eq!(applied, EventApplied::Updated);
    assert!(storage.is_suppressed("t1", "user0@example.com").unwrap());
}

#[test]
fn event_for_unknown_message_is_recorded_only() {
    let (storage, _dir) = test_storage();
    let applied =
        apply_event(storage.as_ref(), &event("email.delivered", Some("msg_nobody")), 5000)
            .unwrap();
    assert_eq!(applied, EventApplied::RecordedOnly);
}

#[test]
fn replayed_event_is_idempotent() {
    let (storage, _dir) = test_storage();
    let provider_id = sent_job(storage.as_ref(), "t1", "user0@example.com");
    let ev = event("email.delivered", Some(&provider_id));

    assert_eq!(apply_event(storage.as_ref(), &ev, 5000).unwrap(), EventApplied::Updated);
    assert_eq!(apply_event(storage.as_ref(), &ev, 6000).unwrap(), EventApplied::Updated);

    let jobs = storage.list_jobs(&[]).unwrap();
    assert_eq!(jobs[0].1.delivery, Some(DeliveryStatus::Delivered));
}

#[test]
fn later_events_overwrite_the_projection() {
    let (storage, _dir) = test_storage();
    let provider_id = sent_job(storage.as_ref(), "t1", "user0@example.com");

    apply_event(storage.as_ref(), &event("email.delivered", Some(&provider_id)), 5000).unwrap();
    apply_event(storage.as_ref(), &event("email.opened", Some(&provider_id)), 6000).unwrap();

    let jobs = storage.list_jobs(&[]).unwrap();
    assert_eq!(jobs[0].1.delivery, Some(DeliveryStatus::Opened));
    assert_eq!(jobs[0].1.delivery_updated_at, Some(6000));
}

#[test]
fn complaint_suppresses_the_recipient() {
    let (storage, _dir) = test_storage();
    let provider_id = sent_job(storage.as_ref(), "t1", "user0@example.com");

    let applied =
        apply_event(storage.as_ref(), &event("email.complained", Some(&provider_id)), 5000)
            .unwrap();
    assert_eq!(applied, EventApplied::Updated);

    assert!(storage.is_suppressed("t1", "user0@example.com").unwrap());
    assert!(!storage.is_suppressed("t2", "user0@example.com").unwrap());

    // Future broadcasts to the address are blocked at enqueue
    let req = request("t1", "user0@example.com", JobSource::Broadcast);
    let outcome = intake::enqueue(storage.as_ref(), req, 7000).unwrap();
    assert!(matches!(outcome, EnqueueOutcome::Blocked(_)));
}

#[test]
fn complaint_replay_does_not_duplicate_suppression() {
    let (storage, _dir) = test_storage();
    let provider_id = sent_job(storage.as_ref(), "t1", "user0@example.com");
    let ev = event("email.complained", Some(&provider_id));

    apply_event(storage.as_ref(), &ev, 5000).unwrap();
    apply_event(storage.as_ref(), &ev, 6000).unwrap();
    assert!(storage.is_suppressed("t1", "user0@example.com").unwrap());
}

#[test]
fn complaint_falls_back_to_the_jobs_recipient() {
    let (storage, _dir) = test_storage();
    let provider_id = sent_job(storage.as_ref(), "t1", "other@example.com");

    // Event payload carries no `to` list
    let ev: DeliveryEvent = serde_json::from_value(json!({
        "type": "email.complained",
        "created_at": "2025-01-02T03:04:05.000Z",
        "data": { "email_id": provider_id },
    }))
    .unwrap();
    apply_event(storage.as_ref(), &ev, 5000).unwrap();
    assert!(storage.is_suppressed("t1", "other@example.com").unwrap());
}
