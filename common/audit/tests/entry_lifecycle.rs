use eduhub_audit::{record, AuditActor, AuditEntryBuilder, AuditOutcome, InMemoryAuditSink};
use eduhub_observability::CoreMetrics;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn recorded_entry_has_its_before_and_after_state_redacted() {
    let sink = InMemoryAuditSink::default();
    let metrics = CoreMetrics::new();
    let tenant_id = Uuid::new_v4();
    let actor = AuditActor { id: Some(Uuid::new_v4()), name: Some("Dana".into()), email: None, cross_tenant: false };

    let entry = AuditEntryBuilder::new(tenant_id, actor, "grade:update", "grade", AuditOutcome::Success)
        .resource_id(Uuid::new_v4())
        .before(json!({ "value": "B+", "password": "unrelated-but-sensitive-key-name" }))
        .after(json!({ "value": "A-" }))
        .build();

    record(&sink, &metrics, entry).await;

    let stored = sink.entries().await;
    assert_eq!(stored.len(), 1);
    let before = stored[0].before.as_ref().unwrap();
    assert_eq!(before["password"], json!("[REDACTED]"));
    assert_eq!(before["value"], json!("B+"));
}

#[tokio::test]
async fn a_failed_write_is_swallowed_rather_than_propagated() {
    struct AlwaysFails;

    #[async_trait::async_trait]
    impl eduhub_audit::AuditSink for AlwaysFails {
        async fn write(&self, _entry: &eduhub_audit::AuditEntry) -> eduhub_audit::AuditResult<()> {
            Err(eduhub_audit::AuditError::Store("connection reset".into()))
        }
    }

    let metrics = CoreMetrics::new();
    let tenant_id = Uuid::new_v4();
    let actor = AuditActor::default();
    let entry = AuditEntryBuilder::new(tenant_id, actor, "course:create", "course", AuditOutcome::Success).build();

    // Must not panic or return an error: the caller's primary action already
    // succeeded, and a down audit store can't take that back.
    record(&AlwaysFails, &metrics, entry).await;
}
