pub mod model;
pub mod redact;
pub mod retention;
pub mod sink;

pub use model::{AuditActor, AuditEntry, AuditEntryBuilder, AuditError, AuditOutcome, AuditResult};
pub use redact::redact;
pub use retention::RetentionWorker;
pub use sink::{record, AuditSink, InMemoryAuditSink, PgAuditSink};
