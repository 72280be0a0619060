use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use super::domain::{AccessLogEntry, AccessLogId, AuditOutcome, UserId};
use super::repository::AccessLogRepository;

/// Writes access-log entries on behalf of the service.
///
/// Sink failures never reach the caller: the business action has already been decided, so a
/// failed append is reported on the operational log and dropped.
pub struct AuditRecorder<L> {
    sink: Arc<L>,
}

impl<L> AuditRecorder<L>
where
    L: AccessLogRepository,
{
    pub fn new(sink: Arc<L>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<L> {
        &self.sink
    }

    /// Appends one entry. Returns whether the sink accepted it.
    pub fn record(
        &self,
        actor: Option<&UserId>,
        action: &str,
        details: Value,
        outcome: AuditOutcome,
        origin: Option<&str>,
    ) -> bool {
        let entry = AccessLogEntry {
            id: AccessLogId::generate(),
            user_id: actor.cloned(),
            action: action.to_string(),
            details,
            origin: origin.map(str::to_string),
            outcome,
            created_at: Utc::now(),
        };

        match self.sink.append(entry) {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, action, ?outcome, "access log append failed");
                false
            }
        }
    }
}
