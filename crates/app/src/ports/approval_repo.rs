//! Approval repository port — persistence for approval requests.

use std::future::Future;

use govhub_domain::approval::ApprovalRequest;
use govhub_domain::error::GovError;
use govhub_domain::id::{AutomationId, RequestId};

/// Repository for persisting and querying [`ApprovalRequest`]s.
pub trait ApprovalRepository {
    /// Persist a freshly-submitted request.
    fn create(
        &self,
        request: ApprovalRequest,
    ) -> impl Future<Output = Result<ApprovalRequest, GovError>> + Send;

    /// Get a request by its unique identifier.
    fn get_by_id(
        &self,
        id: RequestId,
    ) -> impl Future<Output = Result<Option<ApprovalRequest>, GovError>> + Send;

    /// All requests, newest first.
    fn get_all(&self) -> impl Future<Output = Result<Vec<ApprovalRequest>, GovError>> + Send;

    /// Write a decision (or emergency-stop conversion) back.
    fn update(
        &self,
        request: ApprovalRequest,
    ) -> impl Future<Output = Result<ApprovalRequest, GovError>> + Send;

    /// PENDING requests targeting the given automation.
    fn find_pending_for(
        &self,
        automation_id: AutomationId,
    ) -> impl Future<Output = Result<Vec<ApprovalRequest>, GovError>> + Send;
}
