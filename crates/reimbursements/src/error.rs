//! Reimbursement error model.

use storefront_core::DomainError;
use thiserror::Error;

use crate::model::ReturnItemId;
use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReimbursementError {
    /// The store rejected an update; the current operation is aborted.
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A reimbursement type was configured by name but has no strategy behind it.
    #[error("reimbursement type `{0}` does not implement reimburse")]
    UnimplementedStrategy(String),

    /// A positive refund amount cannot be prorated against a zero estimate.
    #[error("refund amount estimate for return item {0} is zero")]
    ZeroRefundEstimate(ReturnItemId),

    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),
}
