//! Reimbursement types: how money gets back to the customer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::{DomainError, Entity, Money};
use tracing::debug;

use crate::error::ReimbursementError;
use crate::model::{Reimbursement, ReimbursementId, ReturnItem};
use crate::store::ReimbursementStore;

/// Name of the type that refunds to the original payment method.
pub const ORIGINAL: &str = "original";

/// Name of the type that issues store credit.
pub const STORE_CREDIT: &str = "store_credit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    Refund,
    StoreCredit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditStatus {
    /// Computed by a simulation; nothing was persisted.
    Pending,
    Completed,
}

/// Money handed back to the customer by a reimbursement type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub reimbursement_id: ReimbursementId,
    pub reimbursement_type: String,
    pub kind: CreditKind,
    pub amount: Money,
    pub status: CreditStatus,
    pub created_at: DateTime<Utc>,
}

/// A named strategy that reimburses return items.
///
/// With `simulate` set, implementations report the credits they would issue
/// without persisting anything.
pub trait ReimbursementType: Send + Sync + core::fmt::Debug {
    /// Unique name used to select the type from configuration.
    fn name(&self) -> &str;

    fn reimburse(
        &self,
        reimbursement: &Reimbursement,
        return_items: &[ReturnItem],
        simulate: bool,
    ) -> Result<Vec<Credit>, ReimbursementError>;
}

/// A reimbursement type known by name only, with no strategy behind it.
///
/// Every call to `reimburse` fails; this is a configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnimplementedReimbursementType {
    name: String,
}

impl UnimplementedReimbursementType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ReimbursementType for UnimplementedReimbursementType {
    fn name(&self) -> &str {
        &self.name
    }

    fn reimburse(
        &self,
        _reimbursement: &Reimbursement,
        _return_items: &[ReturnItem],
        _simulate: bool,
    ) -> Result<Vec<Credit>, ReimbursementError> {
        Err(ReimbursementError::UnimplementedStrategy(self.name.clone()))
    }
}

/// Shared body of the credit-issuing types: one credit for the items' total.
fn issue_credit<S: ReimbursementStore>(
    name: &str,
    kind: CreditKind,
    store: &S,
    reimbursement: &Reimbursement,
    return_items: &[ReturnItem],
    simulate: bool,
) -> Result<Vec<Credit>, ReimbursementError> {
    if return_items.is_empty() {
        return Ok(Vec::new());
    }

    let mut amount = Money::ZERO;
    for item in return_items {
        if reimbursement.return_item(*item.id()).is_none() {
            return Err(DomainError::invariant(format!(
                "return item {} does not belong to reimbursement {}",
                item.id(),
                reimbursement.number()
            ))
            .into());
        }
        amount = item
            .checked_total()
            .and_then(|total| amount.checked_add(total))
            .ok_or(ReimbursementError::Overflow("credit amount"))?;
    }

    let mut credit = Credit {
        reimbursement_id: *reimbursement.id(),
        reimbursement_type: name.to_string(),
        kind,
        amount,
        status: CreditStatus::Pending,
        created_at: Utc::now(),
    };

    if simulate {
        debug!(
            reimbursement = reimbursement.number(),
            reimbursement_type = name,
            amount = %amount,
            "simulated credit"
        );
        return Ok(vec![credit]);
    }

    credit.status = CreditStatus::Completed;
    store.record_credit(&credit)?;
    debug!(
        reimbursement = reimbursement.number(),
        reimbursement_type = name,
        amount = %amount,
        "credit recorded"
    );
    Ok(vec![credit])
}

/// Refunds to the payment method the order was paid with.
#[derive(Debug, Clone)]
pub struct OriginalPayment<S> {
    store: S,
}

impl<S: ReimbursementStore> OriginalPayment<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> ReimbursementType for OriginalPayment<S>
where
    S: ReimbursementStore + core::fmt::Debug,
{
    fn name(&self) -> &str {
        ORIGINAL
    }

    fn reimburse(
        &self,
        reimbursement: &Reimbursement,
        return_items: &[ReturnItem],
        simulate: bool,
    ) -> Result<Vec<Credit>, ReimbursementError> {
        issue_credit(
            ORIGINAL,
            CreditKind::Refund,
            &self.store,
            reimbursement,
            return_items,
            simulate,
        )
    }
}

/// Issues store credit instead of moving money back to the payment method.
#[derive(Debug, Clone)]
pub struct StoreCredit<S> {
    store: S,
}

impl<S: ReimbursementStore> StoreCredit<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> ReimbursementType for StoreCredit<S>
where
    S: ReimbursementStore + core::fmt::Debug,
{
    fn name(&self) -> &str {
        STORE_CREDIT
    }

    fn reimburse(
        &self,
        reimbursement: &Reimbursement,
        return_items: &[ReturnItem],
        simulate: bool,
    ) -> Result<Vec<Credit>, ReimbursementError> {
        issue_credit(
            STORE_CREDIT,
            CreditKind::StoreCredit,
            &self.store,
            reimbursement,
            return_items,
            simulate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use crate::model::TaxTotals;
    use crate::store::InMemoryReimbursementStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn reimbursement() -> Reimbursement {
        let taxed = TaxTotals::new(money(dec!(0.80)), money(dec!(0)));
        Reimbursement::new(ReimbursementId::new(), "RI200")
            .with_return_item(
                return_item(unit(dec!(10), dec!(0.80), dec!(0)), dec!(10)).with_tax_totals(taxed),
            )
            .with_return_item(return_item(unit(dec!(5.50), dec!(0), dec!(0)), dec!(5.50)))
    }

    #[test]
    fn unimplemented_type_always_fails() {
        let base = UnimplementedReimbursementType::new("exchange");
        let reimbursement = reimbursement();

        for simulate in [true, false] {
            let err = base
                .reimburse(&reimbursement, reimbursement.return_items(), simulate)
                .unwrap_err();
            assert_eq!(
                err,
                ReimbursementError::UnimplementedStrategy("exchange".to_string())
            );
        }
        let err = base.reimburse(&reimbursement, &[], false).unwrap_err();
        assert!(matches!(err, ReimbursementError::UnimplementedStrategy(_)));
    }

    #[test]
    fn simulation_reports_pending_credit_without_persisting() {
        let store = InMemoryReimbursementStore::arc();
        let original = OriginalPayment::new(store.clone());
        let reimbursement = reimbursement();

        let credits = original
            .reimburse(&reimbursement, reimbursement.return_items(), true)
            .unwrap();

        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].status, CreditStatus::Pending);
        assert_eq!(credits[0].kind, CreditKind::Refund);
        assert_eq!(credits[0].amount, money(dec!(16.30)));
        assert!(store.credits().is_empty());
    }

    #[test]
    fn real_run_records_completed_credit() {
        let store = InMemoryReimbursementStore::arc();
        let store_credit = StoreCredit::new(store.clone());
        let reimbursement = reimbursement();

        let credits = store_credit
            .reimburse(&reimbursement, &reimbursement.return_items()[1..], false)
            .unwrap();

        assert_eq!(credits[0].status, CreditStatus::Completed);
        assert_eq!(credits[0].kind, CreditKind::StoreCredit);
        assert_eq!(credits[0].reimbursement_type, STORE_CREDIT);
        assert_eq!(store.credits(), credits);
    }

    #[test]
    fn no_items_means_no_credits() {
        let store = InMemoryReimbursementStore::arc();
        let original = OriginalPayment::new(store.clone());
        let credits = original.reimburse(&reimbursement(), &[], false).unwrap();
        assert!(credits.is_empty());
        assert!(store.credits().is_empty());
    }

    #[test]
    fn foreign_return_items_are_rejected() {
        let original = OriginalPayment::new(InMemoryReimbursementStore::arc());
        let foreign = [return_item(unit(dec!(1), dec!(0), dec!(0)), dec!(1))];

        let err = original.reimburse(&reimbursement(), &foreign, true).unwrap_err();

        assert!(matches!(
            err,
            ReimbursementError::Domain(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn overflowing_item_total_is_an_error() {
        let store = InMemoryReimbursementStore::arc();
        let original = OriginalPayment::new(store.clone());
        let huge = return_item(unit(dec!(1), dec!(0), dec!(0)), Decimal::MAX)
            .with_tax_totals(TaxTotals::new(money(dec!(1)), Money::ZERO));
        let reimbursement =
            Reimbursement::new(ReimbursementId::new(), "RI201").with_return_item(huge);

        for simulate in [true, false] {
            let err = original
                .reimburse(&reimbursement, reimbursement.return_items(), simulate)
                .unwrap_err();
            assert_eq!(err, ReimbursementError::Overflow("credit amount"));
        }
        assert!(store.credits().is_empty());
    }

    #[test]
    fn overflowing_credit_sum_is_an_error() {
        let original = OriginalPayment::new(InMemoryReimbursementStore::arc());
        let reimbursement = Reimbursement::new(ReimbursementId::new(), "RI202")
            .with_return_item(return_item(unit(dec!(1), dec!(0), dec!(0)), Decimal::MAX))
            .with_return_item(return_item(unit(dec!(1), dec!(0), dec!(0)), dec!(1)));

        let err = original
            .reimburse(&reimbursement, reimbursement.return_items(), true)
            .unwrap_err();

        assert_eq!(err, ReimbursementError::Overflow("credit amount"));
    }

    #[test]
    fn credit_status_serializes_lowercase() {
        let json = serde_json::to_value(CreditStatus::Pending).unwrap();
        assert_eq!(json, serde_json::json!("pending"));
        let json = serde_json::to_value(CreditKind::StoreCredit).unwrap();
        assert_eq!(json, serde_json::json!("store_credit"));
    }

    #[test]
    fn types_are_object_safe() {
        let types: Vec<Arc<dyn ReimbursementType>> = vec![
            Arc::new(OriginalPayment::new(InMemoryReimbursementStore::arc())),
            Arc::new(UnimplementedReimbursementType::new("exchange")),
        ];
        let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec![ORIGINAL, "exchange"]);
    }
}
