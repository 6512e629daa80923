//! Persistence seam for reimbursement records.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use storefront_core::{Entity, Money};

use crate::model::{Reimbursement, ReturnItemId, SettlementId, TaxTotals};
use crate::reimbursement_type::Credit;

/// Explicit field updates with validation; every call either persists or
/// returns an error, nothing is swallowed.
pub trait ReimbursementStore: Send + Sync {
    fn update_return_item_taxes(
        &self,
        id: ReturnItemId,
        taxes: TaxTotals,
    ) -> Result<(), StoreError>;

    fn update_settlement_taxes(&self, id: SettlementId, taxes: TaxTotals) -> Result<(), StoreError>;

    /// Persist a completed credit issued by a reimbursement type.
    fn record_credit(&self, credit: &Credit) -> Result<(), StoreError>;
}

impl<S> ReimbursementStore for Arc<S>
where
    S: ReimbursementStore + ?Sized,
{
    fn update_return_item_taxes(
        &self,
        id: ReturnItemId,
        taxes: TaxTotals,
    ) -> Result<(), StoreError> {
        (**self).update_return_item_taxes(id, taxes)
    }

    fn update_settlement_taxes(
        &self,
        id: SettlementId,
        taxes: TaxTotals,
    ) -> Result<(), StoreError> {
        (**self).update_settlement_taxes(id, taxes)
    }

    fn record_credit(&self, credit: &Credit) -> Result<(), StoreError> {
        (**self).record_credit(credit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Fractional digits of a `decimal(10, 2)` money column.
const COLUMN_SCALE: u32 = 2;
/// Exclusive upper bound of a `decimal(10, 2)` money column.
const COLUMN_LIMIT: i64 = 100_000_000;

fn validate_money(field: &str, value: Money) -> Result<(), StoreError> {
    let amount = value.amount().normalize();
    if amount.scale() > COLUMN_SCALE {
        return Err(StoreError::Validation(format!(
            "{field} {value} has more than {COLUMN_SCALE} decimal places"
        )));
    }
    if amount.abs() >= Decimal::from(COLUMN_LIMIT) {
        return Err(StoreError::Validation(format!("{field} {value} is out of range")));
    }
    Ok(())
}

fn validate_taxes(taxes: &TaxTotals) -> Result<(), StoreError> {
    validate_money("additional_tax_total", taxes.additional)?;
    validate_money("included_tax_total", taxes.included)
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

/// In-memory store for tests/dev.
///
/// Records must be loaded with [`InMemoryReimbursementStore::load`] before
/// they can be updated, mirroring rows that already exist in a database.
#[derive(Debug, Default)]
pub struct InMemoryReimbursementStore {
    return_items: RwLock<HashMap<ReturnItemId, TaxTotals>>,
    settlements: RwLock<HashMap<SettlementId, TaxTotals>>,
    credits: RwLock<Vec<Credit>>,
}

impl InMemoryReimbursementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert the reimbursement's return items and settlements as stored rows.
    pub fn load(&self, reimbursement: &Reimbursement) -> Result<(), StoreError> {
        let mut items = self.return_items.write().map_err(poisoned)?;
        for item in reimbursement.return_items() {
            items.insert(*item.id(), item.tax_totals());
        }
        let mut settlements = self.settlements.write().map_err(poisoned)?;
        for settlement in reimbursement.settlements() {
            settlements.insert(*settlement.id(), settlement.tax_totals());
        }
        Ok(())
    }

    pub fn return_item_taxes(&self, id: ReturnItemId) -> Option<TaxTotals> {
        self.return_items.read().ok()?.get(&id).copied()
    }

    pub fn settlement_taxes(&self, id: SettlementId) -> Option<TaxTotals> {
        self.settlements.read().ok()?.get(&id).copied()
    }

    pub fn credits(&self) -> Vec<Credit> {
        self.credits
            .read()
            .map(|credits| credits.clone())
            .unwrap_or_default()
    }
}

impl ReimbursementStore for InMemoryReimbursementStore {
    fn update_return_item_taxes(
        &self,
        id: ReturnItemId,
        taxes: TaxTotals,
    ) -> Result<(), StoreError> {
        validate_taxes(&taxes)?;
        let mut items = self.return_items.write().map_err(poisoned)?;
        let row = items
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("return item {id}")))?;
        *row = taxes;
        Ok(())
    }

    fn update_settlement_taxes(
        &self,
        id: SettlementId,
        taxes: TaxTotals,
    ) -> Result<(), StoreError> {
        validate_taxes(&taxes)?;
        let mut settlements = self.settlements.write().map_err(poisoned)?;
        let row = settlements
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("settlement {id}")))?;
        *row = taxes;
        Ok(())
    }

    fn record_credit(&self, credit: &Credit) -> Result<(), StoreError> {
        validate_money("credit amount", credit.amount)?;
        if credit.amount < Money::ZERO {
            return Err(StoreError::Validation(format!(
                "credit amount {} must not be negative",
                credit.amount
            )));
        }
        self.credits.write().map_err(poisoned)?.push(credit.clone());
        Ok(())
    }
}
