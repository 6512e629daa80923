//! Tax proration for reimbursements.
//!
//! Tax is allocated one return item at a time. Deployments backed by an
//! external tax engine that prices a whole order at once replace the entire
//! [`ReimbursementTaxCalculator`] instead of the per-item proration.

use rust_decimal::Decimal;
use storefront_core::{Entity, Money};
use tracing::{debug, info};

use crate::config::TaxCalculatorConfig;
use crate::error::ReimbursementError;
use crate::model::{Reimbursement, ReturnItem, Settlement, TaxTotals};
use crate::refund_amount::RefundAmountCalculator;
use crate::store::ReimbursementStore;

/// Recomputes and persists the tax totals of a reimbursement's children.
pub trait ReimbursementTaxCalculator: Send + Sync {
    fn apply(&self, reimbursement: &mut Reimbursement) -> Result<(), ReimbursementError>;
}

/// Allocates each inventory unit's tax in proportion to the refunded amount.
///
/// Each update is persisted on its own; if one fails, the error is returned
/// immediately and records updated before it stay updated.
#[derive(Debug, Clone)]
pub struct ProratedTaxCalculator<R, S> {
    refund_amount: R,
    store: S,
    config: TaxCalculatorConfig,
}

impl<R, S> ProratedTaxCalculator<R, S>
where
    R: RefundAmountCalculator,
    S: ReimbursementStore,
{
    pub fn new(refund_amount: R, store: S) -> Self {
        Self {
            refund_amount,
            store,
            config: TaxCalculatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TaxCalculatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TaxCalculatorConfig {
        &self.config
    }

    /// Tax totals a return item should carry, without persisting anything.
    pub fn prorate(&self, return_item: &ReturnItem) -> Result<TaxTotals, ReimbursementError> {
        let proportion = self.proportion(return_item)?;
        if proportion.is_zero() {
            return Ok(TaxTotals::zero());
        }
        return_item
            .inventory_unit()
            .tax_totals()
            .prorate(proportion, self.config.scale)
            .ok_or(ReimbursementError::Overflow("prorated tax total"))
    }

    fn proportion(&self, return_item: &ReturnItem) -> Result<Decimal, ReimbursementError> {
        let amount = return_item.amount();
        // Voided and negative amounts refund no tax.
        if !amount.is_positive() {
            return Ok(Decimal::ZERO);
        }
        let estimate = self.refund_amount.compute(return_item);
        if estimate.is_zero() {
            return Err(ReimbursementError::ZeroRefundEstimate(*return_item.id()));
        }
        amount
            .checked_div(estimate)
            .ok_or(ReimbursementError::Overflow("refund proportion"))
    }

    fn set_return_item_tax(&self, return_item: &mut ReturnItem) -> Result<(), ReimbursementError> {
        let taxes = self.prorate(return_item)?;
        self.store.update_return_item_taxes(*return_item.id(), taxes)?;
        return_item.set_tax_totals(taxes);
        debug!(
            return_item_id = %return_item.id(),
            additional_tax_total = %taxes.additional,
            included_tax_total = %taxes.included,
            "return item tax prorated"
        );
        Ok(())
    }

    /// Returns whether the settlement had a shipment to copy tax from.
    fn set_settlement_tax(&self, settlement: &mut Settlement) -> Result<bool, ReimbursementError> {
        let Some(shipment) = settlement.shipment() else {
            return Ok(false);
        };
        let taxes = shipment.tax_totals();
        self.store.update_settlement_taxes(*settlement.id(), taxes)?;
        settlement.set_tax_totals(taxes);
        debug!(
            settlement_id = %settlement.id(),
            additional_tax_total = %taxes.additional,
            included_tax_total = %taxes.included,
            "settlement tax copied from shipment"
        );
        Ok(true)
    }
}

impl<R, S> ReimbursementTaxCalculator for ProratedTaxCalculator<R, S>
where
    R: RefundAmountCalculator,
    S: ReimbursementStore,
{
    fn apply(&self, reimbursement: &mut Reimbursement) -> Result<(), ReimbursementError> {
        let reimbursement_id = *reimbursement.id();
        let (return_items, settlements) = reimbursement.children_mut();

        for return_item in return_items.iter_mut() {
            self.set_return_item_tax(return_item)?;
        }

        let mut settlements_taxed = 0usize;
        for settlement in settlements.iter_mut() {
            if self.set_settlement_tax(settlement)? {
                settlements_taxed += 1;
            }
        }

        info!(
            reimbursement_id = %reimbursement_id,
            return_items = return_items.len(),
            settlements_taxed,
            settlements_skipped = settlements.len() - settlements_taxed,
            "reimbursement tax applied"
        );
        Ok(())
    }
}
