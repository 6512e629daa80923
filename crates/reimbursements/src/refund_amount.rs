//! Refund amount estimation.
//!
//! The estimate is the amount a return item would refund if returned in
//! full. Tax proration divides the item's actual amount by it, so swapping
//! the estimator changes how tax is allocated to partial refunds.

use std::sync::Arc;

use storefront_core::Money;

use crate::model::ReturnItem;

/// Computes the full refund amount for a return item.
pub trait RefundAmountCalculator: Send + Sync {
    fn compute(&self, return_item: &ReturnItem) -> Money;
}

impl<T> RefundAmountCalculator for Arc<T>
where
    T: RefundAmountCalculator + ?Sized,
{
    fn compute(&self, return_item: &ReturnItem) -> Money {
        (**self).compute(return_item)
    }
}

/// Refunds what was paid for the unit, before additional tax.
#[derive(Debug, Copy, Clone, Default)]
pub struct DefaultRefundAmount;

impl RefundAmountCalculator for DefaultRefundAmount {
    fn compute(&self, return_item: &ReturnItem) -> Money {
        return_item.inventory_unit().pre_tax_amount.max(Money::ZERO)
    }
}
