//! Reimbursement aggregate and the records it references.
//!
//! Inventory units and shipments are read-only snapshots of the original
//! sale. Tax totals on return items and settlements are derived values:
//! they are only ever replaced wholesale by a tax calculator.

use serde::{Deserialize, Serialize};
use storefront_core::{Entity, Money, ValueObject};

storefront_core::uuid_id! {
    /// Identifier of a reimbursement.
    pub struct ReimbursementId;
}

storefront_core::uuid_id! {
    /// Identifier of a return item.
    pub struct ReturnItemId;
}

storefront_core::uuid_id! {
    /// Identifier of an originally purchased inventory unit.
    pub struct InventoryUnitId;
}

storefront_core::uuid_id! {
    /// Identifier of a shipment.
    pub struct ShipmentId;
}

storefront_core::uuid_id! {
    /// Identifier of a settlement.
    pub struct SettlementId;
}

storefront_core::uuid_id! {
    /// Identifier of a registered reimbursement type.
    pub struct ReimbursementTypeId;
}

/// Pair of tax totals carried by every taxable record.
///
/// `additional` is tax charged on top of the price (US sales tax);
/// `included` is tax already contained in the price (VAT).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxTotals {
    pub additional: Money,
    pub included: Money,
}

impl TaxTotals {
    pub fn new(additional: Money, included: Money) -> Self {
        Self {
            additional,
            included,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Scale both totals by `factor`, rounding each to `scale` decimals.
    pub fn prorate(&self, factor: rust_decimal::Decimal, scale: u32) -> Option<TaxTotals> {
        Some(Self {
            additional: self.additional.checked_mul(factor)?.round_dp(scale),
            included: self.included.checked_mul(factor)?.round_dp(scale),
        })
    }
}

impl ValueObject for TaxTotals {}

/// The unit originally sold, authoritative for the tax charged at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub id: InventoryUnitId,
    /// Price paid for the unit, excluding additional tax.
    pub pre_tax_amount: Money,
    pub additional_tax_total: Money,
    pub included_tax_total: Money,
}

impl InventoryUnit {
    pub fn tax_totals(&self) -> TaxTotals {
        TaxTotals::new(self.additional_tax_total, self.included_tax_total)
    }
}

impl Entity for InventoryUnit {
    type Id = InventoryUnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub additional_tax_total: Money,
    pub included_tax_total: Money,
}

impl Shipment {
    pub fn tax_totals(&self) -> TaxTotals {
        TaxTotals::new(self.additional_tax_total, self.included_tax_total)
    }
}

/// One unit being returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnItem {
    id: ReturnItemId,
    inventory_unit: InventoryUnit,
    /// Amount to refund; zero or negative means nothing is refunded.
    amount: Money,
    taxes: TaxTotals,
    preferred_reimbursement_type: Option<ReimbursementTypeId>,
}

impl ReturnItem {
    pub fn new(id: ReturnItemId, inventory_unit: InventoryUnit, amount: Money) -> Self {
        Self {
            id,
            inventory_unit,
            amount,
            taxes: TaxTotals::zero(),
            preferred_reimbursement_type: None,
        }
    }

    /// Rehydrate previously stored tax totals.
    pub fn with_tax_totals(mut self, taxes: TaxTotals) -> Self {
        self.taxes = taxes;
        self
    }

    pub fn with_preferred_reimbursement_type(mut self, type_id: ReimbursementTypeId) -> Self {
        self.preferred_reimbursement_type = Some(type_id);
        self
    }

    pub fn inventory_unit(&self) -> &InventoryUnit {
        &self.inventory_unit
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn additional_tax_total(&self) -> Money {
        self.taxes.additional
    }

    pub fn included_tax_total(&self) -> Money {
        self.taxes.included
    }

    pub fn tax_totals(&self) -> TaxTotals {
        self.taxes
    }

    pub fn preferred_reimbursement_type(&self) -> Option<ReimbursementTypeId> {
        self.preferred_reimbursement_type
    }

    /// Amount owed to the customer: included tax is already part of `amount`.
    ///
    /// `None` when the sum overflows.
    pub fn checked_total(&self) -> Option<Money> {
        self.amount.checked_add(self.taxes.additional)
    }

    pub(crate) fn set_tax_totals(&mut self, taxes: TaxTotals) {
        self.taxes = taxes;
    }
}

impl Entity for ReturnItem {
    type Id = ReturnItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// How part of a reimbursement is settled, optionally tied to a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    id: SettlementId,
    shipment: Option<Shipment>,
    amount: Money,
    taxes: TaxTotals,
    reimbursement_type: Option<ReimbursementTypeId>,
}

impl Settlement {
    pub fn new(id: SettlementId, shipment: Option<Shipment>, amount: Money) -> Self {
        Self {
            id,
            shipment,
            amount,
            taxes: TaxTotals::zero(),
            reimbursement_type: None,
        }
    }

    pub fn with_tax_totals(mut self, taxes: TaxTotals) -> Self {
        self.taxes = taxes;
        self
    }

    pub fn with_reimbursement_type(mut self, type_id: ReimbursementTypeId) -> Self {
        self.reimbursement_type = Some(type_id);
        self
    }

    pub fn shipment(&self) -> Option<&Shipment> {
        self.shipment.as_ref()
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn additional_tax_total(&self) -> Money {
        self.taxes.additional
    }

    pub fn included_tax_total(&self) -> Money {
        self.taxes.included
    }

    pub fn tax_totals(&self) -> TaxTotals {
        self.taxes
    }

    pub fn reimbursement_type(&self) -> Option<ReimbursementTypeId> {
        self.reimbursement_type
    }

    pub(crate) fn set_tax_totals(&mut self, taxes: TaxTotals) {
        self.taxes = taxes;
    }
}

impl Entity for Settlement {
    type Id = SettlementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Aggregate root: Reimbursement.
///
/// Holds return items in the order they were added, plus settlements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reimbursement {
    id: ReimbursementId,
    number: String,
    return_items: Vec<ReturnItem>,
    settlements: Vec<Settlement>,
}

impl Reimbursement {
    pub fn new(id: ReimbursementId, number: impl Into<String>) -> Self {
        Self {
            id,
            number: number.into(),
            return_items: Vec::new(),
            settlements: Vec::new(),
        }
    }

    pub fn with_return_item(mut self, item: ReturnItem) -> Self {
        self.return_items.push(item);
        self
    }

    pub fn with_settlement(mut self, settlement: Settlement) -> Self {
        self.settlements.push(settlement);
        self
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn return_items(&self) -> &[ReturnItem] {
        &self.return_items
    }

    pub fn settlements(&self) -> &[Settlement] {
        &self.settlements
    }

    pub fn return_item(&self, id: ReturnItemId) -> Option<&ReturnItem> {
        self.return_items.iter().find(|item| item.id == id)
    }

    /// Return items whose customer asked for the given reimbursement type.
    pub fn return_items_for(&self, type_id: ReimbursementTypeId) -> Vec<&ReturnItem> {
        self.return_items
            .iter()
            .filter(|item| item.preferred_reimbursement_type == Some(type_id))
            .collect()
    }

    /// Settlements settled through the given reimbursement type.
    pub fn settlements_for(&self, type_id: ReimbursementTypeId) -> Vec<&Settlement> {
        self.settlements
            .iter()
            .filter(|settlement| settlement.reimbursement_type == Some(type_id))
            .collect()
    }

    /// Sum of return item totals and settlement amounts; `None` on overflow.
    pub fn checked_total(&self) -> Option<Money> {
        let items = self
            .return_items
            .iter()
            .map(ReturnItem::checked_total)
            .collect::<Option<Vec<_>>>()?;
        let settlements = self.settlements.iter().map(Settlement::amount);
        Money::checked_sum(items.into_iter().chain(settlements))
    }

    pub(crate) fn children_mut(&mut self) -> (&mut [ReturnItem], &mut [Settlement]) {
        (&mut self.return_items, &mut self.settlements)
    }
}

impl Entity for Reimbursement {
    type Id = ReimbursementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn return_item_total_excludes_included_tax() {
        let item = return_item(unit(dec!(20), dec!(2), dec!(1)), dec!(20))
            .with_tax_totals(TaxTotals::new(money(dec!(2)), money(dec!(1))));
        assert_eq!(item.checked_total(), Some(money(dec!(22))));
    }

    #[test]
    fn return_item_total_overflow_is_none() {
        let item = return_item(unit(dec!(1), dec!(0), dec!(0)), Decimal::MAX)
            .with_tax_totals(TaxTotals::new(money(dec!(1)), Money::ZERO));
        assert_eq!(item.checked_total(), None);
    }

    #[test]
    fn associations_filter_by_reimbursement_type() {
        let credit = ReimbursementTypeId::new();
        let original = ReimbursementTypeId::new();
        let a = return_item(unit(dec!(10), dec!(1), dec!(0)), dec!(10))
            .with_preferred_reimbursement_type(credit);
        let b = return_item(unit(dec!(10), dec!(1), dec!(0)), dec!(10))
            .with_preferred_reimbursement_type(original);
        let c = return_item(unit(dec!(10), dec!(1), dec!(0)), dec!(10));
        let settlement = Settlement::new(SettlementId::new(), None, money(dec!(5)))
            .with_reimbursement_type(credit);

        let reimbursement = Reimbursement::new(ReimbursementId::new(), "RI000001")
            .with_return_item(a.clone())
            .with_return_item(b)
            .with_return_item(c)
            .with_settlement(settlement.clone());

        assert_eq!(reimbursement.return_items_for(credit), vec![&a]);
        assert_eq!(reimbursement.settlements_for(credit), vec![&settlement]);
        assert!(reimbursement.settlements_for(original).is_empty());
    }

    #[test]
    fn total_adds_settlements_to_item_totals() {
        let reimbursement = Reimbursement::new(ReimbursementId::new(), "RI000002")
            .with_return_item(return_item(unit(dec!(10), dec!(0), dec!(0)), dec!(7.50)))
            .with_settlement(Settlement::new(
                SettlementId::new(),
                Some(shipment(dec!(1), dec!(0))),
                money(dec!(4.25)),
            ));
        assert_eq!(reimbursement.checked_total(), Some(money(dec!(11.75))));
    }

    #[test]
    fn total_overflow_is_none() {
        let reimbursement = Reimbursement::new(ReimbursementId::new(), "RI000003")
            .with_return_item(return_item(unit(dec!(1), dec!(0), dec!(0)), Decimal::MAX))
            .with_settlement(Settlement::new(SettlementId::new(), None, money(dec!(1))));
        assert_eq!(reimbursement.checked_total(), None);
    }

    #[test]
    fn prorate_rounds_each_total() {
        let taxes = TaxTotals::new(money(dec!(1.00)), money(dec!(0.05)));
        let half = taxes.prorate(dec!(0.5), 2).unwrap();
        assert_eq!(half, TaxTotals::new(money(dec!(0.50)), money(dec!(0.03))));
    }
}
