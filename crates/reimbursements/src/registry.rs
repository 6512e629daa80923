//! Named reimbursement type registry.
//!
//! Names are unique ignoring case and are what upstream configuration uses
//! to pick a type. Return items and settlements refer to types by id.

use std::collections::BTreeMap;
use std::sync::Arc;

use storefront_core::{DomainError, DomainResult};
use tracing::{debug, info};

use crate::error::ReimbursementError;
use crate::model::{Reimbursement, ReimbursementTypeId, ReturnItem};
use crate::reimbursement_type::{
    Credit, ORIGINAL, ReimbursementType, UnimplementedReimbursementType,
};

#[derive(Debug, Clone)]
struct Entry {
    id: ReimbursementTypeId,
    strategy: Arc<dyn ReimbursementType>,
    active: bool,
}

#[derive(Debug, Default)]
pub struct ReimbursementTypeRegistry {
    /// Keyed by lowercased name; iteration order is name order.
    entries: BTreeMap<String, Entry>,
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ReimbursementTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active type under its own name.
    pub fn register(
        &mut self,
        strategy: Arc<dyn ReimbursementType>,
    ) -> DomainResult<ReimbursementTypeId> {
        let name = strategy.name();
        if name.trim().is_empty() {
            return Err(DomainError::validation("reimbursement type name must not be blank"));
        }
        let key = key(name);
        if self.entries.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "reimbursement type `{name}` is already registered"
            )));
        }

        let id = ReimbursementTypeId::new();
        info!(reimbursement_type = name, %id, "reimbursement type registered");
        self.entries.insert(
            key,
            Entry {
                id,
                strategy,
                active: true,
            },
        );
        Ok(id)
    }

    /// Register a type that exists in configuration but has no strategy.
    pub fn register_unimplemented(
        &mut self,
        name: impl Into<String>,
    ) -> DomainResult<ReimbursementTypeId> {
        self.register(Arc::new(UnimplementedReimbursementType::new(name)))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ReimbursementType>> {
        self.entries.get(&key(name)).map(|e| e.strategy.clone())
    }

    pub fn id_of(&self, name: &str) -> Option<ReimbursementTypeId> {
        self.entries.get(&key(name)).map(|e| e.id)
    }

    pub fn find(&self, id: ReimbursementTypeId) -> Option<Arc<dyn ReimbursementType>> {
        self.entry_by_id(id).map(|e| e.strategy.clone())
    }

    /// Active types, ordered by name.
    pub fn active(&self) -> Vec<Arc<dyn ReimbursementType>> {
        self.entries
            .values()
            .filter(|e| e.active)
            .map(|e| e.strategy.clone())
            .collect()
    }

    pub fn deactivate(&mut self, name: &str) -> DomainResult<()> {
        let entry = self
            .entries
            .get_mut(&key(name))
            .ok_or_else(|| DomainError::not_found(format!("reimbursement type `{name}`")))?;
        entry.active = false;
        info!(reimbursement_type = name, "reimbursement type deactivated");
        Ok(())
    }

    fn entry_by_id(&self, id: ReimbursementTypeId) -> Option<&Entry> {
        self.entries.values().find(|e| e.id == id)
    }

    fn active_entry(&self, name: &str) -> Result<&Entry, ReimbursementError> {
        let entry = self
            .entries
            .get(&key(name))
            .ok_or_else(|| DomainError::not_found(format!("reimbursement type `{name}`")))?;
        if !entry.active {
            return Err(DomainError::invariant(format!(
                "reimbursement type `{name}` is inactive"
            ))
            .into());
        }
        Ok(entry)
    }

    /// Reimburse `return_items` through the named, active type.
    pub fn reimburse(
        &self,
        name: &str,
        reimbursement: &Reimbursement,
        return_items: &[ReturnItem],
        simulate: bool,
    ) -> Result<Vec<Credit>, ReimbursementError> {
        let entry = self.active_entry(name)?;
        debug!(reimbursement_type = name, simulate, "dispatching reimbursement");
        entry.strategy.reimburse(reimbursement, return_items, simulate)
    }

    /// Reimburse every return item through its preferred type.
    ///
    /// Items without a preference go through [`ORIGINAL`]. Types are invoked
    /// in name order, each with its items in reimbursement order.
    pub fn perform(
        &self,
        reimbursement: &Reimbursement,
        simulate: bool,
    ) -> Result<Vec<Credit>, ReimbursementError> {
        let mut groups: BTreeMap<String, Vec<ReturnItem>> = BTreeMap::new();
        for item in reimbursement.return_items() {
            let entry = match item.preferred_reimbursement_type() {
                Some(id) => self.entry_by_id(id).ok_or_else(|| {
                    DomainError::not_found(format!("reimbursement type {id}"))
                })?,
                None => self.active_entry(ORIGINAL)?,
            };
            groups
                .entry(entry.strategy.name().to_string())
                .or_default()
                .push(item.clone());
        }

        let mut credits = Vec::new();
        for (name, items) in &groups {
            credits.extend(self.reimburse(name, reimbursement, items, simulate)?);
        }
        Ok(credits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use crate::model::ReimbursementId;
    use crate::reimbursement_type::{CreditKind, OriginalPayment, STORE_CREDIT, StoreCredit};
    use crate::store::InMemoryReimbursementStore;
    use rust_decimal_macros::dec;

    fn registry() -> (ReimbursementTypeRegistry, Arc<InMemoryReimbursementStore>) {
        let store = InMemoryReimbursementStore::arc();
        let mut registry = ReimbursementTypeRegistry::new();
        registry
            .register(Arc::new(OriginalPayment::new(store.clone())))
            .unwrap();
        registry
            .register(Arc::new(StoreCredit::new(store.clone())))
            .unwrap();
        (registry, store)
    }

    #[test]
    fn names_are_unique_ignoring_case() {
        let (mut registry, _) = registry();
        let err = registry.register_unimplemented("Original").unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut registry = ReimbursementTypeRegistry::new();
        let err = registry.register_unimplemented("  ").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lookup_by_name_and_id() {
        let (registry, _) = registry();
        let id = registry.id_of("STORE_CREDIT").unwrap();
        assert_eq!(registry.find(id).unwrap().name(), STORE_CREDIT);
        assert_eq!(registry.get("original").unwrap().name(), ORIGINAL);
        assert!(registry.get("exchange").is_none());
    }

    #[test]
    fn active_lists_in_name_order_and_honours_deactivation() {
        let (mut registry, _) = registry();
        registry.register_unimplemented("exchange").unwrap();
        let names: Vec<String> = registry
            .active()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["exchange", ORIGINAL, STORE_CREDIT]);

        registry.deactivate("exchange").unwrap();
        assert_eq!(registry.active().len(), 2);
        assert!(matches!(
            registry.deactivate("missing").unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[test]
    fn inactive_types_cannot_reimburse() {
        let (mut registry, _) = registry();
        registry.deactivate(STORE_CREDIT).unwrap();
        let reimbursement = Reimbursement::new(ReimbursementId::new(), "RI300");
        let err = registry
            .reimburse(STORE_CREDIT, &reimbursement, &[], true)
            .unwrap_err();
        assert!(matches!(
            err,
            ReimbursementError::Domain(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn unimplemented_type_fails_through_registry() {
        let mut registry = ReimbursementTypeRegistry::new();
        registry.register_unimplemented("exchange").unwrap();
        let reimbursement = Reimbursement::new(ReimbursementId::new(), "RI301");
        let err = registry
            .reimburse("exchange", &reimbursement, &[], false)
            .unwrap_err();
        assert_eq!(
            err,
            ReimbursementError::UnimplementedStrategy("exchange".to_string())
        );
    }

    #[test]
    fn perform_groups_items_by_preferred_type() {
        let (registry, store) = registry();
        let credit_id = registry.id_of(STORE_CREDIT).unwrap();
        let reimbursement = Reimbursement::new(ReimbursementId::new(), "RI302")
            .with_return_item(return_item(unit(dec!(10), dec!(0), dec!(0)), dec!(10)))
            .with_return_item(
                return_item(unit(dec!(4), dec!(0), dec!(0)), dec!(4))
                    .with_preferred_reimbursement_type(credit_id),
            )
            .with_return_item(return_item(unit(dec!(6), dec!(0), dec!(0)), dec!(6)));

        let credits = registry.perform(&reimbursement, false).unwrap();

        assert_eq!(credits.len(), 2);
        assert_eq!(credits[0].kind, CreditKind::Refund);
        assert_eq!(credits[0].amount, money(dec!(16)));
        assert_eq!(credits[1].kind, CreditKind::StoreCredit);
        assert_eq!(credits[1].amount, money(dec!(4)));
        assert_eq!(store.credits().len(), 2);
    }

    #[test]
    fn perform_rejects_unknown_preference() {
        let (registry, _) = registry();
        let reimbursement = Reimbursement::new(ReimbursementId::new(), "RI303").with_return_item(
            return_item(unit(dec!(1), dec!(0), dec!(0)), dec!(1))
                .with_preferred_reimbursement_type(ReimbursementTypeId::new()),
        );
        let err = registry.perform(&reimbursement, true).unwrap_err();
        assert!(matches!(err, ReimbursementError::Domain(DomainError::NotFound(_))));
    }
}
