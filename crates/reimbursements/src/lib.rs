//! Reimbursement domain module.
//!
//! Prorates tax across partially refunded return items, copies shipment tax
//! onto settlements, and defines the reimbursement types that deliver money
//! back to the customer. Storage is reached only through [`ReimbursementStore`].

pub mod config;
pub mod error;
pub mod model;
pub mod refund_amount;
pub mod reimbursement_type;
pub mod registry;
pub mod store;
pub mod tax_calculator;

pub use config::TaxCalculatorConfig;
pub use error::ReimbursementError;
pub use model::{
    InventoryUnit, InventoryUnitId, Reimbursement, ReimbursementId, ReimbursementTypeId,
    ReturnItem, ReturnItemId, Settlement, SettlementId, Shipment, ShipmentId, TaxTotals,
};
pub use refund_amount::{DefaultRefundAmount, RefundAmountCalculator};
pub use reimbursement_type::{
    Credit, CreditKind, CreditStatus, ORIGINAL, OriginalPayment, ReimbursementType, STORE_CREDIT,
    StoreCredit, UnimplementedReimbursementType,
};
pub use registry::ReimbursementTypeRegistry;
pub use store::{InMemoryReimbursementStore, ReimbursementStore, StoreError};
pub use tax_calculator::{ProratedTaxCalculator, ReimbursementTaxCalculator};
