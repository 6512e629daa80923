//! Tax calculator configuration.

use tracing::warn;

/// Environment variable overriding [`TaxCalculatorConfig::scale`].
pub const TAX_SCALE_ENV: &str = "REIMBURSEMENT_TAX_SCALE";

/// `rust_decimal` cannot represent more fractional digits than this.
const MAX_SCALE: u32 = 28;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TaxCalculatorConfig {
    /// Fractional digits kept on prorated tax totals (the currency column's scale).
    pub scale: u32,
}

impl Default for TaxCalculatorConfig {
    fn default() -> Self {
        Self { scale: 2 }
    }
}

impl TaxCalculatorConfig {
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale.min(MAX_SCALE);
        self
    }

    /// Load from `REIMBURSEMENT_TAX_SCALE`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(TAX_SCALE_ENV).ok().as_deref())
    }

    fn from_env_value(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        match raw.trim().parse::<u32>() {
            Ok(scale) if scale <= MAX_SCALE => Self::default().with_scale(scale),
            _ => {
                warn!(value = raw, "{TAX_SCALE_ENV} is not a valid scale; using default");
                Self::default()
            }
        }
    }
}
