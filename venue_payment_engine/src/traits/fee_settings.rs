use thiserror::Error;

use crate::db_types::{FeePercent, OrgId};

#[derive(Debug, Clone, Error)]
pub enum FeePolicyError {
    #[error("Fee policy unavailable: {0}")]
    Unavailable(String),
    #[error("Stored fee setting is invalid: {0}")]
    InvalidSetting(String),
}

impl From<sqlx::Error> for FeePolicyError {
    fn from(e: sqlx::Error) -> Self {
        FeePolicyError::Unavailable(e.to_string())
    }
}

/// Storage for platform fee settings: an optional per-organization override and the platform-wide default.
#[allow(async_fn_in_trait)]
pub trait FeeSettings: Clone {
    async fn fetch_org_fee_override(&self, org_id: &OrgId) -> Result<Option<FeePercent>, FeePolicyError>;

    /// Sets the override for the organization. `None` removes it, so the platform default applies again.
    async fn set_org_fee_override(&self, org_id: &OrgId, percent: Option<FeePercent>) -> Result<(), FeePolicyError>;

    async fn fetch_platform_fee(&self) -> Result<Option<FeePercent>, FeePolicyError>;

    async fn set_platform_fee(&self, percent: FeePercent) -> Result<(), FeePolicyError>;
}
