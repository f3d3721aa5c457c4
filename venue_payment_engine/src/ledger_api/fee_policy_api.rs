use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{FeePercent, MinorUnits, OrgId},
    traits::{FeePolicyError, FeeSettings},
};

/// The effective platform fee for an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFee {
    pub percent: FeePercent,
    /// `true` if the percentage is the organization's own override
    pub is_custom: bool,
}

/// `FeePolicyApi` resolves the platform fee for organizations.
///
/// An organization's override takes precedence over the platform setting. If neither exists, the configured default
/// applies. Lookup failures are reported as [`FeePolicyError`]; they never fall back to a zero fee.
#[derive(Clone)]
pub struct FeePolicyApi<B> {
    db: B,
    default_fee: FeePercent,
}

impl<B> Debug for FeePolicyApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FeePolicyApi (default {}%)", self.default_fee)
    }
}

impl<B> FeePolicyApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, default_fee: vpg_common::DEFAULT_PLATFORM_FEE }
    }

    /// Sets the fee used when no platform setting has been stored.
    pub fn with_default_fee(mut self, default_fee: FeePercent) -> Self {
        self.default_fee = default_fee;
        self
    }

    pub fn default_fee(&self) -> FeePercent {
        self.default_fee
    }
}

impl<B> FeePolicyApi<B>
where B: FeeSettings
{
    pub async fn resolve_fee_percent(&self, org_id: &OrgId) -> Result<ResolvedFee, FeePolicyError> {
        if let Some(percent) = self.db.fetch_org_fee_override(org_id).await? {
            trace!("💸️ Org {org_id} has a custom platform fee of {percent}%");
            return Ok(ResolvedFee { percent, is_custom: true });
        }
        let percent = self.db.fetch_platform_fee().await?.unwrap_or(self.default_fee);
        trace!("💸️ Org {org_id} uses the platform fee of {percent}%");
        Ok(ResolvedFee { percent, is_custom: false })
    }

    /// The platform fee on a charge of `amount` for the organization, rounded half up.
    pub async fn compute_fee_amount(&self, org_id: &OrgId, amount: MinorUnits) -> Result<MinorUnits, FeePolicyError> {
        let resolved = self.resolve_fee_percent(org_id).await?;
        Ok(resolved.percent.fee_for(amount))
    }

    pub async fn set_org_fee_override(&self, org_id: &OrgId, percent: Option<FeePercent>) -> Result<(), FeePolicyError> {
        self.db.set_org_fee_override(org_id, percent).await?;
        match percent {
            Some(p) => info!("💸️ Platform fee override for org {org_id} set to {p}%"),
            None => info!("💸️ Platform fee override for org {org_id} removed"),
        }
        Ok(())
    }

    pub async fn set_platform_fee(&self, percent: FeePercent) -> Result<(), FeePolicyError> {
        self.db.set_platform_fee(percent).await?;
        info!("💸️ Platform fee set to {percent}%");
        Ok(())
    }
}
