use sqlx::SqliteConnection;

use crate::{
    db_types::{FeePercent, OrgId},
    traits::FeePolicyError,
};

pub const PLATFORM_FEE_KEY: &str = "platform_fee_percent";

pub async fn fetch_org_override(
    org_id: &OrgId,
    conn: &mut SqliteConnection,
) -> Result<Option<FeePercent>, FeePolicyError> {
    let tenths: Option<i64> = sqlx::query_scalar("SELECT fee_tenths FROM org_fee_overrides WHERE org_id = $1")
        .bind(org_id.as_str())
        .fetch_optional(conn)
        .await?;
    tenths
        .map(|t| FeePercent::from_tenths(t).map_err(|e| FeePolicyError::InvalidSetting(format!("org {org_id}: {e}"))))
        .transpose()
}

pub async fn upsert_org_override(
    org_id: &OrgId,
    percent: FeePercent,
    conn: &mut SqliteConnection,
) -> Result<(), FeePolicyError> {
    sqlx::query(
        r#"
            INSERT INTO org_fee_overrides (org_id, fee_tenths) VALUES ($1, $2)
            ON CONFLICT (org_id) DO UPDATE SET fee_tenths = excluded.fee_tenths, updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(org_id.as_str())
    .bind(percent.tenths())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_org_override(org_id: &OrgId, conn: &mut SqliteConnection) -> Result<(), FeePolicyError> {
    sqlx::query("DELETE FROM org_fee_overrides WHERE org_id = $1").bind(org_id.as_str()).execute(conn).await?;
    Ok(())
}

pub async fn fetch_platform_fee(conn: &mut SqliteConnection) -> Result<Option<FeePercent>, FeePolicyError> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM platform_settings WHERE key = $1")
        .bind(PLATFORM_FEE_KEY)
        .fetch_optional(conn)
        .await?;
    value
        .map(|v| v.parse::<FeePercent>().map_err(|e| FeePolicyError::InvalidSetting(format!("platform fee: {e}"))))
        .transpose()
}

pub async fn upsert_platform_fee(percent: FeePercent, conn: &mut SqliteConnection) -> Result<(), FeePolicyError> {
    sqlx::query(
        r#"
            INSERT INTO platform_settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(PLATFORM_FEE_KEY)
    .bind(percent.to_string())
    .execute(conn)
    .await?;
    Ok(())
}
