use crate::db_types::MinorUnits;

/// Percentage part of the processor fee estimate, in tenths of a percent (2.9%).
pub const PROCESSOR_RATE_PER_MILLE: i64 = 29;
/// Fixed part of the processor fee estimate, in minor units.
pub const PROCESSOR_FIXED_FEE: i64 = 30;

/// Estimates the processor fee for a charge as `round(amount * 0.029) + 30`, rounding halves up.
///
/// This is an approximation used only when the processor does not report the fee with the charge. Records carrying
/// this value are marked with [`crate::db_types::FeeSource::Estimated`].
pub fn estimate_processor_fee(amount: MinorUnits) -> MinorUnits {
    let amount = i128::from(amount.value().max(0));
    let variable = (amount * i128::from(PROCESSOR_RATE_PER_MILLE) + 500) / 1000;
    let fee = i64::try_from(variable).unwrap_or(i64::MAX).saturating_add(PROCESSOR_FIXED_FEE);
    MinorUnits::from(fee)
}
