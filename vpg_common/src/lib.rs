mod fee_percent;
mod helpers;
mod minor_units;

pub mod op;
mod secret;

pub use fee_percent::{FeePercent, FeePercentError, DEFAULT_PLATFORM_FEE};
pub use helpers::parse_boolean_flag;
pub use minor_units::{MinorUnits, MinorUnitsConversionError};
pub use secret::Secret;
