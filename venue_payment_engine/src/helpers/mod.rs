mod processor_fee;
mod time;

pub use processor_fee::{estimate_processor_fee, PROCESSOR_FIXED_FEE, PROCESSOR_RATE_PER_MILLE};
pub use time::{lease_expiry_ms, now_ms};
