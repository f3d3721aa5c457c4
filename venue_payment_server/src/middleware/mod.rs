mod operator;
mod signature;

pub use operator::{OperatorAuthFactory, OperatorAuthService};
pub use signature::{SignatureMiddlewareFactory, SignatureMiddlewareService, SIGNATURE_HEADER};
