mod helpers;
mod mocks;
mod operator;
mod refunds;
mod webhooks;
