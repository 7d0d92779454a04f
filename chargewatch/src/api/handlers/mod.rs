pub mod status;
pub mod webhooks;
