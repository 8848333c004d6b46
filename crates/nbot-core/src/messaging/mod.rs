//! Bot API port, the update model, and the outbound decorators.

pub mod port;
pub mod retry;
pub mod throttled;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
