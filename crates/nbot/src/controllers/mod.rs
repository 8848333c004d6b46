//! Feature controllers. Each one is built by a container factory and attaches
//! its handlers in `register()`.

pub mod chats;
pub mod neuro;
pub mod random;

pub use chats::ChatsController;
pub use neuro::NeuroController;
pub use random::RandomController;
