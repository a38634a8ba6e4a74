pub mod channel;
pub mod handlers;
