pub mod handlers;
pub mod lifecycle;
pub mod prompts;

pub use lifecycle::CompletionGuard;
