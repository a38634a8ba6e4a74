pub mod conversation;
pub mod interview;
pub mod resume;
