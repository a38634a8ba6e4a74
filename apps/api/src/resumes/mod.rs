pub mod analysis;
pub mod archive;
pub mod extract;
pub mod handlers;
pub mod prompts;

pub use archive::ResumeArchive;
