//! Client side of the streaming chat channel.
//!
//! `ChatSession` owns the local transcript of one conversation, sends turns
//! over a `ChatTransport` and publishes every change as a `SessionSnapshot`
//! on a watch channel.

pub mod error;
pub mod session;
pub mod transport;

pub use error::ClientError;
pub use session::{ChatSession, SessionSnapshot};
pub use transport::{ByteStream, ChatTransport, HttpTransport};
