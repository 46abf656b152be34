//! Cast a local file to an FCast receiver.
//!
//! A [`MediaServer`] serves the file over HTTP (with byte ranges) and a
//! [`CastNotifier`] tells the receiver where to fetch it from. [`CastSession`]
//! runs both in the right order.

pub mod error;
pub mod hosts;
pub mod media_server;
pub mod notifier;
pub mod request;
pub mod session;

pub use error::{CastError, RequestError, Result, StartupError};
pub use hosts::HostStore;
pub use media_server::{MediaServer, ServeSession};
pub use notifier::CastNotifier;
pub use request::CastRequest;
pub use session::{CastOptions, CastSession};
