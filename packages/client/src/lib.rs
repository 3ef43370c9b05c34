//! Session command multiplexer for a headless world host.
//!
//! One WebSocket command/control channel to the host backend is shared by
//! periodic polling, operator actions and streamed console output. The
//! [`session::Session`] ties the pieces together:
//!
//! - [`transport`]: persistent connection with fixed-delay reconnect
//! - [`dispatcher`]: decoding and routing of inbound frames
//! - [`scheduler`]: one replaceable timer per poll purpose
//! - [`executor`]: focus-serialized operator actions
//! - [`reconciler`]: pure view updates with the local denied list

pub mod admin_http;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod executor;
pub mod protocol;
pub mod reconciler;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod transport;
