//! # pybridge
//!
//! A typed remote-object proxy for driving a long-lived embedded Python
//! interpreter from Rust, over a line-delimited subprocess bridge.
//!
//! ## Overview
//!
//! pybridge talks to a worker script running inside a host application's
//! embedded interpreter. The session sends one expression at a time and
//! receives a payload from a small closed set of tagged values. Complex
//! objects never cross the wire: they stay inside the interpreter and are
//! referenced by accessor-path handles that compose locally, so navigating
//! an object graph costs no round trips until a value is actually read.
//!
//! ## Features
//!
//! - **Correlated transport**: a single worker subprocess per session,
//!   strictly sequential evaluations, and typed failures for startup,
//!   transport loss, and remote exceptions
//! - **Strict payload codec**: a closed tagged-value set with no implicit
//!   coercions
//! - **Remote handles**: expression-path object references with structural
//!   equality and pure-local composition
//! - **Collection proxies**: sequence, mapping, and domain-method views of
//!   one remote object behind a fixed resolution order

/// Newline-delimited JSON framing for the worker stream.
mod codec;
/// Collection proxies and the access resolution chain.
mod collection;
/// Session tuning knobs.
mod config;
/// Strict payload decoding into host types.
mod decode;
/// Python source rendering for literals, calls, and assignments.
mod encode;
/// Error types and Result alias.
mod error;
/// Remote object handles and the typed accessor surface.
mod handle;
/// Worker lifecycle and the correlated evaluation transport.
mod session;

pub mod testutils;
/// Public wire message and payload definitions.
pub mod wire;

pub use collection::{Collection, GenericOp, ItemKey, OpFuture, Resolution, SpecializedTable};
pub use config::SessionConfig;
pub use decode::FromPayload;
pub use encode::{CallArgs, PyLiteral};
pub use error::{Error, Result};
pub use handle::{FromHandle, ObjectRef, RemoteEnum};
pub use session::Session;
