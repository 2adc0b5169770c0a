//! Test utilities for `pybridge`.
//!
//! This module collects the helper types and functions used when writing unit
//! and integration tests against this crate. Everything lives behind the
//! `testutils` module so the public API surface stays clean while the helpers
//! remain available to *external* test crates via
//! `use pybridge::testutils::*`.
//!
//! The centerpiece is the scripted worker: an in-process task that speaks the
//! worker side of the wire protocol over an in-memory duplex stream, answering
//! each evaluation from a [`RemoteStub`]. Tests script the remote interpreter
//! instead of spawning one, which keeps them fast, hermetic, and able to
//! exercise failure modes (silence, malformed frames, sudden disconnects) that
//! a real interpreter would not produce on demand.

use std::collections::HashMap;

use tokio::{
    io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    task::JoinHandle,
    time::{Duration, timeout},
};

use crate::{
    Session, SessionConfig,
    wire::{EvalErrorReply, EvalRequest, EvalValueReply, RawValue, RemoteFailure},
};

/// Create **two** independent in-memory duplex pipes that together form a
/// bidirectional channel between a test session and its worker.
///
/// The first two elements go to the session (`reader`, `writer`), the
/// remaining pair to the worker. The concrete stream types are hidden behind
/// `impl Trait` so callers don't have to rely on the *exact* type
/// (`tokio::io::DuplexStream`).
pub fn make_duplex_pair() -> (
    impl AsyncRead + Send + Sync + Unpin + 'static,
    impl AsyncWrite + Send + Sync + Unpin + 'static,
    impl AsyncRead + Send + Sync + Unpin + 'static,
    impl AsyncWrite + Send + Sync + Unpin + 'static,
) {
    // 8 KiB buffer on each side, more than enough for the small test frames.
    let (host_reader, worker_writer) = io::duplex(8 * 1024);
    let (worker_reader, host_writer) = io::duplex(8 * 1024);
    (host_reader, host_writer, worker_reader, worker_writer)
}

/// What the scripted worker does with one evaluation request.
#[derive(Debug, Clone)]
pub enum StubReply {
    /// Answer with a tagged value payload.
    Value(RawValue),
    /// Answer with a remote failure.
    Failure(RemoteFailure),
    /// Write this exact line instead of a well-formed reply.
    Raw(String),
    /// Never answer. The request stays pending until the host times out.
    Silence,
    /// Drop the connection without answering.
    Disconnect,
}

impl StubReply {
    /// A failure reply with the given kind and message and no traceback.
    pub fn failure(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure(RemoteFailure {
            kind: kind.into(),
            message: message.into(),
            traceback: None,
        })
    }
}

/// Scripted behavior of an in-process worker.
///
/// Implemented for any `FnMut(&str) -> StubReply` closure, so most tests can
/// write the script inline:
///
/// ```ignore
/// let (session, worker) = scripted_session(|code: &str| match code {
///     "True" => StubReply::Value(RawValue::Bool(true)),
///     other => StubReply::failure("NameError", format!("name {other:?} is not defined")),
/// });
/// ```
pub trait RemoteStub: Send + 'static {
    /// Decide the reply for one evaluated expression.
    fn evaluate(&mut self, code: &str) -> StubReply;
}

impl<F> RemoteStub for F
where
    F: FnMut(&str) -> StubReply + Send + 'static,
{
    fn evaluate(&mut self, code: &str) -> StubReply {
        self(code)
    }
}

/// Order-independent stub: a fixed table of expression -> payload answers.
///
/// Unknown expressions come back as a `ScriptError` failure naming the
/// expression, which makes a diverging test fail with the offending code in
/// the error message rather than hang.
#[derive(Debug, Clone, Default)]
pub struct ScriptTable {
    answers: HashMap<String, RawValue>,
}

impl ScriptTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an answer for an exact expression.
    pub fn answer(mut self, code: impl Into<String>, value: RawValue) -> Self {
        self.answers.insert(code.into(), value);
        self
    }

    /// Script `True` -> `Bool(true)`, the startup probe and ping expression.
    pub fn with_probe(self) -> Self {
        self.answer("True", RawValue::Bool(true))
    }
}

impl RemoteStub for ScriptTable {
    fn evaluate(&mut self, code: &str) -> StubReply {
        match self.answers.get(code) {
            Some(value) => StubReply::Value(value.clone()),
            None => StubReply::failure("ScriptError", format!("no scripted answer for {code:?}")),
        }
    }
}

/// Run a scripted worker over the given streams.
///
/// The worker reads newline-delimited requests, consults the stub for each,
/// and writes the reply. It exits on end of input, on a malformed request, or
/// when the stub says [`StubReply::Disconnect`].
pub fn spawn_worker<R, W, S>(reader: R, writer: W, mut stub: S) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
    S: RemoteStub,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut writer = writer;
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(request) = serde_json::from_str::<EvalRequest>(&line) else {
                break;
            };
            let reply = match stub.evaluate(&request.code) {
                StubReply::Value(value) => serde_json::to_string(&EvalValueReply {
                    id: request.id,
                    value,
                }),
                StubReply::Failure(error) => serde_json::to_string(&EvalErrorReply {
                    id: request.id,
                    error,
                }),
                StubReply::Raw(raw) => Ok(raw),
                StubReply::Silence => continue,
                StubReply::Disconnect => break,
            };
            let Ok(reply) = reply else { break };
            if send_line(&mut writer, reply).await.is_err() {
                break;
            }
        }
    })
}

/// Connect a [`Session`] to a freshly spawned scripted worker using default
/// configuration.
pub fn scripted_session<S: RemoteStub>(stub: S) -> (Session, JoinHandle<()>) {
    scripted_session_with_config(stub, SessionConfig::default())
}

/// Connect a [`Session`] to a freshly spawned scripted worker, with control
/// over timeouts. Tests that exercise the evaluation deadline pass a config
/// with a short `eval_timeout` here.
pub fn scripted_session_with_config<S: RemoteStub>(
    stub: S,
    config: SessionConfig,
) -> (Session, JoinHandle<()>) {
    let (host_reader, host_writer, worker_reader, worker_writer) = make_duplex_pair();
    let worker = spawn_worker(worker_reader, worker_writer, stub);
    let session = Session::connect_stream(host_reader, host_writer, config);
    (session, worker)
}

/// Gracefully tear down a session and its scripted worker. The session is
/// shut down first so the worker sees end of input; the short timeout keeps a
/// wedged worker from hanging the test.
pub async fn shutdown_session(session: Session, worker: JoinHandle<()>) {
    session.shutdown().await;
    timeout(Duration::from_millis(50), worker).await.ok();
}

async fn send_line<W>(writer: &mut W, mut line: String) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
