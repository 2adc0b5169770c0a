//! Worker lifecycle and the correlated evaluation channel.

use std::{
    process::Stdio,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader},
    process::{Child, ChildStderr, Command},
    sync::{Mutex, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
};

use crate::{
    codec::EvalCodec,
    config::SessionConfig,
    decode,
    error::{Error, Result},
    handle::{FromHandle, ObjectRef, RemoteEnum},
    wire::{EvalReply, EvalRequest, RawValue},
};

/// Expression used for the startup probe and for [`Session::ping`].
const PROBE_EXPRESSION: &str = "True";

/// Grace period for a worker to exit on EOF before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type BoxedReader = FramedRead<Box<dyn AsyncRead + Send + Unpin>, EvalCodec>;
type BoxedWriter = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, EvalCodec>;

/// State shared between the session and its reader task.
struct Shared {
    /// Pending evaluations waiting for replies, keyed by request id.
    pending: DashMap<u64, oneshot::Sender<EvalReply>>,
    /// Cancelled when the channel is torn down for any reason.
    closed: CancellationToken,
    /// First recorded close reason; later closes keep the original.
    closed_reason: OnceLock<String>,
}

impl Shared {
    /// Mark the session closed and wake every parked caller.
    fn close(&self, reason: String) {
        let _ = self.closed_reason.set(reason);
        self.closed.cancel();
        self.pending.clear();
    }

    fn closed_error(&self) -> Error {
        let reason = self
            .closed_reason
            .get()
            .cloned()
            .unwrap_or_else(|| "session closed".to_string());
        Error::closed(reason)
    }
}

struct SessionInner {
    /// Writer half of the channel. Held across a full round trip, which is
    /// what serializes evaluations: the lock is fair, so queued callers run
    /// in FIFO order and request bytes never interleave.
    writer: Mutex<BoxedWriter>,
    /// Next request id.
    next_id: AtomicU64,
    config: SessionConfig,
    shared: Arc<Shared>,
    /// Worker child process, when this session spawned one.
    child: Mutex<Option<Child>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

/// A live connection to a worker interpreter.
///
/// A session owns the worker process (when it spawned one) and the single
/// evaluation channel. Handles derived from it share the session by cheap
/// clone; the transport outlives every handle. One evaluation is in flight
/// at a time, and a session that loses its worker stays closed: callers get
/// [`Error::TransportClosed`] and are expected to start a fresh session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Spawn a worker process and wait for it to answer a startup probe.
    ///
    /// The command's stdin/stdout are taken over for the evaluation channel
    /// and its stderr is forwarded line by line into host logs. The process
    /// is killed when the session is dropped.
    pub async fn spawn(mut command: Command, config: SessionConfig) -> Result<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|err| Error::startup(format!("failed to spawn worker: {err}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::startup("worker stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::startup("worker stdout unavailable"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        let startup_timeout = config.startup_timeout;
        let session = Self::connect(Box::new(stdout), Box::new(stdin), config, Some(child));

        match timeout(startup_timeout, session.execute(PROBE_EXPRESSION)).await {
            Ok(Ok(RawValue::Bool(true))) => {
                tracing::info!("Worker ready");
                Ok(session)
            }
            Ok(Ok(other)) => Err(Error::startup(format!(
                "unexpected startup probe reply: {} payload",
                other.tag()
            ))),
            Ok(Err(err)) => Err(Error::startup(format!(
                "worker failed its startup probe: {err}"
            ))),
            Err(_) => {
                session.reap().await;
                Err(Error::startup(format!(
                    "worker did not answer within {startup_timeout:?}"
                )))
            }
        }
    }

    /// Attach to an already-running interpreter over an arbitrary byte
    /// stream pair. No probe is sent; call [`Session::ping`] to verify the
    /// peer speaks the protocol.
    pub fn connect_stream<R, W>(reader: R, writer: W, config: SessionConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::connect(Box::new(reader), Box::new(writer), config, None)
    }

    fn connect(
        reader: Box<dyn AsyncRead + Send + Unpin>,
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        config: SessionConfig,
        child: Option<Child>,
    ) -> Self {
        let shared = Arc::new(Shared {
            pending: DashMap::new(),
            closed: CancellationToken::new(),
            closed_reason: OnceLock::new(),
        });

        let replies = FramedRead::new(reader, EvalCodec::new());
        let reader_task = tokio::spawn(read_replies(replies, Arc::clone(&shared)));

        Self {
            inner: Arc::new(SessionInner {
                writer: Mutex::new(FramedWrite::new(writer, EvalCodec::new())),
                next_id: AtomicU64::new(1),
                config,
                shared,
                child: Mutex::new(child),
                reader: Mutex::new(Some(reader_task)),
            }),
        }
    }

    /// Evaluate one expression or statement in the worker and return its
    /// tagged payload.
    ///
    /// Remote exceptions come back as [`Error::RemoteEval`] and leave the
    /// session usable. Transport failures and timeouts close the session
    /// for good.
    pub async fn execute(&self, code: &str) -> Result<RawValue> {
        self.ensure_open()?;
        let mut writer = self.inner.writer.lock().await;
        // the channel may have died while this caller was queued
        self.ensure_open()?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.shared.pending.insert(id, reply_tx);

        tracing::debug!("Sending evaluation {}: {}", id, code);
        let request = EvalRequest {
            id,
            code: code.to_string(),
        };
        if let Err(err) = writer.send(request).await {
            self.inner.shared.pending.remove(&id);
            self.inner.shared.close(format!("write failed: {err}"));
            self.reap().await;
            return Err(self.inner.shared.closed_error());
        }

        let eval_timeout = self.inner.config.eval_timeout;
        tokio::select! {
            biased;

            () = self.inner.shared.closed.cancelled() => {
                self.inner.shared.pending.remove(&id);
                Err(self.inner.shared.closed_error())
            }

            result = timeout(eval_timeout, reply_rx) => match result {
                Ok(Ok(reply)) => reply.into_result(),
                Ok(Err(_recv_error)) => Err(self.inner.shared.closed_error()),
                Err(_elapsed) => {
                    self.inner.shared.pending.remove(&id);
                    tracing::warn!("Evaluation {} timed out after {:?}", id, eval_timeout);
                    self.inner.shared.close(format!(
                        "evaluation {id} timed out after {eval_timeout:?}"
                    ));
                    self.reap().await;
                    Err(self.inner.shared.closed_error())
                }
            },
        }
    }

    /// Health probe: a trivial evaluation round trip.
    pub async fn ping(&self) -> Result<()> {
        let payload = self.execute(PROBE_EXPRESSION).await?;
        decode::decode_scalar::<bool>(&payload).map(|_| ())
    }

    /// Whether the session has been closed by shutdown or failure.
    pub fn is_closed(&self) -> bool {
        self.inner.shared.closed.is_cancelled()
    }

    /// Handle for an arbitrary expression against the worker's global scope.
    ///
    /// The expression is checked for syntactic shape only.
    pub fn root(&self, expression: &str) -> Result<ObjectRef> {
        ObjectRef::new(self.clone(), expression)
    }

    /// Handle for a module-scope object by name.
    pub fn global(&self, name: &str) -> Result<ObjectRef> {
        self.root(name)
    }

    /// Close the session and reap the worker.
    ///
    /// The channel is torn down first so queued callers fail fast, then the
    /// worker gets a short grace period to exit on EOF before it is killed.
    /// Dropping the session without calling this still kills the worker.
    pub async fn shutdown(&self) {
        self.inner.shared.close("session shut down".to_string());

        let mut writer = self.inner.writer.lock().await;
        if let Err(err) = writer.close().await {
            tracing::debug!("Closing worker stdin failed: {}", err);
        }
        drop(writer);

        let child = self.inner.child.lock().await.take();
        if let Some(mut child) = child {
            match timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => tracing::info!("Worker exited with {}", status),
                Ok(Err(err)) => tracing::warn!("Waiting for worker failed: {}", err),
                Err(_) => {
                    tracing::warn!("Worker did not exit in time, killing");
                    if let Err(err) = child.kill().await {
                        tracing::warn!("Killing worker failed: {}", err);
                    }
                }
            }
        }

        let reader = self.inner.reader.lock().await.take();
        if let Some(mut handle) = reader {
            if timeout(Duration::from_millis(100), &mut handle).await.is_err() {
                handle.abort();
            }
        }
    }

    // Typed evaluation of whole expressions. The handle accessors compose
    // their expression and delegate here.

    /// Evaluate an expression expected to yield a bool.
    pub async fn eval_bool(&self, code: &str) -> Result<bool> {
        decode::decode_scalar(&self.execute(code).await?)
    }

    /// Evaluate an expression expected to yield an integer.
    pub async fn eval_integer(&self, code: &str) -> Result<i64> {
        decode::decode_scalar(&self.execute(code).await?)
    }

    /// Evaluate an expression expected to yield a float.
    pub async fn eval_float(&self, code: &str) -> Result<f64> {
        decode::decode_scalar(&self.execute(code).await?)
    }

    /// Evaluate an expression expected to yield a string.
    pub async fn eval_string(&self, code: &str) -> Result<String> {
        decode::decode_scalar(&self.execute(code).await?)
    }

    /// Evaluate an expression expected to yield an enum literal.
    pub async fn eval_enum<E: RemoteEnum>(&self, code: &str) -> Result<E> {
        decode::decode_enum(&self.execute(code).await?)
    }

    /// Evaluate an expression expected to yield a set of enum literals.
    pub async fn eval_enum_set<E: RemoteEnum>(&self, code: &str) -> Result<Vec<E>> {
        decode::decode_enum_set(&self.execute(code).await?)
    }

    /// Evaluate an expression expected to yield a fixed-length array.
    pub async fn eval_array<T: decode::FromPayload>(
        &self,
        code: &str,
        len: usize,
    ) -> Result<Vec<T>> {
        decode::decode_array(&self.execute(code).await?, len)
    }

    /// Evaluate an expression expected to yield a row-major matrix.
    pub async fn eval_matrix<T: decode::FromPayload>(
        &self,
        code: &str,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<T>>> {
        decode::decode_matrix(&self.execute(code).await?, rows, cols)
    }

    /// Evaluate an expression expected to yield an object reference, wrapped
    /// into a typed handle.
    pub async fn eval_class<T: FromHandle>(&self, code: &str) -> Result<T> {
        let path = decode::decode_ref(&self.execute(code).await?)?;
        Ok(T::from_handle(ObjectRef::from_parts(self.clone(), path)))
    }

    /// Evaluate a statement expected to yield nothing.
    pub async fn eval_void(&self, code: &str) -> Result<()> {
        decode::decode_void(&self.execute(code).await?)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.shared.closed.is_cancelled() {
            Err(self.inner.shared.closed_error())
        } else {
            Ok(())
        }
    }

    /// Kill the worker without waiting, keeping whatever close reason was
    /// recorded first.
    async fn reap(&self) {
        if let Some(child) = self.inner.child.lock().await.as_mut() {
            if let Err(err) = child.start_kill() {
                tracing::debug!("Killing worker failed: {}", err);
            }
        }
    }
}

/// Reader task: routes correlated replies to their parked callers and turns
/// stream failure into a closed session.
async fn read_replies(mut replies: BoxedReader, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            biased;

            () = shared.closed.cancelled() => break,

            frame = replies.next() => match frame {
                Some(Ok(reply)) => {
                    let id = reply.id();
                    match shared.pending.remove(&id) {
                        Some((_, reply_tx)) => {
                            if reply_tx.send(reply).is_err() {
                                tracing::debug!("Reply receiver dropped for evaluation {}", id);
                            }
                        }
                        None => {
                            tracing::warn!("Reply for unknown evaluation id {}", id);
                            shared.close(format!(
                                "protocol violation: reply for unknown evaluation id {id}"
                            ));
                            break;
                        }
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!("Worker channel error: {}", err);
                    shared.close(format!("worker channel error: {err}"));
                    break;
                }
                None => {
                    tracing::info!("Worker closed its output");
                    shared.close("worker closed its output".to_string());
                    break;
                }
            },
        }
    }
}

/// Forward worker stderr into host logs, line by line.
async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!("Worker stderr: {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_shared() -> Shared {
        Shared {
            pending: DashMap::new(),
            closed: CancellationToken::new(),
            closed_reason: OnceLock::new(),
        }
    }

    #[test]
    fn first_close_reason_is_latched() {
        let shared = fresh_shared();
        shared.close("worker closed its output".to_string());
        shared.close("session shut down".to_string());

        match shared.closed_error() {
            Error::TransportClosed { reason } => {
                assert_eq!(reason, "worker closed its output");
            }
            err => panic!("unexpected error: {err:?}"),
        }
        assert!(shared.closed.is_cancelled());
    }

    #[test]
    fn close_drops_every_pending_slot() {
        let shared = fresh_shared();
        let (reply_tx, mut reply_rx) = oneshot::channel();
        shared.pending.insert(7, reply_tx);

        shared.close("write failed: broken pipe".to_string());

        assert!(shared.pending.is_empty());
        assert!(reply_rx.try_recv().is_err());
    }
}
