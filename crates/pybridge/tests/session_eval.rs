//! Session lifecycle and evaluation integration tests against a scripted
//! in-process worker.

#[cfg(test)]
mod tests {
    use pybridge::{
        Error, SessionConfig,
        testutils::{
            ScriptTable, StubReply, scripted_session, scripted_session_with_config,
            shutdown_session,
        },
        wire::{RawValue, RemoteFailure},
    };
    use tokio::time::Duration;
    use tracing_subscriber::fmt;

    #[tokio::test]
    async fn ping_and_basic_evaluation() {
        fmt::try_init().ok();

        let script = ScriptTable::new()
            .with_probe()
            .answer("1 + 1", RawValue::Int(2));
        let (session, worker) = scripted_session(script);

        session.ping().await.expect("ping");
        assert_eq!(session.execute("1 + 1").await.unwrap(), RawValue::Int(2));
        assert!(!session.is_closed());

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn remote_failures_keep_the_session_open() {
        let (session, worker) = scripted_session(|code: &str| match code {
            "app.missing" => StubReply::Failure(RemoteFailure {
                kind: "AttributeError".to_string(),
                message: "'App' object has no attribute 'missing'".to_string(),
                traceback: Some("Traceback (most recent call last):\n  ...".to_string()),
            }),
            _ => StubReply::Value(RawValue::Bool(true)),
        });

        let err = session.execute("app.missing").await.unwrap_err();
        match err {
            Error::RemoteEval {
                kind,
                message,
                traceback,
            } => {
                assert_eq!(kind, "AttributeError");
                assert_eq!(message, "'App' object has no attribute 'missing'");
                assert!(traceback.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The failure belongs to that one evaluation: the channel stays up.
        assert!(!session.is_closed());
        assert_eq!(session.execute("True").await.unwrap(), RawValue::Bool(true));

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn type_mismatches_fail_decode() {
        let script = ScriptTable::new()
            .answer("app.name", RawValue::Str("smoke".to_string()));
        let (session, worker) = scripted_session(script);

        let err = session.eval_integer("app.name").await.unwrap_err();
        match err {
            Error::Decode { expected, actual } => {
                assert_eq!(expected, "int");
                assert_eq!(actual, "str");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Decoding happens host-side after the reply is consumed, so the
        // session is still usable.
        assert_eq!(session.eval_string("app.name").await.unwrap(), "smoke");

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn worker_disconnect_closes_the_session() {
        let (session, worker) = scripted_session(|_: &str| StubReply::Disconnect);

        let err = session.execute("True").await.unwrap_err();
        assert!(matches!(err, Error::TransportClosed { .. }), "{err:?}");
        assert!(session.is_closed());

        // Follow-up calls fail immediately with the same classification.
        let err = session.execute("True").await.unwrap_err();
        assert!(matches!(err, Error::TransportClosed { .. }), "{err:?}");

        worker.await.expect("worker task");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn evaluation_timeout_closes_the_session() {
        let config = SessionConfig::default().with_eval_timeout(Duration::from_millis(50));
        let (session, worker) = scripted_session_with_config(|_: &str| StubReply::Silence, config);

        let err = session.execute("app.slow()").await.unwrap_err();
        match err {
            Error::TransportClosed { reason } => {
                assert!(reason.contains("timed out"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(session.is_closed());

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn unknown_reply_ids_are_protocol_violations() {
        let (session, worker) = scripted_session(|_: &str| {
            StubReply::Raw(r#"{"id":999,"value":{"type":"bool","value":true}}"#.to_string())
        });

        let err = session.execute("True").await.unwrap_err();
        match err {
            Error::TransportClosed { reason } => {
                assert!(reason.contains("protocol violation"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(session.is_closed());

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn malformed_frames_close_the_channel() {
        let (session, worker) =
            scripted_session(|_: &str| StubReply::Raw("not json at all".to_string()));

        let err = session.execute("True").await.unwrap_err();
        match err {
            Error::TransportClosed { reason } => {
                assert!(reason.contains("worker channel error"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(session.is_closed());

        shutdown_session(session, worker).await;
    }

    #[tokio::test]
    async fn shutdown_latches_the_closed_state() {
        let (session, worker) = scripted_session(ScriptTable::new().with_probe());

        session.ping().await.expect("ping");
        session.shutdown().await;

        assert!(session.is_closed());
        let err = session.execute("True").await.unwrap_err();
        match err {
            Error::TransportClosed { reason } => {
                assert!(reason.contains("session shut down"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // A second shutdown is a no-op.
        session.shutdown().await;
        worker.await.expect("worker task");
    }
}
