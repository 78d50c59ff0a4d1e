//! Unit tests for the session loop.

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use proptest::{
    collection::vec,
    prelude::{Just, Strategy},
    prop_assert,
    prop_oneof,
};
use rstest::rstest;
use serde_json::json;
use streamwire_testing::{LoggerHandle, logger};
use tokio::time::Instant;
use tracing_test::traced_test;

use super::*;
use crate::{
    auth::{AuthError, MockAuthenticator},
    disconnect::LOCAL_ABORT,
    error::StreamError,
    frame::{FrameConfig, FramingError, MIN_RECORD_LENGTH},
    record::{ClassifierConfig, ControlKind, Record},
    recovery::{RecoveryConfig, SessionState, TerminalKind, Termination},
    transport::{
        Flow,
        PreparedRequest,
        RequestHeader,
        ResponseSink,
        StreamRequest,
        Transport,
        TransportError,
        TransportErrorKind,
    },
    test_support::deterministic_runner,
};

/// One scripted response.
struct Step {
    headers: Vec<String>,
    chunks: Vec<Vec<u8>>,
    result: Result<(), TransportError>,
    interrupt: Option<StreamHandle>,
}

impl Step {
    fn status(status: u16) -> Self {
        Self {
            headers: vec![format!("HTTP/1.1 {status} X")],
            chunks: Vec::new(),
            result: Ok(()),
            interrupt: None,
        }
    }

    /// Have `handle` request an abort as the response starts.
    fn interrupted_by(mut self, handle: &StreamHandle) -> Self {
        self.interrupt = Some(handle.clone());
        self
    }

    fn header(mut self, line: &str) -> Self {
        self.headers.push(line.to_owned());
        self
    }

    fn chunk(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.chunks.push(bytes.as_ref().to_vec());
        self
    }

    fn fail(mut self, kind: TransportErrorKind) -> Self {
        self.result = Err(TransportError::new(kind, "scripted"));
        self
    }
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    status: Option<u16>,
    requests: Vec<PreparedRequest>,
}

impl Script {
    fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Transport for Script {
    async fn perform(
        &mut self,
        request: &PreparedRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), TransportError> {
        self.requests.push(request.clone());
        let Some(step) = self.steps.pop_front() else {
            return Err(TransportError::new(
                TransportErrorKind::CouldNotConnect,
                "script exhausted",
            ));
        };
        self.status = step
            .headers
            .first()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok());
        if let Some(handle) = &step.interrupt {
            handle.request_abort(LOCAL_ABORT, "operator stop");
        }
        for line in &step.headers {
            if sink.on_header(line) == Flow::Abort {
                return Err(TransportError::write_aborted());
            }
        }
        for chunk in &step.chunks {
            if sink.on_data(chunk) == Flow::Abort {
                return Err(TransportError::write_aborted());
            }
        }
        step.result
    }

    fn final_status(&self) -> Option<u16> { self.status }
}

fn request() -> StreamRequest {
    StreamRequest::get("http://localhost/1.1/statuses/sample.json")
}

async fn collect(
    client: &mut StreamClient<Script>,
) -> (Result<Termination, StreamError>, Vec<Record>) {
    let mut records = Vec::new();
    let result = client
        .open_stream(request(), |record| records.push(record))
        .await;
    (result, records)
}

#[tokio::test]
async fn split_delimiter_yields_two_records() {
    let mut client = StreamClient::builder().build(Script::new([Step::status(200)
        .chunk("{\"text\":\"a\"}\r")
        .chunk("\n")
        .chunk("{\"text\":\"b\"}\r\n")]));

    let (result, records) = collect(&mut client).await;

    assert_eq!(result.expect("stream ends cleanly"), Termination::EndOfStream);
    assert_eq!(
        records,
        vec![
            Record::Data(json!({"text": "a"})),
            Record::Data(json!({"text": "b"}))
        ]
    );
    let stats = client.handle().stats();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.attempts, 1);
    assert_eq!(
        client.handle().state(),
        SessionState::Terminated(TerminalKind::Success)
    );
}

#[tokio::test(start_paused = true)]
async fn partial_transfer_reconnects_after_linear_backoff() {
    let mut client = StreamClient::builder().build(Script::new([
        Step::status(200)
            .chunk("{\"text\":\"a\"}\r\n{\"text\"")
            .fail(TransportErrorKind::PartialTransfer),
        Step::status(200).chunk("{\"text\":\"b\"}\r\n"),
    ]));

    let start = Instant::now();
    let (result, records) = collect(&mut client).await;

    assert!(result.is_ok());
    assert_eq!(records.len(), 2);
    assert_eq!(start.elapsed(), Duration::from_millis(250));
    assert_eq!(client.handle().stats().retries, 1);
    assert_eq!(client.transport().requests.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn credentials_are_recomputed_for_every_attempt() {
    let mut auth = MockAuthenticator::new();
    auth.expect_sign()
        .times(2)
        .returning(|_| Ok(Some(RequestHeader::new("Authorization", "Bearer t"))));
    let mut client = StreamClient::builder()
        .authenticator(auth)
        .user_agent("tests v0")
        .build(Script::new([
            Step::status(200).fail(TransportErrorKind::TimedOut),
            Step::status(200),
        ]));

    let (result, _) = collect(&mut client).await;

    assert!(result.is_ok());
    for sent in &client.transport().requests {
        assert_eq!(sent.header("authorization"), Some("Bearer t"));
        assert_eq!(sent.header("user-agent"), Some("tests v0"));
    }
}

#[tokio::test]
async fn auth_failure_is_fatal_before_connecting() {
    let mut auth = MockAuthenticator::new();
    auth.expect_sign()
        .times(1)
        .returning(|_| Err(AuthError::MissingCredential("token".to_owned())));
    let mut client = StreamClient::builder()
        .authenticator(auth)
        .build(Script::default());

    let (result, _) = collect(&mut client).await;

    assert!(matches!(result, Err(StreamError::Authentication { .. })));
    assert!(client.transport().requests.is_empty());
}

#[tokio::test(start_paused = true)]
async fn error_body_is_not_dispatched() {
    let mut client = StreamClient::builder().build(Script::new([
        Step::status(503).chunk("{\"text\":\"not a record\"}\r\n"),
        Step::status(200).chunk("{\"text\":\"ok\"}\r\n"),
    ]));

    let start = Instant::now();
    let (result, records) = collect(&mut client).await;

    assert!(result.is_ok());
    assert_eq!(records, vec![Record::Data(json!({"text": "ok"}))]);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test]
async fn fatal_status_carries_error_body() {
    let mut client = StreamClient::builder().build(Script::new([Step::status(401)
        .chunk(r#"{"errors":[{"message":"Unauthorized","code":32}]}"#)]));

    let (result, _) = collect(&mut client).await;

    let Err(StreamError::HttpStatus { source, context }) = result else {
        panic!("expected HTTP status error");
    };
    assert_eq!(source.status, 401);
    assert_eq!(
        source.api_error.map(|api| api.message).as_deref(),
        Some("Unauthorized")
    );
    assert_eq!(context.http_status, Some(401));
}

#[tokio::test]
async fn caller_abort_ends_gracefully() {
    let mut client = StreamClient::builder().build(Script::new([Step::status(200)
        .chunk("{\"text\":\"a\"}\r\n")
        .chunk("{\"text\":\"b\"}\r\n")
        .chunk("{\"text\":\"c\"}\r\n")]));
    let handle = client.handle();

    let mut seen = 0;
    let result = client
        .open_stream(request(), |_| {
            seen += 1;
            handle.request_abort(1001_u16, "enough");
        })
        .await;

    assert_eq!(
        result.expect("cancellation is not an error"),
        Termination::Cancelled(crate::disconnect::DisconnectSignal::new(1001_u16, "enough"))
    );
    assert_eq!(seen, 1);
    assert!(!client.handle().abort_pending());
}

#[rstest]
#[case::fatal_disconnect(
    "{\"disconnect\":{\"code\":2,\"reason\":\"duplicate\"}}\r\n".to_owned(),
    ClassifierConfig::default(),
    FrameConfig::default()
)]
#[case::malformed_run(
    "not json\r\n".to_owned(),
    ClassifierConfig::default().max_consecutive_malformed(0),
    FrameConfig::default()
)]
#[case::oversized_record(
    "x".repeat(MIN_RECORD_LENGTH + 1),
    ClassifierConfig::default(),
    FrameConfig::default().max_record_len(MIN_RECORD_LENGTH)
)]
#[tokio::test]
async fn caller_abort_outranks_failure_in_same_chunk(
    #[case] trailer: String,
    #[case] classifier: ClassifierConfig,
    #[case] frame: FrameConfig,
) {
    let mut client = StreamClient::builder()
        .classifier_config(classifier)
        .frame_config(frame)
        .build(Script::new([
            Step::status(200).chunk(format!("{{\"text\":\"a\"}}\r\n{trailer}"))
        ]));
    let handle = client.handle();

    let result = client
        .open_stream(request(), |_| handle.request_abort(LOCAL_ABORT, "enough"))
        .await;

    match result {
        Ok(Termination::Cancelled(signal)) => assert_eq!(signal.reason, "enough"),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert!(!handle.abort_pending());
}

#[tokio::test]
async fn caller_abort_outranks_error_status() {
    let mut client = StreamClient::builder().build(Script::default());
    let handle = client.handle();
    client.transport_mut().steps.push_back(
        Step::status(401)
            .interrupted_by(&handle)
            .chunk("{\"errors\":[{\"message\":\"nope\",\"code\":32}]}"),
    );

    let (result, records) = collect(&mut client).await;

    match result {
        Ok(Termination::Cancelled(signal)) => assert_eq!(signal.reason, "operator stop"),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert!(records.is_empty());
    assert!(!handle.abort_pending());
}

#[derive(Clone, Copy, Debug)]
enum Trailer {
    Clean,
    FatalDisconnect,
    Malformed,
    Oversized,
}

impl Trailer {
    fn bytes(self) -> Vec<u8> {
        match self {
            Self::Clean => Vec::new(),
            Self::FatalDisconnect => b"{\"disconnect\":{\"code\":7,\"reason\":\"admin\"}}\r\n".to_vec(),
            Self::Malformed => b"[1,\r\n".to_vec(),
            Self::Oversized => vec![b'x'; MIN_RECORD_LENGTH + 1],
        }
    }
}

#[test]
fn caller_abort_always_cancels_whatever_follows() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime builds");
    let mut runner = deterministic_runner(96);
    let trailers = prop_oneof![
        Just(Trailer::Clean),
        Just(Trailer::FatalDisconnect),
        Just(Trailer::Malformed),
        Just(Trailer::Oversized),
    ];
    let strategy = (1_usize..6, trailers, vec(1_usize..16, 1..32))
        .prop_flat_map(|(count, trailer, cuts)| (0..count, Just(count), Just(trailer), Just(cuts)));

    runner
        .run(&strategy, |(abort_at, count, trailer, cuts)| {
            let mut wire = Vec::new();
            for i in 0..count {
                wire.extend_from_slice(format!("{{\"text\":\"{i}\"}}\r\n").as_bytes());
            }
            wire.extend(trailer.bytes());

            let mut step = Step::status(200);
            let mut rest = wire.as_slice();
            let mut cut = cuts.iter().cycle();
            while !rest.is_empty() {
                let n = (*cut.next().unwrap_or(&1)).min(rest.len());
                let (chunk, tail) = rest.split_at(n);
                step = step.chunk(chunk);
                rest = tail;
            }

            let mut client = StreamClient::builder()
                .classifier_config(ClassifierConfig::default().max_consecutive_malformed(0))
                .frame_config(FrameConfig::default().max_record_len(MIN_RECORD_LENGTH))
                .build(Script::new([step]));
            let handle = client.handle();
            let mut seen = 0;
            let result = runtime.block_on(client.open_stream(request(), |_| {
                if seen == abort_at {
                    handle.request_abort(LOCAL_ABORT, "enough");
                }
                seen += 1;
            }));

            prop_assert!(
                matches!(result, Ok(Termination::Cancelled(_))),
                "got {:?}",
                result
            );
            prop_assert!(!handle.abort_pending());
            Ok(())
        })
        .expect("a caller abort always ends the stream gracefully");
}

#[tokio::test]
async fn abort_requested_before_start_skips_connecting() {
    let mut client = StreamClient::builder().build(Script::default());
    client.handle().request_abort(1002_u16, "shutdown");

    let (result, _) = collect(&mut client).await;

    assert!(matches!(result, Ok(Termination::Cancelled(_))));
    assert!(client.transport().requests.is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_disconnect_reconnects() {
    let mut client = StreamClient::builder().build(Script::new([
        Step::status(200)
            .chunk("{\"text\":\"a\"}\r\n{\"disconnect\":{\"code\":12,\"reason\":\"shed\"}}\r\n"),
        Step::status(200).chunk("{\"text\":\"b\"}\r\n"),
    ]));

    let (result, records) = collect(&mut client).await;

    assert!(result.is_ok());
    assert_eq!(records.len(), 3);
    assert_eq!(
        records[1].as_control().map(|c| c.kind().clone()),
        Some(ControlKind::Disconnect)
    );
}

#[tokio::test]
async fn fatal_disconnect_stops() {
    let mut client = StreamClient::builder().build(Script::new([Step::status(200)
        .chunk("{\"disconnect\":{\"code\":2,\"reason\":\"duplicate\"}}\r\n")
        .chunk("{\"text\":\"never\"}\r\n")]));

    let (result, records) = collect(&mut client).await;

    assert!(matches!(result, Err(StreamError::Disconnect { .. })));
    assert_eq!(records.len(), 1);
    assert_eq!(client.transport().requests.len(), 1);
}

#[rstest]
#[tokio::test]
async fn malformed_records_are_dropped_then_fatal(mut logger: LoggerHandle) {
    logger.drain_matching("");
    let mut step = Step::status(200).chunk("{\"text\":\"a\"}\r\n");
    for _ in 0..11 {
        step = step.chunk("not json\r\n");
    }
    let mut client = StreamClient::builder()
        .name("malformed")
        .build(Script::new([step]));

    let (result, records) = collect(&mut client).await;

    assert!(matches!(result, Err(StreamError::MalformedRecords { .. })));
    assert_eq!(records.len(), 1);
    let warnings = logger.drain_matching("malformed dropped malformed record");
    assert_eq!(warnings.len(), 11);
}

#[tokio::test]
async fn unframed_body_fails_with_partial_record() {
    let mut client = StreamClient::builder()
        .frame_config(FrameConfig::default().max_pending_chunks(2))
        .build(Script::new([Step::status(200)
            .chunk("{\"text\":")
            .chunk("\"a\"")
            .chunk("}")]));

    let (result, records) = collect(&mut client).await;

    let err = result.expect_err("overflow is fatal");
    assert!(matches!(err, StreamError::Framing { .. }));
    assert_eq!(&err.partial_record()[..], b"{\"text\":\"a\"}");
    assert!(records.is_empty());
}

#[tokio::test]
async fn record_ahead_of_oversized_tail_is_dispatched() {
    let body = format!("{{\"text\":\"a\"}}\r\n{}", "x".repeat(MIN_RECORD_LENGTH + 1));
    let mut client = StreamClient::builder()
        .frame_config(FrameConfig::default().max_record_len(MIN_RECORD_LENGTH))
        .build(Script::new([Step::status(200).chunk(body)]));

    let (result, records) = collect(&mut client).await;

    let err = result.expect_err("overflow is fatal");
    assert!(matches!(
        err,
        StreamError::Framing {
            source: FramingError::RecordTooLong { .. },
            ..
        }
    ));
    assert_eq!(err.partial_record().len(), MIN_RECORD_LENGTH + 1);
    assert_eq!(records, vec![Record::Data(json!({"text": "a"}))]);
}

#[tokio::test(start_paused = true)]
async fn close_without_data_uses_reconnect_budget() {
    let closing = || Step::status(200).header("Connection: close");
    let mut client = StreamClient::builder().build(Script::new([
        closing(),
        closing(),
        closing(),
        closing(),
    ]));

    let start = Instant::now();
    let (result, _) = collect(&mut client).await;

    assert!(matches!(
        result,
        Err(StreamError::ConnectionClosed { attempts: 4, .. })
    ));
    assert_eq!(start.elapsed(), Duration::from_secs(60));
}

#[tokio::test]
async fn close_after_data_is_end_of_stream() {
    let mut client = StreamClient::builder().build(Script::new([Step::status(200)
        .header("Connection: close")
        .chunk("{\"text\":\"a\"}\r\n")]));

    let (result, _) = collect(&mut client).await;

    assert_eq!(result.expect("clean end"), Termination::EndOfStream);
}

#[tokio::test]
async fn retries_disabled_fails_first_error() {
    let mut client = StreamClient::builder()
        .recovery_config(RecoveryConfig::default().retries(false))
        .build(Script::new([
            Step::status(200).fail(TransportErrorKind::PartialTransfer)
        ]));

    let (result, _) = collect(&mut client).await;

    assert!(matches!(result, Err(StreamError::Transport { .. })));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn retry_is_logged_with_domain(mut logger: LoggerHandle) {
    logger.drain_matching("");
    let mut client = StreamClient::builder().name("sample").build(Script::new([
        Step::status(200).fail(TransportErrorKind::PartialTransfer),
        Step::status(200),
    ]));

    let (result, _) = collect(&mut client).await;
    assert!(result.is_ok());

    let warnings = logger.drain_matching("sample auto-recovering transport error");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].ends_with("retry 1"), "{}", warnings[0]);
}

#[traced_test]
#[tokio::test]
async fn fatal_error_is_traced() {
    let mut client = StreamClient::builder().build(Script::new([
        Step::status(200).fail(TransportErrorKind::CouldNotConnect)
    ]));

    let (result, _) = collect(&mut client).await;
    assert!(result.is_err());

    logs_assert(|lines: &[&str]| {
        lines
            .iter()
            .find(|line| line.contains("stream failed") && line.contains("transport error 7"))
            .map(|_| ())
            .ok_or_else(|| "fatal log not found".to_string())
    });
}

#[tokio::test]
async fn stats_line_is_emitted_every_n_records() {
    let mut client = StreamClient::builder()
        .stats_every(2)
        .build(Script::new([Step::status(200)
            .chunk("{\"text\":\"a\"}\r\n\r\n{\"text\":\"b\"}\r\n")]));

    let (result, _) = collect(&mut client).await;

    assert!(result.is_ok());
    let stats = client.handle().stats();
    assert_eq!(stats.keep_alives, 1);
    assert_eq!(stats.data, 2);
    assert!(stats.to_string().starts_with("|stream|000-00:00:00|1|2|"));
}
