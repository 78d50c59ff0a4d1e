//! End-to-end recovery behaviour of `StreamClient` over a scripted transport.

use std::time::Duration;

use rstest::rstest;
use streamwire::{
    auth::BearerToken,
    disconnect::{DisconnectCode, LOCAL_ABORT},
    error::{DisconnectFailure, StreamError},
    record::{ControlKind, Record},
    recovery::{SessionState, TerminalKind, Termination},
    session::StreamClient,
    transport::{StreamRequest, TransportErrorKind},
};
use streamwire_testing::{Attempt, ScriptedTransport};
use tokio::time::Instant;

mod common;
use common::{TestResult, collect, crlf_records};

fn request() -> StreamRequest {
    StreamRequest::get("https://stream.example.test/1.1/statuses/sample.json")
}

fn texts(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| match record {
            Record::Data(value) => value["text"].as_str().map(str::to_owned),
            Record::Control(_) => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn partial_record_is_discarded_across_transport_retry() -> TestResult {
    let mut client = StreamClient::builder().build(ScriptedTransport::new([
        Attempt::ok(200)
            .chunk(crlf_records(&[r#"{"text":"a"}"#]))
            .chunk(r#"{"text":"b"#)
            .fail(TransportErrorKind::PartialTransfer),
        Attempt::ok(200).chunk(crlf_records(&[r#"{"text":"c"}"#])),
    ]));
    let started = Instant::now();

    let (result, records) = collect(&mut client, request()).await;

    assert_eq!(result?, Termination::EndOfStream);
    assert_eq!(texts(&records), ["a", "c"]);
    assert_eq!(started.elapsed(), Duration::from_millis(250));
    assert_eq!(client.transport().requests().len(), 2);
    assert_eq!(client.handle().stats().retries, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn busy_statuses_back_off_exponentially() -> TestResult {
    let mut client = StreamClient::builder().build(ScriptedTransport::new([
        Attempt::ok(503).chunk("Service Unavailable"),
        Attempt::ok(503),
        Attempt::ok(200).chunk(crlf_records(&[r#"{"text":"up"}"#])),
    ]));
    let started = Instant::now();

    let (result, records) = collect(&mut client, request()).await;

    assert_eq!(result?, Termination::EndOfStream);
    assert_eq!(texts(&records), ["up"]);
    assert_eq!(started.elapsed(), Duration::from_secs(10 + 20));
    let stats = client.handle().stats();
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.retries, 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn every_attempt_carries_credentials_and_user_agent() -> TestResult {
    let mut client = StreamClient::builder()
        .user_agent("probe/1.0")
        .authenticator(BearerToken::new("s3cret")?)
        .build(ScriptedTransport::new([
            Attempt::ok(200).fail(TransportErrorKind::TimedOut),
            Attempt::ok(200),
        ]));

    let (result, _) = collect(&mut client, request()).await;
    result?;

    let requests = client.transport().requests();
    assert_eq!(requests.len(), 2);
    for prepared in requests {
        assert_eq!(prepared.header("authorization"), Some("Bearer s3cret"));
        assert_eq!(prepared.header("User-Agent"), Some("probe/1.0"));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reconnect_request_from_server_is_honoured() -> TestResult {
    let mut client = StreamClient::builder().build(ScriptedTransport::new([
        Attempt::ok(200)
            .chunk(crlf_records(&[r#"{"disconnect":{"code":10,"reason":"duplicate stream"}}"#]))
            .chunk(crlf_records(&[r#"{"text":"never"}"#])),
        Attempt::ok(200).chunk(crlf_records(&[r#"{"text":"again"}"#])),
    ]));

    let (result, records) = collect(&mut client, request()).await;

    assert_eq!(result?, Termination::EndOfStream);
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].as_control().map(|control| control.kind().clone()),
        Some(ControlKind::Disconnect)
    );
    assert_eq!(texts(&records), ["again"]);
    Ok(())
}

#[rstest]
#[case(2, DisconnectFailure::Fatal)]
#[case(6, DisconnectFailure::Unhandled)]
#[tokio::test(start_paused = true)]
async fn terminal_disconnect_codes_fail(
    #[case] code: u16,
    #[case] expected: DisconnectFailure,
) {
    let body = format!("{{\"disconnect\":{{\"code\":{code},\"reason\":\"bye\"}}}}\r\n");
    let mut client =
        StreamClient::builder().build(ScriptedTransport::new([Attempt::ok(200).chunk(body)]));

    let (result, _) = collect(&mut client, request()).await;

    match result {
        Err(StreamError::Disconnect {
            signal, failure, ..
        }) => {
            assert_eq!(signal.code, DisconnectCode::new(code));
            assert_eq!(failure, expected);
        }
        other => panic!("expected disconnect failure, got {other:?}"),
    }
    assert_eq!(
        client.handle().state(),
        SessionState::Terminated(TerminalKind::Fatal)
    );
}

#[tokio::test(start_paused = true)]
async fn abort_during_backoff_cancels_before_reconnecting() -> TestResult {
    let mut client = StreamClient::builder().build(ScriptedTransport::new([
        Attempt::ok(503),
        Attempt::ok(200).chunk(crlf_records(&[r#"{"text":"late"}"#])),
    ]));
    let handle = client.handle();
    let aborter = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.request_abort(LOCAL_ABORT, "operator stop");
    };

    let ((result, records), ()) = tokio::join!(collect(&mut client, request()), aborter);

    match result? {
        Termination::Cancelled(signal) => assert_eq!(signal.reason, "operator stop"),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert!(records.is_empty());
    assert_eq!(client.transport().remaining(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn refused_connection_is_not_retried() {
    let mut client = StreamClient::builder().build(ScriptedTransport::default());

    let (result, records) = collect(&mut client, request()).await;

    assert!(records.is_empty());
    match result {
        Err(err @ StreamError::Transport { .. }) => {
            assert_eq!(err.context().transport_code, Some(7));
            assert_eq!(err.context().http_status, None);
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert_eq!(client.transport().requests().len(), 1);
}
