//! The streaming client and its reconnect loop.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{Instrument, debug_span, info_span};

use super::{
    StreamHandle,
    handle::SessionShared,
    sink::{AttemptReport, AttemptSink},
};
use crate::{
    auth::{AuthError, Authenticator, NoAuth},
    error::{FailureContext, HttpStatusError, StreamError},
    frame::{FrameConfig, FrameReassembler},
    metrics,
    record::{ClassifierConfig, Record, RecordClassifier},
    recovery::{Outcome, RecoveryConfig, RecoveryMachine, Termination},
    transport::{PreparedRequest, RequestHeader, StreamRequest, Transport, TransportError},
};

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("streamwire v", env!("CARGO_PKG_VERSION"));

/// Consumes a push stream, reconnecting according to its
/// [`RecoveryConfig`].
///
/// # Examples
///
/// ```
/// use streamwire::{
///     recovery::Termination,
///     session::StreamClient,
///     transport::StreamRequest,
/// };
/// use streamwire_testing::{Attempt, ScriptedTransport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = ScriptedTransport::new([Attempt::ok(200)
///     .chunk("{\"text\":\"a\"}\r")
///     .chunk("\n{\"text\":\"b\"}\r\n")]);
/// let mut client = StreamClient::builder().build(transport);
///
/// let mut seen = Vec::new();
/// let ended = client
///     .open_stream(StreamRequest::get("http://localhost/stream"), |record| seen.push(record))
///     .await
///     .unwrap();
/// assert_eq!(ended, Termination::EndOfStream);
/// assert_eq!(seen.len(), 2);
/// # }
/// ```
pub struct StreamClient<T> {
    transport: T,
    authenticator: Arc<dyn Authenticator>,
    user_agent: String,
    frame: FrameConfig,
    classifier: RecordClassifier,
    recovery: RecoveryConfig,
    stats_every: u64,
    handle: StreamHandle,
}

impl StreamClient<()> {
    /// Start configuring a client.
    #[must_use]
    pub fn builder() -> StreamClientBuilder { StreamClientBuilder::default() }
}

impl<T: Transport> StreamClient<T> {
    /// Handle for cancelling and observing this client from other tasks.
    #[must_use]
    pub fn handle(&self) -> StreamHandle { self.handle.clone() }

    /// The transport, for inspection.
    #[must_use]
    pub fn transport(&self) -> &T { &self.transport }

    /// Mutable access to the transport between streams.
    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    /// Stream `request`, passing every record to `on_record` in arrival
    /// order, until the stream ends, is cancelled, or fails.
    ///
    /// Retryable failures are handled internally; only terminal outcomes are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns a [`StreamError`] when a failure is not retryable or its
    /// retry budget is spent.
    pub async fn open_stream<F>(
        &mut self,
        request: StreamRequest,
        mut on_record: F,
    ) -> Result<Termination, StreamError>
    where
        F: FnMut(Record) + Send,
    {
        let span = info_span!("stream.open", name = %self.handle.name(), url = %request.url());
        self.run(&request, &mut on_record).instrument(span).await
    }

    async fn run<F>(
        &mut self,
        request: &StreamRequest,
        on_record: &mut F,
    ) -> Result<Termination, StreamError>
    where
        F: FnMut(Record) + Send,
    {
        let shared = Arc::clone(self.handle.shared());
        let mut machine = RecoveryMachine::new(self.recovery.clone());
        let mut reassembler = FrameReassembler::new(self.frame.clone());
        shared.stats.begin_request();
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let outcome = if let Some(signal) = shared.take_abort() {
                let context = FailureContext {
                    attempt,
                    ..FailureContext::default()
                };
                machine.on_disconnect(signal, context)
            } else {
                self.attempt(
                    request,
                    attempt,
                    &mut machine,
                    &mut reassembler,
                    &shared,
                    on_record,
                )
                .instrument(debug_span!("stream.attempt", attempt))
                .await
            };
            shared.set_state(machine.state().clone());

            match outcome {
                Outcome::Retry(plan) => {
                    log::warn!(
                        "{} auto-recovering {} error {}, retry {}",
                        shared.name(),
                        plan.domain,
                        plan.cause,
                        plan.attempt
                    );
                    shared.stats.retry();
                    metrics::inc_retries(plan.domain);
                    plan.wait().await;
                }
                Outcome::Fatal(err) => {
                    tracing::error!(
                        error = %err,
                        error_type = err.error_type(),
                        http_status = err.context().http_status,
                        transport_code = err.context().transport_code,
                        partial_len = err.context().partial_record.len(),
                        attempt,
                        "stream failed"
                    );
                    metrics::inc_errors(err.error_type());
                    return Err(err);
                }
                Outcome::Success(termination) => {
                    tracing::info!(?termination, attempt, "stream ended");
                    return Ok(termination);
                }
            }
        }
    }

    async fn attempt<F>(
        &mut self,
        request: &StreamRequest,
        attempt: u32,
        machine: &mut RecoveryMachine,
        reassembler: &mut FrameReassembler,
        shared: &SessionShared,
        on_record: &mut F,
    ) -> Outcome
    where
        F: FnMut(Record) + Send,
    {
        machine.begin_attempt();
        shared.set_state(machine.state().clone());
        reassembler.reset();
        shared.stats.begin_attempt();

        let prepared = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(source) => {
                return machine.fatal(StreamError::Authentication {
                    source,
                    context: FailureContext {
                        attempt,
                        ..FailureContext::default()
                    },
                });
            }
        };

        let mut sink = AttemptSink::new(
            reassembler,
            &self.classifier,
            machine,
            shared,
            on_record,
            self.stats_every,
        );
        let result = self.transport.perform(&prepared, &mut sink).await;
        let report = sink.finish();
        if let Err(err) = &result {
            tracing::debug!(error = %err, "attempt ended with transport error");
        }

        let http_status = self.transport.final_status().or(report.provisional_status);
        let context = FailureContext {
            http_status,
            transport_code: result.as_ref().err().map(TransportError::code),
            partial_record: Bytes::copy_from_slice(reassembler.partial()),
            attempt,
        };
        resolve(machine, shared, result, report, context)
    }

    fn prepare(&self, request: &StreamRequest) -> Result<PreparedRequest, AuthError> {
        let mut headers = Vec::with_capacity(2);
        if let Some(credential) = self.authenticator.sign(request)? {
            headers.push(credential);
        }
        headers.push(RequestHeader::new("User-Agent", self.user_agent.clone()));
        Ok(PreparedRequest::new(request.clone(), headers))
    }
}

fn resolve(
    machine: &mut RecoveryMachine,
    shared: &SessionShared,
    result: Result<(), TransportError>,
    report: AttemptReport,
    context: FailureContext,
) -> Outcome {
    // a caller abort is consumed here and outranks every other cause
    let local = shared.take_abort();
    if let Some(signal) = local.as_ref().filter(|signal| signal.code.is_local()) {
        return machine.on_disconnect(signal.clone(), context);
    }
    if let Some(failure) = report.failure {
        return machine.fatal(failure.into_error(context));
    }
    let signal = report.remote_signal.or(local);
    if let Err(error) = result {
        return machine.on_transport_error(error, signal, context);
    }
    if let Some(signal) = signal {
        return machine.on_disconnect(signal, context);
    }
    match context.http_status {
        Some(status) if status >= 300 => {
            let body = if report.error_body.is_empty() {
                context.partial_record.clone()
            } else {
                report.error_body
            };
            machine.on_http_status(HttpStatusError::new(status, body), context)
        }
        Some(200) if report.close_signalled && report.delivered == 0 => {
            machine.on_server_close(context)
        }
        _ => machine.on_end_of_stream(),
    }
}

/// Builder for [`StreamClient`].
pub struct StreamClientBuilder {
    name: String,
    user_agent: String,
    authenticator: Arc<dyn Authenticator>,
    frame: FrameConfig,
    classifier: ClassifierConfig,
    recovery: RecoveryConfig,
    stats_every: u64,
}

impl Default for StreamClientBuilder {
    fn default() -> Self {
        Self {
            name: "stream".to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            authenticator: Arc::new(NoAuth),
            frame: FrameConfig::default(),
            classifier: ClassifierConfig::default(),
            recovery: RecoveryConfig::default(),
            stats_every: 0,
        }
    }
}

impl StreamClientBuilder {
    /// Name used in logs and statistics.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// `User-Agent` sent on every attempt.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Credential source, consulted before every attempt.
    #[must_use]
    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }

    /// Framing settings.
    #[must_use]
    pub fn frame_config(mut self, config: FrameConfig) -> Self {
        self.frame = config;
        self
    }

    /// Classification settings.
    #[must_use]
    pub fn classifier_config(mut self, config: ClassifierConfig) -> Self {
        self.classifier = config;
        self
    }

    /// Recovery settings.
    #[must_use]
    pub fn recovery_config(mut self, config: RecoveryConfig) -> Self {
        self.recovery = config;
        self
    }

    /// Log statistics every `records` records; zero disables.
    #[must_use]
    pub fn stats_every(mut self, records: u64) -> Self {
        self.stats_every = records;
        self
    }

    /// Finish configuration with `transport`.
    #[must_use]
    pub fn build<T: Transport>(self, transport: T) -> StreamClient<T> {
        StreamClient {
            transport,
            authenticator: self.authenticator,
            user_agent: self.user_agent,
            frame: self.frame,
            classifier: RecordClassifier::new(self.classifier),
            recovery: self.recovery,
            stats_every: self.stats_every,
            handle: StreamHandle::new(self.name),
        }
    }
}
