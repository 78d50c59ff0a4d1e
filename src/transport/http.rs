//! `reqwest`-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::timeout_at;

use super::{
    Flow,
    LowSpeedLimit,
    Method,
    PreparedRequest,
    ResponseSink,
    Transport,
    TransportError,
    TransportErrorKind,
    low_speed::LowSpeedWatchdog,
};

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streams responses with `reqwest` over rustls.
///
/// Redirects are never followed. The status line is synthesised as
/// `HTTP/1.1 200 OK` and passed to the sink before one `name: value` line per
/// response header.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use streamwire::transport::{LowSpeedLimit, ReqwestTransport};
///
/// let transport = ReqwestTransport::builder()
///     .user_agent("my-app v1.0")
///     .low_speed_limit(LowSpeedLimit::new(1, Duration::from_secs(90)))
///     .build()
///     .expect("client builds");
/// # drop(transport);
/// ```
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    low_speed: Option<LowSpeedLimit>,
    status: Option<u16>,
}

impl ReqwestTransport {
    /// Start configuring a transport.
    #[must_use]
    pub fn builder() -> ReqwestTransportBuilder { ReqwestTransportBuilder::default() }

    /// Wrap an existing client. The caller is responsible for its redirect
    /// and TLS settings.
    #[must_use]
    pub fn from_client(client: reqwest::Client, low_speed: Option<LowSpeedLimit>) -> Self {
        Self {
            client,
            low_speed,
            status: None,
        }
    }

    fn build_request(&self, prepared: &PreparedRequest) -> reqwest::RequestBuilder {
        let request = prepared.request();
        let mut builder = match request.method() {
            Method::Get => self.client.get(request.url()).query(request.params()),
            Method::Post => self.client.post(request.url()).form(request.params()),
        };
        for header in prepared.headers() {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        builder
    }

    async fn send(
        &self,
        prepared: &PreparedRequest,
        watchdog: &LowSpeedWatchdog,
    ) -> Result<reqwest::Response, TransportError> {
        let pending = self.build_request(prepared).send();
        let response = match watchdog.deadline() {
            Some(deadline) => timeout_at(deadline, pending).await.map_err(|_| {
                TransportError::new(TransportErrorKind::TimedOut, "no response within low-speed window")
            })?,
            None => pending.await,
        };
        Ok(response?)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(
        &mut self,
        request: &PreparedRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), TransportError> {
        self.status = None;
        let mut watchdog = LowSpeedWatchdog::new(self.low_speed);
        let response = self.send(request, &watchdog).await?;
        self.status = Some(response.status().as_u16());

        let status_line = format!("{:?} {}", response.version(), response.status());
        if sink.on_header(&status_line) == Flow::Abort {
            return Err(TransportError::write_aborted());
        }
        for (name, value) in response.headers() {
            let line = format!("{name}: {}", String::from_utf8_lossy(value.as_bytes()));
            if sink.on_header(&line) == Flow::Abort {
                return Err(TransportError::write_aborted());
            }
        }

        let mut body = response.bytes_stream();
        loop {
            let next = match watchdog.deadline() {
                Some(deadline) => match timeout_at(deadline, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        watchdog.check(tokio::time::Instant::now())?;
                        continue;
                    }
                },
                None => body.next().await,
            };
            let Some(chunk) = next else {
                return Ok(());
            };
            let chunk = chunk?;
            watchdog.record(chunk.len())?;
            if sink.on_data(&chunk) == Flow::Abort {
                return Err(TransportError::write_aborted());
            }
        }
    }

    fn final_status(&self) -> Option<u16> { self.status }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug, Default)]
pub struct ReqwestTransportBuilder {
    user_agent: Option<String>,
    low_speed: Option<LowSpeedLimit>,
    connect_timeout: Option<Duration>,
}

impl ReqwestTransportBuilder {
    /// Set the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Enable the low-speed watchdog.
    #[must_use]
    pub fn low_speed_limit(mut self, limit: LowSpeedLimit) -> Self {
        self.low_speed = Some(limit);
        self
    }

    /// Override the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the TLS backend cannot be initialised.
    pub fn build(self) -> Result<ReqwestTransport, TransportError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT));
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build()?;
        Ok(ReqwestTransport::from_client(client, self.low_speed))
    }
}
