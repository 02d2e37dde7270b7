use spate_core::{Error, RunConfig, SyntheticRequest, TimedConfig, TransportError, TransportErrorKind, HEALTH_PATH, USERS_PATH};
use std::io;
use std::time::Duration;

/// What the classifier sees from one call: the status plus the captured
/// body (error bodies carry the rejection reason).
#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Boundary between the dispatch loop and the network.
///
/// The engine is generic over this seam so admission and classification can
/// be exercised against instrumented fakes; [`HttpTransport`] is the real
/// implementation.
#[trait_variant::make(Transport: Send)]
pub(crate) trait LocalTransport {
    /// POST one synthetic user to the write path.
    async fn send(&self, request: &SyntheticRequest) -> Result<RawResponse, TransportError>;

    /// GET a path relative to the base URL.
    async fn fetch(&self, path: &str) -> Result<RawResponse, TransportError>;

    /// GET the liveness path.
    async fn probe(&self) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] over a shared `reqwest` client.
pub(crate) struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    users_url: String,
    health_url: String,
}

impl HttpTransport {
    /// Connection reuse is the point of the shared client, so the idle pool
    /// is sized to the admission limit.
    pub fn new(base_url: &str, request_timeout: Duration, pool_size: usize) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(pool_size)
            .build()
            .map_err(|err| Error::ClientBuild(err.to_string()))?;
        let base = base_url.trim_end_matches('/');
        Ok(Self {
            client,
            base_url: base.to_string(),
            users_url: format!("{base}{USERS_PATH}"),
            health_url: format!("{base}{HEALTH_PATH}"),
        })
    }

    pub fn for_run(config: &RunConfig) -> Result<Self, Error> {
        Self::new(&config.base_url, config.request_timeout, config.concurrency.get())
    }

    pub fn for_timed(config: &TimedConfig) -> Result<Self, Error> {
        Self::new(&config.base_url, config.request_timeout, config.connections.get())
    }

    async fn read_response(response: reqwest::Response) -> Result<RawResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| classify(&err))?;
        Ok(RawResponse { status, body })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &SyntheticRequest) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .post(&self.users_url)
            .json(&request.payload())
            .send()
            .await
            .map_err(|err| classify(&err))?;
        Self::read_response(response).await
    }

    async fn fetch(&self, path: &str) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(url).send().await.map_err(|err| classify(&err))?;
        Self::read_response(response).await
    }

    async fn probe(&self) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|err| classify(&err))?;
        Self::read_response(response).await
    }
}

/// Map a client error onto the transport taxonomy.
///
/// `reqwest` wraps `hyper` which wraps the `io::Error` that actually names
/// the cause, so classification walks the source chain rather than trusting
/// the top-level message.
pub(crate) fn classify(err: &reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else {
        classify_chain(err)
    };
    TransportError::new(kind, chain_message(err))
}

fn classify_chain(err: &(dyn std::error::Error + 'static)) -> TransportErrorKind {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(layer) = current {
        if let Some(io_err) = layer.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return TransportErrorKind::Refused,
                io::ErrorKind::TimedOut => return TransportErrorKind::Timeout,
                _ => {}
            }
        }
        let rendered = layer.to_string();
        if rendered.contains("dns error") || rendered.contains("failed to lookup address") {
            return TransportErrorKind::Dns;
        }
        current = layer.source();
    }
    TransportErrorKind::Unknown
}

/// Render the full cause chain; the top-level Display alone hides the io
/// layer that matters for diagnosis.
fn chain_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(layer) = current {
        let rendered = layer.to_string();
        if !message.contains(&rendered) {
            message.push_str(": ");
            message.push_str(&rendered);
        }
        current = layer.source();
    }
    message
}
