//! HTTP client for scraping exposed metrics.

use std::{collections::HashMap, time::Duration};

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt as _, Empty};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use serde::Deserialize;
use snafu::{ensure, ResultExt as _, Snafu};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// HTTP client error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ClientError {
    /// The configured address could not be parsed as a URL.
    #[snafu(display("invalid address '{}': {}", address, source))]
    InvalidAddress { address: String, source: url::ParseError },

    /// The configured address uses a scheme other than `http`.
    #[snafu(display("unsupported scheme '{}' in address '{}'", scheme, address))]
    UnsupportedScheme { address: String, scheme: String },

    /// The request could not be built.
    #[snafu(display("failed to build request: {}", source))]
    InvalidRequest { source: http::Error },

    /// The request failed before a response was received.
    #[snafu(display("failed to send request: {}", source))]
    SendRequest { source: hyper_util::client::legacy::Error },

    /// The response body could not be read.
    #[snafu(display("failed to read response body: {}", source))]
    ReadBody { source: hyper::Error },

    /// The request was cancelled before it completed.
    #[snafu(display("request cancelled"))]
    Cancelled,
}

/// HTTP client configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct HttpClientConfiguration {
    /// Base address of the remote endpoint, such as `http://localhost:9090`.
    pub address: String,
}

impl HttpClientConfiguration {
    /// Creates a configuration for the given base address.
    pub fn new<A: Into<String>>(address: A) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// A pooled HTTP/1.1 client whose requests can be cancelled.
///
/// Every URL produced by the client is relative to the configured base address. Requests race against a
/// [`CancellationToken`] for their entire duration, including reading the response body.
#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client<HttpConnector, Empty<Bytes>>,
}

impl HttpClient {
    /// Creates a new `HttpClient` from the given configuration.
    ///
    /// # Errors
    ///
    /// If the address cannot be parsed, or does not use the `http` scheme, an error is returned.
    pub fn new(config: &HttpClientConfiguration) -> Result<Self, ClientError> {
        let address = config.address.as_str();
        let mut base = Url::parse(address).context(InvalidAddress { address })?;
        ensure!(
            base.scheme() == "http",
            UnsupportedScheme {
                address,
                scheme: base.scheme()
            }
        );

        let trimmed = base.path().trim_end_matches('/').to_string();
        base.set_path(&trimmed);

        let inner = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build_http();

        Ok(Self { base, inner })
    }

    /// Returns the URL of `endpoint`, relative to the base address.
    ///
    /// Every `:name` placeholder in the resulting path is replaced with `args[name]`. Longer names are replaced first,
    /// so a placeholder is never clobbered by another whose name is a prefix of its own.
    pub fn url(&self, endpoint: &str, args: &HashMap<&str, &str>) -> Url {
        let base_path = self.base.path().trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        let mut path = if endpoint.is_empty() {
            base_path.to_string()
        } else {
            format!("{}/{}", base_path, endpoint)
        };

        let mut names = args.keys().copied().collect::<Vec<_>>();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        for name in names {
            path = path.replace(&format!(":{}", name), args[name]);
        }

        let mut url = self.base.clone();
        url.set_path(&path);
        url
    }

    /// Sends a request, returning the response head and its full body.
    ///
    /// # Errors
    ///
    /// If the token is cancelled before the response body has been read in full, `ClientError::Cancelled` is
    /// returned and the underlying connection is dropped. Otherwise, an error is returned if the request fails or the
    /// body cannot be read.
    pub async fn send(
        &self, request: Request<Empty<Bytes>>, token: &CancellationToken,
    ) -> Result<(Response<()>, Bytes), ClientError> {
        let uri = request.uri().clone();

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ClientError::Cancelled),
            result = self.inner.request(request) => result.context(SendRequest)?,
        };

        let (parts, body) = response.into_parts();
        let body = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ClientError::Cancelled),
            result = body.collect() => result.context(ReadBody)?.to_bytes(),
        };

        debug!(%uri, status = %parts.status, body_len = body.len(), "Received response.");

        Ok((Response::from_parts(parts, ()), body))
    }

    /// Sends a `GET` request for `endpoint`.
    ///
    /// See [`url`](HttpClient::url) for how the endpoint and its arguments are resolved.
    ///
    /// # Errors
    ///
    /// See [`send`](HttpClient::send).
    pub async fn get(
        &self, endpoint: &str, args: &HashMap<&str, &str>, token: &CancellationToken,
    ) -> Result<(Response<()>, Bytes), ClientError> {
        let request = Request::get(self.url(endpoint, args).as_str())
            .body(Empty::new())
            .context(InvalidRequest)?;

        self.send(request, token).await
    }
}
