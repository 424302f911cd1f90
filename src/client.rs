//! HTTP client for the Platon gateway.
//!
//! [`PlatonClient`] posts signed, form-encoded requests to the gateway's
//! `post-unq/`, `post/` and `configuration/` endpoints and decodes the JSON
//! envelope it answers with. Business failures (`DECLINED`, `ERROR`) come
//! back as [`PlatonError::Gateway`] together with the decoded envelope.
//!
//! ## Example
//!
//! ```rust
//! use platon_rs::client::PlatonClient;
//!
//! let client = PlatonClient::try_from("https://secure.platononline.com").unwrap();
//! assert_eq!(client.post_unq_url().as_str(), "https://secure.platononline.com/post-unq/");
//! ```
//!
//! ## Features
//!
//! - Uses `reqwest` for async HTTP requests; redirects are never followed
//! - Supports optional timeout and extra headers
//! - Falls back to a configured merchant when a request carries none
//! - Reports each exchange to an optional [`Recorder`]
//! - Integrates with `tracing` if the `telemetry` feature is enabled

use std::borrow::Cow;
use std::fmt::Display;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use http::header::{ACCEPT, CONTENT_TYPE, LOCATION, USER_AGENT};
use http::{HeaderMap, StatusCode};
use platon_types::config::MerchantConfig;
use platon_types::request::FormFields;
use platon_types::response::{GatewayError, Response};
use regex::Regex;
use reqwest::Client;
use reqwest::redirect::Policy;
use url::Url;

use crate::config::ClientConfig;
use crate::recorder::{RecordTags, Recorder, masked_form, record_tags};
use crate::request::{BuildError, Dispatch, Endpoint, PaymentRequest};

#[cfg(feature = "telemetry")]
use tracing::{Span, instrument};

/// Gateway API version sent with every request.
pub const API_VERSION: &str = "1.28";

/// Largest response body accepted from the server-to-server endpoints.
pub const MAX_RESPONSE_BYTES: usize = 4 << 20;

/// Largest verification page scanned for a purchase URL.
pub const MAX_VERIFICATION_PAGE_BYTES: usize = 1 << 20;

/// Error bodies are cut to this many characters.
const ERROR_BODY_LIMIT: usize = 512;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

static PURCHASE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/payment/purchase\?token=[A-Za-z0-9]+").expect("valid purchase URL pattern")
});

fn user_agent() -> String {
    format!("platon-rs/{}", env!("CARGO_PKG_VERSION"))
}

fn request_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

fn error_page_hint(error_page: &bool) -> &'static str {
    if *error_page {
        "; gateway returned error page (check merchant key, secret/signature, and callback URL)"
    } else {
        ""
    }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}...(truncated)", &text[..cut]),
        None => text.into_owned(),
    }
}

/// Errors that can occur while talking to the gateway.
#[derive(Debug, thiserror::Error)]
pub enum PlatonError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Response body exceeds {limit} bytes: {context}")]
    ResponseTooLarge { context: &'static str, limit: usize },
    #[error("Empty response body: {context} (status={status})")]
    EmptyResponse {
        context: &'static str,
        status: StatusCode,
    },
    #[error("Unexpected HTTP status: {context}: status={} body={body}", .status.as_u16())]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{source}")]
    Gateway {
        response: Box<Response>,
        #[source]
        source: GatewayError,
    },
    #[error("Failed to encode form body: {context}: {source}")]
    Encode {
        context: &'static str,
        #[source]
        source: serde_urlencoded::ser::Error,
    },
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("unexpected submerchant status: {status:?}")]
    SubmerchantStatus { status: Option<String> },
    #[error(
        "verification purchase URL was not returned (status={}){}",
        .status.as_u16(),
        error_page_hint(.error_page)
    )]
    PurchaseUrlMissing { status: StatusCode, error_page: bool },
    #[error("cannot parse verification URL {raw:?}: {source}")]
    InvalidPurchaseUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },
}

impl PlatonError {
    /// Decoded envelope of a business failure.
    pub fn response(&self) -> Option<&Response> {
        match self {
            PlatonError::Gateway { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// A client for the Platon server-to-server API.
#[derive(Clone, Debug)]
pub struct PlatonClient {
    /// Base URL of the gateway (e.g. `https://secure.platononline.com/`)
    base_url: Url,
    /// Card, token, recurring, status, capture, refund and payout requests
    post_unq_url: Url,
    /// Apple Pay and Google Pay
    post_url: Url,
    /// Submerchant lookup
    configuration_url: Url,
    /// Client-server verification form target
    payment_auth_url: Url,
    client: Client,
    /// Extra headers sent with each request
    headers: HeaderMap,
    timeout: Option<Duration>,
    /// Used when a request carries no merchant of its own
    merchant: Option<MerchantConfig>,
    recorder: Option<Arc<dyn Recorder>>,
}

impl PlatonClient {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn post_unq_url(&self) -> &Url {
        &self.post_unq_url
    }

    pub fn post_url(&self) -> &Url {
        &self.post_url
    }

    pub fn configuration_url(&self) -> &Url {
        &self.configuration_url
    }

    pub fn payment_auth_url(&self) -> &Url {
        &self.payment_auth_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> &Option<Duration> {
        &self.timeout
    }

    pub fn merchant(&self) -> Option<&MerchantConfig> {
        self.merchant.as_ref()
    }

    pub fn url_for(&self, endpoint: Endpoint) -> &Url {
        match endpoint {
            Endpoint::PostUnq => &self.post_unq_url,
            Endpoint::Post => &self.post_url,
            Endpoint::Configuration => &self.configuration_url,
            Endpoint::PaymentAuth => &self.payment_auth_url,
        }
    }

    /// Constructs a new [`PlatonClient`] from a base URL.
    ///
    /// Endpoint URLs are resolved relative to the base.
    pub fn try_new(base_url: Url) -> Result<Self, PlatonError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| PlatonError::Http {
                context: "Failed to build HTTP client",
                source: e,
            })?;
        let join = |endpoint: Endpoint, context: &'static str| {
            base_url
                .join(endpoint.path())
                .map_err(|e| PlatonError::UrlParse { context, source: e })
        };
        let post_unq_url = join(Endpoint::PostUnq, "Failed to construct ./post-unq/ URL")?;
        let post_url = join(Endpoint::Post, "Failed to construct ./post/ URL")?;
        let configuration_url = join(
            Endpoint::Configuration,
            "Failed to construct ./configuration/ URL",
        )?;
        let payment_auth_url = join(
            Endpoint::PaymentAuth,
            "Failed to construct ./payment/auth URL",
        )?;
        Ok(Self {
            base_url,
            post_unq_url,
            post_url,
            configuration_url,
            payment_auth_url,
            client,
            headers: HeaderMap::new(),
            timeout: None,
            merchant: None,
            recorder: None,
        })
    }

    /// Builds a client from loaded configuration, applying its timeout and
    /// default merchant.
    pub fn from_config(config: &ClientConfig) -> Result<Self, PlatonError> {
        let client = Self::try_new(config.base_url().clone())?.with_timeout(config.timeout());
        Ok(match config.merchant() {
            Some(merchant) => client.with_merchant(merchant.clone()),
            None => client,
        })
    }

    /// Attaches a [`Recorder`] that sees every server-to-server exchange.
    pub fn with_recorder(&self, recorder: Arc<dyn Recorder>) -> Self {
        let mut this = self.clone();
        this.recorder = Some(recorder);
        this
    }

    /// Sets the merchant used by requests that carry none.
    pub fn with_merchant(&self, merchant: MerchantConfig) -> Self {
        let mut this = self.clone();
        this.merchant = Some(merchant);
        this
    }

    /// Attaches custom headers to all future requests.
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let mut this = self.clone();
        this.headers = headers;
        this
    }

    /// Sets a timeout for all future requests.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    pub async fn payment(&self, request: &PaymentRequest) -> Result<Response, PlatonError> {
        self.send(&self.resolve_merchant(request).payment()?).await
    }

    pub async fn hold(&self, request: &PaymentRequest) -> Result<Response, PlatonError> {
        self.send(&self.resolve_merchant(request).hold()?).await
    }

    pub async fn card_verification(
        &self,
        request: &PaymentRequest,
    ) -> Result<Response, PlatonError> {
        self.send(&self.resolve_merchant(request).card_verification()?).await
    }

    pub async fn recurring_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<Response, PlatonError> {
        self.send(&self.resolve_merchant(request).recurring_payment()?).await
    }

    pub async fn status(&self, request: &PaymentRequest) -> Result<Response, PlatonError> {
        self.send(&self.resolve_merchant(request).status()?).await
    }

    pub async fn status_by_order(&self, request: &PaymentRequest) -> Result<Response, PlatonError> {
        self.send(&self.resolve_merchant(request).status_by_order()?).await
    }

    pub async fn capture(&self, request: &PaymentRequest) -> Result<Response, PlatonError> {
        self.send(&self.resolve_merchant(request).capture()?).await
    }

    pub async fn refund(&self, request: &PaymentRequest) -> Result<Response, PlatonError> {
        self.send(&self.resolve_merchant(request).refund()?).await
    }

    pub async fn credit(&self, request: &PaymentRequest) -> Result<Response, PlatonError> {
        self.send(&self.resolve_merchant(request).credit()?).await
    }

    /// Whether the sub-merchant may receive split payments.
    ///
    /// `ENABLED` and `DISABLED` map to `true` and `false`; any other status
    /// is an error.
    pub async fn submerchant_available_for_split(
        &self,
        request: &PaymentRequest,
    ) -> Result<bool, PlatonError> {
        let response = self.send(&self.resolve_merchant(request).submerchant_lookup()?).await?;
        let status = response
            .submerchant_id_status()
            .map(|s| s.trim().to_ascii_uppercase());
        match status.as_deref() {
            Some("ENABLED") => Ok(true),
            Some("DISABLED") => Ok(false),
            _ => Err(PlatonError::SubmerchantStatus { status }),
        }
    }

    /// Submits the client-server verification form and returns the purchase
    /// page the payer should be sent to.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "platon.client.verification", skip_all, err)
    )]
    pub async fn verification(&self, request: &PaymentRequest) -> Result<Url, PlatonError> {
        const CONTEXT: &str = "POST payment/auth";
        let form = self
            .resolve_merchant(request)
            .verification_form(self.payment_auth_url.as_str())?;
        let body = serde_urlencoded::to_string(&form.fields).map_err(|e| PlatonError::Encode {
            context: CONTEXT,
            source: e,
        })?;
        let mut req = self
            .client
            .post(self.payment_auth_url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(USER_AGENT, user_agent())
            .header("X-Request-ID", request_id())
            .body(body);
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let mut http_response = req.send().await.map_err(|e| PlatonError::Http {
            context: CONTEXT,
            source: e,
        })?;
        let status = http_response.status();

        let location = http_response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let result = match location {
            Some(location) => self.purchase_url(&location),
            None => {
                let page = read_capped(
                    &mut http_response,
                    CONTEXT,
                    MAX_VERIFICATION_PAGE_BYTES,
                )
                .await?;
                self.find_purchase_url(&page, status)
            }
        };
        record_result_on_span(&result);
        result
    }

    fn resolve_merchant<'a>(&self, request: &'a PaymentRequest) -> Cow<'a, PaymentRequest> {
        match (&request.merchant, &self.merchant) {
            (None, Some(merchant)) => Cow::Owned(PaymentRequest {
                merchant: Some(merchant.clone()),
                ..request.clone()
            }),
            _ => Cow::Borrowed(request),
        }
    }

    fn purchase_url(&self, raw: &str) -> Result<Url, PlatonError> {
        self.base_url
            .join(raw)
            .map_err(|source| PlatonError::InvalidPurchaseUrl {
                raw: raw.to_string(),
                source,
            })
    }

    /// Looks for a purchase link on the gateway's own origin first, then for
    /// a relative one.
    fn find_purchase_url(&self, page: &[u8], status: StatusCode) -> Result<Url, PlatonError> {
        let text = String::from_utf8_lossy(page);
        let origin = self.base_url.origin().ascii_serialization();
        if let Some(m) = PURCHASE_PATH
            .find_iter(&text)
            .find(|m| text[..m.start()].ends_with(origin.as_str()))
        {
            return self.purchase_url(&format!("{origin}{}", m.as_str()));
        }
        if let Some(m) = PURCHASE_PATH.find(&text) {
            return self.purchase_url(m.as_str());
        }
        Err(PlatonError::PurchaseUrlMissing {
            status,
            error_page: text.to_lowercase().contains("<title>error"),
        })
    }

    /// Sends a prepared request to its endpoint.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "platon.client.send", skip_all, fields(kind = %dispatch.kind()), err)
    )]
    pub async fn send(&self, dispatch: &Dispatch) -> Result<Response, PlatonError> {
        let context = match dispatch.endpoint {
            Endpoint::PostUnq => "POST post-unq/",
            Endpoint::Post => "POST post/",
            Endpoint::Configuration => "POST configuration/",
            Endpoint::PaymentAuth => "POST payment/auth",
        };
        self.post_form(self.url_for(dispatch.endpoint), context, &dispatch.fields())
            .await
    }

    /// Form POST helper that handles encoding, body limits, error mapping,
    /// timeout application, recording, and telemetry integration.
    ///
    /// `context` is a human-readable identifier used in tracing and error messages (e.g. `"POST post-unq/"`).
    async fn post_form(
        &self,
        url: &Url,
        context: &'static str,
        fields: &FormFields,
    ) -> Result<Response, PlatonError> {
        let request_id = request_id();
        let tags = record_tags(fields);
        let result = self
            .exchange(url, context, fields, &request_id, &tags)
            .await;

        // Declines were already seen as a response body.
        if let (Some(recorder), Err(err)) = (&self.recorder, &result) {
            if !matches!(err, PlatonError::Gateway { .. }) {
                recorder.record_error(&request_id, err, &tags);
            }
        }
        record_result_on_span(&result);

        result
    }

    async fn exchange(
        &self,
        url: &Url,
        context: &'static str,
        fields: &FormFields,
        request_id: &str,
        tags: &RecordTags,
    ) -> Result<Response, PlatonError> {
        let body = serde_urlencoded::to_string(fields)
            .map_err(|e| PlatonError::Encode { context, source: e })?;
        if let Some(recorder) = &self.recorder {
            let masked = serde_urlencoded::to_string(masked_form(fields))
                .map_err(|e| PlatonError::Encode { context, source: e })?;
            recorder.record_request(request_id, masked.as_bytes(), tags);
        }
        #[cfg(feature = "telemetry")]
        tracing::debug!(%request_id, %url, "sending gateway request");
        let mut req = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, user_agent())
            .header("X-Request-ID", request_id)
            .header("Api-Version", API_VERSION)
            .body(body);
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let mut http_response = req
            .send()
            .await
            .map_err(|e| PlatonError::Http { context, source: e })?;
        let status = http_response.status();
        #[cfg(feature = "telemetry")]
        tracing::debug!(%request_id, status = status.as_u16(), "gateway responded");
        let raw = read_capped(&mut http_response, context, MAX_RESPONSE_BYTES).await?;
        if let Some(recorder) = &self.recorder {
            if !raw.is_empty() {
                recorder.record_response(request_id, &raw, tags);
            }
        }

        if raw.is_empty() {
            Err(PlatonError::EmptyResponse { context, status })
        } else if !status.is_success() {
            Err(PlatonError::HttpStatus {
                context,
                status,
                body: truncate_body(&raw),
            })
        } else {
            Response::from_slice(&raw)
                .map_err(|e| PlatonError::JsonDeserialization { context, source: e })
                .and_then(|response| match response.error() {
                    Some(source) => Err(PlatonError::Gateway {
                        response: Box::new(response),
                        source,
                    }),
                    None => Ok(response),
                })
        }
    }
}

/// Reads the body chunk by chunk, refusing anything over `limit` bytes.
async fn read_capped(
    response: &mut reqwest::Response,
    context: &'static str,
    limit: usize,
) -> Result<Vec<u8>, PlatonError> {
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| PlatonError::ResponseBodyRead { context, source: e })?
    {
        if body.len() + chunk.len() > limit {
            return Err(PlatonError::ResponseTooLarge { context, limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Converts a string URL into a `PlatonClient`, parsing the URL and calling `try_new`.
impl TryFrom<&str> for PlatonClient {
    type Error = PlatonError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Normalize: strip trailing slashes and add a single trailing slash
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| PlatonError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        PlatonClient::try_new(url)
    }
}

impl TryFrom<String> for PlatonClient {
    type Error = PlatonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PlatonClient::try_from(value.as_str())
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to gateway failed");
        }
    }
}

/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PaymentData;
    use crate::request::tests::card_request;
    use platon_types::response::ResponseResult;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Clone, PartialEq)]
    struct Event {
        kind: &'static str,
        request_id: String,
        payload: String,
        tags: RecordTags,
    }

    #[derive(Default)]
    struct MemoryRecorder {
        events: Mutex<Vec<Event>>,
    }

    impl MemoryRecorder {
        fn push(&self, kind: &'static str, request_id: &str, payload: String, tags: &RecordTags) {
            self.events.lock().unwrap().push(Event {
                kind,
                request_id: request_id.to_string(),
                payload,
                tags: tags.clone(),
            });
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Recorder for MemoryRecorder {
        fn record_request(&self, request_id: &str, body: &[u8], tags: &RecordTags) {
            self.push("request", request_id, String::from_utf8_lossy(body).into(), tags);
        }

        fn record_response(&self, request_id: &str, body: &[u8], tags: &RecordTags) {
            self.push("response", request_id, String::from_utf8_lossy(body).into(), tags);
        }

        fn record_error(&self, request_id: &str, error: &PlatonError, tags: &RecordTags) {
            self.push("error", request_id, error.to_string(), tags);
        }
    }

    fn token_request() -> PaymentRequest {
        let mut request = card_request();
        if let Some(card) = request
            .payment_method
            .as_mut()
            .and_then(|m| m.card.as_mut())
        {
            card.token = Some("TOKEN123".into());
        }
        request
    }

    async fn client_for(server: &MockServer) -> PlatonClient {
        PlatonClient::try_new(server.uri().parse().unwrap()).unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let client = PlatonClient::try_from("https://secure.platononline.com///").unwrap();
        assert_eq!(client.base_url().as_str(), "https://secure.platononline.com/");
        assert_eq!(
            client.post_url().as_str(),
            "https://secure.platononline.com/post/"
        );
        assert_eq!(
            client.configuration_url().as_str(),
            "https://secure.platononline.com/configuration/"
        );
        assert_eq!(
            client.payment_auth_url().as_str(),
            "https://secure.platononline.com/payment/auth"
        );
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(600);
        let cut = truncate_body(long.as_bytes());
        assert_eq!(cut.len(), 512 + "...(truncated)".len());
        assert!(cut.ends_with("...(truncated)"));
        assert_eq!(truncate_body(b"short"), "short");
    }

    #[tokio::test]
    async fn test_payment_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post-unq/"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(header("accept", "application/json"))
            .and(header("api-version", API_VERSION))
            .and(body_string_contains("action=SALE"))
            .and(body_string_contains("card_number=4111111111111111"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": "SALE",
                "result": "SUCCESS",
                "status": "SETTLED",
                "order_id": "order-1",
                "trans_id": "632508054"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .await
            .payment(&card_request())
            .await
            .unwrap();
        assert_eq!(response.result, Some(ResponseResult::Success));
        assert_eq!(response.trans_id.as_deref(), Some("632508054"));
    }

    #[tokio::test]
    async fn test_decline_keeps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post-unq/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "DECLINED",
                "decline_reason": "Insufficient funds",
                "trans_id": "1"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .capture(&card_request())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "platon api decline: Insufficient funds");
        assert_eq!(err.response().unwrap().trans_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post-unq/"))
            .respond_with(ResponseTemplate::new(502).set_body_string("y".repeat(1000)))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .status(&card_request())
            .await
            .unwrap_err();
        match err {
            PlatonError::HttpStatus { status, body, .. } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert!(body.ends_with("...(truncated)"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .refund(&card_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatonError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn test_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(vec![b' '; MAX_RESPONSE_BYTES + 1]),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .payment(&card_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatonError::ResponseTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .hold(&card_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatonError::JsonDeserialization { .. }));
    }

    #[tokio::test]
    async fn test_build_error_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let request = PaymentRequest {
            payment_data: None,
            ..card_request()
        };
        let err = client_for(&server)
            .await
            .payment(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatonError::Build(BuildError::Missing { .. })));
    }

    fn lookup_request() -> PaymentRequest {
        PaymentRequest {
            payment_data: Some(PaymentData {
                submerchant_id: Some("12345678".into()),
                ..Default::default()
            }),
            ..card_request()
        }
    }

    #[tokio::test]
    async fn test_submerchant_available() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/configuration/"))
            .and(body_string_contains("action=GET_SUBMERCHANT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "SUCCESS",
                "response": {"submerchant_id": "12345678", "submerchant_id_status": "ENABLED"}
            })))
            .mount(&server)
            .await;

        let available = client_for(&server)
            .await
            .submerchant_available_for_split(&lookup_request())
            .await
            .unwrap();
        assert!(available);
    }

    #[tokio::test]
    async fn test_submerchant_unknown_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/configuration/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "SUCCESS",
                "submerchant_id_status": "PENDING"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .submerchant_available_for_split(&lookup_request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlatonError::SubmerchantStatus { status: Some(ref s) } if s == "PENDING"
        ));
    }

    #[tokio::test]
    async fn test_verification_uses_location_header() {
        let server = MockServer::start().await;
        let want = "https://secure.platononline.com/payment/purchase?token=ABC123";
        Mock::given(method("POST"))
            .and(path("/payment/auth"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(body_string_contains("payment=CC"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", want))
            .mount(&server)
            .await;

        let url = client_for(&server)
            .await
            .verification(&card_request())
            .await
            .unwrap();
        assert_eq!(url.as_str(), want);
    }

    #[tokio::test]
    async fn test_verification_scans_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><a href="/payment/purchase?token=ABC123">continue</a></html>"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let url = client.verification(&card_request()).await.unwrap();
        assert_eq!(
            url.as_str(),
            format!("{}/payment/purchase?token=ABC123", server.uri())
        );
    }

    #[test]
    fn test_purchase_url_prefers_gateway_origin() {
        let client = PlatonClient::try_from("https://secure.platononline.com").unwrap();
        let page = br#"<a href="/payment/purchase?token=REL">a</a> https://secure.platononline.com/payment/purchase?token=ABS"#;
        let url = client.find_purchase_url(page, StatusCode::OK).unwrap();
        assert_eq!(
            url.as_str(),
            "https://secure.platononline.com/payment/purchase?token=ABS"
        );
    }

    #[tokio::test]
    async fn test_verification_error_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/auth"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><TITLE>Error</TITLE></html>"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .verification(&card_request())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "verification purchase URL was not returned (status=200); gateway returned error page (check merchant key, secret/signature, and callback URL)"
        );
    }

    #[tokio::test]
    async fn test_recorder_sees_request_and_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post-unq/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": "SALE",
                "result": "SUCCESS",
                "trans_id": "632508054"
            })))
            .mount(&server)
            .await;

        let recorder = Arc::new(MemoryRecorder::default());
        let client = client_for(&server).await.with_recorder(recorder.clone());
        client.payment(&card_request()).await.unwrap();

        let events = recorder.events();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, ["request", "response"]);

        let received = server.received_requests().await.unwrap();
        let sent_id = received[0].headers.get("x-request-id").unwrap().to_str().unwrap();
        assert!(events.iter().all(|e| e.request_id == sent_id));

        let request = &events[0];
        assert!(request.payload.contains("card_number=411111******1111"));
        assert!(request.payload.contains("card_cvv2=***"));
        assert!(!request.payload.contains("4111111111111111"));
        assert!(!request.payload.contains("secret123"));
        assert_eq!(request.tags["action"], "SALE");
        assert_eq!(request.tags["order_id"], "order-1");
        assert!(events[1].payload.contains("\"result\":\"SUCCESS\""));
    }

    #[tokio::test]
    async fn test_recorder_sees_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post-unq/"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let recorder = Arc::new(MemoryRecorder::default());
        let client = client_for(&server).await.with_recorder(recorder.clone());
        client.status(&card_request()).await.unwrap_err();

        let events = recorder.events();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, ["request", "response", "error"]);
        assert_eq!(events[1].payload, "bad gateway");
        assert!(events[2].payload.contains("502"));
        assert_eq!(events[2].tags["trans_id"], "632508054");
        assert_eq!(events[0].request_id, events[2].request_id);
    }

    #[tokio::test]
    async fn test_recorder_skips_error_for_decline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "DECLINED",
                "decline_reason": "Insufficient funds"
            })))
            .mount(&server)
            .await;

        let recorder = Arc::new(MemoryRecorder::default());
        let client = client_for(&server).await.with_recorder(recorder.clone());
        client.payment(&card_request()).await.unwrap_err();

        let kinds: Vec<_> = recorder.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, ["request", "response"]);
    }

    #[tokio::test]
    async fn test_configured_merchant_signs_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post-unq/"))
            .and(body_string_contains("client_key=CLIENT"))
            .and(body_string_contains("hash=03838ac02c89b98621f95ec98a68aa14"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "SUCCESS"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config: ClientConfig = serde_json::from_value(json!({
            "base_url": format!("{}/", server.uri()),
            "merchant": {
                "merchant_key": "CLIENT",
                "secret_key": "secret123",
                "term_url_3ds": "https://merchant.example/3ds"
            }
        }))
        .unwrap();
        let client = PlatonClient::from_config(&config).unwrap();
        assert_eq!(client.merchant().unwrap().merchant_key, "CLIENT");

        let request = PaymentRequest {
            merchant: None,
            ..token_request()
        };
        let response = client.payment(&request).await.unwrap();
        assert_eq!(response.result, Some(ResponseResult::Success));
    }

    #[tokio::test]
    async fn test_request_merchant_wins_over_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("client_key=CLIENT"))
            .and(body_string_contains("hash=03838ac02c89b98621f95ec98a68aa14"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "SUCCESS"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server)
            .await
            .with_merchant(MerchantConfig::new("OTHER", "other-secret"));
        client.payment(&token_request()).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_merchant_without_default() {
        let server = MockServer::start().await;
        let request = PaymentRequest {
            merchant: None,
            ..token_request()
        };
        let err = client_for(&server)
            .await
            .payment(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatonError::Build(BuildError::Missing { .. })));
    }
}
