//! Client for the formula translation service.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::{TranslateError, TranslateResult};
use super::protocol::{
    paths, ConvertResponse, MCodeResponse, TranslationRequest, TranslationResult,
};
use super::transport::{HttpTransport, Transport};
use crate::config::TranslationSettings;
use crate::connection::ConnectionInfo;

/// Default timeout for the availability probe (5 seconds).
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Default timeout for translation requests (30 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Whether the service answered the availability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    /// Not probed yet; calls are attempted.
    #[default]
    Unknown,
    /// The probe succeeded.
    Available,
    /// The probe failed; calls short-circuit to [`TranslationResult::Unavailable`].
    Unavailable,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

/// Tunables for [`TranslationClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub health_path: String,
    pub convert_path: String,
    pub m_code_path: String,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Entity replacements applied, in order, to translated text.
    pub entities: Vec<(String, String)>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            health_path: paths::HEALTH.to_string(),
            convert_path: paths::CONVERT.to_string(),
            m_code_path: paths::M_CODE.to_string(),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            entities: Vec::new(),
        }
    }
}

impl ClientOptions {
    pub fn from_settings(settings: &TranslationSettings) -> Self {
        Self {
            health_path: settings.health_path.clone(),
            convert_path: settings.convert_path.clone(),
            m_code_path: settings.m_code_path.clone(),
            probe_timeout: Duration::from_secs(settings.probe_timeout_secs),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            retry: RetryPolicy::new(
                settings.max_retries,
                Duration::from_millis(settings.retry_backoff_ms),
            ),
            entities: settings.entities.clone(),
        }
    }
}

/// Client for the translation service.
///
/// Availability is probed once when the client connects and cached on the
/// instance. An outage after that point surfaces as a failed call, not as a
/// change of availability; call [`TranslationClient::reprobe`] to refresh.
///
/// # Example
///
/// ```ignore
/// let client = TranslationClient::from_settings(&settings.translation).await?;
///
/// match client.translate("SUM([Sales])", "Orders", None).await {
///     TranslationResult::Translated(dax) => println!("{dax}"),
///     other => eprintln!("falling back: {other:?}"),
/// }
/// ```
pub struct TranslationClient<T = HttpTransport> {
    transport: T,
    options: ClientOptions,
    availability: Availability,
}

impl TranslationClient<HttpTransport> {
    /// Build an HTTP client from settings and probe the service.
    pub async fn from_settings(settings: &TranslationSettings) -> TranslateResult<Self> {
        let base_url = settings
            .resolved_base_url()
            .map_err(|e| TranslateError::InvalidConfig(e.to_string()))?;
        let transport = HttpTransport::new(base_url)?;
        Ok(Self::connect(transport, ClientOptions::from_settings(settings)).await)
    }
}

impl<T: Transport> TranslationClient<T> {
    /// Create a client without probing; availability stays [`Availability::Unknown`].
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Self {
            transport,
            options,
            availability: Availability::Unknown,
        }
    }

    /// Create a client and probe the service once.
    pub async fn connect(transport: T, options: ClientOptions) -> Self {
        let mut client = Self::new(transport, options);
        client.reprobe().await;
        client
    }

    /// Probe `GET /health` and cache the outcome.
    pub async fn reprobe(&mut self) -> Availability {
        let probe = self
            .transport
            .get(&self.options.health_path, self.options.probe_timeout)
            .await;

        self.availability = match probe {
            Ok(response) if response.is_success() => Availability::Available,
            Ok(response) => {
                warn!(status = response.status, "translation service health check failed");
                Availability::Unavailable
            }
            Err(err) => {
                warn!(error = %err, "translation service unreachable");
                Availability::Unavailable
            }
        };
        self.availability
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn is_available(&self) -> bool {
        self.availability != Availability::Unavailable
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Translate one formula using the client's retry policy.
    pub async fn translate(
        &self,
        formula: &str,
        table_name: &str,
        column_mappings: Option<&BTreeMap<String, String>>,
    ) -> TranslationResult {
        let request = TranslationRequest {
            formula: formula.to_string(),
            table_name: table_name.to_string(),
            column_mappings: column_mappings.cloned(),
        };
        self.translate_with(&request, &self.options.retry).await
    }

    /// Translate one formula with an explicit retry policy.
    pub async fn translate_with(
        &self,
        request: &TranslationRequest,
        retry: &RetryPolicy,
    ) -> TranslationResult {
        if self.availability == Availability::Unavailable {
            return TranslationResult::Unavailable;
        }

        let outcome: TranslateResult<ConvertResponse> =
            self.call(&self.options.convert_path, request, retry).await;
        match outcome {
            Ok(response) => TranslationResult::Translated(unescape_entities(
                &response.dax_expression,
                &self.options.entities,
            )),
            Err(err) => failure(err),
        }
    }

    /// Ask the service for M code that loads the table behind `info`.
    pub async fn generate_m_code(&self, info: &ConnectionInfo) -> TranslationResult {
        if self.availability == Availability::Unavailable {
            return TranslationResult::Unavailable;
        }

        let outcome: TranslateResult<MCodeResponse> = self
            .call(&self.options.m_code_path, info, &self.options.retry)
            .await;
        match outcome {
            Ok(response) => TranslationResult::Translated(unescape_entities(
                &response.m_code,
                &self.options.entities,
            )),
            Err(err) => failure(err),
        }
    }

    /// POST `body` to `path`, retrying retriable failures, and decode the reply.
    async fn call<B, R>(&self, path: &str, body: &B, retry: &RetryPolicy) -> TranslateResult<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(TranslateError::SerializeFailed)?;
        let mut attempt = 0;

        loop {
            let err = match self
                .transport
                .post_json(path, &body, self.options.request_timeout)
                .await
            {
                Ok(response) if response.is_success() => {
                    return serde_json::from_str(&response.body)
                        .map_err(TranslateError::DeserializeFailed);
                }
                Ok(response) => TranslateError::status(response.status, response.body),
                Err(err) => err,
            };

            if attempt >= retry.max_retries || !err.is_retriable() {
                return Err(err);
            }

            let delay = retry.delay(attempt);
            attempt += 1;
            warn!(
                path,
                attempt,
                max_retries = retry.max_retries,
                error = %err,
                "retrying translation request"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn failure(err: TranslateError) -> TranslationResult {
    debug!(error = %err, "translation call failed");
    match err {
        TranslateError::Status { status, body } => TranslationResult::Failed {
            status: Some(status),
            body,
        },
        other => TranslationResult::Failed {
            status: None,
            body: other.to_string(),
        },
    }
}

/// Apply entity replacements in order.
///
/// Each pair is applied to the output of the previous one, so `&amp;` must
/// come last if it should not produce new entities.
pub fn unescape_entities(text: &str, entities: &[(String, String)]) -> String {
    entities
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}
