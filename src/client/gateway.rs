use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::notify::{Notice, Notifier, SessionHandler, TokenProvider};
use crate::models::{ApiResponse, ErrorResponse, Page, PaginatedResponse};

pub const NO_CONNECTION: &str = "No internet connection";
pub const SESSION_EXPIRED: &str = "Session expired. Please sign in again.";
pub const TRY_AGAIN_LATER: &str = "Something went wrong. Please try again later!";
pub const GENERIC_FAILURE: &str = "Something went wrong! Please try again.";

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("server error ({0})")]
    Server(u16),

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// A response body, decoded once at the boundary.
#[derive(Debug, Clone)]
pub enum Envelope<T> {
    Success { message: String, data: T },
    Failure(ErrorResponse),
}

fn decode_error(e: serde_json::Error) -> GatewayError {
    GatewayError::Decode(e.to_string())
}

impl<T> Envelope<T> {
    fn parse<S, F>(bytes: &[u8], unwrap: F) -> Result<Self, GatewayError>
    where
        S: DeserializeOwned,
        F: FnOnce(S) -> Result<(String, T), GatewayError>,
    {
        let value: serde_json::Value = serde_json::from_slice(bytes).map_err(decode_error)?;
        if value.get("success").and_then(serde_json::Value::as_bool) == Some(true) {
            let body: S = serde_json::from_value(value).map_err(decode_error)?;
            let (message, data) = unwrap(body)?;
            Ok(Envelope::Success { message, data })
        } else {
            let failure: ErrorResponse = serde_json::from_value(value).map_err(decode_error)?;
            Ok(Envelope::Failure(failure))
        }
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// `{success, message, data}` with a single payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, GatewayError> {
        Self::parse(bytes, |ApiResponse { message, data, .. }: ApiResponse<T>| match data {
            Some(data) => Ok((message, data)),
            None => Err(GatewayError::Decode("response carries no data".to_string())),
        })
    }
}

impl<T: DeserializeOwned> Envelope<Page<T>> {
    /// List envelope with the page fields flattened beside `data`.
    pub fn decode_page(bytes: &[u8]) -> Result<Self, GatewayError> {
        Self::parse(bytes, |body: PaginatedResponse<T>| {
            let message = body.message.clone();
            Ok((message, body.into_page()))
        })
    }
}

/// Maps a failed response to the error handed back to the caller and the
/// notices the user should see.
pub fn classify(status: StatusCode, body: Option<&ErrorResponse>) -> (GatewayError, Vec<Notice>) {
    if status == StatusCode::UNAUTHORIZED {
        return (GatewayError::Unauthorized, vec![Notice::error(SESSION_EXPIRED)]);
    }
    if status == StatusCode::INTERNAL_SERVER_ERROR || status == StatusCode::METHOD_NOT_ALLOWED {
        return (
            GatewayError::Server(status.as_u16()),
            vec![Notice::error(TRY_AGAIN_LATER)],
        );
    }

    let message = body
        .map(|b| b.message.joined())
        .filter(|m| !m.trim().is_empty());

    if let Some(fields) = body.and_then(|b| b.errors.as_ref()).filter(|f| !f.is_empty()) {
        let notices = fields
            .values()
            .map(|messages| Notice::error(messages.join(", ")))
            .collect();
        return (
            GatewayError::Validation {
                message: message.unwrap_or_default(),
                fields: fields.clone(),
            },
            notices,
        );
    }

    let text = message.unwrap_or_else(|| GENERIC_FAILURE.to_string());
    (
        GatewayError::Api {
            status: status.as_u16(),
            message: text.clone(),
        },
        vec![Notice::error(text)],
    )
}

/// HTTP client for the transaction API.
///
/// Every request asks the [`TokenProvider`] for a fresh token. Failures are
/// classified once here: notices go to the [`Notifier`], a 401 also signs the
/// session out, and the caller always gets a `GatewayError` back.
#[derive(Clone)]
pub struct RequestGateway {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    session: Arc<dyn SessionHandler>,
    notifier: Arc<dyn Notifier>,
}

impl RequestGateway {
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        session: Arc<dyn SessionHandler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            session,
            notifier,
        }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(StatusCode, Vec<u8>), GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self
            .http
            .request(method.clone(), self.url(path))
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = self.tokens.token().await {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("{} {}", method, path);
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.network_failure(e)),
        };
        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.network_failure(e)),
        };

        if !status.is_success() {
            let failure = serde_json::from_slice::<ErrorResponse>(&bytes).ok();
            return Err(self.reject(status, failure.as_ref()).await);
        }
        Ok((status, bytes.to_vec()))
    }

    fn network_failure(&self, e: reqwest::Error) -> GatewayError {
        warn!("Request did not reach the server: {}", e);
        self.notifier.notify(Notice::error(NO_CONNECTION));
        GatewayError::Network(e.to_string())
    }

    async fn reject(&self, status: StatusCode, failure: Option<&ErrorResponse>) -> GatewayError {
        let (err, notices) = classify(status, failure);
        for notice in notices {
            self.notifier.notify(notice);
        }
        match &err {
            GatewayError::Unauthorized => self.session.sign_out().await,
            GatewayError::Server(code) => error!("Server failed with status {}", code),
            _ => {}
        }
        err
    }

    fn undecodable(&self, err: GatewayError) -> GatewayError {
        error!("Could not decode response: {}", err);
        self.notifier.notify(Notice::error(GENERIC_FAILURE));
        err
    }

    async fn settle<T>(
        &self,
        status: StatusCode,
        decoded: Result<Envelope<T>, GatewayError>,
    ) -> Result<T, GatewayError> {
        match decoded {
            Ok(Envelope::Success { data, .. }) => Ok(data),
            Ok(Envelope::Failure(failure)) => Err(self.reject(status, Some(&failure)).await),
            Err(e) => Err(self.undecodable(e)),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let (status, bytes) = self.send::<()>(Method::GET, path, None).await?;
        self.settle(status, Envelope::decode(&bytes)).await
    }

    pub async fn get_page<T: DeserializeOwned>(&self, path: &str) -> Result<Page<T>, GatewayError> {
        let (status, bytes) = self.send::<()>(Method::GET, path, None).await?;
        self.settle(status, Envelope::decode_page(&bytes)).await
    }

    pub async fn post<B, T>(&self, path: &str, payload: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (status, bytes) = self.send(Method::POST, path, Some(payload)).await?;
        self.settle(status, Envelope::decode(&bytes)).await
    }

    pub async fn patch<B, T>(&self, path: &str, payload: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (status, bytes) = self.send(Method::PATCH, path, Some(payload)).await?;
        self.settle(status, Envelope::decode(&bytes)).await
    }

    pub async fn put<B, T>(&self, path: &str, payload: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (status, bytes) = self.send(Method::PUT, path, Some(payload)).await?;
        self.settle(status, Envelope::decode(&bytes)).await
    }

    /// Succeeds on any 2xx; a `204` has no body to unwrap.
    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.send::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }
}
