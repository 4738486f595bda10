//! HTTP API for the assistant server.
//!
//! The trait is the seam the session talks through; tests substitute a
//! scripted fake, the binary uses [`HttpApi`] backed by reqwest.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, SET_COOKIE};
use reqwest::Client;
use std::sync::Mutex;
use thiserror::Error;

use assistchat_types::{
    CreateConversationResponse, HistoryResponse, Message, SendMessageRequest, SendMessageResponse,
};

/// Name of the anti-forgery cookie the server sets.
const CSRF_COOKIE: &str = "csrftoken";

/// Header that echoes the anti-forgery cookie on state-changing calls.
const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server no longer knows the conversation identifier.
    #[error("conversation not found")]
    NotFound,
    /// The server answered but rejected the request.
    #[error("server rejected the request: {0}")]
    Rejected(String),
    /// The request never completed.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with something we cannot decode.
    #[error("malformed server payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// `POST /create-conversation`: returns the new identifier.
    async fn create_conversation(&self) -> Result<String, ApiError>;

    /// `GET /conversation-history/{id}`. Any non-2xx answer means the
    /// identifier is invalid and maps to [`ApiError::NotFound`].
    async fn fetch_history(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError>;

    /// `POST /send-message`: returns the assistant's reply text.
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<String, ApiError>;
}

pub struct HttpApi {
    client: Client,
    base_url: String,
    csrf_token: Mutex<Option<String>>,
}

impl HttpApi {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn csrf(&self) -> Option<String> {
        self.csrf_token.lock().ok().and_then(|guard| guard.clone())
    }

    /// Remember the `csrftoken` cookie whenever the server (re)sets it.
    /// reqwest's jar sends the cookie back by itself; the value is also
    /// needed verbatim for the `X-CSRFToken` header.
    fn capture_csrf(&self, response: &reqwest::Response) {
        for value in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some(rest) = raw.strip_prefix(&format!("{CSRF_COOKIE}=")) else {
                continue;
            };
            let token = rest.split(';').next().unwrap_or_default().trim();
            if token.is_empty() {
                continue;
            }
            if let Ok(mut guard) = self.csrf_token.lock() {
                *guard = Some(token.to_string());
            }
        }
    }
}

#[async_trait]
impl AssistantApi for HttpApi {
    async fn create_conversation(&self) -> Result<String, ApiError> {
        let mut request = self
            .client
            .post(self.endpoint("/create-conversation"))
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = self.csrf() {
            request = request.header(CSRF_HEADER, token);
        }

        let response = request.send().await?;
        self.capture_csrf(&response);
        if !response.status().is_success() {
            return Err(ApiError::Rejected(format!("HTTP {}", response.status())));
        }

        let body = response.text().await?;
        match serde_json::from_str::<CreateConversationResponse>(&body)? {
            CreateConversationResponse::Success { conversation_id } => Ok(conversation_id),
            CreateConversationResponse::Error { message } => Err(ApiError::Rejected(message)),
        }
    }

    async fn fetch_history(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/conversation-history/{conversation_id}")))
            .send()
            .await?;
        self.capture_csrf(&response);
        if !response.status().is_success() {
            return Err(ApiError::NotFound);
        }

        let body = response.text().await?;
        match serde_json::from_str::<HistoryResponse>(&body)? {
            HistoryResponse::Success { messages } => Ok(messages),
            // An error status on a 2xx history answer still means the
            // identifier is unusable.
            HistoryResponse::Error { .. } => Err(ApiError::NotFound),
        }
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<String, ApiError> {
        let payload = SendMessageRequest {
            conversation_id: conversation_id.to_string(),
            message: text.to_string(),
        };

        let mut request = self
            .client
            .post(self.endpoint("/send-message"))
            .header(CONTENT_TYPE, "application/json")
            .json(&payload);
        if let Some(token) = self.csrf() {
            request = request.header(CSRF_HEADER, token);
        }

        let response = request.send().await?;
        self.capture_csrf(&response);
        if !response.status().is_success() {
            return Err(ApiError::Rejected(format!("HTTP {}", response.status())));
        }

        let body = response.text().await?;
        match serde_json::from_str::<SendMessageResponse>(&body)? {
            SendMessageResponse::Success { response } => Ok(response),
            SendMessageResponse::Error { message } => Err(ApiError::Rejected(message)),
        }
    }
}
