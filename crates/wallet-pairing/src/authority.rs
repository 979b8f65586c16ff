use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;
use wallet_pairing_transport::AuthorityUrls;
use wallet_pairing_transport::wire::{
    ChallengeResponse, ErrorBody, InitSessionRequest, InitSessionResponse, StatusResponse,
    VerifyRequest, VerifyResponse,
};

use crate::error::AuthorityError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub session_id: String,
    pub expires_at_ms: u64,
}

/// The remote session authority as seen by the desktop side.
///
/// Implementations hold no session state and never retry; the coordinator
/// decides what a failure means.
#[async_trait]
pub trait SessionAuthority: Send + Sync {
    async fn init_session(
        &self,
        request: &InitSessionRequest,
    ) -> Result<CreatedSession, AuthorityError>;

    /// `Ok(None)` when the authority has not issued a challenge.
    async fn fetch_challenge(&self, session_id: &str) -> Result<Option<String>, AuthorityError>;

    /// HTTP 404 surfaces as [`AuthorityError::SessionNotFound`].
    async fn poll_status(&self, session_id: &str) -> Result<StatusResponse, AuthorityError>;
}

#[derive(Debug, Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    urls: AuthorityUrls,
}

impl HttpAuthority {
    pub fn new(urls: AuthorityUrls, request_timeout: Duration) -> Result<Self, AuthorityError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(AuthorityError::Http)?;

        Ok(Self { client, urls })
    }

    #[must_use]
    pub const fn urls(&self) -> &AuthorityUrls {
        &self.urls
    }

    /// Mobile side of the pairing: submit the signed challenge.
    pub async fn verify_session(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, AuthorityError> {
        let response = self
            .client
            .post(self.urls.verify()?)
            .json(request)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AuthorityError::SessionNotFound);
        }

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response)
                .await
                .unwrap_or_else(|| format!("verification failed with HTTP status {status}"));
            return Err(AuthorityError::Rejected(detail));
        }

        let verified: VerifyResponse = response.json().await?;
        if !verified.success {
            return Err(AuthorityError::Rejected(
                verified
                    .message
                    .unwrap_or_else(|| "failed to verify wallet".to_string()),
            ));
        }

        Ok(verified)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, AuthorityError> {
        debug!(%url, "authority GET");
        let response = self.client.get(url).send().await?;
        decode_success(response).await
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl SessionAuthority for HttpAuthority {
    async fn init_session(
        &self,
        request: &InitSessionRequest,
    ) -> Result<CreatedSession, AuthorityError> {
        let response = self
            .client
            .post(self.urls.init()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthorityError::Init(format!(
                "authority returned HTTP status {}",
                response.status()
            )));
        }

        let created: InitSessionResponse = response.json().await?;
        if !created.success {
            return Err(AuthorityError::Init(
                created
                    .message
                    .unwrap_or_else(|| "authority reported failure".to_string()),
            ));
        }

        let session_id = created
            .session_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AuthorityError::Init("response omitted sessionId".to_string()))?;
        let expires_at_ms = created
            .expires_at
            .ok_or_else(|| AuthorityError::Init("response omitted expiresAt".to_string()))?;

        Ok(CreatedSession {
            session_id,
            expires_at_ms,
        })
    }

    async fn fetch_challenge(&self, session_id: &str) -> Result<Option<String>, AuthorityError> {
        let challenge: ChallengeResponse = self.get_json(self.urls.challenge(session_id)?).await?;
        Ok(challenge.into_challenge())
    }

    async fn poll_status(&self, session_id: &str) -> Result<StatusResponse, AuthorityError> {
        self.get_json(self.urls.status(session_id)?).await
    }
}

pub(crate) async fn decode_success<T: DeserializeOwned>(
    response: Response,
) -> Result<T, AuthorityError> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(AuthorityError::SessionNotFound),
        status if !status.is_success() => Err(AuthorityError::RequestFailed(status.as_u16())),
        _ => Ok(response.json().await?),
    }
}

pub(crate) async fn error_detail(response: Response) -> Option<String> {
    response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::into_detail)
}
