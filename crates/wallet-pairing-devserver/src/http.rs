use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use wallet_pairing_transport::validate_solana_address;
use wallet_pairing_transport::wire::{
    BalanceResponse, ChallengeResponse, ConnectWalletRequest, ConnectWalletResponse,
    InitSessionRequest, InitSessionResponse, LinkChallengeResponse, MANUAL_ENTRY_SIGNATURE,
    StatusResponse, VerifyRequest, VerifyResponse,
};

use crate::challenge::{check_signature_shape, generate_challenge, generate_link_challenge};
use crate::state_machine::{StateMachineError, effective_state, status_message};
use crate::store::{CreateSessionInput, StoreError};
use crate::{AppState, now_ms};

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/solana/qr-init", post(qr_init))
        .route("/solana/qr-challenge", get(qr_challenge))
        .route("/solana/qr-status", get(qr_status))
        .route("/solana/qr-verify", post(qr_verify))
        .route("/solana/balance", get(balance))
        .route("/solana/generateChallenge", get(link_challenge))
        .route("/solana/connectWallet", post(connect_wallet));

    Router::new().nest("/api", api).with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionQuery {
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyQuery {
    public_key: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(session_id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("session '{session_id}' not found"),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        let status = match &error {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Transition(StateMachineError::AlreadyConfirmed) => StatusCode::CONFLICT,
            StoreError::Transition(StateMachineError::Expired | StateMachineError::Failed) => {
                StatusCode::GONE
            }
        };

        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn qr_init(
    State(state): State<AppState>,
    Json(request): Json<InitSessionRequest>,
) -> Result<Json<InitSessionResponse>, ApiError> {
    let created_at_ms = now_ms();
    let expires_at_ms = created_at_ms
        .checked_add(state.config.session_ttl_ms)
        .ok_or_else(|| ApiError::bad_request("session expiry overflowed"))?;

    let session_id = Uuid::new_v4().to_string();
    let challenge = generate_challenge(&state.rng, &session_id)
        .map_err(|error| ApiError::internal(error.to_string()))?;

    state.store.create_session(CreateSessionInput {
        session_id: session_id.clone(),
        user_id: request.user_id,
        origin: request.origin,
        challenge,
        created_at_ms,
        expires_at_ms,
    });

    info!(%session_id, expires_at_ms, "pairing session created");

    Ok(Json(InitSessionResponse {
        success: true,
        session_id: Some(session_id),
        expires_at: Some(expires_at_ms),
        message: None,
    }))
}

async fn qr_challenge(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let record = state
        .store
        .get_session(&query.session_id)
        .ok_or_else(|| ApiError::not_found(&query.session_id))?;

    Ok(Json(ChallengeResponse {
        success: true,
        challenge: Some(record.challenge.clone()),
        message: Some(record.challenge),
    }))
}

async fn qr_status(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let record = state
        .store
        .get_session(&query.session_id)
        .ok_or_else(|| ApiError::not_found(&query.session_id))?;

    let current = effective_state(record.state, record.expires_at_ms, now_ms());
    debug!(session_id = %query.session_id, state = ?current, "status queried");

    Ok(Json(StatusResponse {
        status: current.as_status(),
        message: Some(status_message(current).to_string()),
        public_key: record.public_key,
    }))
}

async fn qr_verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    if state.store.get_session(&request.session_id).is_none() {
        return Err(ApiError::not_found(&request.session_id));
    }

    validate_solana_address(&request.public_key)
        .map_err(|error| ApiError::bad_request(error.to_string()))?;

    if let Err(error) = check_signature_shape(&request.signature) {
        state
            .store
            .fail_session(&request.session_id, now_ms())
            .inspect(|_| {
                warn!(session_id = %request.session_id, %error, "pairing session failed");
            })?;
        return Err(ApiError::bad_request(error.to_string()));
    }

    let record = state
        .store
        .confirm_session(&request.session_id, &request.public_key, now_ms())
        .inspect_err(|error| {
            warn!(session_id = %request.session_id, %error, "verification refused");
        })?;

    info!(session_id = %record.session_id, "pairing session confirmed");

    Ok(Json(VerifyResponse {
        success: true,
        message: Some(status_message(record.state).to_string()),
    }))
}

async fn balance(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<BalanceResponse> {
    let wallet_address = state.store.wallet_for(&query.user_id);

    Json(BalanceResponse {
        has_wallet: wallet_address.is_some(),
        available_balance: wallet_address.as_ref().map(|_| 0.0),
        wallet_address,
    })
}

async fn link_challenge(
    State(state): State<AppState>,
    Query(query): Query<PublicKeyQuery>,
) -> Result<Json<LinkChallengeResponse>, ApiError> {
    validate_solana_address(&query.public_key)
        .map_err(|error| ApiError::bad_request(error.to_string()))?;

    let message = generate_link_challenge(&state.rng, &query.public_key)
        .map_err(|error| ApiError::internal(error.to_string()))?;
    state.store.issue_link_challenge(&query.public_key, &message);
    debug!(public_key = %query.public_key, "link challenge issued");

    Ok(Json(LinkChallengeResponse {
        success: true,
        message: Some(message),
    }))
}

async fn connect_wallet(
    State(state): State<AppState>,
    Json(request): Json<ConnectWalletRequest>,
) -> Result<Json<ConnectWalletResponse>, ApiError> {
    if request.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("userId must not be empty"));
    }

    validate_solana_address(&request.public_key)
        .map_err(|error| ApiError::bad_request(error.to_string()))?;

    if request.signature != MANUAL_ENTRY_SIGNATURE {
        check_signature_shape(&request.signature)
            .map_err(|error| ApiError::bad_request(error.to_string()))?;

        if !state
            .store
            .redeem_link_challenge(&request.public_key, &request.message)
        {
            return Err(ApiError::bad_request(
                "message does not match an issued challenge",
            ));
        }
    }

    state.store.link_wallet(&request.user_id, &request.public_key);
    info!(user_id = %request.user_id, "wallet linked");

    Ok(Json(ConnectWalletResponse {
        success: true,
        message: Some("Wallet connected".to_string()),
        error: None,
    }))
}
