use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use wallet_pairing::account::describe_balance;
use wallet_pairing::authority::{HttpAuthority, SessionAuthority};
use wallet_pairing::clock::Clock;
use wallet_pairing::{
    AuthorityError, CoordinatorConfig, PairingStatus, PollingCoordinator, TimerState,
};
use wallet_pairing_devserver::{AppState, DevServerConfig, SessionStore, router};
use wallet_pairing_transport::wire::{InitSessionRequest, SessionStatus, VerifyRequest};
use wallet_pairing_transport::{AuthorityUrls, TransportError};

const WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
// 64 bytes of 0x09, base64.
const SIGNATURE: &str =
    "CQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQ==";

async fn spawn_devserver() -> (AuthorityUrls, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    let config = DevServerConfig {
        bind_addr: addr,
        ..DevServerConfig::default()
    };
    let app = router(AppState::new(config, Arc::new(SessionStore::new())));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let urls = AuthorityUrls::parse(&format!("http://{addr}/api")).expect("urls");
    (urls, handle)
}

fn authority(urls: &AuthorityUrls) -> HttpAuthority {
    HttpAuthority::new(urls.clone(), Duration::from_secs(5)).expect("authority")
}

fn init_request() -> InitSessionRequest {
    InitSessionRequest {
        user_id: Some("user-42".to_string()),
        origin: Some("https://www.karmacall.com".to_string()),
    }
}

#[tokio::test]
async fn client_drives_session_to_confirmed() {
    let (urls, handle) = spawn_devserver().await;
    let authority = authority(&urls);

    let created = authority
        .init_session(&init_request())
        .await
        .expect("init session");
    assert!(!created.session_id.is_empty());

    let challenge = authority
        .fetch_challenge(&created.session_id)
        .await
        .expect("challenge")
        .expect("challenge issued");
    assert!(challenge.contains(&created.session_id));

    let pending = authority
        .poll_status(&created.session_id)
        .await
        .expect("pending status");
    assert_eq!(pending.status, SessionStatus::Pending);

    let verified = authority
        .verify_session(&VerifyRequest {
            session_id: created.session_id.clone(),
            public_key: WALLET.to_string(),
            signature: SIGNATURE.to_string(),
        })
        .await
        .expect("verify");
    assert!(verified.success);

    let confirmed = authority
        .poll_status(&created.session_id)
        .await
        .expect("confirmed status");
    assert_eq!(confirmed.status, SessionStatus::Confirmed);
    assert_eq!(confirmed.public_key.as_deref(), Some(WALLET));

    handle.abort();
}

#[tokio::test]
async fn unknown_session_surfaces_not_found() {
    let (urls, handle) = spawn_devserver().await;
    let authority = authority(&urls);

    let err = authority
        .poll_status("missing")
        .await
        .expect_err("must be not found");
    assert!(matches!(err, AuthorityError::SessionNotFound));

    let err = authority
        .verify_session(&VerifyRequest {
            session_id: "missing".to_string(),
            public_key: WALLET.to_string(),
            signature: SIGNATURE.to_string(),
        })
        .await
        .expect_err("must be not found");
    assert!(matches!(err, AuthorityError::SessionNotFound));

    handle.abort();
}

#[tokio::test]
async fn rejected_verification_carries_server_detail() {
    let (urls, handle) = spawn_devserver().await;
    let authority = authority(&urls);
    let created = authority
        .init_session(&init_request())
        .await
        .expect("init session");

    let err = authority
        .verify_session(&VerifyRequest {
            session_id: created.session_id.clone(),
            public_key: WALLET.to_string(),
            signature: "c2hvcnQ=".to_string(),
        })
        .await
        .expect_err("short signature");

    match err {
        AuthorityError::Rejected(detail) => assert!(detail.contains("64 bytes")),
        other => panic!("unexpected error: {other}"),
    }

    let status = authority
        .poll_status(&created.session_id)
        .await
        .expect("failed status");
    assert_eq!(status.status, SessionStatus::Failed);

    handle.abort();
}

#[tokio::test]
async fn unreachable_authority_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let urls = AuthorityUrls::parse(&format!("http://{addr}/api")).expect("urls");
    let err = authority(&urls)
        .poll_status("abc123")
        .await
        .expect_err("nothing is listening");

    assert!(matches!(
        err,
        AuthorityError::Http(_) | AuthorityError::Timeout
    ));
}

#[tokio::test]
async fn coordinator_reaches_confirmed_against_devserver() {
    let (urls, handle) = spawn_devserver().await;
    let http = authority(&urls);

    let mut config = CoordinatorConfig::new(
        urls.clone(),
        "https://www.karmacall.com".to_string(),
        Some("user-42".to_string()),
    );
    config.poll_interval = Duration::from_millis(50);

    let coordinator = PollingCoordinator::new(Arc::new(http.clone()), config, Clock::system());
    let mut updates = coordinator.subscribe();

    let started = coordinator.start_session().await.expect("start");
    let session_id = started.session_id.clone().expect("session id");
    let payload = started.qr_payload.expect("payload");
    assert_eq!(payload.session_id, session_id);
    assert!(payload.challenge.is_some());
    assert_eq!(
        payload.endpoints.verify,
        urls.verify().expect("verify url").to_string()
    );

    http.verify_session(&VerifyRequest {
        session_id: session_id.clone(),
        public_key: WALLET.to_string(),
        signature: SIGNATURE.to_string(),
    })
    .await
    .expect("verify");

    let confirmed = timeout(Duration::from_secs(5), async {
        loop {
            updates.changed().await.expect("coordinator alive");
            let snapshot = updates.borrow_and_update().clone();
            if snapshot.status.is_terminal() {
                break snapshot;
            }
        }
    })
    .await
    .expect("confirmation within timeout");

    assert_eq!(confirmed.status, PairingStatus::Confirmed);
    assert_eq!(confirmed.linked_public_key.as_deref(), Some(WALLET));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(coordinator.timer_state(), TimerState::default());

    let balance = http.wallet_balance("user-42").await.expect("balance");
    assert_eq!(describe_balance(&balance), "9xQe...VFin: 0 SOL");

    handle.abort();
}

#[tokio::test]
async fn coordinator_reports_failed_verification() {
    let (urls, handle) = spawn_devserver().await;
    let http = authority(&urls);

    let mut config = CoordinatorConfig::new(
        urls.clone(),
        "https://www.karmacall.com".to_string(),
        Some("user-42".to_string()),
    );
    config.poll_interval = Duration::from_millis(50);

    let coordinator = PollingCoordinator::new(Arc::new(http.clone()), config, Clock::system());
    let mut updates = coordinator.subscribe();
    let session_id = coordinator
        .start_session()
        .await
        .expect("start")
        .session_id
        .expect("session id");

    http.verify_session(&VerifyRequest {
        session_id,
        public_key: WALLET.to_string(),
        signature: "c2hvcnQ=".to_string(),
    })
    .await
    .expect_err("short signature");

    let finished = timeout(Duration::from_secs(5), async {
        loop {
            updates.changed().await.expect("coordinator alive");
            let snapshot = updates.borrow_and_update().clone();
            if snapshot.status.is_terminal() {
                break snapshot;
            }
        }
    })
    .await
    .expect("terminal status within timeout");

    assert_eq!(finished.status, PairingStatus::Failed);
    assert_eq!(finished.countdown, "Expired");

    handle.abort();
}

#[tokio::test]
async fn signed_link_uses_issued_challenge() {
    let (urls, handle) = spawn_devserver().await;
    let http = authority(&urls);

    let message = http
        .generate_link_challenge(WALLET)
        .await
        .expect("link challenge");
    assert!(message.contains(WALLET));

    let err = http
        .link_signed_wallet("user-3", WALLET, SIGNATURE, "not the issued message")
        .await
        .expect_err("unissued message");
    match err {
        AuthorityError::Rejected(detail) => assert!(detail.contains("issued challenge")),
        other => panic!("unexpected error: {other}"),
    }

    http.link_signed_wallet("user-3", WALLET, SIGNATURE, &message)
        .await
        .expect("signed link");
    let balance = http.wallet_balance("user-3").await.expect("balance");
    assert_eq!(balance.wallet_address.as_deref(), Some(WALLET));

    let err = http
        .generate_link_challenge("0OIl")
        .await
        .expect_err("invalid key");
    assert!(matches!(
        err,
        AuthorityError::Transport(TransportError::InvalidAddress(_))
    ));

    handle.abort();
}

#[tokio::test]
async fn manual_link_validates_before_sending() {
    let (urls, handle) = spawn_devserver().await;
    let http = authority(&urls);

    let err = http
        .link_address("user-9", "not-a-wallet")
        .await
        .expect_err("invalid address");
    assert!(matches!(
        err,
        AuthorityError::Transport(TransportError::InvalidAddress(_))
    ));

    http.link_address("user-9", WALLET)
        .await
        .expect("link address");
    let balance = http.wallet_balance("user-9").await.expect("balance");
    assert!(balance.has_wallet);
    assert_eq!(balance.wallet_address.as_deref(), Some(WALLET));

    handle.abort();
}
