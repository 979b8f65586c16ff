use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, spawn_blocking};
use tokio::time::{Instant, sleep};
use wallet_pairing::artifact_paths;
use wallet_pairing::cli::ArtifactArgs;
use wallet_pairing::config::PairingConfig;
use wallet_pairing::connect::{ConnectRunInput, run_connect};
use wallet_pairing_devserver::{AppState, DevServerConfig, SessionStore, router};
use wallet_pairing_transport::{QrPayloadV1, decode_qr_payload};

const WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
// 64 bytes of 0x09, base64.
const SIGNATURE: &str =
    "CQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQ==";
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

async fn spawn_devserver(session_ttl_ms: u64) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    let config = DevServerConfig {
        bind_addr: addr,
        session_ttl_ms,
        ..DevServerConfig::default()
    };
    let app = router(AppState::new(config, Arc::new(SessionStore::new())));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (format!("http://{addr}/api"), handle)
}

fn connect_input(api_url: &str, out_dir: &Path) -> ConnectRunInput {
    ConnectRunInput {
        config: PairingConfig {
            api_url: api_url.to_string(),
            user_id: Some("user-42".to_string()),
            poll_interval_ms: 50,
            ..PairingConfig::default()
        },
        artifacts: ArtifactArgs {
            out_dir: out_dir.to_path_buf(),
            pixel_per_module: 4,
        },
    }
}

async fn wait_for_payload(out_dir: &Path) -> (PathBuf, QrPayloadV1) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let entries = fs::read_dir(out_dir).ok().into_iter().flatten().flatten();
        let written = entries.find_map(|entry| {
            let path = entry.path();
            if !path.to_str()?.ends_with(".qr_payload.json") {
                return None;
            }
            // The file may still be half written.
            let raw = fs::read_to_string(&path).ok()?;
            decode_qr_payload(raw.trim()).ok().map(|payload| (path, payload))
        });

        if let Some(found) = written {
            return found;
        }
        assert!(Instant::now() < deadline, "connect never wrote a payload");
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_writes_artifacts_and_succeeds_once_confirmed() {
    let (api_url, handle) = spawn_devserver(120_000).await;
    let tmp = tempdir().expect("tempdir");

    let input = connect_input(&api_url, tmp.path());
    let connect = thread::spawn(move || run_connect(input));

    let (payload_path, payload) = wait_for_payload(tmp.path()).await;
    let (expected_payload_path, png_path) = artifact_paths(tmp.path(), &payload.session_id);
    assert_eq!(payload_path, expected_payload_path);
    assert_eq!(payload.metadata.user_id.as_deref(), Some("user-42"));
    assert!(payload.challenge.is_some());

    let scanned = payload_path.to_string_lossy().to_string();
    let verify_url = api_url.clone();
    let verify = spawn_blocking(move || {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("wallet-pairing"));
        for key in [
            "WALLET_PAIRING_API_URL",
            "WALLET_PAIRING_ORIGIN",
            "WALLET_PAIRING_USER_ID",
            "WALLET_PAIRING_POLL_INTERVAL_MS",
            "WALLET_PAIRING_REQUEST_TIMEOUT_MS",
        ] {
            cmd.env_remove(key);
        }
        cmd.args([
            "verify",
            "--payload",
            &scanned,
            "--public-key",
            WALLET,
            "--signature",
            SIGNATURE,
            "--api-url",
            &verify_url,
        ])
        .output()
    })
    .await
    .expect("verify task")
    .expect("run verify");
    assert!(verify.status.success(), "verify failed: {verify:?}");
    let stdout = String::from_utf8(verify.stdout).expect("utf8 stdout");
    assert!(stdout.contains(&format!("session_id: {}", payload.session_id)));

    let result = spawn_blocking(move || connect.join())
        .await
        .expect("join task")
        .expect("connect thread");
    result.expect("connect ends confirmed");

    let png = fs::read(&png_path).expect("png readable");
    assert!(png.starts_with(PNG_MAGIC));

    handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_fails_when_session_expires_unconfirmed() {
    let (api_url, handle) = spawn_devserver(400).await;
    let tmp = tempdir().expect("tempdir");

    let input = connect_input(&api_url, tmp.path());
    let connect = thread::spawn(move || run_connect(input));

    let (payload_path, _) = wait_for_payload(tmp.path()).await;
    assert!(payload_path.starts_with(tmp.path()));

    let result = spawn_blocking(move || connect.join())
        .await
        .expect("join task")
        .expect("connect thread");
    let err = result.expect_err("an expired session is a failure");
    assert!(
        err.to_string().contains("pairing ended with status expired"),
        "{err:#}"
    );

    handle.abort();
}
