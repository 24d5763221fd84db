use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use deskgate_core::{
    application::{config::RuntimeConfig, startup},
    interfaces::desk::DESK_SIGNATURE_HEADER,
};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use tempfile::TempDir;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

pub(crate) struct ServerHandle {
    pub(crate) addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl ServerHandle {
    pub(crate) async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = self.join.await;
    }
}

pub(crate) async fn spawn_server() -> ServerHandle {
    spawn_server_with(|_: &mut RuntimeConfig| {}).await
}

pub(crate) async fn spawn_server_with(configure: impl FnOnce(&mut RuntimeConfig)) -> ServerHandle {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("listener should bind");
    let addr = listener
        .local_addr()
        .expect("listener should expose local addr");

    let temp_dir = tempfile::tempdir().expect("temp dir should be created");
    let db_path = temp_dir.path().join("deskgate.db");

    let mut config = RuntimeConfig::for_test(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port(), db_path);
    configure(&mut config);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        let _ = startup::run_with_listener(listener, config, async {
            let _ = shutdown_rx.await;
        })
        .await;
    });

    ServerHandle {
        addr,
        shutdown: Some(shutdown_tx),
        join,
        _temp_dir: temp_dir,
    }
}

pub(crate) fn desk_signature(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub(crate) fn whatsapp_text_delivery(message_id: &str, from: &str, body: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "1031111111111111",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550001111",
                        "phone_number_id": "1065555555555555"
                    },
                    "contacts": [{"profile": {"name": "Integration Contact"}, "wa_id": from}],
                    "messages": [{
                        "from": from,
                        "id": message_id,
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": {"body": body}
                    }]
                }
            }]
        }]
    })
}

pub(crate) fn whatsapp_status_delivery(message_id: &str, status: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "1031111111111111",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "statuses": [{
                        "id": message_id,
                        "status": status,
                        "timestamp": "1700000060",
                        "recipient_id": "15557770001"
                    }]
                }
            }]
        }]
    })
}

pub(crate) async fn post_whatsapp(addr: SocketAddr, payload: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/webhooks/whatsapp"))
        .json(payload)
        .send()
        .await
        .expect("whatsapp delivery should send")
}

pub(crate) async fn post_desk(
    addr: SocketAddr,
    signature: Option<&str>,
    payload: &Value,
) -> reqwest::Response {
    let body = serde_json::to_vec(payload).expect("payload should serialize");
    let mut request = reqwest::Client::new()
        .post(format!("http://{addr}/webhooks/desk"))
        .header("content-type", "application/json")
        .body(body);

    if let Some(signature) = signature {
        request = request.header(DESK_SIGNATURE_HEADER, signature);
    }

    request.send().await.expect("desk delivery should send")
}

pub(crate) async fn post_desk_signed(
    addr: SocketAddr,
    secret: &str,
    payload: &Value,
) -> reqwest::Response {
    let body = serde_json::to_vec(payload).expect("payload should serialize");
    let signature = desk_signature(secret, &body);

    reqwest::Client::new()
        .post(format!("http://{addr}/webhooks/desk"))
        .header("content-type", "application/json")
        .header(DESK_SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await
        .expect("desk delivery should send")
}

pub(crate) async fn health_counts(addr: SocketAddr) -> Value {
    let response = reqwest::get(format!("http://{addr}/healthz"))
        .await
        .expect("health endpoint should respond");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    response.json().await.expect("health payload expected")
}

pub(crate) async fn sync_log_entries(addr: SocketAddr) -> Vec<Value> {
    let response = reqwest::get(format!("http://{addr}/sync/logs"))
        .await
        .expect("sync log endpoint should respond");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let payload: Value = response.json().await.expect("sync log payload expected");
    payload["entries"].as_array().cloned().unwrap_or_default()
}
