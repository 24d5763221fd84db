use serde_json::json;

use crate::support;

#[tokio::test]
async fn verify_handshake_echoes_challenge() {
    let server = support::spawn_server().await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/webhooks/whatsapp", server.addr))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "test-verify-token"),
            ("hub.challenge", "314159"),
        ])
        .send()
        .await
        .expect("handshake should send");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.expect("challenge body expected");
    assert_eq!(body, "314159");

    server.stop().await;
}

#[tokio::test]
async fn verify_handshake_rejects_wrong_token() {
    let server = support::spawn_server().await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/webhooks/whatsapp", server.addr))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "not-the-token"),
            ("hub.challenge", "314159"),
        ])
        .send()
        .await
        .expect("handshake should send");

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    let body = response.text().await.expect("error body expected");
    assert!(!body.contains("314159"));

    server.stop().await;
}

#[tokio::test]
async fn verify_handshake_without_configured_token_is_unavailable() {
    let server = support::spawn_server_with(|config| {
        config.whatsapp_verify_token = None;
    })
    .await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/webhooks/whatsapp", server.addr))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "test-verify-token"),
            ("hub.challenge", "314159"),
        ])
        .send()
        .await
        .expect("handshake should send");

    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    server.stop().await;
}

#[tokio::test]
async fn message_delivery_creates_client_ticket_and_message() {
    let server = support::spawn_server().await;

    let payload =
        support::whatsapp_text_delivery("wamid.INT.001", "15557770001", "My order never arrived");
    let response = support::post_whatsapp(server.addr, &payload).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let ack: serde_json::Value = response.json().await.expect("ack payload expected");
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["processed"], 1);
    assert_eq!(ack["duplicates"], 0);
    assert_eq!(ack["failed"], 0);

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["clients"], 1);
    assert_eq!(counts["tickets"], 1);
    assert_eq!(counts["unreadTickets"], 1);
    assert_eq!(counts["messages"], 1);
    assert_eq!(counts["syncLogEntries"], 1);

    server.stop().await;
}

#[tokio::test]
async fn redelivered_message_is_absorbed_without_new_rows() {
    let server = support::spawn_server().await;

    let payload =
        support::whatsapp_text_delivery("wamid.INT.002", "15557770002", "Retry storms happen");
    let first = support::post_whatsapp(server.addr, &payload).await;
    assert_eq!(first.status(), reqwest::StatusCode::OK);

    let second = support::post_whatsapp(server.addr, &payload).await;
    assert_eq!(second.status(), reqwest::StatusCode::OK);
    let ack: serde_json::Value = second.json().await.expect("ack payload expected");
    assert_eq!(ack["processed"], 0);
    assert_eq!(ack["duplicates"], 1);

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["clients"], 1);
    assert_eq!(counts["tickets"], 1);
    assert_eq!(counts["messages"], 1);
    assert_eq!(counts["syncLogEntries"], 1);

    server.stop().await;
}

#[tokio::test]
async fn follow_up_message_reuses_the_open_ticket() {
    let server = support::spawn_server().await;

    let first = support::whatsapp_text_delivery("wamid.INT.003", "15557770003", "First question");
    support::post_whatsapp(server.addr, &first).await;

    let second =
        support::whatsapp_text_delivery("wamid.INT.004", "15557770003", "Second question");
    let response = support::post_whatsapp(server.addr, &second).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["clients"], 1);
    assert_eq!(counts["tickets"], 1);
    assert_eq!(counts["messages"], 2);

    server.stop().await;
}

#[tokio::test]
async fn status_callback_updates_known_message() {
    let server = support::spawn_server().await;

    let message =
        support::whatsapp_text_delivery("wamid.INT.005", "15557770005", "Waiting on a reply");
    support::post_whatsapp(server.addr, &message).await;

    let status = support::whatsapp_status_delivery("wamid.INT.005", "delivered");
    let response = support::post_whatsapp(server.addr, &status).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let ack: serde_json::Value = response.json().await.expect("ack payload expected");
    assert_eq!(ack["processed"], 1);
    assert_eq!(ack["skipped"], 0);

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["messages"], 1);
    assert_eq!(counts["syncLogEntries"], 2);

    server.stop().await;
}

#[tokio::test]
async fn status_callback_for_unknown_message_is_skipped_and_audited() {
    let server = support::spawn_server().await;

    let status = support::whatsapp_status_delivery("wamid.NEVER.SEEN", "failed");
    let response = support::post_whatsapp(server.addr, &status).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let ack: serde_json::Value = response.json().await.expect("ack payload expected");
    assert_eq!(ack["processed"], 0);
    assert_eq!(ack["skipped"], 1);

    let entries = support::sync_log_entries(server.addr).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["entityType"], "message");
    assert_eq!(entries[0]["outcome"], "failed");

    server.stop().await;
}

#[tokio::test]
async fn foreign_object_discriminator_is_rejected_before_ingest() {
    let server = support::spawn_server().await;

    let payload = json!({
        "object": "page",
        "entry": [{"id": "0", "changes": []}]
    });
    let response = support::post_whatsapp(server.addr, &payload).await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.expect("error body expected");
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["clients"], 0);
    assert_eq!(counts["messages"], 0);

    server.stop().await;
}

#[tokio::test]
async fn malformed_item_does_not_block_valid_siblings() {
    let server = support::spawn_server().await;

    let payload = json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "1031111111111111",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "messages": [
                        {"id": "wamid.INT.006", "timestamp": "1700000000",
                         "type": "text", "text": {"body": "No sender on this one"}},
                        {"id": "wamid.INT.007", "from": "15557770007",
                         "timestamp": "1700000001", "type": "text",
                         "text": {"body": "This one is fine"}}
                    ]
                }
            }]
        }]
    });

    let response = support::post_whatsapp(server.addr, &payload).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let ack: serde_json::Value = response.json().await.expect("ack payload expected");
    assert_eq!(ack["processed"], 1);
    assert_eq!(ack["failed"], 1);

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["messages"], 1);

    server.stop().await;
}

#[tokio::test]
async fn concurrent_first_contact_converges_on_one_client() {
    let server = support::spawn_server().await;

    let left = support::whatsapp_text_delivery("wamid.INT.008", "15557770008", "Hello from tab A");
    let right = support::whatsapp_text_delivery("wamid.INT.009", "15557770008", "Hello from tab B");

    let (first, second) = tokio::join!(
        support::post_whatsapp(server.addr, &left),
        support::post_whatsapp(server.addr, &right)
    );
    assert_eq!(first.status(), reqwest::StatusCode::OK);
    assert_eq!(second.status(), reqwest::StatusCode::OK);

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["clients"], 1);
    assert_eq!(counts["messages"], 2);

    server.stop().await;
}
