use crate::support;

#[tokio::test]
async fn health_reports_runtime_identity_and_counts() {
    let server = support::spawn_server().await;

    let before = support::health_counts(server.addr).await;
    assert_eq!(before["ok"], true);
    assert_eq!(before["runtime"], "rust");
    assert_eq!(before["version"], "test");
    assert_eq!(before["deskVerification"], "insecure-unsigned");
    assert!(before["ts"].is_number());
    assert!(before["uptimeMs"].is_number());
    assert_eq!(before["clients"], 0);
    assert_eq!(before["tickets"], 0);
    assert_eq!(before["unreadTickets"], 0);
    assert_eq!(before["messages"], 0);
    assert_eq!(before["syncLogEntries"], 0);

    let payload =
        support::whatsapp_text_delivery("wamid.HL.001", "15559990001", "Counting this one");
    support::post_whatsapp(server.addr, &payload).await;

    let after = support::health_counts(server.addr).await;
    assert_eq!(after["clients"], 1);
    assert_eq!(after["tickets"], 1);
    assert_eq!(after["unreadTickets"], 1);
    assert_eq!(after["messages"], 1);
    assert_eq!(after["syncLogEntries"], 1);

    server.stop().await;
}

#[tokio::test]
async fn sync_logs_return_newest_first() {
    let server = support::spawn_server().await;

    let first = support::whatsapp_text_delivery("wamid.HL.002", "15559990002", "First in");
    support::post_whatsapp(server.addr, &first).await;
    let second = support::whatsapp_text_delivery("wamid.HL.003", "15559990002", "Second in");
    support::post_whatsapp(server.addr, &second).await;

    let entries = support::sync_log_entries(server.addr).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["externalId"], "wamid.HL.003");
    assert_eq!(entries[1]["externalId"], "wamid.HL.002");
    assert_eq!(entries[0]["entityType"], "message");
    assert_eq!(entries[0]["direction"], "inbound");
    assert_eq!(entries[0]["outcome"], "synced");

    server.stop().await;
}

#[tokio::test]
async fn sync_logs_respect_limit_parameter() {
    let server = support::spawn_server().await;

    let first = support::whatsapp_text_delivery("wamid.HL.004", "15559990004", "One");
    support::post_whatsapp(server.addr, &first).await;
    let second = support::whatsapp_text_delivery("wamid.HL.005", "15559990004", "Two");
    support::post_whatsapp(server.addr, &second).await;

    let response = reqwest::get(format!("http://{}/sync/logs?limit=1", server.addr))
        .await
        .expect("sync log endpoint should respond");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let payload: serde_json::Value = response.json().await.expect("sync log payload expected");
    assert_eq!(payload["ok"], true);
    let entries = payload["entries"].as_array().expect("entries array expected");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["externalId"], "wamid.HL.005");

    server.stop().await;
}
