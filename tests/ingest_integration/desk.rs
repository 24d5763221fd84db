use deskgate_core::application::config::DeskVerification;
use serde_json::json;

use crate::support;

fn ticket_add(id: &str, description: Option<&str>) -> serde_json::Value {
    let mut payload = json!({
        "id": id,
        "subject": "Broken delivery",
        "status": "Open",
        "priority": "High",
        "channel": "Email",
        "contact": {
            "id": "CONT-1",
            "firstName": "Integration",
            "lastName": "Contact",
            "email": "contact@example.com"
        }
    });
    if let Some(text) = description {
        payload["description"] = json!(text);
    }

    json!({"eventType": "ticket.add", "payload": payload})
}

fn thread_add(ticket_id: &str, content: &str, created_time: &str) -> serde_json::Value {
    json!({
        "eventType": "thread.add",
        "payload": {
            "ticketId": ticket_id,
            "content": content,
            "direction": "in",
            "createdTime": created_time
        }
    })
}

#[tokio::test]
async fn signed_mode_rejects_missing_signature() {
    let server = support::spawn_server_with(|config| {
        config.desk_verification = DeskVerification::Secret("hunter2".to_owned());
    })
    .await;

    let response = support::post_desk(server.addr, None, &ticket_add("ZD-6001", None)).await;
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = response.json().await.expect("error body expected");
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["clients"], 0);
    assert_eq!(counts["tickets"], 0);
    assert_eq!(counts["syncLogEntries"], 0);

    server.stop().await;
}

#[tokio::test]
async fn signed_mode_rejects_forged_signature() {
    let server = support::spawn_server_with(|config| {
        config.desk_verification = DeskVerification::Secret("hunter2".to_owned());
    })
    .await;

    let payload = ticket_add("ZD-6002", None);
    let body = serde_json::to_vec(&payload).expect("payload should serialize");
    let forged = support::desk_signature("not-the-secret", &body);

    let response = support::post_desk(server.addr, Some(&forged), &payload).await;
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["tickets"], 0);
    assert!(support::sync_log_entries(server.addr).await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn signed_mode_accepts_valid_signature() {
    let server = support::spawn_server_with(|config| {
        config.desk_verification = DeskVerification::Secret("hunter2".to_owned());
    })
    .await;

    let response =
        support::post_desk_signed(server.addr, "hunter2", &ticket_add("ZD-6003", None)).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let ack: serde_json::Value = response.json().await.expect("ack payload expected");
    assert_eq!(ack["success"], true);
    assert!(ack["ticketId"].is_string());

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["tickets"], 1);

    server.stop().await;
}

#[tokio::test]
async fn insecure_mode_accepts_unsigned_delivery() {
    let server = support::spawn_server().await;

    let response = support::post_desk(server.addr, None, &ticket_add("ZD-6004", None)).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let ack: serde_json::Value = response.json().await.expect("ack payload expected");
    assert_eq!(ack["success"], true);

    server.stop().await;
}

#[tokio::test]
async fn redelivered_ticket_add_converges_on_one_ticket() {
    let server = support::spawn_server().await;

    let payload = ticket_add("ZD-7001", Some("Package arrived broken"));
    let first = support::post_desk(server.addr, None, &payload).await;
    let first_ack: serde_json::Value = first.json().await.expect("ack payload expected");

    let second = support::post_desk(server.addr, None, &payload).await;
    assert_eq!(second.status(), reqwest::StatusCode::OK);
    let second_ack: serde_json::Value = second.json().await.expect("ack payload expected");

    assert_eq!(second_ack["success"], true);
    assert_eq!(second_ack["ticketId"], first_ack["ticketId"]);

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["clients"], 1);
    assert_eq!(counts["tickets"], 1);
    assert_eq!(counts["messages"], 1);

    server.stop().await;
}

#[tokio::test]
async fn ticket_update_before_create_self_heals() {
    let server = support::spawn_server().await;

    let update = json!({
        "eventType": "ticket.update",
        "payload": {"id": "ZD-7002", "status": "Closed", "priority": "Urgent"}
    });
    let update_response = support::post_desk(server.addr, None, &update).await;
    assert_eq!(update_response.status(), reqwest::StatusCode::OK);
    let update_ack: serde_json::Value =
        update_response.json().await.expect("ack payload expected");
    assert!(update_ack["ticketId"].is_string());

    let create_response =
        support::post_desk(server.addr, None, &ticket_add("ZD-7002", None)).await;
    assert_eq!(create_response.status(), reqwest::StatusCode::OK);
    let create_ack: serde_json::Value =
        create_response.json().await.expect("ack payload expected");
    assert_eq!(create_ack["ticketId"], update_ack["ticketId"]);

    let counts = support::health_counts(server.addr).await;
    // Placeholder contact from the early update plus the real contact.
    assert_eq!(counts["clients"], 2);
    assert_eq!(counts["tickets"], 1);

    server.stop().await;
}

#[tokio::test]
async fn thread_entries_within_window_are_deduplicated() {
    let server = support::spawn_server().await;

    support::post_desk(server.addr, None, &ticket_add("ZD-7003", None)).await;

    let first = support::post_desk(
        server.addr,
        None,
        &thread_add("ZD-7003", "Any update?", "2024-03-01T10:15:30Z"),
    )
    .await;
    let first_ack: serde_json::Value = first.json().await.expect("ack payload expected");
    assert!(first_ack["messageId"].is_string());

    let replay = support::post_desk(
        server.addr,
        None,
        &thread_add("ZD-7003", "Any update?", "2024-03-01T10:15:33Z"),
    )
    .await;
    let replay_ack: serde_json::Value = replay.json().await.expect("ack payload expected");
    assert_eq!(replay_ack["duplicate"], true);

    let later = support::post_desk(
        server.addr,
        None,
        &thread_add("ZD-7003", "Any update?", "2024-03-01T10:15:40Z"),
    )
    .await;
    let later_ack: serde_json::Value = later.json().await.expect("ack payload expected");
    assert!(later_ack["messageId"].is_string());

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["messages"], 2);

    server.stop().await;
}

#[tokio::test]
async fn thread_for_unknown_ticket_is_skipped_and_audited() {
    let server = support::spawn_server().await;

    let response = support::post_desk(
        server.addr,
        None,
        &thread_add("ZD-NONE", "Hello?", "2024-03-01T10:15:30Z"),
    )
    .await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let ack: serde_json::Value = response.json().await.expect("ack payload expected");
    assert_eq!(ack["success"], true);
    assert_eq!(ack["skipped"], true);

    let entries = support::sync_log_entries(server.addr).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["outcome"], "failed");
    assert_eq!(entries[0]["externalId"], "ZD-NONE");

    server.stop().await;
}

#[tokio::test]
async fn unknown_event_type_is_acknowledged_and_ignored() {
    let server = support::spawn_server().await;

    let payload = json!({"eventType": "Call_Add", "payload": {"id": 1}});
    let response = support::post_desk(server.addr, None, &payload).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let ack: serde_json::Value = response.json().await.expect("ack payload expected");
    assert_eq!(ack["success"], true);
    assert_eq!(ack["ignored"], true);
    assert_eq!(ack["eventType"], "Call_Add");

    let counts = support::health_counts(server.addr).await;
    assert_eq!(counts["tickets"], 0);
    assert_eq!(counts["syncLogEntries"], 0);

    server.stop().await;
}

#[tokio::test]
async fn delivery_without_event_type_is_rejected() {
    let server = support::spawn_server().await;

    let response = support::post_desk(server.addr, None, &json!({"payload": {}})).await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.expect("error body expected");
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");

    server.stop().await;
}

#[tokio::test]
async fn underscored_event_type_spelling_is_accepted() {
    let server = support::spawn_server().await;

    let payload = json!({
        "eventType": "Ticket_Add",
        "payload": {"id": "ZD-7004", "subject": "Underscore spelling"}
    });
    let response = support::post_desk(server.addr, None, &payload).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let ack: serde_json::Value = response.json().await.expect("ack payload expected");
    assert_eq!(ack["success"], true);
    assert_eq!(ack["eventType"], "Ticket_Add");
    assert!(ack["ticketId"].is_string());

    server.stop().await;
}

#[tokio::test]
async fn probe_answers_ok() {
    let server = support::spawn_server().await;

    let response = reqwest::get(format!("http://{}/webhooks/desk", server.addr))
        .await
        .expect("probe should respond");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = response.json().await.expect("probe body expected");
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "deskgate-core");

    server.stop().await;
}
