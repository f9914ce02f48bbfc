//! Admin API over a real socket.

use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_admin_requires_token() {
    let (addr, shutdown) = common::spawn_guard(common::admin_config()).await;
    let client = common::client();

    let res = client
        .get(format!("http://{addr}/admin/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("http://{addr}/admin/status"))
        .bearer_auth("wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let events: Value = client
        .get(format!("http://{addr}/admin/events"))
        .bearer_auth(common::ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e["event_type"] == "unauthorized_access"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_block_reset_and_user_history() {
    let (addr, shutdown) = common::spawn_guard(common::admin_config()).await;
    let client = common::client();
    let check_url = format!("http://{addr}/v1/permissions/check");
    let check_body = json!({ "user_id": "mallory", "action": "STORY_CREATE", "content": "hello" });

    let res = client
        .post(format!("http://{addr}/admin/limits/block"))
        .bearer_auth(common::ADMIN_KEY)
        .json(&json!({ "user_id": "mallory", "action": "STORY_CREATE", "duration_ms": 600000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.post(&check_url).json(&check_body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["blocked"], true);
    assert_eq!(
        body["error"],
        "You have been temporarily blocked. Please try again later."
    );

    let history: Value = client
        .get(format!("http://{addr}/admin/users/mallory/events?limit=5"))
        .bearer_auth(common::ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["event_type"], "rate_limit");
    assert_eq!(history[0]["metadata"]["blocked"], true);

    let res = client
        .post(format!("http://{addr}/admin/limits/reset"))
        .bearer_auth(common::ADMIN_KEY)
        .json(&json!({ "user_id": "mallory", "action": "STORY_CREATE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.post(&check_url).json(&check_body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test]
async fn test_stats_window_and_clear() {
    let (addr, shutdown) = common::spawn_guard(common::admin_config()).await;
    let client = common::client();

    let res = client
        .post(format!("http://{addr}/v1/permissions/check"))
        .json(&json!({ "user_id": "eve", "action": "COMMENT_CREATE", "content": "' OR 1=1 --" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let stats: Value = client
        .get(format!("http://{addr}/admin/stats?window_ms=60000"))
        .bearer_auth(common::ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["window_ms"], 60000);
    assert_eq!(stats["events_by_type"]["injection_attempt"], 1);

    let res = client
        .delete(format!("http://{addr}/admin/events"))
        .bearer_auth(common::ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let status: Value = client
        .get(format!("http://{addr}/admin/status"))
        .bearer_auth(common::ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["buffered_events"], 0);
    assert_eq!(status["status"], "operational");

    shutdown.trigger();
}
