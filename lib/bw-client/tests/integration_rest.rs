// lib/bw-client/tests/integration_rest.rs

use async_trait::async_trait;
use bw_client::{
    BwError, HttpExchange, ItemType, ListFilter, Login, LoginUri, Object, ObjectClient, ObjectType, RestClient,
    RetryPolicy, VaultStatus,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{any, body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retries() -> RetryPolicy {
    RetryPolicy::default().with_delays(Duration::from_millis(1), Duration::from_millis(5))
}

fn rest_client(mock_uri: &str) -> RestClient {
    RestClient::builder()
        .endpoint(mock_uri)
        .retry_policy(fast_retries())
        .build()
        .unwrap()
}

fn success(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "success": true, "data": data })
}

fn failure(message: &str) -> serde_json::Value {
    serde_json::json!({ "success": false, "message": message })
}

fn login_item_json(id: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "item",
        "id": id,
        "organizationId": null,
        "folderId": null,
        "type": 1,
        "reprompt": 0,
        "name": "github",
        "notes": "deploy account",
        "favorite": false,
        "login": {
            "uris": [{"match": null, "uri": "https://github.com"}],
            "username": "octocat",
            "password": "hunter2",
            "totp": null,
            "passwordRevisionDate": null
        },
        "collectionIds": [],
        "attachments": [],
        "revisionDate": "2024-01-01T00:00:00.000Z"
    })
}

fn login_item() -> Object {
    let mut obj = Object::item(ItemType::Login, "github");
    obj.notes = Some("deploy account".to_string());
    obj.login = Some(Login {
        username: Some("octocat".to_string()),
        password: Some("hunter2".to_string()),
        uris: vec![LoginUri {
            match_type: None,
            uri: "https://github.com".to_string(),
        }],
        ..Login::default()
    });
    obj
}

#[tokio::test]
async fn test_create_then_get_round_trip() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/object/item"))
        .and(body_string_contains("\"username\":\"octocat\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(login_item_json("i1"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/object/item/i1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(login_item_json("i1"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let input = login_item();

    let created = client.create_object(&input).await.unwrap();
    assert_eq!(created.id, "i1");

    let fetched = client
        .get_object(&Object::stub(ObjectType::Item, "i1"))
        .await
        .unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.name, input.name);
    assert_eq!(fetched.notes, input.notes);
    assert_eq!(fetched.item_type, input.item_type);
    assert_eq!(fetched.login, input.login);
}

#[tokio::test]
async fn test_get_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/object/item/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(failure("Not found.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let result = client
        .get_object(&Object::stub(ObjectType::Item, "gone"))
        .await;

    assert!(matches!(result, Err(BwError::NotFound)));
}

#[tokio::test]
async fn test_get_other_failure_is_backend_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/object/item/i1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(failure("Vault is locked.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let err = client
        .get_object(&Object::stub(ObjectType::Item, "i1"))
        .await
        .unwrap_err();

    assert!(matches!(err, BwError::Backend { ref message } if message == "Vault is locked."));
}

#[tokio::test]
async fn test_edit_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/object/item/i1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(failure("Not found.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let mut object = login_item();
    object.id = "i1".to_string();

    let result = client.edit_object(&object).await;
    assert!(matches!(result, Err(BwError::NotFound)));
}

#[tokio::test]
async fn test_edit_sends_cleared_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/object/item/i1"))
        .and(body_string_contains("\"notes\":null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(login_item_json("i1"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let mut object = login_item();
    object.id = "i1".to_string();
    object.notes = None;

    client.edit_object(&object).await.unwrap();
}

#[tokio::test]
async fn test_malformed_response_is_retried_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/object/item/i1"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/object/item/i1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(login_item_json("i1"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let object = client
        .get_object(&Object::stub(ObjectType::Item, "i1"))
        .await
        .unwrap();
    assert_eq!(object.id, "i1");
}

#[tokio::test]
async fn test_retry_cap_surfaces_last_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let result = client.status().await;
    assert!(matches!(result, Err(BwError::Decode(_))));
}

#[tokio::test]
async fn test_delete_not_found_is_generic_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/object/item/gone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(failure("Not found.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    assert!(!client.capabilities().delete_reports_not_found);

    let result = client
        .delete_object(&Object::stub(ObjectType::Item, "gone"))
        .await;
    assert!(matches!(result, Err(BwError::Backend { .. })));
}

#[tokio::test]
async fn test_delete_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/object/folder/f1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    client
        .delete_object(&Object::stub(ObjectType::Folder, "f1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_objects_last_filter_wins() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/list/object/items"))
        .and(query_param("folderid", "second"))
        .and(query_param("organizationId", "o1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(serde_json::json!({
            "object": "list",
            "data": [login_item_json("i1"), login_item_json("i2")]
        }))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let items = client
        .list_objects(
            ObjectType::Item,
            &[
                ListFilter::folder("first"),
                ListFilter::organization("o1"),
                ListFilter::folder("second"),
            ],
        )
        .await
        .unwrap();

    let ids: Vec<_> = items.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["i1", "i2"]);
}

#[tokio::test]
async fn test_list_tolerates_unknown_item_kind() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/list/object/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(serde_json::json!([
            login_item_json("i1"),
            {
                "object": "item",
                "id": "k1",
                "type": 5,
                "name": "deploy key",
                "sshKey": {"publicKey": "ssh-ed25519 AAAA", "keyFingerprint": "SHA256:x"}
            }
        ]))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let items = client.list_objects(ObjectType::Item, &[]).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].item_type, Some(ItemType::Login));
    assert_eq!(items[1].item_type, Some(ItemType::Other(5)));
    assert_eq!(items[1].name, "deploy key");
}

#[tokio::test]
async fn test_get_attachment() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/object/attachment/a1"))
        .and(query_param("itemid", "i1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"-----BEGIN KEY-----".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/object/attachment/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    assert!(client.capabilities().distinguishes_missing_attachment);

    let content = client.get_attachment("i1", "a1").await.unwrap();
    assert_eq!(content, b"-----BEGIN KEY-----");

    let result = client.get_attachment("i1", "missing").await;
    assert!(matches!(result, Err(BwError::AttachmentNotFound)));
}

#[tokio::test]
async fn test_delete_attachment() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/object/attachment/a1"))
        .and(query_param("itemid", "i1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    client.delete_attachment("i1", "a1").await.unwrap();
}

#[tokio::test]
async fn test_session_operations_unsupported_without_network() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());

    let results = vec![
        client.login_with_password("user@example.com", "pw").await,
        client.login_with_api_key("pw", "id", "secret").await,
        client.logout().await,
        client.set_server("https://vault.example.com").await,
    ];
    for result in results {
        assert!(matches!(
            result,
            Err(BwError::Unsupported {
                transport: "rest",
                ..
            })
        ));
    }

    client.set_session_key("ignored");
    assert_eq!(client.session_key(), "");
}

#[tokio::test]
async fn test_unlock_sync_and_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/unlock"))
        .and(body_json(serde_json::json!({"password": "correct horse"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(serde_json::json!({
            "noColor": false,
            "object": "message",
            "title": "Your vault is now unlocked!",
            "message": null,
            "raw": "session-key"
        }))))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sync"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(serde_json::json!({
            "object": "template",
            "template": {
                "serverUrl": "https://vault.example.com",
                "lastSync": "2024-05-01T12:00:00.000Z",
                "userEmail": "ops@example.com",
                "userId": "u1",
                "status": "unlocked"
            }
        }))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = RestClient::builder()
        .endpoint(mock_server.uri())
        .debug_logging(true)
        .build()
        .unwrap();

    client.unlock("correct horse").await.unwrap();
    client.sync().await.unwrap();
    let status = client.status().await.unwrap();
    assert_eq!(status.status, VaultStatus::Unlocked);
    assert_eq!(status.user_email.as_deref(), Some("ops@example.com"));
}

#[tokio::test]
async fn test_unlock_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/unlock"))
        .respond_with(ResponseTemplate::new(400).set_body_json(failure("Invalid master password.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = rest_client(&mock_server.uri());
    let err = client.unlock("wrong").await.unwrap_err();
    assert!(err.to_string().contains("Invalid master password."));
}

#[tokio::test]
async fn test_cancelled_client_makes_no_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let cancel = CancellationToken::new();
    let client = RestClient::builder()
        .endpoint(mock_server.uri())
        .cancellation(cancel.clone())
        .build()
        .unwrap();
    cancel.cancel();

    let result = client
        .get_object(&Object::stub(ObjectType::Item, "i1"))
        .await;
    assert!(matches!(result, Err(BwError::Cancelled)));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // nothing listens on port 9 locally
    let client = RestClient::builder()
        .endpoint("http://127.0.0.1:9")
        .retry_policy(RetryPolicy::none())
        .build()
        .unwrap();

    let result = client.sync().await;
    assert!(matches!(result, Err(BwError::Transport(_))));
}

/// Forwards to a real client and counts exchanges
struct CountingExchange {
    http: reqwest::Client,
    count: AtomicUsize,
}

#[async_trait]
impl HttpExchange for CountingExchange {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.http.execute(request).await
    }
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_debug_logging_wraps_custom_exchange() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let exchange = Arc::new(CountingExchange {
        http: reqwest::Client::new(),
        count: AtomicUsize::new(0),
    });
    let client = RestClient::builder()
        .endpoint(&mock_server.uri())
        .exchange(exchange.clone())
        .debug_logging(true)
        .build()
        .unwrap();

    client.sync().await.unwrap();

    assert_eq!(exchange.count.load(Ordering::SeqCst), 1);
    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Request"));
    assert!(output.contains("/sync"));
    assert!(output.contains("200 OK"));
}
