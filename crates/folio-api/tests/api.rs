use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use folio_api::config::Config;
use folio_api::mailer::{Mailer, OutgoingMail};
use folio_api::media::MediaStore;
use folio_api::{AppState, AppStateInner, router};
use folio_db::Database;

const BOUNDARY: &str = "folio-test-boundary";

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

struct TestApp {
    app: Router,
    state: AppState,
    mailer: Arc<RecordingMailer>,
    media_root: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_root);
    }
}

struct User {
    id: String,
    token: String,
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, Vec<u8>),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n", name, value).as_bytes(),
                );
            }
            Part::File(name, file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

impl TestApp {
    async fn new() -> Self {
        let media_root = std::env::temp_dir().join(format!("folio-api-test-{}", Uuid::new_v4()));
        let mailer = Arc::new(RecordingMailer::default());
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            media: MediaStore::new(media_root.clone()).await.unwrap(),
            mailer: mailer.clone(),
            config: Config::default(),
        });
        Self {
            app: router(state.clone()),
            state,
            mailer,
            media_root,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    async fn multipart(&self, method: Method, uri: &str, token: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(req).await
    }

    async fn register(&self, username: &str) -> User {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "hunter2hunter2",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        User {
            id: body["user_id"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    async fn create_project(&self, owner: &User, title: &str, is_public: bool) -> String {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/projects",
                Some(&owner.token),
                Some(json!({ "title": title, "is_public": is_public })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    fn count(&self, table: &str) -> i64 {
        self.state
            .db
            .with_conn(|conn| Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?))
            .unwrap()
    }
}

fn png(len: usize) -> Vec<u8> {
    vec![0x89; len]
}

#[tokio::test]
async fn health_and_auth_basics() {
    let t = TestApp::new().await;
    let (status, body) = t.json(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));

    t.register("alice").await;
    let (status, _) = t
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "alice", "email": "a2@example.com", "password": "longenough" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = t
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "bob", "email": "bob@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["password"].is_array());

    let (status, body) = t
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "hunter2hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let (status, _) = t
        .json(Method::POST, "/api/auth/login", None, Some(json!({ "username": "alice", "password": "wrong-password" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.json(Method::GET, "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.json(Method::GET, "/api/projects", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_and_public_view() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;

    let (status, body) = t.json(Method::GET, "/api/users/me", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["display_name"], "");

    let (status, body) = t
        .json(
            Method::PATCH,
            "/api/users/me",
            Some(&alice.token),
            Some(json!({ "display_name": "Alice Builds", "location": "Austin, TX", "coverage_radius_miles": 25 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["service_location"], "Austin, TX");
    assert_eq!(body["location"], "Austin, TX");
    assert_eq!(body["coverage_radius_miles"], 25);

    let (status, body) = t
        .multipart(
            Method::PATCH,
            "/api/users/me",
            &alice.token,
            &[Part::Text("bio", "Decks and fences"), Part::File("avatar", "me.png", png(64))],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let avatar = body["avatar"].as_str().unwrap().to_string();
    assert!(avatar.starts_with(&format!("/media/avatars/user_{}/", alice.id)));
    let stored = avatar.trim_start_matches("/media/").to_string();
    assert!(t.state.media.exists(&stored).await);

    let (status, body) = t
        .json(Method::PATCH, "/api/users/me", Some(&alice.token), Some(json!({ "avatar": null })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["avatar"].is_null());
    assert!(!t.state.media.exists(&stored).await);

    let (status, body) = t.json(Method::GET, "/api/profiles/alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Alice Builds");
    assert_eq!(body["bio"], "Decks and fences");

    let (status, body) = t.json(Method::GET, "/api/profiles/nobody", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Profile not found.");
}

#[tokio::test]
async fn anonymous_listing_never_shows_private_projects() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;
    let public = t.create_project(&alice, "Public deck", true).await;
    let private = t.create_project(&alice, "Secret shed", false).await;

    let (status, body) = t.json(Method::GET, "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body.as_array().unwrap().iter().map(|p| p["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![public.as_str()]);

    let (_, body) = t.json(Method::GET, "/api/projects", Some(&alice.token), None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = t.json(Method::GET, &format!("/api/projects/{}", private), Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = t.json(Method::GET, &format!("/api/projects/{}", private), Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = t.json(Method::GET, "/api/projects?owner=bob", None, None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, body) = t.json(Method::GET, "/api/projects/mine", Some(&alice.token), None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn only_the_owner_can_modify_a_project() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;
    let project = t.create_project(&alice, "Porch", true).await;
    let uri = format!("/api/projects/{}", project);

    let (status, _) = t.json(Method::PATCH, &uri, Some(&bob.token), Some(json!({ "title": "Mine now" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.json(Method::DELETE, &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .json(
            Method::PATCH,
            &uri,
            Some(&alice.token),
            Some(json!({ "title": "Front porch", "owner": bob.id, "budget": 1200.5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Front porch");
    assert_eq!(body["owner"], alice.id.as_str());
    assert_eq!(body["budget"], 1200.5);

    let (status, body) = t.json(Method::POST, "/api/projects", Some(&alice.token), Some(json!({ "summary": "no title" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["title"].is_array());
}

#[tokio::test]
async fn promoting_an_image_to_cover_keeps_orders_dense() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let project = t.create_project(&alice, "Kitchen", true).await;

    let (status, body) = t
        .multipart(
            Method::POST,
            &format!("/api/projects/{}/images", project),
            &alice.token,
            &[
                Part::File("images", "a.png", png(16)),
                Part::File("images", "b.jpg", png(16)),
                Part::File("images", "c.webp", png(16)),
                Part::File("images", "d.png", png(16)),
                Part::Text("captions[]", "first"),
                Part::Text("captions[]", "second"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let uploaded = body.as_array().unwrap().clone();
    assert_eq!(uploaded.len(), 4);
    assert_eq!(uploaded[1]["caption"], "second");
    assert_eq!(uploaded[2]["caption"], "");
    let target = uploaded[2]["id"].as_str().unwrap().to_string();

    let (status, body) = t
        .json(
            Method::PATCH,
            &format!("/api/projects/{}/images/{}", project, target),
            Some(&alice.token),
            Some(json!({ "is_cover_photo": "yes" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"], 0);
    assert_eq!(body["is_cover"], true);

    let (_, body) = t.json(Method::GET, &format!("/api/projects/{}/images", project), None, None).await;
    let orders: Vec<u64> = body.as_array().unwrap().iter().map(|i| i["order"].as_u64().unwrap()).collect();
    assert_eq!(orders, vec![0, 1, 2, 3]);
    assert_eq!(body[0]["id"], target.as_str());

    let (_, body) = t.json(Method::GET, &format!("/api/projects/{}", project), None, None).await;
    assert_eq!(body["cover_image"], body["images"][0]["url"]);

    let (status, _) = t
        .multipart(
            Method::POST,
            &format!("/api/projects/{}/images", project),
            &alice.token,
            &[Part::File("images", "evil.svg", png(16))],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_project_removes_dependents_and_files() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;
    let project = t.create_project(&alice, "Bathroom", true).await;

    let (_, body) = t
        .multipart(
            Method::POST,
            &format!("/api/projects/{}/images", project),
            &alice.token,
            &[
                Part::File("images", "1.png", png(8)),
                Part::File("images", "2.png", png(8)),
                Part::File("image", "3.png", png(8)),
            ],
        )
        .await;
    let stored: Vec<String> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["url"].as_str().unwrap().trim_start_matches("/media/").to_string())
        .collect();
    assert_eq!(stored.len(), 3);
    for path in &stored {
        assert!(t.state.media.exists(path).await);
    }

    let comments = format!("/api/projects/{}/comments", project);
    t.json(Method::POST, &comments, Some(&bob.token), Some(json!({ "text": "Nice tile" }))).await;
    t.json(Method::POST, &comments, Some(&alice.token), Some(json!({ "text": "Thanks!" }))).await;
    t.json(Method::POST, &format!("/api/projects/{}/favorite", project), Some(&bob.token), None).await;

    let (status, _) = t.json(Method::DELETE, &format!("/api/projects/{}", project), Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for table in ["projects", "project_images", "project_comments", "project_favorites"] {
        assert_eq!(t.count(table), 0, "{} still has rows", table);
    }
    for path in &stored {
        assert!(!t.state.media.exists(path).await);
    }
}

#[tokio::test]
async fn comments_are_scoped_and_author_only() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;
    let project = t.create_project(&alice, "Fence", true).await;
    let other = t.create_project(&alice, "Gate", true).await;
    let uri = format!("/api/projects/{}/comments", project);

    let (status, _) = t.json(Method::POST, &uri, None, Some(json!({ "text": "hi" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.json(Method::POST, &uri, Some(&bob.token), Some(json!({ "text": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, first) = t.json(Method::POST, &uri, Some(&bob.token), Some(json!({ "text": "first" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    t.json(Method::POST, &uri, Some(&alice.token), Some(json!({ "text": "second" }))).await;

    let (_, body) = t.json(Method::GET, &uri, None, None).await;
    assert_eq!(body[0]["text"], "second");
    assert_eq!(body[1]["author_username"], "bob");

    let cid = first["id"].as_str().unwrap();
    let (status, _) = t
        .json(Method::GET, &format!("/api/projects/{}/comments/{}", other, cid), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let detail = format!("{}/{}", uri, cid);
    let (status, _) = t.json(Method::PATCH, &detail, Some(&alice.token), Some(json!({ "text": "edited" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = t.json(Method::PATCH, &detail, Some(&bob.token), Some(json!({ "text": "edited" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "edited");
    let (status, _) = t.json(Method::DELETE, &detail, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn favorites_are_idempotent() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;
    let project = t.create_project(&alice, "Roof", true).await;
    let uri = format!("/api/projects/{}/favorite", project);

    for _ in 0..2 {
        let (status, body) = t.json(Method::POST, &uri, Some(&bob.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "is_favorited": true }));
    }
    let (_, body) = t.json(Method::GET, &uri, Some(&bob.token), None).await;
    assert_eq!(body["is_favorited"], true);

    let (_, body) = t.json(Method::GET, "/api/favorites/projects", Some(&bob.token), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["project"]["title"], "Roof");

    for _ in 0..2 {
        let (status, body) = t.json(Method::DELETE, &uri, Some(&bob.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "is_favorited": false }));
    }
    assert_eq!(t.count("project_favorites"), 0);
}

#[tokio::test]
async fn starting_a_thread_from_either_side_yields_one_thread() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;
    let alices = t.create_project(&alice, "Alice deck", true).await;
    let bobs = t.create_project(&bob, "Bob fence", true).await;

    let (status, first) = t.json(Method::POST, &format!("/api/projects/{}/threads", bobs), Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["origin_project"], bobs.as_str());
    assert_eq!(first["is_request"], false);
    assert_eq!(first["counterpart"]["username"], "bob");

    let (status, second) = t.json(Method::POST, &format!("/api/projects/{}/threads", alices), Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["is_request"], true);
    assert_eq!(t.count("message_threads"), 1);

    let (status, _) = t.json(Method::POST, &format!("/api/projects/{}/threads", alices), Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, fetched) = t.json(Method::GET, &format!("/api/projects/{}/threads", bobs), Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], first["id"]);

    let carol = t.register("carol").await;
    let (status, _) = t.json(Method::GET, &format!("/api/projects/{}/threads", bobs), Some(&carol.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn message_content_rules() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;
    let carol = t.register("carol").await;
    let project = t.create_project(&bob, "Garage", true).await;
    let (_, thread) = t.json(Method::POST, &format!("/api/projects/{}/threads", project), Some(&alice.token), None).await;
    let uri = format!("/api/threads/{}/messages", thread["id"].as_str().unwrap());

    let (status, _) = t.json(Method::POST, &uri, Some(&alice.token), Some(json!({ "text": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .multipart(Method::POST, &uri, &alice.token, &[Part::File("attachment", "big.jpg", png(4 * 1024 * 1024))])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.count("private_messages"), 0);

    let (status, body) = t
        .multipart(
            Method::POST,
            &uri,
            &alice.token,
            &[Part::Text("text", "site photo"), Part::File("attachment", "site.jpg", png(2 * 1024 * 1024))],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["attachment_name"], "site.jpg");
    assert!(body["attachment_url"].as_str().unwrap().starts_with("/media/messages/"));

    let (status, _) = t.json(Method::POST, &uri, Some(&bob.token), Some(json!({ "text": "got it" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t.json(Method::GET, &uri, Some(&carol.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let alias = format!("/api/projects/{}/threads/{}/messages", Uuid::new_v4(), thread["id"].as_str().unwrap());
    let (status, body) = t.json(Method::GET, &alias, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = body.as_array().unwrap().iter().map(|m| m["text"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["site photo", "got it"]);

    let (_, inbox) = t.json(Method::GET, "/api/inbox/threads", Some(&bob.token), None).await;
    assert_eq!(inbox[0]["latest_message"]["text"], "got it");
}

#[tokio::test]
async fn blocking_stops_both_directions() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;
    let project = t.create_project(&bob, "Shed", true).await;
    let (_, thread) = t.json(Method::POST, &format!("/api/projects/{}/threads", project), Some(&alice.token), None).await;
    let thread_id = thread["id"].as_str().unwrap().to_string();
    let messages = format!("/api/threads/{}/messages", thread_id);
    let actions = format!("/api/inbox/threads/{}/actions", thread_id);

    let (status, body) = t.json(Method::POST, &actions, Some(&alice.token), Some(json!({ "action": "Block" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_blocked"], true);

    for user in [&alice, &bob] {
        let (status, _) = t.json(Method::POST, &messages, Some(&user.token), Some(json!({ "text": "hello?" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (_, body) = t.json(Method::GET, "/api/inbox/threads", Some(&bob.token), None).await;
    assert_eq!(body[0]["blocked_by_other"], true);
    assert_eq!(body[0]["is_blocked"], false);

    let (_, blocked) = t.json(Method::GET, "/api/inbox/blocked", Some(&alice.token), None).await;
    assert_eq!(blocked.as_array().unwrap().len(), 1);
    let (_, blocked) = t.json(Method::GET, "/api/inbox/blocked", Some(&bob.token), None).await;
    assert!(blocked.as_array().unwrap().is_empty());

    t.json(Method::POST, &actions, Some(&alice.token), Some(json!({ "action": "unblock" }))).await;
    let (status, _) = t.json(Method::POST, &messages, Some(&bob.token), Some(json!({ "text": "back" }))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn thread_actions() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let bob = t.register("bob").await;
    let carol = t.register("carol").await;
    let project = t.create_project(&bob, "Pool", true).await;
    let (_, thread) = t.json(Method::POST, &format!("/api/projects/{}/threads", project), Some(&alice.token), None).await;
    let thread_id = thread["id"].as_str().unwrap().to_string();
    let actions = format!("/api/inbox/threads/{}/actions", thread_id);

    let (status, _) = t.json(Method::POST, &actions, Some(&carol.token), Some(json!({ "action": "accept" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = t.json(Method::POST, &actions, Some(&bob.token), Some(json!({ "action": "dance" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Unknown action.");

    let (_, body) = t.json(Method::POST, &actions, Some(&bob.token), Some(json!({ "action": "accept" }))).await;
    assert_eq!(body["is_request"], false);
    let (_, body) = t.json(Method::POST, &actions, Some(&bob.token), Some(json!({ "action": "archive" }))).await;
    assert_eq!(body["is_archived"], true);
    let (_, body) = t.json(Method::GET, "/api/inbox/threads", Some(&alice.token), None).await;
    assert_eq!(body[0]["is_archived"], false);

    t.json(Method::POST, &format!("/api/threads/{}/messages", thread_id), Some(&alice.token), Some(json!({ "text": "hi" }))).await;
    let (status, _) = t.json(Method::POST, &actions, Some(&alice.token), Some(json!({ "action": "delete" }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(t.count("message_threads"), 0);
    assert_eq!(t.count("private_messages"), 0);

    let (status, _) = t.json(Method::POST, &actions, Some(&alice.token), Some(json!({ "action": "accept" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn password_reset_does_not_reveal_accounts() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;

    let unknown = t
        .json(Method::POST, "/api/auth/password-reset", None, Some(json!({ "email": "ghost@example.com" })))
        .await;
    assert!(t.mailer.sent.lock().unwrap().is_empty());

    let known = t
        .json(Method::POST, "/api/auth/password-reset", None, Some(json!({ "email": "ALICE@example.com" })))
        .await;
    assert_eq!(unknown, known);
    assert_eq!(known.0, StatusCode::OK);
    assert_eq!(known.1["detail"], "If that email exists, a reset link has been sent.");

    let mail = t.mailer.sent.lock().unwrap().pop().unwrap();
    assert_eq!(mail.to, "alice@example.com");
    let link = mail.body.lines().find(|l| l.contains("/reset-password?")).unwrap().to_string();
    let query = link.split_once('?').unwrap().1;
    let mut uid = "";
    let mut token = "";
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("uid", v)) => uid = v,
            Some(("token", v)) => token = v,
            _ => {}
        }
    }

    let (status, body) = t
        .json(
            Method::POST,
            "/api/auth/password-reset/confirm",
            None,
            Some(json!({ "uid": "!!!", "token": token, "new_password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid reset link");

    let confirm = json!({ "uid": uid, "token": token, "new_password": "brand-new-pass" });
    let (status, body) = t
        .json(Method::POST, "/api/auth/password-reset/confirm", None, Some(confirm.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["detail"], "Password has been reset.");

    let (status, body) = t.json(Method::POST, "/api/auth/password-reset/confirm", None, Some(confirm)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid or expired reset token");

    let (status, body) = t
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], alice.id.as_str());
}

#[tokio::test]
async fn project_with_cover_is_created_only_when_the_file_is_stored() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;

    let (status, body) = t
        .multipart(
            Method::POST,
            "/api/projects",
            &alice.token,
            &[Part::Text("title", "Deck"), Part::File("cover_image", "cover.png", png(64))],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["id"].as_str().unwrap().to_string();
    let cover = body["cover_image"].as_str().unwrap().to_string();
    assert!(cover.starts_with(&format!("/media/projects/{}/{}/cover/", alice.id, id)));
    assert!(t.state.media.exists(cover.trim_start_matches("/media/")).await);

    std::fs::remove_dir_all(t.media_root.join("projects")).unwrap();
    std::fs::write(t.media_root.join("projects"), b"not a directory").unwrap();

    let (status, _) = t
        .multipart(
            Method::POST,
            "/api/projects",
            &alice.token,
            &[Part::Text("title", "Porch"), Part::File("cover_image", "cover.png", png(64))],
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(t.count("projects"), 1);
}

#[tokio::test]
async fn failed_profile_upload_keeps_no_partial_files() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    std::fs::write(t.media_root.join("banners"), b"not a directory").unwrap();

    let (status, _) = t
        .multipart(
            Method::PATCH,
            "/api/users/me",
            &alice.token,
            &[Part::File("avatar", "me.png", png(64)), Part::File("banner", "wide.png", png(64))],
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let avatars = t.media_root.join(format!("avatars/user_{}", alice.id));
    let left = std::fs::read_dir(&avatars).map(|dir| dir.count()).unwrap_or(0);
    assert_eq!(left, 0);

    let (status, body) = t.json(Method::GET, "/api/users/me", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["avatar"].is_null());
}

#[tokio::test]
async fn caption_category_and_location_lengths_are_capped() {
    let t = TestApp::new().await;
    let alice = t.register("alice").await;
    let project = t.create_project(&alice, "Deck", true).await;

    let (status, body) = t
        .json(
            Method::PATCH,
            &format!("/api/projects/{}", project),
            Some(&alice.token),
            Some(json!({ "category": "c".repeat(121) })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["category"].is_array());

    let (status, body) = t
        .json(
            Method::PATCH,
            &format!("/api/projects/{}", project),
            Some(&alice.token),
            Some(json!({ "location": "l".repeat(141) })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["location"].is_array());

    let long_caption = "x".repeat(241);
    let (status, body) = t
        .multipart(
            Method::POST,
            &format!("/api/projects/{}/images", project),
            &alice.token,
            &[Part::File("images", "a.png", png(16)), Part::Text("captions", &long_caption)],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["captions"].is_array());
    assert_eq!(t.count("project_images"), 0);

    let (status, body) = t
        .multipart(
            Method::POST,
            &format!("/api/projects/{}/images", project),
            &alice.token,
            &[Part::File("images", "a.png", png(16)), Part::Text("captions", &"x".repeat(240))],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let image = body[0]["id"].as_str().unwrap().to_string();

    let (status, body) = t
        .json(
            Method::PATCH,
            &format!("/api/projects/{}/images/{}", project, image),
            Some(&alice.token),
            Some(json!({ "caption": long_caption })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["caption"].is_array());
}
