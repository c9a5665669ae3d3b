use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use claycoins_api::{AppStateInner, router};
use claycoins_engine::{Engine, ManualClock};

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    engine: Engine,
}

impl TestApp {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let engine = Engine::in_memory(clock.clone()).unwrap();
        let router = router(Arc::new(AppStateInner {
            engine: engine.clone(),
        }));
        Self {
            router,
            clock,
            engine,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, String) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, String) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    /// Sign up and return (token, user id).
    async fn signup(&self, username: &str) -> (String, i64) {
        let (status, body) = self
            .json("POST", "/users", json!({ "username": username, "password": "pass0" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = serde_json::from_str::<Value>(&body).unwrap()["hashedToken"]
            .as_str()
            .unwrap()
            .to_string();

        let (status, id) = self.get(&format!("/users/id?token={token}")).await;
        assert_eq!(status, StatusCode::OK);
        (token, id.parse().unwrap())
    }
}

#[tokio::test]
async fn hello() {
    let app = TestApp::new();
    assert_eq!(app.get("/").await, (StatusCode::OK, "Hello".to_string()));
}

#[tokio::test]
async fn signup_and_login() {
    let app = TestApp::new();
    let (token, _) = app.signup("hello0").await;

    let dup = app
        .json("POST", "/users", json!({ "username": "hello0", "password": "x" }))
        .await;
    assert_eq!(dup, (StatusCode::CONFLICT, "User already exists".to_string()));

    let (status, body) = app
        .json("PATCH", "/users", json!({ "username": "hello0", "password": "pass0" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "hashedToken": token }).to_string());

    let bad = app
        .json("PATCH", "/users", json!({ "username": "hello0", "password": "nope" }))
        .await;
    assert_eq!(
        bad,
        (StatusCode::UNAUTHORIZED, "Username or password was incorrect".to_string())
    );

    let missing = app
        .json("PATCH", "/users", json!({ "username": "ghost", "password": "pass0" }))
        .await;
    assert_eq!(missing, (StatusCode::NOT_FOUND, "User does not exist".to_string()));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = TestApp::new();
    let req = Request::post("/users")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    assert_eq!(
        app.send(req).await,
        (StatusCode::BAD_REQUEST, "Malformed json input".to_string())
    );
}

#[tokio::test]
async fn user_id_lookup() {
    let app = TestApp::new();
    assert_eq!(app.get("/users/id").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.get("/users/id?token=unknown").await,
        (StatusCode::NOT_FOUND, "Token not found".to_string())
    );
}

#[tokio::test]
async fn username_lookups() {
    let app = TestApp::new();
    let (_, id) = app.signup("clay").await;

    assert_eq!(app.get("/users/clay/exists").await.0, StatusCode::CONFLICT);
    assert_eq!(app.get("/users/other/exists").await.0, StatusCode::OK);

    assert_eq!(
        app.get(&format!("/users/{id}/username")).await,
        (StatusCode::OK, "clay".to_string())
    );
    assert_eq!(app.get("/users/abc/username").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(app.get("/users/9999/username").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fresh_user_currencies() {
    let app = TestApp::new();
    let (_, id) = app.signup("clay").await;

    let (status, body) = app.get(&format!("/users/{id}/currencies")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["coins"], 0);
    assert_eq!(body["shiners"], 0.0);
    assert_eq!(body["shinerProgress"], 0);
    assert_eq!(body["coinUpdateTimeMs"], 1_700_000_000_000i64);

    assert_eq!(app.get("/users/x/currencies").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(app.get("/users/9999/currencies").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_data_settles_accrual() {
    let app = TestApp::new();
    let (_, id) = app.signup("clay").await;
    app.clock.advance(25_000);

    let (status, body) = app.get(&format!("/users/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["username"], "clay");
    assert_eq!(body["id"], id);
    assert_eq!(body["admin"], false);
    assert_eq!(body["userCurrencies"]["coins"], 2);

    // The plain currencies read shows the settled balance but does not settle again
    app.clock.advance(60_000);
    let (_, body) = app.get(&format!("/users/{id}/currencies")).await;
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["coins"], 2);

    assert_eq!(app.get("/users/9999").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_over_http() {
    let app = TestApp::new();
    let (token, id) = app.signup("clay").await;

    let (status, body) = app
        .json("POST", "/chat", json!({ "token": token, "content": "  hello  " }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let posted: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(posted["message"], "hello");
    assert_eq!(posted["userId"], id);
    assert_eq!(posted["time"], 1_700_000_000i64);

    let again = app
        .json(
            "POST",
            "/chat",
            json!({ "token": { "hashedToken": token }, "content": "again" }),
        )
        .await;
    assert_eq!(again, (StatusCode::FORBIDDEN, "User on chat cooldown".to_string()));

    let blank = app
        .json("POST", "/chat", json!({ "token": token, "content": "   " }))
        .await;
    assert_eq!(blank.0, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/chat").await;
    assert_eq!(status, StatusCode::OK);
    let history: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["messageId"], posted["messageId"]);

    let (status, body) = app.get("/chat/0/10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Vec<Value>>(&body).unwrap().len(), 1);
    assert_eq!(
        app.get("/chat/a/10").await,
        (StatusCode::BAD_REQUEST, "Offset or limit are not integers".to_string())
    );
    assert_eq!(
        app.get("/chat/messages/5").await,
        (StatusCode::BAD_REQUEST, "Offset or limit are not integers".to_string())
    );
}

#[tokio::test]
async fn chat_history_is_latest_fifty_oldest_first() {
    let app = TestApp::new();
    let (token, _) = app.signup("clay").await;

    for i in 0..60 {
        app.engine.chat.post_message(&token, &format!("m{i}")).await.unwrap();
        app.clock.advance(10_000);
    }

    let (_, body) = app.get("/chat").await;
    let history: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0]["message"], "m10");
    assert_eq!(history[49]["message"], "m59");
}

#[tokio::test]
async fn admin_can_delete_messages() {
    let app = TestApp::new();
    let (admin, _) = app.signup("admin").await;
    let (user, _) = app.signup("user").await;
    app.engine.auth.set_admin("admin", true).await.unwrap();

    let msg = app.engine.chat.post_message(&user, "spam").await.unwrap();
    let uri = |token: &str| format!("/admin/messages/{}?token={}", msg.message_id, token);

    let req = Request::delete(uri(&user)).body(Body::empty()).unwrap();
    assert_eq!(app.send(req).await.0, StatusCode::FORBIDDEN);

    let req = Request::delete(uri(&admin)).body(Body::empty()).unwrap();
    assert_eq!(app.send(req).await.0, StatusCode::NO_CONTENT);

    let req = Request::delete(uri(&admin)).body(Body::empty()).unwrap();
    assert_eq!(app.send(req).await.0, StatusCode::NOT_FOUND);

    let (status, body) = app.get(&format!("/users/{}", 1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["admin"], true);
}
