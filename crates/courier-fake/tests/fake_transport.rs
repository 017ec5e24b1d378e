use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use courier_fake::{FakeState, Mock};
use courier_http::{
    ClientConfig, ConfigError, Cookie, Error, Factory, FactoryConfig, HeaderMap, Method,
    RequestContext, ResponseFactory, ResponseSequence, StatusCode, Transport, TransportRequest,
    TransportResponse, TransportTemplate, json_body,
};

/// Stands in for the network: answers `204` and counts the calls it receives.
#[derive(Default)]
struct PassThrough {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for PassThrough {
    async fn round_trip(&self, _request: TransportRequest) -> courier_http::Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransportResponse::from_bytes(
            StatusCode::NO_CONTENT,
            HeaderMap::new(),
            Bytes::new(),
        ))
    }
}

struct PassThroughTemplate(Arc<PassThrough>);

impl TransportTemplate for PassThroughTemplate {
    fn build(&self, _name: &str, _config: &ClientConfig) -> Result<Arc<dyn Transport>, ConfigError> {
        Ok(self.0.clone())
    }
}

fn config() -> FactoryConfig {
    FactoryConfig::new("stripe")
        .client("stripe", ClientConfig::new("https://api.stripe.com"))
        .client("github", ClientConfig::new("https://api.github.com"))
}

fn fake_factory(state: &Arc<FakeState>) -> (Factory, Arc<PassThrough>) {
    let base = Arc::new(PassThrough::default());
    let template = state.template(Arc::new(PassThroughTemplate(base.clone())));
    (Factory::with_template(config(), Arc::new(template)), base)
}

#[tokio::test]
async fn test_scoped_path_beats_client_name() {
    let state = Arc::new(
        FakeState::new([
            ("stripe", Mock::from("ok")),
            ("stripe#/charges/*", Mock::from(402u16)),
        ])
        .unwrap(),
    );
    let (factory, _) = fake_factory(&state);

    let balance = factory.client("stripe").get("/v1/balance").await.unwrap();
    assert!(balance.ok());
    assert_eq!(balance.text().await.unwrap(), "ok");

    let charge = factory.client("stripe").get("/charges/123").await.unwrap();
    assert_eq!(charge.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(charge.payment_required());
}

#[tokio::test]
async fn test_url_specificity() {
    let state = Arc::new(
        FakeState::new([
            ("*", Mock::from("any")),
            ("api.x.com/*", Mock::from("domain")),
            ("api.x.com/users/*", Mock::from("users")),
            ("api.x.com/users/1", Mock::from("one")),
        ])
        .unwrap(),
    );
    let (factory, base) = fake_factory(&state);
    let request = factory.default_client();

    for (url, expected) in [
        ("https://api.x.com/users/1", "one"),
        ("https://api.x.com/users/42", "users"),
        ("http://api.x.com/teams", "domain"),
        ("https://other.com", "any"),
    ] {
        let response = request.get(url).await.unwrap();
        assert_eq!(response.text().await.unwrap(), expected, "{url}");
    }
    assert_eq!(base.calls.load(Ordering::SeqCst), 0);
    state.assert_sent_count(4);
}

#[tokio::test]
async fn test_stray_requests() {
    let state = Arc::new(FakeState::new([("api.stripe.com/*", Mock::Empty)]).unwrap());
    let (factory, base) = fake_factory(&state);

    // Unmatched requests pass through by default.
    let response = factory.get("http://example.com/anything").await.unwrap();
    assert!(response.no_content());
    assert_eq!(base.calls.load(Ordering::SeqCst), 1);

    state.prevent_stray_requests();
    match factory.get("http://example.com/anything").await {
        Err(Error::StrayRequest { method, url }) => {
            assert_eq!(method, Method::GET);
            assert_eq!(url, "http://example.com/anything");
        }
        other => panic!("expected StrayRequest, got {other:?}"),
    }
    assert_eq!(base.calls.load(Ordering::SeqCst), 1);

    state.allow_stray_requests(["example.com/*"]).unwrap();
    let response = factory.get("http://example.com/anything").await.unwrap();
    assert!(response.no_content());
    assert_eq!(base.calls.load(Ordering::SeqCst), 2);

    // Matched requests never reach the base transport.
    assert!(factory.get("/v1/balance").await.unwrap().ok());
    assert_eq!(base.calls.load(Ordering::SeqCst), 2);
    state.assert_sent_count(4);
}

#[tokio::test]
async fn test_sequence_through_transport() {
    let sequence = ResponseSequence::new();
    sequence.push_status(500, 3).push_status(200, 1);
    let state = Arc::new(FakeState::new([("api.stripe.com/*", sequence)]).unwrap());
    let (factory, _) = fake_factory(&state);

    let mut statuses = Vec::new();
    for _ in 0..4 {
        statuses.push(factory.get("/v1/charges").await.unwrap().status().as_u16());
    }
    assert_eq!(statuses, vec![500, 500, 500, 200]);
    assert!(matches!(
        factory.get("/v1/charges").await,
        Err(Error::SequenceExhausted)
    ));
}

#[tokio::test]
async fn test_sequence_fallback_through_transport() {
    let sequence = Arc::new(ResponseSequence::new());
    sequence
        .push_string("first", 200, 1)
        .when_empty(ResponseFactory::new().status(429));
    let state = Arc::new(FakeState::new([("stripe", sequence.clone())]).unwrap());
    let (factory, _) = fake_factory(&state);

    assert_eq!(factory.get("/").await.unwrap().text().await.unwrap(), "first");
    assert!(factory.get("/").await.unwrap().too_many_requests());
    assert!(factory.get("/").await.unwrap().too_many_requests());
    assert!(sequence.is_exhausted());
}

#[tokio::test]
async fn test_fixed_response_replays() {
    let canned = ResponseFactory::new().json(&serde_json::json!({"id": "ch_1"}), 201);
    let state = Arc::new(FakeState::new([("stripe", canned)]).unwrap());
    let (factory, _) = fake_factory(&state);

    for _ in 0..3 {
        let response = factory.post("/charges", "{}").await.unwrap();
        assert!(response.created());
        assert_eq!(response.json().await.unwrap()["id"], "ch_1");
    }
}

#[tokio::test]
async fn test_dynamic_handler_sees_request() {
    let state = Arc::new(
        FakeState::new([(
            "github",
            Mock::handler(|req| {
                let login = req.cookie("login")?.value.clone();
                Some(ResponseFactory::new().json(&serde_json::json!({"login": login}), 200))
            }),
        )])
        .unwrap(),
    );
    let (factory, _) = fake_factory(&state);

    let response = factory
        .client("github")
        .with_cookie(Cookie::new("login", "ada"))
        .get("/user")
        .await
        .unwrap();
    assert_eq!(response.json().await.unwrap()["login"], "ada");

    match factory.client("github").get("/user").await {
        Err(Error::HandlerReturnedNone { method, url }) => {
            assert_eq!(method, Method::GET);
            assert_eq!(url, "https://api.github.com/user");
        }
        other => panic!("expected HandlerReturnedNone, got {other:?}"),
    }
}

#[tokio::test]
async fn test_recorded_requests() {
    let state = Arc::new(FakeState::new([("*", Mock::Empty)]).unwrap());
    let (factory, _) = fake_factory(&state);

    factory
        .client("github")
        .with_token("t0k3n")
        .with_header("X-Trace", "abc")
        .with_cookie(Cookie::new("session", "s1"))
        .with_query_parameter("page", "2")
        .post("/gists", json_body(&serde_json::json!({"public": true})).unwrap())
        .await
        .unwrap();

    state.assert_sent(|r| {
        r.method() == Method::POST
            && r.url().as_str() == "https://api.github.com/gists?page=2"
            && r.client_name() == Some("github")
            && r.has_header("authorization", "Bearer t0k3n")
            && r.header("x-trace") == Some("abc")
            && r.cookie("session").is_some_and(|c| c.value == "s1")
            && r.json::<serde_json::Value>().is_ok_and(|v| v["public"] == true)
    });
    state.assert_not_sent(|r| r.client_name() == Some("stripe"));
    assert_eq!(state.sent(|r| r.path() == "/gists").len(), 1);
}

#[tokio::test]
async fn test_expired_deadline_is_not_recorded() {
    let state = Arc::new(FakeState::new([("*", Mock::Empty)]).unwrap());
    let (factory, _) = fake_factory(&state);

    let result = factory
        .with_context(RequestContext::new().with_timeout(Duration::ZERO))
        .get("/")
        .await;
    assert!(matches!(result, Err(Error::DeadlineExceeded)));
    state.assert_nothing_sent();
}

#[tokio::test]
async fn test_lazy_error_never_reaches_fake() {
    let state = Arc::new(FakeState::new([("*", Mock::Empty)]).unwrap());
    let (factory, _) = fake_factory(&state);

    let result = factory.client("ghost").get("/").await;
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::UnknownClient(_)))
    ));
    state.assert_nothing_sent();
}

#[tokio::test]
async fn test_one_fake_per_client() {
    let state = Arc::new(FakeState::new([("*", Mock::Empty)]).unwrap());
    let (factory, _) = fake_factory(&state);

    let stripe = factory.client_for("stripe").unwrap();
    let github = factory.client_for("github").unwrap();
    assert!(Arc::ptr_eq(
        stripe.transport(),
        factory.client_for("stripe").unwrap().transport()
    ));
    assert!(!Arc::ptr_eq(stripe.transport(), github.transport()));
}
