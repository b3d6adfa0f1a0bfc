//! Integration tests for access_checkout.
//!
//! Sessions run end to end against an in-memory HTTP service; validation
//! runs through the controller with in-memory text fields.

use access_checkout::client::{AccessCheckoutClient, CardDetails, SessionResponseListener};
use access_checkout::config::CardConfigurationProvider;
use access_checkout::controller::{
    CardField, CardValidationController, CardValidationControllerBuilder, Clock,
};
use access_checkout::discovery::{DiscoveryCache, SESSIONS_MEDIA_TYPE};
use access_checkout::error::{ApiErrorName, DeserializationError, HttpError};
use access_checkout::http::{HttpClient, HttpRequest, HttpResponse, HttpTransport, Method};
use access_checkout::{
    AccessCheckoutError, CardBrand, CardConfiguration, ClientConfig, Field, SessionType,
    ValidationListener,
};
use async_trait::async_trait;
use chrono::{Local, TimeZone};
use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

// =============================================================================
// IN-MEMORY ACCESS SERVICE
// =============================================================================

const BASE: &str = "https://access.example.com/";
const SESSIONS: &str = "https://access.example.com/sessions";
const CARD_SESSIONS: &str = "https://access.example.com/sessions/card";
const CVC_SESSIONS: &str = "https://access.example.com/sessions/payments/cvc";

const ROOT_DOCUMENT: &str = r#"{
    "_links": {
        "service:sessions": { "href": "https://access.example.com/sessions" },
        "curies": [{ "href": "https://access.example.com/rels/service/{rel}", "name": "service", "templated": true }]
    }
}"#;

const SESSIONS_DOCUMENT: &str = r#"{
    "_links": {
        "sessions:card": { "href": "https://access.example.com/sessions/card" },
        "sessions:paymentsCvc": { "href": "https://access.example.com/sessions/payments/cvc" },
        "curies": [{ "href": "https://access.example.com/rels/sessions/{rel}", "name": "sessions", "templated": true }]
    }
}"#;

fn session_document(id: &str) -> String {
    format!(
        r#"{{
            "_links": {{
                "sessions:session": {{ "href": "https://access.example.com/sessions/{id}" }},
                "curies": [{{ "href": "https://access.example.com/rels/sessions/{{rel}}", "name": "sessions", "templated": true }}]
            }}
        }}"#
    )
}

/// Answers by method and URL and keeps every request.
#[derive(Default)]
struct FakeService {
    routes: HashMap<(Method, String), HttpResponse>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeService {
    fn working() -> Self {
        Self::default()
            .get(BASE, HttpResponse::new(200, ROOT_DOCUMENT))
            .get(SESSIONS, HttpResponse::new(200, SESSIONS_DOCUMENT))
            .post(CARD_SESSIONS, HttpResponse::new(201, session_document("card-session")))
            .post(CVC_SESSIONS, HttpResponse::new(201, session_document("cvc-session")))
    }

    fn get(mut self, url: &str, response: HttpResponse) -> Self {
        self.routes.insert((Method::Get, url.to_string()), response);
        self
    }

    fn post(mut self, url: &str, response: HttpResponse) -> Self {
        self.routes.insert((Method::Post, url.to_string()), response);
        self
    }

    fn requests_to(&self, method: Method, url: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.as_str() == url)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpTransport for FakeService {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let response = self
            .routes
            .get(&(request.method, request.url.to_string()))
            .cloned();
        self.requests.lock().unwrap().push(request);
        response.ok_or_else(|| HttpError::Transport("connection refused".into()))
    }
}

type SessionResult = Result<HashMap<SessionType, String>, AccessCheckoutError>;

#[derive(Default)]
struct Sessions {
    started: Mutex<usize>,
    finished: Mutex<Vec<SessionResult>>,
}

impl Sessions {
    fn finished(&self) -> Vec<SessionResult> {
        self.finished.lock().unwrap().clone()
    }
}

impl SessionResponseListener for Sessions {
    fn on_request_started(&self) {
        *self.started.lock().unwrap() += 1;
    }

    fn on_request_finished(&self, result: SessionResult) {
        self.finished.lock().unwrap().push(result);
    }
}

fn client(service: Arc<FakeService>, listener: Arc<Sessions>) -> AccessCheckoutClient {
    AccessCheckoutClient::builder()
        .base_url(BASE)
        .checkout_id("identity")
        .listener(listener)
        .transport(service)
        .discovery_cache(Arc::new(DiscoveryCache::new()))
        .build()
        .unwrap()
}

fn card() -> CardDetails {
    CardDetails::builder()
        .pan("4111 1111 1111 1111")
        .expiry_date("12/30")
        .cvc("123")
        .build()
        .unwrap()
}

async fn submit(client: &AccessCheckoutClient, types: &[SessionType]) {
    for handle in client.generate_sessions(&card(), types).unwrap() {
        handle.await.unwrap();
    }
}

// =============================================================================
// SESSIONS
// =============================================================================

#[tokio::test]
async fn test_card_session_round_trip() {
    let service = Arc::new(FakeService::working());
    let listener = Arc::new(Sessions::default());
    let client = client(service.clone(), listener.clone());

    submit(&client, &[SessionType::Card]).await;

    let finished = listener.finished();
    assert_eq!(finished.len(), 1);
    let sessions = finished[0].as_ref().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(
        sessions[&SessionType::Card],
        "https://access.example.com/sessions/card-session"
    );
    assert_eq!(*listener.started.lock().unwrap(), 1);

    let posts = service.requests_to(Method::Post, CARD_SESSIONS);
    assert_eq!(posts.len(), 1);
    assert_eq!(
        posts[0].body.as_deref(),
        Some(r#"{"cardNumber":"4111111111111111","cardExpiryDate":{"month":12,"year":2030},"cvc":"123","identity":"identity"}"#)
    );

    let header = |name: &str| {
        posts[0]
            .headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(header("Content-Type").as_deref(), Some(SESSIONS_MEDIA_TYPE));
    assert_eq!(header("Accept").as_deref(), Some(SESSIONS_MEDIA_TYPE));
    assert!(header("X-WP-SDK").unwrap().starts_with("access-checkout-rust/"));
}

#[tokio::test]
async fn test_card_and_cvc_sessions_reported_once() {
    let service = Arc::new(FakeService::working());
    let listener = Arc::new(Sessions::default());
    let client = client(service.clone(), listener.clone());

    submit(&client, &[SessionType::Card, SessionType::Cvc]).await;

    let finished = listener.finished();
    assert_eq!(finished.len(), 1);
    let sessions = finished[0].as_ref().unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions[&SessionType::Cvc].ends_with("/cvc-session"));
    assert!(sessions[&SessionType::Card].ends_with("/card-session"));

    let cvc_posts = service.requests_to(Method::Post, CVC_SESSIONS);
    assert_eq!(cvc_posts[0].body.as_deref(), Some(r#"{"cvc":"123","identity":"identity"}"#));
}

#[tokio::test]
async fn test_duplicate_session_types_count_once() {
    let service = Arc::new(FakeService::working());
    let listener = Arc::new(Sessions::default());
    let client = client(service.clone(), listener.clone());

    submit(&client, &[SessionType::Cvc, SessionType::Cvc]).await;

    assert_eq!(listener.finished().len(), 1);
    assert_eq!(service.requests_to(Method::Post, CVC_SESSIONS).len(), 1);
}

#[tokio::test]
async fn test_discovery_is_reused_between_submits() {
    let service = Arc::new(FakeService::working());
    let listener = Arc::new(Sessions::default());
    let client = client(service.clone(), listener.clone());

    submit(&client, &[SessionType::Card]).await;
    submit(&client, &[SessionType::Card]).await;

    assert_eq!(listener.finished().len(), 2);
    assert!(listener.finished().iter().all(Result::is_ok));
    assert_eq!(service.requests_to(Method::Get, BASE).len(), 1);
    assert_eq!(service.requests_to(Method::Get, SESSIONS).len(), 1);
    assert_eq!(service.requests_to(Method::Post, CARD_SESSIONS).len(), 2);
}

#[tokio::test]
async fn test_failed_discovery_is_retried_once() {
    let service = Arc::new(FakeService::default().get(BASE, HttpResponse::new(503, "")));
    let listener = Arc::new(Sessions::default());
    let client = client(service.clone(), listener.clone());

    for _ in 0..3 {
        submit(&client, &[SessionType::Card]).await;
    }

    let finished = listener.finished();
    assert_eq!(finished.len(), 3);
    for result in &finished {
        let error = result.as_ref().unwrap_err();
        assert!(error.to_string().contains("server error"), "{error}");
    }
    assert_eq!(service.requests_to(Method::Get, BASE).len(), 2);
}

#[tokio::test]
async fn test_first_error_ends_the_submit() {
    let bad_request = r#"{
        "errorName": "bodyDoesNotMatchSchema",
        "message": "bodyDoesNotMatchSchema",
        "validationErrors": [{
            "errorName": "panFailedLuhnCheck",
            "message": "The identified field contains a PAN that has failed the Luhn check.",
            "jsonPath": "$.cardNumber"
        }]
    }"#;
    let service = Arc::new(
        FakeService::working().post(CARD_SESSIONS, HttpResponse::new(400, bad_request)),
    );
    let listener = Arc::new(Sessions::default());
    let client = client(service, listener.clone());

    submit(&client, &[SessionType::Card, SessionType::Cvc]).await;

    let finished = listener.finished();
    assert_eq!(finished.len(), 1);
    let error = finished[0].as_ref().unwrap_err();
    let client_error = error.client_error().unwrap();
    assert_eq!(client_error.error_name, ApiErrorName::BodyDoesNotMatchSchema);
    assert_eq!(client_error.validation_errors[0].json_path, "$.cardNumber");
}

#[tokio::test]
async fn test_session_post_follows_redirect() {
    let moved = "https://access.example.com/v2/sessions/card";
    let service = Arc::new(
        FakeService::working()
            .post(
                CARD_SESSIONS,
                HttpResponse::new(308, "").with_location("/v2/sessions/card"),
            )
            .post(moved, HttpResponse::new(201, session_document("moved"))),
    );
    let listener = Arc::new(Sessions::default());
    let client = client(service.clone(), listener.clone());

    submit(&client, &[SessionType::Card]).await;

    let finished = listener.finished();
    assert!(finished[0].as_ref().unwrap()[&SessionType::Card].ends_with("/moved"));
    let redirected = service.requests_to(Method::Post, moved);
    assert_eq!(redirected.len(), 1);
    assert!(redirected[0].body.is_some());
}

#[tokio::test]
async fn test_response_without_session_link() {
    let service = Arc::new(
        FakeService::working().post(CVC_SESSIONS, HttpResponse::new(201, r#"{"_links": {}}"#)),
    );
    let listener = Arc::new(Sessions::default());
    let client = client(service, listener.clone());

    submit(&client, &[SessionType::Cvc]).await;

    assert_eq!(
        listener.finished()[0].as_ref().unwrap_err(),
        &AccessCheckoutError::Deserialization(DeserializationError::MissingObject(
            "sessions:session".into()
        ))
    );
}

#[tokio::test]
async fn test_card_session_needs_card_fields() {
    let listener = Arc::new(Sessions::default());
    let client = client(Arc::new(FakeService::working()), listener.clone());
    let cvc_only = CardDetails::builder().cvc("123").build().unwrap();

    let error = client
        .generate_sessions(&cvc_only, &[SessionType::Card])
        .unwrap_err();
    assert!(matches!(error, AccessCheckoutError::IllegalArgument(_)));
    assert_eq!(*listener.started.lock().unwrap(), 0);

    assert!(client.generate_sessions(&cvc_only, &[SessionType::Cvc]).is_ok());
}

// =============================================================================
// CARD CONFIGURATION
// =============================================================================

#[tokio::test]
async fn test_fetched_configuration_reaches_controller() {
    let only_visa = r#"[{"name": "visa", "pattern": "^4\\d*$", "panLengths": [16], "cvvLength": 3}]"#;
    let service = Arc::new(FakeService::default().get(
        "https://access.example.com/access-checkout/cardTypes.json",
        HttpResponse::new(200, only_visa),
    ));
    let provider = CardConfigurationProvider::default();
    let form = Form::new(CardConfiguration::default());
    form.controller.observe(&provider);

    form.type_into(Field::Pan, "4111111111111");
    assert_eq!(form.controller.brand(), None);

    provider
        .fetch(&HttpClient::new(service), BASE)
        .await
        .unwrap();

    assert_eq!(provider.current().brands().len(), 1);
    assert_eq!(form.controller.brand().map(|b| b.name().to_string()).as_deref(), Some("visa"));
    assert_eq!(form.pan.max(), Some(16));
}

#[tokio::test]
async fn test_background_fetch_redecorates_fields() {
    let only_visa = r#"[{"name": "visa", "pattern": "^4\\d*$", "panLengths": [16], "cvvLength": 3}]"#;
    let service = Arc::new(FakeService::default().get(
        "https://access.example.com/access-checkout/cardTypes.json",
        HttpResponse::new(200, only_visa),
    ));
    let provider = Arc::new(CardConfigurationProvider::default());
    let form = Form::new(CardConfiguration::default());
    form.controller.observe(&provider);

    form.type_into(Field::Pan, "4111111111111");
    assert_eq!(form.pan.max(), Some(19));
    assert_eq!(form.cvc.max(), Some(4));
    assert!(form.events.take().is_empty());

    provider
        .fetch_in_background(HttpClient::new(service.clone()), BASE.to_string())
        .await
        .unwrap();

    let card_types = "https://access.example.com/access-checkout/cardTypes.json";
    assert_eq!(service.requests_to(Method::Get, card_types).len(), 1);
    assert_eq!(provider.current().brands().len(), 1);
    assert_eq!(form.controller.configuration(), provider.current());
    assert_eq!(form.controller.brand().map(|b| b.name().to_string()).as_deref(), Some("visa"));
    assert_eq!(form.pan.max(), Some(16));
    assert_eq!(form.cvc.max(), Some(3));
    assert_eq!(form.events.take(), ["brand:visa"]);
}

#[tokio::test]
async fn test_failed_background_fetch_keeps_defaults() {
    let provider = Arc::new(CardConfigurationProvider::default());
    let form = Form::new(CardConfiguration::default());
    form.controller.observe(&provider);

    provider
        .fetch_in_background(HttpClient::new(Arc::new(FakeService::default())), BASE.to_string())
        .await
        .unwrap();

    assert!(provider.current().is_empty());
    assert_eq!(form.cvc.max(), Some(4));
}

struct Subscriber {
    provider: Arc<CardConfigurationProvider>,
    brands: Mutex<Vec<Option<String>>>,
}

impl ValidationListener for Subscriber {
    fn on_brand_change(&self, brand: Option<&CardBrand>) {
        self.brands
            .lock()
            .unwrap()
            .push(brand.map(|b| b.name().to_string()));
        self.provider.subscribe(|_| {});
    }
}

#[test]
fn test_listener_may_subscribe_during_configuration_swap() {
    let provider = Arc::new(CardConfigurationProvider::default());
    let listener = Arc::new(Subscriber {
        provider: Arc::clone(&provider),
        brands: Mutex::default(),
    });
    let pan = Arc::new(Input::default());
    let controller = CardValidationController::builder()
        .pan(pan.clone())
        .expiry_date(Arc::new(Input::default()))
        .cvc(Arc::new(Input::default()))
        .listener(listener.clone())
        .build()
        .unwrap();
    controller.observe(&provider);

    pan.set_text("4111");
    controller.on_text_changed(Field::Pan);

    let (done_tx, done_rx) = mpsc::channel();
    let updater = Arc::clone(&provider);
    std::thread::spawn(move || {
        updater.update(CardConfiguration::built_in());
        let _ = done_tx.send(());
    });

    assert!(
        done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
        "configuration swap did not return"
    );
    assert_eq!(*listener.brands.lock().unwrap(), [Some("visa".to_string())]);
    assert_eq!(controller.brand().map(|b| b.name().to_string()).as_deref(), Some("visa"));
}

#[tokio::test]
async fn test_unreachable_configuration_keeps_current() {
    let provider = CardConfigurationProvider::new(CardConfiguration::built_in());
    let result = provider
        .fetch(&HttpClient::new(Arc::new(FakeService::default())), BASE)
        .await;

    assert!(result.is_err());
    assert_eq!(provider.current().brands().len(), 7);
}

// =============================================================================
// FIELD VALIDATION
// =============================================================================

#[derive(Default)]
struct Input {
    text: Mutex<String>,
    max: Mutex<Option<usize>>,
}

impl Input {
    fn max(&self) -> Option<usize> {
        *self.max.lock().unwrap()
    }
}

impl CardField for Input {
    fn text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }

    fn set_max_length(&self, max: usize) {
        *self.max.lock().unwrap() = Some(max);
    }
}

#[derive(Default)]
struct Events(Mutex<Vec<String>>);

impl Events {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl ValidationListener for Events {
    fn on_pan_validated(&self, is_valid: bool) {
        self.0.lock().unwrap().push(format!("pan:{is_valid}"));
    }
    fn on_cvc_validated(&self, is_valid: bool) {
        self.0.lock().unwrap().push(format!("cvc:{is_valid}"));
    }
    fn on_expiry_date_validated(&self, is_valid: bool) {
        self.0.lock().unwrap().push(format!("expiry:{is_valid}"));
    }
    fn on_brand_change(&self, brand: Option<&CardBrand>) {
        let name = brand.map_or("none", CardBrand::name);
        self.0.lock().unwrap().push(format!("brand:{name}"));
    }
    fn on_validation_success(&self) {
        self.0.lock().unwrap().push("success".into());
    }
}

struct Form {
    pan: Arc<Input>,
    expiry: Arc<Input>,
    cvc: Arc<Input>,
    events: Arc<Events>,
    controller: CardValidationController,
}

impl Form {
    fn new(config: CardConfiguration) -> Self {
        Self::with_builder(CardValidationController::builder(), config)
    }

    fn with_builder(builder: CardValidationControllerBuilder, config: CardConfiguration) -> Self {
        let pan = Arc::new(Input::default());
        let expiry = Arc::new(Input::default());
        let cvc = Arc::new(Input::default());
        let events = Arc::new(Events::default());
        let clock: Clock = Arc::new(|| Local.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap());

        let controller = builder
            .pan(pan.clone())
            .expiry_date(expiry.clone())
            .cvc(cvc.clone())
            .listener(events.clone())
            .configuration(Arc::new(config))
            .clock(clock)
            .build()
            .unwrap();

        Self {
            pan,
            expiry,
            cvc,
            events,
            controller,
        }
    }

    fn type_into(&self, field: Field, text: &str) {
        let input = match field {
            Field::Pan => &self.pan,
            Field::ExpiryDate => &self.expiry,
            Field::Cvc => &self.cvc,
        };
        input.set_text(text);
        self.controller.on_text_changed(field);
    }
}

#[test]
fn test_complete_form_reports_success_once() {
    let form = Form::new(CardConfiguration::built_in());

    form.type_into(Field::Pan, "5555555555554444");
    form.type_into(Field::ExpiryDate, "1228");
    form.type_into(Field::Cvc, "123");

    assert_eq!(form.expiry.text(), "12/28");
    assert_eq!(
        form.events.take(),
        ["brand:mastercard", "pan:true", "expiry:true", "cvc:true", "success"]
    );

    form.type_into(Field::Cvc, "12");
    assert_eq!(form.events.take(), ["cvc:false"]);
}

#[test]
fn test_amex_cvc_is_revalidated_when_pan_changes_brand() {
    let form = Form::new(CardConfiguration::built_in());

    form.type_into(Field::Pan, "378282246310005");
    form.type_into(Field::Cvc, "1234");
    assert_eq!(form.events.take(), ["brand:amex", "pan:true", "cvc:true"]);

    form.type_into(Field::Pan, "4111111111111111");
    assert_eq!(form.events.take(), ["brand:visa", "cvc:false", "pan:true"]);
    assert_eq!(form.cvc.text(), "1234");
    assert_eq!(form.cvc.max(), Some(3));
}

#[test]
fn test_expired_date_is_reported_invalid() {
    let form = Form::new(CardConfiguration::built_in());

    form.type_into(Field::ExpiryDate, "09/26");
    assert_eq!(form.events.take(), ["expiry:false"]);

    form.type_into(Field::ExpiryDate, "10/26");
    assert_eq!(form.events.take(), ["expiry:true"]);
}

#[test]
fn test_client_config_sets_expiry_horizon() {
    let settings = ClientConfig::default().with_max_years_ahead(5);
    let form = Form::with_builder(settings.validation_builder(), CardConfiguration::built_in());

    form.type_into(Field::ExpiryDate, "01/32");
    assert_eq!(form.events.take(), ["expiry:false"]);

    form.type_into(Field::ExpiryDate, "01/31");
    assert_eq!(form.events.take(), ["expiry:true"]);
}

#[test]
fn test_session_details_from_validated_fields() {
    let form = Form::new(CardConfiguration::built_in());
    form.type_into(Field::Pan, "4111111111111111");
    form.type_into(Field::ExpiryDate, "1230");
    form.type_into(Field::Cvc, "123");

    let details = CardDetails::builder()
        .pan(form.pan.text())
        .expiry_date(form.expiry.text())
        .cvc(form.cvc.text())
        .build()
        .unwrap();

    assert_eq!(details.pan(), Some("4111111111111111"));
    assert_eq!(details.expiry_date().map(|d| d.to_string()).as_deref(), Some("12/30"));
}
