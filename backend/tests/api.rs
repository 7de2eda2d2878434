use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD,
    CONTENT_TYPE, ORIGIN,
};
use actix_web::http::{Method, StatusCode};
use actix_web::{test, App};
use futures::future::join_all;
use serde_json::{json, Value};

use heart_api::inference::shared;
use heart_api::models::{ErrorBody, HealthResponse, ModelInfo};
use heart_api::routes;
use heart_inference::{Classifier, FeatureRow, ModelError, ModelResult, PredictionResult};

/// Linear score on cholesterol and age; the label uses a separate threshold on oldpeak.
struct Deterministic {
    calls: AtomicUsize,
}

impl Deterministic {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for Deterministic {
    fn predict_proba(&self, row: &FeatureRow) -> ModelResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chol = row.get("chol").map(|v| v.as_f64()).unwrap_or_default();
        let age = row.get("age").map(|v| v.as_f64()).unwrap_or_default();
        Ok(((chol / 400.0) * 0.6 + (age / 100.0) * 0.4).clamp(0.0, 1.0))
    }

    fn predict(&self, row: &FeatureRow) -> ModelResult<i64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let oldpeak = row.get("oldpeak").map(|v| v.as_f64()).unwrap_or_default();
        Ok(i64::from(oldpeak > 1.0))
    }

    fn describe(&self) -> String {
        "deterministic stub".to_string()
    }
}

/// Fails the first call, then answers normally.
struct FailsOnce {
    failed: AtomicBool,
}

impl Classifier for FailsOnce {
    fn predict_proba(&self, _row: &FeatureRow) -> ModelResult<f64> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(ModelError::Inference(anyhow::anyhow!("tree ensemble blew up")));
        }
        Ok(0.3)
    }

    fn predict(&self, _row: &FeatureRow) -> ModelResult<i64> {
        Ok(0)
    }
}

struct OutOfRange;

impl Classifier for OutOfRange {
    fn predict_proba(&self, _row: &FeatureRow) -> ModelResult<f64> {
        Ok(1.7)
    }

    fn predict(&self, _row: &FeatureRow) -> ModelResult<i64> {
        Ok(1)
    }
}

macro_rules! app {
    ($model:expr) => {
        app!($model, &[])
    };
    ($model:expr, $origins:expr) => {{
        let origins: Vec<String> = $origins.iter().map(|o: &&str| o.to_string()).collect();
        test::init_service(
            App::new()
                .wrap(routes::cors(&origins))
                .app_data(shared($model))
                .configure(routes::configure),
        )
        .await
    }};
}

fn scenario_a() -> Value {
    json!({
        "age": 63, "sex": 1, "cp": 3, "trestbps": 145, "chol": 233, "fbs": 1,
        "restecg": 0, "thalach": 150, "exang": 0, "oldpeak": 2.3, "slope": 0,
        "ca": 0, "thal": 1
    })
}

fn post_predict(body: &Value) -> test::TestRequest {
    test::TestRequest::post().uri("/predict").set_json(body)
}

#[actix_web::test]
async fn scenario_a_returns_probability_and_label() {
    let model = Deterministic::new();
    let app = app!(model.clone());

    let resp = test::call_service(&app, post_predict(&scenario_a()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let object = body.as_object().unwrap();
    assert_eq!(object.len(), 2);

    let probability = body["probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&probability));
    let label = body["label"].as_i64().unwrap();
    assert!(label == 0 || label == 1);

    let expected = (233.0 / 400.0) * 0.6 + (63.0 / 100.0) * 0.4;
    assert!((probability - expected).abs() < 1e-12);
    assert_eq!(label, 1);
    assert_eq!(model.calls(), 2);
}

#[actix_web::test]
async fn scenario_b_missing_age_never_reaches_the_model() {
    let model = Deterministic::new();
    let app = app!(model.clone());

    let mut body = scenario_a();
    body.as_object_mut().unwrap().remove("age");

    let resp = test::call_service(&app, post_predict(&body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let raw: Value = test::read_body_json(resp).await;
    assert!(raw.get("probability").is_none());
    assert!(raw.get("label").is_none());

    let error: ErrorBody = serde_json::from_value(raw).unwrap();
    assert_eq!(error.error, "invalid_input");
    assert!(error.detail.contains("age"), "{}", error.detail);
    assert_eq!(model.calls(), 0);
}

#[actix_web::test]
async fn every_missing_field_is_a_client_error() {
    let model = Deterministic::new();
    let app = app!(model.clone());

    for name in heart_inference::FEATURE_NAMES {
        let mut body = scenario_a();
        body.as_object_mut().unwrap().remove(name);
        let resp = test::call_service(&app, post_predict(&body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{name}");
    }
    assert_eq!(model.calls(), 0);
}

#[actix_web::test]
async fn non_numeric_value_is_a_client_error() {
    let model = Deterministic::new();
    let app = app!(model.clone());

    let mut body = scenario_a();
    body["chol"] = json!("high");
    let resp = test::call_service(&app, post_predict(&body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let mut body = scenario_a();
    body["cp"] = json!(2.5);
    let resp = test::call_service(&app, post_predict(&body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(model.calls(), 0);
}

#[actix_web::test]
async fn numeric_strings_and_integral_floats_are_coerced() {
    let app = app!(Deterministic::new());

    let mut body = scenario_a();
    body["age"] = json!("63");
    body["sex"] = json!(1.0);
    let coerced = test::call_service(&app, post_predict(&body).to_request()).await;
    assert_eq!(coerced.status(), StatusCode::OK);
    let coerced: PredictionResult = test::read_body_json(coerced).await;

    let plain: PredictionResult =
        test::call_and_read_body_json(&app, post_predict(&scenario_a()).to_request()).await;
    assert_eq!(coerced, plain);
}

#[actix_web::test]
async fn broken_json_is_a_bad_request() {
    let app = app!(Deterministic::new());

    let req = test::TestRequest::post()
        .uri("/predict")
        .insert_header((CONTENT_TYPE, "application/json"))
        .set_payload(r#"{"age": 63, "sex": "#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let error: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(error.error, "malformed_body");
}

#[actix_web::test]
async fn non_json_content_type_is_rejected() {
    let app = app!(Deterministic::new());

    let req = test::TestRequest::post()
        .uri("/predict")
        .insert_header((CONTENT_TYPE, "text/plain"))
        .set_payload(scenario_a().to_string())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[actix_web::test]
async fn model_failure_fails_only_that_request() {
    let app = app!(Arc::new(FailsOnce {
        failed: AtomicBool::new(false),
    }));

    let resp = test::call_service(&app, post_predict(&scenario_a()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(error.error, "prediction_failed");
    assert!(error.detail.contains("tree ensemble blew up"));

    let resp = test::call_service(&app, post_predict(&scenario_a()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let result: PredictionResult = test::read_body_json(resp).await;
    assert_eq!(result, PredictionResult { probability: 0.3, label: 0 });
}

#[actix_web::test]
async fn out_of_range_model_output_is_a_server_error() {
    let app = app!(Arc::new(OutOfRange));

    let resp = test::call_service(&app, post_predict(&scenario_a()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn concurrent_requests_match_a_sequential_call() {
    let model = Deterministic::new();
    let app = app!(model.clone());

    let expected: PredictionResult =
        test::call_and_read_body_json(&app, post_predict(&scenario_a()).to_request()).await;

    let responses = join_all(
        (0..32).map(|_| test::call_service(&app, post_predict(&scenario_a()).to_request())),
    )
    .await;
    for resp in responses {
        assert_eq!(resp.status(), StatusCode::OK);
        let result: PredictionResult = test::read_body_json(resp).await;
        assert_eq!(result, expected);
    }
    assert_eq!(model.calls(), 2 * 33);
}

#[actix_web::test]
async fn allowed_origin_gets_credentialed_cors() {
    let app = app!(Deterministic::new(), &["http://localhost:5173"]);

    let preflight = test::TestRequest::default()
        .method(Method::OPTIONS)
        .uri("/predict")
        .insert_header((ORIGIN, "http://localhost:5173"))
        .insert_header((ACCESS_CONTROL_REQUEST_METHOD, "POST"))
        .to_request();
    let resp = test::call_service(&app, preflight).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        resp.headers().get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );

    let req = test::TestRequest::post()
        .uri("/predict")
        .insert_header((ORIGIN, "http://localhost:5173"))
        .set_json(scenario_a())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
}

#[actix_web::test]
async fn unlisted_origin_gets_no_cors_grant() {
    let app = app!(Deterministic::new(), &["http://localhost:5173"]);

    let req = test::TestRequest::post()
        .uri("/predict")
        .insert_header((ORIGIN, "https://evil.example.com"))
        .set_json(scenario_a())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[actix_web::test]
async fn no_origin_is_allowed_by_default() {
    let app = app!(Deterministic::new());

    let req = test::TestRequest::post()
        .uri("/predict")
        .insert_header((ORIGIN, "http://localhost:5173"))
        .set_json(scenario_a())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[actix_web::test]
async fn health_and_model_info() {
    let app = app!(Deterministic::new());

    let req = test::TestRequest::get().uri("/health").to_request();
    let health: HealthResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(health.status, "ready");

    let req = test::TestRequest::get().uri("/model-info").to_request();
    let info: ModelInfo = test::call_and_read_body_json(&app, req).await;
    assert_eq!(info.backend, "deterministic stub");
    assert_eq!(info.features, heart_inference::FEATURE_NAMES);
    assert_eq!(info.positive_class, 1);
}

#[actix_web::test]
async fn predict_only_accepts_post() {
    let app = app!(Deterministic::new());

    let req = test::TestRequest::get().uri("/predict").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
}
