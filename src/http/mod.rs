//! HTTP surface: routes, bearer extraction and CORS.
//!
//! | Route | Auth |
//! |---|---|
//! | `GET /` | none |
//! | `POST /register`, `POST /login` | none |
//! | `POST /logout`, `GET /protected` | bearer token |
//! | `POST /predict` | none |

mod error;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::application::{AuthService, PredictionService};
use crate::config::origin_allowed;
use crate::domain::PredictionResult;
use crate::ports::{RiskClassifier, UserStore};
use crate::CardioError;

const CREDENTIALS_REQUIRED: &str = "Username and password are required";
const NO_DATA: &str = "No data provided";

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Services shared by every request. Built once at startup.
pub struct AppState<C, S>
where
    C: RiskClassifier + 'static,
    S: UserStore + 'static,
{
    pub prediction: PredictionService<C>,
    pub auth: AuthService<S>,
}

impl<C, S> AppState<C, S>
where
    C: RiskClassifier + 'static,
    S: UserStore + 'static,
{
    pub fn new(prediction: PredictionService<C>, auth: AuthService<S>) -> Self {
        Self { prediction, auth }
    }

    /// Resolve the request's bearer token to a username.
    fn authorize(&self, headers: &HeaderMap) -> ApiResult<String> {
        let token = bearer_token(headers)?;
        Ok(self.auth.verify(token)?)
    }
}

/// Build the application router.
pub fn router<C, S>(state: Arc<AppState<C, S>>, allowed_origins: &[String]) -> Router
where
    C: RiskClassifier + 'static,
    S: UserStore + 'static,
{
    let patterns = allowed_origins.to_vec();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _: &Parts| {
                origin
                    .to_str()
                    .map(|o| origin_allowed(&patterns, o))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .route("/", get(home))
        .route("/register", post(register::<C, S>))
        .route("/login", post(login::<C, S>))
        .route("/logout", post(logout::<C, S>))
        .route("/protected", get(protected::<C, S>))
        .route("/predict", post(predict::<C, S>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> ApiResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization Header"))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CardioError::Unauthenticated("Invalid token").into())
}

#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl Credentials {
    fn parse(body: Result<Json<Credentials>, JsonRejection>) -> ApiResult<(String, String)> {
        let Json(creds) = body.map_err(|_| ApiError::bad_request(CREDENTIALS_REQUIRED))?;
        Ok((
            creds.username.unwrap_or_default(),
            creds.password.unwrap_or_default(),
        ))
    }
}

async fn home() -> Json<Value> {
    Json(json!({ "message": "Heart Disease Detection API running" }))
}

async fn register<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)>
where
    C: RiskClassifier + 'static,
    S: UserStore + 'static,
{
    let (username, password) = Credentials::parse(body)?;
    let token = state.auth.register(&username, &password).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "access_token": token,
        })),
    ))
}

async fn login<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<Value>>
where
    C: RiskClassifier + 'static,
    S: UserStore + 'static,
{
    let (username, password) = Credentials::parse(body)?;
    let token = state.auth.login(&username, &password).await?;
    Ok(Json(json!({ "access_token": token })))
}

async fn logout<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>>
where
    C: RiskClassifier + 'static,
    S: UserStore + 'static,
{
    let username = state.authorize(&headers)?;
    state.auth.logout(&username);
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

async fn protected<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>>
where
    C: RiskClassifier + 'static,
    S: UserStore + 'static,
{
    let username = state.authorize(&headers)?;
    Ok(Json(json!({ "message": format!("Hello, {username}!") })))
}

async fn predict<C, S>(
    State(state): State<Arc<AppState<C, S>>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<PredictionResult>>
where
    C: RiskClassifier + 'static,
    S: UserStore + 'static,
{
    let Ok(Json(Value::Object(record))) = body else {
        return Err(ApiError::bad_request(NO_DATA));
    };
    Ok(Json(state.prediction.predict(record).await?))
}
