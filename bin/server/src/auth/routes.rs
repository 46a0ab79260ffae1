//! Auth routes mounted under `/api/auth`.

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use coursegate_identity::{Credentials, Session};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::provider::{CREDENTIALS_ID, ProviderDescriptor};
use super::{Auth, OAuthCallbackQuery, SignInRequest, redirect};
use crate::error::AuthError;

/// Builds the auth router. Mount it at [`super::AUTH_BASE_PATH`].
pub fn router() -> Router<Arc<Auth>> {
    Router::new()
        .route("/session", get(session))
        .route("/providers", get(providers))
        .route("/csrf", get(csrf))
        .route("/signin", get(sign_in_page))
        .route(
            "/signin/{provider}",
            get(sign_in_oauth).post(sign_in_oauth_form),
        )
        .route("/callback/{provider}", get(oauth_callback))
        .route("/callback/credentials", post(credentials_callback))
        .route("/signout", post(sign_out))
}

/// Query parameters carrying a post-sign-in destination.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackParams {
    pub callback_url: Option<String>,
}

/// Form body of POSTs that only carry CSRF and a destination.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfForm {
    pub csrf_token: Option<String>,
    pub callback_url: Option<String>,
}

/// Form body of the credential sign-in.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub csrf_token: Option<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CsrfResponse {
    csrf_token: String,
}

/// Logs an auth failure and redirects to the page that reports it.
fn fail(auth: &Auth, origin: &Url, jar: CookieJar, report: rootcause::Report<AuthError>) -> Response {
    let error = report.current_context();
    match error {
        AuthError::CredentialsSignin => tracing::info!("credential sign-in rejected"),
        AuthError::MissingCsrf => tracing::warn!("request failed CSRF check"),
        AuthError::AccountNotLinked { .. } | AuthError::OAuthCallback { .. } => {
            tracing::warn!(error = %report, "OAuth sign-in failed");
        }
        AuthError::Configuration { .. } | AuthError::UnknownProvider { .. } => {
            tracing::error!(error = %report, "auth request failed");
        }
    }
    (jar, Redirect::to(&auth.error_page(origin, error))).into_response()
}

/// Returns the current session as JSON, or `null`.
async fn session(State(auth): State<Arc<Auth>>, jar: CookieJar) -> (CookieJar, Json<Option<Session>>) {
    let (jar, session) = auth.session(jar);
    (jar, Json(session))
}

async fn providers(
    State(auth): State<Arc<Auth>>,
    headers: HeaderMap,
) -> Json<BTreeMap<&'static str, ProviderDescriptor>> {
    Json(auth.providers(&auth.origin(&headers)))
}

/// Returns the CSRF token, setting its cookie on first use.
async fn csrf(State(auth): State<Arc<Auth>>, jar: CookieJar) -> (CookieJar, Json<CsrfResponse>) {
    let (jar, csrf_token) = auth.csrf_token(jar);
    (jar, Json(CsrfResponse { csrf_token }))
}

async fn sign_in_page(
    State(auth): State<Arc<Auth>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let origin = auth.origin(&headers);
    let callback_url = params
        .callback_url
        .as_deref()
        .map(|c| redirect::safe_callback_url(Some(c), &origin));
    Redirect::to(&auth.sign_in_page(&origin, callback_url.as_deref()))
}

async fn start_oauth(
    auth: &Auth,
    headers: &HeaderMap,
    jar: CookieJar,
    provider: String,
    callback_url: Option<String>,
) -> Response {
    let origin = auth.origin(headers);
    let request = SignInRequest::OAuth {
        provider,
        callback_url,
    };
    match auth.sign_in(jar.clone(), request, &origin).await {
        Ok((jar, auth_url)) => (jar, Redirect::to(&auth_url)).into_response(),
        Err(report) => fail(auth, &origin, jar, report),
    }
}

async fn sign_in_oauth(
    State(auth): State<Arc<Auth>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    start_oauth(&auth, &headers, jar, provider, params.callback_url).await
}

async fn sign_in_oauth_form(
    State(auth): State<Arc<Auth>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<CsrfForm>,
) -> Response {
    if let Err(report) = auth.check_csrf(&jar, form.csrf_token.as_deref()) {
        return fail(&auth, &auth.origin(&headers), jar, report);
    }
    start_oauth(&auth, &headers, jar, provider, form.callback_url).await
}

async fn oauth_callback(
    State(auth): State<Arc<Auth>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let origin = auth.origin(&headers);
    match auth.complete_oauth(jar.clone(), &provider, query).await {
        Ok((jar, callback_url)) => (jar, Redirect::to(&callback_url)).into_response(),
        Err(report) => {
            let jar = jar.add(auth.cookies().removal(&auth.cookies().oauth_state));
            fail(&auth, &origin, jar, report)
        }
    }
}

async fn credentials_callback(
    State(auth): State<Arc<Auth>>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let origin = auth.origin(&headers);
    if let Err(report) = auth.check_csrf(&jar, form.csrf_token.as_deref()) {
        return fail(&auth, &origin, jar, report);
    }

    let request = SignInRequest::Credentials {
        credentials: Credentials {
            email: form.email.map(Value::String),
            password: form.password.map(Value::String),
        },
        callback_url: form.callback_url,
    };
    tracing::debug!(provider = CREDENTIALS_ID, "credential sign-in attempt");
    match auth.sign_in(jar.clone(), request, &origin).await {
        Ok((jar, callback_url)) => (jar, Redirect::to(&callback_url)).into_response(),
        Err(report) => fail(&auth, &origin, jar, report),
    }
}

async fn sign_out(
    State(auth): State<Arc<Auth>>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<CsrfForm>,
) -> Response {
    let origin = auth.origin(&headers);
    if let Err(report) = auth.check_csrf(&jar, form.csrf_token.as_deref()) {
        return fail(&auth, &origin, jar, report);
    }
    let target = redirect::safe_callback_url(form.callback_url.as_deref(), &origin);
    (auth.sign_out(jar), Redirect::to(&target)).into_response()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{auth_with_instructor, auth_with_unavailable_storage};
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(auth: Arc<Auth>) -> Router {
        Router::new()
            .nest(super::super::AUTH_BASE_PATH, router())
            .with_state(auth)
    }

    /// Collects `name=value` pairs from the response's Set-Cookie headers.
    fn set_cookies(response: &Response) -> Vec<(String, String)> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Fetches a CSRF token and returns `(token, cookie header)`.
    async fn csrf_pair(app: &Router) -> (String, String) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/csrf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookies = set_cookies(&response);
        let (name, value) = cookies
            .iter()
            .find(|(n, _)| n == "authjs.csrf-token")
            .cloned()
            .unwrap();
        let body = json_body(response).await;
        let token = body["csrfToken"].as_str().unwrap().to_string();
        (token, format!("{name}={value}"))
    }

    fn form_post(uri: &str, cookie: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn credential_sign_in_with_storage_down_shows_error_page() {
        let app = app(auth_with_unavailable_storage());
        let (csrf, csrf_cookie) = csrf_pair(&app).await;

        let response = app
            .oneshot(form_post(
                "/api/auth/callback/credentials",
                &csrf_cookie,
                format!("email=teach%40example.com&password=pw&csrfToken={csrf}"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            "http://localhost:3000/auth/error?error=Configuration"
        );
        assert!(
            set_cookies(&response)
                .iter()
                .all(|(n, _)| n != "authjs.session-token")
        );
    }

    #[tokio::test]
    async fn session_is_null_without_cookie() {
        let (auth, _) = auth_with_instructor().await;

        let response = app(auth)
            .oneshot(
                Request::builder()
                    .uri("/api/auth/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, Value::Null);
    }

    #[tokio::test]
    async fn credential_sign_in_sets_cookie_and_session_reads_it() {
        let (auth, user) = auth_with_instructor().await;
        let app = app(auth);
        let (csrf, csrf_cookie) = csrf_pair(&app).await;

        let response = app
            .clone()
            .oneshot(form_post(
                "/api/auth/callback/credentials",
                &csrf_cookie,
                format!(
                    "email=teach%40example.com&password=pw&csrfToken={csrf}&callbackUrl=%2Fcourses"
                ),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "http://localhost:3000/courses");
        let (name, token) = set_cookies(&response)
            .into_iter()
            .find(|(n, _)| n == "authjs.session-token")
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/auth/session")
                    .header(header::COOKIE, format!("{name}={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["user"]["id"], user.id().as_str());
        assert_eq!(body["user"]["role"], "instructor");
        assert_eq!(body["user"]["email"], "teach@example.com");
    }

    #[tokio::test]
    async fn rejected_credentials_redirect_to_sign_in() {
        let (auth, _) = auth_with_instructor().await;
        let app = app(auth);
        let (csrf, csrf_cookie) = csrf_pair(&app).await;

        let response = app
            .oneshot(form_post(
                "/api/auth/callback/credentials",
                &csrf_cookie,
                format!("email=teach%40example.com&password=wrong&csrfToken={csrf}"),
            ))
            .await
            .unwrap();

        assert_eq!(
            location(&response),
            "http://localhost:3000/auth/signin?error=CredentialsSignin"
        );
        assert!(
            set_cookies(&response)
                .iter()
                .all(|(n, _)| n != "authjs.session-token")
        );
    }

    #[tokio::test]
    async fn missing_csrf_redirects_to_error_page() {
        let (auth, _) = auth_with_instructor().await;

        let response = app(auth)
            .oneshot(form_post(
                "/api/auth/callback/credentials",
                "",
                "email=teach%40example.com&password=pw".to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(
            location(&response),
            "http://localhost:3000/auth/error?error=MissingCSRF"
        );
    }

    #[tokio::test]
    async fn foreign_callback_url_is_replaced() {
        let (auth, _) = auth_with_instructor().await;
        let app = app(auth);
        let (csrf, csrf_cookie) = csrf_pair(&app).await;

        let response = app
            .oneshot(form_post(
                "/api/auth/callback/credentials",
                &csrf_cookie,
                format!(
                    "email=teach%40example.com&password=pw&csrfToken={csrf}\
                     &callbackUrl=https%3A%2F%2Fevil.example.com%2F"
                ),
            ))
            .await
            .unwrap();

        assert_eq!(location(&response), "http://localhost:3000");
    }

    #[tokio::test]
    async fn sign_out_clears_session_cookie() {
        let (auth, _) = auth_with_instructor().await;
        let app = app(auth);
        let (csrf, csrf_cookie) = csrf_pair(&app).await;

        let response = app
            .oneshot(form_post(
                "/api/auth/signout",
                &csrf_cookie,
                format!("csrfToken={csrf}"),
            ))
            .await
            .unwrap();

        assert_eq!(location(&response), "http://localhost:3000");
        assert!(
            set_cookies(&response)
                .iter()
                .any(|(n, v)| n == "authjs.session-token" && v.is_empty())
        );
    }

    #[tokio::test]
    async fn providers_lists_credentials() {
        let (auth, _) = auth_with_instructor().await;

        let response = app(auth)
            .oneshot(
                Request::builder()
                    .uri("/api/auth/providers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["credentials"]["type"], "credentials");
        assert!(body.get("google").is_none());
    }

    #[tokio::test]
    async fn sign_in_route_redirects_to_page() {
        let (auth, _) = auth_with_instructor().await;

        let response = app(auth)
            .oneshot(
                Request::builder()
                    .uri("/api/auth/signin?callbackUrl=%2Fcourses")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            location(&response),
            "http://localhost:3000/auth/signin?callbackUrl=http%3A%2F%2Flocalhost%3A3000%2Fcourses"
        );
    }

    #[tokio::test]
    async fn unconfigured_oauth_provider_reports_configuration() {
        let (auth, _) = auth_with_instructor().await;

        let response = app(auth)
            .oneshot(
                Request::builder()
                    .uri("/api/auth/signin/google")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            location(&response),
            "http://localhost:3000/auth/error?error=Configuration"
        );
    }
}
