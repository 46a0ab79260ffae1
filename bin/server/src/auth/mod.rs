//! Authentication for the coursegate server.
//!
//! This module provides:
//! - Google sign-in over OpenID Connect and email/password sign-in
//! - Stateless sessions carried in a signed token cookie
//! - Double-submit CSRF protection for state-changing POSTs
//! - Extractors for Axum routes that need the current session
//!
//! # Roles
//!
//! The user's `role` is read from the database only when a token is issued.
//! Every later request trusts the role inside the token until it expires, so
//! a role change takes effect on the user's next sign-in.

pub mod cookies;
pub mod csrf;
pub mod db;
pub mod google;
pub mod middleware;
pub mod provider;
pub mod redirect;
pub mod routes;

use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use coursegate_core::Result;
use coursegate_identity::{
    AuthorizedUser, Credentials, Session, SessionAdapter, TokenClaims, TokenCodec, authorize,
    enrich_token, project_session,
};
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::{debug, info, instrument, warn};

use crate::config::{PagesConfig, ServerConfig};
use crate::error::AuthError;

pub use cookies::AuthCookies;
pub use middleware::{OptionalSession, RequireSession, SessionRejection, refresh_session};
pub use provider::{Provider, ProviderDescriptor};

/// Path the auth routes are mounted under.
pub const AUTH_BASE_PATH: &str = "/api/auth";

/// Settings that shape token lifetime, cookies and redirects.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub base_url: Url,
    pub trust_host: bool,
    pub secret: String,
    pub max_age: Duration,
    pub secure_cookies: bool,
    pub pages: PagesConfig,
}

impl AuthSettings {
    /// Derives auth settings from the server configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute URL.
    pub fn from_config(config: &ServerConfig) -> std::result::Result<Self, config::ConfigError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            config::ConfigError::Message(format!("invalid base_url '{}': {e}", config.base_url))
        })?;
        Ok(Self {
            base_url,
            trust_host: config.trust_host,
            secret: config.auth_secret.clone(),
            max_age: Duration::seconds(config.session.max_age_seconds),
            secure_cookies: config.secure_cookies(),
            pages: config.pages.clone(),
        })
    }
}

/// How a user asked to sign in.
#[derive(Debug)]
pub enum SignInRequest {
    /// Email and password, checked immediately.
    Credentials {
        credentials: Credentials,
        callback_url: Option<String>,
    },
    /// Redirect to an OAuth provider.
    OAuth {
        provider: String,
        callback_url: Option<String>,
    },
}

/// Query parameters Google sends to the callback route.
#[derive(Debug, Default, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Shared authentication state.
///
/// Built once at startup and shared with handlers through an `Arc`.
pub struct Auth {
    settings: AuthSettings,
    cookies: AuthCookies,
    codec: TokenCodec,
    adapter: Arc<dyn SessionAdapter>,
    providers: Vec<Provider>,
}

impl Auth {
    #[must_use]
    pub fn new(
        settings: AuthSettings,
        adapter: Arc<dyn SessionAdapter>,
        providers: Vec<Provider>,
    ) -> Self {
        Self {
            cookies: AuthCookies::new(settings.secure_cookies),
            codec: TokenCodec::new(&settings.secret),
            settings,
            adapter,
            providers,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    #[must_use]
    pub fn cookies(&self) -> &AuthCookies {
        &self.cookies
    }

    #[must_use]
    pub fn adapter(&self) -> &dyn SessionAdapter {
        self.adapter.as_ref()
    }

    /// The public origin for this request.
    #[must_use]
    pub fn origin(&self, headers: &HeaderMap) -> Url {
        redirect::request_origin(&self.settings.base_url, headers, self.settings.trust_host)
    }

    /// Lists the configured providers keyed by ID.
    #[must_use]
    pub fn providers(&self, origin: &Url) -> BTreeMap<&'static str, ProviderDescriptor> {
        let auth_base = redirect::page_url(origin, AUTH_BASE_PATH, &[]);
        self.providers
            .iter()
            .map(|p| (p.id(), p.describe(&auth_base)))
            .collect()
    }

    fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id() == id)
    }

    fn token_cookie_max_age(&self) -> TimeDuration {
        TimeDuration::seconds(self.settings.max_age.num_seconds())
    }

    /// Decodes the session token cookie without touching the jar.
    #[must_use]
    pub fn read_token(&self, jar: &CookieJar) -> Option<TokenClaims> {
        let cookie = jar.get(&self.cookies.session_token)?;
        match self.codec.decode(cookie.value()) {
            Ok(claims) => Some(enrich_token(claims, None)),
            Err(e) => {
                debug!(error = %e, "ignoring unusable session token");
                None
            }
        }
    }

    /// Reads the current session without refreshing the token.
    #[must_use]
    pub fn read_session(&self, jar: &CookieJar) -> Option<Session> {
        self.read_token(jar)
            .map(|claims| project_session(Session::from_claims(&claims), &claims))
    }

    /// Reads the current session and re-issues its token with a fresh expiry.
    ///
    /// A cookie that no longer verifies is cleared.
    pub fn session(&self, jar: CookieJar) -> (CookieJar, Option<Session>) {
        if jar.get(&self.cookies.session_token).is_none() {
            return (jar, None);
        }
        let Some(claims) = self.read_token(&jar) else {
            let jar = jar.add(self.cookies.removal(&self.cookies.session_token));
            return (jar, None);
        };

        let refreshed = claims.clone().refreshed(Utc::now(), self.settings.max_age);
        let (jar, claims) = match self.codec.encode(&refreshed) {
            Ok(token) => (
                jar.add(self.cookies.build(
                    &self.cookies.session_token,
                    token,
                    Some(self.token_cookie_max_age()),
                )),
                refreshed,
            ),
            Err(e) => {
                warn!(error = %e, "failed to re-issue session token");
                (jar, claims)
            }
        };

        let session = project_session(Session::from_claims(&claims), &claims);
        (jar, Some(session))
    }

    /// Signs a token for a freshly authenticated user and stores it in the jar.
    fn issue_token(&self, jar: CookieJar, user: &AuthorizedUser) -> Result<CookieJar, AuthError> {
        let claims = enrich_token(
            TokenClaims::for_user(user, Utc::now(), self.settings.max_age),
            Some(user),
        );
        let token = self.codec.encode(&claims).map_err(AuthError::from)?;
        Ok(jar.add(self.cookies.build(
            &self.cookies.session_token,
            token,
            Some(self.token_cookie_max_age()),
        )))
    }

    /// Starts or completes a sign-in.
    ///
    /// Returns the updated jar and the URL to redirect to: the callback URL
    /// for credentials, the provider's authorization page for OAuth.
    #[instrument(skip_all)]
    pub async fn sign_in(
        &self,
        jar: CookieJar,
        request: SignInRequest,
        origin: &Url,
    ) -> Result<(CookieJar, String), AuthError> {
        match request {
            SignInRequest::Credentials {
                credentials,
                callback_url,
            } => {
                let Some(user) = authorize(self.adapter(), &credentials)
                    .await
                    .map_err(AuthError::from)?
                else {
                    return Err(AuthError::CredentialsSignin.into());
                };
                let jar = self.issue_token(jar, &user)?;
                info!(user_id = %user.id, "signed in with credentials");
                Ok((
                    jar,
                    redirect::safe_callback_url(callback_url.as_deref(), origin),
                ))
            }
            SignInRequest::OAuth {
                provider,
                callback_url,
            } => {
                let Some(Provider::OAuth(google)) = self.provider(&provider) else {
                    return Err(AuthError::UnknownProvider { id: provider }.into());
                };
                let callback_url = redirect::safe_callback_url(callback_url.as_deref(), origin);
                let (auth_url, state) = google.authorization_url(callback_url);
                let state_cookie = state.to_cookie_value().map_err(AuthError::from)?;
                let jar = jar.add(self.cookies.build(
                    &self.cookies.oauth_state,
                    state_cookie,
                    Some(cookies::OAUTH_STATE_MAX_AGE),
                ));
                Ok((jar, auth_url))
            }
        }
    }

    /// Completes an OAuth sign-in from the provider's callback.
    #[instrument(skip_all, fields(provider = provider_id))]
    pub async fn complete_oauth(
        &self,
        jar: CookieJar,
        provider_id: &str,
        query: OAuthCallbackQuery,
    ) -> Result<(CookieJar, String), AuthError> {
        let Some(Provider::OAuth(google)) = self.provider(provider_id) else {
            return Err(AuthError::UnknownProvider {
                id: provider_id.to_string(),
            }
            .into());
        };

        if let Some(error) = query.error {
            return Err(AuthError::OAuthCallback {
                reason: format!("provider returned error '{error}'"),
            }
            .into());
        }

        let state = jar
            .get(&self.cookies.oauth_state)
            .ok_or_else(|| AuthError::OAuthCallback {
                reason: "missing state cookie".to_string(),
            })
            .and_then(|c| {
                google::OAuthState::from_cookie_value(c.value()).map_err(AuthError::from)
            })?;

        if query.state.as_deref() != Some(state.csrf_token.as_str()) {
            return Err(AuthError::OAuthCallback {
                reason: "state mismatch".to_string(),
            }
            .into());
        }
        let code = query.code.ok_or_else(|| AuthError::OAuthCallback {
            reason: "missing authorization code".to_string(),
        })?;

        let (profile, tokens) = google
            .exchange_code(&code, &state)
            .await
            .map_err(AuthError::from)?;
        let user = google::resolve_user(self.adapter(), &profile, tokens)
            .await
            .map_err(AuthError::from)?;

        let authorized = AuthorizedUser::from(&user);
        let jar = self
            .issue_token(jar, &authorized)?
            .add(self.cookies.removal(&self.cookies.oauth_state));
        info!(user_id = %authorized.id, "signed in with Google");
        Ok((jar, state.callback_url))
    }

    /// Clears the session cookie.
    #[must_use]
    pub fn sign_out(&self, jar: CookieJar) -> CookieJar {
        if let Some(claims) = self.read_token(&jar) {
            debug!(user_id = ?claims.sub, "signed out");
        }
        jar.add(self.cookies.removal(&self.cookies.session_token))
    }

    /// Returns the CSRF token for this browser, minting one if needed.
    #[must_use]
    pub fn csrf_token(&self, jar: CookieJar) -> (CookieJar, String) {
        let existing = jar
            .get(&self.cookies.csrf_token)
            .and_then(|c| csrf::token_from_cookie(c.value(), &self.settings.secret));
        if let Some(token) = existing {
            return (jar, token);
        }
        let pair = csrf::issue(&self.settings.secret);
        let jar = jar.add(
            self.cookies
                .build(&self.cookies.csrf_token, pair.cookie_value, None),
        );
        (jar, pair.token)
    }

    /// Verifies the double-submit CSRF token of a POST.
    pub fn check_csrf(&self, jar: &CookieJar, submitted: Option<&str>) -> Result<(), AuthError> {
        let cookie = jar.get(&self.cookies.csrf_token).map(|c| c.value());
        if csrf::verify(cookie, submitted, &self.settings.secret) {
            Ok(())
        } else {
            Err(AuthError::MissingCsrf.into())
        }
    }

    /// URL of the sign-in page, carrying the page to return to.
    #[must_use]
    pub fn sign_in_page(&self, origin: &Url, callback_url: Option<&str>) -> String {
        let params: Vec<(&str, &str)> = callback_url
            .map(|c| vec![("callbackUrl", c)])
            .unwrap_or_default();
        redirect::page_url(origin, &self.settings.pages.sign_in, &params)
    }

    /// URL of the page that reports `error`.
    #[must_use]
    pub fn error_page(&self, origin: &Url, error: &AuthError) -> String {
        let path = if error.shows_on_sign_in_page() {
            &self.settings.pages.sign_in
        } else {
            &self.settings.pages.error
        };
        redirect::page_url(origin, path, &[("error", error.code())])
    }
}
