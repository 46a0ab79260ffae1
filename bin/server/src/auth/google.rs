//! Google sign-in over OpenID Connect.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use coursegate_core::Result;
use coursegate_identity::{Account, AccountKind, AuthenticationError, SessionAdapter, User};
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, OAuth2TokenResponse,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Provider ID used in routes and account links.
pub const PROVIDER_ID: &str = "google";

const ISSUER: &str = "https://accounts.google.com";
const SCOPES: [&str; 2] = ["email", "profile"];

fn provider_error(reason: String) -> AuthenticationError {
    AuthenticationError::ProviderError {
        provider: PROVIDER_ID.to_string(),
        reason,
    }
}

/// State carried in a cookie from the authorization redirect to the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub csrf_token: String,
    pub pkce_verifier: String,
    pub nonce: String,
    /// Where to send the user once signed in.
    pub callback_url: String,
}

impl OAuthState {
    /// Encodes the state as a cookie-safe string.
    pub fn to_cookie_value(&self) -> Result<String, AuthenticationError> {
        let json = serde_json::to_vec(self).map_err(|e| provider_error(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes a cookie value produced by [`OAuthState::to_cookie_value`].
    pub fn from_cookie_value(value: &str) -> Result<Self, AuthenticationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| provider_error(format!("malformed state cookie: {e}")))?;
        let state = serde_json::from_slice(&bytes)
            .map_err(|e| provider_error(format!("malformed state cookie: {e}")))?;
        Ok(state)
    }
}

/// Verified profile returned by Google.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Provider tokens from the code exchange, stored on the account link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}

/// Google OpenID Connect client.
pub struct GoogleProvider {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    http_client: reqwest::Client,
}

impl GoogleProvider {
    /// Discovers Google's provider metadata.
    ///
    /// `redirect_uri` is the absolute URL of the `/callback/google` route.
    #[instrument(skip(client_secret))]
    pub async fn discover(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<Self, AuthenticationError> {
        let issuer_url = IssuerUrl::new(ISSUER.to_string())
            .map_err(|e| provider_error(format!("invalid issuer URL: {e}")))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| provider_error(format!("failed to create HTTP client: {e}")))?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| provider_error(format!("discovery failed: {e}")))?;

        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| provider_error(format!("invalid redirect URI: {e}")))?;

        info!("discovered Google OpenID configuration");
        Ok(Self {
            provider_metadata,
            client_id: ClientId::new(client_id.to_string()),
            client_secret: ClientSecret::new(client_secret.to_string()),
            redirect_url,
            http_client,
        })
    }

    /// Builds the authorization redirect and the state to verify on callback.
    #[must_use]
    pub fn authorization_url(&self, callback_url: String) -> (String, OAuthState) {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);
        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let (auth_url, csrf_token, nonce) = request.url();

        let state = OAuthState {
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
            nonce: nonce.secret().clone(),
            callback_url,
        };

        (auth_url.to_string(), state)
    }

    /// Exchanges the authorization code and verifies the ID token.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &OAuthState,
    ) -> Result<(GoogleProfile, ProviderTokens), AuthenticationError> {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| provider_error(format!("token endpoint error: {e}")))?
            .set_pkce_verifier(PkceCodeVerifier::new(state.pkce_verifier.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| provider_error(format!("token exchange failed: {e}")))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| provider_error("no ID token in response".to_string()))?;

        // The raw ID token is kept on the account link.
        let raw_id_token = id_token.to_string();
        let nonce = Nonce::new(state.nonce.clone());
        let claims = id_token
            .claims(&client.id_token_verifier(), &nonce)
            .map_err(|e| provider_error(format!("ID token validation failed: {e}")))?;

        let profile = GoogleProfile {
            sub: claims.subject().to_string(),
            email: claims.email().map(|e| e.as_str().to_string()),
            email_verified: claims.email_verified().unwrap_or(false),
            name: claims
                .name()
                .and_then(|n| n.get(None))
                .map(|n| n.as_str().to_string()),
            picture: claims
                .picture()
                .and_then(|p| p.get(None))
                .map(|p| p.as_str().to_string()),
        };


        let tokens = ProviderTokens {
            access_token: Some(token_response.access_token().secret().clone()),
            refresh_token: token_response.refresh_token().map(|t| t.secret().clone()),
            expires_at: token_response.expires_in().map(|d| {
                Utc::now().timestamp() + i64::try_from(d.as_secs()).unwrap_or(i64::MAX / 2)
            }),
            token_type: Some(token_response.token_type().as_ref().to_lowercase()),
            scope: token_response.scopes().map(|scopes| {
                scopes
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
            id_token: Some(raw_id_token),
        };

        debug!(sub = %profile.sub, "Google ID token verified");
        Ok((profile, tokens))
    }
}

/// Maps a Google profile to a local user.
///
/// An existing account link wins. Otherwise an existing user with the same
/// email is refused, since linking would hand that user's account to whoever
/// controls the Google identity. A new user is created and linked last.
#[instrument(skip_all, fields(sub = %profile.sub))]
pub async fn resolve_user(
    adapter: &dyn SessionAdapter,
    profile: &GoogleProfile,
    tokens: ProviderTokens,
) -> Result<User, AuthenticationError> {
    if let Some(user) = adapter.get_user_by_account(PROVIDER_ID, &profile.sub).await? {
        adapter
            .link_account(&account_for(&user, profile, tokens))
            .await?;
        debug!(user_id = %user.id(), "signed in through existing Google link");
        return Ok(user);
    }

    let email = profile
        .email
        .clone()
        .ok_or_else(|| AuthenticationError::MissingClaim {
            claim: "email".to_string(),
        })?;

    if adapter.get_user_by_email(&email).await?.is_some() {
        return Err(AuthenticationError::AccountNotLinked {
            provider: PROVIDER_ID.to_string(),
        }
        .into());
    }

    let mut user = User::new(email);
    user.set_name(profile.name.clone());
    user.set_image(profile.picture.clone());
    if profile.email_verified {
        user.set_email_verified(Some(Utc::now()));
    }
    adapter.create_user(&user).await?;
    adapter
        .link_account(&account_for(&user, profile, tokens))
        .await?;

    info!(user_id = %user.id(), "created user from Google sign-in");
    Ok(user)
}

fn account_for(user: &User, profile: &GoogleProfile, tokens: ProviderTokens) -> Account {
    let mut account = Account::new(
        user.id().clone(),
        AccountKind::Oidc,
        PROVIDER_ID.to_string(),
        profile.sub.clone(),
    );
    account.access_token = tokens.access_token;
    account.refresh_token = tokens.refresh_token;
    account.expires_at = tokens.expires_at;
    account.token_type = tokens.token_type;
    account.scope = tokens.scope;
    account.id_token = tokens.id_token;
    account
}
