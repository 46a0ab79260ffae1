//! Session extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use coursegate_identity::Session;
use std::convert::Infallible;
use std::sync::Arc;

use super::{Auth, redirect};

/// Extractor for requiring a signed-in user.
///
/// Without a valid session the request is redirected to the sign-in page,
/// with `callbackUrl` pointing back at the requested page.
pub struct RequireSession(pub Session);

impl<S> FromRequestParts<S> for RequireSession
where
    Arc<Auth>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<Auth>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        if let Some(session) = auth.read_session(&jar) {
            return Ok(RequireSession(session));
        }

        let origin = auth.origin(&parts.headers);
        let requested = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let callback_url = redirect::safe_callback_url(Some(requested), &origin);
        Err(SessionRejection::SignInRequired {
            sign_in_url: auth.sign_in_page(&origin, Some(&callback_url)),
        })
    }
}

/// Extractor for optionally getting the current session.
pub struct OptionalSession(pub Option<Session>);

impl<S> FromRequestParts<S> for OptionalSession
where
    Arc<Auth>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<Auth>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(OptionalSession(auth.read_session(&jar)))
    }
}

/// Re-issues the session token cookie on every request it wraps.
///
/// Extractors only read the session; this layer carries the refreshed token
/// (or the removal of an unusable one) back on the response.
pub async fn refresh_session(
    State(auth): State<Arc<Auth>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let (jar, _) = auth.session(jar);
    (jar, next.run(request).await).into_response()
}

/// Rejection type for session extractors.
#[derive(Debug)]
pub enum SessionRejection {
    SignInRequired { sign_in_url: String },
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        match self {
            Self::SignInRequired { sign_in_url } => Redirect::to(&sign_in_url).into_response(),
        }
    }
}
