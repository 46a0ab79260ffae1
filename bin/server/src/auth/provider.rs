//! Configured identity providers.

use serde::Serialize;

use super::google::{self, GoogleProvider};

/// Provider ID of the email and password sign-in.
pub const CREDENTIALS_ID: &str = "credentials";

/// A sign-in method offered to users.
pub enum Provider {
    /// Federated sign-in through an OpenID Connect provider.
    OAuth(GoogleProvider),
    /// Email and password checked against the stored hash.
    Credentials,
}

impl Provider {
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::OAuth(_) => google::PROVIDER_ID,
            Self::Credentials => CREDENTIALS_ID,
        }
    }

    /// Display name for sign-in pages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OAuth(_) => "Google",
            Self::Credentials => "Email",
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OAuth(_) => "oidc",
            Self::Credentials => "credentials",
        }
    }

    /// Describes the provider relative to the auth routes at `auth_base`.
    #[must_use]
    pub fn describe(&self, auth_base: &str) -> ProviderDescriptor {
        ProviderDescriptor {
            id: self.id(),
            name: self.name(),
            kind: self.kind(),
            signin_url: format!("{auth_base}/signin/{}", self.id()),
            callback_url: format!("{auth_base}/callback/{}", self.id()),
        }
    }
}

/// Entry in the `/providers` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub signin_url: String,
    pub callback_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_descriptor() {
        let descriptor = Provider::Credentials.describe("http://localhost:3000/api/auth");

        assert_eq!(descriptor.id, "credentials");
        assert_eq!(descriptor.name, "Email");
        assert_eq!(
            descriptor.callback_url,
            "http://localhost:3000/api/auth/callback/credentials"
        );

        let json = serde_json::to_value(&descriptor).expect("serialize");
        assert_eq!(json["type"], "credentials");
        assert_eq!(
            json["signinUrl"],
            "http://localhost:3000/api/auth/signin/credentials"
        );
    }
}
