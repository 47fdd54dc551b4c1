use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use sha1::{Digest, Sha1};

use crate::config::Credentials;
use crate::error::EnricherError;

const AUTH_KEY_HEADER: &str = "x-auth-key";
const AUTH_DATE_HEADER: &str = "x-auth-date";

/// Per-request authentication values for the directory API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub auth_key: String,
    pub auth_date: String,
    pub authorization: String,
}

impl AuthHeaders {
    pub fn sign(credentials: &Credentials, unix_seconds: i64) -> Self {
        let auth_date = unix_seconds.to_string();
        let authorization = auth_hash(&credentials.api_key, &credentials.api_secret, &auth_date);
        Self {
            auth_key: credentials.api_key.clone(),
            auth_date,
            authorization,
        }
    }

    pub fn now(credentials: &Credentials) -> Self {
        Self::sign(credentials, chrono::Utc::now().timestamp())
    }

    pub fn to_header_map(&self, user_agent: &str) -> Result<HeaderMap, EnricherError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(user_agent)?);
        headers.insert(
            HeaderName::from_static(AUTH_KEY_HEADER),
            header_value(&self.auth_key)?,
        );
        headers.insert(
            HeaderName::from_static(AUTH_DATE_HEADER),
            header_value(&self.auth_date)?,
        );
        headers.insert(AUTHORIZATION, header_value(&self.authorization)?);
        Ok(headers)
    }
}

/// Lowercase hex SHA-1 of `key + secret + auth_date`.
pub fn auth_hash(api_key: &str, api_secret: &str, auth_date: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(api_key.as_bytes());
    hasher.update(api_secret.as_bytes());
    hasher.update(auth_date.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn header_value(value: &str) -> Result<HeaderValue, EnricherError> {
    HeaderValue::from_str(value).map_err(|err| EnricherError::DirectoryHttp(err.to_string()))
}
