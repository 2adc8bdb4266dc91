use std::sync::LazyLock;

use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::excerpt;
use crate::protocol::{LOGIN_PATH, RSC_OK};
use crate::transport::Transport;
use crate::types::AuthMode;
use crate::{Error, Result};

/// Nesting beyond this is not searched for credentials.
const MAX_SEARCH_DEPTH: usize = 32;

const ID_KEYS: [&str; 2] = ["client_id", "clientid"];
const SECRET_KEYS: [&str; 2] = ["client_secret", "clientsecret"];

pub(crate) struct AuthSession {
    username: String,
    password: String,
    client_uuid: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_mode: AuthMode,
    access_token: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    discovery_urls: Vec<String>,
}

impl AuthSession {
    pub fn new(
        username: String,
        password: String,
        client_uuid: String,
        credentials: Option<(String, String)>,
        auth_mode: AuthMode,
        discovery_urls: Vec<String>,
    ) -> Self {
        let (client_id, client_secret) = match credentials {
            Some((id, secret)) if !id.is_empty() && !secret.is_empty() => (Some(id), Some(secret)),
            _ => (None, None),
        };
        Self {
            username,
            password,
            client_uuid,
            client_id,
            client_secret,
            auth_mode,
            access_token: None,
            id_token: None,
            refresh_token: None,
            discovery_urls,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    pub fn client_uuid(&self) -> &str {
        &self.client_uuid
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn set_auth_mode(&mut self, mode: AuthMode) {
        self.auth_mode = mode;
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some() || self.id_token.is_some()
    }

    fn token(&self, mode: AuthMode) -> Option<&String> {
        match mode {
            AuthMode::IdToken => self.id_token.as_ref(),
            AuthMode::AccessToken => self.access_token.as_ref(),
        }
    }

    pub fn token_candidates(&self) -> Vec<(AuthMode, String)> {
        [self.auth_mode, self.auth_mode.other()]
            .into_iter()
            .filter_map(|mode| self.token(mode).map(|t| (mode, t.clone())))
            .collect()
    }

    pub fn bearer(&self) -> Result<String> {
        self.token_candidates()
            .into_iter()
            .next()
            .map(|(_, token)| token)
            .ok_or_else(|| Error::Authentication("no auth token available".to_string()))
    }

    fn discovery_payloads(&self) -> [Value; 4] {
        [
            json!({"user_id": self.username, "password": self.password, "uuid": self.client_uuid}),
            json!({"username": self.username, "password": self.password, "uuid": self.client_uuid}),
            json!({"user_id": self.username, "password": self.password}),
            json!({"username": self.username, "password": self.password}),
        ]
    }

    /// Find the app's client id/secret. Once known they are never looked up again.
    pub async fn resolve_client_credentials(
        &mut self,
        transport: &Transport,
    ) -> Result<(String, String)> {
        if let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) {
            return Ok((id.clone(), secret.clone()));
        }

        let payloads = self.discovery_payloads();
        for url in &self.discovery_urls {
            for payload in &payloads {
                let resp = transport.send(Method::POST, url, payload, None).await?;

                let from_json = resp
                    .body
                    .as_ref()
                    .filter(|b| b.is_object())
                    .and_then(extract_client_credentials);
                if let Some((id, secret)) = from_json {
                    debug!(url = %url, "resolved client credentials from response body");
                    self.client_id = Some(id.clone());
                    self.client_secret = Some(secret.clone());
                    return Ok((id, secret));
                }

                // Rejections (400/401/403) often carry the hint as plain text.
                if let Some((id, secret)) = extract_client_credentials_from_text(&resp.text) {
                    debug!(url = %url, status = resp.status, "resolved client credentials from response text");
                    self.client_id = Some(id.clone());
                    self.client_secret = Some(secret.clone());
                    return Ok((id, secret));
                }
            }
        }

        Err(Error::Authentication(
            "could not resolve app client credentials from server".to_string(),
        ))
    }

    pub async fn login(&mut self, transport: &Transport) -> Result<()> {
        let (client_id, client_secret) = self.resolve_client_credentials(transport).await?;
        let body = json!({
            "client_secret": client_secret,
            "user_id": self.username,
            "uuid": self.client_uuid,
            "password": self.password,
            "client_id": client_id,
            "grant_type": "password",
        });

        let resp = transport.send(Method::POST, LOGIN_PATH, &body, None).await?;
        let data = match resp.body {
            Some(ref data @ Value::Object(_)) if resp.status == 200 => data,
            _ => {
                return Err(Error::Authentication(format!(
                    "login failed: HTTP {} body={}",
                    resp.status,
                    excerpt(&resp.text)
                )));
            }
        };

        if data.get("rsc").and_then(Value::as_i64) != Some(RSC_OK) {
            return Err(Error::Authentication(format!(
                "login rejected: rsc={} error={}",
                data.get("rsc").unwrap_or(&Value::Null),
                data.get("error").unwrap_or(&Value::Null)
            )));
        }

        let token = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };
        self.access_token = token("access_token");
        self.id_token = token("id_token");
        self.refresh_token = token("refresh_token");

        if !self.is_logged_in() {
            return Err(Error::Authentication(
                "login succeeded but no token fields were returned".to_string(),
            ));
        }
        debug!(
            access = self.access_token.is_some(),
            id = self.id_token.is_some(),
            "logged in"
        );
        Ok(())
    }

    pub async fn ensure_logged_in(&mut self, transport: &Transport) -> Result<()> {
        if !self.is_logged_in() {
            self.login(transport).await?;
        }
        Ok(())
    }
}

fn non_empty_str<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    obj.iter()
        .find(|(k, _)| keys.contains(&k.to_lowercase().as_str()))
        .and_then(|(_, v)| v.as_str())
        .filter(|s| !s.is_empty())
}

/// First object anywhere in `payload` holding both a client id and a client
/// secret as non-empty strings. Keys match case-insensitively.
pub fn extract_client_credentials(payload: &Value) -> Option<(String, String)> {
    let mut stack = vec![(payload, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        if depth > MAX_SEARCH_DEPTH {
            continue;
        }
        match node {
            Value::Object(obj) => {
                if let (Some(id), Some(secret)) =
                    (non_empty_str(obj, &ID_KEYS), non_empty_str(obj, &SECRET_KEYS))
                {
                    return Some((id.trim().to_string(), secret.trim().to_string()));
                }
                for (key, value) in obj {
                    let key = key.to_lowercase();
                    if ID_KEYS.contains(&key.as_str()) || SECRET_KEYS.contains(&key.as_str()) {
                        continue;
                    }
                    if value.is_object() || value.is_array() {
                        stack.push((value, depth + 1));
                    }
                }
            }
            Value::Array(items) => stack.extend(items.iter().map(|v| (v, depth + 1))),
            _ => {}
        }
    }
    None
}

static CLIENT_ID_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)client[_-]?id['"\\:=\s]+([A-Za-z0-9._-]{8,})"#).expect("valid client id pattern")
});
static CLIENT_SECRET_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)client[_-]?secret['"\\:=\s]+([A-Za-z0-9._-]{16,})"#)
        .expect("valid client secret pattern")
});

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Fallback for bodies that are not JSON objects: look for
/// `client_id: ...` / `client_secret: ...` style text.
pub fn extract_client_credentials_from_text(text: &str) -> Option<(String, String)> {
    if text.is_empty() {
        return None;
    }
    let id = first_capture(&CLIENT_ID_TEXT, text)?;
    let secret = first_capture(&CLIENT_SECRET_TEXT, text)?;
    Some((id, secret))
}
