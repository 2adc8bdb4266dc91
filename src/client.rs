use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::AuthSession;
use crate::codec::{encode_half_degree_to_hex_byte, half_degree_in_range};
use crate::diff::unit_events;
use crate::error::excerpt;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    apply_status, build_mode_patch, discovery_request, parse_discovery, parse_status,
    status_request, write_request, MultiRequest, API_BASE_URL, API_CREDENTIAL_DISCOVERY_URLS,
    DEFAULT_FAN_CODE, MULTIREQ_PATH, RSC_ACCEPTED, RSC_OK,
};
use crate::transport::{RawResponse, Transport};
use crate::types::*;
use crate::{Error, Result};

/// Token-type fallback rounds in a multireq, with a fresh login between them.
const MULTIREQ_ATTEMPTS: usize = 2;

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&Unit) + Send + Sync>;

pub struct DaikinClientBuilder {
    username: String,
    password: String,
    credentials: Option<(String, String)>,
    client_uuid: Option<String>,
    auth_mode: AuthMode,
    base_url: String,
    discovery_urls: Vec<String>,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl DaikinClientBuilder {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            credentials: None,
            client_uuid: None,
            auth_mode: AuthMode::default(),
            base_url: API_BASE_URL.to_string(),
            discovery_urls: API_CREDENTIAL_DISCOVERY_URLS
                .iter()
                .map(|u| u.to_string())
                .collect(),
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
        }
    }

    /// App client id/secret from an earlier session; skips discovery.
    pub fn client_credentials(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some((id.into(), secret.into()));
        self
    }

    /// Per-installation device UUID. Generated when not set.
    pub fn client_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.client_uuid = Some(uuid.into());
        self
    }

    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = mode;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn discovery_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.discovery_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&Unit) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<DaikinClient> {
        let http = reqwest::Client::builder().build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        let client_uuid = self
            .client_uuid
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string().to_uppercase());

        Ok(DaikinClient {
            transport: Transport::new(http, &self.base_url),
            auth: AuthSession::new(
                self.username,
                self.password,
                client_uuid,
                self.credentials,
                self.auth_mode,
                self.discovery_urls,
            ),
            units: BTreeMap::new(),
            event_callbacks: self.event_callbacks,
            snapshot_callbacks: self.snapshot_callbacks,
            logger,
        })
    }
}

/// Client for one account. Calls take `&mut self`; a host that shares the
/// client between tasks wraps it in a mutex.
pub struct DaikinClient {
    transport: Transport,
    auth: AuthSession,
    units: BTreeMap<String, Unit>,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    logger: Option<MessageLogger>,
}

impl DaikinClient {
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> DaikinClientBuilder {
        DaikinClientBuilder::new(username, password)
    }

    pub fn units(&self) -> &BTreeMap<String, Unit> {
        &self.units
    }

    pub fn unit(&self, edge_id: &str) -> Option<&Unit> {
        self.units.get(edge_id)
    }

    pub fn client_id(&self) -> Option<&str> {
        self.auth.client_id()
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.auth.client_secret()
    }

    pub fn client_uuid(&self) -> &str {
        self.auth.client_uuid()
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth.auth_mode()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.auth.refresh_token()
    }

    pub async fn resolve_client_credentials(&mut self) -> Result<(String, String)> {
        self.auth.resolve_client_credentials(&self.transport).await
    }

    pub async fn login(&mut self) -> Result<()> {
        self.auth.login(&self.transport).await
    }

    /// Send one batch, trying each token type and re-logging in once if
    /// neither is accepted.
    pub async fn multireq(&mut self, method: Method, payload: &MultiRequest) -> Result<Value> {
        self.auth.ensure_logged_in(&self.transport).await?;

        if let Some(ref mut logger) = self.logger {
            logger.log_request(method.as_str(), MULTIREQ_PATH, serde_json::to_value(payload).ok().as_ref());
        }

        let mut last_status = 0;
        let mut last_text = String::new();
        for attempt in 0..MULTIREQ_ATTEMPTS {
            if attempt > 0 {
                debug!(last_status, "multireq rejected for every token, logging in again");
                self.auth.login(&self.transport).await?;
            }
            for (mode, token) in self.auth.token_candidates() {
                let resp = self
                    .transport
                    .send(method.clone(), MULTIREQ_PATH, payload, Some(&token))
                    .await?;
                if let Some(ref mut logger) = self.logger {
                    logger.log_response(&payload.targets(), resp.status, resp.body.as_ref());
                }
                match resp.body {
                    Some(body @ Value::Object(_)) if resp.status == 200 => {
                        self.auth.set_auth_mode(mode);
                        debug!(%mode, "multireq authorized");
                        return Ok(body);
                    }
                    _ => {
                        last_status = resp.status;
                        last_text = resp.text;
                    }
                }
            }
        }

        Err(Error::Protocol(format!(
            "multireq failed after token fallback: HTTP {last_status} body={}",
            excerpt(&last_text)
        )))
    }

    /// Discover the units behind the account. Does not touch the cache.
    pub async fn fetch_units(&mut self) -> Result<BTreeMap<String, Unit>> {
        let data = self.multireq(Method::POST, &discovery_request()).await?;
        let units = parse_discovery(&data);
        debug!(count = units.len(), "discovered units");
        Ok(units)
    }

    pub async fn fetch_status<S: AsRef<str>>(
        &mut self,
        edge_ids: &[S],
    ) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        let data = self.multireq(Method::POST, &status_request(edge_ids)).await?;
        Ok(parse_status(&data))
    }

    /// Rediscover units, fetch their status and replace the cache.
    ///
    /// The cache is only swapped once everything succeeded, so a failed
    /// refresh leaves the previous snapshot intact.
    pub async fn refresh(&mut self) -> Result<&BTreeMap<String, Unit>> {
        let mut units = self.fetch_units().await?;
        if units.is_empty() {
            self.units.clear();
            return Ok(&self.units);
        }

        let edge_ids: Vec<String> = units.keys().cloned().collect();
        let mut status = self.fetch_status(&edge_ids).await?;
        for (edge_id, unit) in units.iter_mut() {
            apply_status(unit, status.remove(edge_id).unwrap_or_default());
        }

        let events: Vec<Event> = units
            .values()
            .flat_map(|unit| unit_events(self.units.get(&unit.edge_id), unit))
            .collect();
        self.units = units;

        for event in &events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
        for unit in self.units.values() {
            for cb in &self.snapshot_callbacks {
                cb(unit);
            }
        }
        if !events.is_empty() {
            debug!(count = events.len(), "unit changes since last refresh");
        }

        Ok(&self.units)
    }

    async fn send_write(&self, body: &MultiRequest) -> Result<RawResponse> {
        let token = self.auth.bearer()?;
        self.transport
            .send(Method::PUT, MULTIREQ_PATH, body, Some(&token))
            .await
    }

    /// Write power, mode and mode parameters for one unit.
    ///
    /// The mode defaults to the unit's current mode (cool if unknown). A 401
    /// triggers one fresh login and a single retry.
    pub async fn write_state(
        &mut self,
        edge_id: &str,
        power_on: bool,
        mode_code: Option<&str>,
        overrides: &BTreeMap<String, String>,
    ) -> Result<()> {
        let current = self
            .units
            .get(edge_id)
            .ok_or_else(|| Error::UnknownEdge(edge_id.to_string()))?;

        let target_mode = mode_code
            .filter(|m| !m.is_empty())
            .or(current.mode_code.as_deref().filter(|m| !m.is_empty()))
            .unwrap_or(MODE_CODE_COOL)
            .to_string();
        let fan_code = current
            .raw("e_3003.p_2D")
            .unwrap_or(DEFAULT_FAN_CODE)
            .to_string();

        let patch = build_mode_patch(current, &target_mode, overrides);
        let body = write_request(edge_id, patch, &fan_code, power_on);

        if let Some(ref mut logger) = self.logger
            && let Ok(value) = serde_json::to_value(&body)
        {
            logger.log_command("write_state", edge_id, &value);
        }

        self.auth.ensure_logged_in(&self.transport).await?;
        let mut resp = self.send_write(&body).await?;
        if resp.status == 401 {
            debug!(edge_id = %edge_id, "write unauthorized, logging in again");
            self.auth.login(&self.transport).await?;
            resp = self.send_write(&body).await?;
        }

        if let Some(ref mut logger) = self.logger {
            logger.log_response(&body.targets(), resp.status, resp.body.as_ref());
        }

        let data = match resp.body {
            Some(ref data @ Value::Object(_)) if resp.status == 200 => data,
            _ => {
                return Err(Error::Protocol(format!(
                    "write failed: HTTP {} body={}",
                    resp.status,
                    excerpt(&resp.text)
                )));
            }
        };

        let rsc = data
            .get("responses")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|first| first.get("rsc"));
        match rsc {
            None | Some(Value::Null) => {}
            Some(code) => match code.as_i64() {
                Some(RSC_OK | RSC_ACCEPTED) => {}
                Some(other) => {
                    warn!(edge_id = %edge_id, rsc = other, "write rejected");
                    return Err(Error::WriteRejected(other));
                }
                None => {
                    return Err(Error::Protocol(format!("write rejected with rsc={code}")));
                }
            },
        }
        Ok(())
    }

    fn require_unit(&self, edge_id: &str) -> Result<&Unit> {
        self.units
            .get(edge_id)
            .ok_or_else(|| Error::UnknownEdge(edge_id.to_string()))
    }

    pub async fn turn_on(&mut self, edge_id: &str) -> Result<()> {
        self.write_state(edge_id, true, None, &BTreeMap::new()).await
    }

    pub async fn turn_off(&mut self, edge_id: &str) -> Result<()> {
        self.write_state(edge_id, false, None, &BTreeMap::new()).await
    }

    /// `None` switches the unit off; any mode also powers it on.
    pub async fn set_hvac_mode(&mut self, edge_id: &str, mode: Option<HvacMode>) -> Result<()> {
        match mode {
            None => self.turn_off(edge_id).await,
            Some(mode) => {
                self.write_state(edge_id, true, Some(mode.as_code()), &BTreeMap::new())
                    .await
            }
        }
    }

    /// Writes the speed under the current mode's key, or under every fan
    /// speed key when the mode is unknown.
    pub async fn set_fan_speed(&mut self, edge_id: &str, speed: FanSpeed) -> Result<()> {
        let unit = self.require_unit(edge_id)?;
        let keys: Vec<&str> = match fan_speed_param_key_for_mode(unit.mode_code.as_deref()) {
            Some(key) => vec![key],
            None => ALL_FAN_SPEED_PARAM_KEYS.to_vec(),
        };
        let overrides: BTreeMap<String, String> = keys
            .into_iter()
            .map(|k| (k.to_string(), speed.as_code().to_string()))
            .collect();
        self.write_state(edge_id, true, None, &overrides).await
    }

    pub async fn set_target_temperature(&mut self, edge_id: &str, temp_c: f64) -> Result<()> {
        if !half_degree_in_range(temp_c) {
            return Err(Error::InvalidTemperature(temp_c));
        }
        self.require_unit(edge_id)?;
        let overrides = BTreeMap::from([("p_02".to_string(), encode_half_degree_to_hex_byte(temp_c))]);
        self.write_state(edge_id, true, None, &overrides).await
    }

    pub async fn set_swing_mode(&mut self, edge_id: &str, swing: SwingMode) -> Result<()> {
        self.require_unit(edge_id)?;
        let (p05, p06) = swing.param_codes();
        let overrides = BTreeMap::from([
            ("p_05".to_string(), p05.to_string()),
            ("p_06".to_string(), p06.to_string()),
        ]);
        self.write_state(edge_id, true, None, &overrides).await
    }
}
