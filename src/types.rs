use std::collections::BTreeMap;
use std::fmt;

use crate::codec::normalize_hex_code;

pub const MODE_CODE_COOL: &str = "0200";
pub const MODE_CODE_DRY: &str = "0500";
pub const MODE_CODE_FAN: &str = "0000";

pub const POWER_OFF: &str = "00";
pub const POWER_ON: &str = "01";

/// e_3001 keys that carry fan speed, one per mode.
pub const ALL_FAN_SPEED_PARAM_KEYS: [&str; 3] = ["p_09", "p_27", "p_28"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    IdToken,
    AccessToken,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::IdToken => "id_token",
            AuthMode::AccessToken => "access_token",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "id_token" => Some(AuthMode::IdToken),
            "access_token" => Some(AuthMode::AccessToken),
            _ => None,
        }
    }

    pub fn other(&self) -> Self {
        match self {
            AuthMode::IdToken => AuthMode::AccessToken,
            AuthMode::AccessToken => AuthMode::IdToken,
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Cool,
    Dry,
    FanOnly,
}

impl HvacMode {
    pub fn as_code(&self) -> &'static str {
        match self {
            HvacMode::Cool => MODE_CODE_COOL,
            HvacMode::Dry => MODE_CODE_DRY,
            HvacMode::FanOnly => MODE_CODE_FAN,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            MODE_CODE_COOL => Some(HvacMode::Cool),
            MODE_CODE_DRY => Some(HvacMode::Dry),
            MODE_CODE_FAN => Some(HvacMode::FanOnly),
            _ => None,
        }
    }

    pub fn fan_speed_param_key(&self) -> &'static str {
        match self {
            HvacMode::Cool => "p_09",
            HvacMode::Dry => "p_27",
            HvacMode::FanOnly => "p_28",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    Auto,
    Quiet,
    Level1,
    Level2,
    Level3,
    Level4,
    Level5,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 7] = [
        FanSpeed::Auto,
        FanSpeed::Quiet,
        FanSpeed::Level1,
        FanSpeed::Level2,
        FanSpeed::Level3,
        FanSpeed::Level4,
        FanSpeed::Level5,
    ];

    pub fn as_code(&self) -> &'static str {
        match self {
            FanSpeed::Auto => "0A00",
            FanSpeed::Quiet => "0B00",
            FanSpeed::Level1 => "0300",
            FanSpeed::Level2 => "0400",
            FanSpeed::Level3 => "0500",
            FanSpeed::Level4 => "0600",
            FanSpeed::Level5 => "0700",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_code() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FanSpeed::Auto => "Auto",
            FanSpeed::Quiet => "Indoor Unit Quiet",
            FanSpeed::Level1 => "Level 1",
            FanSpeed::Level2 => "Level 2",
            FanSpeed::Level3 => "Level 3",
            FanSpeed::Level4 => "Level 4",
            FanSpeed::Level5 => "Level 5",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label() == s)
    }
}

const SWING_ON: &str = "0F0000";
const SWING_OFF: &str = "000000";

/// Louvre position, carried by e_3001 `p_05` (left/right) and `p_06` (up/down).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingMode {
    Both,
    Horizontal,
    Vertical,
    Off,
}

impl SwingMode {
    pub fn param_codes(&self) -> (&'static str, &'static str) {
        match self {
            SwingMode::Both => (SWING_ON, SWING_ON),
            SwingMode::Horizontal => (SWING_OFF, SWING_ON),
            SwingMode::Vertical => (SWING_ON, SWING_OFF),
            SwingMode::Off => (SWING_OFF, SWING_OFF),
        }
    }

    pub fn from_param_codes(p05: &str, p06: &str) -> Option<Self> {
        let p05: String = p05.chars().take(6).collect();
        let p06: String = p06.chars().take(6).collect();
        [
            SwingMode::Both,
            SwingMode::Horizontal,
            SwingMode::Vertical,
            SwingMode::Off,
        ]
        .into_iter()
        .find(|m| m.param_codes() == (p05.as_str(), p06.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacAction {
    Off,
    Cooling,
    Drying,
    Fan,
}

/// One physical unit ("edge") behind the account.
///
/// Every typed field is decoded from `raw_status`, which maps dotted
/// `group.param` keys to the hex values of the last status fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    pub edge_id: String,
    pub name: String,
    pub mac: String,
    pub power_code: Option<String>,
    pub mode_code: Option<String>,
    pub fan_code: Option<String>,
    pub target_temp_c: Option<f64>,
    pub room_temp_c: Option<f64>,
    pub room_humidity_percent: Option<u64>,
    pub sensor_temp_1_c: Option<f64>,
    pub sensor_temp_2_c: Option<f64>,
    pub raw_status: BTreeMap<String, String>,
}

impl Unit {
    pub fn new(edge_id: impl Into<String>, name: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            edge_id: edge_id.into(),
            name: name.into(),
            mac: mac.into(),
            ..Default::default()
        }
    }

    pub fn is_on(&self) -> bool {
        self.power_code.as_deref() == Some(POWER_ON)
    }

    pub fn hvac_mode(&self) -> Option<HvacMode> {
        self.mode_code.as_deref().and_then(HvacMode::from_code)
    }

    pub fn hvac_action(&self) -> HvacAction {
        if !self.is_on() {
            return HvacAction::Off;
        }
        match self.hvac_mode() {
            Some(HvacMode::Dry) => HvacAction::Drying,
            Some(HvacMode::FanOnly) => HvacAction::Fan,
            _ => HvacAction::Cooling,
        }
    }

    pub fn fan_speed(&self) -> Option<FanSpeed> {
        extract_fan_speed_code(&self.raw_status, self.mode_code.as_deref())
            .and_then(|c| FanSpeed::from_code(&c))
    }

    pub fn swing_mode(&self) -> Option<SwingMode> {
        let p05 = self.raw_status.get("e_3001.p_05").map_or("", String::as_str);
        let p06 = self.raw_status.get("e_3001.p_06").map_or("", String::as_str);
        SwingMode::from_param_codes(p05, p06)
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.raw_status.get(key).map(String::as_str)
    }
}

pub fn fan_speed_param_key_for_mode(mode_code: Option<&str>) -> Option<&'static str> {
    mode_code
        .and_then(HvacMode::from_code)
        .map(|m| m.fan_speed_param_key())
}

/// Fan speed code for the unit's mode, falling back to the other modes' keys.
/// Only codes that name a known speed are returned.
pub fn extract_fan_speed_code(
    raw_status: &BTreeMap<String, String>,
    mode_code: Option<&str>,
) -> Option<String> {
    let preferred = fan_speed_param_key_for_mode(mode_code);
    let keys = preferred
        .into_iter()
        .chain(ALL_FAN_SPEED_PARAM_KEYS.into_iter().filter(|k| Some(*k) != preferred));
    for key in keys {
        let Some(value) = raw_status.get(&format!("e_3001.{key}")) else {
            continue;
        };
        if let Some(code) = normalize_hex_code(value, 4)
            && FanSpeed::from_code(&code).is_some()
        {
            return Some(code);
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UnitDiscovered { edge_id: String, name: String },
    PowerChanged { edge_id: String, on: bool },
    ModeChanged { edge_id: String, mode_code: String, mode: Option<HvacMode> },
    TargetTemperatureChanged { edge_id: String, temp_c: f64 },
    RoomTemperatureChanged { edge_id: String, temp_c: f64 },
    HumidityChanged { edge_id: String, percent: u64 },
    FanSpeedChanged { edge_id: String, speed: FanSpeed },
    ParameterChanged { edge_id: String, key: String, old: Option<String>, new: Option<String> },
}
