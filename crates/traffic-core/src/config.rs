use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::generators::SimulatedErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficMode {
    Light,
    Moderate,
    Heavy,
    Stress,
    Spike,
}

impl TrafficMode {
    pub const ALL: [TrafficMode; 5] = [
        Self::Light,
        Self::Moderate,
        Self::Heavy,
        Self::Stress,
        Self::Spike,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Self::Light),
            "moderate" => Some(Self::Moderate),
            "heavy" => Some(Self::Heavy),
            "stress" => Some(Self::Stress),
            "spike" => Some(Self::Spike),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Heavy => "heavy",
            Self::Stress => "stress",
            Self::Spike => "spike",
        }
    }

    pub fn requests_per_minute(self) -> u32 {
        match self {
            Self::Light => 10,
            Self::Moderate => 30,
            Self::Heavy => 60,
            Self::Stress => 100,
            Self::Spike => 120,
        }
    }

    /// Spacing between two ticks, `60_000 / requests_per_minute` milliseconds.
    pub fn tick_interval(self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.requests_per_minute()))
    }
}

impl fmt::Display for TrafficMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a free-form mode string is turned into a [`TrafficMode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeParsePolicy {
    /// Unknown names are a configuration error.
    #[default]
    Strict,
    /// Unknown names run at the moderate rate.
    FallbackToModerate,
}

impl ModeParsePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "strict" => Some(Self::Strict),
            "fallback-moderate" => Some(Self::FallbackToModerate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::FallbackToModerate => "fallback-moderate",
        }
    }

    pub fn resolve(self, value: &str) -> Result<TrafficMode, SimulationConfigError> {
        match (TrafficMode::parse(value.trim()), self) {
            (Some(mode), _) => Ok(mode),
            (None, Self::FallbackToModerate) => Ok(TrafficMode::Moderate),
            (None, Self::Strict) => Err(SimulationConfigError::UnknownMode(value.to_owned())),
        }
    }
}

/// Longest run accepted: one week.
pub const MAX_DURATION_SECONDS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationConfigError {
    NonPositiveDuration,
    DurationTooLong(u64),
    UnknownMode(String),
}

impl fmt::Display for SimulationConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveDuration => {
                write!(f, "duration_seconds must be a positive number of seconds")
            }
            Self::DurationTooLong(seconds) => write!(
                f,
                "duration_seconds {seconds} exceeds the maximum of {MAX_DURATION_SECONDS}"
            ),
            Self::UnknownMode(mode) => write!(
                f,
                "unknown traffic mode {mode:?}; expected one of: light, moderate, heavy, stress, spike"
            ),
        }
    }
}

impl std::error::Error for SimulationConfigError {}

/// Parameters of one simulation run. Validated on construction and never
/// mutated by the controller once a run has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationConfig {
    mode: TrafficMode,
    duration_seconds: u64,
    include_server_error: bool,
    include_not_found_error: bool,
    include_timeout_error: bool,
}

impl SimulationConfig {
    /// Builds a config with every error kind disabled. The duration must lie
    /// in `1..=MAX_DURATION_SECONDS`.
    pub fn new(mode: TrafficMode, duration_seconds: u64) -> Result<Self, SimulationConfigError> {
        if duration_seconds == 0 {
            return Err(SimulationConfigError::NonPositiveDuration);
        }
        if duration_seconds > MAX_DURATION_SECONDS {
            return Err(SimulationConfigError::DurationTooLong(duration_seconds));
        }

        Ok(Self {
            mode,
            duration_seconds,
            include_server_error: false,
            include_not_found_error: false,
            include_timeout_error: false,
        })
    }

    pub fn with_server_error(mut self, enabled: bool) -> Self {
        self.include_server_error = enabled;
        self
    }

    pub fn with_not_found_error(mut self, enabled: bool) -> Self {
        self.include_not_found_error = enabled;
        self
    }

    pub fn with_timeout_error(mut self, enabled: bool) -> Self {
        self.include_timeout_error = enabled;
        self
    }

    pub fn mode(&self) -> TrafficMode {
        self.mode
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    pub fn tick_interval(&self) -> Duration {
        self.mode.tick_interval()
    }

    pub fn include_server_error(&self) -> bool {
        self.include_server_error
    }

    pub fn include_not_found_error(&self) -> bool {
        self.include_not_found_error
    }

    pub fn include_timeout_error(&self) -> bool {
        self.include_timeout_error
    }

    /// Enabled error kinds in a fixed order: server error, not found, timeout.
    pub fn enabled_error_kinds(&self) -> Vec<SimulatedErrorKind> {
        let mut kinds = Vec::with_capacity(3);
        if self.include_server_error {
            kinds.push(SimulatedErrorKind::ServerError);
        }
        if self.include_not_found_error {
            kinds.push(SimulatedErrorKind::NotFound);
        }
        if self.include_timeout_error {
            kinds.push(SimulatedErrorKind::Timeout);
        }
        kinds
    }
}
