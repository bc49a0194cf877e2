use std::{
    env, fmt,
    net::{AddrParseError, SocketAddr},
    time::Duration,
};

use traffic_core::ModeParsePolicy;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8090";
const DEFAULT_TARGET_URL: &str = "http://localhost:5001";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MODE_POLICY: ModeParsePolicy = ModeParsePolicy::Strict;
const DEFAULT_ACTIVITY_LOG_PATH: &str = "artifacts/activity.csv";

const ENV_ADDR: &str = "TRAFFIC_LAB_ADDR";
const ENV_TARGET_URL: &str = "TRAFFIC_LAB_TARGET_URL";
const ENV_REQUEST_TIMEOUT_MS: &str = "TRAFFIC_LAB_REQUEST_TIMEOUT_MS";
const ENV_SEED: &str = "TRAFFIC_LAB_SEED";
const ENV_MODE_POLICY: &str = "TRAFFIC_LAB_MODE_POLICY";
const ENV_ACTIVITY_LOG: &str = "TRAFFIC_LAB_ACTIVITY_LOG";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Storefront base URL without a trailing slash.
    pub target_url: String,
    pub request_timeout: Duration,
    /// `None` seeds the random source from entropy.
    pub seed: Option<u64>,
    pub mode_policy: ModeParsePolicy,
    pub activity_log_path: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidListenAddr(AddrParseError),
    InvalidTargetUrl,
    InvalidRequestTimeout,
    InvalidSeed,
    InvalidModePolicy,
    InvalidActivityLogPath,
    NonUnicode(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidListenAddr(err) => {
                write!(f, "{ENV_ADDR} is not a valid socket address: {err}")
            }
            Self::InvalidTargetUrl => {
                write!(f, "{ENV_TARGET_URL} must start with http:// or https://")
            }
            Self::InvalidRequestTimeout => {
                write!(
                    f,
                    "{ENV_REQUEST_TIMEOUT_MS} must be a positive number of milliseconds"
                )
            }
            Self::InvalidSeed => {
                write!(f, "{ENV_SEED} must be an unsigned 64-bit integer")
            }
            Self::InvalidModePolicy => {
                write!(
                    f,
                    "{ENV_MODE_POLICY} must be one of: strict, fallback-moderate"
                )
            }
            Self::InvalidActivityLogPath => {
                write!(f, "{ENV_ACTIVITY_LOG} must not be empty or whitespace")
            }
            Self::NonUnicode(key) => write!(f, "{key} contains non-unicode data"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidListenAddr(err) => Some(err),
            _ => None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr = match read_env(ENV_ADDR)? {
            Some(value) => value.parse().map_err(ConfigError::InvalidListenAddr)?,
            None => DEFAULT_LISTEN_ADDR
                .parse()
                .expect("default listen address must be valid"),
        };

        let target_url = match read_env(ENV_TARGET_URL)? {
            Some(value) => normalize_target_url(&value).ok_or(ConfigError::InvalidTargetUrl)?,
            None => DEFAULT_TARGET_URL.to_owned(),
        };

        let request_timeout_ms = match read_env(ENV_REQUEST_TIMEOUT_MS)? {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidRequestTimeout)?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };

        let seed = match read_env(ENV_SEED)? {
            Some(value) => Some(value.parse().map_err(|_| ConfigError::InvalidSeed)?),
            None => None,
        };

        let mode_policy = match read_env(ENV_MODE_POLICY)? {
            Some(value) => {
                ModeParsePolicy::parse(value.as_str()).ok_or(ConfigError::InvalidModePolicy)?
            }
            None => DEFAULT_MODE_POLICY,
        };

        let activity_log_path = match read_env(ENV_ACTIVITY_LOG)? {
            Some(value) => {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidActivityLogPath);
                }
                value
            }
            None => DEFAULT_ACTIVITY_LOG_PATH.to_owned(),
        };

        Ok(Self {
            listen_addr,
            target_url,
            request_timeout: Duration::from_millis(request_timeout_ms),
            seed,
            mode_policy,
            activity_log_path,
        })
    }
}

fn read_env(key: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicode(key)),
    }
}

fn normalize_target_url(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    let host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))?;
    if host.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use std::{env, sync::Mutex, time::Duration};

    use traffic_core::ModeParsePolicy;

    use super::{
        Config, ConfigError, ENV_ACTIVITY_LOG, ENV_ADDR, ENV_MODE_POLICY, ENV_REQUEST_TIMEOUT_MS,
        ENV_SEED, ENV_TARGET_URL,
    };

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<std::ffi::OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }

        fn unset(key: &'static str) -> Self {
            let previous = env::var_os(key);
            env::remove_var(key);
            Self { key, previous }
        }

        #[cfg(unix)]
        fn set_os(key: &'static str, value: std::ffi::OsString) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    fn reset_config_env_baseline() -> [EnvVarGuard; 6] {
        [
            EnvVarGuard::unset(ENV_ADDR),
            EnvVarGuard::unset(ENV_TARGET_URL),
            EnvVarGuard::unset(ENV_REQUEST_TIMEOUT_MS),
            EnvVarGuard::unset(ENV_SEED),
            EnvVarGuard::unset(ENV_MODE_POLICY),
            EnvVarGuard::unset(ENV_ACTIVITY_LOG),
        ]
    }

    #[test]
    fn defaults_apply_when_env_is_unset() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        let config = Config::from_env().unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8090".parse().unwrap());
        assert_eq!(config.target_url, "http://localhost:5001");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.seed, None);
        assert_eq!(config.mode_policy, ModeParsePolicy::Strict);
        assert_eq!(config.activity_log_path, "artifacts/activity.csv");
    }

    #[test]
    fn uses_listen_address_override_from_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_ADDR, "127.0.0.1:9090");

        let config = Config::from_env().unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:9090".parse().unwrap());
    }

    #[test]
    fn returns_error_for_invalid_listen_address_override() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_ADDR, "not-an-addr");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidListenAddr(_)));
    }

    #[test]
    fn target_url_trailing_slash_is_trimmed() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_TARGET_URL, "https://shop.internal:8443/");

        let config = Config::from_env().unwrap();

        assert_eq!(config.target_url, "https://shop.internal:8443");
    }

    #[test]
    fn returns_error_for_target_url_without_scheme() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_TARGET_URL, "localhost:5001");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidTargetUrl));
    }

    #[test]
    fn returns_error_for_zero_request_timeout() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_REQUEST_TIMEOUT_MS, "0");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidRequestTimeout));
    }

    #[test]
    fn uses_request_timeout_override_from_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_REQUEST_TIMEOUT_MS, "2500");

        let config = Config::from_env().unwrap();

        assert_eq!(config.request_timeout, Duration::from_millis(2_500));
    }

    #[test]
    fn seed_is_parsed_when_present() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_SEED, "42");

        let config = Config::from_env().unwrap();

        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn returns_error_for_negative_seed() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_SEED, "-1");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidSeed));
    }

    #[test]
    fn uses_fallback_mode_policy_override() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_MODE_POLICY, "fallback-moderate");

        let config = Config::from_env().unwrap();

        assert_eq!(config.mode_policy, ModeParsePolicy::FallbackToModerate);
    }

    #[test]
    fn returns_error_for_invalid_mode_policy() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_MODE_POLICY, "lenient");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidModePolicy));
    }

    #[test]
    fn returns_error_for_whitespace_activity_log_override() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_ACTIVITY_LOG, "   ");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidActivityLogPath));
    }

    #[test]
    fn unrelated_invalid_values_do_not_leak_between_tests() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _ambient = EnvVarGuard::set(ENV_MODE_POLICY, "invalid");
        let _baseline = reset_config_env_baseline();

        let config = Config::from_env().unwrap();

        assert_eq!(config.mode_policy, ModeParsePolicy::Strict);
    }

    #[cfg(unix)]
    #[test]
    fn returns_error_for_non_unicode_env_var() {
        use std::os::unix::ffi::OsStringExt;

        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set_os(
            ENV_TARGET_URL,
            std::ffi::OsString::from_vec(vec![0x66, 0x6f, 0x80]),
        );

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::NonUnicode(ENV_TARGET_URL)));
        assert_eq!(
            err.to_string(),
            "TRAFFIC_LAB_TARGET_URL contains non-unicode data"
        );
    }
}
