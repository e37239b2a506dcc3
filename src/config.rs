//! Environment-driven configuration for the gate pipeline and the demo server.
//!
//! Every knob has a default; only `JWT_SECRET` is mandatory, and even that may be omitted when
//! demo mode is enabled.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::gate::{
    RateLimitConfig, DEFAULT_MAX_CLIENTS, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_REQUESTS, DEFAULT_MESSAGE,
    DEFAULT_TTL, DEFAULT_WINDOW,
};

const DEMO_SECRET: &str = "coursegate-demo-secret-do-not-deploy";
/// Ten years; keeps `issued_at + ttl` well inside chrono's representable range.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub http_port: u16,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub lookup_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub demo: bool,
}

/// Defaults carry no signing secret; `AppState::new` refuses to start until one is set.
impl Default for GateConfig {
    fn default() -> Self {
        Self {
            http_port: 5000,
            jwt_secret: String::new(),
            token_ttl: chrono::Duration::days(7),
            lookup_timeout: Duration::from_secs(5),
            rate_limit: RateLimitConfig::default(),
            cache_ttl: DEFAULT_TTL,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            demo: false,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: '{}'", name, raw)),
        _ => Ok(default),
    }
}

/// Like [`parse_var`], but zero and negative values are rejected.
fn parse_positive<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = parse_var(lookup, name, default)?;
    if value <= T::default() {
        bail!("{} must be greater than zero", name);
    }
    Ok(value)
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> Result<bool> {
    match lookup(name).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(anyhow!("invalid value for {}: '{}'", name, other)),
        },
    }
}

impl GateConfig {
    /// Demo-mode config with the built-in secret. Never use outside local demos and tests.
    pub fn demo() -> Self {
        Self { jwt_secret: DEMO_SECRET.to_string(), demo: true, ..Self::default() }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let demo = parse_bool(&lookup, "COURSEGATE_DEMO", false)?;
        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(s) => s,
            None if demo => DEMO_SECRET.to_string(),
            None => return Err(anyhow!("JWT_SECRET must be set (or enable COURSEGATE_DEMO)")),
        };

        let window_secs = parse_positive(&lookup, "COURSEGATE_RATE_WINDOW_SECS", DEFAULT_WINDOW.as_secs())?;
        let rate_limit = RateLimitConfig {
            window: Duration::from_secs(window_secs),
            max_requests: parse_positive(&lookup, "COURSEGATE_RATE_MAX", DEFAULT_MAX_REQUESTS)?,
            message: lookup("COURSEGATE_RATE_MESSAGE").unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            max_clients: parse_positive(&lookup, "COURSEGATE_RATE_MAX_CLIENTS", DEFAULT_MAX_CLIENTS)?,
        };

        let ttl_hours = parse_positive(&lookup, "COURSEGATE_TOKEN_TTL_HOURS", 24 * 7i64)?;
        if ttl_hours > MAX_TOKEN_TTL_HOURS {
            bail!("COURSEGATE_TOKEN_TTL_HOURS must be at most {}", MAX_TOKEN_TTL_HOURS);
        }
        let token_ttl = chrono::Duration::try_hours(ttl_hours)
            .ok_or_else(|| anyhow!("COURSEGATE_TOKEN_TTL_HOURS out of range: {}", ttl_hours))?;

        Ok(Self {
            http_port: parse_var(&lookup, "COURSEGATE_HTTP_PORT", 5000u16)?,
            jwt_secret,
            token_ttl,
            lookup_timeout: Duration::from_millis(parse_positive(&lookup, "COURSEGATE_LOOKUP_TIMEOUT_MS", 5_000u64)?),
            rate_limit,
            cache_ttl: Duration::from_secs(parse_positive(&lookup, "COURSEGATE_CACHE_TTL_SECS", DEFAULT_TTL.as_secs())?),
            cache_max_entries: parse_positive(&lookup, "COURSEGATE_CACHE_MAX_ENTRIES", DEFAULT_MAX_ENTRIES)?,
            demo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn secret_required_outside_demo() {
        let err = GateConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn demo_mode_supplies_secret_and_defaults() {
        let cfg = GateConfig::from_lookup(lookup_from(&[("COURSEGATE_DEMO", "yes")])).unwrap();
        assert!(cfg.demo);
        assert_eq!(cfg.rate_limit.window, Duration::from_secs(900));
        assert_eq!(cfg.rate_limit.max_requests, 100);
        assert_eq!(cfg.rate_limit.message, "Too many requests");
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));
        assert_eq!(cfg.token_ttl, chrono::Duration::days(7));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = GateConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("COURSEGATE_RATE_MAX", "3"),
            ("COURSEGATE_RATE_WINDOW_SECS", "60"),
            ("COURSEGATE_CACHE_TTL_SECS", "5"),
            ("COURSEGATE_HTTP_PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.rate_limit.max_requests, 3);
        assert_eq!(cfg.rate_limit.window, Duration::from_secs(60));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(5));
        assert_eq!(cfg.http_port, 8080);
    }

    #[test]
    fn bad_number_names_the_variable() {
        let err = GateConfig::from_lookup(lookup_from(&[("JWT_SECRET", "x"), ("COURSEGATE_RATE_MAX", "lots")]))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("COURSEGATE_RATE_MAX"));
    }

    #[test]
    fn zero_and_negative_durations_are_rejected() {
        for (name, value) in [
            ("COURSEGATE_RATE_WINDOW_SECS", "0"),
            ("COURSEGATE_CACHE_TTL_SECS", "0"),
            ("COURSEGATE_LOOKUP_TIMEOUT_MS", "0"),
            ("COURSEGATE_RATE_MAX", "0"),
            ("COURSEGATE_TOKEN_TTL_HOURS", "0"),
            ("COURSEGATE_TOKEN_TTL_HOURS", "-5"),
        ] {
            let err = GateConfig::from_lookup(lookup_from(&[("JWT_SECRET", "x"), (name, value)])).unwrap_err();
            assert!(format!("{:#}", err).contains(name), "{name}={value}: {err:#}");
        }
    }

    #[test]
    fn huge_token_ttl_is_an_error_not_a_panic() {
        let max = i64::MAX.to_string();
        for value in [max.as_str(), "1000000"] {
            let err = GateConfig::from_lookup(lookup_from(&[("JWT_SECRET", "x"), ("COURSEGATE_TOKEN_TTL_HOURS", value)]))
                .unwrap_err();
            assert!(format!("{:#}", err).contains("COURSEGATE_TOKEN_TTL_HOURS"));
        }
    }

    #[test]
    fn default_is_not_demo_and_has_no_secret() {
        let cfg = GateConfig::default();
        assert!(!cfg.demo);
        assert!(cfg.jwt_secret.is_empty());
        let demo = GateConfig::demo();
        assert!(demo.demo);
        assert_eq!(demo.jwt_secret, DEMO_SECRET);
    }
}
