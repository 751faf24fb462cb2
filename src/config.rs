use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

/// Upper bound for `JWT_TTL_DAYS`, about ten years.
pub const MAX_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_days: i64,
}

/// Argon2 work cost.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PgConnectOptions,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub require_auth_for_users: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = match std::env::var("DATABASE_URL") {
            Ok(url) => PgConnectOptions::from_str(&url).context("invalid DATABASE_URL")?,
            Err(_) => connect_options_from_parts(
                &std::env::var("DB_USER").context("DATABASE_URL or DB_USER must be set")?,
                &std::env::var("DB_PASS").unwrap_or_default(),
                &std::env::var("DB_HOST").unwrap_or_else(|_| "localhost:5432".into()),
                &std::env::var("DB_NAME").context("DATABASE_URL or DB_NAME must be set")?,
            )?,
        };

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let defaults = PasswordConfig::default();
        Ok(Self {
            database,
            max_connections: setting("DB_MAX_CONNECTIONS", env("DB_MAX_CONNECTIONS"), 10)?,
            jwt: JwtConfig {
                secret,
                ttl_days: check_ttl_days(setting("JWT_TTL_DAYS", env("JWT_TTL_DAYS"), 60)?)?,
            },
            password: PasswordConfig {
                memory_kib: setting("ARGON2_MEMORY_KIB", env("ARGON2_MEMORY_KIB"), defaults.memory_kib)?,
                iterations: setting("ARGON2_ITERATIONS", env("ARGON2_ITERATIONS"), defaults.iterations)?,
                parallelism: setting(
                    "ARGON2_PARALLELISM",
                    env("ARGON2_PARALLELISM"),
                    defaults.parallelism,
                )?,
            },
            require_auth_for_users: flag("REQUIRE_AUTH_FOR_USERS", env("REQUIRE_AUTH_FOR_USERS"), false)?,
        })
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Unset or blank falls back to `default`; anything else must parse.
fn setting<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v.parse::<T>().with_context(|| format!("invalid {}", key)),
    }
}

fn flag(key: &str, raw: Option<String>, default: bool) -> anyhow::Result<bool> {
    let Some(v) = raw.map(|v| v.trim().to_ascii_lowercase()) else {
        return Ok(default);
    };
    match v.as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("invalid {}: expected true/false, 1/0, yes/no or on/off", key),
    }
}

fn check_ttl_days(days: i64) -> anyhow::Result<i64> {
    if days <= 0 || days > MAX_TTL_DAYS {
        anyhow::bail!("JWT_TTL_DAYS must be between 1 and {}, got {}", MAX_TTL_DAYS, days);
    }
    Ok(days)
}

/// `host` is `name` or `name:port`.
pub(crate) fn connect_options_from_parts(
    user: &str,
    pass: &str,
    host: &str,
    name: &str,
) -> anyhow::Result<PgConnectOptions> {
    let (hostname, port) = match host.rsplit_once(':') {
        Some((h, p)) => (h, p.parse::<u16>().with_context(|| format!("invalid DB_HOST port {:?}", p))?),
        None => (host, 5432),
    };
    let mut options = PgConnectOptions::new()
        .host(hostname)
        .port(port)
        .username(user)
        .database(name);
    if !pass.is_empty() {
        options = options.password(pass);
    }
    Ok(options)
}

#[cfg(test)]
impl AppConfig {
    /// Cheap hashing parameters so tests stay fast.
    pub fn for_tests() -> Self {
        Self {
            database: PgConnectOptions::new()
                .host("localhost")
                .username("postgres")
                .database("postgres"),
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                ttl_days: 60,
            },
            password: PasswordConfig {
                memory_kib: 8,
                iterations: 1,
                parallelism: 1,
            },
            require_auth_for_users: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn builds_connect_options_from_parts() {
        let opts = connect_options_from_parts("app", "pw", "db:6543", "accounts").unwrap();
        assert_eq!(opts.get_host(), "db");
        assert_eq!(opts.get_port(), 6543);
        assert_eq!(opts.get_username(), "app");
        assert_eq!(opts.get_database(), Some("accounts"));

        let opts = connect_options_from_parts("app", "", "db", "accounts").unwrap();
        assert_eq!(opts.get_port(), 5432);
    }

    #[test]
    fn credentials_with_url_metacharacters_are_kept_verbatim() {
        let opts = connect_options_from_parts("me@corp", "p@ss/w:rd#1", "db:5432", "accounts")
            .expect("special characters need no escaping");
        assert_eq!(opts.get_username(), "me@corp");
        assert_eq!(opts.get_host(), "db");
    }

    #[test]
    fn rejects_bad_port() {
        assert!(connect_options_from_parts("app", "", "db:notaport", "accounts").is_err());
    }

    #[test]
    fn setting_falls_back_only_when_unset() {
        assert_eq!(setting("N", None, 42u32).unwrap(), 42);
        assert_eq!(setting("N", raw("  "), 42u32).unwrap(), 42);
        assert_eq!(setting("N", raw(" 7 "), 42u32).unwrap(), 7);

        let err = setting("DB_MAX_CONNECTIONS", raw("ten"), 10u32).unwrap_err();
        assert!(err.to_string().contains("invalid DB_MAX_CONNECTIONS"));
    }

    #[test]
    fn flag_accepts_common_spellings() {
        for v in ["1", "true", "TRUE", "True", "yes", "YES", "on", " On "] {
            assert!(flag("F", raw(v), false).unwrap(), "{:?}", v);
        }
        for v in ["0", "false", "FALSE", "no", "off"] {
            assert!(!flag("F", raw(v), true).unwrap(), "{:?}", v);
        }
        assert!(!flag("F", None, false).unwrap());
        assert!(flag("F", raw(""), true).unwrap());
    }

    #[test]
    fn flag_rejects_unknown_spelling() {
        let err = flag("REQUIRE_AUTH_FOR_USERS", raw("enabled"), false).unwrap_err();
        assert!(err.to_string().contains("invalid REQUIRE_AUTH_FOR_USERS"));
    }

    #[test]
    fn ttl_days_must_be_in_range() {
        assert_eq!(check_ttl_days(60).unwrap(), 60);
        assert_eq!(check_ttl_days(1).unwrap(), 1);
        assert_eq!(check_ttl_days(MAX_TTL_DAYS).unwrap(), MAX_TTL_DAYS);
        assert!(check_ttl_days(0).is_err());
        assert!(check_ttl_days(-1).is_err());
        assert!(check_ttl_days(MAX_TTL_DAYS + 1).is_err());
        assert!(check_ttl_days(10_000_000).is_err());
    }
}
