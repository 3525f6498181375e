use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} has an invalid value: {1}")]
    Invalid(&'static str, String),
    #[error("Google OAuth needs GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET and GOOGLE_REDIRECT_URI together")]
    PartialGoogle,
}

/// Credentials for the Google OAuth client. Present only when all three variables are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub verification_ttl_hours: i64,
    pub bcrypt_cost: u32,
    /// Base URL used to build links in outgoing mail.
    pub public_url: String,
    pub run_migrations: bool,
    pub google: Option<GoogleConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let server_port = parse_or(&lookup, "SERVER_PORT", 8080u16)?;

        let google = match (
            lookup("GOOGLE_CLIENT_ID"),
            lookup("GOOGLE_CLIENT_SECRET"),
            lookup("GOOGLE_REDIRECT_URI"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_uri,
            }),
            (None, None, None) => None,
            _ => return Err(ConfigError::PartialGoogle),
        };

        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid("BCRYPT_COST", bcrypt_cost.to_string()));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            public_url: lookup("PUBLIC_URL")
                .unwrap_or_else(|| format!("http://{}:{}", server_host, server_port)),
            server_port,
            server_host,
            access_token_ttl_minutes: positive(parse_or(&lookup, "ACCESS_TOKEN_TTL_MINUTES", 15)?, "ACCESS_TOKEN_TTL_MINUTES")?,
            refresh_token_ttl_days: positive(parse_or(&lookup, "REFRESH_TOKEN_TTL_DAYS", 7)?, "REFRESH_TOKEN_TTL_DAYS")?,
            verification_ttl_hours: positive(parse_or(&lookup, "VERIFICATION_TTL_HOURS", 24)?, "VERIFICATION_TTL_HOURS")?,
            bcrypt_cost,
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", false)?,
            google,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}

fn positive(value: i64, key: &'static str) -> Result<i64, ConfigError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(key, value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 2] = [("DATABASE_URL", "postgres://test"), ("JWT_SECRET", "s3cret")];

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&BASE)).unwrap();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.access_token_ttl_minutes, 15);
        assert_eq!(config.refresh_token_ttl_days, 7);
        assert_eq!(config.verification_ttl_hours, 24);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.public_url, "http://127.0.0.1:8080");
        assert!(!config.run_migrations);
        assert!(config.google.is_none());
    }

    #[test]
    fn test_config_custom_values() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("SERVER_PORT", "3000"),
            ("SERVER_HOST", "0.0.0.0"),
            ("PUBLIC_URL", "https://auth.example.com"),
            ("RUN_MIGRATIONS", "true"),
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_REDIRECT_URI", "https://auth.example.com/oauth/google/callback"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_url(), "http://0.0.0.0:3000");
        assert_eq!(config.public_url, "https://auth.example.com");
        assert!(config.run_migrations);
        assert_eq!(config.google.unwrap().client_id, "id");
    }

    #[test]
    fn test_config_rejects_missing_and_invalid_values() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://test")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));

        let mut pairs = BASE.to_vec();
        pairs.push(("SERVER_PORT", "eighty"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid("SERVER_PORT", _))
        ));

        let mut pairs = BASE.to_vec();
        pairs.push(("REFRESH_TOKEN_TTL_DAYS", "0"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("GOOGLE_CLIENT_ID", "only-the-id"));
        assert_eq!(
            Config::from_lookup(lookup_from(&pairs)).unwrap_err(),
            ConfigError::PartialGoogle
        );
    }
}
