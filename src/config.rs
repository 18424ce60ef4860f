use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub storage_dir: String,
    pub storage_signing_secret: String,
    pub public_base_url: String,
    pub signed_url_ttl_secs: i64,
    pub metrics_utc_offset_minutes: i32,
    pub db_max_connections: u32,
    pub max_upload_bytes: usize,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            storage_dir: get_env_or("STORAGE_DIR", "./uploads".to_string())?,
            storage_signing_secret: get_env("STORAGE_SIGNING_SECRET")?,
            public_base_url: get_env_or("PUBLIC_BASE_URL", "http://localhost:8080".to_string())?,
            signed_url_ttl_secs: get_env_or("SIGNED_URL_TTL_SECS", 300)?,
            metrics_utc_offset_minutes: get_env_or("METRICS_UTC_OFFSET_MINUTES", 0)?,
            db_max_connections: get_env_or("DB_MAX_CONNECTIONS", 20)?,
            max_upload_bytes: get_env_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
