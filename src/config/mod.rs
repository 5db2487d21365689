use rocket::figment::{providers::{Env, Format, Toml}, Figment};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(profile.as_str())
            .merge(Env::prefixed("ROCKET_").split("_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn jwt_refresh_secret() -> String {
        Self::figment()
            .extract_inner("jwt_refresh_secret")
            .unwrap_or_else(|_| "default-refresh-secret".to_string())
    }

    /// Access token lifetime in seconds (30 minutes).
    pub fn jwt_expiry() -> i64 {
        Self::figment().extract_inner("jwt_expiry").unwrap_or(1800)
    }

    /// Refresh token lifetime in seconds (1 day).
    pub fn jwt_refresh_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_refresh_expiry")
            .unwrap_or(86_400)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/unitedcare".to_string())
    }

    pub fn africastalking_username() -> String {
        Self::figment()
            .extract_inner("africastalking_username")
            .unwrap_or_else(|_| "sandbox".to_string())
    }

    pub fn africastalking_api_key() -> Option<String> {
        Self::figment().extract_inner("africastalking_api_key").ok()
    }

    pub fn africastalking_sender_id() -> String {
        Self::figment()
            .extract_inner("africastalking_sender_id")
            .unwrap_or_else(|_| "UNITEDCARE".to_string())
    }
}
