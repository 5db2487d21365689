//! SMS dispatch via Africa's Talking.
//!
//! The engine holds a `Notifier` trait object constructed once at startup;
//! delivery failures are logged by the caller and never fail the enclosing
//! operation.

use async_trait::async_trait;
use reqwest::Client;

use crate::config::Config;

const AFRICASTALKING_BASE: &str = "https://api.africastalking.com/version1/messaging";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), String>;
}

pub struct AfricasTalkingService {
    client: Client,
    username: String,
    api_key: Option<String>,
    sender_id: String,
}

impl AfricasTalkingService {
    pub fn from_config() -> Self {
        AfricasTalkingService {
            client: Client::new(),
            username: Config::africastalking_username(),
            api_key: Config::africastalking_api_key(),
            sender_id: Config::africastalking_sender_id(),
        }
    }
}

#[async_trait]
impl Notifier for AfricasTalkingService {
    async fn send(&self, phone: &str, message: &str) -> Result<(), String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "AFRICASTALKING_API_KEY not configured".to_string())?;

        let params = [
            ("username", self.username.as_str()),
            ("to", phone),
            ("message", message),
            ("from", self.sender_id.as_str()),
        ];

        let res = self
            .client
            .post(AFRICASTALKING_BASE)
            .header("apiKey", api_key)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| format!("Africa's Talking request failed: {e}"))?;

        if !res.status().is_success() {
            return Err(res
                .text()
                .await
                .unwrap_or_else(|_| "Africa's Talking error".to_string()));
        }

        Ok(())
    }
}
