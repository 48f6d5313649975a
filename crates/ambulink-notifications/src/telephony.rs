//! Outbound voice calls.
//!
//! [`TwilioAdapter`] places a call through the Twilio REST API. When a public
//! webhook base is configured the call fetches its TwiML from
//! `/api/voice/twiml`; otherwise the TwiML document is sent inline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Calls are only placed when enabled
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Caller number in E.164 form
    #[serde(default)]
    pub from_number: Option<String>,
    /// Publicly reachable base URL of this server, used for the TwiML callback
    #[serde(default)]
    pub webhook_base_url: Option<String>,
    #[serde(default = "default_call_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_base_url() -> String {
    "https://api.twilio.com".into()
}
fn default_call_timeout_ms() -> u64 {
    10_000
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base_url: default_api_base_url(),
            account_sid: None,
            auth_token: None,
            from_number: None,
            webhook_base_url: None,
            timeout_ms: default_call_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub to: String,
    pub message: String,
}

/// Provider acknowledgement of a queued call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallReceipt {
    pub sid: String,
    #[serde(default)]
    pub status: String,
}

#[async_trait]
pub trait CallAdapter: Send + Sync {
    async fn place_call(&self, request: &CallRequest) -> Result<CallReceipt, NotificationError>;
}

pub struct TwilioAdapter {
    http_client: Client,
    api_base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    webhook_base_url: Option<String>,
}

impl TwilioAdapter {
    pub fn from_config(config: &TelephonyConfig) -> Result<Self, NotificationError> {
        let account_sid = required(&config.account_sid, "telephony.account_sid")?;
        let auth_token = required(&config.auth_token, "telephony.auth_token")?;
        let from_number = required(&config.from_number, "telephony.from_number")?;

        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number,
            webhook_base_url: config
                .webhook_base_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base_url, self.account_sid
        )
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String, NotificationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| NotificationError::InvalidConfig(format!("Missing {key}")))
}

#[async_trait]
impl CallAdapter for TwilioAdapter {
    async fn place_call(&self, request: &CallRequest) -> Result<CallReceipt, NotificationError> {
        let mut form = vec![
            ("To", request.to.clone()),
            ("From", self.from_number.clone()),
        ];
        match &self.webhook_base_url {
            Some(base) => form.push((
                "Url",
                format!(
                    "{base}/api/voice/twiml?message={}",
                    urlencoding::encode(&request.message)
                ),
            )),
            None => form.push(("Twiml", say_twiml(&request.message))),
        }

        let response = self
            .http_client
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Call request rejected by provider");
            return Err(NotificationError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let receipt: CallReceipt = response
            .json()
            .await
            .map_err(|e| NotificationError::InvalidResponse(e.to_string()))?;
        tracing::info!(sid = %receipt.sid, status = %receipt.status, "Call queued");
        Ok(receipt)
    }
}

/// Renders a TwiML document that speaks `message` once.
pub fn say_twiml(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Say voice=\"alice\">{}</Say></Response>",
        escape_xml(message)
    )
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twiml_escapes_markup() {
        let xml = say_twiml("BP <90 & falling");
        assert!(xml.contains("<Say voice=\"alice\">BP &lt;90 &amp; falling</Say>"));
        assert!(xml.starts_with("<?xml"));
    }

    #[test]
    fn missing_credentials_are_invalid_config() {
        let config = TelephonyConfig {
            enabled: true,
            account_sid: Some("AC123".into()),
            ..TelephonyConfig::default()
        };
        let err = TwilioAdapter::from_config(&config).err().expect("config error");
        assert!(matches!(err, NotificationError::InvalidConfig(ref m) if m.contains("auth_token")));
    }
}
