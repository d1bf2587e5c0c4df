//! OTP email delivery via the SendGrid HTTP API
//!
//! Delivery is fire-and-forget from the caller's point of view: a send
//! failure is reported in the response body (`otp_sent: false`) but never
//! fails registration or password reset. When mail is unconfigured the OTP
//! is logged server-side so an operator can still complete a verification
//! by hand.

use loom_common::config::AppConfig;
use std::time::Duration;
use tracing::{error, info, warn};

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// SendGrid mail client for one-time codes
pub struct OtpMailer {
    http_client: reqwest::Client,
    api_key: Option<String>,
    from_email: Option<String>,
    from_name: String,
}

impl OtpMailer {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: config.sendgrid_api_key.clone(),
            from_email: config.sendgrid_from_email.clone(),
            from_name: config.sendgrid_from_name.clone(),
        }
    }

    /// Send a verification code; returns whether the mail was accepted
    pub async fn send_otp(&self, to_email: &str, otp_code: &str) -> bool {
        let (Some(api_key), Some(from_email)) = (&self.api_key, &self.from_email) else {
            warn!("Email not configured. Set SENDGRID_API_KEY and SENDGRID_FROM_EMAIL.");
            // The code is still needed somewhere; surface it for the operator.
            info!(to_email, otp_code, "OTP generated but not emailed");
            return false;
        };

        let body = serde_json::json!({
            "personalizations": [{ "to": [{ "email": to_email }] }],
            "from": { "email": from_email, "name": self.from_name },
            "subject": "Your Lucid Loom Verification Code",
            "content": [
                { "type": "text/plain", "value": plain_body(otp_code) },
                { "type": "text/html", "value": html_body(otp_code) },
            ],
        });

        let result = self
            .http_client
            .post(SENDGRID_URL)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(SEND_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(to_email, "OTP email sent");
                true
            }
            Ok(response) => {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                error!(to_email, %status, detail, "SendGrid rejected OTP email");
                false
            }
            Err(e) => {
                error!(to_email, "Failed to send OTP email: {}", e);
                false
            }
        }
    }
}

fn plain_body(otp_code: &str) -> String {
    format!(
        "Welcome to Lucid Loom!\n\n\
         Please use the following verification code to complete your registration:\n\n\
         {}\n\n\
         This code will expire in 10 minutes.\n\n\
         If you didn't request this code, please ignore this email.",
        otp_code
    )
}

fn html_body(otp_code: &str) -> String {
    format!(
        "<html><body style=\"font-family: sans-serif; color: #333;\">\
         <h2>Welcome to Lucid Loom</h2>\
         <p>Please use the following verification code to complete your registration:</p>\
         <h1 style=\"letter-spacing: 4px;\">{}</h1>\
         <p>This code will expire in 10 minutes.</p>\
         <p>If you didn't request this code, please ignore this email.</p>\
         </body></html>",
        otp_code
    )
}
