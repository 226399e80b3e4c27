//! Mail delivery collaborator
//!
//! Verification pins and temp passwords are generated here; delivery goes
//! through an HTTP mail endpoint, so the service never speaks SMTP itself.

use anyhow::Result;
use rand::Rng;
use tracing::info;

/// Mailer configuration
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// HTTP endpoint messages are posted to
    pub endpoint: String,
    /// Sender address stamped on outgoing mail
    pub sender: String,
}

impl MailerConfig {
    /// Create a new MailerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `MAIL_ENDPOINT`: HTTP endpoint of the mail collaborator
    /// - `MAIL_SENDER`: Sender address (default: "no-reply@homelink.local")
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("MAIL_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:8025/api/send".to_string());
        let sender = std::env::var("MAIL_SENDER")
            .unwrap_or_else(|_| "no-reply@homelink.local".to_string());

        Ok(MailerConfig { endpoint, sender })
    }
}

/// Mail client
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    config: MailerConfig,
}

impl Mailer {
    /// Create a new mailer
    pub fn new(config: MailerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Six-digit verification pin
    pub fn generate_pin_code() -> String {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(0..1_000_000u32))
    }

    /// Random temp password for the reset and social-signup flows; always
    /// satisfies the password rules (letters plus digits, 12 characters)
    pub fn generate_temp_password() -> String {
        const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
        const DIGITS: &[u8] = b"0123456789";

        let mut rng = rand::thread_rng();
        let mut password: String = (0..10)
            .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
            .collect();
        for _ in 0..2 {
            password.push(DIGITS[rng.gen_range(0..DIGITS.len())] as char);
        }
        password
    }

    /// Mail a verification pin
    pub async fn send_verification_code(&self, to: &str, pin_code: &str) -> Result<()> {
        self.send(
            to,
            "Homelink verification code",
            &format!("Validation code: {pin_code}\nThis mailbox does not accept replies."),
        )
        .await
    }

    /// Mail a temp password after a reset
    pub async fn send_password_reset(&self, to: &str, temp_password: &str) -> Result<()> {
        self.send(
            to,
            "Homelink password reset",
            &format!(
                "Temporary password: {temp_password}\nPlease change it after logging in."
            ),
        )
        .await
    }

    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&serde_json::json!({
                "from": self.config.sender,
                "to": to,
                "subject": subject,
                "text": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("mail endpoint answered {}", response.status());
        }

        info!(subject, "mail queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_password;

    #[test]
    fn test_pin_code_is_six_digits() {
        for _ in 0..32 {
            let pin = Mailer::generate_pin_code();
            assert_eq!(pin.len(), 6);
            assert!(pin.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_temp_password_passes_the_password_rules() {
        for _ in 0..32 {
            let password = Mailer::generate_temp_password();
            assert_eq!(password.len(), 12);
            validate_password(&password).unwrap();
        }
    }
}
