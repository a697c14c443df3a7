use crate::config::EmailConfig;
use crate::error::app_error::AppError;
use lettre::message::header::ContentType;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Delivers the reset link to the person who asked for it.
#[async_trait::async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_password_reset(&self, to_email: &str, to_name: &str, reset_link: &str) -> Result<(), AppError>;
}

pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn generate_reset_email_html(&self, to_name: &str, reset_link: &str) -> String {
        format!(
            r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Reset your password</title>
</head>
<body style="margin:0;padding:24px;background-color:#FAFBFC;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Arial,sans-serif;color:#141517;">
    <table role="presentation" width="100%" cellspacing="0" cellpadding="0" style="max-width:560px;margin:0 auto;background:#FFFFFF;border-radius:8px;">
        <tr>
            <td style="padding:32px;">
                <h1 style="font-size:22px;margin:0 0 16px;">Reset your password</h1>
                <p>Hi {name},</p>
                <p>We received a request to reset the password for your {app} account.</p>
                <p style="margin:24px 0;">
                    <a href="{link}" style="background:#2F6FEB;color:#FFFFFF;padding:12px 20px;border-radius:6px;text-decoration:none;">Choose a new password</a>
                </p>
                <p>If the button does not work, copy this link into your browser:</p>
                <p style="word-break:break-all;"><a href="{link}">{link}</a></p>
                <p>The link can be used once. If you did not ask for a reset you can ignore this email; your current password keeps working.</p>
            </td>
        </tr>
    </table>
</body>
</html>
"##,
            name = to_name,
            app = self.config.from_name,
            link = reset_link
        )
    }

    fn generate_reset_email_text(&self, to_name: &str, reset_link: &str) -> String {
        format!(
            r#"Hi {},

We received a request to reset the password for your {} account.

Choose a new password using the link below:
{}

The link can be used once. If you did not ask for a reset you can ignore this email; your current password keeps working.
"#,
            to_name, self.config.from_name, reset_link
        )
    }

    async fn send_email(&self, to_email: &str, subject: &str, html_body: &str, text_body: &str) -> Result<(), AppError> {
        let email = Message::builder()
            .from(
                format!("{} <{}>", self.config.from_name, self.config.from_address)
                    .parse()
                    .map_err(|e| AppError::email(format!("Invalid from address: {}", e)))?,
            )
            .to(to_email.parse().map_err(|e| AppError::email(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(text_body.to_string()))
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html_body.to_string())),
            )
            .map_err(|e| AppError::email(format!("Failed to build email: {}", e)))?;

        let creds = Credentials::new(self.config.smtp_username.clone(), self.config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| AppError::email(format!("Failed to create SMTP transport: {}", e)))?
            .credentials(creds)
            .port(self.config.smtp_port)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| AppError::email(format!("Failed to send email: {}", e)))?;

        tracing::info!(to = %to_email, "password reset email sent");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResetNotifier for EmailService {
    async fn send_password_reset(&self, to_email: &str, to_name: &str, reset_link: &str) -> Result<(), AppError> {
        if !self.config.enabled {
            tracing::warn!("Email service is disabled, skipping password reset email to {}", to_email);
            return Ok(());
        }

        let subject = format!("Reset your {} password", self.config.from_name);
        let html_body = self.generate_reset_email_html(to_name, reset_link);
        let text_body = self.generate_reset_email_text(to_name, reset_link);

        self.send_email(to_email, &subject, &html_body, &text_body).await
    }
}
