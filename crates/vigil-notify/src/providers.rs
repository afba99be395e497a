use crate::message::{NotifyKind, NotifyMessage};
use crate::notifier::{Notifier, NotifyResult};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vigil_types::{ChannelKind, Severity};

// ============================================================================
// 邮件通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

pub struct EmailNotifier {
    name: String,
    config: EmailConfig,
    enabled: bool,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            name: "email".to_string(),
            config,
            enabled: true,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 配置收件人 + 升级策略追加的邮箱收件人
    fn recipients(&self, message: &NotifyMessage) -> Vec<String> {
        let mut to = self.config.to.clone();
        for r in &message.recipients {
            if r.contains('@') && !to.contains(r) {
                to.push(r.clone());
            }
        }
        to
    }

    fn format_email(&self, message: &NotifyMessage) -> String {
        let alert = &message.alert;
        let mut body = format!("{}\n\n", message.content);
        body.push_str(&format!("Rule: {} ({})\n", alert.rule_name, alert.rule_id));
        body.push_str(&format!("Metric: {}\n", alert.metric));
        body.push_str(&format!("Current value: {:.2}\n", alert.current_value));
        body.push_str(&format!("Threshold: {:.2}\n", alert.threshold));
        body.push_str(&format!("Severity: {}\n", alert.severity));
        body.push_str(&format!("Triggered at: {}\n", alert.triggered_at.to_rfc3339()));
        if let Some(resolved_at) = alert.resolved_at {
            body.push_str(&format!("Resolved at: {}\n", resolved_at.to_rfc3339()));
        }
        if !alert.context.is_empty() {
            body.push_str("\nContext:\n");
            for (k, v) in &alert.context {
                body.push_str(&format!("  {}: {}\n", k, v));
            }
        }
        body
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        use lettre::message::header::ContentType;
        use lettre::message::Mailbox;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

        let recipients = self.recipients(message);
        if recipients.is_empty() {
            return Ok(NotifyResult::failure("Email has no recipients"));
        }

        let mut builder = Message::builder()
            .from(self.config.from.parse::<Mailbox>()?)
            .subject(message.title.clone())
            .header(ContentType::TEXT_PLAIN);
        for to in &recipients {
            builder = builder.to(to.parse::<Mailbox>()?);
        }
        let email = builder.body(self.format_email(message))?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
            .credentials(creds)
            .port(self.config.smtp_port)
            .build();

        match mailer.send(email).await {
            Ok(_) => Ok(NotifyResult::success()),
            Err(e) => Ok(NotifyResult::failure(format!("Email send failed: {}", e))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// 聊天机器人通知（Slack Block Kit）
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

pub struct ChatNotifier {
    name: String,
    config: ChatConfig,
    client: reqwest::Client,
    enabled: bool,
}

impl ChatNotifier {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            name: "chat".to_string(),
            config,
            client: reqwest::Client::new(),
            enabled: true,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn build_message(&self, message: &NotifyMessage) -> serde_json::Value {
        let alert = &message.alert;
        let icon = match (&message.kind, message.severity) {
            (NotifyKind::Resolved, _) => ":white_check_mark:",
            (_, Severity::Critical) => ":rotating_light:",
            (_, Severity::High) => ":red_circle:",
            (_, Severity::Medium) => ":large_orange_circle:",
            (_, Severity::Low) => ":large_blue_circle:",
        };

        let mut body = serde_json::json!({
            "text": format!("{} {}", icon, message.title),
            "blocks": [
                {
                    "type": "header",
                    "text": { "type": "plain_text", "text": message.title }
                },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": format!("{} {}", icon, message.content) }
                },
                {
                    "type": "section",
                    "fields": [
                        { "type": "mrkdwn", "text": format!("*Severity:*\n{}", alert.severity) },
                        { "type": "mrkdwn", "text": format!("*Metric:*\n`{}`", alert.metric) },
                        { "type": "mrkdwn", "text": format!("*Current:*\n{:.2}", alert.current_value) },
                        { "type": "mrkdwn", "text": format!("*Threshold:*\n{:.2}", alert.threshold) }
                    ]
                },
                {
                    "type": "context",
                    "elements": [
                        { "type": "mrkdwn", "text": format!("alert `{}` · rule `{}` · {}", alert.id, alert.rule_id, message.timestamp.to_rfc3339()) }
                    ]
                }
            ]
        });

        if let Some(channel) = &self.config.channel {
            body["channel"] = serde_json::json!(channel);
        }
        if let Some(username) = &self.config.username {
            body["username"] = serde_json::json!(username);
        }
        body
    }
}

#[async_trait]
impl Notifier for ChatNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let body = self.build_message(message);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Chat webhook failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Chat
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// 值班呼叫（PagerDuty Events API v2）
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagerConfig {
    pub routing_key: String,
    #[serde(default = "default_pager_url")]
    pub events_url: String,
    #[serde(default = "default_pager_source")]
    pub source: String,
}

fn default_pager_url() -> String {
    "https://events.pagerduty.com/v2/enqueue".to_string()
}

fn default_pager_source() -> String {
    "vigil".to_string()
}

pub struct PagerNotifier {
    name: String,
    config: PagerConfig,
    client: reqwest::Client,
    enabled: bool,
}

impl PagerNotifier {
    pub fn new(config: PagerConfig) -> Self {
        Self {
            name: "pager".to_string(),
            config,
            client: reqwest::Client::new(),
            enabled: true,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn build_event(&self, message: &NotifyMessage) -> serde_json::Value {
        let alert = &message.alert;

        // dedup_key 绑定告警实例，resolve 事件才能关闭同一个 incident
        if message.is_resolution() {
            return serde_json::json!({
                "routing_key": self.config.routing_key,
                "event_action": "resolve",
                "dedup_key": alert.id,
            });
        }

        let severity = match message.severity {
            Severity::Critical => "critical",
            Severity::High => "error",
            Severity::Medium => "warning",
            Severity::Low => "info",
        };

        serde_json::json!({
            "routing_key": self.config.routing_key,
            "event_action": "trigger",
            "dedup_key": alert.id,
            "payload": {
                "summary": format!("{}: {}", message.title, message.content),
                "severity": severity,
                "source": self.config.source,
                "timestamp": alert.triggered_at.to_rfc3339(),
                "component": alert.metric,
                "group": alert.rule_kind.as_str(),
                "custom_details": {
                    "rule_id": alert.rule_id,
                    "current_value": alert.current_value,
                    "threshold": alert.threshold,
                    "recipients": message.recipients,
                    "context": alert.context,
                }
            }
        })
    }
}

#[async_trait]
impl Notifier for PagerNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let event = self.build_event(message);

        let response = self
            .client
            .post(&self.config.events_url)
            .json(&event)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Pager event failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Pager
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// Webhook 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

fn default_method() -> String {
    "POST".to_string()
}

pub struct WebhookNotifier {
    name: String,
    config: WebhookConfig,
    client: reqwest::Client,
    enabled: bool,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            name: "webhook".to_string(),
            config,
            client: reqwest::Client::new(),
            enabled: true,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let method = reqwest::Method::from_bytes(self.config.method.to_uppercase().as_bytes())
            .map_err(|_| anyhow!("Invalid webhook method: {}", self.config.method))?;

        let mut request = self.client.request(method, &self.config.url);

        if let Some(headers) = &self.config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.json(message).send().await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Webhook failed with status: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// 短信通知（Twilio 风格 REST API）
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default = "default_sms_api")]
    pub api_base: String,
}

fn default_sms_api() -> String {
    "https://api.twilio.com".to_string()
}

const SMS_MAX_LEN: usize = 160;

pub struct SmsNotifier {
    name: String,
    config: SmsConfig,
    client: reqwest::Client,
    enabled: bool,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            name: "sms".to_string(),
            config,
            client: reqwest::Client::new(),
            enabled: true,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn recipients(&self, message: &NotifyMessage) -> Vec<String> {
        let mut to = self.config.to.clone();
        for r in &message.recipients {
            if r.starts_with('+') && !to.contains(r) {
                to.push(r.clone());
            }
        }
        to
    }

    fn format_sms(&self, message: &NotifyMessage) -> String {
        let alert = &message.alert;
        let text = format!(
            "[{}] {}: {} = {:.2} (threshold {:.2})",
            alert.severity.as_str().to_uppercase(),
            message.title,
            alert.metric,
            alert.current_value,
            alert.threshold
        );
        text.chars().take(SMS_MAX_LEN).collect()
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult> {
        let recipients = self.recipients(message);
        if recipients.is_empty() {
            return Ok(NotifyResult::failure("SMS has no recipients"));
        }

        let body = self.format_sms(message);
        let url = self.messages_url();
        let mut failures = Vec::new();

        for to in &recipients {
            let params = [
                ("To", to.as_str()),
                ("From", self.config.from.as_str()),
                ("Body", body.as_str()),
            ];
            let response = self
                .client
                .post(&url)
                .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
                .form(&params)
                .send()
                .await?;

            if !response.status().is_success() {
                failures.push(format!("{}: {}", to, response.status()));
            }
        }

        if failures.is_empty() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "SMS failed for {}",
                failures.join(", ")
            )))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

pub(crate) fn default_enabled() -> bool {
    true
}
