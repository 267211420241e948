//! Best-effort Slack notification for fatal operational failures (spec §7:
//! bus subscriber-side exceptions, transaction-log write failures). Never
//! affects the outcome of the request that triggered it — failures here are
//! logged and swallowed, mirroring `pos-events::delivery::Publisher`'s own
//! "never fail the caller on a transport error" policy.

use serde_json::json;
use tracing::warn;

#[derive(Clone)]
pub struct SlackNotifier {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        SlackNotifier { webhook_url, client: reqwest::Client::new() }
    }

    pub async fn notify(&self, context: &str, detail: &str) {
        let Some(url) = self.webhook_url.as_ref() else {
            return;
        };
        let body = json!({ "text": format!(":rotating_light: [{context}] {detail}") });
        if let Err(e) = self.client.post(url).json(&body).send().await {
            warn!(error = %e, context, "slack notification failed");
        }
    }
}
