//! # Alerting
//!
//! Post-run analysis of failure rates, dead-channel transitions, and quota
//! pressure. Detected anomalies are persisted as alerts, announced on the
//! event bus, and optionally forwarded to a webhook sink. Webhook delivery
//! failures are logged and never affect sync correctness.

use crate::quota::QuotaStatus;
use crate::Result;
use core_runtime::events::{AlertEvent, CoreEvent, EventBus};
use core_store::models::{Alert, AlertSeverity, AlertType};
use core_store::repositories::{AlertRepository, NewAlert};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the orchestrator observed during one run
#[derive(Debug, Clone, Default)]
pub struct RunAnalysis {
    pub user_id: String,
    pub sync_type: String,
    pub channels_processed: i64,
    pub channels_failed: i64,
    /// Channels that crossed into dead during this run (id, title)
    pub died_channels: Vec<(String, String)>,
    /// Message of a fatal run error, if the run terminated abnormally
    pub fatal_error: Option<String>,
}

impl RunAnalysis {
    pub fn total_channels(&self) -> i64 {
        self.channels_processed + self.channels_failed
    }

    pub fn failure_rate(&self) -> f64 {
        let total = self.total_channels();
        if total == 0 {
            0.0
        } else {
            self.channels_failed as f64 / total as f64
        }
    }
}

/// Post-run alert analysis and delivery
pub struct AlertingService {
    alerts: Arc<dyn AlertRepository>,
    event_bus: Arc<EventBus>,
    webhook: Option<WebhookNotifier>,
    failure_rate_threshold: f64,
    failure_rate_min_channels: i64,
    quota_warning_fraction: f64,
}

impl AlertingService {
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        event_bus: Arc<EventBus>,
        failure_rate_threshold: f64,
        failure_rate_min_channels: i64,
        quota_warning_fraction: f64,
    ) -> Self {
        Self {
            alerts,
            event_bus,
            webhook: None,
            failure_rate_threshold,
            failure_rate_min_channels,
            quota_warning_fraction,
        }
    }

    pub fn with_webhook(mut self, webhook: WebhookNotifier) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Analyze a finished run and raise alerts for anything anomalous.
    /// Returns the stored alerts.
    pub async fn analyze_run(
        &self,
        analysis: &RunAnalysis,
        quota: QuotaStatus,
    ) -> Result<Vec<Alert>> {
        let mut raised = Vec::new();

        if let Some(alert) = self.failure_rate_alert(analysis) {
            raised.push(self.raise(alert).await?);
        }
        for (channel_id, title) in &analysis.died_channels {
            raised.push(
                self.raise(NewAlert {
                    alert_type: AlertType::ChannelDied,
                    severity: AlertSeverity::Error,
                    title: format!("Channel died: {}", title),
                    message: format!(
                        "\"{}\" reached 10 consecutive fetch failures and will be skipped until revived",
                        title
                    ),
                    data: json!({ "channel_id": channel_id, "user_id": analysis.user_id }),
                })
                .await?,
            );
        }
        if let Some(alert) = self.quota_alert(quota) {
            raised.push(self.raise(alert).await?);
        }
        if let Some(message) = &analysis.fatal_error {
            raised.push(
                self.raise(NewAlert {
                    alert_type: AlertType::SyncError,
                    severity: AlertSeverity::Error,
                    title: format!("Sync failed for {}", analysis.user_id),
                    message: message.clone(),
                    data: json!({
                        "user_id": analysis.user_id,
                        "sync_type": analysis.sync_type,
                        "channels_processed": analysis.channels_processed,
                    }),
                })
                .await?,
            );
        }

        debug!(count = raised.len(), user_id = %analysis.user_id, "Run analysis finished");
        Ok(raised)
    }

    fn failure_rate_alert(&self, analysis: &RunAnalysis) -> Option<NewAlert> {
        let total = analysis.total_channels();
        let rate = analysis.failure_rate();
        if total < self.failure_rate_min_channels || rate < self.failure_rate_threshold {
            return None;
        }

        let severity = if rate >= 0.8 {
            AlertSeverity::Critical
        } else if rate >= 0.5 {
            AlertSeverity::Error
        } else {
            AlertSeverity::Warning
        };

        Some(NewAlert {
            alert_type: AlertType::HighFailureRate,
            severity,
            title: format!("High failure rate: {:.0}%", rate * 100.0),
            message: format!(
                "{} of {} channels failed during the last sync",
                analysis.channels_failed, total
            ),
            data: json!({
                "user_id": analysis.user_id,
                "channels_failed": analysis.channels_failed,
                "channels_total": total,
                "failure_rate": rate,
            }),
        })
    }

    fn quota_alert(&self, quota: QuotaStatus) -> Option<NewAlert> {
        if quota.remaining <= 0 {
            return Some(NewAlert {
                alert_type: AlertType::QuotaExhausted,
                severity: AlertSeverity::Critical,
                title: "API quota exhausted".to_string(),
                message: format!(
                    "All {} daily units are spent; sync resumes after the provider reset",
                    quota.ceiling
                ),
                data: json!({ "used": quota.used, "ceiling": quota.ceiling }),
            });
        }
        if quota.percent_used >= self.quota_warning_fraction {
            return Some(NewAlert {
                alert_type: AlertType::QuotaWarning,
                severity: AlertSeverity::Warning,
                title: format!("API quota at {:.0}%", quota.percent_used * 100.0),
                message: format!("{} of {} daily units used", quota.used, quota.ceiling),
                data: json!({ "used": quota.used, "ceiling": quota.ceiling }),
            });
        }
        None
    }

    async fn raise(&self, alert: NewAlert) -> Result<Alert> {
        let stored = self.alerts.insert(alert).await?;
        info!(
            alert_id = %stored.id,
            alert_type = %stored.alert_type,
            severity = %stored.severity,
            "Alert raised"
        );

        self.event_bus
            .emit(CoreEvent::Alert(AlertEvent::Raised {
                alert_id: stored.id.clone(),
                alert_type: stored.alert_type.clone(),
                severity: stored.severity.clone(),
                title: stored.title.clone(),
            }))
            .ok();

        if let Some(webhook) = &self.webhook {
            if let Err(e) = webhook.send(&stored).await {
                warn!(alert_id = %stored.id, error = %e, "Webhook delivery failed");
            }
        }
        Ok(stored)
    }

    /// Mark an alert acknowledged
    pub async fn acknowledge(&self, alert_id: &str) -> Result<bool> {
        Ok(self.alerts.acknowledge(alert_id).await?)
    }

    /// Alerts not yet acknowledged, newest first
    pub async fn open_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.alerts.list_unacknowledged().await?)
    }
}

// =============================================================================
// Webhook sink
// =============================================================================

/// Webhook notification sink (embed-style payload)
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    fn color_for(severity: &str) -> u32 {
        match severity {
            "critical" => 0x992d22,
            "error" => 0xe74c3c,
            "warning" => 0xf39c12,
            _ => 0x3498db,
        }
    }

    /// Deliver one alert. Callers log failures; they never propagate into
    /// the sync result.
    pub async fn send(&self, alert: &Alert) -> std::result::Result<(), reqwest::Error> {
        let payload = json!({
            "embeds": [{
                "title": alert.title,
                "description": alert.message,
                "color": Self::color_for(&alert.severity),
                "fields": [
                    { "name": "Type", "value": alert.alert_type, "inline": true },
                    { "name": "Severity", "value": alert.severity, "inline": true },
                ],
            }]
        });

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
