use crate::error::{AlertError, Result};
use crate::snapshot::{BusinessSnapshot, PerformanceSnapshot};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 性能指标数据源
#[async_trait]
pub trait PerformanceMetricsProvider: Send + Sync {
    async fn snapshot(&self) -> Result<PerformanceSnapshot>;
}

/// 业务指标数据源
#[async_trait]
pub trait BusinessMetricsProvider: Send + Sync {
    async fn snapshot(&self) -> Result<BusinessSnapshot>;
}

/// 内存数据源，快照由调用方设置
#[derive(Default)]
pub struct StaticMetricsProvider {
    performance: RwLock<PerformanceSnapshot>,
    business: RwLock<BusinessSnapshot>,
}

impl StaticMetricsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_performance(&self, snapshot: PerformanceSnapshot) {
        *self.performance.write().await = snapshot;
    }

    pub async fn set_business(&self, snapshot: BusinessSnapshot) {
        *self.business.write().await = snapshot;
    }
}

#[async_trait]
impl PerformanceMetricsProvider for StaticMetricsProvider {
    async fn snapshot(&self) -> Result<PerformanceSnapshot> {
        Ok(self.performance.read().await.clone())
    }
}

#[async_trait]
impl BusinessMetricsProvider for StaticMetricsProvider {
    async fn snapshot(&self) -> Result<BusinessSnapshot> {
        Ok(self.business.read().await.clone())
    }
}

/// HTTP 数据源：GET 一个返回 JSON 的地址
pub struct HttpMetricsProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpMetricsProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<serde_json::Value> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, status = %status, "Metrics endpoint returned error status");
            return Err(AlertError::provider(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        let body = response.json::<serde_json::Value>().await?;
        debug!(url = %self.url, "Metrics snapshot fetched");
        Ok(body)
    }
}

#[async_trait]
impl PerformanceMetricsProvider for HttpMetricsProvider {
    async fn snapshot(&self) -> Result<PerformanceSnapshot> {
        let body = self.fetch().await?;
        if !body.is_object() {
            return Err(AlertError::provider(format!(
                "{} did not return a JSON object",
                self.url
            )));
        }
        Ok(PerformanceSnapshot::from_json(&body))
    }
}

#[async_trait]
impl BusinessMetricsProvider for HttpMetricsProvider {
    async fn snapshot(&self) -> Result<BusinessSnapshot> {
        Ok(BusinessSnapshot::new(self.fetch().await?))
    }
}
