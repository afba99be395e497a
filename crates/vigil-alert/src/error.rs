use thiserror::Error;

/// 告警引擎错误类型
#[derive(Error, Debug)]
pub enum AlertError {
    /// 规则配置不合法（添加/更新时拒绝）
    #[error("Invalid rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },

    /// 规则已存在
    #[error("Rule already exists: {0}")]
    DuplicateRule(String),

    /// 指标数据源错误
    #[error("Metrics provider error: {0}")]
    Provider(String),

    /// HTTP 错误
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 指标注册错误
    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// 告警引擎结果类型
pub type Result<T> = std::result::Result<T, AlertError>;

impl AlertError {
    /// 创建规则校验错误
    pub fn invalid_rule(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        AlertError::InvalidRule {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    /// 创建数据源错误
    pub fn provider(msg: impl Into<String>) -> Self {
        AlertError::Provider(msg.into())
    }
}
