//! 日志系统配置模块
//! 支持结构化日志（JSON）与文本日志，RUST_LOG 优先于配置的级别

use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;

/// 初始化日志系统
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    // 设置日志级别过滤器
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // 根据配置选择日志格式
    if config.format == "json" {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .try_init()?;
    } else {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_target(false)
                    .with_ansi(true),
            )
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "text".to_string(),
        };

        // 第一次可能因其他测试已初始化而失败，两次都不能 panic
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
