//! 日志订阅器初始化。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// `RUST_LOG` 未设置或无效时使用的默认过滤规则。
const DEFAULT_FILTER: &str = "info,tower_http=info";

/// 安装全局日志订阅器，`RUST_LOG` 可覆盖默认过滤规则。
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
