//! 连接健康监控模块
//!
//! 后台循环周期性探测MongoDB连通性：每个周期内按指数退避重试，
//! 重试耗尽只记录日志，循环继续运行，从不因探测失败退出

use crate::connection::MongoConnection;
use crate::error::{EasyMongoError, EasyMongoResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rat_logger::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// 重试策略
///
/// 第 `attempt` 次重试前的等待时间为 `base_delay * multiplier^attempt`，
/// 上限为 `max_delay`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 每个探测周期内的最大尝试次数
    pub max_attempts: u32,
    /// 退避基准时长
    pub base_delay: Duration,
    /// 退避倍率
    pub multiplier: f64,
    /// 单次退避的上限
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// 创建重试策略
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier,
            max_delay,
        }
    }

    /// 标准策略：3次尝试，退避2秒、4秒
    pub fn standard() -> Self {
        Self::new(3, Duration::from_secs(1), 2.0, Duration::from_secs(30))
    }

    /// 计算第 `attempt` 次重试前的退避时长
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let delay = self.base_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }
}

/// 健康状态分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthState {
    /// 尚未完成任何探测
    Unknown,
    /// 最近一次探测成功
    Healthy,
    /// 最近一次探测周期重试耗尽仍失败
    Unhealthy,
}

/// 健康状态快照
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// 状态分类
    pub state: HealthState,
    /// 最近一次探测完成的时间
    pub last_checked: Option<DateTime<Utc>>,
    /// 连续失败的探测周期数
    pub consecutive_failures: u32,
    /// 最近一次失败的错误描述
    pub last_error: Option<String>,
}

impl HealthStatus {
    fn unknown() -> Self {
        Self {
            state: HealthState::Unknown,
            last_checked: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    /// 判断当前是否健康
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

/// 健康状态的只读句柄，可廉价克隆后分发给调用方
#[derive(Debug, Clone)]
pub struct HealthStatusHandle {
    inner: Arc<RwLock<HealthStatus>>,
}

impl HealthStatusHandle {
    /// 读取当前状态快照
    pub fn current(&self) -> HealthStatus {
        self.inner.read().clone()
    }

    /// 判断当前是否健康
    pub fn is_healthy(&self) -> bool {
        self.inner.read().is_healthy()
    }
}

/// 健康探测接口
///
/// 生产实现向服务器发送ping命令；测试可注入可控的探测实现
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// 执行一次探测，成功返回Ok
    async fn probe(&self) -> EasyMongoResult<()>;
}

/// 基于ping命令的探测实现
pub struct PingProbe {
    connection: MongoConnection,
}

impl PingProbe {
    /// 在指定连接上创建探测器
    pub fn new(connection: MongoConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl HealthProbe for PingProbe {
    async fn probe(&self) -> EasyMongoResult<()> {
        self.connection.ping().await
    }
}

/// 健康监控选项
#[derive(Debug, Clone)]
pub struct HealthMonitorOptions {
    /// 两个探测周期之间的间隔
    pub check_interval: Duration,
    /// 单次探测尝试的超时时间
    pub attempt_timeout: Duration,
    /// 周期内的重试策略
    pub retry: RetryPolicy,
}

impl HealthMonitorOptions {
    /// 标准选项：30秒间隔，10秒单次超时，标准重试策略
    pub fn standard() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(10),
            retry: RetryPolicy::standard(),
        }
    }
}

/// MongoDB健康监控器
///
/// 探测周期严格串行：任意时刻至多一个探测在途
pub struct MongoHealthMonitor {
    probe: Arc<dyn HealthProbe>,
    options: HealthMonitorOptions,
    status: Arc<RwLock<HealthStatus>>,
}

impl MongoHealthMonitor {
    /// 使用自定义探测实现创建监控器
    pub fn new(probe: Arc<dyn HealthProbe>, options: HealthMonitorOptions) -> Self {
        Self {
            probe,
            options,
            status: Arc::new(RwLock::new(HealthStatus::unknown())),
        }
    }

    /// 在指定连接上创建使用ping探测的监控器
    pub fn for_connection(connection: MongoConnection, options: HealthMonitorOptions) -> Self {
        Self::new(Arc::new(PingProbe::new(connection)), options)
    }

    /// 获取状态句柄
    pub fn status_handle(&self) -> HealthStatusHandle {
        HealthStatusHandle {
            inner: Arc::clone(&self.status),
        }
    }

    /// 运行监控循环，直到收到关闭信号
    ///
    /// 关闭信号在退避等待、探测尝试和周期间隔三处都会被响应
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "健康监控启动: interval={:?} attempts={}",
            self.options.check_interval, self.options.retry.max_attempts
        );

        loop {
            if self.check_cycle(&mut shutdown).await.is_none() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.check_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("健康监控已停止");
    }

    /// 执行一个探测周期
    ///
    /// 返回None表示收到了关闭信号
    async fn check_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> Option<()> {
        let max_attempts = self.options.retry.max_attempts.max(1);
        let mut last_error: Option<EasyMongoError> = None;

        for attempt in 0..max_attempts {
            let outcome = tokio::select! {
                result = tokio::time::timeout(self.options.attempt_timeout, self.probe.probe()) => result,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return None;
                    }
                    continue;
                }
            };

            let error = match outcome {
                Ok(Ok(())) => {
                    self.record_success();
                    return Some(());
                }
                Ok(Err(e)) => e,
                Err(_) => EasyMongoError::TimeoutError {
                    message: format!("探测超过 {:?} 未响应", self.options.attempt_timeout),
                },
            };

            warn!(
                "健康探测失败 (第{}/{}次): {}",
                attempt + 1,
                max_attempts,
                error
            );

            // 只有连接类和超时类错误值得重试
            if !error.is_transient() || attempt + 1 >= max_attempts {
                last_error = Some(error);
                break;
            }

            let delay = self.options.retry.delay(attempt + 1);
            debug!("健康探测退避 {:?} 后重试", delay);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return None;
                    }
                }
            }

            last_error = Some(error);
        }

        self.record_failure(last_error);
        Some(())
    }

    fn record_success(&self) {
        let mut status = self.status.write();
        if status.state != HealthState::Healthy {
            info!("MongoDB连接恢复健康");
        }
        status.state = HealthState::Healthy;
        status.last_checked = Some(Utc::now());
        status.consecutive_failures = 0;
        status.last_error = None;
    }

    fn record_failure(&self, error: Option<EasyMongoError>) {
        let message = error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "未知错误".to_string());

        let mut status = self.status.write();
        status.state = HealthState::Unhealthy;
        status.last_checked = Some(Utc::now());
        status.consecutive_failures += 1;
        status.last_error = Some(message.clone());

        error!(
            "健康探测周期失败 (连续第{}次): {}",
            status.consecutive_failures, message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_policy_delays() {
        let policy = RetryPolicy::standard();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), 2.0, Duration::from_secs(5));
        assert_eq!(policy.delay(8), Duration::from_secs(5));
    }

    #[test]
    fn test_initial_status_unknown() {
        let status = HealthStatus::unknown();
        assert_eq!(status.state, HealthState::Unknown);
        assert!(!status.is_healthy());
        assert!(status.last_checked.is_none());
    }
}
