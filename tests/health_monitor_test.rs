//! 健康监控循环测试
//!
//! 通过可脚本化的探测实现和暂停时钟验证重试、退避与关闭行为

use async_trait::async_trait;
use easy_mongo::error::{EasyMongoError, EasyMongoResult};
use easy_mongo::health::{
    HealthMonitorOptions, HealthProbe, HealthState, MongoHealthMonitor, RetryPolicy,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// 按脚本顺序返回结果的探测实现，脚本耗尽后恒返回成功
struct ScriptedProbe {
    script: Mutex<Vec<EasyMongoResult<()>>>,
    attempts: Mutex<Vec<Instant>>,
}

impl ScriptedProbe {
    fn new(script: Vec<EasyMongoResult<()>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            attempts: Mutex::new(Vec::new()),
        })
    }

    fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self) -> EasyMongoResult<()> {
        self.attempts.lock().push(Instant::now());
        let mut script = self.script.lock();
        if script.is_empty() {
            Ok(())
        } else {
            script.remove(0)
        }
    }
}

fn connection_error() -> EasyMongoError {
    EasyMongoError::ConnectionError {
        message: "服务器不可达".to_string(),
    }
}

fn test_options() -> HealthMonitorOptions {
    HealthMonitorOptions {
        check_interval: Duration::from_secs(30),
        attempt_timeout: Duration::from_secs(5),
        retry: RetryPolicy::standard(),
    }
}

/// 等待条件成立，暂停时钟下虚拟时间自动推进
async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("等待条件超时");
}

/// 两次连接失败后成功：周期内重试并按2秒、4秒退避
#[tokio::test(start_paused = true)]
async fn test_retry_with_exponential_backoff() {
    let probe = ScriptedProbe::new(vec![Err(connection_error()), Err(connection_error()), Ok(())]);
    let monitor = MongoHealthMonitor::new(probe.clone(), test_options());
    let status = monitor.status_handle();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(rx));

    wait_until(|| probe.attempt_count() >= 3).await;
    wait_until(|| status.is_healthy()).await;

    let times = probe.attempt_times();
    assert_eq!(times[1] - times[0], Duration::from_secs(2));
    assert_eq!(times[2] - times[1], Duration::from_secs(4));

    let snapshot = status.current();
    assert_eq!(snapshot.state, HealthState::Healthy);
    assert_eq!(snapshot.consecutive_failures, 0);
    assert!(snapshot.last_error.is_none());

    tx.send(true).unwrap();
    handle.await.unwrap();
}

/// 重试耗尽：记录失败后循环继续，下个周期照常探测
#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_do_not_kill_loop() {
    let probe = ScriptedProbe::new(vec![
        Err(connection_error()),
        Err(connection_error()),
        Err(connection_error()),
    ]);
    let monitor = MongoHealthMonitor::new(probe.clone(), test_options());
    let status = monitor.status_handle();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(rx));

    // 一个周期内正好3次尝试，之后进入失败状态
    wait_until(|| probe.attempt_count() >= 3).await;
    wait_until(|| status.current().state == HealthState::Unhealthy).await;

    let snapshot = status.current();
    assert_eq!(snapshot.consecutive_failures, 1);
    assert!(snapshot.last_error.is_some());

    // 循环没有退出：30秒后开始下一个探测周期
    wait_until(|| probe.attempt_count() >= 4).await;
    wait_until(|| status.is_healthy()).await;

    tx.send(true).unwrap();
    handle.await.unwrap();
}

/// 非瞬时错误不重试：一次尝试后直接进入失败状态
#[tokio::test(start_paused = true)]
async fn test_non_transient_error_skips_retry() {
    let probe = ScriptedProbe::new(vec![Err(EasyMongoError::QueryError {
        message: "命令被拒绝".to_string(),
    })]);
    let monitor = MongoHealthMonitor::new(probe.clone(), test_options());
    let status = monitor.status_handle();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(rx));

    wait_until(|| status.current().state == HealthState::Unhealthy).await;
    assert_eq!(probe.attempt_count(), 1);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

/// 探测超时按瞬时故障处理并触发重试
#[tokio::test(start_paused = true)]
async fn test_probe_timeout_is_retried() {
    struct StallingProbe {
        attempts: Mutex<u32>,
    }

    #[async_trait]
    impl HealthProbe for StallingProbe {
        async fn probe(&self) -> EasyMongoResult<()> {
            let attempt = {
                let mut attempts = self.attempts.lock();
                *attempts += 1;
                *attempts
            };
            if attempt == 1 {
                // 第一次探测永不返回，由单次超时兜底
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    let probe = Arc::new(StallingProbe {
        attempts: Mutex::new(0),
    });
    let monitor = MongoHealthMonitor::new(probe.clone(), test_options());
    let status = monitor.status_handle();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(rx));

    wait_until(|| status.is_healthy()).await;
    assert_eq!(*probe.attempts.lock(), 2);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

/// 关闭信号在周期间隔中被及时响应
#[tokio::test(start_paused = true)]
async fn test_shutdown_during_interval_sleep() {
    let probe = ScriptedProbe::new(vec![Ok(())]);
    let monitor = MongoHealthMonitor::new(probe.clone(), test_options());
    let status = monitor.status_handle();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(rx));

    wait_until(|| status.is_healthy()).await;

    tx.send(true).unwrap();
    handle.await.unwrap();

    // 关闭后不再产生新的探测
    let attempts_at_shutdown = probe.attempt_count();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(probe.attempt_count(), attempts_at_shutdown);
}

/// 关闭信号在退避等待中被及时响应
#[tokio::test(start_paused = true)]
async fn test_shutdown_during_backoff_sleep() {
    let probe = ScriptedProbe::new(vec![Err(connection_error()), Err(connection_error())]);
    let monitor = MongoHealthMonitor::new(probe.clone(), test_options());

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(rx));

    // 等到第一次失败进入退避
    wait_until(|| probe.attempt_count() >= 1).await;

    tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(probe.attempt_count() < 3);
}
