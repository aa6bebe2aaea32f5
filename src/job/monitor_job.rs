use std::cmp;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::job::warning_throttle::WarningThrottle;
use crate::time_util;
use crate::trading::dhan::BrokerFactory;
use crate::trading::model::account::AccountDirectory;
use crate::trading::model::RiskStateStore;
use crate::trading::services::kill_switch_service::KillSwitchService;
use crate::trading::services::risk_evaluator::{self, RiskVerdict};

/// 目标周期间隔, 从周期开始到下个周期开始
const MONITOR_INTERVAL_MS: u64 = 500;
/// 周期超时后的最小休眠, 防止空转
const MIN_INTERVAL_MS: u64 = 100;
/// 单周期内账户评估的并发上限
const MAX_CONCURRENT_ACCOUNTS: usize = 16;
/// 凭证失效告警的冷却时间
const WARNING_COOLDOWN_SECS: u64 = 5 * 60;

/// 调度器状态机: 未启动 -> 运行中 -> 已停止(可重新启动)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Stopped,
}

/// 下个周期前的休眠时长: max(目标间隔 - 本周期耗时, 下限)
pub fn next_cycle_delay(elapsed: Duration, target_ms: u64, floor_ms: u64) -> Duration {
    let target = Duration::from_millis(target_ms);
    let floor = Duration::from_millis(floor_ms);
    if elapsed >= target {
        floor
    } else {
        cmp::max(target - elapsed, floor)
    }
}

/// 循环任务共享的内部状态, 由调度循环与外部start/stop共同持有
struct MonitorInner {
    accounts: Arc<dyn AccountDirectory>,
    broker: Arc<dyn BrokerFactory>,
    store: Arc<dyn RiskStateStore>,
    kill_switch: Arc<KillSwitchService>,
    throttle: WarningThrottle,
    state: Mutex<MonitorState>,
    shutdown_sender: broadcast::Sender<()>,
}

/// 风控监控调度器
///
/// 单条自调速的顺序循环: 每个周期枚举可监控账户并发评估,
/// 全部结算后才计算下一次休眠, 周期之间从不重叠。
/// 单账户的任何故障都被隔离在该账户的评估内。
pub struct RiskMonitorJob {
    inner: Arc<MonitorInner>,
    interval_ms: u64,
    min_interval_ms: u64,
}

impl RiskMonitorJob {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        broker: Arc<dyn BrokerFactory>,
        store: Arc<dyn RiskStateStore>,
        kill_switch: Arc<KillSwitchService>,
    ) -> Self {
        let (shutdown_sender, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(MonitorInner {
                accounts,
                broker,
                store,
                kill_switch,
                throttle: WarningThrottle::new(Duration::from_secs(WARNING_COOLDOWN_SECS)),
                state: Mutex::new(MonitorState::Idle),
                shutdown_sender,
            }),
            interval_ms: MONITOR_INTERVAL_MS,
            min_interval_ms: MIN_INTERVAL_MS,
        }
    }

    /// 自定义周期参数, 测试用
    pub fn with_pacing(mut self, interval_ms: u64, min_interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self.min_interval_ms = min_interval_ms;
        self
    }

    pub fn current_state(&self) -> MonitorState {
        self.inner.current_state()
    }

    /// 启动监控; 已在运行时为空操作, 停止后可再次启动
    pub fn start(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state == MonitorState::Running {
                info!("[Monitor] 已在运行中");
                return;
            }
            *state = MonitorState::Running;
        }
        info!("[Monitor] 启动, 目标周期{}ms", self.interval_ms);

        let inner = Arc::clone(&self.inner);
        let mut shutdown_receiver = self.inner.shutdown_sender.subscribe();
        let interval_ms = self.interval_ms;
        let min_interval_ms = self.min_interval_ms;
        tokio::spawn(async move {
            loop {
                let cycle_start = Instant::now();
                inner.run_cycle().await;

                // stop只阻止后继周期, 在途周期照常完成
                if inner.current_state() != MonitorState::Running {
                    break;
                }
                let delay = next_cycle_delay(cycle_start.elapsed(), interval_ms, min_interval_ms);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_receiver.recv() => break,
                }
                if inner.current_state() != MonitorState::Running {
                    break;
                }
            }
            info!("[Monitor] 监控循环退出");
        });
    }

    /// 停止监控: 在途周期完成后不再调度后继周期
    pub fn stop(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if *state != MonitorState::Running {
            return;
        }
        *state = MonitorState::Stopped;
        let _ = self.inner.shutdown_sender.send(());
        info!("[Monitor] 停止");
    }
}

impl MonitorInner {
    fn current_state(&self) -> MonitorState {
        *self.state.lock().unwrap()
    }

    async fn run_cycle(&self) {
        let account_ids = match self.accounts.list_monitorable().await {
            Ok(ids) => ids,
            Err(err) => {
                error!("[Monitor] 枚举可监控账户失败: {}", err);
                return;
            }
        };
        if account_ids.is_empty() {
            return;
        }

        stream::iter(account_ids)
            .for_each_concurrent(MAX_CONCURRENT_ACCOUNTS, |account_id| async move {
                self.monitor_account(&account_id).await;
            })
            .await;
    }

    /// 单账户评估, 错误按类别消化, 绝不向周期外传播
    async fn monitor_account(&self, account_id: &str) {
        if let Err(err) = self.check_account(account_id).await {
            match err {
                // 未配置/账户消失是稳态条件, 不是事故
                AppError::Config(msg) => {
                    debug!("[Monitor] 账户{}未配置, 跳过: {}", account_id, msg);
                }
                AppError::NotFound(msg) => {
                    debug!("[Monitor] 账户{}不存在, 跳过: {}", account_id, msg);
                }
                // 凭证失效额外做限频告警
                AppError::Auth(msg) => {
                    if self.throttle.should_warn(account_id) {
                        warn!("[Monitor] 账户{}凭证失效, 已暂停保护: {}", account_id, msg);
                    }
                }
                // 另一个执行者已持锁, 等价于成功
                AppError::LockConflict(msg) => {
                    info!("[Monitor] 账户{}熔断已在执行中: {}", account_id, msg);
                }
                AppError::PostKillPersist(msg) => {
                    error!(
                        "[Monitor] 账户{}熔断已生效但落库不完整, 需要人工核对: {}",
                        account_id, msg
                    );
                }
                other => {
                    error!("[Monitor] 账户{}本周期评估失败: {}", account_id, other);
                }
            }
        }
    }

    async fn check_account(&self, account_id: &str) -> Result<(), AppError> {
        let account = match self.accounts.find_by_id(account_id).await? {
            Some(account) => account,
            None => return Ok(()),
        };
        if !account.kill_switch_enabled || !account.has_credential() {
            return Ok(());
        }

        let broker = self.broker.client_for(account_id).await?;
        let (positions, starting_balance) =
            tokio::try_join!(broker.get_positions(), broker.get_sod_limit())?;

        let snapshot =
            risk_evaluator::evaluate(&positions, starting_balance, account.risk_threshold);

        // 无论判定结果如何都落最新采样, 历史反映的是最近状态而非只有触发点
        let trading_date = time_util::trading_date_today();
        let daily_state = self
            .store
            .upsert_metrics(
                account_id,
                &trading_date,
                snapshot.mtm,
                starting_balance,
                snapshot.loss_percent,
            )
            .await?;

        // 当日已熔断则不再触发, 与执行器内的锁互为补充
        if snapshot.verdict == RiskVerdict::Trigger && !daily_state.kill_status {
            info!(
                "[Monitor] 账户{}触发熔断: mtm={:.2}, loss={:.2}%, threshold={:.2}%",
                account_id, snapshot.mtm, snapshot.loss_percent, account.risk_threshold
            );
            self.kill_switch.execute(account_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_full_interval_when_cycle_fast() {
        let delay = next_cycle_delay(Duration::from_millis(0), 500, 100);
        assert_eq!(delay, Duration::from_millis(500));
    }

    #[test]
    fn test_delay_shrinks_with_elapsed() {
        let delay = next_cycle_delay(Duration::from_millis(350), 500, 100);
        assert_eq!(delay, Duration::from_millis(150));
    }

    #[test]
    fn test_delay_floor_on_overrun() {
        let delay = next_cycle_delay(Duration::from_millis(2000), 500, 100);
        assert_eq!(delay, Duration::from_millis(100));
    }

    #[test]
    fn test_delay_floor_near_target() {
        let delay = next_cycle_delay(Duration::from_millis(450), 500, 100);
        assert_eq!(delay, Duration::from_millis(100));
    }
}
