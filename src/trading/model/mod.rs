pub mod account;
pub mod daily_risk_state;
pub mod kill_event;

use async_trait::async_trait;

use crate::error::AppError;
use self::daily_risk_state::{DailyRiskStateEntity, DailyRiskStateModel};
use self::kill_event::{KillEventEntity, KillEventModel};

/// 持久化接口: 日内风控状态 + 熔断事件账本
///
/// 执行器与调度器只依赖这层抽象, 便于在无数据库环境下验证
/// 幂等与并发语义。
#[async_trait]
pub trait RiskStateStore: Send + Sync {
    async fn find_by_day(
        &self,
        account_id: &str,
        trading_date: &str,
    ) -> Result<Option<DailyRiskStateEntity>, AppError>;

    /// 写入最新采样, 保留已有的 kill_status, 返回落库后的行
    async fn upsert_metrics(
        &self,
        account_id: &str,
        trading_date: &str,
        mtm: f64,
        invested: f64,
        loss_percent: f64,
    ) -> Result<DailyRiskStateEntity, AppError>;

    /// 置位 kill_status 并写入最终触发数据
    async fn mark_killed(
        &self,
        account_id: &str,
        trading_date: &str,
        mtm: f64,
        invested: f64,
        loss_percent: f64,
    ) -> Result<(), AppError>;

    /// 追加一条熔断事件
    async fn append_kill_event(&self, event: &KillEventEntity) -> Result<(), AppError>;

    /// 外部重置: 清零当日指标并解除熔断标志, 返回受影响行数
    async fn reset_day(&self, account_id: &str, trading_date: &str) -> Result<u64, AppError>;

    async fn list_since(
        &self,
        account_id: &str,
        start_date: &str,
    ) -> Result<Vec<DailyRiskStateEntity>, AppError>;

    async fn recent_kill_events(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<KillEventEntity>, AppError>;
}

/// MySQL实现
pub struct DbRiskStateStore {
    daily_state: DailyRiskStateModel,
    kill_events: KillEventModel,
}

impl DbRiskStateStore {
    pub fn new() -> Self {
        Self {
            daily_state: DailyRiskStateModel::new(),
            kill_events: KillEventModel::new(),
        }
    }
}

impl Default for DbRiskStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RiskStateStore for DbRiskStateStore {
    async fn find_by_day(
        &self,
        account_id: &str,
        trading_date: &str,
    ) -> Result<Option<DailyRiskStateEntity>, AppError> {
        self.daily_state.find_by_day(account_id, trading_date).await
    }

    async fn upsert_metrics(
        &self,
        account_id: &str,
        trading_date: &str,
        mtm: f64,
        invested: f64,
        loss_percent: f64,
    ) -> Result<DailyRiskStateEntity, AppError> {
        self.daily_state
            .upsert_metrics(account_id, trading_date, mtm, invested, loss_percent)
            .await
    }

    async fn mark_killed(
        &self,
        account_id: &str,
        trading_date: &str,
        mtm: f64,
        invested: f64,
        loss_percent: f64,
    ) -> Result<(), AppError> {
        self.daily_state
            .mark_killed(account_id, trading_date, mtm, invested, loss_percent)
            .await
    }

    async fn append_kill_event(&self, event: &KillEventEntity) -> Result<(), AppError> {
        self.kill_events.append(event).await
    }

    async fn reset_day(&self, account_id: &str, trading_date: &str) -> Result<u64, AppError> {
        self.daily_state.reset_day(account_id, trading_date).await
    }

    async fn list_since(
        &self,
        account_id: &str,
        start_date: &str,
    ) -> Result<Vec<DailyRiskStateEntity>, AppError> {
        self.daily_state.list_since(account_id, start_date).await
    }

    async fn recent_kill_events(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<KillEventEntity>, AppError> {
        self.kill_events.list_recent(account_id, limit).await
    }
}
