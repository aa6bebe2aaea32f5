use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::time_util;
use crate::trading::model::account::AccountDirectory;
use crate::trading::model::daily_risk_state::DailyRiskStateEntity;
use crate::trading::model::kill_event::KillEventEntity;
use crate::trading::model::RiskStateStore;
use crate::trading::services::kill_switch_service::KillSwitchService;

/// 历史查询的最大回溯天数
const MAX_HISTORY_DAYS: i64 = 90;
const DEFAULT_HISTORY_DAYS: i64 = 30;
/// 事件查询的单页上限
const MAX_EVENT_LIMIT: i64 = 100;
const DEFAULT_EVENT_LIMIT: i64 = 10;

/// 当日风控快照, 供外部接口层展示
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RiskStatusReport {
    pub trading_date: String,
    pub mtm: f64,
    pub starting_balance: f64,
    pub loss_percent: f64,
    pub threshold: f64,
    pub kill_status: bool,
}

/// 面向外部接口层的风控门面
///
/// 路由/鉴权等都在外部, 这里只暴露核心操作: 手动熔断、
/// 快照读取、当日重置、事件与历史查询。
pub struct RiskService {
    accounts: Arc<dyn AccountDirectory>,
    store: Arc<dyn RiskStateStore>,
    kill_switch: Arc<KillSwitchService>,
}

impl RiskService {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        store: Arc<dyn RiskStateStore>,
        kill_switch: Arc<KillSwitchService>,
    ) -> Self {
        Self {
            accounts,
            store,
            kill_switch,
        }
    }

    /// 手动触发熔断, 与调度器走同一个执行器契约
    pub async fn trigger_kill_switch(&self, account_id: &str) -> Result<(), AppError> {
        info!("手动触发熔断: account_id={}", account_id);
        self.kill_switch.execute(account_id).await
    }

    /// 读取当日最新的风控快照, 当日尚无采样时返回None
    pub async fn get_latest_risk_snapshot(
        &self,
        account_id: &str,
    ) -> Result<Option<RiskStatusReport>, AppError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("账户不存在: {}", account_id)))?;

        let trading_date = time_util::trading_date_today();
        let state = self.store.find_by_day(account_id, &trading_date).await?;

        Ok(state.map(|s| RiskStatusReport {
            trading_date: s.trading_date,
            mtm: s.mtm,
            starting_balance: s.invested,
            loss_percent: s.loss_percent,
            threshold: account.risk_threshold,
            kill_status: s.kill_status,
        }))
    }

    /// 重置当日风控状态(清零指标并解除熔断标志)
    ///
    /// 只提供给外部操作入口, 核心的调度器与执行器从不调用。
    pub async fn reset_daily_state(&self, account_id: &str) -> Result<u64, AppError> {
        let trading_date = time_util::trading_date_today();
        let updated = self.store.reset_day(account_id, &trading_date).await?;
        info!(
            "重置当日风控状态: account_id={}, 受影响行数={}",
            account_id, updated
        );
        Ok(updated)
    }

    /// 最近的熔断事件
    pub async fn recent_kill_events(
        &self,
        account_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<KillEventEntity>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_EVENT_LIMIT).clamp(1, MAX_EVENT_LIMIT);
        self.store.recent_kill_events(account_id, limit).await
    }

    /// 最近N天的日内风控历史
    pub async fn risk_history(
        &self,
        account_id: &str,
        days: Option<i64>,
    ) -> Result<Vec<DailyRiskStateEntity>, AppError> {
        let days = days.unwrap_or(DEFAULT_HISTORY_DAYS).clamp(1, MAX_HISTORY_DAYS);
        let start_date = time_util::trading_date_days_ago(days);
        self.store.list_since(account_id, &start_date).await
    }
}
