use rbatis::rbdc::DateTime;
use rbatis::RBatis;
use serde::{Deserialize, Serialize};

use crate::app_config::db;
use crate::error::AppError;

/// 日内风控状态, (account_id, trading_date)唯一
///
/// 每个监控周期更新最新的MTM采样; kill_status 只由熔断执行器置位,
/// 只由外部的重置操作清除, 调度器从不改写它。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DailyRiskStateEntity {
    pub id: Option<u64>,
    pub account_id: String,
    /// 交易日(交易所当地日期, YYYY-MM-DD)
    pub trading_date: String,
    /// 日内盯市盈亏
    pub mtm: f64,
    /// 日初可用资金
    pub invested: f64,
    pub loss_percent: f64,
    /// 当日是否已触发熔断
    pub kill_status: bool,
    pub updated_at: Option<DateTime>,
}

crud!(DailyRiskStateEntity {}, "daily_risk_state");
impl_select!(DailyRiskStateEntity{select_by_day(account_id:&str,trading_date:&str) -> Option => "`where account_id = #{account_id} and trading_date = #{trading_date} limit 1`"},"daily_risk_state");
impl_select!(DailyRiskStateEntity{select_since(account_id:&str,start_date:&str) => "`where account_id = #{account_id} and trading_date >= #{start_date} order by trading_date asc`"},"daily_risk_state");
impl_update!(DailyRiskStateEntity{update_by_day(account_id:&str,trading_date:&str) => "`where account_id = #{account_id} and trading_date = #{trading_date}`"},"daily_risk_state");

pub struct DailyRiskStateModel {
    db: RBatis,
}

impl DailyRiskStateModel {
    pub fn new() -> Self {
        Self {
            db: db::get_db_client().clone(),
        }
    }

    pub async fn find_by_day(
        &self,
        account_id: &str,
        trading_date: &str,
    ) -> Result<Option<DailyRiskStateEntity>, AppError> {
        let state =
            DailyRiskStateEntity::select_by_day(&self.db, account_id, trading_date).await?;
        Ok(state)
    }

    /// 写入当日最新采样, 不存在则创建
    ///
    /// 不改写 kill_status, 返回的行反映落库后的真实熔断标志,
    /// 调度器以此作为当日是否已熔断的判断依据。
    pub async fn upsert_metrics(
        &self,
        account_id: &str,
        trading_date: &str,
        mtm: f64,
        invested: f64,
        loss_percent: f64,
    ) -> Result<DailyRiskStateEntity, AppError> {
        match self.find_by_day(account_id, trading_date).await? {
            Some(mut state) => {
                state.mtm = mtm;
                state.invested = invested;
                state.loss_percent = loss_percent;
                state.updated_at = Some(DateTime::now());
                DailyRiskStateEntity::update_by_day(&self.db, &state, account_id, trading_date)
                    .await?;
                Ok(state)
            }
            None => {
                let state = DailyRiskStateEntity {
                    id: None,
                    account_id: account_id.to_string(),
                    trading_date: trading_date.to_string(),
                    mtm,
                    invested,
                    loss_percent,
                    kill_status: false,
                    updated_at: Some(DateTime::now()),
                };
                DailyRiskStateEntity::insert(&self.db, &state).await?;
                Ok(state)
            }
        }
    }

    /// 熔断执行器专用: 置位 kill_status 并写入最终的触发数据
    pub async fn mark_killed(
        &self,
        account_id: &str,
        trading_date: &str,
        mtm: f64,
        invested: f64,
        loss_percent: f64,
    ) -> Result<(), AppError> {
        match self.find_by_day(account_id, trading_date).await? {
            Some(mut state) => {
                state.mtm = mtm;
                state.invested = invested;
                state.loss_percent = loss_percent;
                state.kill_status = true;
                state.updated_at = Some(DateTime::now());
                DailyRiskStateEntity::update_by_day(&self.db, &state, account_id, trading_date)
                    .await?;
            }
            None => {
                let state = DailyRiskStateEntity {
                    id: None,
                    account_id: account_id.to_string(),
                    trading_date: trading_date.to_string(),
                    mtm,
                    invested,
                    loss_percent,
                    kill_status: true,
                    updated_at: Some(DateTime::now()),
                };
                DailyRiskStateEntity::insert(&self.db, &state).await?;
            }
        }
        Ok(())
    }

    /// 外部重置操作: 清零当日指标并解除熔断标志, 核心自身不调用
    pub async fn reset_day(
        &self,
        account_id: &str,
        trading_date: &str,
    ) -> Result<u64, AppError> {
        match self.find_by_day(account_id, trading_date).await? {
            Some(mut state) => {
                state.mtm = 0.0;
                state.invested = 0.0;
                state.loss_percent = 0.0;
                state.kill_status = false;
                state.updated_at = Some(DateTime::now());
                DailyRiskStateEntity::update_by_day(&self.db, &state, account_id, trading_date)
                    .await?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// 历史查询, 供外部接口层展示
    pub async fn list_since(
        &self,
        account_id: &str,
        start_date: &str,
    ) -> Result<Vec<DailyRiskStateEntity>, AppError> {
        let list = DailyRiskStateEntity::select_since(&self.db, account_id, start_date).await?;
        Ok(list)
    }
}

impl Default for DailyRiskStateModel {
    fn default() -> Self {
        Self::new()
    }
}
