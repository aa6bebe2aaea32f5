use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::app_config::redis::kill_lock_key;
use crate::error::AppError;
use crate::time_util;
use crate::trading::dhan::dto::{
    CloseOrderRequest, OrderType, Position, TransactionType, Validity, DRV_EXPIRY_SENTINEL,
    DRV_OPTION_SENTINEL,
};
use crate::trading::dhan::{BrokerApi, BrokerFactory};
use crate::trading::lock::kill_lock::LockProvider;
use crate::trading::model::kill_event::KillEventEntity;
use crate::trading::model::RiskStateStore;
use crate::trading::services::risk_evaluator::{self, is_day_tradeable};

/// 熔断互斥锁TTL: 持有者崩溃后锁在此时限内自愈
const KILL_LOCK_TTL_SECS: u64 = 30;
/// 平仓订单的串行提交间隔, 尊重券商侧限频
const ORDER_PACING_MS: u64 = 500;
/// 平仓后到激活禁止交易开关之间的等待, 给券商处理平仓的时间
const SETTLE_DELAY_MS: u64 = 2000;

/// 根据持仓构造反向市价平仓单; 隔夜仓、无类型仓和零持仓不平
///
/// 衍生品字段只在非哨兵值时携带, 期权类型存在时行权价一并带上。
pub fn build_close_order(position: &Position, fallback_client_id: &str) -> Option<CloseOrderRequest> {
    if !is_day_tradeable(position) {
        return None;
    }
    if position.net_qty == 0 {
        return None;
    }

    let transaction_type = if position.net_qty > 0 {
        TransactionType::SELL
    } else {
        TransactionType::BUY
    };

    let dhan_client_id = if position.dhan_client_id.is_empty() {
        fallback_client_id.to_string()
    } else {
        position.dhan_client_id.clone()
    };

    let mut order = CloseOrderRequest {
        dhan_client_id,
        transaction_type: transaction_type.to_string(),
        exchange_segment: position.exchange_segment.clone(),
        product_type: position.product_type.clone(),
        order_type: OrderType::MARKET.to_string(),
        validity: Validity::DAY.to_string(),
        trading_symbol: position.trading_symbol.clone(),
        security_id: position.security_id.clone(),
        quantity: position.net_qty.abs(),
        drv_expiry_date: None,
        drv_option_type: None,
        drv_strike_price: None,
    };

    if !position.drv_expiry_date.is_empty() && position.drv_expiry_date != DRV_EXPIRY_SENTINEL {
        order.drv_expiry_date = Some(position.drv_expiry_date.clone());
    }
    if !position.drv_option_type.is_empty() && position.drv_option_type != DRV_OPTION_SENTINEL {
        order.drv_option_type = Some(position.drv_option_type.clone());
        order.drv_strike_price = Some(position.drv_strike_price);
    }

    Some(order)
}

/// 熔断执行器: 平掉全部日内仓位并在券商侧禁止后续交易
///
/// 幂等性由两层保证: 账户级互斥锁挡住并发执行, 落库后的
/// kill_status 挡住后续周期的重复触发。
pub struct KillSwitchService {
    broker: Arc<dyn BrokerFactory>,
    store: Arc<dyn RiskStateStore>,
    lock: Arc<dyn LockProvider>,
    order_pacing: Duration,
    settle_delay: Duration,
}

impl KillSwitchService {
    pub fn new(
        broker: Arc<dyn BrokerFactory>,
        store: Arc<dyn RiskStateStore>,
        lock: Arc<dyn LockProvider>,
    ) -> Self {
        Self {
            broker,
            store,
            lock,
            order_pacing: Duration::from_millis(ORDER_PACING_MS),
            settle_delay: Duration::from_millis(SETTLE_DELAY_MS),
        }
    }

    /// 自定义延迟, 测试用
    pub fn with_pacing(mut self, order_pacing: Duration, settle_delay: Duration) -> Self {
        self.order_pacing = order_pacing;
        self.settle_delay = settle_delay;
        self
    }

    /// 执行熔断
    ///
    /// 锁获取失败返回 LockConflict, 调用方视为"已有执行在途",
    /// 本周期内不重试。锁在执行结束后无条件释放, 无论成败。
    pub async fn execute(&self, account_id: &str) -> Result<(), AppError> {
        let lock_key = kill_lock_key(account_id);
        if !self.lock.acquire(&lock_key, KILL_LOCK_TTL_SECS).await? {
            return Err(AppError::LockConflict(format!(
                "账户{}的熔断已在执行中",
                account_id
            )));
        }

        let result = self.execute_locked(account_id).await;

        if let Err(err) = self.lock.release(&lock_key).await {
            warn!("释放熔断锁失败, 等待TTL自愈: {}: {}", lock_key, err);
        }
        result
    }

    async fn execute_locked(&self, account_id: &str) -> Result<(), AppError> {
        info!("开始执行熔断: account_id={}", account_id);
        let broker = self.broker.client_for(account_id).await?;

        self.close_all_positions(broker.as_ref()).await?;

        // 等待券商处理完平仓, 再上硬开关
        tokio::time::sleep(self.settle_delay).await;
        broker.activate_kill_switch().await?;

        // 以熔断后重新拉取的快照作为最终触发数据
        let (positions, starting_balance) =
            tokio::try_join!(broker.get_positions(), broker.get_sod_limit())?;
        let mtm = risk_evaluator::calculate_mtm(&positions);
        let loss_percent = risk_evaluator::loss_percent(mtm, starting_balance);
        let trading_date = time_util::trading_date_today();

        // 禁止交易已在券商侧生效: 此后的落库失败单独归类上报
        self.store
            .mark_killed(account_id, &trading_date, mtm, starting_balance, loss_percent)
            .await
            .map_err(|e| {
                error!("熔断已生效但日内状态落库失败: {}: {}", account_id, e);
                AppError::PostKillPersist(format!("日内风控状态写入失败: {}", e))
            })?;

        let event = KillEventEntity::new(account_id, mtm, loss_percent);
        self.store.append_kill_event(&event).await.map_err(|e| {
            error!("熔断已生效但事件写入失败: {}: {}", account_id, e);
            AppError::PostKillPersist(format!("熔断事件写入失败: {}", e))
        })?;

        info!(
            "熔断执行完成: account_id={}, mtm={:.2}, loss_percent={:.2}%",
            account_id, mtm, loss_percent
        );
        Ok(())
    }

    /// 串行平掉全部日内仓位
    ///
    /// 不做并发: 券商侧的成交顺序和限频都依赖串行提交。
    async fn close_all_positions(&self, broker: &dyn BrokerApi) -> Result<(), AppError> {
        let positions = broker.get_positions().await?;

        let orders: Vec<CloseOrderRequest> = positions
            .iter()
            .filter_map(|p| build_close_order(p, broker.client_id()))
            .collect();

        info!("待平仓数量: {}", orders.len());
        for order in &orders {
            broker.place_order(order).await?;
            tokio::time::sleep(self.order_pacing).await;
        }
        Ok(())
    }
}
