pub mod dhan_client;
pub mod dto;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use self::dto::{CloseOrderRequest, FundLimit, Position};

/// 券商接口抽象: 持仓/资金快照、平仓下单、熔断开关
///
/// 认证失效必须以 AppError::Auth 区分于一般失败和NotFound,
/// 调度器按此分类决定跳过还是告警。
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// 券商侧客户号, 平仓订单缺省携带
    fn client_id(&self) -> &str;

    async fn get_positions(&self) -> Result<Vec<Position>, AppError>;

    async fn get_fund_limit(&self) -> Result<FundLimit, AppError>;

    /// 日初可用资金, 优先走缓存
    async fn get_sod_limit(&self) -> Result<f64, AppError>;

    async fn place_order(&self, order: &CloseOrderRequest) -> Result<(), AppError>;

    /// 激活券商侧的硬性禁止交易开关
    async fn activate_kill_switch(&self) -> Result<(), AppError>;
}

/// 按账户构造券商客户端
#[async_trait]
pub trait BrokerFactory: Send + Sync {
    async fn client_for(&self, account_id: &str) -> Result<Arc<dyn BrokerApi>, AppError>;
}
