use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// 隔夜持仓的产品类型: 不计入日内MTM, 也不参与强平
pub const CARRY_FORWARD_PRODUCT: &str = "CNC";

/// 衍生品字段的空值哨兵, 券商侧用这些值表示"无"
pub const DRV_EXPIRY_SENTINEL: &str = "0001-01-01";
pub const DRV_OPTION_SENTINEL: &str = "NA";

/// 持仓信息, 每个监控周期从券商侧拉取, 不落库
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Position {
    pub dhan_client_id: String,
    pub trading_symbol: String,
    pub security_id: String,
    /// LONG / SHORT / CLOSED
    pub position_type: String,
    pub exchange_segment: String,
    /// INTRADAY / MARGIN / CNC 等, CNC为隔夜仓
    pub product_type: String,
    /// 净持仓数量, 带方向
    pub net_qty: i64,
    pub cost_price: f64,
    pub buy_avg: f64,
    pub sell_avg: f64,
    pub unrealized_profit: f64,
    pub realized_profit: f64,
    /// 衍生品到期日, "0001-01-01"表示无
    pub drv_expiry_date: String,
    /// 期权类型, "NA"表示无
    pub drv_option_type: String,
    pub drv_strike_price: f64,
}

/// 资金信息 (/fundlimit 响应)
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FundLimit {
    // 券商接口的原始拼写就是 availabelBalance
    #[serde(rename = "availabelBalance")]
    pub available_balance: f64,
    /// 日初可用资金, 亏损百分比的分母
    pub sod_limit: f64,
    pub utilized_amount: f64,
    pub withdrawable_balance: f64,
    pub collateral_amount: f64,
    pub receiveable_amount: f64,
    pub blocked_payout_amount: f64,
}

/// 订单方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    BUY,
    SELL,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::BUY => write!(f, "BUY"),
            TransactionType::SELL => write!(f, "SELL"),
        }
    }
}

/// 订单类型
pub enum OrderType {
    /// 市价单
    MARKET,
    /// 限价单
    LIMIT,
}

impl Display for OrderType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::MARKET => write!(f, "MARKET"),
            OrderType::LIMIT => write!(f, "LIMIT"),
        }
    }
}

/// 订单有效期
pub enum Validity {
    /// 当日有效
    DAY,
    /// 立即成交否则取消
    IOC,
}

impl Display for Validity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Validity::DAY => write!(f, "DAY"),
            Validity::IOC => write!(f, "IOC"),
        }
    }
}

/// 平仓订单请求 (/orders)
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CloseOrderRequest {
    pub dhan_client_id: String,
    /// BUY / SELL, 与净持仓方向相反
    pub transaction_type: String,
    pub exchange_segment: String,
    pub product_type: String,
    pub order_type: String,
    pub validity: String,
    pub trading_symbol: String,
    pub security_id: String,
    /// 平仓数量 = |净持仓|
    pub quantity: i64,
    /// 衍生品字段仅在非哨兵值时携带
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drv_expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drv_option_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drv_strike_price: Option<f64>,
}

/// 券商错误响应体
#[derive(Serialize, Deserialize, Debug)]
pub struct DhanErrorResponse {
    pub message: String,
}
