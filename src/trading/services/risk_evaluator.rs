use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::trading::dhan::dto::{Position, CARRY_FORWARD_PRODUCT};

/// 风险判定结果
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskVerdict {
    /// 未达阈值
    Safe,
    /// 亏损达到阈值, 需要执行熔断
    Trigger,
}

impl Display for RiskVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskVerdict::Safe => write!(f, "SAFE"),
            RiskVerdict::Trigger => write!(f, "TRIGGER"),
        }
    }
}

/// 单次评估的计算结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSnapshot {
    pub mtm: f64,
    pub loss_percent: f64,
    pub verdict: RiskVerdict,
}

/// 仓位是否计入日内风险: 产品类型非空且不是隔夜仓
pub fn is_day_tradeable(position: &Position) -> bool {
    let product_type = position.product_type.trim().to_uppercase();
    !product_type.is_empty() && product_type != CARRY_FORWARD_PRODUCT
}

/// 日内盯市盈亏: 只累计日内仓位的未实现盈亏
///
/// 已实现盈亏不计入: 熔断保护的是持仓回撤, 已落袋的亏损
/// 不再随行情变化。
pub fn calculate_mtm(positions: &[Position]) -> f64 {
    positions
        .iter()
        .filter(|p| is_day_tradeable(p))
        .map(|p| p.unrealized_profit)
        .sum()
}

/// 亏损百分比, 盈利或分母无效时恒为0
pub fn loss_percent(mtm: f64, starting_balance: f64) -> f64 {
    if mtm < 0.0 && starting_balance > 0.0 {
        mtm.abs() / starting_balance * 100.0
    } else {
        0.0
    }
}

/// 风险评估: 纯计算, 无IO, 可重复可并发调用
///
/// 阈值比较取闭区间: 亏损百分比恰好等于阈值时即触发。
pub fn evaluate(positions: &[Position], starting_balance: f64, threshold_percent: f64) -> RiskSnapshot {
    let mtm = calculate_mtm(positions);
    let loss_percent = loss_percent(mtm, starting_balance);

    let verdict = if mtm < 0.0 && starting_balance > 0.0 && loss_percent >= threshold_percent {
        RiskVerdict::Trigger
    } else {
        RiskVerdict::Safe
    };

    RiskSnapshot {
        mtm,
        loss_percent,
        verdict,
    }
}
