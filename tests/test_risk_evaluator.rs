use approx::assert_relative_eq;
use risk_guard::trading::dhan::dto::Position;
use risk_guard::trading::services::risk_evaluator::{calculate_mtm, evaluate, RiskVerdict};

fn position(product_type: &str, net_qty: i64, unrealized_profit: f64) -> Position {
    Position {
        product_type: product_type.to_string(),
        net_qty,
        unrealized_profit,
        ..Default::default()
    }
}

/// 亏损3%超过2%阈值, 必须触发
#[test]
fn test_loss_over_threshold_triggers() {
    let positions = vec![position("INTRADAY", 10, -3000.0)];
    let snapshot = evaluate(&positions, 100000.0, 2.0);

    assert_relative_eq!(snapshot.mtm, -3000.0);
    assert_relative_eq!(snapshot.loss_percent, 3.0);
    assert_eq!(snapshot.verdict, RiskVerdict::Trigger);
}

/// 日初资金为0时不可能算出百分比, 必须判安全(除零保护)
#[test]
fn test_zero_starting_balance_is_safe() {
    let positions = vec![position("INTRADAY", 10, -3000.0)];
    let snapshot = evaluate(&positions, 0.0, 2.0);

    assert_relative_eq!(snapshot.loss_percent, 0.0);
    assert_eq!(snapshot.verdict, RiskVerdict::Safe);
}

/// 阈值比较是闭区间: 恰好等于阈值即触发
#[test]
fn test_boundary_loss_equal_to_threshold_triggers() {
    let positions = vec![position("INTRADAY", 5, -2000.0)];
    let snapshot = evaluate(&positions, 100000.0, 2.0);

    assert_relative_eq!(snapshot.loss_percent, 2.0);
    assert_eq!(snapshot.verdict, RiskVerdict::Trigger);
}

#[test]
fn test_loss_below_threshold_is_safe() {
    let positions = vec![position("INTRADAY", 5, -1999.0)];
    let snapshot = evaluate(&positions, 100000.0, 2.0);

    assert_eq!(snapshot.verdict, RiskVerdict::Safe);
}

/// 隔夜仓(CNC)与无类型仓不计入MTM
#[test]
fn test_carry_forward_excluded_from_mtm() {
    let positions = vec![
        position("INTRADAY", 10, -1000.0),
        position("CNC", 20, -50000.0),
        position("cnc", 20, -50000.0),
        position("", 5, -50000.0),
        position("MARGIN", -3, -500.0),
    ];

    assert_relative_eq!(calculate_mtm(&positions), -1500.0);
}

/// 未实现盈亏缺省为0: 全部缺省时MTM为0, 判安全
#[test]
fn test_missing_profit_fields_default_to_zero() {
    let body = r#"[{"productType":"INTRADAY","netQty":10},{"productType":"MARGIN"}]"#;
    let positions: Vec<Position> = serde_json::from_str(body).unwrap();

    let snapshot = evaluate(&positions, 100000.0, 2.0);
    assert_relative_eq!(snapshot.mtm, 0.0);
    assert_eq!(snapshot.verdict, RiskVerdict::Safe);
}

/// 纯函数: 相同输入重复调用结果一致
#[test]
fn test_evaluate_is_deterministic() {
    let positions = vec![position("INTRADAY", 10, -2500.0)];
    let first = evaluate(&positions, 100000.0, 2.0);
    for _ in 0..10 {
        let again = evaluate(&positions, 100000.0, 2.0);
        assert_eq!(again, first);
    }
}

/// 盈亏对冲后净值为正时不触发
#[test]
fn test_mixed_positions_net_positive_is_safe() {
    let positions = vec![
        position("INTRADAY", 10, -3000.0),
        position("INTRADAY", -5, 4000.0),
    ];
    let snapshot = evaluate(&positions, 100000.0, 2.0);

    assert_relative_eq!(snapshot.mtm, 1000.0);
    assert_relative_eq!(snapshot.loss_percent, 0.0);
    assert_eq!(snapshot.verdict, RiskVerdict::Safe);
}
