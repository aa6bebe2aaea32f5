use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

/// 交易所时区: 印度标准时间 UTC+5:30
const MARKET_TZ_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// 开盘时间 09:15 (交易所当地时间)
const MARKET_OPEN_HOUR: u32 = 9;
const MARKET_OPEN_MINUTE: u32 = 15;

/// SOD余额缓存的最小TTL, 避免临界点附近算出接近0的过期时间
pub const SOD_CACHE_MIN_TTL_SECS: u64 = 3600;

fn market_tz() -> FixedOffset {
    FixedOffset::east_opt(MARKET_TZ_OFFSET_SECS).unwrap()
}

/// 当前交易日 (交易所当地日期, YYYY-MM-DD), 作为日内风控状态的分区键
pub fn trading_date_today() -> String {
    trading_date_at(Utc::now())
}

pub fn trading_date_at(now: DateTime<Utc>) -> String {
    now.with_timezone(&market_tz())
        .format("%Y-%m-%d")
        .to_string()
}

/// N天前的交易日日期, 用于历史查询的起始边界
pub fn trading_date_days_ago(days: i64) -> String {
    trading_date_days_ago_at(Utc::now(), days)
}

pub fn trading_date_days_ago_at(now: DateTime<Utc>, days: i64) -> String {
    (now.with_timezone(&market_tz()) - Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

/// 距离下一个开盘时刻(09:15当地时间)的秒数
///
/// 用作SOD余额缓存的TTL: 缓存最晚在下个交易时段开始前过期,
/// 保证每天开盘后第一次评估拿到的是当日的新余额。
pub fn seconds_until_next_market_open() -> u64 {
    seconds_until_next_market_open_at(Utc::now())
}

pub fn seconds_until_next_market_open_at(now: DateTime<Utc>) -> u64 {
    let tz = market_tz();
    let local = now.with_timezone(&tz);

    let open_naive = local
        .date_naive()
        .and_hms_opt(MARKET_OPEN_HOUR, MARKET_OPEN_MINUTE, 0)
        .unwrap();
    let open_today = tz.from_local_datetime(&open_naive).unwrap();

    let next_open = if local >= open_today {
        open_today + Duration::days(1)
    } else {
        open_today
    };

    let secs = (next_open - local).num_seconds();
    secs.max(SOD_CACHE_MIN_TTL_SECS as i64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trading_date_crosses_midnight_in_market_tz() {
        // UTC 2024-06-03 20:00 = IST 2024-06-04 01:30
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
        assert_eq!(trading_date_at(now), "2024-06-04");
    }

    #[test]
    fn test_seconds_until_open_before_open() {
        // IST 08:15 (= UTC 02:45), 距离09:15还有1小时
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 2, 45, 0).unwrap();
        assert_eq!(seconds_until_next_market_open_at(now), 3600);
    }

    #[test]
    fn test_seconds_until_open_after_open_rolls_to_next_day() {
        // IST 10:15 (= UTC 04:45), 下一个开盘是次日09:15, 即23小时后
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 4, 45, 0).unwrap();
        assert_eq!(seconds_until_next_market_open_at(now), 23 * 3600);
    }

    #[test]
    fn test_seconds_until_open_floor_applied() {
        // IST 09:00, 距离开盘只剩15分钟, 应被抬升到最小TTL
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 3, 30, 0).unwrap();
        assert_eq!(
            seconds_until_next_market_open_at(now),
            SOD_CACHE_MIN_TTL_SECS
        );
    }

    #[test]
    fn test_trading_date_days_ago() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        assert_eq!(trading_date_days_ago_at(now, 30), "2024-05-04");
    }
}
