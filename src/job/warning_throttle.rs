use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// 按键限频的告警去重器
///
/// 凭证失效是长期存在的稳态条件, 每个监控周期都会撞到一次;
/// 同一个键在冷却窗口内只放行一条告警, 避免刷爆日志。
/// 作为显式组件注入调度器, 多实例与测试之间互不共享状态。
pub struct WarningThrottle {
    cooldown: Duration,
    last_warned: DashMap<String, Instant>,
}

impl WarningThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_warned: DashMap::new(),
        }
    }

    /// 本次是否放行告警; 放行的同时刷新该键的冷却起点
    pub fn should_warn(&self, key: &str) -> bool {
        let now = Instant::now();
        match self.last_warned.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if now.duration_since(*occupied.get()) >= self.cooldown {
                    occupied.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_hit_passes_then_suppressed() {
        let throttle = WarningThrottle::new(Duration::from_secs(60));
        assert!(throttle.should_warn("acc-1"));
        assert!(!throttle.should_warn("acc-1"));
        assert!(!throttle.should_warn("acc-1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let throttle = WarningThrottle::new(Duration::from_secs(60));
        assert!(throttle.should_warn("acc-1"));
        assert!(throttle.should_warn("acc-2"));
        assert!(!throttle.should_warn("acc-1"));
    }

    #[test]
    fn test_rearms_after_cooldown() {
        let throttle = WarningThrottle::new(Duration::from_millis(20));
        assert!(throttle.should_warn("acc-1"));
        assert!(!throttle.should_warn("acc-1"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(throttle.should_warn("acc-1"));
    }
}
