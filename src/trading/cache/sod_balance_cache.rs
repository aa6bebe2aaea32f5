use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use tracing::debug;

use crate::app_config::redis as app_redis;
use crate::time_util;

/// 抽象：日初资金(SOD)缓存提供者
///
/// 缓存只是延迟优化, 不是正确性依赖: 任何后端故障都降级为
/// 未命中/不写入, 调用方回退到券商侧的实时查询。
#[async_trait]
pub trait SodBalanceCacheProvider: Send + Sync {
    async fn get(&self, dhan_client_id: &str) -> Option<f64>;

    /// TTL为距下一个开盘时刻的秒数, 保证开盘后强制刷新
    async fn set(&self, dhan_client_id: &str, balance: f64);

    async fn invalidate(&self, dhan_client_id: &str);
}

/// Redis实现
pub struct RedisSodBalanceCache;

impl RedisSodBalanceCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RedisSodBalanceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SodBalanceCacheProvider for RedisSodBalanceCache {
    async fn get(&self, dhan_client_id: &str) -> Option<f64> {
        let mut conn = app_redis::get_redis_connection().await.ok()?;
        let key = app_redis::sod_balance_key(dhan_client_id);
        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(v)) => v.parse::<f64>().ok(),
            Ok(None) => None,
            Err(err) => {
                debug!("读取SOD缓存失败, 降级为未命中: {}: {}", key, err);
                None
            }
        }
    }

    async fn set(&self, dhan_client_id: &str, balance: f64) {
        if let Ok(mut conn) = app_redis::get_redis_connection().await {
            let key = app_redis::sod_balance_key(dhan_client_id);
            let ttl = time_util::seconds_until_next_market_open();
            let _: redis::RedisResult<()> =
                conn.set_ex(&key, balance.to_string(), ttl).await;
        }
    }

    async fn invalidate(&self, dhan_client_id: &str) {
        if let Ok(mut conn) = app_redis::get_redis_connection().await {
            let key = app_redis::sod_balance_key(dhan_client_id);
            let _: redis::RedisResult<()> = conn.del(&key).await;
        }
    }
}

/// 进程内实现(DashMap), 单实例部署与测试用, 同样遵守开盘过期
pub struct InMemorySodBalanceCache {
    map: DashMap<String, (f64, Instant)>,
}

impl InMemorySodBalanceCache {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }
}

impl Default for InMemorySodBalanceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SodBalanceCacheProvider for InMemorySodBalanceCache {
    async fn get(&self, dhan_client_id: &str) -> Option<f64> {
        let expired = match self.map.get(dhan_client_id) {
            Some(entry) => {
                let (balance, deadline) = *entry;
                if Instant::now() < deadline {
                    return Some(balance);
                }
                true
            }
            None => false,
        };
        if expired {
            self.map.remove(dhan_client_id);
        }
        None
    }

    async fn set(&self, dhan_client_id: &str, balance: f64) {
        let ttl = time_util::seconds_until_next_market_open();
        let deadline = Instant::now() + Duration::from_secs(ttl);
        self.map
            .insert(dhan_client_id.to_string(), (balance, deadline));
    }

    async fn invalidate(&self, dhan_client_id: &str) {
        self.map.remove(dhan_client_id);
    }
}
