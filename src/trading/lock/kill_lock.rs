use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::app_config::redis as app_redis;
use crate::error::AppError;

/// 互斥锁抽象: set-if-absent + TTL
///
/// 锁的存在表示"该账户的熔断正在执行中"。持有者崩溃时不做任何
/// 显式清理, TTL到期后锁自愈, 这是唯一的自恢复机制。
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// 原子获取, 已被持有时返回false
    async fn acquire(&self, key: &str, ttl_secs: u64) -> Result<bool, AppError>;

    async fn release(&self, key: &str) -> Result<(), AppError>;
}

/// Redis实现 (SET NX EX), 跨进程安全
pub struct RedisLockProvider;

impl RedisLockProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RedisLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockProvider for RedisLockProvider {
    async fn acquire(&self, key: &str, ttl_secs: u64) -> Result<bool, AppError> {
        let mut conn = app_redis::get_redis_connection()
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("EX")
            .arg(ttl_secs)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(result.as_deref() == Some("OK"))
    }

    async fn release(&self, key: &str) -> Result<(), AppError> {
        let mut conn = app_redis::get_redis_connection()
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}

/// 进程内实现(DashMap记录到期时刻), 单实例部署与测试用
pub struct InMemoryLockProvider {
    deadlines: DashMap<String, Instant>,
}

impl InMemoryLockProvider {
    pub fn new() -> Self {
        Self {
            deadlines: DashMap::new(),
        }
    }
}

impl Default for InMemoryLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockProvider for InMemoryLockProvider {
    async fn acquire(&self, key: &str, ttl_secs: u64) -> Result<bool, AppError> {
        let now = Instant::now();
        // entry持有分片写锁, 对同一key的并发acquire是原子的
        match self.deadlines.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() > now {
                    Ok(false)
                } else {
                    occupied.insert(now + Duration::from_secs(ttl_secs));
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now + Duration::from_secs(ttl_secs));
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> Result<(), AppError> {
        self.deadlines.remove(key);
        Ok(())
    }
}
