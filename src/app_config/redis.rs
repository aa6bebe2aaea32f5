use std::env;

use anyhow::Result;
use redis::aio::MultiplexedConnection;
use redis::Client;

/// Get a Redis multiplexed async connection using REDIS_HOST from env
pub async fn get_redis_connection() -> Result<MultiplexedConnection> {
    let url = env::var("REDIS_HOST").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    let client = Client::open(url)?;
    let conn = client.get_multiplexed_async_connection().await?;
    Ok(conn)
}

/// SOD余额缓存键, 以券商侧客户号为维度
pub fn sod_balance_key(dhan_client_id: &str) -> String {
    format!("sod_balance:{}", dhan_client_id)
}

/// 账户熔断互斥锁键
pub fn kill_lock_key(account_id: &str) -> String {
    format!("account:{}:kill_lock", account_id)
}
