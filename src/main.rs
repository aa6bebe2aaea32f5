use std::sync::Arc;

use tracing::info;

use risk_guard::app_config::env::{env_is_true, init_env};
use risk_guard::app_config::log::setup_logging;
use risk_guard::app_config::db;
use risk_guard::job::monitor_job::RiskMonitorJob;
use risk_guard::trading::cache::sod_balance_cache::{RedisSodBalanceCache, SodBalanceCacheProvider};
use risk_guard::trading::dhan::dhan_client::DhanBrokerFactory;
use risk_guard::trading::dhan::BrokerFactory;
use risk_guard::trading::lock::kill_lock::{LockProvider, RedisLockProvider};
use risk_guard::trading::model::account::{AccountDirectory, AccountsModel};
use risk_guard::trading::model::{DbRiskStateStore, RiskStateStore};
use risk_guard::trading::services::kill_switch_service::KillSwitchService;
use risk_guard::trading::services::risk_service::RiskService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_env()?;
    // 设置日志
    setup_logging().await?;
    // 初始化数据库连接
    db::init_db().await;

    // 组装风控核心: 账户目录 + 券商客户端工厂 + 持久化 + 锁/缓存
    let accounts: Arc<dyn AccountDirectory> = Arc::new(AccountsModel::new());
    let cache: Arc<dyn SodBalanceCacheProvider> = Arc::new(RedisSodBalanceCache::new());
    let lock: Arc<dyn LockProvider> = Arc::new(RedisLockProvider::new());
    let store: Arc<dyn RiskStateStore> = Arc::new(DbRiskStateStore::new());
    let broker: Arc<dyn BrokerFactory> = Arc::new(DhanBrokerFactory::new(
        Arc::clone(&accounts),
        Arc::clone(&cache),
    ));

    let kill_switch = Arc::new(KillSwitchService::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        Arc::clone(&lock),
    ));

    // 外部接口层(路由/鉴权在本服务之外)通过门面调用核心操作
    let _risk_service = RiskService::new(
        Arc::clone(&accounts),
        Arc::clone(&store),
        Arc::clone(&kill_switch),
    );

    let monitor = Arc::new(RiskMonitorJob::new(
        accounts,
        broker,
        store,
        kill_switch,
    ));

    if env_is_true("IS_RUN_RISK_MONITOR", true) {
        monitor.start();
    } else {
        info!("风控监控未启用(IS_RUN_RISK_MONITOR=false)");
    }

    // 捕捉Ctrl+C信号以平滑关闭
    tokio::signal::ctrl_c().await?;
    monitor.stop();

    Ok(())
}
