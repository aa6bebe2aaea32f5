#![allow(dead_code)]

//! 集成测试共用的进程内桩: 账户目录 / 券商 / 持久化

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use risk_guard::error::AppError;
use risk_guard::trading::dhan::dto::{CloseOrderRequest, FundLimit, Position};
use risk_guard::trading::dhan::{BrokerApi, BrokerFactory};
use risk_guard::trading::model::account::{AccountDirectory, AccountEntity};
use risk_guard::trading::model::daily_risk_state::DailyRiskStateEntity;
use risk_guard::trading::model::kill_event::KillEventEntity;
use risk_guard::trading::model::RiskStateStore;

pub fn account(account_id: &str, enabled: bool) -> AccountEntity {
    AccountEntity {
        account_id: account_id.to_string(),
        email: None,
        dhan_client_id: Some("1000001".to_string()),
        access_token: Some("token".to_string()),
        risk_threshold: 2.0,
        kill_switch_enabled: enabled,
    }
}

pub fn losing_positions() -> Vec<Position> {
    vec![
        Position {
            dhan_client_id: "1000001".to_string(),
            trading_symbol: "RELIANCE".to_string(),
            security_id: "2885".to_string(),
            exchange_segment: "NSE_EQ".to_string(),
            product_type: "INTRADAY".to_string(),
            net_qty: 10,
            unrealized_profit: -3000.0,
            ..Default::default()
        },
        // 隔夜仓: 不计入MTM也不产生平仓单
        Position {
            product_type: "CNC".to_string(),
            net_qty: 5,
            unrealized_profit: -9999.0,
            ..Default::default()
        },
    ]
}

pub fn safe_positions() -> Vec<Position> {
    vec![Position {
        product_type: "INTRADAY".to_string(),
        net_qty: 10,
        unrealized_profit: -100.0,
        ..Default::default()
    }]
}

pub struct MockDirectory {
    pub accounts: HashMap<String, AccountEntity>,
    pub list_calls: AtomicUsize,
}

impl MockDirectory {
    pub fn new(accounts: Vec<AccountEntity>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|a| (a.account_id.clone(), a))
                .collect(),
            list_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AccountDirectory for MockDirectory {
    async fn list_monitorable(&self) -> Result<Vec<String>, AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut ids: Vec<String> = self
            .accounts
            .values()
            .filter(|a| a.kill_switch_enabled && a.has_credential())
            .map(|a| a.account_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn find_by_id(&self, account_id: &str) -> Result<Option<AccountEntity>, AppError> {
        Ok(self.accounts.get(account_id).cloned())
    }
}

/// 可注入故障的券商桩
pub struct MockBroker {
    pub positions: Mutex<Vec<Position>>,
    pub sod_limit: f64,
    /// 拉仓位时人为放慢, 用来撑开并发触发的竞争窗口
    pub fetch_delay: Duration,
    pub orders: Mutex<Vec<CloseOrderRequest>>,
    pub kill_flag: AtomicBool,
    pub fail_activate: AtomicBool,
}

impl MockBroker {
    pub fn new(positions: Vec<Position>, sod_limit: f64) -> Self {
        Self {
            positions: Mutex::new(positions),
            sod_limit,
            fetch_delay: Duration::ZERO,
            orders: Mutex::new(Vec::new()),
            kill_flag: AtomicBool::new(false),
            fail_activate: AtomicBool::new(false),
        }
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }
}

#[async_trait]
impl BrokerApi for MockBroker {
    fn client_id(&self) -> &str {
        "1000001"
    }

    async fn get_positions(&self) -> Result<Vec<Position>, AppError> {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn get_fund_limit(&self) -> Result<FundLimit, AppError> {
        Ok(FundLimit {
            sod_limit: self.sod_limit,
            ..Default::default()
        })
    }

    async fn get_sod_limit(&self) -> Result<f64, AppError> {
        Ok(self.sod_limit)
    }

    async fn place_order(&self, order: &CloseOrderRequest) -> Result<(), AppError> {
        self.orders.lock().unwrap().push(order.clone());
        Ok(())
    }

    async fn activate_kill_switch(&self) -> Result<(), AppError> {
        if self.fail_activate.load(Ordering::SeqCst) {
            return Err(AppError::BrokerApi {
                status: 502,
                msg: "upstream unavailable".to_string(),
            });
        }
        self.kill_flag.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 指定账户返回凭证失效, 其余账户返回共享的券商桩
pub struct MockFactory {
    pub broker: Arc<MockBroker>,
    pub auth_failing: Vec<String>,
    pub auth_errors: AtomicUsize,
}

impl MockFactory {
    pub fn new(broker: Arc<MockBroker>) -> Self {
        Self {
            broker,
            auth_failing: Vec::new(),
            auth_errors: AtomicUsize::new(0),
        }
    }

    pub fn with_auth_failing(mut self, account_ids: Vec<String>) -> Self {
        self.auth_failing = account_ids;
        self
    }
}

#[async_trait]
impl BrokerFactory for MockFactory {
    async fn client_for(&self, account_id: &str) -> Result<Arc<dyn BrokerApi>, AppError> {
        if self.auth_failing.iter().any(|a| a == account_id) {
            self.auth_errors.fetch_add(1, Ordering::SeqCst);
            return Err(AppError::Auth("token expired".to_string()));
        }
        Ok(Arc::clone(&self.broker) as Arc<dyn BrokerApi>)
    }
}

/// 进程内持久化桩
#[derive(Default)]
pub struct MemoryStore {
    pub states: Mutex<HashMap<(String, String), DailyRiskStateEntity>>,
    pub events: Mutex<Vec<KillEventEntity>>,
    pub fail_mark_killed: AtomicBool,
}

#[async_trait]
impl RiskStateStore for MemoryStore {
    async fn find_by_day(
        &self,
        account_id: &str,
        trading_date: &str,
    ) -> Result<Option<DailyRiskStateEntity>, AppError> {
        let key = (account_id.to_string(), trading_date.to_string());
        Ok(self.states.lock().unwrap().get(&key).cloned())
    }

    async fn upsert_metrics(
        &self,
        account_id: &str,
        trading_date: &str,
        mtm: f64,
        invested: f64,
        loss_percent: f64,
    ) -> Result<DailyRiskStateEntity, AppError> {
        let key = (account_id.to_string(), trading_date.to_string());
        let mut states = self.states.lock().unwrap();
        let state = states.entry(key).or_insert_with(|| DailyRiskStateEntity {
            id: None,
            account_id: account_id.to_string(),
            trading_date: trading_date.to_string(),
            mtm,
            invested,
            loss_percent,
            kill_status: false,
            updated_at: None,
        });
        state.mtm = mtm;
        state.invested = invested;
        state.loss_percent = loss_percent;
        Ok(state.clone())
    }

    async fn mark_killed(
        &self,
        account_id: &str,
        trading_date: &str,
        mtm: f64,
        invested: f64,
        loss_percent: f64,
    ) -> Result<(), AppError> {
        if self.fail_mark_killed.load(Ordering::SeqCst) {
            return Err(AppError::Db("connection lost".to_string()));
        }
        let key = (account_id.to_string(), trading_date.to_string());
        let mut states = self.states.lock().unwrap();
        let state = states.entry(key).or_insert_with(|| DailyRiskStateEntity {
            id: None,
            account_id: account_id.to_string(),
            trading_date: trading_date.to_string(),
            mtm,
            invested,
            loss_percent,
            kill_status: true,
            updated_at: None,
        });
        state.mtm = mtm;
        state.invested = invested;
        state.loss_percent = loss_percent;
        state.kill_status = true;
        Ok(())
    }

    async fn append_kill_event(&self, event: &KillEventEntity) -> Result<(), AppError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn reset_day(&self, account_id: &str, trading_date: &str) -> Result<u64, AppError> {
        let key = (account_id.to_string(), trading_date.to_string());
        let mut states = self.states.lock().unwrap();
        match states.get_mut(&key) {
            Some(state) => {
                state.mtm = 0.0;
                state.invested = 0.0;
                state.loss_percent = 0.0;
                state.kill_status = false;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list_since(
        &self,
        account_id: &str,
        start_date: &str,
    ) -> Result<Vec<DailyRiskStateEntity>, AppError> {
        let states = self.states.lock().unwrap();
        let mut list: Vec<DailyRiskStateEntity> = states
            .values()
            .filter(|s| s.account_id == account_id && s.trading_date.as_str() >= start_date)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.trading_date.cmp(&b.trading_date));
        Ok(list)
    }

    async fn recent_kill_events(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<KillEventEntity>, AppError> {
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .filter(|e| e.account_id == account_id)
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
