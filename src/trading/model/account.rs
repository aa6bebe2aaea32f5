use async_trait::async_trait;
use rbatis::RBatis;
use serde::{Deserialize, Serialize};

use crate::app_config::db;
use crate::error::AppError;

/// 默认亏损阈值(百分比)
pub const DEFAULT_RISK_THRESHOLD: f64 = 2.0;

/// 账户表, 由设置侧维护, 风控核心只读
///
/// access_token 按设置侧写入的形式原样保存, 核心不关心其存储格式,
/// 只判断是否存在。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccountEntity {
    pub account_id: String,
    pub email: Option<String>,
    /// 券商侧客户号
    pub dhan_client_id: Option<String>,
    /// 券商访问凭证
    pub access_token: Option<String>,
    /// 亏损阈值(百分比), 达到即触发熔断
    pub risk_threshold: f64,
    /// 是否开启风控监控
    pub kill_switch_enabled: bool,
}

crud!(AccountEntity {}, "accounts");
impl_select!(AccountEntity{select_by_id(account_id:&str) -> Option => "`where account_id = #{account_id} limit 1`"},"accounts");
impl_select!(AccountEntity{select_monitorable() => "`where kill_switch_enabled = 1 and access_token is not null and access_token != '' and dhan_client_id is not null and dhan_client_id != ''`"},"accounts");

impl AccountEntity {
    /// 凭证齐全时返回 (客户号, 访问令牌)
    pub fn credential(&self) -> Option<(String, String)> {
        let client_id = self.dhan_client_id.as_deref().unwrap_or("").trim();
        let token = self.access_token.as_deref().unwrap_or("").trim();
        if client_id.is_empty() || token.is_empty() {
            return None;
        }
        Some((client_id.to_string(), token.to_string()))
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }
}

/// 账户目录: 调度器枚举可监控账户, 工厂按id取账户
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn list_monitorable(&self) -> Result<Vec<String>, AppError>;

    async fn find_by_id(&self, account_id: &str) -> Result<Option<AccountEntity>, AppError>;
}

pub struct AccountsModel {
    db: RBatis,
}

impl AccountsModel {
    pub fn new() -> Self {
        Self {
            db: db::get_db_client().clone(),
        }
    }
}

impl Default for AccountsModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountDirectory for AccountsModel {
    async fn list_monitorable(&self) -> Result<Vec<String>, AppError> {
        let accounts = AccountEntity::select_monitorable(&self.db).await?;
        Ok(accounts.into_iter().map(|a| a.account_id).collect())
    }

    async fn find_by_id(&self, account_id: &str) -> Result<Option<AccountEntity>, AppError> {
        let account = AccountEntity::select_by_id(&self.db, account_id).await?;
        Ok(account)
    }
}
