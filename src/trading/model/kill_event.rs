use rbatis::rbdc::DateTime;
use rbatis::RBatis;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_config::db;
use crate::error::AppError;

/// 熔断事件, 只追加不修改: 每次成功的熔断执行恰好产生一条
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KillEventEntity {
    pub id: Option<String>,
    pub account_id: String,
    /// 触发时刻的最终MTM
    pub trigger_mtm: f64,
    pub trigger_loss_percent: f64,
    pub execution_time: Option<DateTime>,
}

crud!(KillEventEntity {}, "kill_event");
impl_select!(KillEventEntity{select_recent(account_id:&str,limit:i64) => "`where account_id = #{account_id} order by execution_time desc limit #{limit}`"},"kill_event");

impl KillEventEntity {
    pub fn new(account_id: &str, trigger_mtm: f64, trigger_loss_percent: f64) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            account_id: account_id.to_string(),
            trigger_mtm,
            trigger_loss_percent,
            execution_time: Some(DateTime::now()),
        }
    }
}

pub struct KillEventModel {
    db: RBatis,
}

impl KillEventModel {
    pub fn new() -> Self {
        Self {
            db: db::get_db_client().clone(),
        }
    }

    pub async fn append(&self, event: &KillEventEntity) -> Result<(), AppError> {
        KillEventEntity::insert(&self.db, event).await?;
        Ok(())
    }

    pub async fn list_recent(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<KillEventEntity>, AppError> {
        let list = KillEventEntity::select_recent(&self.db, account_id, limit).await?;
        Ok(list)
    }
}

impl Default for KillEventModel {
    fn default() -> Self {
        Self::new()
    }
}
