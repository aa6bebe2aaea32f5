use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::app_config::env::env_or_default;
use crate::error::AppError;
use crate::trading::cache::sod_balance_cache::SodBalanceCacheProvider;
use crate::trading::dhan::dto::{CloseOrderRequest, DhanErrorResponse, FundLimit, Position};
use crate::trading::dhan::{BrokerApi, BrokerFactory};
use crate::trading::model::account::AccountDirectory;

fn base_url() -> String {
    env_or_default("DHAN_API_BASE_URL", "https://api.dhan.co")
}

fn api_version() -> String {
    env_or_default("DHAN_API_VERSION", "/v2")
}

/// Dhan REST客户端, 认证走 access-token 请求头
pub struct DhanClient {
    client: Client,
    access_token: String,
    dhan_client_id: String,
    cache: Arc<dyn SodBalanceCacheProvider>,
}

impl DhanClient {
    pub fn new(
        access_token: String,
        dhan_client_id: String,
        cache: Arc<dyn SodBalanceCacheProvider>,
    ) -> Self {
        DhanClient {
            client: Client::new(),
            access_token,
            dhan_client_id,
            cache,
        }
    }

    /// 发送请求并返回原始响应体, 非2xx时按状态码映射错误分类
    async fn send_request(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<String, AppError> {
        let url = format!("{}{}{}", base_url(), api_version(), path);

        let mut request_builder = self
            .client
            .request(method, &url)
            .header("access-token", &self.access_token)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(body) = body {
            request_builder = request_builder.body(body);
        }

        let response = request_builder.send().await?;
        let status_code = response.status();
        let response_body = response.text().await?;
        debug!("path:{}, dhan_response: {}", path, response_body);

        if status_code.is_success() {
            return Ok(response_body);
        }

        let msg = serde_json::from_str::<DhanErrorResponse>(&response_body)
            .map(|e| e.message)
            .unwrap_or_else(|_| "Dhan API request failed".to_string());

        match status_code {
            StatusCode::UNAUTHORIZED => Err(AppError::Auth(
                "Dhan访问令牌无效或已过期, 请在设置中更新".to_string(),
            )),
            StatusCode::NOT_FOUND => Err(AppError::NotFound(msg)),
            _ => Err(AppError::BrokerApi {
                status: status_code.as_u16(),
                msg,
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let body = self.send_request(Method::GET, path, None).await?;
        serde_json::from_str::<T>(&body).map_err(|e| AppError::BrokerApi {
            status: 0,
            msg: format!("响应解析失败: {}: {}", path, e),
        })
    }
}

#[async_trait]
impl BrokerApi for DhanClient {
    fn client_id(&self) -> &str {
        &self.dhan_client_id
    }

    async fn get_positions(&self) -> Result<Vec<Position>, AppError> {
        let body = self.send_request(Method::GET, "/positions", None).await?;
        // 券商偶发返回非数组体, 按空持仓处理
        Ok(serde_json::from_str::<Vec<Position>>(&body).unwrap_or_default())
    }

    async fn get_fund_limit(&self) -> Result<FundLimit, AppError> {
        let fund_limit: FundLimit = self.get_json("/fundlimit").await?;

        // 只缓存有效的日初资金
        if fund_limit.sod_limit > 0.0 {
            self.cache
                .set(&self.dhan_client_id, fund_limit.sod_limit)
                .await;
        }
        Ok(fund_limit)
    }

    async fn get_sod_limit(&self) -> Result<f64, AppError> {
        if let Some(cached) = self.cache.get(&self.dhan_client_id).await {
            if cached > 0.0 {
                return Ok(cached);
            }
        }
        let fund_limit = self.get_fund_limit().await?;
        Ok(fund_limit.sod_limit)
    }

    async fn place_order(&self, order: &CloseOrderRequest) -> Result<(), AppError> {
        let body = serde_json::to_string(order).map_err(|e| AppError::BrokerApi {
            status: 0,
            msg: format!("订单序列化失败: {}", e),
        })?;
        self.send_request(Method::POST, "/orders", Some(body))
            .await?;
        Ok(())
    }

    async fn activate_kill_switch(&self) -> Result<(), AppError> {
        self.send_request(
            Method::POST,
            "/killswitch?killSwitchStatus=ACTIVATE",
            None,
        )
        .await?;
        Ok(())
    }
}

/// 从账户目录解析凭证并构造客户端, 凭证缺失时给出可区分的错误
pub struct DhanBrokerFactory {
    accounts: Arc<dyn AccountDirectory>,
    cache: Arc<dyn SodBalanceCacheProvider>,
}

impl DhanBrokerFactory {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        cache: Arc<dyn SodBalanceCacheProvider>,
    ) -> Self {
        Self { accounts, cache }
    }
}

#[async_trait]
impl BrokerFactory for DhanBrokerFactory {
    async fn client_for(&self, account_id: &str) -> Result<Arc<dyn BrokerApi>, AppError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("账户不存在: {}", account_id)))?;

        let (dhan_client_id, access_token) = account.credential().ok_or_else(|| {
            AppError::Config("Dhan访问令牌未配置, 请先在设置中绑定".to_string())
        })?;

        Ok(Arc::new(DhanClient::new(
            access_token,
            dhan_client_id,
            Arc::clone(&self.cache),
        )))
    }
}
