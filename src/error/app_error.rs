use thiserror::Error;

/// 应用错误
///
/// 按错误的处置方式分类: 配置类与凭证类错误在监控周期内直接跳过,
/// 锁冲突视为并发触发的正常分支, 券商接口错误作为本周期的硬失败,
/// 由下一个轮询周期自然重试。
#[derive(Error, Debug)]
pub enum AppError {
    /// 账户未配置或配置不完整: 本周期跳过该账户, 等待用户补齐配置
    #[error("账户配置错误: {0}")]
    Config(String),

    /// 券商凭证无效或已过期: 跳过并做限频告警
    #[error("券商凭证无效或已过期: {0}")]
    Auth(String),

    /// 账户或资源不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 熔断已在执行中: 并发触发时只允许一个执行者
    #[error("熔断执行冲突: {0}")]
    LockConflict(String),

    /// 券商接口调用失败, status为0时表示网络层错误
    #[error("券商接口错误({status}): {msg}")]
    BrokerApi { status: u16, msg: String },

    /// 数据库错误
    #[error("数据库错误: {0}")]
    Db(String),

    /// Redis错误: 缓存侧静默降级, 锁侧使本次触发失败
    #[error("Redis错误: {0}")]
    Redis(String),

    /// 熔断标志已在券商侧生效, 但后置落库失败。
    /// 状态不一致但安全(交易已被禁用), 必须单独上报而不是吞掉。
    #[error("熔断后置写入失败: {0}")]
    PostKillPersist(String),
}

impl From<rbatis::rbdc::Error> for AppError {
    fn from(err: rbatis::rbdc::Error) -> Self {
        AppError::Db(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Redis(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::BrokerApi {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            msg: err.to_string(),
        }
    }
}
