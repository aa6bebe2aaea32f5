use std::env;

use dotenv::dotenv;

/// 加载.env并校验必须的环境变量
pub fn init_env() -> anyhow::Result<()> {
    dotenv().ok();
    for key in ["DB_HOST"] {
        if env::var(key).is_err() {
            return Err(anyhow::anyhow!("缺少必须的环境变量: {}", key));
        }
    }
    Ok(())
}

/// 读取布尔型环境变量：支持 true/false/1/0（大小写不敏感）
pub fn env_is_true(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        }
        Err(_) => default,
    }
}

/// 读取字符串环境变量，若不存在则返回默认值
pub fn env_or_default(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) => v,
        Err(_) => default.to_string(),
    }
}
