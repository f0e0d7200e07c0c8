use envconfig::Envconfig;

#[derive(Envconfig, Debug, Clone)]
pub struct Config {
    #[envconfig(from = "TELEGRAM_BOT_TOKEN")]
    pub telegram_bot_token: String,

    /// When unset the bot runs on the in-memory backend and forgets everything on restart.
    #[envconfig(from = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[envconfig(from = "MEDEX_LOW_STOCK_THRESHOLD", default = "10")]
    pub low_stock_threshold: i32,
}

/// Settings for the `seed` binary.
#[derive(Envconfig, Debug, Clone)]
pub struct SeedConfig {
    #[envconfig(from = "DATABASE_URL")]
    pub database_url: String,

    #[envconfig(from = "MEDEX_ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    #[envconfig(from = "MEDEX_ADMIN_PASSWORD")]
    pub admin_password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_config_with_defaults() {
        let env = HashMap::from([("TELEGRAM_BOT_TOKEN".to_string(), "123:abc".to_string())]);
        let config = Config::init_from_hashmap(&env).unwrap();
        assert_eq!(config.telegram_bot_token, "123:abc");
        assert!(config.database_url.is_none());
        assert_eq!(config.low_stock_threshold, 10);
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(Config::init_from_hashmap(&HashMap::new()).is_err());
    }
}
