#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum CargoEnv {
    Development,
    Production,
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

#[derive(clap::Parser, Clone, Debug)]
pub struct AppConfig {
    // production or development
    #[clap(long, env, value_enum)]
    pub cargo_env: CargoEnv,

    // port that the app will bind to
    #[clap(long, env, default_value = "5000")]
    pub port: u16,

    // redis that holds the admin config document with the live and vod source lists
    #[clap(long, env)]
    pub registry_redis_url: Option<String>,

    // key of the admin config document inside redis
    #[clap(long, env, default_value = "admin:config")]
    pub registry_config_key: String,

    // json file with the same document, handy for local runs without redis
    #[clap(long, env)]
    pub registry_file: Option<String>,

    // externally visible base of the proxy routes, e.g. https://edge.example.com/api/proxy
    // when unset it's derived from the Host / X-Forwarded-* headers of each request
    #[clap(long, env)]
    pub public_base_url: Option<String>,

    // ua sent upstream for manifests and segments when the source doesn't set its own
    #[clap(long, env, default_value = DEFAULT_USER_AGENT)]
    pub default_user_agent: String,

    // manifests never wait longer than this, even for the slow domains
    #[clap(long, env, default_value = "15000")]
    pub manifest_timeout_cap_ms: u64,

    // optional sentry integration
    #[clap(long, env)]
    pub sentry_dsn: Option<String>,
}

impl Default for AppConfig {
    // defaults aren't really needed here but it's here as a bad fallback
    fn default() -> Self {
        Self {
            cargo_env: CargoEnv::Development,
            port: 5000,
            registry_redis_url: None,
            registry_config_key: "admin:config".to_string(),
            registry_file: None,
            public_base_url: None,
            default_user_agent: DEFAULT_USER_AGENT.to_string(),
            manifest_timeout_cap_ms: 15_000,
            sentry_dsn: None,
        }
    }
}
