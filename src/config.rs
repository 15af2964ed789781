use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Operational knobs of the HTTP surface, passed in explicitly at startup:
/// paging bounds plus the admin-route guard. `admin_token: None` disables
/// the guard entirely; token management itself belongs to the host
/// environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_per_page: u32,
    pub max_per_page: u32,
    pub admin_token: Option<String>,
    /// Admin paths served without the token, e.g. a health or export route
    /// the host exposes publicly.
    pub open_admin_routes: Vec<String>,
}

/// Paging bounds handed to the query parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDefaults {
    pub per_page: u32,
    pub max_per_page: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/comments.db".to_string(),
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            api: ApiConfig {
                default_per_page: 15,
                max_per_page: 100,
                admin_token: None,
                open_admin_routes: Vec::new(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();
        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            api: ApiConfig {
                default_per_page: env::var("DEFAULT_PER_PAGE")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(defaults.api.default_per_page),
                max_per_page: env::var("MAX_PER_PAGE")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(defaults.api.max_per_page),
                admin_token: env::var("ADMIN_API_TOKEN").ok().filter(|t| !t.is_empty()),
                open_admin_routes: env::var("ADMIN_OPEN_ROUTES")
                    .map(|value| {
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|route| !route.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn page_defaults(&self) -> PageDefaults {
        PageDefaults {
            per_page: self.api.default_per_page,
            max_per_page: self.api.max_per_page,
        }
    }
}
