use crate::info;
use config::{Config, ConfigError, Environment, File};
use dotenv::dotenv;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Once;

pub const ENV_PREFIX: &str = "ADMINKIT";

static DOTENV_ONCE: Once = Once::new();

fn ensure_dotenv_loaded() {
    DOTENV_ONCE.call_once(|| {
        match dotenv() {
            Ok(_) => info!("Config loaded including .env file."),
            Err(_) => info!("Config loaded without .env file."),
        }
    });
}

/// Reads `path` (any format `config` understands), then lets `{prefix}__SECTION__KEY` variables override it.
pub fn load_config<T>(path: &str, prefix: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Debug,
{
    ensure_dotenv_loaded();

    let builder = Config::builder()
        .add_source(File::with_name(path).required(true))
        .add_source(
            Environment::with_prefix(prefix)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("page_size_options")
                .separator("__"),
        );

    let cfg = builder.build()?.try_deserialize::<T>()?;
    info!("{:#?}", cfg);
    Ok(cfg)
}

fn default_title() -> String {
    "Admin".to_string()
}

fn default_base_url() -> String {
    "/admin".to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_page_size_options() -> Vec<usize> {
    vec![10, 25, 50, 100]
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AdminSettings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Applied to views that keep the built-in page size.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<usize>,
    pub http: HttpSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HttpSettings {
    pub enable: bool,
    pub bind_address: SocketAddr,
    #[serde(default)]
    pub cors: bool,
}

impl AdminSettings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        load_config(path, ENV_PREFIX)
    }

    /// `base_url` without a trailing slash, empty when mounted at the root.
    pub fn mount_path(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Default for AdminSettings {
    fn default() -> Self {
        AdminSettings {
            title: default_title(),
            base_url: default_base_url(),
            page_size: default_page_size(),
            page_size_options: default_page_size_options(),
            http: HttpSettings { enable: true, bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)), cors: false },
        }
    }
}
