// src/config/mod.rs
pub mod app;

pub use app::{
    load_default, AppConfig, DiscordCfg, NotifierKind, SourceCfg, SourceKind,
    DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH,
};
