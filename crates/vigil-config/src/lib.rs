pub mod global;
pub mod loader;

pub use global::{
    EngineConfig, EscalationBinding, GlobalConfig, ProvidersConfig, RulesConfig, SystemConfig,
};
pub use loader::{ConfigLoader, GLOBAL_CONFIG_FILE};
