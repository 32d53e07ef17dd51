pub mod algo;
pub mod error;
pub mod ops;

#[cfg(feature = "plugin")]
pub mod commands;

#[cfg(feature = "mcp")]
pub mod mcp;

#[cfg(feature = "plugin")]
use nu_plugin::{Plugin, PluginCommand};

#[cfg(feature = "plugin")]
pub struct ScoutStatsPlugin;

#[cfg(feature = "plugin")]
impl Plugin for ScoutStatsPlugin {
    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").into()
    }

    fn commands(&self) -> Vec<Box<dyn PluginCommand<Plugin = Self>>> {
        vec![
            Box::new(commands::Categories),
            Box::new(commands::Participants),
            Box::new(commands::Aggregate),
            Box::new(commands::Table),
            Box::new(commands::Villages),
            Box::new(commands::Select),
            Box::new(commands::CacheCmd),
        ]
    }
}
