pub mod allowlist;
pub mod api;
pub mod catalog;
pub mod config;
pub mod entity;
pub mod gateway;
pub mod routing;
pub mod scene;
pub mod upstream;

pub use catalog::Catalog;
pub use catalog::EntityCategory;
pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use entity::OnOff;
pub use entity::Scene;
pub use entity::Switch;
pub use gateway::Gateway;
pub use gateway::GatewayError;
pub use upstream::HttpUpstream;
pub use upstream::Upstream;
pub use upstream::UpstreamError;
