mod settings;

pub use settings::{
    OtelConfig, RedisConfig, ServerConfig, Settings, StoreBackend, StoreConfig, TickConfig,
    WebSocketConfig,
};
