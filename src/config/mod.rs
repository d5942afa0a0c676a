mod settings;

pub use settings::{
    ApiConfig, EmailStatusConfig, JwtConfig, LogConfig, PushConfig, ServerConfig, Settings,
};
