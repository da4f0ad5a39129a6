mod settings;

pub use settings::{
    DatabaseConfig, GatewayConfig, IdentityConfig, JwtConfig, OtelConfig, ServerConfig, Settings,
    UserSeed,
};
