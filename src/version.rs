// Build-time identity from Cargo.toml, reported by GET /version

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");
