// Library for tests to access modules

pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod routes;
pub mod session;
pub mod stats;
pub mod store;
pub mod version;
pub mod worker;
