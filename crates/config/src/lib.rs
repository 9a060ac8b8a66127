//! # Strata Config
//!
//! Read-only, sectioned configuration loaded once at startup.
//!
//! A config file is a TOML (or JSON) document whose top-level tables are
//! *sections*. Resources look up their fields as `<name>.<field>` inside the
//! section for their kind, so both of these spell the same key:
//!
//! ```toml
//! [database]
//! "primary.host" = "db.internal"
//!
//! [database.primary]
//! host = "db.internal"
//! ```
//!
//! ```
//! use strata_config::{Config, RunMode};
//!
//! # fn main() -> strata_config::ConfigResult<()> {
//! let config = Config::from_toml_str(r#"
//!     mode = "debug"
//!
//!     [redis]
//!     cache.host = "127.0.0.1"
//!     cache.port = 6379
//! "#)?;
//!
//! let redis = config.section("redis");
//! assert_eq!(redis.string("cache.host")?, "127.0.0.1");
//! assert_eq!(redis.int_or("cache.max_open", 20)?, 20);
//! assert_eq!(config.mode(), RunMode::Debug);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod error;
mod section;

pub use config::{Config, RunMode};
pub use error::{ConfigError, ConfigResult};
pub use section::Section;
