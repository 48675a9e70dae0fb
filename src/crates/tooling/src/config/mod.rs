//! Environment-variable helpers for the handful of process-level knobs the
//! binary needs (log filter, default `MaxParallel`, MCP config path,
//! checkpoint resume flag).
//!
//! # Example
//!
//! ```rust,ignore
//! use tooling::config::{get_env_parse_or, get_env_bool};
//!
//! let max_parallel: usize = get_env_parse_or("SKILLGRAPH_MAX_PARALLEL", 4)?;
//! let resume = get_env_bool("SKILLGRAPH_RESUME")?.unwrap_or(false);
//! ```

mod env;

pub use env::{get_env, get_env_bool, get_env_parse, get_env_parse_or};
