//! Env & Secrets: workspace secret file and `.env` resolution, `$ALIAS`
//! indirection, and wildcard env-name expansion for container injection.

#![deny(unsafe_code)]

mod error;
mod injection;
mod secrets_file;
mod sources;
mod wildcard;

pub use error::{EnvError, EnvResult};
pub use injection::{resolve_injection, to_flag_pairs};
pub use secrets_file::{parse_kv_file, parse_kv_str};
pub use sources::EnvSources;
pub use wildcard::{expand as expand_wildcard, is_api_key_name, pattern_regex};
