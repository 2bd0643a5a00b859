// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use parley_auth_core::ConfigError;

/// Pipeline configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct LoginConfig {
	/// Credits granted when a login creates the user. Every created
	/// user gets a balance record, a zero-credit one by default.
	pub initial_token_credits: i64,

	/// How long a pending authorization redirect stays valid.
	pub state_ttl: Duration,
}

const DEFAULT_STATE_TTL: Duration = Duration::from_secs(10 * 60);
const DEFAULT_INITIAL_TOKEN_CREDITS: i64 = 0;

impl Default for LoginConfig {
	fn default() -> Self {
		Self {
			initial_token_credits: DEFAULT_INITIAL_TOKEN_CREDITS,
			state_ttl: DEFAULT_STATE_TTL,
		}
	}
}

impl LoginConfig {
	/// Load configuration from environment variables:
	/// `PARLEY_INITIAL_TOKEN_CREDITS` and
	/// `PARLEY_LOGIN_STATE_TTL_SECS`. Absent variables fall back to
	/// defaults; present-but-unparseable values are configuration
	/// errors.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let initial_token_credits = parse_var::<i64>(&lookup, "PARLEY_INITIAL_TOKEN_CREDITS")?
			.unwrap_or(DEFAULT_INITIAL_TOKEN_CREDITS);

		let state_ttl = parse_var::<u64>(&lookup, "PARLEY_LOGIN_STATE_TTL_SECS")?
			.map(Duration::from_secs)
			.unwrap_or(DEFAULT_STATE_TTL);

		Ok(Self {
			initial_token_credits,
			state_ttl,
		})
	}
}

fn parse_var<T: std::str::FromStr>(
	lookup: &impl Fn(&str) -> Option<String>,
	name: &str,
) -> Result<Option<T>, ConfigError> {
	match lookup(name) {
		None => Ok(None),
		Some(raw) => {
			let trimmed = raw.trim();
			if trimmed.is_empty() {
				return Err(ConfigError::InvalidConfig(format!("{name} is empty")));
			}
			trimmed
				.parse()
				.map(Some)
				.map_err(|_| ConfigError::InvalidConfig(format!("{name} is not a valid number: {raw:?}")))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
		let map: HashMap<&str, &str> = vars.iter().copied().collect();
		move |name| map.get(name).map(|v| v.to_string())
	}

	#[test]
	fn defaults_apply_when_unset() {
		let config = LoginConfig::from_lookup(lookup(&[])).unwrap();

		assert_eq!(config.initial_token_credits, 0);
		assert_eq!(config.state_ttl, Duration::from_secs(600));
	}

	#[test]
	fn configured_values_parse() {
		let config = LoginConfig::from_lookup(lookup(&[
			("PARLEY_INITIAL_TOKEN_CREDITS", "20000"),
			("PARLEY_LOGIN_STATE_TTL_SECS", "300"),
		]))
		.unwrap();

		assert_eq!(config.initial_token_credits, 20000);
		assert_eq!(config.state_ttl, Duration::from_secs(300));
	}

	#[test]
	fn garbage_credits_are_a_config_error() {
		let result = LoginConfig::from_lookup(lookup(&[("PARLEY_INITIAL_TOKEN_CREDITS", "lots")]));
		assert!(result.is_err());
	}

	#[test]
	fn empty_value_is_a_config_error() {
		let result = LoginConfig::from_lookup(lookup(&[("PARLEY_INITIAL_TOKEN_CREDITS", "  ")]));
		assert!(result.is_err());
	}
}
