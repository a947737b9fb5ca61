//! Config string utils.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ConfigError;

/// Parses config value string, which consists of two parts - name and options.
/// Example: Ban[vms=vm1;vm2,hosts=n1] parts are name Ban and options string "vms=vm1;vm2,hosts=n1".
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.trim().split_once('[') {
        Some((l, r)) => (l.trim().to_string(), Some(r.replace(']', ""))),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    options
}

/// Parses list option value, items are separated by `;`.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

/// Returns the parsed option value or `default` if the option is absent.
pub(crate) fn option_or<T: FromStr>(
    options: &HashMap<String, String>,
    name: &str,
    default: T,
    config_str: &str,
) -> Result<T, ConfigError> {
    match options.get(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidOption {
            value: config_str.to_string(),
            option: name.to_string(),
        }),
        None => Ok(default),
    }
}

/// Returns the parsed value of a mandatory option.
pub(crate) fn required_option<T: FromStr>(
    options: &HashMap<String, String>,
    name: &str,
    config_str: &str,
) -> Result<T, ConfigError> {
    let invalid = || ConfigError::InvalidOption {
        value: config_str.to_string(),
        option: name.to_string(),
    };
    options.get(name).ok_or_else(invalid)?.parse().map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_value() {
        let (name, options) = parse_config_value("Ban[vms=vm1;vm2,hosts=n1]");
        assert_eq!(name, "Ban");
        let options = parse_options(&options.unwrap());
        assert_eq!(parse_list(&options["vms"]), vec!["vm1", "vm2"]);
        assert_eq!(parse_list(&options["hosts"]), vec!["n1"]);
        assert_eq!(options.get("max"), None);

        assert_eq!(parse_config_value("MinimizeMigrations"), ("MinimizeMigrations".to_string(), None));
    }

    #[test]
    fn test_option_values() {
        let options = parse_options("weight=3,max=x");
        assert_eq!(option_or(&options, "weight", 1i64, "cfg").unwrap(), 3);
        assert_eq!(option_or(&options, "other", 1i64, "cfg").unwrap(), 1);
        assert!(matches!(
            required_option::<usize>(&options, "max", "cfg"),
            Err(ConfigError::InvalidOption { .. })
        ));
        assert!(required_option::<usize>(&options, "absent", "cfg").is_err());
    }
}
