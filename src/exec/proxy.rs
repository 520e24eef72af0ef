// src/exec/proxy.rs

//! Host proxy settings forwarded into containers and image builds.

use std::collections::{BTreeMap, BTreeSet};

const PROXY_VARIABLES: [&str; 4] = ["http_proxy", "https_proxy", "ftp_proxy", "no_proxy"];

/// Proxy variables from the host, in both lower and upper case as set.
///
/// `no_proxy` is extended with `extra_no_proxy` (container names on the task
/// network) so containers can reach each other without the proxy.
pub fn proxy_environment_variables(
    lookup: impl Fn(&str) -> Option<String>,
    extra_no_proxy: &BTreeSet<String>,
) -> BTreeMap<String, String> {
    let mut variables = BTreeMap::new();

    for name in PROXY_VARIABLES {
        for variant in [name.to_string(), name.to_uppercase()] {
            let Some(value) = lookup(&variant) else {
                continue;
            };

            let value = if name == "no_proxy" && !extra_no_proxy.is_empty() {
                let extra = extra_no_proxy.iter().cloned().collect::<Vec<_>>().join(",");
                if value.is_empty() {
                    extra
                } else {
                    format!("{value},{extra}")
                }
            } else {
                value
            };

            variables.insert(variant, value);
        }
    }

    variables
}
