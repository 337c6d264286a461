//! Alias naming for cross-region replicas.
//!
//! Aliases carry their home region as a trailing `_<region>` token, e.g.
//! `alias/payments_ca-central-1`. A replica in `eu-west-1` gets the same
//! alias with the token swapped: `alias/payments_eu-west-1`.

pub const ALIAS_PREFIX: &str = "alias/";
const AWS_MANAGED_ALIAS_PREFIX: &str = "alias/aws/";

/// Returns the replica alias for `alias`, or `None` when the alias does not
/// follow the `alias/<name>_<source_region>` convention.
pub fn replica_alias_name(alias: &str, source_region: &str, target_region: &str) -> Option<String> {
    let source_region = source_region.trim();
    let target_region = target_region.trim();
    if source_region.is_empty() || target_region.is_empty() {
        return None;
    }

    if !alias.starts_with(ALIAS_PREFIX) || alias.starts_with(AWS_MANAGED_ALIAS_PREFIX) {
        return None;
    }

    let base = alias.strip_suffix(&format!("_{source_region}"))?;
    if base.len() <= ALIAS_PREFIX.len() || base.chars().any(char::is_whitespace) {
        return None;
    }

    Some(format!("{base}_{target_region}"))
}

/// Maps every convention-following alias to its replica name, preserving
/// order and dropping duplicates.
pub fn replica_alias_names<'a>(
    aliases: impl IntoIterator<Item = &'a str>,
    source_region: &str,
    target_region: &str,
) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for alias in aliases {
        if let Some(name) = replica_alias_name(alias, source_region, target_region) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}
