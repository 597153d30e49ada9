use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use withconfig_core::EnvMap;

/// Whether the child starts from the launcher's own environment.
///
/// `Inherit` is the default: the child keeps `PATH`, locale and everything
/// else, with the resolved configuration layered on top. `Isolated` passes
/// only the resolved configuration, so commands must then be given by path
/// unless the configuration itself sets `PATH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvPolicy {
    #[default]
    Inherit,
    Isolated,
}

/// Apply `overrides` on top of `base`. Keys present in both take the
/// override's value; everything else in `base` is kept as is.
pub fn overlay<K, V, B, O>(base: B, overrides: O) -> BTreeMap<K, V>
where
    K: Ord,
    B: IntoIterator<Item = (K, V)>,
    O: IntoIterator<Item = (K, V)>,
{
    let mut effective: BTreeMap<K, V> = base.into_iter().collect();
    effective.extend(overrides);
    effective
}

impl EnvPolicy {
    /// Build the full environment for a child process.
    pub fn effective_environment(&self, overrides: &EnvMap) -> BTreeMap<OsString, OsString> {
        let base: Vec<(OsString, OsString)> = match self {
            EnvPolicy::Inherit => std::env::vars_os().collect(),
            EnvPolicy::Isolated => Vec::new(),
        };
        overlay(
            base,
            overrides
                .iter()
                .map(|(k, v)| (OsString::from(k), OsString::from(v))),
        )
    }
}

/// The `PATH` a child with this environment would search.
pub fn search_path(env: &BTreeMap<OsString, OsString>) -> Option<&OsString> {
    env.get(OsStr::new("PATH"))
}
