use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::repository;

pub const CAPABILITIES_KEY: &str = "capabilities";
pub const KEYWORD_NOT_DEFINED_KEY: &str = "keyword_not_defined";
pub const DEFAULT_KEYWORD_NOT_DEFINED: &str = "Keyword not defined";

/// A reporting plugin whose reports may be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Capability {
    UserCountry,
    Referrers,
    CustomVariables,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::UserCountry,
        Capability::Referrers,
        Capability::CustomVariables,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::UserCountry => "UserCountry",
            Capability::Referrers => "Referrers",
            Capability::CustomVariables => "CustomVariables",
        };
        f.write_str(s)
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown capability: {s}")))
    }
}

/// The set of enabled capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    pub fn all() -> Self {
        Self(Capability::ALL.into_iter().collect())
    }

    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Parse a comma-separated list such as `UserCountry,Referrers`.
    pub fn parse(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Capability::from_str)
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&names.join(","))
    }
}

/// Reporting settings read from the `app_config` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub capabilities: Capabilities,
    pub keyword_not_defined: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::all(),
            keyword_not_defined: DEFAULT_KEYWORD_NOT_DEFINED.to_string(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults for unset keys.
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(caps) = repository::get_config(conn, CAPABILITIES_KEY)? {
            settings.capabilities = Capabilities::parse(&caps)?;
        }
        if let Some(label) = repository::get_config(conn, KEYWORD_NOT_DEFINED_KEY)? {
            settings.keyword_not_defined = label;
        }
        Ok(settings)
    }

    /// Check a config value before it is stored.
    pub fn validate(key: &str, value: &str) -> Result<()> {
        match key {
            CAPABILITIES_KEY => Capabilities::parse(value).map(|_| ()),
            KEYWORD_NOT_DEFINED_KEY => Ok(()),
            other => Err(Error::Config(format!("unknown config key: {other}"))),
        }
    }
}
