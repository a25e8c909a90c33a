//! Test case registry: named groups of literal test values

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::config::{ConfigError, RunConfig, ScenarioDef, parse_by_extension};

/// An ordered sequence of test values sharing a group name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseGroup {
    pub name: String,
    pub values: Vec<String>,
}

/// Read-only mapping from group name to test values, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct TestCaseRegistry {
    groups: BTreeMap<String, TestCaseGroup>,
}

/// Only the `test_cases` table of a run config file.
#[derive(Deserialize)]
struct TestCasesFile {
    #[serde(default)]
    test_cases: BTreeMap<String, Vec<String>>,
}

impl TestCaseRegistry {
    /// Load the `test_cases` table from a run configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        let file: TestCasesFile = parse_by_extension(path, &content)?;
        Ok(Self::from_groups(file.test_cases))
    }

    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self::from_groups(config.test_cases.clone())
    }

    #[must_use]
    pub fn from_groups(groups: BTreeMap<String, Vec<String>>) -> Self {
        let groups = groups
            .into_iter()
            .map(|(name, values)| {
                let group = TestCaseGroup {
                    name: name.clone(),
                    values,
                };
                (name, group)
            })
            .collect();
        Self { groups }
    }

    /// Look up a group by name. A missing group is a broken test definition.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingGroup` if no group has this name.
    pub fn group(&self, name: &str) -> Result<&TestCaseGroup, ConfigError> {
        self.groups
            .get(name)
            .ok_or_else(|| ConfigError::MissingGroup(name.to_string()))
    }

    /// Values for a scenario: its group when named, inline values otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingGroup` if the named group is absent.
    pub fn values_for<'a>(&'a self, scenario: &'a ScenarioDef) -> Result<&'a [String], ConfigError> {
        match &scenario.group {
            Some(name) => Ok(&self.group(name)?.values),
            None => Ok(&scenario.values),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
