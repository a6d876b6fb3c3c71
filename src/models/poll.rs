use std::{collections::HashSet, path::Path};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// A fixed-option question. Defined at configuration time and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollDefinition {
    pub id: String,
    pub question: String,
    pub category: String,
    pub options: Vec<String>,
}

impl PollDefinition {
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// Poll ids whose answers act as voter demographics for filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DemographicPolls {
    pub age: String,
    pub residence: String,
    pub affiliation: String,
}

impl DemographicPolls {
    pub fn ids(&self) -> [&str; 3] {
        [&self.age, &self.residence, &self.affiliation]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCatalog {
    polls: Vec<PollDefinition>,
    demographics: DemographicPolls,
}

impl PollCatalog {
    pub fn new(polls: Vec<PollDefinition>, demographics: DemographicPolls) -> anyhow::Result<Self> {
        let catalog = Self {
            polls,
            demographics,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading poll catalog {}", path.display()))?;
        let catalog: PollCatalog = serde_json::from_str(&raw)
            .with_context(|| format!("parsing poll catalog {}", path.display()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for poll in &self.polls {
            if poll.id.trim().is_empty() {
                bail!("poll with question {:?} has an empty id", poll.question);
            }
            if !seen.insert(poll.id.as_str()) {
                bail!("duplicate poll id {}", poll.id);
            }
            let distinct: HashSet<&str> = poll.options.iter().map(String::as_str).collect();
            if distinct.len() != poll.options.len() {
                bail!("poll {} lists the same option twice", poll.id);
            }
            if distinct.len() < 2 {
                bail!("poll {} needs at least two options", poll.id);
            }
        }
        for id in self.demographics.ids() {
            if !seen.contains(id) {
                bail!("demographic poll {} is not defined in the catalog", id);
            }
        }
        Ok(())
    }

    pub fn get(&self, poll_id: &str) -> Option<&PollDefinition> {
        self.polls.iter().find(|p| p.id == poll_id)
    }

    pub fn polls(&self) -> &[PollDefinition] {
        &self.polls
    }

    pub fn demographics(&self) -> &DemographicPolls {
        &self.demographics
    }
}
