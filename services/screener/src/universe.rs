//! Sector to symbol membership dataset

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    pub name: String,
    pub symbols: Vec<String>,
}

/// Ordered list of sectors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: Vec<Sector>,
}

impl Universe {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let universe: Universe = serde_yaml::from_str(yaml).context("Invalid universe YAML")?;
        Ok(universe)
    }

    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read universe {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("Failed to load {}", path.display()))
    }

    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sector(&self, name: &str) -> Option<&Sector> {
        self.sectors
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Requested sectors in request order, each cut to `max_symbols`.
    ///
    /// An empty request selects every sector. Unknown names are skipped.
    /// A symbol listed under several requested sectors stays only in the
    /// first one.
    pub fn resolve(&self, requested: &[String], max_symbols: usize) -> Vec<Sector> {
        let selected: Vec<&Sector> = if requested.is_empty() {
            self.sectors.iter().collect()
        } else {
            requested
                .iter()
                .filter_map(|name| {
                    let sector = self.sector(name);
                    if sector.is_none() {
                        warn!("Unknown sector {}, skipping", name);
                    }
                    sector
                })
                .collect()
        };

        let mut seen_sectors = HashSet::new();
        let mut seen_symbols = HashSet::new();
        let mut resolved = Vec::with_capacity(selected.len());

        for sector in selected {
            if !seen_sectors.insert(sector.name.as_str()) {
                continue;
            }
            let symbols: Vec<String> = sector
                .symbols
                .iter()
                .take(max_symbols)
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty() && seen_symbols.insert(s.clone()))
                .collect();
            resolved.push(Sector {
                name: sector.name.clone(),
                symbols,
            });
        }

        resolved
    }
}
