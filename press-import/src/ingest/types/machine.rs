//! Machine profiles and label lookup

use std::collections::HashMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// A physical press as configured by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineProfile {
    /// Stable identifier (e.g. "P-1200")
    pub id: String,
    /// Display name
    pub name: String,
    /// Baseline hits per hour used for efficiency
    pub target_rate: f64,
    /// Extra row labels used for this machine in spreadsheets
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl MachineProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, target_rate: f64) -> Self {
        MachineProfile {
            id: id.into(),
            name: name.into(),
            target_rate,
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str())
            .chain(std::iter::once(self.name.as_str()))
            .chain(self.aliases.iter().map(|a| a.as_str()))
    }
}

/// Validated set of machines, indexed by every label they answer to
#[derive(Debug, Clone, Default)]
pub struct MachineRegistry {
    machines: Vec<MachineProfile>,
    by_label: HashMap<String, usize>,
}

impl MachineRegistry {
    /// Build a registry, rejecting duplicate ids, ambiguous labels and bad rates
    pub fn new(machines: Vec<MachineProfile>) -> Result<Self> {
        let mut by_label: HashMap<String, usize> = HashMap::new();

        for (idx, machine) in machines.iter().enumerate() {
            if machine.id.trim().is_empty() {
                bail!("Machine at position {} has an empty id", idx + 1);
            }
            if !(machine.target_rate.is_finite() && machine.target_rate > 0.0) {
                bail!(
                    "Machine '{}' has invalid target rate {}; it must be a positive number",
                    machine.id,
                    machine.target_rate
                );
            }
            if machines[..idx].iter().any(|m| m.id == machine.id) {
                bail!("Duplicate machine id '{}'", machine.id);
            }

            for label in machine.labels() {
                let key = normalize_label(label);
                if key.is_empty() {
                    continue;
                }
                match by_label.get(&key) {
                    Some(&other) if other != idx => bail!(
                        "Label '{}' matches both '{}' and '{}'",
                        label,
                        machines[other].id,
                        machine.id
                    ),
                    _ => {
                        by_label.insert(key, idx);
                    }
                }
            }
        }

        Ok(MachineRegistry { machines, by_label })
    }

    pub fn get(&self, id: &str) -> Option<&MachineProfile> {
        self.machines.iter().find(|m| m.id == id)
    }

    /// Find the machine a sheet row label refers to
    pub fn match_label(&self, label: &str) -> Option<&MachineProfile> {
        self.by_label
            .get(&normalize_label(label))
            .map(|&idx| &self.machines[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &MachineProfile> {
        self.machines.iter()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

/// Case- and whitespace-insensitive form of a label
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
