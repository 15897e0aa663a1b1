use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use exec_harness_core::prelude::{Workload, WorkloadError};
use exec_harness_summary_model::workload_fingerprint;
use serde::Deserialize;

use crate::types::HarnessResult;

/// Names of the built-in workload sets, see [WorkloadSet::preset].
pub const PRESETS: [&str; 5] = [
    "kitchen-wait",
    "kitchen-compute",
    "ingredients",
    "gil-demo",
    "mixed",
];

/// A named, validated set of workloads that every strategy of a comparison runs.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadSet {
    name: String,
    workloads: Vec<Workload>,
}

impl WorkloadSet {
    /// Build a set, checking each workload and that no two share a name.
    pub fn new(name: impl Into<String>, workloads: Vec<Workload>) -> Result<Self, WorkloadError> {
        let mut seen = HashSet::new();
        for workload in &workloads {
            workload.validate()?;
            if !seen.insert(workload.name()) {
                return Err(WorkloadError::DuplicateName {
                    name: workload.name().to_string(),
                });
            }
        }

        Ok(Self {
            name: name.into(),
            workloads,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    pub fn fingerprint(&self) -> String {
        workload_fingerprint(&self.workloads)
    }

    /// One of the built-in sets.
    ///
    /// - `kitchen-wait`: coffee, toast and fruit, waiting 1.0s, 0.5s and 0.3s.
    /// - `kitchen-compute`: three equal compute workloads, risotto, sauce and vegetables.
    /// - `ingredients`: three compute workloads of different sizes.
    /// - `gil-demo`: two equal compute workloads.
    /// - `mixed`: two waits and one compute workload.
    pub fn preset(name: &str) -> HarnessResult<Self> {
        let builder = match name {
            "kitchen-wait" => WorkloadSetBuilder::new(name)
                .wait("coffee", 1.0)
                .wait("toast", 0.5)
                .wait("fruit", 0.3),
            "kitchen-compute" => WorkloadSetBuilder::new(name)
                .compute("risotto", 100_000_000)
                .compute("sauce", 100_000_000)
                .compute("vegetables", 100_000_000),
            "ingredients" => WorkloadSetBuilder::new(name)
                .compute("potatoes", 160_000_000)
                .compute("carrots", 120_000_000)
                .compute("onions", 100_000_000),
            "gil-demo" => WorkloadSetBuilder::new(name)
                .compute("task-1", 200_000_000)
                .compute("task-2", 200_000_000),
            "mixed" => WorkloadSetBuilder::new(name)
                .wait("coffee", 1.0)
                .wait("toast", 0.5)
                .compute("risotto", 100_000_000),
            other => bail!(
                "Unknown workload set '{other}', expected one of: {}",
                PRESETS.join(", ")
            ),
        };

        builder.build().context("Built-in workload set is invalid")
    }

    /// Parse a workload set from TOML.
    ///
    /// ```toml
    /// name = "custom"
    ///
    /// [[workload]]
    /// name = "coffee"
    /// wait_secs = 1.0
    ///
    /// [[workload]]
    /// name = "risotto"
    /// iterations = 5000000
    /// label = "Risotto"
    /// fail = false
    /// ```
    pub fn from_toml_str(content: &str) -> HarnessResult<Self> {
        let file: WorkloadSetFile =
            toml::from_str(content).context("Failed to parse workload set")?;

        let name = file.name.unwrap_or_else(|| "custom".to_string());
        let mut builder = WorkloadSetBuilder::new(name);
        for entry in file.workload {
            builder = match (entry.wait_secs, entry.iterations) {
                (Some(secs), None) => builder.wait(&entry.name, secs),
                (None, Some(iterations)) => builder.compute(&entry.name, iterations),
                _ => bail!(
                    "Workload '{}' must set exactly one of 'wait_secs' or 'iterations'",
                    entry.name
                ),
            };
            if let Some(label) = entry.label {
                builder = builder.label(&entry.name, label);
            }
            if entry.fail {
                builder = builder.failing(&entry.name);
            }
        }

        builder.build().context("Invalid workload set")
    }

    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workload set from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load workload set from {}", path.display()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkloadSetFile {
    name: Option<String>,
    #[serde(default)]
    workload: Vec<WorkloadEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkloadEntry {
    name: String,
    wait_secs: Option<f64>,
    iterations: Option<u64>,
    label: Option<String>,
    #[serde(default)]
    fail: bool,
}

/// The builder for a workload set.
///
/// Errors are collected and reported by [WorkloadSetBuilder::build], so a whole set can be
/// described in one chain.
#[derive(Debug)]
pub struct WorkloadSetBuilder {
    name: String,
    workloads: Vec<Workload>,
    error: Option<WorkloadError>,
}

impl WorkloadSetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workloads: Vec::new(),
            error: None,
        }
    }

    /// Add a wait workload of `secs` seconds.
    pub fn wait(self, name: &str, secs: f64) -> Self {
        self.push(Workload::wait_secs(name, secs))
    }

    pub fn wait_for(self, name: &str, duration: Duration) -> Self {
        self.push(Workload::wait(name, duration))
    }

    /// Add a compute workload summing `iterations` values.
    pub fn compute(self, name: &str, iterations: u64) -> Self {
        self.push(Workload::compute(name, iterations))
    }

    pub fn label(mut self, name: &str, label: impl Into<String>) -> Self {
        let label = label.into();
        self.update(name, |w| w.with_label(label));
        self
    }

    /// Make the named workload fail deliberately instead of running.
    pub fn failing(mut self, name: &str) -> Self {
        self.update(name, Workload::with_injected_failure);
        self
    }

    pub fn build(self) -> Result<WorkloadSet, WorkloadError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        WorkloadSet::new(self.name, self.workloads)
    }

    fn push(mut self, workload: Result<Workload, WorkloadError>) -> Self {
        match workload {
            Ok(workload) => self.workloads.push(workload),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    fn update(&mut self, name: &str, f: impl FnOnce(Workload) -> Workload) {
        if let Some(index) = self.workloads.iter().position(|w| w.name() == name) {
            let workload = self.workloads.remove(index);
            self.workloads.insert(index, f(workload));
        }
    }
}
