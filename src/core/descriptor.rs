use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

/// Keys understood by the `--qsub=` value, in the order they are rendered.
pub const QSUB_KEYS: [&str; 5] = ["project", "nodes", "walltime", "mem", "queue"];

/// Memory classes understood by datacube-stats' qsub mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum MemClass {
    Small,
    Medium,
    Large,
}

/// Memory request: either a named class or an explicit amount such as `32GB`.
///
/// Anything that is not a known class is kept verbatim; the scheduler decides
/// whether it is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Memory {
    Class(MemClass),
    Amount(String),
}

impl From<String> for Memory {
    fn from(value: String) -> Self {
        match value.parse::<MemClass>() {
            Ok(class) => Memory::Class(class),
            Err(_) => Memory::Amount(value),
        }
    }
}

impl From<Memory> for String {
    fn from(memory: Memory) -> Self {
        memory.to_string()
    }
}

impl FromStr for Memory {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Memory::from(s.to_string()))
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Memory::Class(class) => write!(f, "{class}"),
            Memory::Amount(amount) => f.write_str(amount),
        }
    }
}

/// Cluster resource request for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceDescriptor {
    /// Accounting project code (`-P` / `project=`)
    pub project: Option<String>,
    pub nodes: Option<u32>,
    /// Wall-clock limit, forwarded verbatim (`24h`, `02:00:00`, ...)
    pub walltime: Option<String>,
    pub mem: Option<Memory>,
    pub queue: Option<String>,
    pub workers_per_node: Option<u32>,
    /// CPU count for minor jobs submitted with PBS directives
    pub ncpus: Option<u32>,
    /// Additional `key=value` pairs forwarded in the qsub value
    pub extra: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    /// Layers `other` on top of `self`; every field set in `other` wins.
    pub fn overlay(mut self, other: &ResourceDescriptor) -> Self {
        if other.project.is_some() {
            self.project = other.project.clone();
        }
        if other.nodes.is_some() {
            self.nodes = other.nodes;
        }
        if other.walltime.is_some() {
            self.walltime = other.walltime.clone();
        }
        if other.mem.is_some() {
            self.mem = other.mem.clone();
        }
        if other.queue.is_some() {
            self.queue = other.queue.clone();
        }
        if other.workers_per_node.is_some() {
            self.workers_per_node = other.workers_per_node;
        }
        if other.ncpus.is_some() {
            self.ncpus = other.ncpus;
        }
        self.extra
            .extend(other.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// The `key=value` pairs of the qsub value in render order.
    ///
    /// Extra keys that collide with a known key are dropped.
    pub fn qsub_pairs(&self) -> Vec<(String, String)> {
        let known = [
            ("project", self.project.clone()),
            ("nodes", self.nodes.map(|n| n.to_string())),
            ("walltime", self.walltime.clone()),
            ("mem", self.mem.as_ref().map(Memory::to_string)),
            ("queue", self.queue.clone()),
        ];

        let mut pairs: Vec<(String, String)> = known
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect();

        pairs.extend(
            self.extra
                .iter()
                .filter(|(key, _)| !QSUB_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        pairs
    }

    /// Serializes the descriptor into datacube-stats' qsub syntax,
    /// e.g. `project=r78,nodes=3,walltime=24h,mem=small,queue=normal`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dclaunch::core::descriptor::ResourceDescriptor;
    ///
    /// let descriptor: ResourceDescriptor = "project=r78,nodes=3".parse().unwrap();
    /// assert_eq!(descriptor.nodes, Some(3));
    /// assert_eq!(descriptor.to_qsub_value(), "project=r78,nodes=3");
    /// ```
    pub fn to_qsub_value(&self) -> String {
        self.qsub_pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn qsub_flag(&self) -> String {
        format!("--qsub={}", self.to_qsub_value())
    }

    pub fn workers_flag(&self) -> Option<String> {
        self.workers_per_node
            .map(|workers| format!("--workers-per-node={workers}"))
    }
}

impl FromStr for ResourceDescriptor {
    type Err = anyhow::Error;

    /// Parses a qsub value. Unknown keys are kept in `extra`.
    fn from_str(value: &str) -> Result<Self> {
        let mut descriptor = ResourceDescriptor::default();
        if value.trim().is_empty() {
            return Ok(descriptor);
        }

        let mut seen = BTreeSet::new();
        for pair in value.split(',') {
            let (key, val) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid qsub pair '{pair}'. Expected key=value"))?;
            let key = key.trim();
            if key.is_empty() {
                bail!("Invalid qsub pair '{pair}': key cannot be empty");
            }
            if !seen.insert(key) {
                bail!("Duplicate qsub key '{key}'");
            }

            match key {
                "project" => descriptor.project = Some(val.to_string()),
                "nodes" => {
                    let nodes = val
                        .trim()
                        .parse::<u32>()
                        .with_context(|| format!("Invalid node count '{val}'"))?;
                    descriptor.nodes = Some(nodes);
                }
                "walltime" => descriptor.walltime = Some(val.to_string()),
                "mem" => descriptor.mem = Some(Memory::from(val.to_string())),
                "queue" => descriptor.queue = Some(val.to_string()),
                _ => {
                    descriptor.extra.insert(key.to_string(), val.to_string());
                }
            }
        }

        Ok(descriptor)
    }
}
