//! Instance types offered to the scheduler

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compute resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub cpu_millis: u64,
    pub memory_bytes: u64,
    pub pods: u64,
}

impl Resources {
    pub fn saturating_sub(self, other: Resources) -> Resources {
        Resources {
            cpu_millis: self.cpu_millis.saturating_sub(other.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_sub(other.memory_bytes),
            pods: self.pods.saturating_sub(other.pods),
        }
    }
}

/// Where and how an instance type can be launched, with its price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    pub zone: String,
    pub capacity_type: String,
    pub price: f64,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceType {
    pub name: String,

    /// Label key to allowed values
    pub requirements: BTreeMap<String, Vec<String>>,

    pub offerings: Vec<Offering>,

    pub capacity: Resources,

    /// Resources reserved for the kubelet and system daemons
    pub overhead: Resources,
}

impl InstanceType {
    /// First value of requirement `key`
    pub fn requirement(&self, key: &str) -> Option<&str> {
        self.requirements
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn allocatable(&self) -> Resources {
        self.capacity.saturating_sub(self.overhead)
    }

    /// Cheapest available offering
    pub fn cheapest_offering(&self) -> Option<&Offering> {
        self.offerings
            .iter()
            .filter(|o| o.available)
            .min_by(|a, b| a.price.total_cmp(&b.price))
    }
}
