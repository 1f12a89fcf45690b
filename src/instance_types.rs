use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub trait VcpuLookup {
    fn vcpus(&self, instance_type: &str) -> Option<u32>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTypes {
    #[serde(default)]
    instance_types: BTreeMap<String, u32>,
}

impl InstanceTypes {
    pub fn new(instance_types: BTreeMap<String, u32>) -> Self {
        Self { instance_types }
    }

    pub fn len(&self) -> usize {
        self.instance_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instance_types.is_empty()
    }

    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "instance type cache not readable");
                return Self::default();
            }
        };
        match serde_json::from_str::<InstanceTypes>(&raw) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed instance type cache");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        debug!(path = %path.display(), entries = self.len(), "saved instance type cache");
        Ok(())
    }
}

impl VcpuLookup for InstanceTypes {
    fn vcpus(&self, instance_type: &str) -> Option<u32> {
        self.instance_types.get(instance_type).copied()
    }
}

impl FromIterator<(String, u32)> for InstanceTypes {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
