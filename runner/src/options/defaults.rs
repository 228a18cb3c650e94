use super::OptionValue;
use std::path::PathBuf;

/// A named, ordered table of default values for one category of launcher options
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSet {
    pub name: &'static str,
    entries: Vec<(String, OptionValue)>,
}

impl OptionSet {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    /// register a default, replacing an earlier entry of the same name in place
    pub fn with(mut self, name: &str, value: OptionValue) -> Self {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name.to_owned(), value)),
        }

        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The compiled in defaults for a single host.
///
/// Host specific values (the network interface used for the out of band and NCCL socket
/// traffic, the preload library) are passed in explicitly instead of being looked up when
/// the table is built.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultOptions {
    pub basic: OptionSet,
    pub environment: OptionSet,
    pub interconnect: OptionSet,
}

impl DefaultOptions {
    pub fn new(network_interface: &str) -> Self {
        Self {
            basic: OptionSet::new("basic")
                .with("map-by", OptionValue::text("slot"))
                .with("bind-to", OptionValue::text("none"))
                .with("allow-run-as-root", OptionValue::Absent)
                .with("tag-output", OptionValue::Absent),
            environment: OptionSet::new("environment")
                .with("NCCL_MIN_RINGS", OptionValue::Integer(4))
                .with("NCCL_SOCKET_IFNAME", OptionValue::text(network_interface))
                .with("NCCL_DEBUG", OptionValue::text("INFO"))
                .with("LD_PRELOAD", OptionValue::Absent)
                .with("LD_LIBRARY_PATH", OptionValue::Absent)
                .with("PATH", OptionValue::Absent),
            interconnect: OptionSet::new("interconnect")
                .with("FI_PROVIDER", OptionValue::text("efa"))
                .with("FI_EFA_USE_DEVICE_RDMA", OptionValue::Integer(1))
                .with("NCCL_PROTO", OptionValue::text("simple")),
        }
    }

    /// library preloaded into every rank, e.g., a hostname shim
    pub fn with_preload(mut self, library: Option<PathBuf>) -> Self {
        if let Some(library) = library {
            self.environment = self.environment.with(
                "LD_PRELOAD",
                OptionValue::Text(library.to_string_lossy().into_owned()),
            );
        }

        self
    }

    /// all sets in resolution order, later sets shadow earlier ones
    pub fn sets(&self) -> [&OptionSet; 3] {
        [&self.basic, &self.environment, &self.interconnect]
    }
}
