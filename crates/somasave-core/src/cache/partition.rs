use std::fmt;

/// One of the four named stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Precache,
    Static,
    Dynamic,
    Api,
}

impl Partition {
    pub const ALL: [Partition; 4] = [
        Partition::Precache,
        Partition::Static,
        Partition::Dynamic,
        Partition::Api,
    ];

    fn prefix(self) -> &'static str {
        match self {
            Partition::Precache => "somasave-portal",
            Partition::Static => "somasave-static",
            Partition::Dynamic => "somasave-dynamic",
            Partition::Api => "somasave-api",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Precache => write!(f, "precache"),
            Partition::Static => write!(f, "static"),
            Partition::Dynamic => write!(f, "dynamic"),
            Partition::Api => write!(f, "api"),
        }
    }
}

/// Store names for one cache generation. All four share the version suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheNames {
    version: u32,
}

impl CacheNames {
    pub fn new(version: u32) -> Self {
        Self { version }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn name(&self, partition: Partition) -> String {
        format!("{}-v{}", partition.prefix(), self.version)
    }

    pub fn current(&self) -> Vec<String> {
        Partition::ALL.iter().map(|p| self.name(*p)).collect()
    }

    pub fn is_current(&self, store: &str) -> bool {
        Partition::ALL.iter().any(|p| self.name(*p) == store)
    }
}
