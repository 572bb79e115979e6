use config_loader::ConcurrencyConfig;
use std::{convert::Infallible, fmt, str::FromStr};

/// Tag used when none is given.
pub const DEFAULT_TAG: &str = ConcurrencyConfig::DEFAULT_TAG;

/// Coarse category of work, used to pick a pool's sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BusinessClass {
    /// Compute-bound work, bounded by the core count.
    Cpu,
    /// Local blocking I/O: disk, cache, database.
    #[default]
    HighIo,
    /// Remote or IPC-bound work. Tolerates the most concurrency but is
    /// admission-controlled.
    LowIo,
    /// Anything else; gets a fixed-size pool.
    Unclassified,
}

impl BusinessClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::HighIo => "HIGH_IO",
            Self::LowIo => "LOW_IO",
            Self::Unclassified => "UNCLASSIFIED",
        }
    }
}

impl fmt::Display for BusinessClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusinessClass {
    type Err = Infallible;

    /// Unknown names map to [`BusinessClass::Unclassified`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Self::Cpu,
            "high_io" | "high-io" | "highio" => Self::HighIo,
            "low_io" | "low-io" | "lowio" => Self::LowIo,
            _ => Self::Unclassified,
        })
    }
}

/// Identity of a pool: one live pool per key in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub class: BusinessClass,
    pub tag: String,
}

impl PoolKey {
    pub fn new(class: BusinessClass, tag: impl Into<String>) -> Self {
        Self {
            class,
            tag: tag.into(),
        }
    }

    /// Key for `class` under the default tag.
    pub fn of(class: BusinessClass) -> Self {
        Self::new(class, DEFAULT_TAG)
    }

    /// Fill an empty tag with `default_tag`.
    pub(crate) fn normalized(&self, default_tag: &str) -> Self {
        if self.tag.is_empty() {
            Self::new(self.class, default_tag)
        } else {
            self.clone()
        }
    }

    /// Name of the `n`th worker thread of this pool.
    pub fn thread_name(&self, n: usize) -> String {
        format!("{}#{}#{}", self.class, self.tag, n)
    }
}

impl Default for PoolKey {
    fn default() -> Self {
        Self::of(BusinessClass::default())
    }
}

impl From<BusinessClass> for PoolKey {
    fn from(class: BusinessClass) -> Self {
        Self::of(class)
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.tag)
    }
}
