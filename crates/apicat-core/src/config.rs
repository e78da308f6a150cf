//! Build options, environment overrides and format guard constants.

use flate2::Compression;

// Format guards
pub const MAX_TABLE_SIZE: usize = i32::MAX as usize;
// Upper bound on the buffer reserved from header sizes before inflating.
pub const MAX_LOAD_RESERVATION: usize = 64 * 1024 * 1024;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
pub const MAX_COMPRESSION_LEVEL: u32 = 9;
pub const DEFAULT_UNIT_WORKERS: usize = 4;

// Unit discovery
pub const UNIT_FILE_EXTENSION: &str = "json";

// Namespaces listed first when ordering APIs, in priority order.
pub const PREFERRED_NAMESPACES: &[&str] = &["System", "Microsoft"];

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.trim().parse::<u32>().ok()
}

/// Compression level from `APICAT_COMPRESSION_LEVEL`, clamped to 0..=9.
pub fn compression_level_from_env() -> u32 {
    env_u32("APICAT_COMPRESSION_LEVEL")
        .unwrap_or(DEFAULT_COMPRESSION_LEVEL)
        .min(MAX_COMPRESSION_LEVEL)
}

/// Parser thread count from `APICAT_UNIT_WORKERS`.
pub fn unit_workers_from_env() -> usize {
    env_u32("APICAT_UNIT_WORKERS")
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_UNIT_WORKERS)
        .max(1)
}

/// Options for the catalog writer.
#[derive(Clone, Debug)]
pub struct WriterOptions {
    pub compression_level: u32,
}

impl WriterOptions {
    pub fn from_env() -> Self {
        Self {
            compression_level: compression_level_from_env(),
        }
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(MAX_COMPRESSION_LEVEL);
        self
    }

    pub(crate) fn compression(&self) -> Compression {
        Compression::new(self.compression_level.min(MAX_COMPRESSION_LEVEL))
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Options for loading unit files from disk.
#[derive(Clone, Debug)]
pub struct IngestOptions {
    pub workers: usize,
}

impl IngestOptions {
    pub fn from_env() -> Self {
        Self {
            workers: unit_workers_from_env(),
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_UNIT_WORKERS,
        }
    }
}
