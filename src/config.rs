//! Stream configuration.

/// Configuration for stream construction
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Number of queued items a readable stream accepts before it reports
    /// no remaining demand
    pub high_water_mark: usize,
    /// Number of chunks a writable stream buffers before `write` waits
    pub write_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 1,
            write_buffer: 1,
        }
    }
}

impl StreamConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the readable high-water mark
    pub fn high_water_mark(mut self, size: usize) -> Self {
        self.high_water_mark = size;
        self
    }

    /// Set the writable buffer size. Zero is treated as one.
    pub fn write_buffer(mut self, size: usize) -> Self {
        self.write_buffer = size;
        self
    }
}
