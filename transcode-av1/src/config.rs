//! AV1 frame decoder configuration.

/// Frame decoder configuration.
///
/// The header decides whether a post-filter stage applies to a frame; these
/// switches can only turn stages off, never force one on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Av1DecoderConfig {
    /// Worker threads for parallel tile decoding (0 = auto, 1 = sequential).
    pub tile_threads: usize,
    /// Run the loop filter pass when the header enables it.
    pub enable_loop_filter: bool,
    /// Run the CDEF stage when the header enables it.
    pub enable_cdef: bool,
    /// Run super-resolution upscaling when the header enables it.
    pub enable_super_res: bool,
    /// Run loop restoration when the header enables it.
    pub enable_loop_restoration: bool,
}

impl Default for Av1DecoderConfig {
    fn default() -> Self {
        Self {
            tile_threads: 1,
            enable_loop_filter: true,
            enable_cdef: true,
            enable_super_res: true,
            enable_loop_restoration: true,
        }
    }
}

impl Av1DecoderConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of tile worker threads.
    pub fn with_tile_threads(mut self, threads: usize) -> Self {
        self.tile_threads = threads;
        self
    }

    /// Enable or disable the loop filter.
    pub fn with_loop_filter(mut self, enabled: bool) -> Self {
        self.enable_loop_filter = enabled;
        self
    }

    /// Enable or disable CDEF.
    pub fn with_cdef(mut self, enabled: bool) -> Self {
        self.enable_cdef = enabled;
        self
    }

    /// Enable or disable super-resolution upscaling.
    pub fn with_super_res(mut self, enabled: bool) -> Self {
        self.enable_super_res = enabled;
        self
    }

    /// Enable or disable loop restoration.
    pub fn with_loop_restoration(mut self, enabled: bool) -> Self {
        self.enable_loop_restoration = enabled;
        self
    }

    /// Disable every post-filter stage.
    pub fn without_post_filters(self) -> Self {
        self.with_loop_filter(false)
            .with_cdef(false)
            .with_super_res(false)
            .with_loop_restoration(false)
    }

    /// Get the effective number of tile threads.
    pub fn effective_threads(&self) -> usize {
        if self.tile_threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.tile_threads
        }
    }

    /// Whether tiles are decoded on a worker pool.
    pub fn is_parallel(&self) -> bool {
        self.effective_threads() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Av1DecoderConfig::default();
        assert_eq!(config.tile_threads, 1);
        assert!(config.enable_loop_filter);
        assert!(config.enable_cdef);
        assert!(!config.is_parallel());
    }

    #[test]
    fn test_builder() {
        let config = Av1DecoderConfig::new()
            .with_tile_threads(4)
            .with_cdef(false)
            .with_loop_restoration(false);
        assert_eq!(config.effective_threads(), 4);
        assert!(config.is_parallel());
        assert!(!config.enable_cdef);
        assert!(!config.enable_loop_restoration);
        assert!(config.enable_super_res);
    }

    #[test]
    fn test_without_post_filters() {
        let config = Av1DecoderConfig::new().without_post_filters();
        assert!(!config.enable_loop_filter);
        assert!(!config.enable_cdef);
        assert!(!config.enable_super_res);
        assert!(!config.enable_loop_restoration);
    }

    #[test]
    fn test_auto_threads() {
        let config = Av1DecoderConfig::new().with_tile_threads(0);
        assert!(config.effective_threads() >= 1);
    }
}
