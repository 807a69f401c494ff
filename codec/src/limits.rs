pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 64 * 1024 * 1024;

/// Bounds applied symmetrically by the encoder and decoder.
///
/// Depth counts containers: a top-level scalar is depth 0, a top-level array
/// is depth 1, an array inside it depth 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLimits {
    pub max_depth: usize,
    pub max_content_bytes: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        }
    }
}

impl CodecLimits {
    pub(crate) fn enter(&self, depth: usize) -> Result<usize, crate::CodecError> {
        let depth = depth + 1;
        if depth > self.max_depth {
            return Err(crate::CodecError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(depth)
    }

    /// Content size ceiling; the header field is 32 bits wide.
    pub(crate) fn content_ceiling(&self) -> usize {
        self.max_content_bytes.min(u32::MAX as usize)
    }
}
