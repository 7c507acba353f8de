/// Options controlling how an archive is opened and walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Decode names and comments (CP437 or UTF-8). When off, entries
    /// carry raw bytes and no path validation is done.
    pub decode_strings: bool,
    /// Check stored entry sizes and the inflated byte count.
    pub validate_entry_sizes: bool,
    /// Keep backslashes in names (and reject them) instead of treating them
    /// as separators.
    pub strict_file_names: bool,
    /// Close the archive once the walk ends or fails.
    pub auto_close: bool,
    /// Read each entry's content before yielding it.
    pub with_content: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            decode_strings: true,
            validate_entry_sizes: true,
            strict_file_names: false,
            auto_close: true,
            with_content: false,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for a source the caller opened and will close itself.
    pub fn for_descriptor() -> Self {
        Self {
            auto_close: false,
            ..Self::default()
        }
    }

    pub fn decode_strings(mut self, value: bool) -> Self {
        self.decode_strings = value;
        self
    }

    pub fn validate_entry_sizes(mut self, value: bool) -> Self {
        self.validate_entry_sizes = value;
        self
    }

    pub fn strict_file_names(mut self, value: bool) -> Self {
        self.strict_file_names = value;
        self
    }

    pub fn auto_close(mut self, value: bool) -> Self {
        self.auto_close = value;
        self
    }

    pub fn with_content(mut self, value: bool) -> Self {
        self.with_content = value;
        self
    }
}

/// Per-stream options for [`Archive::open_entry_with`](super::Archive::open_entry_with).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Inflate deflated entries. Encrypted entries are never inflated.
    pub decompress: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { decompress: true }
    }
}
