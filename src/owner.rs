//! Ownership tagging for resources that must only be torn down by the
//! process that created them.
//!
//! A forked child inherits the parent's memory, including every handle and
//! scratch directory. Destructive operations check the tag first so that
//! such a child never signals the server or removes the directory.

/// Process that created a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerTag {
    pid: u32,
}

impl OwnerTag {
    /// Tag for the calling process.
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
        }
    }

    /// Process identifier recorded at creation.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the calling process is the one that created the resource.
    pub fn is_current(&self) -> bool {
        self.pid == std::process::id()
    }

    // Stands in for a handle inherited across fork()
    #[cfg(test)]
    pub(crate) fn foreign() -> Self {
        Self {
            pid: std::process::id().wrapping_add(1),
        }
    }
}
