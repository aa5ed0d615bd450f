use std::env::consts;
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Where the accelerated backend is expected to work
    Linux,
    /// Where the generic backend may use the Apple GPU
    MacOs,
    Other,
}

impl Os {
    pub fn current() -> Self {
        match consts::OS {
            "linux" => Os::Linux,
            "macos" => Os::MacOs,
            _ => Os::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    /// Human-readable platform string reported by `/health`
    pub description: String,
}

impl Platform {
    pub fn new(os: Os, description: impl Into<String>) -> Self {
        Self {
            os,
            description: description.into(),
        }
    }

    pub fn current() -> Self {
        Self::new(Os::current(), describe_host())
    }
}

/// `<os>-<kernel release>-<arch>`, without the release where it is not exposed.
fn describe_host() -> String {
    let release = fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    match release {
        Some(release) => format!("{}-{}-{}", consts::OS, release, consts::ARCH),
        None => format!("{}-{}", consts::OS, consts::ARCH),
    }
}
