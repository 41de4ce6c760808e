use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

/// Key/value boot environment: `boot-args`, `console`, `os_console`,
/// `zfs-bootfs`, per-device `<console>-mode` and whatever else the
/// configuration front end collected.
#[derive(Debug, Default, Clone)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    pub fn unset(&mut self, key: &str) {
        self.vars.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn boot_args(&self) -> Option<&str> {
        self.get("boot-args")
    }

    /// The console the kernel should use: `os_console` wins over
    /// `console`.
    pub fn os_console(&self) -> Option<&str> {
        self.get("os_console").or_else(|| self.get("console"))
    }

    pub fn zfs_bootfs(&self) -> Option<&str> {
        self.get("zfs-bootfs")
    }
}
