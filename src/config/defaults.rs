//! Default value functions for configuration.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

pub fn default_port() -> u16 {
    6667
}

pub fn default_ident() -> String {
    "corvid".to_string()
}

pub fn default_realname() -> String {
    "corvid".to_string()
}

pub fn default_read_timeout_ms() -> u64 {
    25
}

pub fn default_tick_sleep_ms() -> u64 {
    5
}
