use std::time::Duration;

/// Millisecond deadline budgets for connect/read/write/operation.
///
/// Any unset budget disables the corresponding deadline check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub connect_ms: Option<u64>,
    pub read_ms: Option<u64>,
    pub write_ms: Option<u64>,
    pub operation_ms: Option<u64>,
}

impl TimeoutConfig {
    pub const DEFAULT: Self = Self {
        connect_ms: Some(5_000),
        read_ms: Some(30_000),
        write_ms: Some(10_000),
        operation_ms: Some(60_000),
    };

    pub const FAST: Self = Self {
        connect_ms: Some(1_000),
        read_ms: Some(5_000),
        write_ms: Some(2_000),
        operation_ms: Some(10_000),
    };

    pub const NO_TIMEOUT: Self = Self {
        connect_ms: None,
        read_ms: None,
        write_ms: None,
        operation_ms: None,
    };

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_ms.map(Duration::from_millis)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_matches_spec() {
        let t = TimeoutConfig::default();
        assert_eq!(t.connect_ms, Some(5_000));
        assert_eq!(t.read_ms, Some(30_000));
        assert_eq!(t.write_ms, Some(10_000));
        assert_eq!(t.operation_ms, Some(60_000));
    }

    #[test]
    fn fast_preset_matches_spec() {
        let t = TimeoutConfig::FAST;
        assert_eq!(t.connect_ms, Some(1_000));
        assert_eq!(t.read_ms, Some(5_000));
        assert_eq!(t.write_ms, Some(2_000));
        assert_eq!(t.operation_ms, Some(10_000));
    }

    #[test]
    fn no_timeout_preset_disables_all_deadlines() {
        let t = TimeoutConfig::NO_TIMEOUT;
        assert_eq!(t.operation_timeout(), None);
        assert_eq!(t.read_timeout(), None);
        assert_eq!(t.write_timeout(), None);
        assert_eq!(t.connect_timeout(), None);
    }
}
