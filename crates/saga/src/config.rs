//! Orchestrator configuration.

/// Tuning knobs for [`SagaOrchestrator`](crate::SagaOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Attach a JSON snapshot of the payload to events that change or
    /// conclude it (`step.succeeded`, `step.failed` and the terminal
    /// events). Disable for large or sensitive payloads.
    pub snapshot_payloads: bool,
}

impl OrchestratorConfig {
    /// Sets whether events carry payload snapshots.
    pub fn with_snapshot_payloads(mut self, enabled: bool) -> Self {
        self.snapshot_payloads = enabled;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            snapshot_payloads: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshots_enabled() {
        assert!(OrchestratorConfig::default().snapshot_payloads);
    }

    #[test]
    fn test_disable_snapshots() {
        let config = OrchestratorConfig::default().with_snapshot_payloads(false);
        assert!(!config.snapshot_payloads);
    }
}
