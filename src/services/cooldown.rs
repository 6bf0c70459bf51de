use std::time::{Duration, Instant};

/// Антидребезг уведомлений для одного окна.
///
/// Принадлежит ровно одному воркеру, поэтому не требует синхронизации.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlertCooldownGate {
    last_fired: Option<Instant>,
}

impl AlertCooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    /// Срабатывание на самой границе cooldown подавляется, после неё разрешено
    pub fn should_fire(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) > cooldown,
        }
    }

    pub fn record_fired(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }
}
