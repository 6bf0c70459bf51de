use crate::error::{MonitorError, Result};
use crate::events::AlertEvent;
use crate::services::capture_settings::CaptureSettingsHandle;
use crate::services::cooldown::AlertCooldownGate;
use crate::services::detection::{count_matching_pixels, exceeds_threshold, extract_region, IconRegion};
use crate::services::window_source::WindowSource;
use crate::{debug_if_enabled, monitor_error};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Сигнал остановки, выдаваемый воркеру при запуске
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Дождаться остановки (используется, чтобы прервать сон между итерациями)
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Stopped,
}

/// Результат одной успешной итерации опроса
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    BelowThreshold { matched: usize },
    /// Порог превышен, но окно ещё в cooldown
    Suppressed { matched: usize },
    Fired { matched: usize },
}

/// Воркер мониторинга одного окна: захват → область → маска → cooldown → очередь
pub struct MonitorWorker {
    window: String,
    source: Arc<dyn WindowSource>,
    settings: CaptureSettingsHandle,
    region: IconRegion,
    alerts: UnboundedSender<AlertEvent>,
    stop: StopSignal,
    gate: AlertCooldownGate,
    state: WorkerState,
}

impl MonitorWorker {
    pub fn new(
        window: String,
        source: Arc<dyn WindowSource>,
        settings: CaptureSettingsHandle,
        region: IconRegion,
        alerts: UnboundedSender<AlertEvent>,
        stop: StopSignal,
    ) -> Self {
        Self {
            window,
            source,
            settings,
            region,
            alerts,
            stop,
            gate: AlertCooldownGate::new(),
            state: WorkerState::Running,
        }
    }

    #[cfg(test)]
    pub fn window(&self) -> &str {
        &self.window
    }

    #[cfg(test)]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    #[cfg(test)]
    pub fn gate(&self) -> &AlertCooldownGate {
        &self.gate
    }

    /// Синхронная итерация без сна: захват в текущем потоке
    #[cfg(test)]
    pub fn poll_once(&mut self, now: Instant) -> Result<IterationOutcome> {
        let captured = self.source.capture_window_image(&self.window);
        self.evaluate(captured, now)
    }

    fn evaluate(&mut self, captured: Result<RgbImage>, now: Instant) -> Result<IterationOutcome> {
        let image = captured?;
        let settings = self.settings.snapshot();

        let icon = extract_region(&image, &self.region)?;
        let matched = count_matching_pixels(&icon, &settings.color_range);

        if !exceeds_threshold(matched, settings.pixel_threshold) {
            return Ok(IterationOutcome::BelowThreshold { matched });
        }

        if !self.gate.should_fire(now, settings.alert_cooldown) {
            return Ok(IterationOutcome::Suppressed { matched });
        }

        self.alerts
            .send(AlertEvent::new(self.window.clone(), matched, now))
            .map_err(|_| monitor_error!(internal, "очередь алертов закрыта"))?;
        self.gate.record_fired(now);

        info!(
            "Сигнал в окне '{}': {} px (порог {})",
            self.window, matched, settings.pixel_threshold
        );
        Ok(IterationOutcome::Fired { matched })
    }

    /// Захват выполняется в blocking-пуле, чтобы не задерживать другие воркеры
    async fn capture(&self) -> Result<RgbImage> {
        let source = Arc::clone(&self.source);
        let window = self.window.clone();

        tokio::task::spawn_blocking(move || source.capture_window_image(&window))
            .await
            .map_err(|e| MonitorError::Detection(format!("задача захвата упала: {}", e)))?
    }

    fn log_outcome(&self, outcome: &Result<IterationOutcome>) {
        match outcome {
            Ok(IterationOutcome::Fired { .. }) => {}
            Ok(IterationOutcome::Suppressed { matched }) => {
                debug_if_enabled!("Окно '{}': {} px, алерт подавлен cooldown", self.window, matched);
            }
            Ok(IterationOutcome::BelowThreshold { matched }) => {
                debug_if_enabled!("Окно '{}': {} px, ниже порога", self.window, matched);
            }
            Err(e) if e.is_recoverable() => {
                warn!("Итерация мониторинга '{}' пропущена: {}", self.window, e);
            }
            Err(e) => {
                error!("Итерация мониторинга '{}' завершилась ошибкой: {}", self.window, e);
            }
        }
    }

    pub async fn run(mut self) -> WorkerState {
        info!("Мониторинг окна '{}' запущен", self.window);

        while !self.stop.is_stopped() {
            let captured = self.capture().await;
            let outcome = self.evaluate(captured, Instant::now());
            self.log_outcome(&outcome);

            // Интервал перечитывается каждый раз - его можно менять на лету
            let interval = self.settings.snapshot().poll_interval;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.stop.stopped() => {}
            }
        }

        self.state = WorkerState::Stopped;
        info!("Мониторинг окна '{}' остановлен", self.window);
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::capture_settings::CaptureSettings;
    use crate::services::detection::ColorRange;
    use crate::services::test_support::{frame_with_red_pixels, FnSource};
    use image::Rgb;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    const REGION: IconRegion = IconRegion::new(15, 2, 30, 30);

    fn settings(poll_interval: Duration) -> CaptureSettingsHandle {
        CaptureSettingsHandle::new(CaptureSettings {
            color_range: ColorRange::new([200, 0, 0], [255, 80, 80]).unwrap(),
            pixel_threshold: 5,
            poll_interval,
            alert_cooldown: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn worker_with<F>(
        capture: F,
        settings: CaptureSettingsHandle,
    ) -> (MonitorWorker, UnboundedReceiver<AlertEvent>, StopSignal)
    where
        F: Fn(&str) -> Result<RgbImage> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = StopSignal::new();
        let worker = MonitorWorker::new(
            "Estado 07".to_string(),
            Arc::new(FnSource(capture)),
            settings,
            REGION,
            tx,
            stop.clone(),
        );
        (worker, rx, stop)
    }

    #[test]
    fn test_five_red_pixels_fire() {
        let (mut worker, mut rx, _) =
            worker_with(|_| Ok(frame_with_red_pixels(5)), settings(Duration::from_secs(5)));

        let outcome = worker.poll_once(Instant::now()).unwrap();
        assert_eq!(outcome, IterationOutcome::Fired { matched: 5 });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.window, "Estado 07");
        assert_eq!(event.matched_pixels, 5);
    }

    #[test]
    fn test_four_red_pixels_do_not_fire() {
        let (mut worker, mut rx, _) =
            worker_with(|_| Ok(frame_with_red_pixels(4)), settings(Duration::from_secs(5)));

        let outcome = worker.poll_once(Instant::now()).unwrap();
        assert_eq!(outcome, IterationOutcome::BelowThreshold { matched: 4 });
        assert!(rx.try_recv().is_err());
        assert!(worker.gate().last_fired().is_none());
    }

    #[test]
    fn test_cooldown_suppresses_repeat_for_same_window() {
        let (mut worker, mut rx, _) =
            worker_with(|_| Ok(frame_with_red_pixels(9)), settings(Duration::from_secs(5)));
        let t0 = Instant::now();

        assert!(matches!(worker.poll_once(t0), Ok(IterationOutcome::Fired { .. })));
        assert!(matches!(
            worker.poll_once(t0 + Duration::from_secs(3)),
            Ok(IterationOutcome::Suppressed { .. })
        ));
        assert!(matches!(
            worker.poll_once(t0 + Duration::from_secs(6)),
            Ok(IterationOutcome::Fired { .. })
        ));

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(second.timestamp - first.timestamp, Duration::from_secs(6));
    }

    #[test]
    fn test_capture_errors_skip_iteration() {
        let (mut worker, mut rx, _) = worker_with(
            |title| Err(MonitorError::WindowNotFound(title.to_string())),
            settings(Duration::from_secs(5)),
        );

        let result = worker.poll_once(Instant::now());
        assert!(matches!(result, Err(MonitorError::WindowNotFound(_))));
        assert!(rx.try_recv().is_err());
        assert!(worker.gate().last_fired().is_none());
    }

    #[test]
    fn test_shrunken_window_is_out_of_bounds() {
        let (mut worker, _rx, _) = worker_with(
            |_| Ok(RgbImage::from_pixel(40, 20, Rgb([255, 0, 0]))),
            settings(Duration::from_secs(5)),
        );

        let result = worker.poll_once(Instant::now());
        assert!(matches!(result, Err(MonitorError::RegionOutOfBounds { .. })));
    }

    #[test]
    fn test_live_threshold_change_applies_next_iteration() {
        let handle = settings(Duration::from_secs(5));
        let (mut worker, _rx, _) = worker_with(|_| Ok(frame_with_red_pixels(8)), handle.clone());

        handle.set_pixel_threshold(10).unwrap();
        assert_eq!(
            worker.poll_once(Instant::now()).unwrap(),
            IterationOutcome::BelowThreshold { matched: 8 }
        );

        handle.set_pixel_threshold(8).unwrap();
        assert_eq!(
            worker.poll_once(Instant::now()).unwrap(),
            IterationOutcome::Fired { matched: 8 }
        );
    }

    #[test]
    fn test_closed_queue_is_reported() {
        let (mut worker, rx, _) =
            worker_with(|_| Ok(frame_with_red_pixels(30)), settings(Duration::from_secs(5)));
        drop(rx);

        let result = worker.poll_once(Instant::now());
        assert!(matches!(result, Err(MonitorError::Internal(_))));
        // Алерт не доставлен - cooldown не должен начаться
        assert!(worker.gate().last_fired().is_none());
    }

    #[tokio::test]
    async fn test_loop_survives_failures_and_stops() {
        let captures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&captures);

        let (worker, mut rx, stop) = worker_with(
            move |title| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                match n % 3 {
                    0 => Err(MonitorError::CaptureFailure {
                        window: title.to_string(),
                        reason: "PrintWindow".to_string(),
                    }),
                    1 => panic!("повреждённый буфер"),
                    _ => Ok(frame_with_red_pixels(12)),
                }
            },
            settings(Duration::from_millis(10)),
        );

        let handle = tokio::spawn(worker.run());

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("алерт должен прийти несмотря на ошибки")
            .unwrap();
        assert_eq!(event.matched_pixels, 12);
        assert!(captures.load(Ordering::SeqCst) >= 3);

        stop.stop();
        let state = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("воркер должен завершиться после stop")
            .unwrap();
        assert_eq!(state, WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_interrupts_sleep() {
        let (worker, _rx, stop) =
            worker_with(|_| Ok(frame_with_red_pixels(0)), settings(Duration::from_secs(3600)));

        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("сон между итерациями должен прерываться stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_before_start_never_captures() {
        let captures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&captures);
        let (worker, _rx, stop) = worker_with(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(frame_with_red_pixels(0))
            },
            settings(Duration::from_millis(10)),
        );

        stop.stop();
        assert_eq!(worker.run().await, WorkerState::Stopped);
        assert_eq!(captures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_new_worker_starts_running_with_fresh_gate() {
        let (worker, _rx, _) =
            worker_with(|_| Ok(frame_with_red_pixels(0)), settings(Duration::from_secs(5)));
        assert_eq!(worker.state(), WorkerState::Running);
        assert_eq!(worker.window(), "Estado 07");
        assert!(worker.gate().last_fired().is_none());
    }
}
