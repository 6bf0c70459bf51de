use crate::config::{Config, NotificationConfig};
use crate::error::{MonitorError, Result};
use crate::events::AlertEvent;
use crate::services::capture_settings::CaptureSettingsHandle;
use crate::services::detection::IconRegion;
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::monitor_worker::{MonitorWorker, StopSignal, WorkerState};
use crate::services::notifier::NotificationSink;
use crate::services::window_source::WindowSource;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Активный воркер в наборе мониторинга
#[derive(Debug)]
struct ActiveWorker {
    stop: StopSignal,
    handle: JoinHandle<WorkerState>,
}

/// Владелец воркеров, очереди алертов и единственного диспетчера уведомлений.
///
/// `start` and `stop` need a tokio runtime context; neither waits for workers.
pub struct MonitorSupervisor {
    source: Arc<dyn WindowSource>,
    sink: Arc<dyn NotificationSink>,
    settings: CaptureSettingsHandle,
    region: IconRegion,
    window_filter: String,
    notification: NotificationConfig,

    alerts_tx: UnboundedSender<AlertEvent>,
    // Забирается при первом запуске: второй диспетчер невозможен по построению
    alerts_rx: Mutex<Option<UnboundedReceiver<AlertEvent>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    dispatchers_started: AtomicUsize,

    active: DashMap<String, ActiveWorker>,
    stopping: Mutex<Vec<JoinHandle<WorkerState>>>,
}

impl MonitorSupervisor {
    pub fn new(
        config: &Config,
        source: Arc<dyn WindowSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        info!("Инициализация MonitorSupervisor");

        let settings = CaptureSettingsHandle::new(config.capture_settings()?)?;
        let (alerts_tx, alerts_rx) = mpsc::unbounded_channel();

        Ok(Self {
            source,
            sink,
            settings,
            region: config.icon_region(),
            window_filter: config.windows.filter.clone(),
            notification: config.notification.clone(),
            alerts_tx,
            alerts_rx: Mutex::new(Some(alerts_rx)),
            dispatcher: Mutex::new(None),
            dispatchers_started: AtomicUsize::new(0),
            active: DashMap::new(),
            stopping: Mutex::new(Vec::new()),
        })
    }

    /// Live-изменяемые настройки детекции, общие для всех воркеров
    pub fn settings(&self) -> &CaptureSettingsHandle {
        &self.settings
    }

    /// Окна-кандидаты для выбора пользователем
    pub fn list_candidate_windows(&self) -> Result<Vec<String>> {
        self.source.list_candidate_windows(&self.window_filter)
    }

    /// Запустить мониторинг выбранных окон, возвращает число новых воркеров
    pub fn start(&self, selected: &[String]) -> Result<usize> {
        if selected.is_empty() {
            return Err(MonitorError::EmptySelection);
        }

        self.ensure_dispatcher();

        let mut spawned = 0;
        for window in selected {
            // Проверка и вставка под одной блокировкой шарда
            let slot = match self.active.entry(window.clone()) {
                Entry::Occupied(_) => {
                    warn!("Окно '{}' уже отслеживается, повторный запуск пропущен", window);
                    continue;
                }
                Entry::Vacant(slot) => slot,
            };

            let stop = StopSignal::new();
            let worker = MonitorWorker::new(
                window.clone(),
                Arc::clone(&self.source),
                self.settings.clone(),
                self.region,
                self.alerts_tx.clone(),
                stop.clone(),
            );
            let handle = tokio::spawn(worker.run());

            slot.insert(ActiveWorker { stop, handle });
            spawned += 1;
        }

        info!(
            "Мониторинг запущен: {} новых окон, всего активных {}",
            spawned,
            self.active.len()
        );
        Ok(spawned)
    }

    fn ensure_dispatcher(&self) {
        let mut dispatcher = self.dispatcher.lock();
        if dispatcher.is_some() {
            return;
        }

        let Some(alerts_rx) = self.alerts_rx.lock().take() else {
            return;
        };

        let task = NotificationDispatcher::new(alerts_rx, Arc::clone(&self.sink), &self.notification);
        *dispatcher = Some(tokio::spawn(task.run()));
        self.dispatchers_started.fetch_add(1, Ordering::SeqCst);
    }

    /// Сигнализировать всем воркерам об остановке, не дожидаясь их завершения
    pub fn stop(&self) {
        let windows: Vec<String> = self.active.iter().map(|entry| entry.key().clone()).collect();
        if windows.is_empty() {
            return;
        }

        info!("Остановка мониторинга {} окон", windows.len());

        let mut stopping = self.stopping.lock();
        for window in windows {
            if let Some((_, worker)) = self.active.remove(&window) {
                worker.stop.stop();
                stopping.push(worker.handle);
            }
        }
    }

    /// Дождаться завершения воркеров, остановленных через `stop`
    pub async fn wait_stopped(&self, timeout: Duration) -> bool {
        let handles: Vec<_> = std::mem::take(&mut *self.stopping.lock());

        let all = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Воркер завершился с ошибкой: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, all).await {
            Ok(()) => true,
            Err(_) => {
                warn!("Таймаут при ожидании остановки воркеров");
                false
            }
        }
    }

    pub fn active_windows(&self) -> Vec<String> {
        let mut windows: Vec<String> = self.active.iter().map(|entry| entry.key().clone()).collect();
        windows.sort();
        windows
    }

    #[cfg(test)]
    pub fn is_monitoring(&self) -> bool {
        !self.active.is_empty()
    }

    #[cfg(test)]
    pub fn dispatcher_running(&self) -> bool {
        self.dispatcher
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    #[cfg(test)]
    pub fn dispatchers_started(&self) -> usize {
        self.dispatchers_started.load(Ordering::SeqCst)
    }
}

impl Drop for MonitorSupervisor {
    fn drop(&mut self) {
        for entry in self.active.iter() {
            entry.value().stop.stop();
        }
        info!("MonitorSupervisor завершает работу");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{frame_with_red_pixels, FnSource, RecordingSink};
    use crate::services::window_source::create_window_source;
    use image::RgbImage;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.capture.poll_interval_ms = 100;
        config.capture.alert_cooldown_ms = 60_000;
        config
    }

    fn supervisor_with_red_frames(red: u32) -> (MonitorSupervisor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(FnSource(move |_: &str| -> Result<RgbImage> {
            Ok(frame_with_red_pixels(red))
        }));
        let supervisor = MonitorSupervisor::new(&fast_config(), source, sink.clone()).unwrap();
        (supervisor, sink)
    }

    async fn wait_for_deliveries(sink: &RecordingSink, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while sink.delivered.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("уведомления должны быть доставлены");
    }

    #[tokio::test]
    async fn test_empty_selection_rejected() {
        let (supervisor, _sink) = supervisor_with_red_frames(5);

        let result = supervisor.start(&[]);
        assert!(matches!(result, Err(MonitorError::EmptySelection)));
        assert!(!supervisor.is_monitoring());
        assert!(!supervisor.dispatcher_running());
        assert_eq!(supervisor.dispatchers_started(), 0);
    }

    #[tokio::test]
    async fn test_repeated_start_keeps_single_dispatcher() {
        let (supervisor, _sink) = supervisor_with_red_frames(0);

        supervisor.start(&["Estado 01".to_string()]).unwrap();
        supervisor.start(&["Estado 02".to_string()]).unwrap();
        assert_eq!(supervisor.dispatchers_started(), 1);

        supervisor.stop();
        supervisor.start(&["Estado 03".to_string()]).unwrap();
        assert_eq!(supervisor.dispatchers_started(), 1);
        assert!(supervisor.dispatcher_running());
    }

    #[tokio::test]
    async fn test_same_window_not_spawned_twice() {
        let (supervisor, _sink) = supervisor_with_red_frames(0);

        assert_eq!(supervisor.start(&["Estado 01".to_string()]).unwrap(), 1);
        let spawned = supervisor
            .start(&["Estado 01".to_string(), "Estado 02".to_string()])
            .unwrap();
        assert_eq!(spawned, 1);
        assert_eq!(
            supervisor.active_windows(),
            vec!["Estado 01".to_string(), "Estado 02".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_start_of_same_window_spawns_one_worker() {
        let (supervisor, _sink) = supervisor_with_red_frames(0);
        let runtime = tokio::runtime::Handle::current();
        let window = vec!["Estado 01".to_string()];

        let (supervisor_ref, runtime_ref, window_ref) = (&supervisor, &runtime, &window);
        let spawned: usize = std::thread::scope(|scope| {
            let starts: Vec<_> = (0..4)
                .map(move |_| {
                    scope.spawn(move || {
                        let _guard = runtime_ref.enter();
                        supervisor_ref.start(window_ref).unwrap()
                    })
                })
                .collect();
            starts.into_iter().map(|start| start.join().unwrap()).sum()
        });

        assert_eq!(spawned, 1);
        assert_eq!(supervisor.active_windows(), window);

        supervisor.stop();
        assert!(supervisor.wait_stopped(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_alerts_delivered_once_per_cooldown() {
        let (supervisor, sink) = supervisor_with_red_frames(5);

        supervisor
            .start(&["Estado 01".to_string(), "Estado 02".to_string()])
            .unwrap();
        wait_for_deliveries(&sink, 2).await;

        // Несколько итераций внутри cooldown не должны дать новых уведомлений
        tokio::time::sleep(Duration::from_millis(350)).await;

        let delivered = sink.delivered.lock();
        assert_eq!(delivered.len(), 2);
        let mut messages: Vec<&str> = delivered.iter().map(|n| n.message.as_str()).collect();
        messages.sort();
        assert_eq!(
            messages,
            vec![
                "Сигнал обнаружен в окне Estado 01!",
                "Сигнал обнаружен в окне Estado 02!"
            ]
        );
    }

    #[tokio::test]
    async fn test_below_threshold_never_notifies() {
        let (supervisor, sink) = supervisor_with_red_frames(4);

        supervisor.start(&["Estado 01".to_string()]).unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert!(sink.delivered.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stop_clears_active_set_and_workers_exit() {
        let (supervisor, _sink) = supervisor_with_red_frames(0);

        supervisor
            .start(&["Estado 01".to_string(), "Estado 02".to_string()])
            .unwrap();
        assert!(supervisor.is_monitoring());

        supervisor.stop();
        assert!(supervisor.active_windows().is_empty());
        assert!(supervisor.wait_stopped(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_restart_resets_cooldown() {
        let (supervisor, sink) = supervisor_with_red_frames(10);

        supervisor.start(&["Estado 01".to_string()]).unwrap();
        wait_for_deliveries(&sink, 1).await;

        supervisor.stop();
        assert!(supervisor.wait_stopped(Duration::from_secs(5)).await);

        // Новый воркер - новый gate, cooldown 60с не мешает повторному алерту
        supervisor.start(&["Estado 01".to_string()]).unwrap();
        wait_for_deliveries(&sink, 2).await;
    }

    #[tokio::test]
    async fn test_candidates_from_dry_run_source() {
        let config = fast_config();
        let source = create_window_source(config.icon_region(), true).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let supervisor = MonitorSupervisor::new(&config, source, sink).unwrap();

        let candidates = supervisor.list_candidate_windows().unwrap();
        assert!(candidates.iter().all(|title| title.contains('E')));
        assert!(candidates.contains(&"Estado 01 - dry_run".to_string()));
    }
}
