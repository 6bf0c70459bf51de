use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::{Config, LoggingConfig};
use services::capture_settings::CaptureSettingsHandle;
use services::{create_notification_sink, create_window_source, MonitorSupervisor};

#[derive(Parser, Debug)]
#[command(name = "iconwatch")]
#[command(about = "Фоновый мониторинг окон по цвету иконки с уведомлениями")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "iconwatch.toml")]
    config: String,

    /// Режим сухого запуска (эмуляция окон, уведомления только в лог)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает значение из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Показать окна-кандидаты для мониторинга
    List,

    /// Запустить мониторинг (по умолчанию)
    Watch {
        /// Номера окон через запятую, '0' - все окна
        #[arg(short, long)]
        select: Option<String>,

        #[command(flatten)]
        overrides: SessionOverrides,

        /// Заголовки окон (подстроки) вместо выбора по номерам
        titles: Vec<String>,
    },
}

/// Переопределения настроек захвата на время сессии
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
struct SessionOverrides {
    /// Порог пикселей
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    threshold: Option<u32>,

    /// Интервал опроса в миллисекундах
    #[arg(long, value_parser = clap::value_parser!(u64).range(100..))]
    poll_interval_ms: Option<u64>,

    /// Cooldown между алертами одного окна в миллисекундах
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Нижняя граница цвета, "R,G,B"
    #[arg(long, value_parser = parse_rgb)]
    color_min: Option<[u8; 3]>,

    /// Верхняя граница цвета, "R,G,B"
    #[arg(long, value_parser = parse_rgb)]
    color_max: Option<[u8; 3]>,
}

impl SessionOverrides {
    fn apply(&self, settings: &CaptureSettingsHandle) -> error::Result<()> {
        if *self == Self::default() {
            return Ok(());
        }

        if let Some(threshold) = self.threshold {
            settings.set_pixel_threshold(threshold)?;
        }
        if let Some(interval) = self.poll_interval_ms {
            settings.set_poll_interval(Duration::from_millis(interval))?;
        }
        if let Some(cooldown) = self.cooldown_ms {
            settings.set_alert_cooldown(Duration::from_millis(cooldown));
        }
        if self.color_min.is_some() || self.color_max.is_some() {
            let current = settings.snapshot().color_range;
            settings.set_color_range(
                self.color_min.unwrap_or(current.lower()),
                self.color_max.unwrap_or(current.upper()),
            )?;
        }

        let applied = settings.snapshot();
        info!(
            "Настройки сессии: цвет {}, порог {} px, интервал {:?}, cooldown {:?}",
            applied.color_range, applied.pixel_threshold, applied.poll_interval, applied.alert_cooldown
        );
        Ok(())
    }
}

fn parse_rgb(value: &str) -> std::result::Result<[u8; 3], String> {
    let channels = value
        .split(',')
        .map(|channel| channel.trim().parse::<u8>())
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|e| format!("неверный канал цвета в '{}': {}", value, e))?;

    <[u8; 3]>::try_from(channels)
        .map_err(|channels| format!("ожидалось 3 канала R,G,B, получено {}", channels.len()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Config::load(&args.config)?;

    // Инициализация системы логирования
    init_tracing(&config.logging, args.log_level.as_deref())?;

    info!("Запуск iconwatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - окна эмулируются, уведомления только в лог");
    }

    utils::environment::check_capture_environment(args.dry_run);

    let source = create_window_source(config.icon_region(), args.dry_run)?;
    let sink = create_notification_sink(&config.notification, args.dry_run);
    let supervisor = MonitorSupervisor::new(&config, source, sink)?;

    match args.command.unwrap_or(Command::Watch {
        select: None,
        overrides: SessionOverrides::default(),
        titles: Vec::new(),
    }) {
        Command::List => list_windows(&supervisor),
        Command::Watch {
            select,
            overrides,
            titles,
        } => watch(&supervisor, &args.config, select, &overrides, titles).await,
    }
}

fn list_windows(supervisor: &MonitorSupervisor) -> Result<()> {
    let candidates = supervisor.list_candidate_windows()?;
    if candidates.is_empty() {
        println!("Подходящие окна не найдены");
    } else {
        println!("{}", utils::format_numbered(&candidates));
    }
    Ok(())
}

async fn watch(
    supervisor: &MonitorSupervisor,
    config_path: &str,
    select: Option<String>,
    overrides: &SessionOverrides,
    titles: Vec<String>,
) -> Result<()> {
    let selected = if !titles.is_empty() {
        titles
    } else {
        let candidates = supervisor.list_candidate_windows()?;
        if candidates.is_empty() {
            anyhow::bail!("Подходящие окна не найдены");
        }
        match select {
            Some(input) => utils::parse_selection(&input, &candidates)?,
            None => prompt_selection(candidates).await?,
        }
    };

    overrides.apply(supervisor.settings())?;

    supervisor.start(&selected)?;
    info!("Отслеживаемые окна: {}", supervisor.active_windows().join(", "));
    println!("Мониторинг запущен в фоне. Нажмите Ctrl+C для завершения.");

    wait_for_shutdown(supervisor, config_path).await?;

    info!("Завершение работы...");
    supervisor.stop();
    if supervisor.wait_stopped(Duration::from_secs(5)).await {
        info!("Все воркеры завершили работу корректно");
    }

    info!("iconwatch завершил работу");
    Ok(())
}

async fn prompt_selection(candidates: Vec<String>) -> Result<Vec<String>> {
    println!("Окна, доступные для мониторинга:");
    println!("{}", utils::format_numbered(&candidates));
    print!("Введите номера окон через запятую или '0' для всех: ");
    std::io::stdout().flush()?;

    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map(|_| line)
    })
    .await??;

    Ok(utils::parse_selection(&line, &candidates)?)
}

#[cfg(unix)]
async fn wait_for_shutdown(supervisor: &MonitorSupervisor, config_path: &str) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Получен сигнал завершения (Ctrl+C)");
                return Ok(());
            }
            _ = hangup.recv() => {
                info!("Получен SIGHUP - перечитываем настройки захвата");
                reload_capture_settings(supervisor, config_path);
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_supervisor: &MonitorSupervisor, _config_path: &str) -> Result<()> {
    signal::ctrl_c().await?;
    info!("Получен сигнал завершения (Ctrl+C)");
    Ok(())
}

#[cfg_attr(not(unix), allow(dead_code))]
fn reload_capture_settings(supervisor: &MonitorSupervisor, config_path: &str) {
    let settings = Config::load(config_path).and_then(|config| config.capture_settings());
    match settings {
        Ok(settings) => {
            if let Err(e) = supervisor.settings().apply(settings) {
                warn!("Новые настройки захвата отклонены: {}", e);
            }
        }
        Err(e) => warn!("Не удалось перечитать конфигурацию: {:#}", e),
    }
}

fn init_tracing(logging: &LoggingConfig, cli_level: Option<&str>) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let level = cli_level.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let console = match logging.format.as_str() {
        "compact" => fmt::layer().compact().boxed(),
        _ => fmt::layer().pretty().boxed(),
    };

    // Диагностический лог в файл: только дописываем, без ANSI-цветов
    let file = match logging.log_file() {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Не удалось открыть файл лога {:?}", path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}
