use std::path::Path;
use tracing::{info, warn};

/// Проверить, что окружение позволяет захватывать окна.
///
/// Проблемы только логируются: окна и утилиты могут появиться позже,
/// а воркеры переживают ошибки захвата.
pub fn check_capture_environment(dry_run: bool) {
    if dry_run {
        info!("Dry-run: проверка окружения захвата пропущена");
        return;
    }

    info!("Проверка окружения захвата...");

    #[cfg(not(windows))]
    {
        check_display();
        for tool in ["wmctrl", "xdotool", "import"] {
            check_tool(tool);
        }
    }

    #[cfg(windows)]
    info!("Захват через GDI PrintWindow, внешние утилиты не нужны");
}

#[cfg(not(windows))]
fn check_display() {
    match std::env::var("DISPLAY") {
        Ok(value) if !value.is_empty() => info!("X11 дисплей: {}", value),
        _ => {
            warn!("⚠️  Переменная DISPLAY не задана - захват окон X11 работать не будет");
            if std::env::var("WAYLAND_DISPLAY").is_ok() {
                warn!("   Сессия Wayland: нужен XWayland, окна должны быть X11-клиентами");
            }
        }
    }
}

#[cfg(not(windows))]
fn check_tool(tool: &str) {
    match find_in_path(tool) {
        Some(path) => info!("{} найден: {:?}", tool, path),
        None => {
            warn!("{} не найден в PATH", tool);
            for line in install_hint(tool) {
                warn!("   {}", line);
            }
        }
    }
}

#[cfg_attr(windows, allow(dead_code))]
fn find_in_path(tool: &str) -> Option<std::path::PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
#[cfg_attr(windows, allow(dead_code))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Рекомендуемые команды установки недостающих утилит
pub fn install_hint(tool: &str) -> Vec<String> {
    let package = match tool {
        "import" => "imagemagick",
        other => other,
    };
    vec![
        format!("# Установить пакет {}:", package),
        format!("sudo apt install {}", package),
        format!("sudo dnf install {}", package),
    ]
}
