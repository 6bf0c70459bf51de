use crate::error::{MonitorError, Result};
use crate::monitor_error;

/// Разобрать выбор пользователя по нумерованному списку окон.
///
/// `"0"` выбирает все окна, иначе номера через запятую (с единицы).
/// Пустой ввод даёт пустой выбор - отказ выдаст уже `start`.
pub fn parse_selection(input: &str, windows: &[String]) -> Result<Vec<String>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }

    if input == "0" {
        return Ok(windows.to_vec());
    }

    let mut selected: Vec<String> = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let index: usize = part
            .parse()
            .map_err(|_| monitor_error!(invalid_selection, "'{}' не является номером окна", part))?;

        if index == 0 || index > windows.len() {
            return Err(MonitorError::InvalidSelection(format!(
                "номер {} вне диапазона 1..={}",
                index,
                windows.len()
            )));
        }

        let window = &windows[index - 1];
        if !selected.contains(window) {
            selected.push(window.clone());
        }
    }

    Ok(selected)
}

/// Нумерованный список для вывода в консоль
pub fn format_numbered(windows: &[String]) -> String {
    windows
        .iter()
        .enumerate()
        .map(|(i, title)| format!("{} - {}", i + 1, title))
        .collect::<Vec<_>>()
        .join("\n")
}
