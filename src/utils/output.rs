//! # 终端输出
//!
//! 带标签的彩色消息、参数回显、写出文件与声子频率范围的汇总行。
//!
//! ## 依赖关系
//! - 被 `commands/` 与 `main.rs` 使用
//! - 使用 `colored` crate

use colored::Colorize;
use std::fmt::Display;
use std::path::Path;
use std::time::Instant;

/// 低于该值 (THz) 的频率按虚频报告
const IMAGINARY_TOLERANCE: f64 = -1e-2;

pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 结束行，附带自 `started` 起的耗时
pub fn print_done(msg: &str, started: Instant) {
    println!(
        "{} {} {}",
        "[DONE]".green().bold(),
        msg,
        format!("({:.2} s)", started.elapsed().as_secs_f64()).as_str().dimmed()
    );
}

fn size_suffix(path: &Path) -> String {
    path.metadata()
        .map(|m| format!(" ({} bytes)", m.len()))
        .unwrap_or_default()
}

/// 写出的文件；能读到元数据时附上大小
pub fn print_written(path: &Path) {
    let size = size_suffix(path);
    println!(
        "{} {} {}{}",
        "[OUT]".green().bold(),
        "->".cyan(),
        path.display(),
        size.as_str().dimmed()
    );
}

/// 参数回显 `key = value`
pub fn print_setting(key: &str, value: impl Display) {
    println!("  {:<18} {} {}", key.dimmed(), "=".dimmed(), value);
}

fn is_imaginary(frequency: f64) -> bool {
    frequency < IMAGINARY_TOLERANCE
}

/// 一组 k 点上的频率范围；最低频率为虚频时另给警告
pub fn print_frequency_summary(label: &str, num_kpoints: usize, lowest: f64, highest: f64) {
    println!(
        "{} {}: {} k-points, {:.4} .. {:.4} THz",
        "[*]".blue().bold(),
        label,
        num_kpoints,
        lowest,
        highest
    );
    if is_imaginary(lowest) {
        print_warning(&format!(
            "{}: imaginary branches down to {:.4} THz",
            label, lowest
        ));
    }
}

pub fn print_header(title: &str) {
    let line = "═".repeat(64);
    println!("\n{}", line.dimmed());
    println!("  {}", title.to_uppercase().as_str().bold());
    println!("{}\n", line.dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imaginary_threshold() {
        assert!(is_imaginary(-0.5));
        assert!(!is_imaginary(-0.001));
        assert!(!is_imaginary(3.2));
    }

    #[test]
    fn test_size_suffix() {
        let path = std::env::temp_dir().join(format!("interphon_output_{}", std::process::id()));
        std::fs::write(&path, "0123456789").unwrap();
        assert_eq!(size_suffix(&path), " (10 bytes)");
        let _ = std::fs::remove_file(&path);
        assert_eq!(size_suffix(&path), "");
    }
}
