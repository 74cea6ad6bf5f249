//! # 美化输出工具
//!
//! 提供统一的终端输出样式；工作流的 report 也经由这里输出。
//!
//! ## 依赖关系
//! - 被 `commands/`、`workflow/`、`engine/` 使用
//! - 使用 `colored`、`tabled` crate

use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印工作流步骤
pub fn print_step(step: &str) {
    println!("{} {}", "==>".cyan().bold(), step.bold());
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 键值对表格的一行
#[derive(Tabled)]
pub struct KeyValue {
    #[tabled(rename = "Item")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        KeyValue {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// 以圆角表格打印
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}
