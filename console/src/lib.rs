//! rcore-console: 提供可定制实现的 `print!`、`println!` 与 `log::Log`
//!
//! 引擎与演示程序只依赖 [`Console`] trait，输出目的地由宿主决定。

#![no_std]

extern crate alloc;
pub extern crate log;

use alloc::string::String;
use core::fmt::{self, Write};
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

/// 控制台输出抽象 trait
///
/// 实现者必须提供 `put_char` 方法以输出单个字节。
/// 默认的 `put_str` 实现会逐字节调用 `put_char`。
pub trait Console: Sync {
    /// 输出单个字节
    fn put_char(&self, c: u8);

    /// 输出字符串（默认实现逐字节调用 `put_char`）
    fn put_str(&self, s: &str) {
        for byte in s.bytes() {
            self.put_char(byte);
        }
    }
}

/// 全局控制台单例
static CONSOLE: Once<&'static dyn Console> = Once::new();

/// 初始化全局控制台单例并注册 logger
///
/// 重复调用时保留第一次设置的控制台。
pub fn init_console(console: &'static dyn Console) {
    CONSOLE.call_once(|| console);
    let _ = log::set_logger(&Logger);
}

/// 控制台是否已初始化
#[inline]
pub fn is_initialized() -> bool {
    CONSOLE.get().is_some()
}

/// 把级别名解析为过滤级别，大小写不敏感；无法识别时返回 `None`
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    const NAMES: [(&str, LevelFilter); 6] = [
        ("off", LevelFilter::Off),
        ("error", LevelFilter::Error),
        ("warn", LevelFilter::Warn),
        ("info", LevelFilter::Info),
        ("debug", LevelFilter::Debug),
        ("trace", LevelFilter::Trace),
    ];
    NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, level)| level)
}

/// 设置全局最大日志级别
///
/// `None` 或无法解析的级别名回退为 `Trace`。
pub fn set_log_level(env: Option<&str>) {
    let level = env.and_then(parse_level).unwrap_or(LevelFilter::Trace);
    log::set_max_level(level);
}

/// 内部打印函数，供宏使用
///
/// 整条输出先格式化到缓冲区，再一次性交给 `put_str`，多线程输出不会在行内交错。
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if let Some(console) = CONSOLE.get() {
        let mut buf = String::new();
        if buf.write_fmt(args).is_ok() {
            console.put_str(&buf);
        }
    }
}

/// Logger 实现
///
/// 格式：`\x1b[{color}m[{level:>5}] {target}: {args}\x1b[0m`
struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(console) = CONSOLE.get() else {
            return;
        };
        let color = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 34,
            Level::Debug => 32,
            Level::Trace => 90,
        };
        let mut buf = String::new();
        if writeln!(
            buf,
            "\x1b[{}m[{:>5}] {}: {}\x1b[0m",
            color,
            record.level(),
            record.target(),
            record.args()
        )
        .is_ok()
        {
            console.put_str(&buf);
        }
    }

    fn flush(&self) {}
}

/// 格式化输出宏（无自动换行）
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::_print(format_args!($($arg)*))
    };
}

/// 格式化输出宏（自动追加换行）
#[macro_export]
macro_rules! println {
    () => {
        $crate::_print(format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::_print(format_args!("{}\n", format_args!($($arg)*)))
    };
}
