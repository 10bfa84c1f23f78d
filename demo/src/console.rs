use std::io::{self, Write};

use once_cell::sync::Lazy;
use rcore_console::Console;

/// 标准输出控制台
struct Stdout(io::Stdout);

impl Console for Stdout {
    fn put_char(&self, c: u8) {
        let _ = self.0.lock().write_all(&[c]);
    }

    fn put_str(&self, s: &str) {
        let mut out = self.0.lock();
        let _ = out.write_all(s.as_bytes());
        let _ = out.flush();
    }
}

static STDOUT: Lazy<Stdout> = Lazy::new(|| Stdout(io::stdout()));

/// 把标准输出注册为全局控制台并设置日志级别
pub fn init(level: &str) {
    let stdout: &'static Stdout = Lazy::force(&STDOUT);
    rcore_console::init_console(stdout);
    rcore_console::set_log_level(Some(level));
}
