use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rcore_console::println;
use signal_demo::{console, run, Scenario};
use signal_host::{Kernel, SignalNo};

#[derive(Parser)]
#[clap(name = "signal-demo", version, about, long_about = None)]
struct Cli {
    /// 日志级别：error、warn、info、debug、trace
    #[clap(long, global = true, default_value = "warn")]
    log_level: String,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行一个场景文件
    Run(RunArgs),
    /// 列出所有信号及其默认动作
    ListSignals,
}

#[derive(Args)]
struct RunArgs {
    /// 场景文件路径
    scenario: PathBuf,
    /// 覆盖场景中的求和节奏（毫秒）
    #[clap(long)]
    pace_ms: Option<u64>,
    /// 同时存活的进程数上限
    #[clap(long)]
    max_procs: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    console::init(&cli.log_level);
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::ListSignals => {
            list_signals();
            Ok(())
        }
    }
}

impl RunArgs {
    fn run(self) -> Result<()> {
        let mut scenario = Scenario::load(&self.scenario)?;
        if let Some(pace) = self.pace_ms {
            scenario.pace_ms = pace;
        }
        if !scenario.description.is_empty() {
            println!("# {}", scenario.description);
        }
        let kernel = Arc::new(match self.max_procs {
            Some(limit) => Kernel::with_limit(limit),
            None => Kernel::new(),
        });
        run(kernel, &scenario)?;
        Ok(())
    }
}

fn list_signals() {
    for signo in SignalNo::iter() {
        println!(
            "{:>2} {:<9} {:<9} {}",
            signo as u8,
            signo.name(),
            format!("{:?}", signo.default_action()),
            signo.description()
        );
    }
}
