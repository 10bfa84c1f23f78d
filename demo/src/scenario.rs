//! 场景文件：进程角色、信号配置与按顺序执行的步骤

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_derive::Deserialize;
use signal_host::{SignalAction, SignalNo, SignalSet, SpawnConfig};

/// 父进程的角色名
pub const PARENT: &str = "parent";

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 每轮求和之后的停顿（毫秒）
    #[serde(default)]
    pub pace_ms: u64,
    pub parent: ParentConfig,
    #[serde(default, rename = "child")]
    pub children: Vec<ChildConfig>,
}

/// 信号配置，父子进程共用
#[derive(Deserialize, Debug, Default)]
pub struct SignalConfig {
    /// 从父进程继承处置与屏蔽字
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub block: Vec<String>,
    #[serde(default)]
    pub handle: Vec<String>,
    /// 处理函数运行期间额外屏蔽的信号
    #[serde(default)]
    pub handler_mask: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ParentConfig {
    #[serde(flatten)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub before_fork: Vec<Step>,
    #[serde(default)]
    pub after_fork: Vec<Step>,
    #[serde(default)]
    pub after_wait: Vec<Step>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ChildConfig {
    /// 缺省为 `child{序号}`
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// 以当前进程为发送者发送信号
    Send {
        signal: String,
        to: String,
        #[serde(default = "once")]
        times: usize,
    },
    /// 由进程树之外发送信号
    Inject {
        signal: String,
        to: String,
        #[serde(default = "once")]
        times: usize,
    },
    /// 求 0..=bound 的和，每轮之后是一个让出点
    Sum { bound: u64 },
    Block { signals: Vec<String> },
    Unblock { signals: Vec<String> },
    /// 把处置恢复为默认
    Restore { signals: Vec<String> },
    /// 打印未决集合
    Pending,
    Pause { ms: u64 },
}

fn once() -> usize {
    1
}

/// 解析后的步骤
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send {
        signo: SignalNo,
        to: String,
        times: usize,
        external: bool,
    },
    Sum(u64),
    Block(SignalSet),
    Unblock(SignalSet),
    Restore(SignalSet),
    Pending,
    Pause(u64),
}

pub fn parse_signal(name: &str) -> Result<SignalNo> {
    name.parse::<SignalNo>()
        .with_context(|| format!("unknown signal `{}`", name))
}

pub fn parse_signals(names: &[String]) -> Result<SignalSet> {
    names.iter().map(|name| parse_signal(name)).collect()
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid scenario {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// 子进程角色名，按声明顺序
    pub fn child_roles(&self) -> Vec<String> {
        self.children
            .iter()
            .enumerate()
            .map(|(idx, child)| child.role.clone().unwrap_or_else(|| format!("child{}", idx)))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        let mut roles = BTreeSet::new();
        roles.insert(PARENT.to_string());
        for role in self.child_roles() {
            if !roles.insert(role.clone()) {
                bail!("duplicate role `{}`", role);
            }
        }
        self.parent.signals.spawn_config()?;
        for step in self
            .parent
            .before_fork
            .iter()
            .chain(&self.parent.after_fork)
            .chain(&self.parent.after_wait)
        {
            step.resolve(&roles)?;
        }
        for child in &self.children {
            child.signals.spawn_config()?;
            for step in &child.steps {
                step.resolve(&roles)?;
            }
        }
        Ok(())
    }
}

impl SignalConfig {
    /// 翻译为引擎的 `SpawnConfig`，被捕获的信号都使用打印处理函数
    pub fn spawn_config(&self) -> Result<SpawnConfig> {
        let mut config = SpawnConfig::new();
        if self.inherit {
            config = config.inherit();
        }
        for signo in parse_signals(&self.ignore)? {
            config = config.ignore(signo);
        }
        let mask = parse_signals(&self.handler_mask)?;
        for signo in parse_signals(&self.handle)? {
            config = config.handle(signo, report_action(mask));
        }
        Ok(config.block(parse_signals(&self.block)?))
    }
}

impl Step {
    pub fn resolve(&self, roles: &BTreeSet<String>) -> Result<Action> {
        let target = |to: &String| -> Result<String> {
            if roles.contains(to) {
                Ok(to.clone())
            } else {
                bail!("unknown role `{}`", to)
            }
        };
        Ok(match self {
            Step::Send { signal, to, times } => Action::Send {
                signo: parse_signal(signal)?,
                to: target(to)?,
                times: *times,
                external: false,
            },
            Step::Inject { signal, to, times } => Action::Send {
                signo: parse_signal(signal)?,
                to: target(to)?,
                times: *times,
                external: true,
            },
            Step::Sum { bound } => Action::Sum(*bound),
            Step::Block { signals } => Action::Block(parse_signals(signals)?),
            Step::Unblock { signals } => Action::Unblock(parse_signals(signals)?),
            Step::Restore { signals } => Action::Restore(parse_signals(signals)?),
            Step::Pending => Action::Pending,
            Step::Pause { ms } => Action::Pause(*ms),
        })
    }
}

/// 打印接收者、信号与发送者的处理函数
pub fn report_action(mask: SignalSet) -> SignalAction {
    SignalAction::new(mask, |_, info| {
        let signo = info.signo;
        match info.sender {
            Some(sender) => {
                rcore_console::println!(
                    "  [PID {}] caught signal {} ({}) from PID {}",
                    info.receiver,
                    signo as u8,
                    signo.description(),
                    sender
                );
            }
            None => {
                rcore_console::println!(
                    "  [PID {}] caught signal {} ({})",
                    info.receiver,
                    signo as u8,
                    signo.description()
                );
            }
        }
    })
}
