//! 场景执行：每个被托管进程由一个线程驱动

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rcore_console::println;
use signal_host::{
    Disposition, Kernel, ProcId, ProcessDirectory, SignalNo, SignalSet, TerminalState,
};
use sync::Semaphore;

use crate::scenario::{Action, Scenario, Step, PARENT};

/// 一次运行的结果
#[derive(Debug, Default)]
pub struct Report {
    /// 按派生顺序：角色、pid 与结束方式
    pub children: Vec<(String, ProcId, TerminalState)>,
    pub parent: Option<ProcId>,
}

/// 工作线程是否还应继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Terminated,
}

/// 被托管进程的执行上下文
struct Worker {
    kernel: Arc<Kernel>,
    directory: Arc<ProcessDirectory>,
    pid: ProcId,
    label: String,
    pace: Duration,
}

impl Worker {
    fn run(&self, actions: &[Action]) -> Flow {
        for action in actions {
            if self.step(action) == Flow::Terminated {
                return Flow::Terminated;
            }
        }
        Flow::Continue
    }

    fn step(&self, action: &Action) -> Flow {
        match action {
            Action::Send {
                signo,
                to,
                times,
                external,
            } => {
                let Some(target) = self.directory.get(to) else {
                    warn!("{}: no process plays `{}`", self.label, to);
                    return Flow::Continue;
                };
                let sender = if *external {
                    println!(
                        "Harness: sending signal {} ({}) to {} [PID {}]",
                        *signo as u8,
                        signo.description(),
                        to,
                        target
                    );
                    None
                } else {
                    println!(
                        "{}: sending signal {} ({}) to {} [PID {}]",
                        self.label,
                        *signo as u8,
                        signo.description(),
                        to,
                        target
                    );
                    Some(self.pid)
                };
                for _ in 0..*times {
                    match self.kernel.send(sender, target, *signo) {
                        Ok(outcome) => debug!("{} -> {}: {}", signo, target, outcome),
                        Err(err) => {
                            warn!("{}: {}", self.label, err);
                            break;
                        }
                    }
                    if self.checkpoint() == Flow::Terminated {
                        return Flow::Terminated;
                    }
                }
            }
            Action::Sum(bound) => {
                let mut sum = 0u64;
                for i in 0..=*bound {
                    sum += i;
                    println!(
                        "{}: iteration {:2}/{:2} → sum={}",
                        self.label, i, bound, sum
                    );
                    self.pause(self.pace);
                    if self.checkpoint() == Flow::Terminated {
                        return Flow::Terminated;
                    }
                }
            }
            Action::Block(set) => self.kernel.block(self.pid, *set),
            Action::Unblock(set) => {
                let delivered = self.kernel.unblock(self.pid, *set);
                debug!("{}: unblock {} delivered {:?}", self.label, set, delivered);
            }
            Action::Restore(set) => {
                for signo in *set {
                    self.kernel.install(self.pid, signo, Disposition::Default);
                }
                println!("{}: defaults restored for {}", self.label, set);
            }
            Action::Pending => print_pending(&self.label, self.kernel.pending_set(self.pid)),
            Action::Pause(ms) => self.pause(Duration::from_millis(*ms)),
        }
        self.checkpoint()
    }

    fn checkpoint(&self) -> Flow {
        match self.kernel.checkpoint(self.pid) {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Terminated,
        }
    }

    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

fn print_pending(who: &str, pending: SignalSet) {
    let names: Vec<&str> = pending.iter().map(|signo| signo.description()).collect();
    if names.is_empty() {
        println!("{} pending:", who);
    } else {
        println!("{} pending: {}", who, names.join(" "));
    }
}

/// 在当前线程上运行被托管进程 `pid` 的主体
///
/// 主体返回 `true` 表示进程仍在运行，此时以 `Exited(0)` 结束它。
/// 主体 panic 时进程以 `SIGABRT` 终止，等待它的父进程不会永远阻塞，随后 panic 继续传播。
pub fn host_worker<F>(kernel: &Kernel, pid: ProcId, label: &str, body: F)
where
    F: FnOnce() -> bool,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(true) => {
            println!("{}: done, exiting.", label);
            kernel.finish(pid, TerminalState::Exited(0));
        }
        Ok(false) => {}
        Err(payload) => {
            warn!("{}: worker panicked", label);
            kernel.finish(pid, TerminalState::Terminated(SignalNo::SIGABRT));
            panic::resume_unwind(payload);
        }
    }
}

fn resolve(steps: &[Step], roles: &BTreeSet<String>) -> Result<Vec<Action>> {
    steps.iter().map(|step| step.resolve(roles)).collect()
}

/// 运行一个场景，直到所有子进程被回收且父进程结束
pub fn run(kernel: Arc<Kernel>, scenario: &Scenario) -> Result<Report> {
    let child_roles = scenario.child_roles();
    let roles: BTreeSet<String> = child_roles
        .iter()
        .cloned()
        .chain([PARENT.to_string()])
        .collect();
    let pace = Duration::from_millis(scenario.pace_ms);

    let parent = kernel
        .spawn(None, scenario.parent.signals.spawn_config()?)
        .context("failed to spawn the parent")?;
    println!("Parent [PID {}]: {}", parent, scenario.name);

    // 派生之前只有父进程可以被寻址
    let early = Worker {
        kernel: kernel.clone(),
        directory: Arc::new([(PARENT, parent)].into_iter().collect()),
        pid: parent,
        label: "Parent".into(),
        pace,
    };
    if early.run(&resolve(&scenario.parent.before_fork, &roles)?) == Flow::Terminated {
        println!("Parent: terminated before fork");
        return Ok(Report {
            parent: Some(parent),
            ..Report::default()
        });
    }

    let mut pids = Vec::with_capacity(scenario.children.len());
    for (idx, (role, child)) in child_roles.iter().zip(&scenario.children).enumerate() {
        let pid = kernel
            .spawn(Some(parent), child.signals.spawn_config()?)
            .with_context(|| format!("failed to spawn {}", role))?;
        println!("Parent: forked child {} → PID {}", idx, pid);
        pids.push(pid);
    }

    let directory: Arc<ProcessDirectory> = Arc::new(
        child_roles
            .iter()
            .map(String::as_str)
            .zip(pids.iter().copied())
            .chain([(PARENT, parent)])
            .collect(),
    );

    // 所有子进程都已登记后再一起开始
    let gate = Arc::new(Semaphore::new(0));
    let mut handles = Vec::with_capacity(pids.len());
    for (idx, (&pid, child)) in pids.iter().zip(&scenario.children).enumerate() {
        let worker = Worker {
            kernel: kernel.clone(),
            directory: directory.clone(),
            pid,
            label: format!("Child {} [PID {}]", idx, pid),
            pace,
        };
        let actions = resolve(&child.steps, &roles)?;
        let gate = gate.clone();
        handles.push(thread::spawn(move || {
            gate.down();
            host_worker(&worker.kernel, worker.pid, &worker.label, || {
                worker.run(&actions) == Flow::Continue
            });
        }));
    }
    for _ in &handles {
        gate.up();
    }

    let supervisor = Worker {
        directory: directory.clone(),
        ..early
    };
    let mut flow = supervisor.run(&resolve(&scenario.parent.after_fork, &roles)?);

    let mut children = Vec::with_capacity(pids.len());
    for (role, &pid) in child_roles.iter().zip(&pids) {
        match kernel.wait(parent, pid) {
            Ok((pid, status)) => {
                match status {
                    TerminalState::Exited(code) => {
                        println!("Parent: child PID {} exited [{}]", pid, code)
                    }
                    TerminalState::Terminated(signo) => println!(
                        "Parent: child PID {} died on signal {} ({})",
                        pid,
                        signo as u8,
                        signo.description()
                    ),
                }
                children.push((role.clone(), pid, status));
            }
            Err(err) => warn!("waitpid {}: {}", pid, err),
        }
    }
    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow!("a child worker panicked"))?;
    }

    if flow == Flow::Continue {
        flow = supervisor.run(&resolve(&scenario.parent.after_wait, &roles)?);
    }
    if flow == Flow::Continue {
        println!("Parent: done, exiting.");
        kernel.finish(parent, TerminalState::Exited(0));
    } else {
        println!("Parent: terminated by a signal");
    }
    Ok(Report {
        children,
        parent: Some(parent),
    })
}
