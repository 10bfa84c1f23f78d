//! signal-demo 功能性验证测试
//!
//! 覆盖场景文件的解析与校验，以及用内联场景驱动一次完整运行。
//! 未初始化控制台时 `println!` 不产生输出，测试只检查运行结果。

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use signal_demo::runner::host_worker;
use signal_demo::scenario::{parse_signal, parse_signals, Action, Step, PARENT};
use signal_demo::{run, Scenario};
use signal_host::{
    DeliveryLog, DeliveryOutcome, Kernel, ProcessState, SignalNo, SignalSet, SpawnConfig,
    TerminalState,
};

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

fn error_text(text: &str) -> String {
    format!("{:#}", Scenario::parse(text).unwrap_err())
}

#[test]
fn test_bundled_scenarios_load() {
    for name in ["q1.toml", "q2.toml", "q3.toml"] {
        let scenario = Scenario::load(&scenario_path(name)).unwrap();
        assert_eq!(scenario.children.len(), 4, "{}", name);
        assert_eq!(
            scenario.child_roles(),
            vec!["child0", "child1", "child2", "child3"],
            "{}",
            name
        );
    }
}

/// 以零节奏运行一个自带场景，检查四个子进程都已结束、父进程正常退出
fn run_bundled(name: &str) -> Vec<TerminalState> {
    let mut scenario = Scenario::load(&scenario_path(name)).unwrap();
    scenario.pace_ms = 0;
    let kernel = Arc::new(Kernel::new());
    let report = run(kernel.clone(), &scenario).unwrap();

    let roles: Vec<&str> = report
        .children
        .iter()
        .map(|(role, _, _)| role.as_str())
        .collect();
    assert_eq!(roles, vec!["child0", "child1", "child2", "child3"], "{}", name);
    for (_, pid, status) in &report.children {
        assert_eq!(kernel.state(*pid), Some(ProcessState::from(*status)), "{}", name);
        assert!(kernel.children(*pid).is_empty());
    }
    let parent = report.parent.unwrap();
    assert_eq!(kernel.state(parent), Some(ProcessState::Exited(0)), "{}", name);
    assert!(kernel.children(parent).is_empty());
    report.children.iter().map(|&(_, _, status)| status).collect()
}

#[test]
fn test_run_q1() {
    // 外部注入的 SIGQUIT 可能先于或晚于 child3 退出到达
    for status in run_bundled("q1.toml") {
        assert!(matches!(
            status,
            TerminalState::Exited(0) | TerminalState::Terminated(SignalNo::SIGQUIT)
        ));
    }
}

#[test]
fn test_run_q2() {
    assert_eq!(run_bundled("q2.toml"), vec![TerminalState::Exited(0); 4]);
}

#[test]
fn test_run_q3() {
    assert_eq!(run_bundled("q3.toml"), vec![TerminalState::Exited(0); 4]);
}

#[test]
fn test_q1_child_configuration() {
    let scenario = Scenario::load(&scenario_path("q1.toml")).unwrap();
    assert_eq!(scenario.name, "q1");
    let child = &scenario.children[0].signals;
    assert_eq!(
        parse_signals(&child.block).unwrap(),
        SignalSet::from(SignalNo::SIGINT).union(SignalNo::SIGABRT.into())
    );
    assert_eq!(parse_signals(&child.handle).unwrap().len(), 4);
    assert!(!child.inherit);
}

#[test]
fn test_q3_children_inherit() {
    let scenario = Scenario::load(&scenario_path("q3.toml")).unwrap();
    assert!(scenario.children.iter().all(|child| child.signals.inherit));
    assert_eq!(scenario.parent.before_fork.len(), 4);
}

#[test]
fn test_load_missing_file() {
    let err = Scenario::load(&scenario_path("missing.toml")).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to read"));
}

#[test]
fn test_parse_signal_names() {
    assert_eq!(parse_signal("SIGINT").unwrap(), SignalNo::SIGINT);
    assert_eq!(parse_signal("term").unwrap(), SignalNo::SIGTERM);
    assert_eq!(parse_signal("9").unwrap(), SignalNo::SIGKILL);
    assert!(parse_signal("SIGFOO").is_err());
}

#[test]
fn test_unknown_signal_rejected() {
    let text = r#"
        name = "bad"
        [parent]
        ignore = ["SIGFOO"]
    "#;
    assert!(error_text(text).contains("SIGFOO"));
}

#[test]
fn test_unknown_role_rejected() {
    let text = r#"
        name = "bad"
        [parent]
        after_fork = [{ op = "send", signal = "SIGINT", to = "nobody" }]
        [[child]]
    "#;
    assert!(error_text(text).contains("nobody"));
}

#[test]
fn test_duplicate_role_rejected() {
    let text = r#"
        name = "bad"
        [parent]
        [[child]]
        role = "worker"
        [[child]]
        role = "worker"
    "#;
    assert!(error_text(text).contains("duplicate role"));
}

#[test]
fn test_parent_role_is_reserved() {
    let text = r#"
        name = "bad"
        [parent]
        [[child]]
        role = "parent"
    "#;
    assert!(error_text(text).contains("duplicate role"));
}

#[test]
fn test_unknown_top_level_field_rejected() {
    let text = r#"
        name = "bad"
        speed = 3
        [parent]
    "#;
    assert!(Scenario::parse(text).is_err());
}

#[test]
fn test_step_resolve() {
    let roles: BTreeSet<String> = [PARENT.to_string(), "child0".to_string()].into();
    let step = Step::Send {
        signal: "USR1".into(),
        to: "child0".into(),
        times: 1,
    };
    assert_eq!(
        step.resolve(&roles).unwrap(),
        Action::Send {
            signo: SignalNo::SIGUSR1,
            to: "child0".into(),
            times: 1,
            external: false,
        }
    );
    let step = Step::Inject {
        signal: "SIGHUP".into(),
        to: PARENT.into(),
        times: 3,
    };
    assert!(matches!(
        step.resolve(&roles).unwrap(),
        Action::Send { external: true, times: 3, .. }
    ));
    let step = Step::Restore {
        signals: vec!["SIGINT".into(), "SIGHUP".into()],
    };
    assert_eq!(
        step.resolve(&roles).unwrap(),
        Action::Restore(SignalSet::from(SignalNo::SIGINT).union(SignalNo::SIGHUP.into()))
    );
}

#[test]
fn test_send_times_defaults_to_one() {
    let text = r#"
        name = "defaults"
        [parent]
        [[child]]
        steps = [{ op = "send", signal = "SIGUSR1", to = "parent" }]
    "#;
    let scenario = Scenario::parse(text).unwrap();
    assert!(matches!(
        &scenario.children[0].steps[0],
        Step::Send { times: 1, .. }
    ));
    assert_eq!(scenario.pace_ms, 0);
}

const SELF_SIGNALS: &str = r#"
    name = "self-signals"
    [parent]
    after_wait = [{ op = "pending" }]

    [[child]]
    steps = [{ op = "send", signal = "SIGQUIT", to = "child0" }, { op = "sum", bound = 3 }]

    [[child]]
    handle = ["SIGUSR1"]
    steps = [{ op = "send", signal = "SIGUSR1", to = "child1", times = 2 }, { op = "sum", bound = 3 }]

    [[child]]
    block = ["SIGTERM"]
    steps = [
        { op = "send", signal = "SIGTERM", to = "child2" },
        { op = "sum", bound = 3 },
        { op = "unblock", signals = ["SIGTERM"] },
        { op = "sum", bound = 3 },
    ]
"#;

#[test]
fn test_run_reports_each_child() {
    let scenario = Scenario::parse(SELF_SIGNALS).unwrap();
    let kernel = Arc::new(Kernel::new());
    let log = Arc::new(DeliveryLog::new());
    kernel.add_observer(log.clone());

    let report = run(kernel.clone(), &scenario).unwrap();

    let statuses: Vec<(&str, TerminalState)> = report
        .children
        .iter()
        .map(|(role, _, status)| (role.as_str(), *status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("child0", TerminalState::Terminated(SignalNo::SIGQUIT)),
            ("child1", TerminalState::Exited(0)),
            ("child2", TerminalState::Terminated(SignalNo::SIGTERM)),
        ]
    );

    let parent = report.parent.unwrap();
    assert_eq!(kernel.state(parent), Some(ProcessState::Exited(0)));

    let (_, child1, _) = report.children[1];
    let handled = log
        .events_for(child1)
        .iter()
        .filter(|event| {
            event.signo == SignalNo::SIGUSR1 && event.outcome == DeliveryOutcome::HandlerInvoked
        })
        .count();
    assert_eq!(handled, 2);

    let (_, child2, _) = report.children[2];
    let outcomes: Vec<DeliveryOutcome> = log
        .events_for(child2)
        .iter()
        .map(|event| event.outcome)
        .collect();
    assert_eq!(outcomes.first(), Some(&DeliveryOutcome::Queued));
}

#[test]
fn test_parent_terminated_before_fork() {
    let text = r#"
        name = "early"
        [parent]
        before_fork = [{ op = "inject", signal = "SIGTERM", to = "parent" }]
        [[child]]
    "#;
    let scenario = Scenario::parse(text).unwrap();
    let kernel = Arc::new(Kernel::new());
    let report = run(kernel.clone(), &scenario).unwrap();
    assert!(report.children.is_empty());
    let parent = report.parent.unwrap();
    assert_eq!(
        kernel.state(parent),
        Some(ProcessState::Terminated(SignalNo::SIGTERM))
    );
    assert!(kernel.children(parent).is_empty());
}

#[test]
fn test_spawn_limit_surfaces_as_error() {
    let scenario = Scenario::parse(SELF_SIGNALS).unwrap();
    let kernel = Arc::new(Kernel::with_limit(2));
    let err = run(kernel, &scenario).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to spawn child1"));
}

#[test]
fn test_host_worker_exits_normally() {
    let kernel = Kernel::new();
    let parent = kernel.spawn(None, SpawnConfig::new()).unwrap();
    let child = kernel.spawn(Some(parent), SpawnConfig::new()).unwrap();
    host_worker(&kernel, child, "child", || true);
    assert_eq!(kernel.wait(parent, child), Ok((child, TerminalState::Exited(0))));
}

#[test]
fn test_panicking_worker_still_ends_its_process() {
    let kernel = Arc::new(Kernel::new());
    let parent = kernel.spawn(None, SpawnConfig::new()).unwrap();
    let child = kernel.spawn(Some(parent), SpawnConfig::new()).unwrap();

    let handle = {
        let kernel = kernel.clone();
        thread::spawn(move || {
            host_worker(&kernel, child, "child", || -> bool { panic!("worker failed") });
        })
    };
    // 父进程的等待不会永远阻塞
    assert_eq!(
        kernel.wait(parent, child),
        Ok((child, TerminalState::Terminated(SignalNo::SIGABRT)))
    );
    assert!(handle.join().is_err());
}

#[test]
fn test_stdout_console_init() {
    signal_demo::console::init("warn");
    assert!(rcore_console::is_initialized());
    assert_eq!(log::max_level(), log::LevelFilter::Warn);
}
