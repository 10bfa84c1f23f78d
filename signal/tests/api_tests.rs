//! signal crate 功能性验证测试
//!
//! 这些测试验证 signal crate 对外提供的类型与 trait 定义。
//! 测试在用户态环境运行，使用 std。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use signal::*;

/// 只记录调用次数的 `SignalOps`
struct CountingOps {
    sends: AtomicUsize,
}

impl SignalOps for CountingOps {
    fn send(
        &self,
        _sender: Option<ProcId>,
        _target: ProcId,
        _signo: SignalNo,
    ) -> Result<DeliveryOutcome, SendError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(DeliveryOutcome::Queued)
    }

    fn block(&self, _pid: ProcId, _set: SignalSet) {}

    fn unblock(&self, _pid: ProcId, _set: SignalSet) -> Vec<(SignalNo, DeliveryOutcome)> {
        Vec::new()
    }

    fn pending_set(&self, _pid: ProcId) -> SignalSet {
        SignalSet::empty()
    }
}

#[test]
fn test_disposition_default() {
    let disposition = Disposition::default();
    assert!(disposition.is_default());
    assert!(!disposition.is_ignore());
    assert!(!disposition.is_handler());
    assert!(Disposition::Ignore.is_ignore());
}

#[test]
fn test_signal_action_calls_handler_with_ops() {
    let seen = Arc::new(AtomicUsize::new(0));
    let seen2 = seen.clone();
    let action = SignalAction::new(SignalSet::from(SignalNo::SIGABRT), move |ops, info| {
        seen2.fetch_add(info.signo as usize, Ordering::SeqCst);
        ops.send(Some(info.receiver), info.receiver, SignalNo::SIGABRT)
            .unwrap();
    });
    assert!(action.mask.contains(SignalNo::SIGABRT));

    let ops = CountingOps {
        sends: AtomicUsize::new(0),
    };
    let info = SigInfo {
        signo: SignalNo::SIGINT,
        sender: None,
        receiver: ProcId::from_usize(3),
    };
    (action.handler)(&ops, &info);
    assert_eq!(seen.load(Ordering::SeqCst), SignalNo::SIGINT as usize);
    assert_eq!(ops.sends.load(Ordering::SeqCst), 1);
}

#[test]
fn test_signal_action_clone_shares_handler() {
    let action = SignalAction::new(SignalSet::empty(), |_, _| {});
    let copy = action.clone();
    assert!(Arc::ptr_eq(&action.handler, &copy.handler));
    assert!(format!("{:?}", Disposition::Handler(copy)).contains("SignalAction"));
}

#[test]
fn test_delivery_outcome_display() {
    assert_eq!(DeliveryOutcome::Dropped.to_string(), "dropped");
    assert_eq!(DeliveryOutcome::Queued.to_string(), "queued");
    assert_eq!(DeliveryOutcome::HandlerInvoked.to_string(), "handler invoked");
    assert_eq!(
        DeliveryOutcome::DefaultActionApplied(DefaultAction::Terminate).to_string(),
        "default action Terminate"
    );
}

#[test]
fn test_send_error_display() {
    let err = SendError::NoSuchProcess(ProcId::from_usize(7));
    assert_eq!(err.to_string(), "no such process: 7");
}

#[test]
fn test_signal_trait_object_is_send_sync() {
    fn assert_send_sync<T: ?Sized + Send + Sync>() {}
    assert_send_sync::<dyn Signal>();
    assert_send_sync::<dyn SignalOps>();
    assert_send_sync::<Disposition>();
}
