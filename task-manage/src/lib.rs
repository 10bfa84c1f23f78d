//! task-manage: 进程标识符、pid 分配与进程树关系
//!
//! 提供 `ProcId` 与按实例分配的 `PidAllocator`，
//! 以及 `ProcTree` 维护父子关系、已退出子进程记录与回收。

#![no_std]

extern crate alloc;

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicUsize, Ordering::SeqCst};

// =============================================================================
// 进程标识符 ProcId
// =============================================================================

macro_rules! impl_id_type {
    ($name:ident) => {
        /// 进程生命周期内稳定且唯一的标识符
        #[derive(Clone, Copy)]
        pub struct $name(usize);

        impl $name {
            /// 从原始值构造
            #[inline]
            pub const fn from_usize(v: usize) -> Self {
                Self(v)
            }

            /// 获取原始值
            #[inline]
            pub const fn get_usize(self) -> usize {
                self.0
            }
        }

        impl PartialEq for $name {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl PartialOrd for $name {
            #[inline]
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            #[inline]
            fn cmp(&self, other: &Self) -> Ordering {
                self.0.cmp(&other.0)
            }
        }

        impl Hash for $name {
            #[inline]
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

impl_id_type!(ProcId);

/// 单调递增的 pid 分配器
///
/// 每个进程表持有自己的分配器，pid 不会被复用。
pub struct PidAllocator {
    next: AtomicUsize,
}

impl PidAllocator {
    pub const fn new(first: usize) -> Self {
        Self {
            next: AtomicUsize::new(first),
        }
    }

    #[inline]
    pub fn alloc(&self) -> ProcId {
        ProcId(self.next.fetch_add(1, SeqCst))
    }
}

impl Default for PidAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}

// =============================================================================
// Feature: proc - 进程父子关系与回收
// =============================================================================

#[cfg(feature = "proc")]
mod proc_feature {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;

    /// `ProcTree::wait` 的结果
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum WaitStatus<S> {
        /// 子进程已结束并被回收
        Exited(ProcId, S),
        /// 子进程仍在运行
        Running,
        /// 不是调用者的后代
        NoSuchChild,
    }

    /// 单个进程的父子关系
    pub struct ProcRel<S> {
        parent: Option<ProcId>,
        children: Vec<ProcId>,
        dead_children: Vec<(ProcId, S)>,
    }

    impl<S: Copy> ProcRel<S> {
        pub fn new(parent: Option<ProcId>) -> Self {
            Self {
                parent,
                children: Vec::new(),
                dead_children: Vec::new(),
            }
        }

        #[inline]
        pub fn parent(&self) -> Option<ProcId> {
            self.parent
        }

        /// 仍在运行的子进程
        #[inline]
        pub fn children(&self) -> &[ProcId] {
            &self.children
        }

        pub fn add_child(&mut self, child_pid: ProcId) {
            self.children.push(child_pid);
        }

        pub fn del_child(&mut self, child_pid: ProcId, status: S) {
            if let Some(pos) = self.children.iter().position(|&c| c == child_pid) {
                self.children.remove(pos);
                self.dead_children.push((child_pid, status));
            }
        }

        /// 按退出顺序取出第一个已退出的子进程
        pub fn wait_any_child(&mut self) -> WaitStatus<S> {
            if !self.dead_children.is_empty() {
                let (pid, status) = self.dead_children.remove(0);
                return WaitStatus::Exited(pid, status);
            }
            if self.children.is_empty() {
                WaitStatus::NoSuchChild
            } else {
                WaitStatus::Running
            }
        }

        pub fn wait_child(&mut self, child_pid: ProcId) -> WaitStatus<S> {
            if let Some(pos) = self.dead_children.iter().position(|(c, _)| *c == child_pid) {
                let (pid, status) = self.dead_children.remove(pos);
                return WaitStatus::Exited(pid, status);
            }
            if self.children.contains(&child_pid) {
                return WaitStatus::Running;
            }
            WaitStatus::NoSuchChild
        }
    }

    /// 进程树：父子关系、孤儿收养与已退出子进程的回收
    pub struct ProcTree<S> {
        relations: BTreeMap<ProcId, ProcRel<S>>,
        init: Option<ProcId>,
    }

    impl<S: Copy> ProcTree<S> {
        pub fn new() -> Self {
            Self {
                relations: BTreeMap::new(),
                init: None,
            }
        }

        /// 收养孤儿的进程，即第一个没有父进程的进程
        #[inline]
        pub fn init(&self) -> Option<ProcId> {
            self.init
        }

        #[inline]
        pub fn contains(&self, id: ProcId) -> bool {
            self.relations.contains_key(&id)
        }

        pub fn add(&mut self, id: ProcId, parent: Option<ProcId>) {
            let parent = parent.filter(|p| self.relations.contains_key(p));
            match parent {
                Some(parent) => {
                    if let Some(rel) = self.relations.get_mut(&parent) {
                        rel.add_child(id);
                    }
                }
                None => {
                    if self.init.is_none() {
                        self.init = Some(id);
                    }
                }
            }
            self.relations.insert(id, ProcRel::new(parent));
        }

        pub fn parent(&self, id: ProcId) -> Option<ProcId> {
            self.relations.get(&id)?.parent
        }

        pub fn children(&self, id: ProcId) -> Vec<ProcId> {
            self.relations
                .get(&id)
                .map(|rel| rel.children.clone())
                .unwrap_or_default()
        }

        /// `id` 是否是 `ancestor` 的（直接或间接）后代
        pub fn is_descendant(&self, ancestor: ProcId, id: ProcId) -> bool {
            let mut cursor = self.parent(id);
            while let Some(pid) = cursor {
                if pid == ancestor {
                    return true;
                }
                cursor = self.parent(pid);
            }
            false
        }

        /// 记录进程退出：移入父进程的已退出列表，存活子进程交给 init 收养
        pub fn exit(&mut self, id: ProcId, status: S) {
            let Some(parent) = self.relations.get(&id).map(|rel| rel.parent) else {
                return;
            };
            if let Some(parent_rel) = parent.and_then(|p| self.relations.get_mut(&p)) {
                parent_rel.del_child(id, status);
            }

            let orphans = match self.relations.get_mut(&id) {
                Some(rel) => core::mem::take(&mut rel.children),
                None => Vec::new(),
            };
            let adopter = self.init.filter(|&init| init != id);
            for child_pid in orphans {
                if let Some(child_rel) = self.relations.get_mut(&child_pid) {
                    child_rel.parent = adopter;
                }
                if let Some(init_rel) = adopter.and_then(|a| self.relations.get_mut(&a)) {
                    init_rel.add_child(child_pid);
                }
            }
        }

        /// 等待 `waiter` 的后代 `child`；若已退出则回收
        pub fn wait(&mut self, waiter: ProcId, child: ProcId) -> WaitStatus<S> {
            if !self.is_descendant(waiter, child) {
                return WaitStatus::NoSuchChild;
            }
            let Some(parent) = self.parent(child) else {
                return WaitStatus::NoSuchChild;
            };
            let status = match self.relations.get_mut(&parent) {
                Some(rel) => rel.wait_child(child),
                None => WaitStatus::NoSuchChild,
            };
            if let WaitStatus::Exited(pid, _) = status {
                self.reap(pid);
            }
            status
        }

        /// 等待任意一个直接子进程
        pub fn wait_any(&mut self, waiter: ProcId) -> WaitStatus<S> {
            let status = match self.relations.get_mut(&waiter) {
                Some(rel) => rel.wait_any_child(),
                None => WaitStatus::NoSuchChild,
            };
            if let WaitStatus::Exited(pid, _) = status {
                self.reap(pid);
            }
            status
        }

        fn reap(&mut self, id: ProcId) {
            self.relations.remove(&id);
            if self.init == Some(id) {
                self.init = None;
            }
        }
    }

    impl<S: Copy> Default for ProcTree<S> {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(feature = "proc")]
pub use proc_feature::{ProcRel, ProcTree, WaitStatus};
