//! sync: 宿主线程上的阻塞等待原语
//!
//! 等待者登记在队列中后挂起（`std::thread::park`），
//! 唤醒者从队列中取出线程并 `unpark`。

use std::collections::VecDeque;
use std::thread::{self, Thread, ThreadId};

/// 条件变量
///
/// 不绑定互斥锁：条件由调用者提供的闭包检查，闭包内部自行加锁。
/// 登记之后会再检查一次条件，因此唤醒不会丢失。
pub struct Condvar {
    waiting: spin::Mutex<VecDeque<Thread>>,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            waiting: spin::Mutex::new(VecDeque::new()),
        }
    }

    /// 阻塞当前线程，直到 `cond` 返回 `Some`
    pub fn wait_until<T, F>(&self, mut cond: F) -> T
    where
        F: FnMut() -> Option<T>,
    {
        loop {
            if let Some(value) = cond() {
                return value;
            }
            let current = thread::current();
            let id = current.id();
            self.waiting.lock().push_back(current);
            if let Some(value) = cond() {
                self.forget(id);
                return value;
            }
            thread::park();
            self.forget(id);
        }
    }

    /// 唤醒最早登记的一个等待者，返回是否有人被唤醒
    pub fn signal(&self) -> bool {
        let woken = self.waiting.lock().pop_front();
        match woken {
            Some(thread) => {
                thread.unpark();
                true
            }
            None => false,
        }
    }

    /// 唤醒全部等待者，返回被唤醒的数量
    pub fn broadcast(&self) -> usize {
        let woken: Vec<Thread> = self.waiting.lock().drain(..).collect();
        let count = woken.len();
        for thread in woken {
            thread.unpark();
        }
        count
    }

    /// 当前登记的等待者数量
    pub fn waiters(&self) -> usize {
        self.waiting.lock().len()
    }

    fn forget(&self, id: ThreadId) {
        self.waiting.lock().retain(|thread| thread.id() != id);
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

/// 计数信号量
pub struct Semaphore {
    count: spin::Mutex<isize>,
    cond: Condvar,
}

impl Semaphore {
    pub const fn new(res_count: usize) -> Self {
        Self {
            count: spin::Mutex::new(res_count as isize),
            cond: Condvar::new(),
        }
    }

    /// 获取一个资源，没有可用资源时阻塞
    pub fn down(&self) {
        self.cond.wait_until(|| {
            let mut count = self.count.lock();
            if *count > 0 {
                *count -= 1;
                Some(())
            } else {
                None
            }
        })
    }

    /// 不阻塞地尝试获取
    pub fn try_down(&self) -> bool {
        let mut count = self.count.lock();
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    /// 归还一个资源并唤醒等待者重新竞争
    pub fn up(&self) {
        *self.count.lock() += 1;
        self.cond.broadcast();
    }
}
