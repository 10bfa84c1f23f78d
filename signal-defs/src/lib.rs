#![no_std]

#[cfg(feature = "std")]
extern crate std;

use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;
use numeric_enum_macro::numeric_enum;

numeric_enum! {
    #[repr(u8)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum SignalNo {
        ERR = 0,
        SIGHUP = 1,
        SIGINT = 2,
        SIGQUIT = 3,
        SIGILL = 4,
        SIGTRAP = 5,
        SIGABRT = 6,
        SIGBUS = 7,
        SIGFPE = 8,
        SIGKILL = 9,
        SIGUSR1 = 10,
        SIGSEGV = 11,
        SIGUSR2 = 12,
        SIGPIPE = 13,
        SIGALRM = 14,
        SIGTERM = 15,
        SIGSTKFLT = 16,
        SIGCHLD = 17,
        SIGCONT = 18,
        SIGSTOP = 19,
        SIGTSTP = 20,
        SIGTTIN = 21,
        SIGTTOU = 22,
        SIGURG = 23,
        SIGXCPU = 24,
        SIGXFSZ = 25,
        SIGVTALRM = 26,
        SIGPROF = 27,
        SIGWINCH = 28,
        SIGIO = 29,
        SIGPWR = 30,
        SIGSYS = 31,
    }
}

/// 标准信号的最大编号
///
/// 只建模 1..=31 的标准信号，实时信号不在此范围内。
pub const MAX_SIG: usize = 31;

/// 信号的默认动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    /// 终止进程
    Terminate,
    /// 终止进程并产生 core
    CoreDump,
    /// 暂停进程
    Stop,
    /// 恢复被暂停的进程
    Continue,
    /// 默认忽略
    Ignore,
}

impl DefaultAction {
    /// 默认动作是否会结束进程
    #[inline]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Terminate | Self::CoreDump)
    }
}

impl From<usize> for SignalNo {
    /// 将 `usize` 转换为 `SignalNo`
    ///
    /// 未知编号（包括超出 `u8` 的值）返回 `SignalNo::ERR`。
    fn from(num: usize) -> Self {
        u8::try_from(num)
            .ok()
            .and_then(|num| SignalNo::try_from(num).ok())
            .unwrap_or(SignalNo::ERR)
    }
}

const NAMES: [&str; MAX_SIG + 1] = [
    "ERR", "SIGHUP", "SIGINT", "SIGQUIT", "SIGILL", "SIGTRAP", "SIGABRT", "SIGBUS", "SIGFPE",
    "SIGKILL", "SIGUSR1", "SIGSEGV", "SIGUSR2", "SIGPIPE", "SIGALRM", "SIGTERM", "SIGSTKFLT",
    "SIGCHLD", "SIGCONT", "SIGSTOP", "SIGTSTP", "SIGTTIN", "SIGTTOU", "SIGURG", "SIGXCPU",
    "SIGXFSZ", "SIGVTALRM", "SIGPROF", "SIGWINCH", "SIGIO", "SIGPWR", "SIGSYS",
];

const DESCRIPTIONS: [&str; MAX_SIG + 1] = [
    "Unknown signal",
    "Hangup",
    "Interrupt",
    "Quit",
    "Illegal instruction",
    "Trace/breakpoint trap",
    "Aborted",
    "Bus error",
    "Floating point exception",
    "Killed",
    "User defined signal 1",
    "Segmentation fault",
    "User defined signal 2",
    "Broken pipe",
    "Alarm clock",
    "Terminated",
    "Stack fault",
    "Child exited",
    "Continued",
    "Stopped (signal)",
    "Stopped",
    "Stopped (tty input)",
    "Stopped (tty output)",
    "Urgent I/O condition",
    "CPU time limit exceeded",
    "File size limit exceeded",
    "Virtual timer expired",
    "Profiling timer expired",
    "Window changed",
    "I/O possible",
    "Power failure",
    "Bad system call",
];

impl SignalNo {
    /// 稳定的数值序，仅用于同时可投递时的先后顺序
    #[inline]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// 是否为 1..=MAX_SIG 内的有效信号
    #[inline]
    pub fn is_valid(self) -> bool {
        self != SignalNo::ERR
    }

    /// SIGKILL 与 SIGSTOP 不能被捕获、忽略或屏蔽
    #[inline]
    pub fn is_catchable(self) -> bool {
        !matches!(self, SignalNo::SIGKILL | SignalNo::SIGSTOP)
    }

    pub fn default_action(self) -> DefaultAction {
        use SignalNo::*;
        match self {
            ERR | SIGCHLD | SIGURG | SIGWINCH => DefaultAction::Ignore,
            SIGCONT => DefaultAction::Continue,
            SIGSTOP | SIGTSTP | SIGTTIN | SIGTTOU => DefaultAction::Stop,
            SIGQUIT | SIGILL | SIGTRAP | SIGABRT | SIGBUS | SIGFPE | SIGSEGV | SIGXCPU
            | SIGXFSZ | SIGSYS => DefaultAction::CoreDump,
            _ => DefaultAction::Terminate,
        }
    }

    /// 与 `strsignal` 相同的描述文字
    #[inline]
    pub fn description(self) -> &'static str {
        DESCRIPTIONS[self as usize]
    }

    #[inline]
    pub fn name(self) -> &'static str {
        NAMES[self as usize]
    }

    /// 按编号升序遍历所有有效信号
    pub fn iter() -> impl Iterator<Item = SignalNo> {
        (1..=MAX_SIG).map(SignalNo::from)
    }
}

impl fmt::Display for SignalNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 信号名解析失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseSignalError;

impl fmt::Display for ParseSignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown signal name")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseSignalError {}

impl FromStr for SignalNo {
    type Err = ParseSignalError;

    /// 接受 `SIGINT`、`INT`（不区分大小写）或十进制编号
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(num) = s.parse::<usize>() {
            return if num == 0 || num > MAX_SIG {
                Err(ParseSignalError)
            } else {
                Ok(SignalNo::from(num))
            };
        }
        let bare = match s.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("SIG") => &s[3..],
            _ => s,
        };
        SignalNo::iter()
            .find(|signo| signo.name()[3..].eq_ignore_ascii_case(bare))
            .ok_or(ParseSignalError)
    }
}

/// 信号集合的位图表示，第 n 位对应编号为 n 的信号
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SignalSet(pub usize);

impl SignalSet {
    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// 所有有效信号
    #[inline]
    pub const fn full() -> Self {
        Self((usize::MAX >> (usize::BITS as usize - MAX_SIG - 1)) & !1)
    }

    #[inline]
    pub fn add_bit(&mut self, bit: usize) {
        if bit < usize::BITS as usize {
            self.0 |= 1usize << bit;
        }
    }

    #[inline]
    pub fn remove_bit(&mut self, bit: usize) {
        if bit < usize::BITS as usize {
            self.0 &= !(1usize << bit);
        }
    }

    #[inline]
    pub fn contain_bit(&self, bit: usize) -> bool {
        bit < usize::BITS as usize && (self.0 & (1usize << bit)) != 0
    }

    /// 加入一个信号，`ERR` 不会被加入
    #[inline]
    pub fn insert(&mut self, signo: SignalNo) {
        if signo.is_valid() {
            self.add_bit(signo as usize);
        }
    }

    #[inline]
    pub fn remove(&mut self, signo: SignalNo) {
        self.remove_bit(signo as usize);
    }

    #[inline]
    pub fn contains(&self, signo: SignalNo) -> bool {
        self.contain_bit(signo as usize)
    }

    #[inline]
    pub fn with(mut self, signo: SignalNo) -> Self {
        self.insert(signo);
        self
    }

    #[inline]
    pub fn union(self, rhs: SignalSet) -> SignalSet {
        SignalSet(self.0 | rhs.0)
    }

    #[inline]
    pub fn difference(self, rhs: SignalSet) -> SignalSet {
        SignalSet(self.0 & !rhs.0)
    }

    #[inline]
    pub fn intersection(self, rhs: SignalSet) -> SignalSet {
        SignalSet(self.0 & rhs.0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// 在 `mask` 之外编号最小的信号位
    #[inline]
    pub fn find_first_one(&self, mask: SignalSet) -> Option<usize> {
        let deliverable = self.difference(mask).0;
        if deliverable == 0 {
            None
        } else {
            Some(deliverable.trailing_zeros() as usize)
        }
    }

    /// 编号最小的信号
    #[inline]
    pub fn first(&self) -> Option<SignalNo> {
        self.iter().next()
    }

    /// 按编号升序遍历
    pub fn iter(&self) -> SignalSetIter {
        SignalSetIter(*self)
    }
}

/// `SignalSet` 的升序迭代器
pub struct SignalSetIter(SignalSet);

impl Iterator for SignalSetIter {
    type Item = SignalNo;

    fn next(&mut self) -> Option<SignalNo> {
        loop {
            let bit = self.0.find_first_one(SignalSet::empty())?;
            self.0.remove_bit(bit);
            if (1..=MAX_SIG).contains(&bit) {
                return Some(SignalNo::from(bit));
            }
        }
    }
}

impl IntoIterator for SignalSet {
    type Item = SignalNo;
    type IntoIter = SignalSetIter;

    fn into_iter(self) -> SignalSetIter {
        self.iter()
    }
}

impl FromIterator<SignalNo> for SignalSet {
    fn from_iter<T: IntoIterator<Item = SignalNo>>(iter: T) -> Self {
        let mut set = SignalSet::empty();
        for signo in iter {
            set.insert(signo);
        }
        set
    }
}

impl<const N: usize> From<[SignalNo; N]> for SignalSet {
    fn from(signals: [SignalNo; N]) -> Self {
        signals.into_iter().collect()
    }
}

impl From<SignalNo> for SignalSet {
    fn from(signo: SignalNo) -> Self {
        SignalSet::empty().with(signo)
    }
}

impl fmt::Debug for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        f.write_str("{")?;
        for signo in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            fmt::Display::fmt(&signo, f)?;
        }
        f.write_str("}")
    }
}
