use std::collections::BTreeMap;

use signal::ProcId;

/// Immutable role name → pid map.
///
/// Built once the process tree exists and shared with workers and handlers,
/// so a handler can address its siblings by role.
#[derive(Debug, Clone, Default)]
pub struct ProcessDirectory {
    roles: BTreeMap<String, ProcId>,
}

impl ProcessDirectory {
    #[inline]
    pub fn get(&self, role: &str) -> Option<ProcId> {
        self.roles.get(role).copied()
    }

    pub fn roles(&self) -> impl Iterator<Item = (&str, ProcId)> + '_ {
        self.roles.iter().map(|(role, &pid)| (role.as_str(), pid))
    }

    /// Reverse lookup, for log lines.
    pub fn role_of(&self, pid: ProcId) -> Option<&str> {
        self.roles
            .iter()
            .find(|(_, &p)| p == pid)
            .map(|(role, _)| role.as_str())
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ProcId)> for ProcessDirectory {
    fn from_iter<I: IntoIterator<Item = (S, ProcId)>>(iter: I) -> Self {
        Self {
            roles: iter.into_iter().map(|(role, pid)| (role.into(), pid)).collect(),
        }
    }
}
