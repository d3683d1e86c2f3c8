use vendstock_core::MachineId;

use crate::record::{AuditAction, AuditRecord};

/// Filter over the audit log. Empty filters match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditQuery {
    pub machine_id: Option<MachineId>,
    pub action: Option<AuditAction>,
}

impl AuditQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_machine(machine_id: MachineId) -> Self {
        Self {
            machine_id: Some(machine_id),
            action: None,
        }
    }

    pub fn for_action(action: AuditAction) -> Self {
        Self {
            machine_id: None,
            action: Some(action),
        }
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        if self.machine_id.is_some_and(|id| record.machine_id() != id) {
            return false;
        }
        if self.action.is_some_and(|action| record.action() != action) {
            return false;
        }
        true
    }
}
