use serde::{Deserialize, Serialize};

use vendstock_core::{CanisterId, MachineId, SlotId, StockError, StockResult, TrayId};

/// Physical machine kind, deciding which stock it may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Slot,
    Coffee,
    Combo,
}

/// Operational status of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Active,
    Maintenance,
    OutOfService,
}

/// A vending machine and the trays/canisters it owns.
///
/// Structural invariant: slot machines own no canisters, coffee machines
/// own no trays. Combo machines may own both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendingMachine {
    id: MachineId,
    name: String,
    kind: MachineKind,
    status: MachineStatus,
    location: String,
    trays: Vec<TrayId>,
    canisters: Vec<CanisterId>,
}

impl VendingMachine {
    pub fn new(
        id: MachineId,
        name: impl Into<String>,
        kind: MachineKind,
        location: impl Into<String>,
    ) -> StockResult<Self> {
        let name = name.into();
        let location = location.into();
        if name.trim().is_empty() {
            return Err(StockError::invalid_input("machine name cannot be empty"));
        }
        if location.trim().is_empty() {
            return Err(StockError::invalid_input("machine location cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            kind,
            status: MachineStatus::Active,
            location,
            trays: Vec::new(),
            canisters: Vec::new(),
        })
    }

    pub fn id(&self) -> MachineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MachineKind {
        self.kind
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn trays(&self) -> &[TrayId] {
        &self.trays
    }

    pub fn canisters(&self) -> &[CanisterId] {
        &self.canisters
    }

    pub fn set_status(&mut self, status: MachineStatus) {
        self.status = status;
    }

    /// Machines that can brew recipes: coffee and combo kinds.
    pub fn is_coffee_capable(&self) -> bool {
        matches!(self.kind, MachineKind::Coffee | MachineKind::Combo)
    }

    pub fn attach_tray(&mut self, tray_id: TrayId) -> StockResult<()> {
        if self.kind == MachineKind::Coffee {
            return Err(StockError::invariant(
                "coffee machines cannot hold trays",
            ));
        }
        if !self.trays.contains(&tray_id) {
            self.trays.push(tray_id);
        }
        Ok(())
    }

    pub fn attach_canister(&mut self, canister_id: CanisterId) -> StockResult<()> {
        if self.kind == MachineKind::Slot {
            return Err(StockError::invariant(
                "slot machines cannot hold canisters",
            ));
        }
        if !self.canisters.contains(&canister_id) {
            self.canisters.push(canister_id);
        }
        Ok(())
    }
}

/// A tray mounted in a machine, holding an ordered run of slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tray {
    id: TrayId,
    name: String,
    machine_id: MachineId,
    slots: Vec<SlotId>,
}

impl Tray {
    pub fn new(id: TrayId, name: impl Into<String>, machine_id: MachineId) -> StockResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StockError::invalid_input("tray name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            machine_id,
            slots: Vec::new(),
        })
    }

    pub fn id(&self) -> TrayId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn machine_id(&self) -> MachineId {
        self.machine_id
    }

    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    pub fn attach_slot(&mut self, slot_id: SlotId) {
        if !self.slots.contains(&slot_id) {
            self.slots.push(slot_id);
        }
    }
}

/// A physical dispensing position within a tray.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    id: SlotId,
    slot_number: String,
    tray_id: TrayId,
}

impl Slot {
    pub fn new(id: SlotId, slot_number: impl Into<String>, tray_id: TrayId) -> StockResult<Self> {
        let slot_number = slot_number.into();
        if slot_number.trim().is_empty() {
            return Err(StockError::invalid_input("slot number cannot be empty"));
        }
        Ok(Self {
            id,
            slot_number,
            tray_id,
        })
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn slot_number(&self) -> &str {
        &self.slot_number
    }

    pub fn tray_id(&self) -> TrayId {
        self.tray_id
    }
}
