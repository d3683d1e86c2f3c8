//! In-memory stock store with optimistic transactions.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use vendstock_audit::{AuditQuery, AuditRecord};
use vendstock_core::{
    Actor, CanisterId, IngredientId, MachineId, RecipeId, SkuId, SlotId, StockError, StockResult,
    TrayId,
};
use vendstock_model::{
    Canister, Ingredient, Recipe, SaleRecord, SkuProduct, Slot, SlotInventory, SlotKey, Tray,
    TransactionId, VendingMachine,
};

use crate::version::{ExpectedVersion, Versioned};

#[derive(Debug, Default)]
struct StoreInner {
    machines: HashMap<MachineId, Versioned<VendingMachine>>,
    trays: HashMap<TrayId, Versioned<Tray>>,
    slots: HashMap<SlotId, Versioned<Slot>>,
    ingredients: HashMap<IngredientId, Versioned<Ingredient>>,
    skus: HashMap<SkuId, Versioned<SkuProduct>>,
    recipes: HashMap<RecipeId, Versioned<Recipe>>,
    canisters: HashMap<CanisterId, Versioned<Canister>>,
    slot_inventory: HashMap<SlotKey, Versioned<SlotInventory>>,
    sales: HashMap<TransactionId, Versioned<SaleRecord>>,
    audit: Vec<AuditRecord>,
}

fn apply_staged<K, V>(map: &mut HashMap<K, Versioned<V>>, key: K, record: V)
where
    K: Eq + std::hash::Hash,
{
    match map.entry(key) {
        Entry::Occupied(mut occupied) => {
            let stored = occupied.get_mut();
            stored.version += 1;
            stored.record = record;
        }
        Entry::Vacant(vacant) => {
            vacant.insert(Versioned::initial(record));
        }
    }
}

fn sort_newest_first(sales: &mut [SaleRecord]) {
    sales.sort_by(|a, b| {
        b.timestamp()
            .cmp(&a.timestamp())
            .then_with(|| a.transaction_id().as_str().cmp(b.transaction_id().as_str()))
    });
}

fn guard_conflict(what: String) -> StockError {
    tracing::warn!("commit conflict: {}", what);
    StockError::conflict(what)
}

/// In-memory stock store.
///
/// Reference semantics for a real backing store; intended for tests/dev.
/// Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_inner(&self) -> StockResult<RwLockReadGuard<'_, StoreInner>> {
        self.inner
            .read()
            .map_err(|_| StockError::storage("lock poisoned"))
    }

    fn write_inner(&self) -> StockResult<RwLockWriteGuard<'_, StoreInner>> {
        self.inner
            .write()
            .map_err(|_| StockError::storage("lock poisoned"))
    }

    /// Start an optimistic unit of work.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction {
            store: self,
            pinned_canisters: HashMap::new(),
            pinned_inventory: HashMap::new(),
            pinned_sales: HashMap::new(),
            staged_canisters: HashMap::new(),
            staged_inventory: HashMap::new(),
            staged_sales: HashMap::new(),
            audit: Vec::new(),
        }
    }
}

/// Reference-data registration. Each insert validates referential integrity
/// before touching anything, so a failed insert leaves the store unchanged.
impl InMemoryStockStore {
    /// Register a machine, auditing the creation in the same critical section.
    pub fn insert_machine(&self, machine: VendingMachine, actor: &Actor) -> StockResult<()> {
        let record =
            AuditRecord::machine_created(machine.id(), actor.clone(), chrono::Utc::now())?;
        let mut inner = self.write_inner()?;
        if inner.machines.contains_key(&machine.id()) {
            return Err(StockError::invalid_input("machine is already registered"));
        }
        inner
            .machines
            .insert(machine.id(), Versioned::initial(machine));
        inner.audit.push(record);
        Ok(())
    }

    /// Register a tray and attach it to its owning machine.
    pub fn insert_tray(&self, tray: Tray) -> StockResult<()> {
        let mut inner = self.write_inner()?;
        if inner.trays.contains_key(&tray.id()) {
            return Err(StockError::invalid_input("tray is already registered"));
        }
        let mut machine = match inner.machines.get(&tray.machine_id()) {
            Some(stored) => stored.record.clone(),
            None => {
                return Err(StockError::not_found(format!(
                    "machine {}",
                    tray.machine_id()
                )));
            }
        };
        machine.attach_tray(tray.id())?;
        apply_staged(&mut inner.machines, tray.machine_id(), machine);
        inner.trays.insert(tray.id(), Versioned::initial(tray));
        Ok(())
    }

    /// Register a slot and attach it to its owning tray.
    pub fn insert_slot(&self, slot: Slot) -> StockResult<()> {
        let mut inner = self.write_inner()?;
        if inner.slots.contains_key(&slot.id()) {
            return Err(StockError::invalid_input("slot is already registered"));
        }
        let mut tray = match inner.trays.get(&slot.tray_id()) {
            Some(stored) => stored.record.clone(),
            None => return Err(StockError::not_found(format!("tray {}", slot.tray_id()))),
        };
        tray.attach_slot(slot.id());
        apply_staged(&mut inner.trays, slot.tray_id(), tray);
        inner.slots.insert(slot.id(), Versioned::initial(slot));
        Ok(())
    }

    /// Register an ingredient. Names are unique across the store.
    pub fn insert_ingredient(&self, ingredient: Ingredient) -> StockResult<()> {
        let mut inner = self.write_inner()?;
        if inner.ingredients.contains_key(&ingredient.id()) {
            return Err(StockError::invalid_input(
                "ingredient is already registered",
            ));
        }
        if inner
            .ingredients
            .values()
            .any(|stored| stored.record.name() == ingredient.name())
        {
            return Err(StockError::invalid_input(format!(
                "ingredient name '{}' is already taken",
                ingredient.name()
            )));
        }
        inner
            .ingredients
            .insert(ingredient.id(), Versioned::initial(ingredient));
        Ok(())
    }

    /// Register a SKU product. Product ids are unique across the store.
    pub fn insert_sku(&self, sku: SkuProduct) -> StockResult<()> {
        let mut inner = self.write_inner()?;
        if inner.skus.contains_key(&sku.id()) {
            return Err(StockError::invalid_input("sku is already registered"));
        }
        if inner
            .skus
            .values()
            .any(|stored| stored.record.product_id() == sku.product_id())
        {
            return Err(StockError::invalid_input(format!(
                "product id '{}' is already taken",
                sku.product_id()
            )));
        }
        inner.skus.insert(sku.id(), Versioned::initial(sku));
        Ok(())
    }

    /// Register a canister and attach it to its owning machine.
    ///
    /// Every assigned ingredient must already exist.
    pub fn insert_canister(&self, canister: Canister) -> StockResult<()> {
        let mut inner = self.write_inner()?;
        if inner.canisters.contains_key(&canister.id()) {
            return Err(StockError::invalid_input("canister is already registered"));
        }
        for ingredient_id in canister.ingredient_ids() {
            if !inner.ingredients.contains_key(ingredient_id) {
                return Err(StockError::not_found(format!(
                    "ingredient {ingredient_id}"
                )));
            }
        }
        let mut machine = match inner.machines.get(&canister.machine_id()) {
            Some(stored) => stored.record.clone(),
            None => {
                return Err(StockError::not_found(format!(
                    "machine {}",
                    canister.machine_id()
                )));
            }
        };
        machine.attach_canister(canister.id())?;
        apply_staged(&mut inner.machines, canister.machine_id(), machine);
        inner
            .canisters
            .insert(canister.id(), Versioned::initial(canister));
        Ok(())
    }

    /// Register a recipe. Its machine and every line ingredient must exist.
    pub fn insert_recipe(&self, recipe: Recipe) -> StockResult<()> {
        let mut inner = self.write_inner()?;
        if inner.recipes.contains_key(&recipe.id()) {
            return Err(StockError::invalid_input("recipe is already registered"));
        }
        if !inner.machines.contains_key(&recipe.machine_id()) {
            return Err(StockError::not_found(format!(
                "machine {}",
                recipe.machine_id()
            )));
        }
        for line in recipe.lines() {
            if !inner.ingredients.contains_key(&line.ingredient_id) {
                return Err(StockError::not_found(format!(
                    "ingredient {}",
                    line.ingredient_id
                )));
            }
        }
        inner.recipes.insert(recipe.id(), Versioned::initial(recipe));
        Ok(())
    }
}

/// Read API. Every method returns a clone of the current committed state.
impl InMemoryStockStore {
    pub fn machine(&self, id: MachineId) -> StockResult<VendingMachine> {
        let inner = self.read_inner()?;
        inner
            .machines
            .get(&id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StockError::not_found(format!("machine {id}")))
    }

    /// All registered machines, in registration order (ids are time-ordered).
    pub fn machines(&self) -> StockResult<Vec<VendingMachine>> {
        let inner = self.read_inner()?;
        let mut out: Vec<VendingMachine> = inner
            .machines
            .values()
            .map(|stored| stored.record.clone())
            .collect();
        out.sort_by_key(VendingMachine::id);
        Ok(out)
    }

    pub fn tray(&self, id: TrayId) -> StockResult<Tray> {
        let inner = self.read_inner()?;
        inner
            .trays
            .get(&id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StockError::not_found(format!("tray {id}")))
    }

    pub fn slot(&self, id: SlotId) -> StockResult<Slot> {
        let inner = self.read_inner()?;
        inner
            .slots
            .get(&id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StockError::not_found(format!("slot {id}")))
    }

    pub fn ingredient(&self, id: IngredientId) -> StockResult<Ingredient> {
        let inner = self.read_inner()?;
        inner
            .ingredients
            .get(&id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StockError::not_found(format!("ingredient {id}")))
    }

    pub fn sku(&self, id: SkuId) -> StockResult<SkuProduct> {
        let inner = self.read_inner()?;
        inner
            .skus
            .get(&id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StockError::not_found(format!("sku {id}")))
    }

    pub fn recipe(&self, id: RecipeId) -> StockResult<Recipe> {
        let inner = self.read_inner()?;
        inner
            .recipes
            .get(&id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StockError::not_found(format!("recipe {id}")))
    }

    /// All recipes owned by a machine, sorted by id.
    pub fn recipes_for_machine(&self, machine_id: MachineId) -> StockResult<Vec<Recipe>> {
        let inner = self.read_inner()?;
        let mut out: Vec<Recipe> = inner
            .recipes
            .values()
            .filter(|stored| stored.record.machine_id() == machine_id)
            .map(|stored| stored.record.clone())
            .collect();
        out.sort_by_key(Recipe::id);
        Ok(out)
    }

    pub fn canister(&self, id: CanisterId) -> StockResult<Canister> {
        let inner = self.read_inner()?;
        inner
            .canisters
            .get(&id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StockError::not_found(format!("canister {id}")))
    }

    /// All canisters owned by a machine, sorted by id.
    ///
    /// The order is what makes ingredient-to-canister lookups deterministic:
    /// when several canisters hold the same ingredient, the first in this
    /// order wins.
    pub fn canisters_for_machine(&self, machine_id: MachineId) -> StockResult<Vec<Canister>> {
        let inner = self.read_inner()?;
        let mut out: Vec<Canister> = inner
            .canisters
            .values()
            .filter(|stored| stored.record.machine_id() == machine_id)
            .map(|stored| stored.record.clone())
            .collect();
        out.sort_by_key(Canister::id);
        Ok(out)
    }

    pub fn slot_inventory_row(&self, key: &SlotKey) -> StockResult<Option<SlotInventory>> {
        let inner = self.read_inner()?;
        Ok(inner
            .slot_inventory
            .get(key)
            .map(|stored| stored.record.clone()))
    }

    /// All slot inventory rows across machines, sorted by key.
    pub fn slot_inventory(&self) -> StockResult<Vec<SlotInventory>> {
        let inner = self.read_inner()?;
        let mut out: Vec<SlotInventory> = inner
            .slot_inventory
            .values()
            .map(|stored| stored.record.clone())
            .collect();
        out.sort_by_key(SlotInventory::key);
        Ok(out)
    }

    /// All slot inventory rows of a machine, sorted by key.
    pub fn slot_inventory_for_machine(
        &self,
        machine_id: MachineId,
    ) -> StockResult<Vec<SlotInventory>> {
        let inner = self.read_inner()?;
        let mut out: Vec<SlotInventory> = inner
            .slot_inventory
            .values()
            .filter(|stored| stored.record.key().machine_id == machine_id)
            .map(|stored| stored.record.clone())
            .collect();
        out.sort_by_key(SlotInventory::key);
        Ok(out)
    }

    pub fn sale(&self, transaction_id: &TransactionId) -> StockResult<SaleRecord> {
        let inner = self.read_inner()?;
        inner
            .sales
            .get(transaction_id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StockError::not_found(format!("sale {transaction_id}")))
    }

    /// All sales, newest first.
    pub fn sales(&self) -> StockResult<Vec<SaleRecord>> {
        let inner = self.read_inner()?;
        let mut out: Vec<SaleRecord> = inner
            .sales
            .values()
            .map(|stored| stored.record.clone())
            .collect();
        sort_newest_first(&mut out);
        Ok(out)
    }

    /// Sales of a machine, newest first.
    pub fn sales_for_machine(&self, machine_id: MachineId) -> StockResult<Vec<SaleRecord>> {
        let inner = self.read_inner()?;
        let mut out: Vec<SaleRecord> = inner
            .sales
            .values()
            .filter(|stored| stored.record.machine_id() == machine_id)
            .map(|stored| stored.record.clone())
            .collect();
        sort_newest_first(&mut out);
        Ok(out)
    }

    /// Audit records matching the query, newest first.
    pub fn audit_log(&self, query: &AuditQuery) -> StockResult<Vec<AuditRecord>> {
        let inner = self.read_inner()?;
        Ok(inner
            .audit
            .iter()
            .rev()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }
}

/// Optimistic unit of work over the store.
///
/// Loading a canister, slot inventory row or sale pins the version observed;
/// staging a write guards it on that pin (or on absence when nothing was
/// read). `commit` validates every guard under the write lock, then applies
/// writes and queued audit records together. A failed guard applies nothing
/// and surfaces as `ConcurrentModification`.
///
/// Reads see this transaction's own staged writes first, so consuming twice
/// from the same canister within one sale observes the intermediate level.
#[derive(Debug)]
pub struct Transaction<'a> {
    store: &'a InMemoryStockStore,
    pinned_canisters: HashMap<CanisterId, u64>,
    pinned_inventory: HashMap<SlotKey, u64>,
    pinned_sales: HashMap<TransactionId, u64>,
    staged_canisters: HashMap<CanisterId, (Canister, ExpectedVersion)>,
    staged_inventory: HashMap<SlotKey, (SlotInventory, ExpectedVersion)>,
    staged_sales: HashMap<TransactionId, (SaleRecord, ExpectedVersion)>,
    audit: Vec<AuditRecord>,
}

impl Transaction<'_> {
    pub fn canister(&mut self, id: CanisterId) -> StockResult<Canister> {
        if let Some((record, _)) = self.staged_canisters.get(&id) {
            return Ok(record.clone());
        }
        let inner = self.store.read_inner()?;
        let stored = inner
            .canisters
            .get(&id)
            .ok_or_else(|| StockError::not_found(format!("canister {id}")))?;
        self.pinned_canisters.entry(id).or_insert(stored.version);
        Ok(stored.record.clone())
    }

    /// All canisters owned by a machine, sorted by id, each pinned.
    pub fn canisters_for_machine(&mut self, machine_id: MachineId) -> StockResult<Vec<Canister>> {
        let mut rows: Vec<Canister> = {
            let inner = self.store.read_inner()?;
            let mut stored: Vec<&Versioned<Canister>> = inner
                .canisters
                .values()
                .filter(|stored| stored.record.machine_id() == machine_id)
                .collect();
            stored.sort_by_key(|stored| stored.record.id());
            for entry in &stored {
                self.pinned_canisters
                    .entry(entry.record.id())
                    .or_insert(entry.version);
            }
            stored.into_iter().map(|entry| entry.record.clone()).collect()
        };
        for row in &mut rows {
            if let Some((staged, _)) = self.staged_canisters.get(&row.id()) {
                *row = staged.clone();
            }
        }
        Ok(rows)
    }

    pub fn slot_inventory(&mut self, key: &SlotKey) -> StockResult<Option<SlotInventory>> {
        if let Some((record, _)) = self.staged_inventory.get(key) {
            return Ok(Some(record.clone()));
        }
        let inner = self.store.read_inner()?;
        match inner.slot_inventory.get(key) {
            Some(stored) => {
                self.pinned_inventory.entry(*key).or_insert(stored.version);
                Ok(Some(stored.record.clone()))
            }
            None => Ok(None),
        }
    }

    pub fn sale(&mut self, transaction_id: &TransactionId) -> StockResult<SaleRecord> {
        if let Some((record, _)) = self.staged_sales.get(transaction_id) {
            return Ok(record.clone());
        }
        let inner = self.store.read_inner()?;
        let stored = inner
            .sales
            .get(transaction_id)
            .ok_or_else(|| StockError::not_found(format!("sale {transaction_id}")))?;
        self.pinned_sales
            .entry(transaction_id.clone())
            .or_insert(stored.version);
        Ok(stored.record.clone())
    }

    pub fn machine(&self, id: MachineId) -> StockResult<VendingMachine> {
        self.store.machine(id)
    }

    pub fn tray(&self, id: TrayId) -> StockResult<Tray> {
        self.store.tray(id)
    }

    pub fn slot(&self, id: SlotId) -> StockResult<Slot> {
        self.store.slot(id)
    }

    pub fn ingredient(&self, id: IngredientId) -> StockResult<Ingredient> {
        self.store.ingredient(id)
    }

    pub fn sku(&self, id: SkuId) -> StockResult<SkuProduct> {
        self.store.sku(id)
    }

    pub fn recipe(&self, id: RecipeId) -> StockResult<Recipe> {
        self.store.recipe(id)
    }

    /// Stage a canister write guarded on the pinned version.
    pub fn stage_canister(&mut self, canister: Canister) {
        let guard = match self.pinned_canisters.get(&canister.id()) {
            Some(version) => ExpectedVersion::Exact(*version),
            None => ExpectedVersion::Absent,
        };
        self.staged_canisters.insert(canister.id(), (canister, guard));
    }

    /// Stage a slot inventory write guarded on the pinned version, or on
    /// absence when the row was never read (or did not exist).
    pub fn stage_slot_inventory(&mut self, row: SlotInventory) {
        let guard = match self.pinned_inventory.get(&row.key()) {
            Some(version) => ExpectedVersion::Exact(*version),
            None => ExpectedVersion::Absent,
        };
        self.staged_inventory.insert(row.key(), (row, guard));
    }

    /// Stage a slot inventory write with an explicit guard.
    ///
    /// `ExpectedVersion::Any` makes the write a last-write-wins override,
    /// for administrative set operations that are not CAS-disciplined.
    pub fn stage_slot_inventory_with(&mut self, row: SlotInventory, guard: ExpectedVersion) {
        self.staged_inventory.insert(row.key(), (row, guard));
    }

    /// Stage a sale write. New sales are guarded on absence of the
    /// transaction id; updates on the pinned version.
    pub fn stage_sale(&mut self, sale: SaleRecord) {
        let guard = match self.pinned_sales.get(sale.transaction_id()) {
            Some(version) => ExpectedVersion::Exact(*version),
            None => ExpectedVersion::Absent,
        };
        self.staged_sales
            .insert(sale.transaction_id().clone(), (sale, guard));
    }

    /// Queue an audit record for the commit.
    pub fn record(&mut self, record: AuditRecord) {
        self.audit.push(record);
    }

    /// Validate every guard and apply staged writes plus audit records.
    pub fn commit(self) -> StockResult<()> {
        if self.staged_canisters.is_empty()
            && self.staged_inventory.is_empty()
            && self.staged_sales.is_empty()
            && self.audit.is_empty()
        {
            return Ok(());
        }

        let mut inner = self.store.write_inner()?;

        for (id, (_, guard)) in &self.staged_canisters {
            let actual = inner.canisters.get(id).map(|stored| stored.version);
            if !guard.matches(actual) {
                return Err(guard_conflict(format!(
                    "canister {id}: expected {guard:?}, found {actual:?}"
                )));
            }
        }
        for (key, (_, guard)) in &self.staged_inventory {
            let actual = inner.slot_inventory.get(key).map(|stored| stored.version);
            if !guard.matches(actual) {
                return Err(guard_conflict(format!(
                    "slot inventory {}/{}: expected {guard:?}, found {actual:?}",
                    key.slot_id, key.sku_id
                )));
            }
        }
        for (id, (_, guard)) in &self.staged_sales {
            let actual = inner.sales.get(id).map(|stored| stored.version);
            if !guard.matches(actual) {
                return Err(guard_conflict(format!(
                    "sale {id}: expected {guard:?}, found {actual:?}"
                )));
            }
        }

        for (id, (record, _)) in self.staged_canisters {
            apply_staged(&mut inner.canisters, id, record);
        }
        for (key, (record, _)) in self.staged_inventory {
            apply_staged(&mut inner.slot_inventory, key, record);
        }
        for (id, (record, _)) in self.staged_sales {
            apply_staged(&mut inner.sales, id, record);
        }
        inner.audit.extend(self.audit);

        Ok(())
    }
}
