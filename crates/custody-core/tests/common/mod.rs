//! Shared harness for the transition-protocol integration tests: an
//! in-memory world simulation implementing the `Environment` port, a
//! recording `Store`, and a two-area fixture.

// Not every test file uses every helper.
#![allow(dead_code)]

use custody_core::{
    AreaRegistry, ConfinementManager, CustodyConfig, Environment, HoldingArea, HoldingCell, Item,
    MainContext, OperatingMode, Point, Region, Store, Subject, SubjectId, WornSlot,
};
use custody_bus::InMemoryEventBus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
pub struct SimActor {
    pub present: bool,
    pub position: Point,
    pub mode: OperatingMode,
    pub carried: Vec<Item>,
    pub worn: HashMap<WornSlot, Item>,
    pub dropped: Vec<Item>,
    pub resource: i64,
    pub mounted: bool,
    pub restrained: bool,
    pub rest_suppressed: bool,
}

#[derive(Default)]
struct SimState {
    actors: HashMap<SubjectId, SimActor>,
    // Ordered log of effectful calls, one entry per call.
    effects: Vec<String>,
}

/// World simulation: enough environment behavior for the protocol to run
/// end to end, plus an ordered log of every effectful call.
#[derive(Default)]
pub struct SimEnvironment {
    state: Mutex<SimState>,
}

impl SimEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, id: SubjectId) {
        self.with(|s| {
            s.actors.insert(
                id,
                SimActor {
                    present: true,
                    resource: 15,
                    ..SimActor::default()
                },
            );
        });
    }

    pub fn spawn_absent(&self, id: SubjectId) {
        self.with(|s| {
            s.actors.insert(id, SimActor::default());
        });
    }

    pub fn set_present(&self, id: SubjectId, present: bool) {
        self.with(|s| {
            s.actors.entry(id).or_default().present = present;
        });
    }

    pub fn actor<R>(&self, id: SubjectId, f: impl FnOnce(&mut SimActor) -> R) -> R {
        self.with(|s| f(s.actors.entry(id).or_default()))
    }

    /// Every effectful call recorded so far, in order.
    pub fn effects(&self) -> Vec<String> {
        self.with(|s| s.effects.clone())
    }

    /// Effect-log entries mentioning the given subject.
    pub fn effects_for(&self, id: SubjectId) -> Vec<String> {
        let needle = id.to_string();
        self.effects()
            .into_iter()
            .filter(|e| e.contains(&needle))
            .collect()
    }

    fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn log(&self, entry: String) {
        self.with(|s| s.effects.push(entry));
    }
}

impl Environment for SimEnvironment {
    fn is_present(&self, id: SubjectId) -> bool {
        self.with(|s| s.actors.get(&id).is_some_and(|a| a.present))
    }

    fn display_name(&self, id: SubjectId) -> Option<String> {
        self.is_present(id).then(|| format!("sim-{}", &id.to_string()[..8]))
    }

    fn position(&self, id: SubjectId) -> Option<Point> {
        self.with(|s| s.actors.get(&id).filter(|a| a.present).map(|a| a.position))
    }

    fn relocate(&self, id: SubjectId, point: Point) -> bool {
        self.log(format!("relocate {} -> ({},{},{})", id, point.x, point.y, point.z));
        self.with(|s| match s.actors.get_mut(&id) {
            Some(actor) if actor.present => {
                actor.position = point;
                true
            }
            _ => false,
        })
    }

    fn operating_mode(&self, id: SubjectId) -> OperatingMode {
        self.actor(id, |a| a.mode)
    }

    fn set_operating_mode(&self, id: SubjectId, mode: OperatingMode) {
        self.log(format!("set_mode {} {}", id, mode));
        self.actor(id, |a| a.mode = mode);
    }

    fn is_mounted(&self, id: SubjectId) -> bool {
        self.actor(id, |a| a.mounted)
    }

    fn eject_from_mount(&self, id: SubjectId) {
        self.log(format!("eject {}", id));
        self.actor(id, |a| a.mounted = false);
    }

    fn has_restraints(&self, id: SubjectId) -> bool {
        self.actor(id, |a| a.restrained)
    }

    fn clear_restraints(&self, id: SubjectId) {
        self.log(format!("clear_restraints {}", id));
        self.actor(id, |a| a.restrained = false);
    }

    fn set_rest_tracking_suppressed(&self, id: SubjectId, suppressed: bool) {
        self.actor(id, |a| a.rest_suppressed = suppressed);
    }

    fn resource_level(&self, id: SubjectId) -> i64 {
        self.actor(id, |a| a.resource)
    }

    fn set_resource_level(&self, id: SubjectId, level: i64) {
        self.actor(id, |a| a.resource = level);
    }

    fn take_carried(&self, id: SubjectId) -> Vec<Item> {
        self.actor(id, |a| std::mem::take(&mut a.carried))
    }

    fn take_worn(&self, id: SubjectId) -> Vec<(WornSlot, Item)> {
        self.actor(id, |a| a.worn.drain().collect())
    }

    fn clear_possessions(&self, id: SubjectId) {
        self.actor(id, |a| {
            a.carried.clear();
            a.worn.clear();
        });
    }

    fn give_item(&self, id: SubjectId, item: Item) -> Option<Item> {
        self.actor(id, |a| {
            a.carried.push(item);
            None
        })
    }

    fn equip_if_empty(&self, id: SubjectId, slot: WornSlot, item: Item) -> Option<Item> {
        self.actor(id, |a| {
            if a.worn.contains_key(&slot) {
                Some(item)
            } else {
                a.worn.insert(slot, item);
                None
            }
        })
    }

    fn drop_item(&self, id: SubjectId, item: Item) {
        self.actor(id, |a| a.dropped.push(item));
    }

    fn send_message(&self, id: SubjectId, message: &str) {
        self.log(format!("message {} {}", id, message));
    }

    fn notify_operator(&self, operator: &str, message: &str) {
        self.log(format!("operator {} {}", operator, message));
    }

    fn broadcast(&self, message: &str) {
        self.log(format!("broadcast {}", message));
    }

    fn execute_command(&self, command: &str) {
        self.log(format!("command {}", command));
    }

    fn refresh_cell_signage(&self, area: &str, cell: &str) {
        self.log(format!("signage {} {}", area, cell));
    }
}

/// Store double recording saves and removals.
#[derive(Default)]
pub struct MemoryStore {
    saves: Mutex<Vec<String>>,
    removals: Mutex<Vec<(String, Option<String>, SubjectId)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saves(&self) -> Vec<String> {
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn removals(&self) -> Vec<(String, Option<String>, SubjectId)> {
        self.removals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Store for MemoryStore {
    fn save(&self, area: &HoldingArea) {
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(area.name().to_owned());
    }

    fn remove_subject(&self, area: &str, cell: Option<&str>, subject: &Subject) {
        self.removals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((area.to_owned(), cell.map(str::to_owned), subject.id()));
    }
}

pub struct Fixture {
    pub manager: Arc<ConfinementManager>,
    pub env: Arc<SimEnvironment>,
    pub store: Arc<MemoryStore>,
    pub bus: Arc<InMemoryEventBus>,
    pub ctx: MainContext,
}

fn area_fixture(name: &str, origin: f64) -> HoldingArea {
    let mut area = HoldingArea::new(
        name,
        Region::new(
            Point::new(origin, 0.0, 0.0),
            Point::new(origin + 50.0, 50.0, 50.0),
        ),
        Point::new(origin + 10.0, 5.0, 10.0),
        Point::new(origin + 12.0, 5.0, 10.0),
        Point::new(origin + 60.0, 5.0, 10.0),
    );
    area.add_cell(HoldingCell::new("c1", Point::new(origin + 1.0, 5.0, 1.0)).with_container(8));
    area.add_cell(HoldingCell::new("c2", Point::new(origin + 2.0, 5.0, 1.0)));
    area
}

/// A manager over two areas ("a1", "a2"), each with a containered cell
/// "c1" and a bare cell "c2".
pub fn fixture(config: CustodyConfig) -> Fixture {
    // Protocol logs show up under RUST_LOG=debug when a test fails.
    let _ = tracing_subscriber::fmt::try_init();

    let mut registry = AreaRegistry::new();
    registry.add_area(area_fixture("a1", 0.0));
    registry.add_area(area_fixture("a2", 100.0));

    let env = Arc::new(SimEnvironment::new());
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(InMemoryEventBus::new());
    let ctx = MainContext::for_testing();
    let manager = ConfinementManager::new(
        registry,
        config,
        store.clone(),
        env.clone(),
        bus.clone(),
        ctx.clone(),
    );

    Fixture {
        manager,
        env,
        store,
        bus,
        ctx,
    }
}
