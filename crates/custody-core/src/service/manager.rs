//! The confinement manager: the transition protocol driving entry, exit,
//! forced exit, and transfer.
//!
//! State machine per subject:
//!
//! ```text
//! FREE ──entry──→ {PENDING_OFFLINE | CONFINED} ──exit──→ RELEASED(→FREE)
//!                        │        ▲      │
//!                        └presence┘      └──transfer──→ CONFINED
//! ```
//!
//! All state mutation and every environment-affecting effect runs on the
//! main context; deferred effects are scheduled continuations on that
//! context, never blocking waits. `apply_confinement` and
//! `release_confined` assert the context and fail with
//! `WrongExecutionContext` when invoked elsewhere.

use crate::config::{ConfigKey, CustodyConfig};
use crate::domain::errors::CustodyError;
use crate::domain::mode::OperatingMode;
use crate::domain::selector::CellSelector;
use crate::domain::subject::{Subject, SubjectId};
use crate::exec::{MainContext, RELEASE_RELOCATE_DELAY_TICKS, STORE_DELAY_TICKS};
use crate::ports::{Environment, Store};
use crate::registry::AreaRegistry;
use crate::service::containment;
use crate::service::sweeper::{self, ReleaseQueue};
use custody_bus::{
    ActorRef, CancelFlag, CustodyEvent, EventPublisher, InMemoryEventBus, SubjectSnapshot,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

const MSG_CONFINED: &str = "You have been confined.";
const MSG_RELEASED: &str = "You have been released.";

fn snapshot_of(subject: &Subject) -> SubjectSnapshot {
    SubjectSnapshot {
        id: subject.id(),
        name: subject.name().to_owned(),
        confined_by: subject.confiner().to_owned(),
        reason: subject.reason().to_owned(),
        remaining_ms: subject.remaining_ms(),
    }
}

fn substitute_placeholders(command: &str, subject: &SubjectSnapshot) -> String {
    command
        .replace("%name%", &subject.name)
        .replace("%id%", &subject.id.to_string())
        .replace("%reason%", &subject.reason)
}

enum PendingAction {
    Transfer(String, Option<String>),
    LazyRelease(String),
    Apply(String, Option<String>),
}

/// Drives the confinement state machine over the injected registry,
/// collaborating with the store, the environment, and the event bus.
pub struct ConfinementManager {
    registry: Mutex<AreaRegistry>,
    config: CustodyConfig,
    store: Arc<dyn Store>,
    env: Arc<dyn Environment>,
    bus: Arc<InMemoryEventBus>,
    ctx: MainContext,
    releases: ReleaseQueue,
    weak_self: Weak<ConfinementManager>,
}

impl ConfinementManager {
    /// Build the manager and install its repeating sweeper tasks on the
    /// main context.
    pub fn new(
        registry: AreaRegistry,
        config: CustodyConfig,
        store: Arc<dyn Store>,
        env: Arc<dyn Environment>,
        bus: Arc<InMemoryEventBus>,
        ctx: MainContext,
    ) -> Arc<Self> {
        let manager = Arc::new_cyclic(|weak| Self {
            registry: Mutex::new(registry),
            config,
            store,
            env,
            bus,
            ctx,
            releases: ReleaseQueue::new(),
            weak_self: weak.clone(),
        });
        sweeper::install(&manager);
        manager
    }

    /// The main context this manager schedules on.
    pub fn context(&self) -> &MainContext {
        &self.ctx
    }

    /// Number of subjects currently queued for deferred release.
    #[must_use]
    pub fn pending_releases(&self) -> usize {
        self.releases.len()
    }

    /// Read access to the registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&AreaRegistry) -> R) -> R {
        f(&self.registry())
    }

    /// Mutable access to the registry, for area/cell setup flows. All other
    /// mutation goes through the protocol operations.
    pub fn with_registry_mut<R>(&self, f: impl FnOnce(&mut AreaRegistry) -> R) -> R {
        f(&mut self.registry())
    }

    fn registry(&self) -> MutexGuard<'_, AreaRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn actor_ref(&self, id: SubjectId, fallback: &str) -> ActorRef {
        ActorRef {
            id,
            name: self
                .env
                .display_name(id)
                .unwrap_or_else(|| fallback.to_owned()),
        }
    }

    /// Record a confinement and stage its environmental effects.
    ///
    /// Resolves the cell selector once into a concrete optional cell,
    /// attaches the subject to that cell or to the area's general
    /// population, and saves the area. A present actor has the effects
    /// scheduled on the main context; an absent one gets a
    /// `ConfinedWhileAbsent` notification and the effects are deferred
    /// until presence is detected. Exactly one broadcast-or-log summary is
    /// produced.
    ///
    /// # Errors
    ///
    /// - `AreaRequired` when the area is unknown
    /// - `AlreadyConfined` when the identity is tracked by any area
    /// - `CellUnavailable` when a named cell is missing or occupied
    pub fn prepare_confinement(
        &self,
        area_name: &str,
        selector: CellSelector,
        actor: Option<ActorRef>,
        mut subject: Subject,
    ) -> Result<(), CustodyError> {
        let mut registry = self.registry();

        let area_display = registry
            .area(area_name)
            .ok_or(CustodyError::AreaRequired {
                action: "confining a subject",
            })?
            .name()
            .to_owned();

        if registry.is_confined(subject.id()) {
            return Err(CustodyError::AlreadyConfined {
                name: subject.name().to_owned(),
                id: subject.id(),
            });
        }

        if self.config.bool(ConfigKey::AutoMute, false) {
            subject.set_muted(true);
        }
        subject.set_offline_pending(actor.is_none());

        let id = subject.id();
        let remaining_ms = subject.remaining_ms();
        let offline = subject.is_offline_pending();
        let snapshot = snapshot_of(&subject);

        let area = registry
            .area_mut(area_name)
            .ok_or(CustodyError::AreaRequired {
                action: "confining a subject",
            })?;

        let resolved_cell = match selector {
            CellSelector::None => {
                area.add_to_population(subject);
                None
            }
            CellSelector::Any => match area.first_empty_cell_mut() {
                Some(cell) => {
                    let name = cell.name().to_owned();
                    cell.set_occupant(subject);
                    Some(name)
                }
                None => {
                    area.add_to_population(subject);
                    None
                }
            },
            CellSelector::Named(name) => {
                let cell =
                    area.cell_mut(&name)
                        .ok_or_else(|| CustodyError::CellUnavailable {
                            area: area_display.clone(),
                            cell: name.clone(),
                        })?;
                if cell.has_occupant() {
                    return Err(CustodyError::CellUnavailable {
                        area: area_display.clone(),
                        cell: name,
                    });
                }
                let resolved = cell.name().to_owned();
                cell.set_occupant(subject);
                Some(resolved)
            }
        };

        if let Some(area) = registry.area(area_name) {
            self.store.save(area);
        }
        drop(registry);

        if offline {
            self.bus.publish(CustodyEvent::ConfinedWhileAbsent {
                area: area_display.clone(),
                cell: resolved_cell.clone(),
                subject: snapshot.clone(),
            });
        } else {
            let weak = self.weak_self.clone();
            let apply_area = area_display.clone();
            let apply_cell = resolved_cell.clone();
            self.ctx.submit(move || {
                if let Some(manager) = weak.upgrade() {
                    if let Err(error) =
                        manager.apply_confinement(&apply_area, apply_cell.as_deref(), id)
                    {
                        warn!(%error, subject = %id, "Failed to apply confinement");
                    }
                }
            });
        }

        let location = match &resolved_cell {
            Some(cell) => format!("{} cell {}", area_display, cell),
            None => area_display.clone(),
        };
        let message = if remaining_ms < 0 {
            format!(
                "{} was confined indefinitely in {} by {}: {}",
                snapshot.name, location, snapshot.confined_by, snapshot.reason
            )
        } else {
            format!(
                "{} was confined in {} for {} minute(s) by {}: {}",
                snapshot.name,
                location,
                remaining_ms / 60_000,
                snapshot.confined_by,
                snapshot.reason
            )
        };

        if self.config.bool(ConfigKey::BroadcastEntry, false) {
            self.env.broadcast(&message);
        } else if self.config.bool(ConfigKey::LogEntry, true) {
            info!("{}", message);
        }

        Ok(())
    }

    /// Apply the environmental effects of a recorded confinement. Runs only
    /// on the main context and only for a present actor.
    ///
    /// # Errors
    ///
    /// - `WrongExecutionContext` off the main context
    /// - `AreaRequired` / `SubjectRequired` when the record is gone
    pub fn apply_confinement(
        &self,
        area_name: &str,
        cell_name: Option<&str>,
        id: SubjectId,
    ) -> Result<(), CustodyError> {
        self.ctx.ensure_main("applying confinement")?;

        let mut registry = self.registry();
        let area = registry
            .area_mut(area_name)
            .ok_or(CustodyError::AreaRequired {
                action: "applying confinement",
            })?;
        let area_display = area.name().to_owned();
        let entry_point = match cell_name.and_then(|name| area.cell(name)) {
            Some(cell) => cell.entry_point(),
            None => area.entry_point(),
        };
        let subject = area
            .subject_mut(id)
            .ok_or(CustodyError::SubjectRequired {
                action: "applying confinement",
            })?;

        // Unrelated restraint logic must not fight this relocation.
        if self.env.has_restraints(id) {
            self.env.clear_restraints(id);
        }

        subject.set_offline_pending(false);
        subject.set_relocating(true);

        if subject.reason().is_empty() {
            self.env.send_message(id, MSG_CONFINED);
        } else {
            self.env
                .send_message(id, &format!("You have been confined for: {}", subject.reason()));
        }

        if self.config.bool(ConfigKey::ReleaseToPreviousPosition, false) {
            subject.set_previous_position(self.env.position(id));
        }
        if self.config.bool(ConfigKey::RestorePreviousMode, false) {
            subject.set_previous_mode(self.env.operating_mode(id));
        }

        let configured = self.config.string(ConfigKey::EntryMode, "restricted");
        let mode = configured.parse::<OperatingMode>().unwrap_or_else(|()| {
            warn!(
                configured = %configured,
                valid = %OperatingMode::valid_values(),
                "Configured confinement operating mode is invalid; falling back to restricted"
            );
            OperatingMode::Restricted
        });
        self.env.set_operating_mode(id, mode);

        if self.env.is_mounted(id) {
            self.env.eject_from_mount(id);
        }

        if self.config.bool(ConfigKey::SuppressRestState, true) {
            self.env.set_rest_tracking_suppressed(id, true);
        }

        let min = self.config.int(ConfigKey::ResourceClampMin, 10);
        let max = self.config.int(ConfigKey::ResourceClampMax, 20);
        let level = self.env.resource_level(id);
        if level < min {
            self.env.set_resource_level(id, min);
        } else if level > max {
            self.env.set_resource_level(id, max);
        }

        debug!(subject = %id, area = %area_display, cell = ?cell_name, "Relocating actor into confinement");
        self.env.relocate(id, entry_point);

        // Possession storage settles after the relocation does.
        if self.config.bool(ConfigKey::StorePossessions, true) {
            let weak = self.weak_self.clone();
            let store_area = area_display.clone();
            let store_cell = cell_name.map(str::to_owned);
            self.ctx.submit_after(STORE_DELAY_TICKS, move || {
                if let Some(manager) = weak.upgrade() {
                    manager.run_deferred_store(&store_area, store_cell.as_deref(), id);
                }
            });
        }

        subject.set_relocating(false);

        let snapshot = snapshot_of(subject);

        for command in self.config.list(ConfigKey::EntryCommands) {
            self.env
                .execute_command(&substitute_placeholders(&command, &snapshot));
        }

        if let Some(area) = registry.area(area_name) {
            self.store.save(area);
        }

        let actor = self.actor_ref(id, &snapshot.name);
        drop(registry);

        self.bus.publish(CustodyEvent::Confined {
            area: area_display,
            cell: cell_name.map(str::to_owned),
            subject: snapshot,
            actor,
        });

        Ok(())
    }

    /// The deferred possession-store continuation scheduled by
    /// [`ConfinementManager::apply_confinement`].
    pub(crate) fn run_deferred_store(&self, area_name: &str, cell_name: Option<&str>, id: SubjectId) {
        let deny_list = self.config.list(ConfigKey::PossessionDenyList);
        let mut registry = self.registry();
        let Some(area) = registry.area_mut(area_name) else {
            return;
        };

        match cell_name {
            Some(cell_name) => {
                let Some(cell) = area.cell_mut(cell_name) else {
                    return;
                };
                let (container, occupant) = cell.container_and_occupant_mut();
                match occupant {
                    Some(subject) if subject.id() == id => {
                        containment::store_possessions(
                            self.env.as_ref(),
                            &deny_list,
                            subject,
                            container,
                        );
                    }
                    _ => {}
                }
            }
            None => {
                if let Some(subject) = area.subject_mut(id) {
                    containment::store_possessions(self.env.as_ref(), &deny_list, subject, None);
                }
            }
        }
    }

    /// Release a subject through the full exit protocol, removing all their
    /// data. Runs only on the main context.
    ///
    /// # Errors
    ///
    /// - `WrongExecutionContext` off the main context (no mutation occurs)
    /// - `AreaRequired` when the area is unknown
    /// - `SubjectRequired` when the subject is not tracked by that area
    pub fn release_confined(
        &self,
        area_name: &str,
        id: SubjectId,
        operator: Option<&str>,
    ) -> Result<(), CustodyError> {
        self.ctx.ensure_main("releasing a subject")?;

        let mut registry = self.registry();
        let area = registry
            .area_mut(area_name)
            .ok_or(CustodyError::AreaRequired {
                action: "releasing a subject",
            })?;
        let area_display = area.name().to_owned();
        let free_point = area.free_point();
        let cell_name = area.cell_of(id).map(str::to_owned);
        let snapshot = {
            let subject = area.subject(id).ok_or(CustodyError::SubjectRequired {
                action: "releasing a subject",
            })?;
            snapshot_of(subject)
        };

        let actor = self
            .env
            .is_present(id)
            .then(|| self.actor_ref(id, &snapshot.name));

        // Advisory: the protocol proceeds regardless; subscribers and the
        // caller decide what a raised flag means.
        self.bus.publish(CustodyEvent::PreRelease {
            area: area_display.clone(),
            cell: cell_name.clone(),
            subject: snapshot.clone(),
            actor: actor.clone(),
            cancel: CancelFlag::new(),
        });

        if let Some(subject) = area.subject_mut(id) {
            subject.set_relocating(true);
        }
        if self.env.is_mounted(id) {
            self.env.eject_from_mount(id);
        }

        let store_flag = self.config.bool(ConfigKey::StorePossessions, true);
        if store_flag {
            self.env.clear_possessions(id);
        }

        match &cell_name {
            Some(name) => {
                if let Some(cell) = area.cell_mut(name) {
                    if store_flag {
                        let (container, occupant) = cell.container_and_occupant_mut();
                        if let Some(subject) = occupant {
                            containment::restore_possessions(self.env.as_ref(), subject, container);
                        }
                    } else if let Some(container) = cell.container_mut() {
                        // Not restoring, but nothing may leak to the next
                        // occupant either.
                        container.clear();
                    }
                }
            }
            None => {
                if store_flag {
                    if let Some(subject) = area.subject_mut(id) {
                        containment::restore_possessions(self.env.as_ref(), subject, None);
                    }
                }
            }
        }

        let Some((mut subject, detached_cell)) = area.detach_subject(id) else {
            return Err(CustodyError::SubjectRequired {
                action: "releasing a subject",
            });
        };
        subject.set_relocating(false);
        self.store
            .remove_subject(&area_display, detached_cell.as_deref(), &subject);

        self.env.set_rest_tracking_suppressed(id, false);

        let previous_position = subject.previous_position();
        let previous_mode = subject.previous_mode();
        let to_previous = self.config.bool(ConfigKey::ReleaseToPreviousPosition, false);
        let relocate_free = self.config.bool(ConfigKey::RelocateOnRelease, true);
        let restore_mode = self.config.bool(ConfigKey::RestorePreviousMode, false);
        let env = self.env.clone();
        self.ctx.submit_after(RELEASE_RELOCATE_DELAY_TICKS, move || {
            let mut relocated = false;
            if to_previous {
                if let Some(point) = previous_position {
                    relocated = env.relocate(id, point);
                }
            }
            if !relocated && relocate_free {
                env.relocate(id, free_point);
            }
            if restore_mode {
                env.set_operating_mode(id, previous_mode);
            }
        });

        for command in self.config.list(ConfigKey::ExitCommands) {
            self.env
                .execute_command(&substitute_placeholders(&command, &snapshot));
        }

        drop(registry);

        self.bus.publish(CustodyEvent::Released {
            area: area_display,
            cell: detached_cell,
            subject: snapshot,
            actor,
        });

        self.env.send_message(id, MSG_RELEASED);
        if let Some(operator) = operator {
            self.env
                .notify_operator(operator, &format!("{} was released.", subject.name()));
        }

        Ok(())
    }

    /// Forcefully release a subject, locating their area, cell, and
    /// presence automatically.
    ///
    /// Absent: only persistence removal and detachment happen; the release
    /// notification carries no actor reference. Present: the full exit
    /// protocol runs, and any failure from it degrades to the lazy
    /// on-return-to-presence release so the record is never left dangling.
    ///
    /// # Errors
    ///
    /// - `AreaRequired` when no area tracks the subject
    /// - `SubjectRequired` when the record vanished mid-operation
    pub fn force_release(&self, id: SubjectId, operator: Option<&str>) -> Result<(), CustodyError> {
        let area_name = {
            let registry = self.registry();
            registry
                .area_of(id)
                .map(str::to_owned)
                .ok_or(CustodyError::AreaRequired {
                    action: "force-releasing a subject",
                })?
        };

        if !self.env.is_present(id) {
            let mut registry = self.registry();
            let area = registry
                .area_mut(&area_name)
                .ok_or(CustodyError::AreaRequired {
                    action: "force-releasing a subject",
                })?;
            let area_display = area.name().to_owned();
            let Some((subject, detached_cell)) = area.detach_subject(id) else {
                return Err(CustodyError::SubjectRequired {
                    action: "force-releasing a subject",
                });
            };
            self.store
                .remove_subject(&area_display, detached_cell.as_deref(), &subject);
            let snapshot = snapshot_of(&subject);
            drop(registry);

            debug!(subject = %id, area = %area_display, "Force-released absent subject");
            self.bus.publish(CustodyEvent::Released {
                area: area_display,
                cell: detached_cell,
                subject: snapshot,
                actor: None,
            });
            return Ok(());
        }

        match self.release_confined(&area_name, id, operator) {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!(%error, subject = %id, "Full release failed; deferring to lazy release");
                self.release_absent(id);
                Ok(())
            }
        }
    }

    /// Mark a subject for lazy release: the record stays tracked, and the
    /// next presence detection completes the exit.
    pub fn release_absent(&self, id: SubjectId) {
        let mut registry = self.registry();
        if let Some(subject) = registry.subject_mut(id) {
            subject.set_offline_pending(true);
            subject.set_remaining_ms(0);
        }
    }

    /// Queue a subject for the deferred release sweeper. Callable from any
    /// context.
    ///
    /// Callers must not also force-release the same identity directly while
    /// it sits in the queue; the drain and a concurrent direct release are
    /// not mutually excluded.
    pub fn schedule_release(&self, id: SubjectId) {
        self.releases.push(id);
    }

    /// Drain the release queue, releasing each queued subject. A failure
    /// releasing one subject is logged and does not abort the rest.
    pub(crate) fn drain_release_queue(&self) {
        for id in self.releases.drain() {
            if !self.env.is_present(id) {
                self.release_absent(id);
                continue;
            }
            let area = { self.registry().area_of(id).map(str::to_owned) };
            let Some(area) = area else {
                warn!(subject = %id, "Queued release for an untracked subject");
                continue;
            };
            if let Err(error) = self.release_confined(&area, id, None) {
                warn!(%error, subject = %id, "Failed to release queued subject");
            }
        }
    }

    /// Count down running confinements by `elapsed_ms` and queue the ones
    /// that expire. Indefinite subjects are never touched; absent subjects
    /// keep their remaining time until they return.
    pub(crate) fn sweep_durations(&self, elapsed_ms: i64) {
        let expired: Vec<SubjectId> = {
            let mut registry = self.registry();
            let mut expired = Vec::new();
            for area in registry.areas_mut() {
                for subject in area.subjects_mut() {
                    if subject.is_indefinite() || subject.remaining_ms() == 0 {
                        continue;
                    }
                    if !self.env.is_present(subject.id()) {
                        continue;
                    }
                    if subject.subtract_time(elapsed_ms) == 0 {
                        expired.push(subject.id());
                    }
                }
            }
            expired
        };

        for id in expired {
            debug!(subject = %id, "Confinement duration expired; queueing release");
            self.schedule_release(id);
        }
    }

    /// Complete deferred work when a confined actor becomes present:
    /// a pending transfer, a lazy release, or the deferred application of
    /// the confinement itself.
    ///
    /// A pending transfer is completed before any release consideration;
    /// whether that and a simultaneously queued expiry release interleave
    /// exactly once is a documented caller-facing caveat, not a guarantee.
    pub fn on_presence_detected(&self, id: SubjectId) {
        let pending = {
            let mut registry = self.registry();
            let Some(area_name) = registry.area_of(id).map(str::to_owned) else {
                return;
            };
            let cell_name = registry.cell_of(id).map(str::to_owned);
            let Some(subject) = registry.subject_mut(id) else {
                return;
            };

            if let Some(name) = self.env.display_name(id) {
                if name != subject.name() {
                    subject.set_name(name);
                }
            }

            if !subject.is_offline_pending() {
                return;
            }

            if subject.is_pending_transfer() {
                PendingAction::Transfer(area_name, cell_name)
            } else if subject.remaining_ms() == 0 {
                PendingAction::LazyRelease(area_name)
            } else {
                PendingAction::Apply(area_name, cell_name)
            }
        };

        match pending {
            PendingAction::Transfer(area, cell) => {
                self.complete_deferred_transfer(&area, cell.as_deref(), id);
            }
            PendingAction::LazyRelease(area) => {
                if let Err(error) = self.release_confined(&area, id, None) {
                    warn!(%error, subject = %id, "Failed lazy release on presence");
                }
            }
            PendingAction::Apply(area, cell) => {
                if let Err(error) = self.apply_confinement(&area, cell.as_deref(), id) {
                    warn!(%error, subject = %id, "Failed deferred confinement on presence");
                }
            }
        }
    }

    fn complete_deferred_transfer(&self, area_name: &str, cell_name: Option<&str>, id: SubjectId) {
        let mut registry = self.registry();
        let Some(area) = registry.area_mut(area_name) else {
            return;
        };
        let target_display = area.name().to_owned();
        let entry_point = match cell_name.and_then(|name| area.cell(name)) {
            Some(cell) => cell.entry_point(),
            None => area.entry_point(),
        };
        let Some(subject) = area.subject_mut(id) else {
            return;
        };

        subject.set_offline_pending(false);
        subject.set_pending_transfer(false);
        subject.set_relocating(true);
        self.env.relocate(id, entry_point);
        self.env
            .send_message(id, &format!("You have been transferred to {}.", target_display));
        subject.set_relocating(false);
    }

    /// Move a subject between areas and/or cells.
    ///
    /// Ownership moves atomically from the caller's perspective: the
    /// subject never belongs to two areas. A present actor is relocated to
    /// the target's entry point immediately; an absent one is flagged so
    /// the next presence detection completes the move.
    ///
    /// # Errors
    ///
    /// - `AreaRequired` when either area is unknown
    /// - `SubjectRequired` when the subject is not tracked by the origin
    /// - `CellUnavailable` when the target cell is missing or occupied
    pub fn transfer_subject(
        &self,
        origin_area: &str,
        origin_cell: Option<&str>,
        target_area: &str,
        target_cell: Option<&str>,
        id: SubjectId,
    ) -> Result<(), CustodyError> {
        let mut registry = self.registry();

        let origin_display = registry
            .area(origin_area)
            .ok_or(CustodyError::AreaRequired {
                action: "transferring a subject",
            })?
            .name()
            .to_owned();
        let target_display = registry
            .area(target_area)
            .ok_or(CustodyError::AreaRequired {
                action: "transferring a subject",
            })?
            .name()
            .to_owned();

        if !registry
            .area(origin_area)
            .is_some_and(|area| area.contains_subject(id))
        {
            return Err(CustodyError::SubjectRequired {
                action: "transferring a subject",
            });
        }

        // The target cell must exist and be free before anything moves.
        let target_entry = {
            let target = registry.area(target_area).ok_or(CustodyError::AreaRequired {
                action: "transferring a subject",
            })?;
            match target_cell {
                Some(name) => {
                    let cell = target
                        .cell(name)
                        .ok_or_else(|| CustodyError::CellUnavailable {
                            area: target_display.clone(),
                            cell: name.to_owned(),
                        })?;
                    if cell.has_occupant() {
                        return Err(CustodyError::CellUnavailable {
                            area: target_display.clone(),
                            cell: name.to_owned(),
                        });
                    }
                    cell.entry_point()
                }
                None => target.entry_point(),
            }
        };

        let (mut subject, actual_origin_cell, payload) = {
            let area = registry
                .area_mut(origin_area)
                .ok_or(CustodyError::AreaRequired {
                    action: "transferring a subject",
                })?;
            let Some((subject, cell)) = area.detach_subject(id) else {
                return Err(CustodyError::SubjectRequired {
                    action: "transferring a subject",
                });
            };
            let payload = match &cell {
                Some(name) => area.cell_mut(name).and_then(containment::extract_transfer),
                None => None,
            };
            (subject, cell, payload)
        };

        if origin_cell.is_some()
            && origin_cell.map(str::to_lowercase)
                != actual_origin_cell.as_deref().map(str::to_lowercase)
        {
            debug!(
                claimed = ?origin_cell,
                actual = ?actual_origin_cell,
                "Transfer origin cell differs from the tracked cell"
            );
        }

        let present = self.env.is_present(id);
        if present {
            subject.set_relocating(true);
        } else {
            subject.set_offline_pending(true);
            subject.set_pending_transfer(true);
        }
        let snapshot = snapshot_of(&subject);

        let resolved_target_cell = {
            let area = registry
                .area_mut(target_area)
                .ok_or(CustodyError::AreaRequired {
                    action: "transferring a subject",
                })?;
            match target_cell {
                Some(name) => match area.cell_mut(name) {
                    Some(cell) => {
                        containment::deposit_transfer(payload, Some(&mut *cell), &mut subject);
                        let resolved = cell.name().to_owned();
                        cell.set_occupant(subject);
                        Some(resolved)
                    }
                    None => {
                        // Validated above; keep the subject tracked anyway.
                        containment::deposit_transfer(payload, None, &mut subject);
                        area.add_to_population(subject);
                        return Err(CustodyError::CellUnavailable {
                            area: target_display,
                            cell: name.to_owned(),
                        });
                    }
                },
                None => {
                    containment::deposit_transfer(payload, None, &mut subject);
                    area.add_to_population(subject);
                    None
                }
            }
        };

        if present {
            self.env.relocate(id, target_entry);
            self.env
                .send_message(id, &format!("You have been transferred to {}.", target_display));
            if let Some(subject) = registry
                .area_mut(target_area)
                .and_then(|area| area.subject_mut(id))
            {
                subject.set_relocating(false);
            }
        }

        if let Some(cell) = &actual_origin_cell {
            self.env.refresh_cell_signage(&origin_display, cell);
        }
        if let Some(cell) = &resolved_target_cell {
            self.env.refresh_cell_signage(&target_display, cell);
        }

        let actor = present.then(|| self.actor_ref(id, &snapshot.name));
        drop(registry);

        self.bus.publish(CustodyEvent::Transferred {
            origin_area: origin_display,
            origin_cell: actual_origin_cell,
            target_area: target_display,
            target_cell: resolved_target_cell,
            subject: snapshot,
            actor,
        });

        Ok(())
    }
}
