//! End-to-end tests for the transition protocol: entry, apply, exit,
//! forced exit, transfer, and the deferred release sweeper, driven over a
//! simulated environment.

mod common;

use common::fixture;
use custody_bus::{ActorRef, CustodyEvent, EventFilter};
use custody_core::exec::{RELEASE_RELOCATE_DELAY_TICKS, STORE_DELAY_TICKS};
use custody_core::{
    CellSelector, ConfigKey, CustodyConfig, CustodyError, Item, Subject, WornSlot, INDEFINITE,
};
use uuid::Uuid;

fn subject(remaining_ms: i64) -> Subject {
    Subject::new(Uuid::new_v4(), "vex", remaining_ms)
        .confined_by("overseer")
        .with_reason("trespass")
}

fn actor_for(s: &Subject) -> ActorRef {
    ActorRef {
        id: s.id(),
        name: s.name().to_owned(),
    }
}

#[test]
fn assignment_is_always_area_then_cell() {
    let f = fixture(CustodyConfig::new());

    let in_cell = subject(60_000);
    let cell_id = in_cell.id();
    f.env.spawn(cell_id);
    f.manager
        .prepare_confinement("a1", CellSelector::named("c1"), Some(actor_for(&in_cell)), in_cell)
        .unwrap();

    let in_pop = subject(60_000);
    let pop_id = in_pop.id();
    f.env.spawn(pop_id);
    f.manager
        .prepare_confinement("a1", CellSelector::None, Some(actor_for(&in_pop)), in_pop)
        .unwrap();

    f.manager.with_registry(|r| {
        // A cell assignment always implies the cell's area.
        assert_eq!(r.area_of(cell_id), Some("a1"));
        assert_eq!(r.cell_of(cell_id), Some("c1"));
        // General population: area without cell.
        assert_eq!(r.area_of(pop_id), Some("a1"));
        assert_eq!(r.cell_of(pop_id), None);
        // A free identity has neither.
        let free = Uuid::new_v4();
        assert_eq!(r.area_of(free), None);
        assert_eq!(r.cell_of(free), None);
    });
}

#[test]
fn double_confinement_fails_with_no_mutation() {
    let f = fixture(CustodyConfig::new());
    let s = subject(60_000);
    let id = s.id();
    f.env.spawn(id);

    f.manager
        .prepare_confinement("a1", CellSelector::named("c1"), Some(actor_for(&s)), s)
        .unwrap();

    let duplicate = Subject::new(id, "vex", 90_000);
    let err = f
        .manager
        .prepare_confinement("a2", CellSelector::Any, Some(ActorRef { id, name: "vex".into() }), duplicate)
        .unwrap_err();
    assert!(matches!(err, CustodyError::AlreadyConfined { .. }));

    f.manager.with_registry(|r| {
        assert_eq!(r.total_confined(), 1);
        assert_eq!(r.area_of(id), Some("a1"));
        assert_eq!(r.cell_of(id), Some("c1"));
        // The original record is untouched.
        assert_eq!(r.subject(id).unwrap().remaining_ms(), 60_000);
    });
}

#[test]
fn possessions_round_trip_through_a_containered_cell() {
    let mut config = CustodyConfig::new();
    config.set(ConfigKey::PossessionDenyList, "blade");
    let f = fixture(config);

    let s = subject(60_000);
    let id = s.id();
    f.env.spawn(id);
    f.env.actor(id, |a| {
        a.carried = vec![
            Item::new("iron_helmet", 1),
            Item::new("bread", 3),
            Item::new("long_blade", 1),
        ];
    });

    f.manager
        .prepare_confinement("a1", CellSelector::named("c1"), Some(actor_for(&s)), s)
        .unwrap();
    f.ctx.advance(1 + STORE_DELAY_TICKS);

    // Containered: two allowed items stored, the denied one left behind.
    f.manager.with_registry(|r| {
        let cell = r.area("a1").unwrap().cell("c1").unwrap();
        assert_eq!(cell.container().unwrap().len(), 2);
        // Exclusivity: the container is populated, so no blob was written.
        let subject = r.subject(id).unwrap();
        assert_eq!(subject.carried_blob(), "");
        assert_eq!(subject.worn_blob(), "");
    });

    f.manager.release_confined("a1", id, None).unwrap();
    f.ctx.advance(RELEASE_RELOCATE_DELAY_TICKS);

    // The helmet went to its worn slot; the bread came back to hand.
    f.env.actor(id, |a| {
        assert_eq!(a.worn[&WornSlot::Head].kind, "iron_helmet");
        assert_eq!(a.carried, vec![Item::new("bread", 3)]);
        assert!(a.dropped.is_empty());
    });

    f.manager.with_registry(|r| {
        assert!(!r.is_confined(id));
        let cell = r.area("a1").unwrap().cell("c1").unwrap();
        assert!(cell.container().unwrap().is_empty());
    });
}

#[test]
fn containment_choice_is_mutually_exclusive_per_event() {
    let f = fixture(CustodyConfig::new());

    // Entry into a containered cell: container populated, blobs empty.
    let boxed = subject(60_000);
    let boxed_id = boxed.id();
    f.env.spawn(boxed_id);
    f.env.actor(boxed_id, |a| a.carried = vec![Item::new("bread", 1)]);
    f.manager
        .prepare_confinement("a1", CellSelector::named("c1"), Some(actor_for(&boxed)), boxed)
        .unwrap();

    // Entry into general population: blob written, no container involved.
    let pooled = subject(60_000);
    let pooled_id = pooled.id();
    f.env.spawn(pooled_id);
    f.env.actor(pooled_id, |a| a.carried = vec![Item::new("rope", 1)]);
    f.manager
        .prepare_confinement("a1", CellSelector::None, Some(actor_for(&pooled)), pooled)
        .unwrap();

    f.ctx.advance(1 + STORE_DELAY_TICKS);

    f.manager.with_registry(|r| {
        let cell = r.area("a1").unwrap().cell("c1").unwrap();
        assert_eq!(cell.container().unwrap().len(), 1);
        let boxed = r.subject(boxed_id).unwrap();
        assert_eq!(boxed.carried_blob(), "");

        let pooled = r.subject(pooled_id).unwrap();
        assert!(!pooled.carried_blob().is_empty());
    });
}

#[test]
fn release_off_the_main_context_fails_and_mutates_nothing() {
    let f = fixture(CustodyConfig::new());
    let s = subject(60_000);
    let id = s.id();
    f.env.spawn(id);
    f.manager
        .prepare_confinement("a1", CellSelector::named("c1"), Some(actor_for(&s)), s)
        .unwrap();
    f.ctx.advance(1);

    let manager = f.manager.clone();
    let result = std::thread::spawn(move || manager.release_confined("a1", id, None))
        .join()
        .unwrap();

    assert!(matches!(
        result,
        Err(CustodyError::WrongExecutionContext { .. })
    ));
    f.manager.with_registry(|r| {
        assert!(r.is_confined(id));
        assert_eq!(r.cell_of(id), Some("c1"));
    });
    assert!(f.store.removals().is_empty());
}

#[test]
fn transfer_moves_subject_and_container_contents_losslessly() {
    let f = fixture(CustodyConfig::new());
    let s = subject(60_000);
    let id = s.id();
    f.env.spawn(id);
    f.env.actor(id, |a| {
        a.carried = vec![Item::new("x", 1), Item::new("y", 1)];
    });

    f.manager
        .prepare_confinement("a1", CellSelector::named("c1"), Some(actor_for(&s)), s)
        .unwrap();
    f.ctx.advance(1 + STORE_DELAY_TICKS);

    let mut sub = f.bus.subscribe(EventFilter::all());
    f.manager
        .transfer_subject("a1", Some("c1"), "a2", Some("c1"), id)
        .unwrap();

    f.manager.with_registry(|r| {
        // Tracked under the target area and cell only.
        assert_eq!(r.area_of(id), Some("a2"));
        assert_eq!(r.cell_of(id), Some("c1"));

        // Origin cell detached and its container empty.
        let origin = r.area("a1").unwrap().cell("c1").unwrap();
        assert!(!origin.has_occupant());
        assert!(origin.container().unwrap().is_empty());

        // Target container holds exactly X and Y: zero items lost.
        let target = r.area("a2").unwrap().cell("c1").unwrap();
        let kinds: Vec<_> = target
            .container()
            .unwrap()
            .items()
            .map(|i| i.kind.clone())
            .collect();
        assert_eq!(kinds, vec!["x", "y"]);
    });

    let event = sub.try_recv().unwrap().expect("event");
    match event {
        CustodyEvent::Transferred {
            origin_area,
            origin_cell,
            target_area,
            target_cell,
            actor,
            ..
        } => {
            assert_eq!(origin_area, "a1");
            assert_eq!(origin_cell.as_deref(), Some("c1"));
            assert_eq!(target_area, "a2");
            assert_eq!(target_cell.as_deref(), Some("c1"));
            assert!(actor.is_some());
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn forced_release_of_absent_subject_touches_no_environment() {
    let f = fixture(CustodyConfig::new());
    let s = subject(60_000);
    let id = s.id();
    f.env.spawn_absent(id);
    f.manager
        .prepare_confinement("a1", CellSelector::named("c1"), None, s)
        .unwrap();

    f.manager.force_release(id, Some("overseer")).unwrap();

    // Persistence removal and detachment always happen.
    let removals = f.store.removals();
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].1.as_deref(), Some("c1"));
    f.manager.with_registry(|r| assert!(!r.is_confined(id)));

    // But no relocation or messaging collaborator was invoked.
    assert!(f.env.effects_for(id).is_empty());
}

#[test]
fn sweeper_processes_the_rest_when_one_release_fails() {
    let f = fixture(CustodyConfig::new());

    let mut confined = Vec::new();
    for _ in 0..3 {
        let s = subject(600_000);
        let id = s.id();
        f.env.spawn(id);
        f.manager
            .prepare_confinement("a1", CellSelector::Any, Some(actor_for(&s)), s)
            .unwrap();
        confined.push(id);
    }
    f.ctx.advance(1);

    // A present identity nothing tracks: its release fails mid-drain.
    let rogue = Uuid::new_v4();
    f.env.spawn(rogue);

    f.manager.schedule_release(confined[0]);
    f.manager.schedule_release(rogue);
    f.manager.schedule_release(confined[1]);
    f.manager.schedule_release(confined[2]);

    // Drive past the sweeper's startup delay so the drain runs.
    f.ctx.advance(120);

    f.manager.with_registry(|r| {
        for id in &confined {
            assert!(!r.is_confined(*id), "{} should have been released", id);
        }
    });
    assert_eq!(f.manager.pending_releases(), 0);
}

#[test]
fn indefinite_subjects_outlive_every_expiry_sweep() {
    let f = fixture(CustodyConfig::new());

    let forever = subject(INDEFINITE);
    let forever_id = forever.id();
    f.env.spawn(forever_id);
    f.manager
        .prepare_confinement("a1", CellSelector::None, Some(actor_for(&forever)), forever)
        .unwrap();

    let brief = subject(1_000);
    let brief_id = brief.id();
    f.env.spawn(brief_id);
    f.manager
        .prepare_confinement("a1", CellSelector::None, Some(actor_for(&brief)), brief)
        .unwrap();

    // Run long enough for many duration sweeps and several release sweeps.
    f.ctx.advance(200);

    f.manager.with_registry(|r| {
        assert!(!r.is_confined(brief_id), "definite subject expires");
        assert!(r.is_confined(forever_id), "indefinite subject never expires");
        assert_eq!(r.subject(forever_id).unwrap().remaining_ms(), INDEFINITE);
    });
}

#[test]
fn full_lifecycle_emits_events_in_order() {
    let f = fixture(CustodyConfig::new());
    let s = subject(60_000);
    let id = s.id();
    f.env.spawn(id);

    let mut sub = f.bus.subscribe(EventFilter::all());
    f.manager
        .prepare_confinement("a1", CellSelector::named("c2"), Some(actor_for(&s)), s)
        .unwrap();
    f.ctx.advance(1 + STORE_DELAY_TICKS);
    f.manager.release_confined("a1", id, None).unwrap();
    f.ctx.advance(RELEASE_RELOCATE_DELAY_TICKS);

    let mut kinds = Vec::new();
    while let Ok(Some(event)) = sub.try_recv() {
        kinds.push(match event {
            CustodyEvent::ConfinedWhileAbsent { .. } => "offline",
            CustodyEvent::Confined { .. } => "confined",
            CustodyEvent::PreRelease { .. } => "pre-release",
            CustodyEvent::Released { .. } => "released",
            CustodyEvent::Transferred { .. } => "transferred",
        });
    }
    assert_eq!(kinds, vec!["confined", "pre-release", "released"]);
}
