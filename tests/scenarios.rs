use approx::assert_relative_eq;
use nalgebra::Vector3;

use ship_nav::config::{AlignConfig, CruiseConfig, DockingConfig, NavConfig, TransitConfig};
use ship_nav::nav::cruise::CruiseState;
use ship_nav::nav::transit::TransitState;
use ship_nav::nav::{
    AlignTarget, AtmosphericTransitController, Controller, CruiseController, CruisePhase, ExchangePoint,
    ExchangeTask, SpeedProfile, TransitPhase, WaypointFollower,
};
use ship_nav::sim::{presets, run, EventKind, RunConfig, SimShip, Sphere};
use ship_nav::Autopilot;

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_single_leg_speeds() {
    let profile = SpeedProfile { first_leg: 10.0, interior: 5.0, last_leg: 1.0, slowdown_distance: 50.0, min_speed: 0.5 };
    assert_eq!(profile.desired_speed(0, 1, 60.0), 10.0);
    assert_relative_eq!(profile.desired_speed(0, 1, 40.0), 8.0);

    // the same numbers show up as velocity-matching thrust
    let mut ship = SimShip::new(1_000.0);
    ship.state.pos = Vector3::new(0.0, 0.0, 240.0);
    let mut follower = WaypointFollower::new(DockingConfig::default(), &AlignConfig::default());
    let frame = AlignTarget::new(-Vector3::z(), Vector3::y(), 0.02).unwrap();
    follower.initialize(vec![Vector3::new(0.0, 0.0, 200.0)], frame, Some(profile), None);
    follower.tick(&mut ship.vessel());
    assert_relative_eq!(ship.actuators.net_force(), Vector3::new(0.0, 0.0, -4_000.0), epsilon = 1e-6);
}

#[test]
fn scenario_b_arrival_inside_radius() {
    let mut ship = SimShip::new(1_000.0);
    ship.state.pos = Vector3::new(0.0, 0.0, 150.0);
    let mut ap = Autopilot::default();
    ap.arrive(Vector3::zeros(), Some(200.0), Some("ARRIVED"));
    ap.tick(&mut ship.vessel());
    assert_eq!(ship.log, vec!["ARRIVED".to_string()]);
    assert!(ap.is_idle());
}

#[test]
fn scenario_c_obstacle_beats_cruising() {
    let mut ship = SimShip::new(10_000.0);
    ship.state.vel = Vector3::new(0.0, 0.0, -40.0);
    ship.sensor.spheres.push(Sphere::new(Vector3::new(0.0, 0.0, -1_200.0), 150.0));

    let mut cruise = CruiseController::new(CruiseConfig::default(), &AlignConfig::default());
    cruise.restore(Some(CruiseState {
        phase: CruisePhase::Accelerating,
        origin: Vector3::zeros(),
        waypoints: vec![Vector3::new(0.0, 0.0, -30_000.0)],
        index: 0,
        evasion: Vec::new(),
        burn: None,
        obstacle: None,
        token: None,
        scan_ticks: 0,
    }));
    cruise.tick(&mut ship.vessel());

    assert_eq!(cruise.phase(), Some(CruisePhase::Avoiding));
    let state = cruise.state().unwrap();
    assert_eq!(state.evasion.len(), 2);
    assert_relative_eq!(state.evasion[1], Vector3::new(0.0, 0.0, -1_450.0));
}

#[test]
fn scenario_d_full_hold_starts_next_transit() {
    let mut ship = SimShip::new(5_000.0);
    ship.cargo = 0.96;
    let mut transit =
        AtmosphericTransitController::new(TransitConfig::default(), DockingConfig::default(), &AlignConfig::default());
    transit.restore(Some(TransitState {
        phase: TransitPhase::Exchanging,
        landing: true,
        task: ExchangeTask::Load,
        route: vec![Vector3::new(0.0, 300.0, -1_000.0)],
        index: 1,
        exchange: ExchangePoint { waypoints: vec![Vector3::zeros()], forward: -Vector3::z(), up: Vector3::y() },
        separation_start: None,
        docking: None,
        next_transit: Some("TRANSIT B->A".into()),
        poll_ticks: 0,
    }));
    transit.tick(&mut ship.vessel());
    assert_eq!(ship.log, vec!["TRANSIT B->A".to_string()]);
    assert!(!transit.has_target());
}

// ---------------------------------------------------------------------------
// Closed-loop runs
// ---------------------------------------------------------------------------

#[test]
fn docking_run_locks_and_completes() {
    let mut s = presets::dock(NavConfig::default());
    let result = run(&mut s.ship, &mut s.autopilot, &RunConfig::default());
    assert!(result.finished, "docking timed out");
    assert_eq!(result.dispatched, vec!["DOCKED".to_string()]);
    assert!(result.events.iter().any(|e| e.kind == EventKind::Connected));
    assert!((s.ship.state.pos - Vector3::new(0.0, 0.0, -270.0)).norm() < 1.0);
}

#[test]
fn cruise_run_evades_and_arrives() {
    let mut s = presets::cruise(NavConfig::default());
    let result = run(&mut s.ship, &mut s.autopilot, &RunConfig::default());
    assert!(result.finished, "cruise timed out");
    assert_eq!(result.dispatched, vec!["IN RANGE".to_string(), "ARRIVED".to_string()]);
    assert!(result
        .events
        .iter()
        .any(|e| matches!(&e.kind, EventKind::Activity { to, .. } if to.contains("Avoiding"))));
    assert!(s.ship.state.vel.norm() <= CruiseConfig::default().stop_speed);
    assert!((s.ship.state.pos - Vector3::new(0.0, 0.0, -20_000.0)).norm() < 500.0);
}

#[test]
fn transit_run_loads_and_hands_over() {
    let mut s = presets::transit(NavConfig::default());
    let result = run(&mut s.ship, &mut s.autopilot, &RunConfig::default());
    assert!(result.finished, "transit timed out");
    assert_eq!(result.dispatched, vec!["TRANSIT RETURN".to_string()]);
    assert!(result.events.iter().any(|e| e.kind == EventKind::Released));
    assert!(result.events.iter().any(|e| e.kind == EventKind::Connected));
    assert!(s.ship.cargo >= TransitConfig::default().max_load);
}

// ---------------------------------------------------------------------------
// Checkpoints across a suspended run
// ---------------------------------------------------------------------------

#[test]
fn suspended_cruise_resumes_identically() {
    let config = RunConfig { max_time: 20.0, ..RunConfig::default() };
    let mut a = presets::cruise(NavConfig::default());
    let first = run(&mut a.ship, &mut a.autopilot, &config);
    assert!(!first.finished);

    // a fresh autopilot restored from the checkpoint continues on the same ship
    let mut b = Autopilot::default();
    b.load(&first.checkpoint);
    assert_eq!(b.save(), first.checkpoint);
    assert_eq!(b.active(), a.autopilot.active());

    let mut ship_b = a.ship.clone();
    let more = RunConfig { max_time: 30.0, ..RunConfig::default() };
    let ra = run(&mut a.ship, &mut a.autopilot, &more);
    let rb = run(&mut ship_b, &mut b, &more);
    assert_eq!(ra.checkpoint, rb.checkpoint);
    assert_eq!(a.ship.state, ship_b.state);
}

#[test]
fn checkpoint_text_survives_hostile_tokens() {
    let mut ap = Autopilot::default();
    ap.arrive(Vector3::new(1.0, 2.0, 3.0), Some(50.0), Some("say \"hi\"; run=1|2,3%\nnext"));
    let text = ap.save();
    assert_eq!(text.lines().count(), 5);

    let mut restored = Autopilot::default();
    restored.load(&text);
    assert_eq!(
        restored.arrival().state().unwrap().token.as_deref(),
        Some("say \"hi\"; run=1|2,3%\nnext")
    );
}
