use glam::Vec3;

use marble_rush_lib::config::SimConfig;
use marble_rush_lib::game_server::commentary::{CannedCommentary, CommentaryStatus};
use marble_rush_lib::game_server::track::state_at;
use marble_rush_lib::game_server::{
    CameraTarget, GameServer, Race, RaceIntegrator, RaceSnapshot, RaceStatus, Racer, SplineKind,
    TrackCurve,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const FRAME: f32 = 1.0 / 60.0;

fn seeded(seed: u64) -> SimConfig {
    let mut config = SimConfig {
        seed: Some(seed),
        ..SimConfig::default()
    };
    config.track.arc_length_divisions = 800;
    config
}

fn stock_server(seed: u64, names: &[&str]) -> GameServer {
    let mut server = GameServer::new(seeded(seed)).unwrap();
    server.ingest_roster(names.iter().map(|n| n.to_string()));
    server
}

fn run_until_winner(server: &mut GameServer) -> RaceSnapshot {
    for _ in 0..100_000 {
        let snapshot = server.tick(FRAME);
        if snapshot.winner.is_some() {
            return snapshot;
        }
    }
    panic!("race never produced a winner");
}

#[test]
fn roster_ignores_repeat_names() {
    let mut server = stock_server(1, &["x", "y"]);
    assert_eq!(server.ingest_roster(["x".to_string()]), 0);
    assert_eq!(server.race().racers.len(), 2);
}

#[test]
fn full_race_decides_one_winner_and_freezes_finishers() {
    let mut server = stock_server(3, &["a", "b", "c", "d"]);
    assert!(server.start_race());

    let mut previous: Vec<Racer> = server.race().racers.clone();
    let mut winner = None;
    for _ in 0..100_000 {
        let snapshot = server.tick(FRAME);
        let racers = &server.race().racers;

        for (before, after) in previous.iter().zip(racers) {
            if before.finished {
                assert_eq!(before, after, "finished racer changed");
            } else {
                assert!(after.distance >= before.distance);
            }
        }

        if let Some(id) = snapshot.winner {
            assert!(winner.is_none() || winner == Some(id), "winner changed");
            winner = Some(id);
        }
        previous = racers.clone();
        if snapshot.status == RaceStatus::Finished {
            break;
        }
    }

    let race = server.race();
    assert_eq!(race.status, RaceStatus::Finished);
    let champion = race.winner().unwrap();
    assert!(champion.finished);
    assert!(champion.distance >= server.curve().length());

    let runner_up = race.runner_up().unwrap();
    let farthest_other = race
        .racers
        .iter()
        .filter(|r| r.id != champion.id)
        .map(|r| r.distance)
        .fold(f32::MIN, f32::max);
    assert_eq!(runner_up.distance, farthest_other);
}

#[test]
fn launch_band_then_speed_limits() {
    let config = seeded(5);
    let physics = config.physics.clone();
    let mut server = GameServer::new(config).unwrap();
    server.ingest_roster(["a", "b", "c"].map(String::from));
    server.start_race();

    for _ in 0..20_000 {
        let snapshot = server.tick(FRAME);
        if snapshot.winner.is_some() {
            break;
        }
        let elapsed = snapshot.elapsed_time;
        for racer in snapshot.racers.iter().filter(|r| !r.finished) {
            if elapsed < physics.chaos_start_secs {
                assert!(racer.speed >= physics.launch_min_speed);
                assert!(racer.speed <= physics.launch_max_speed);
            } else {
                assert!(racer.speed >= physics.min_speed && racer.speed <= physics.max_speed);
            }
        }
    }
}

#[test]
fn reset_restores_the_lobby() {
    let mut server = stock_server(9, &["a", "b"]);
    let identities: Vec<(u32, String, String, f32)> = server
        .race()
        .racers
        .iter()
        .map(|r| (r.id, r.name.clone(), r.color.clone(), r.lane_offset))
        .collect();

    server.start_race();
    run_until_winner(&mut server);
    while server.status() != RaceStatus::Finished {
        server.tick(FRAME);
    }

    server.reset();
    server.reset();

    assert_eq!(server.status(), RaceStatus::Lobby);
    for (racer, (id, name, color, lane)) in server.race().racers.iter().zip(&identities) {
        assert_eq!(
            (&racer.id, &racer.name, &racer.color, &racer.lane_offset),
            (id, name, color, lane)
        );
        assert_eq!(racer.distance, 0.0);
        assert_eq!(racer.velocity, 0.0);
        assert!(!racer.finished);
        assert_eq!(racer.finish_time, None);
    }
    assert!(server.get_results().is_none());
    assert_eq!(server.get_snapshot().commentary.status, CommentaryStatus::Idle);
}

#[test]
fn camera_pins_the_winner_and_hype_cannot_overwrite_the_call() {
    let mut server = stock_server(11, &["a", "b", "c"]);
    server.start_race();
    let hype = server.take_commentary_jobs().remove(0);

    let snapshot = run_until_winner(&mut server);
    assert_eq!(snapshot.camera_target, CameraTarget::Racer(snapshot.winner.unwrap()));
    assert!(snapshot.commentary.loading);

    let call = server.take_commentary_jobs().remove(0);
    let late_hype = hype.request.run(&CannedCommentary);
    assert!(!server.resolve_commentary(hype.ticket, late_hype));
    assert!(server.get_snapshot().commentary.loading);

    let answer = call.request.run(&CannedCommentary);
    assert!(server.resolve_commentary(call.ticket, answer));
    let commentary = server.get_snapshot().commentary;
    assert!(!commentary.loading);
    assert!(commentary.text.contains("takes the crown"));
}

#[test]
fn downhill_racer_pulls_away_from_flat_racer() {
    // Flat opening straight, then a long steep drop
    let points = vec![
        Vec3::new(0.0, 500.0, 0.0),
        Vec3::new(0.0, 500.0, 1500.0),
        Vec3::new(0.0, 500.0, 1600.0),
        Vec3::new(0.0, -2500.0, 5600.0),
    ];
    let curve = TrackCurve::build(points, SplineKind::Centripetal, 4000).unwrap();
    let length = curve.length();

    let flat_start = 100.0;
    let steep_start = 3500.0;
    assert!(state_at(&curve, flat_start, length).tangent.y.abs() < 0.05);
    assert!(state_at(&curve, steep_start, length).tangent.y < -0.5);

    let mut config = seeded(13);
    config.physics.perturbation_chance = 0.0;
    let integrator = RaceIntegrator::new(&curve, &config.physics);
    let mut rng = StdRng::seed_from_u64(13);

    let mut race = Race::new(&config.lobby);
    race.register("flat", "#ffffff", 0.0);
    race.register("steep", "#ffffff", 0.0);
    assert!(race.start(0.0));
    race.racers[0].distance = flat_start;
    race.racers[1].distance = steep_start;

    // Well past the launch phase, same starting speed
    let mut now = config.physics.chaos_start_secs + 1.0;
    let mut gained = (0.0, 0.0);
    for _ in 0..600 {
        let before = (race.racers[0].distance, race.racers[1].distance);
        now += FRAME;
        race.update(now, &integrator, &mut rng);
        gained.0 += race.racers[0].distance - before.0;
        gained.1 += race.racers[1].distance - before.1;
    }
    assert!(gained.1 > gained.0, "steep gained {} vs flat {}", gained.1, gained.0);
}
