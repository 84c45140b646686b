use playforge::{PhysicsConfig, PhysicsEvent, PhysicsWorld, RigidBody2D, Vec2};

fn zero_gravity() -> PhysicsWorld {
    PhysicsWorld::with_config(PhysicsConfig::default().with_gravity(Vec2::ZERO))
}

#[test]
fn body_thrown_at_wall_stops_or_rebounds() {
    let mut world = zero_gravity();
    let ball = world
        .add_body(
            RigidBody2D::dynamic(Vec2::new(0.0, 0.0), Vec2::ONE, 1.0)
                .with_restitution(0.5)
                .with_velocity(Vec2::new(10.0, 0.0)),
        )
        .expect("valid ball");
    let wall = world
        .add_body(RigidBody2D::fixed(Vec2::new(5.0, 0.0), Vec2::ONE))
        .expect("valid wall");
    world.drain_events();

    let mut hit = false;
    for _ in 0..120 {
        world.step(1.0 / 60.0);
        let events = world.drain_events();
        if events
            .iter()
            .any(|e| matches!(e, PhysicsEvent::Collision { .. }))
        {
            hit = true;
            break;
        }
    }

    assert!(hit, "ball should reach the wall within two seconds");
    let ball = world.body(ball).expect("ball still present");
    assert!(ball.velocity.x <= 0.0, "post-collision vx = {}", ball.velocity.x);
    let wall = world.body(wall).expect("wall still present");
    assert_eq!(wall.position, Vec2::new(5.0, 0.0));
    assert_eq!(wall.velocity, Vec2::ZERO);
}

#[test]
fn elastic_head_on_collision_keeps_relative_speed() {
    let mut world = zero_gravity();
    let a = world
        .add_body(
            RigidBody2D::dynamic(Vec2::new(100.0, 100.0), Vec2::ONE, 1.0)
                .with_restitution(1.0)
                .with_velocity(Vec2::new(3.0, 0.0)),
        )
        .unwrap();
    let b = world
        .add_body(
            RigidBody2D::dynamic(Vec2::new(100.9, 100.0), Vec2::ONE, 1.0)
                .with_restitution(1.0)
                .with_velocity(Vec2::new(-3.0, 0.0)),
        )
        .unwrap();

    world.step(0.0);

    let va = world.body(a).unwrap().velocity;
    let vb = world.body(b).unwrap().velocity;
    let relative = (va - vb).x;
    assert!((relative.abs() - 6.0).abs() < 1e-4, "relative speed {relative}");
    assert!(relative < 0.0, "bodies should now separate");
}

#[test]
fn overlapping_static_bodies_never_move() {
    let mut world = PhysicsWorld::new();
    let floor = world
        .add_body(RigidBody2D::fixed(Vec2::new(0.0, 10.0), Vec2::new(50.0, 2.0)))
        .unwrap();
    let pillar = world
        .add_body(RigidBody2D::fixed(Vec2::new(10.0, 0.0), Vec2::new(2.0, 20.0)))
        .unwrap();

    for _ in 0..30 {
        world.step(1.0 / 30.0);
    }

    assert_eq!(world.body(floor).unwrap().position, Vec2::new(0.0, 10.0));
    assert_eq!(world.body(pillar).unwrap().position, Vec2::new(10.0, 0.0));
    assert_eq!(world.body(floor).unwrap().velocity, Vec2::ZERO);
}

#[test]
fn crowded_scene_reports_each_pair_once_per_step() {
    let mut world = PhysicsWorld::with_config(
        PhysicsConfig::default()
            .with_gravity(Vec2::ZERO)
            .with_max_objects(2),
    );
    // A tight cluster straddling the quadtree midlines.
    let mut ids = Vec::new();
    for i in 0..6 {
        let offset = i as f32 * 0.3;
        ids.push(
            world
                .add_body(RigidBody2D::dynamic(
                    Vec2::new(639.0 + offset, 359.0 + offset),
                    Vec2::new(2.0, 2.0),
                    1.0,
                ))
                .unwrap(),
        );
    }
    world.drain_events();
    world.step(1.0 / 60.0);

    let mut pairs = std::collections::HashSet::new();
    for event in world.drain_events() {
        if let PhysicsEvent::Collision { body_a, body_b } = event {
            let key = if body_a < body_b { (body_a, body_b) } else { (body_b, body_a) };
            assert!(pairs.insert(key), "pair {key:?} reported twice");
        }
    }
    assert!(!pairs.is_empty());
}
