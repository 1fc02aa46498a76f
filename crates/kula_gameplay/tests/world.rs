use std::time::Duration;

use kula_data::{Reflected, ScopeId};
use kula_gameplay::{
    load_level, load_level_file, ActionIncrement, EventMessage, GameObject, GameplayError, World,
};

fn world(level: &str) -> World {
    let mut world = World::new().unwrap();
    load_level(&mut world, level).unwrap();
    world
}

fn object(world: &World, key: &str) -> ScopeId {
    world.arena().at(world.root(), key).unwrap().get_scope(0).unwrap()
}

fn int(world: &World, scope: ScopeId, key: &str) -> i32 {
    world.arena().at(scope, key).unwrap().get_int(0).unwrap()
}

fn action_names(world: &World, owner: ScopeId) -> Vec<String> {
    let arena = world.arena();
    arena
        .at(owner, "Actions")
        .unwrap()
        .scope_ids()
        .iter()
        .map(|id| arena.at(*id, "Name").unwrap().get_string(0).unwrap())
        .collect()
}

#[test]
fn test_level_builds_game_objects() {
    let world = world(
        r#"{
            "GameObject Hero": {
                "Name": "Hero",
                "vector Position": "vec4(1, 2, 3, 1)",
                "GameObject Children": [{"Name": "Sword"}, {"Name": "Shield"}]
            }
        }"#,
    );

    let hero = object(&world, "Hero");
    let game_object = world.arena().object_as::<GameObject>(hero).unwrap();
    assert_eq!(game_object.name.get(), "Hero");
    assert_eq!(game_object.position.get(), kula_data::Vec4::new(1.0, 2.0, 3.0, 1.0));
    assert_eq!(world.arena().at(hero, "Children").unwrap().size(), 2);
}

#[test]
fn test_increment_runs_each_frame() {
    let mut world = world(
        r#"{
            "GameObject Hero": {
                "int Score": 0,
                "float Heat": 0.5,
                "ActionIncrement Actions": [
                    {"Name": "Tick", "Target": "Score"},
                    {"Name": "Warm", "Target": "Heat", "Step": 0.25}
                ],
                "GameObject Children": {
                    "int Ticks": 0,
                    "ActionIncrement Actions": {"Name": "Inner", "Target": "Ticks", "Step": 2}
                }
            }
        }"#,
    );

    for _ in 0..3 {
        world.tick(Duration::from_millis(16)).unwrap();
    }

    let hero = object(&world, "Hero");
    assert_eq!(int(&world, hero, "Score"), 3);
    assert_eq!(world.arena().at(hero, "Heat").unwrap().get_float(0).unwrap(), 1.25);

    let child = world.arena().at(hero, "Children").unwrap().get_scope(0).unwrap();
    assert_eq!(int(&world, child, "Ticks"), 6);
    assert_eq!(world.time().total_ms(), 48);
}

#[test]
fn test_unknown_target_fails() {
    let mut world = world(
        r#"{"GameObject Hero": {"ActionIncrement Actions": {"Name": "Tick", "Target": "Nope"}}}"#,
    );
    assert!(matches!(world.update(), Err(GameplayError::UnknownTarget(t)) if t == "Nope"));
}

#[test]
fn test_conditional_and_expression() {
    let mut world = world(
        r#"{
            "GameObject Hero": {
                "int Health": 3,
                "int Regen": 0,
                "ActionListIf Actions": {
                    "Name": "LowHealth",
                    "Condition": "<<< Health < 5 >>>",
                    "ActionExpression Then": {"Name": "Heal", "Expression": "<<< Health = Health + 1 >>>"},
                    "ActionIncrement Else": {"Name": "Count", "Target": "Regen"}
                }
            }
        }"#,
    );

    let hero = object(&world, "Hero");
    world.update().unwrap();
    world.update().unwrap();
    assert_eq!(int(&world, hero, "Health"), 5);
    assert_eq!(int(&world, hero, "Regen"), 0);

    world.update().unwrap();
    assert_eq!(int(&world, hero, "Health"), 5);
    assert_eq!(int(&world, hero, "Regen"), 1);
}

const EVENT_LEVEL: &str = r#"{
    "GameObject Hero": {
        "int Fired": 0,
        "ActionListIf Actions": {
            "Name": "Once",
            "Condition": "<<< Fired == 0 >>>",
            "ActionEvent Then": [
                {"Name": "Slow", "Subtype": "ping", "Delay": 200, "int Code": 1},
                {"Name": "Fast", "Subtype": "ping", "Delay": 100, "int Code": 2}
            ],
            "ActionExpression Then": {"Name": "Mark", "Expression": "<<< Fired = 1 >>>"}
        },
        "ReactionAttributed Actions": {
            "Name": "Listener",
            "Subtype": "ping",
            "int Order": 0,
            "ActionExpression Actions": {"Name": "Record", "Expression": "<<< Order = Order * 10 + Code >>>"}
        },
        "ReactionAttributed Children": {
            "Name": "Deaf",
            "Subtype": "pong",
            "int Heard": 0,
            "ActionIncrement Actions": {"Name": "Hear", "Target": "Heard"}
        }
    }
}"#;

fn listener(world: &World) -> ScopeId {
    let hero = object(world, "Hero");
    let actions = world.arena().at(hero, "Actions").unwrap();
    actions.get_scope(1).unwrap()
}

#[test]
fn test_delayed_events_fire_in_order() {
    let mut world = world(EVENT_LEVEL);
    assert_eq!(world.bus().subscriber_count::<EventMessage>(), 2);

    world.update().unwrap();
    assert_eq!(world.queue().len(), 2);

    world.tick(Duration::from_millis(150)).unwrap();
    let listener = listener(&world);
    assert_eq!(int(&world, listener, "Order"), 2);
    assert_eq!(int(&world, listener, "Code"), 2);
    assert_eq!(world.queue().len(), 1);

    world.tick(Duration::from_millis(100)).unwrap();
    assert_eq!(int(&world, listener, "Order"), 21);
    assert!(world.arena().is_auxiliary_attribute(listener, "Code"));
    assert!(world.queue().is_empty());
}

#[test]
fn test_level_file_binds_reactions() {
    let path = std::env::temp_dir().join(format!("kula_events_{}.json", std::process::id()));
    std::fs::write(&path, EVENT_LEVEL).unwrap();

    let mut world = World::new().unwrap();
    let loaded = load_level_file(&mut world, &path);
    std::fs::remove_file(&path).unwrap();
    loaded.unwrap();

    assert_eq!(world.bus().subscriber_count::<EventMessage>(), 2);
    world.publish(EventMessage::new("ping").with_argument("Code", 3)).unwrap();
    assert_eq!(int(&world, listener(&world), "Order"), 3);
}

#[test]
fn test_due_together_still_ordered() {
    let mut world = world(EVENT_LEVEL);
    world.update().unwrap();
    world.tick(Duration::from_secs(1)).unwrap();
    assert_eq!(int(&world, listener(&world), "Order"), 21);
}

#[test]
fn test_reaction_ignores_other_subtypes() {
    let mut world = world(EVENT_LEVEL);
    let hero = object(&world, "Hero");
    let deaf = world.arena().at(hero, "Children").unwrap().get_scope(0).unwrap();

    world.publish(EventMessage::new("ping").with_argument("Code", 7)).unwrap();
    assert_eq!(int(&world, deaf, "Heard"), 0);
    assert_eq!(int(&world, listener(&world), "Order"), 7);

    world.publish(EventMessage::new("pong")).unwrap();
    assert_eq!(int(&world, deaf, "Heard"), 1);
}

#[test]
fn test_destroyed_reaction_unsubscribes() {
    let mut world = world(EVENT_LEVEL);
    let listener = listener(&world);
    world.arena_mut().destroy(listener).unwrap();

    assert_eq!(world.publish(EventMessage::new("ping")).unwrap(), 1);
    assert_eq!(world.bus().subscriber_count::<EventMessage>(), 1);
}

#[test]
fn test_create_and_destroy_are_deferred() {
    let mut world = world(
        r#"{
            "GameObject Spawner": {
                "int Count": 0,
                "ActionCreateAction Actions": {"Name": "Maker", "Prototype": "ActionIncrement", "InstanceName": "Counter"},
                "ActionDestroyAction Actions": {"Name": "Breaker", "ActionName": "Maker"}
            }
        }"#,
    );
    let spawner = object(&world, "Spawner");

    world.update().unwrap();
    assert_eq!(action_names(&world, spawner), vec!["Breaker", "Counter"]);
    assert!(world.pending_creates().is_empty());
    assert!(world.pending_destroys().is_empty());

    let counter = world.arena().at(spawner, "Actions").unwrap().get_scope(1).unwrap();
    assert!(world.arena().object_as::<ActionIncrement>(counter).is_some());
    assert_eq!(int(&world, spawner, "Count"), 0);
}

#[derive(Clone, Default)]
struct Doubler {
    factor: kula_data::Field<i32>,
}

impl Reflected for Doubler {
    const TYPE_NAME: &'static str = "Doubler";

    fn signatures() -> Vec<kula_data::Signature> {
        vec![kula_data::Signature::field("Factor", 1, |d: &Doubler| &d.factor)]
    }
}

fn double(world: &mut World, id: ScopeId) -> kula_gameplay::Result<()> {
    let datum = world.arena_mut().at_mut(id, "Factor")?;
    let value = datum.get_int(0)?;
    datum.set(0, value * 2)?;
    Ok(())
}

#[test]
fn test_custom_update() {
    let mut registry = kula_data::SignatureRegistry::new();
    kula_gameplay::register_gameplay_types(&mut registry).unwrap();
    registry.register::<Doubler>();

    let mut world = World::with_registry(std::sync::Arc::new(registry));
    load_level(
        &mut world,
        r#"{"GameObject Hero": {"Doubler Actions": {"Factor": 3}}}"#,
    )
    .unwrap();

    assert!(matches!(world.update(), Err(GameplayError::NoUpdateHandler(name)) if name == "Doubler"));

    world.register_update::<Doubler>(double);
    world.update().unwrap();
    let hero = object(&world, "Hero");
    let doubler = world.arena().at(hero, "Actions").unwrap().get_scope(0).unwrap();
    assert_eq!(int(&world, doubler, "Factor"), 6);
}

#[test]
fn test_json_snapshot() {
    let mut world = world(r#"{"GameObject Hero": {"int Score": 1}}"#);
    world.update().unwrap();
    let json = world.to_json().unwrap();
    assert_eq!(json["Hero"]["Score"], serde_json::json!(1));
}
