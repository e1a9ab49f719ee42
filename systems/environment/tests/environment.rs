use std::collections::VecDeque;

use blocks_world_core::{Action, Block, Event, PlanUpdate, StationLabel};
use blocks_world_system_environment::{
    Agent, Environment, FirstComeFirstServed, Perception, ProtocolError, ScriptedAgent,
};
use blocks_world_world::{query, World};

fn block(label: char) -> Block {
    Block::new(label)
}

fn station(label: char) -> StationLabel {
    StationLabel::new(label)
}

fn world(text: &str) -> World {
    World::parse(text).expect("fixture parses")
}

fn environment(text: &str) -> Environment {
    Environment::new(world(text)).expect("stations fit")
}

fn scripted(name: &str, script: Vec<Action>) -> Box<dyn Agent> {
    Box::new(ScriptedAgent::new(name, script))
}

fn assert_stations_match_stacks(environment: &Environment) {
    let stacks = environment.world().stacks();
    assert_eq!(environment.stations().len(), stacks.len());
    for stack in stacks {
        let label = environment
            .stations()
            .label_of(stack.id())
            .expect("every stack has a station");
        assert_eq!(environment.stations().stack_of(label), Some(stack.id()));
    }
}

/// Answers with queued plan updates, then keeps its plan.
struct Replay {
    updates: VecDeque<PlanUpdate>,
}

impl Replay {
    fn boxed(updates: Vec<PlanUpdate>) -> Box<dyn Agent> {
        Box::new(Self {
            updates: updates.into(),
        })
    }
}

impl Agent for Replay {
    fn name(&self) -> &str {
        "*R"
    }

    fn respond(&mut self, _perception: &Perception) -> PlanUpdate {
        self.updates.pop_front().unwrap_or(PlanUpdate::ContinuePlan)
    }
}

#[test]
fn illegal_ordering_flags_failure_without_aborting() {
    let mut environment = environment("A.\nBC\n");
    let goal = world("A\nB\nC\n");
    let agent = environment.add_agent(
        scripted(
            "*A",
            vec![
                Action::Unstack {
                    block: block('A'),
                    from: block('B'),
                },
                Action::PutDown { block: block('A') },
                Action::PickUp { block: block('B') },
            ],
        ),
        goal,
        None,
    );

    for _ in 0..3 {
        assert!(!environment.step().expect("protocol holds"));
    }
    let data = environment.agent(agent).expect("agent joined");
    assert_eq!(data.station(), Some(station('2')));
    assert_eq!(data.holding(), None);

    let mut events = Vec::new();
    assert!(!environment
        .step_with_events(&mut events)
        .expect("legality failures are not fatal"));

    let data = environment.agent(agent).expect("agent joined");
    assert!(!data.previous_action_succeeded());
    assert_eq!(
        data.plan().current_action(),
        Action::PickUp { block: block('B') }
    );
    assert!(events.contains(&Event::ActionFailed {
        agent,
        action: Action::PickUp { block: block('B') },
    }));
    assert_stations_match_stacks(&environment);
}

#[test]
fn go_to_missing_station_fails_without_moving() {
    let mut environment = environment("ABC\n");
    let agent = environment.add_agent(
        scripted(
            "*A",
            vec![
                Action::GoToStation {
                    station: station('2'),
                },
                Action::GoToStation {
                    station: station('9'),
                },
            ],
        ),
        world("ABC\n"),
        None,
    );

    assert_eq!(environment.step(), Ok(false));
    assert_eq!(environment.step(), Ok(false));
    let data = environment.agent(agent).expect("agent joined");
    assert_eq!(data.station(), Some(station('2')));
    assert!(data.previous_action_succeeded());

    let mut events = Vec::new();
    assert_eq!(environment.step_with_events(&mut events), Ok(false));

    let data = environment.agent(agent).expect("agent joined");
    assert_eq!(data.station(), Some(station('2')));
    assert!(!data.previous_action_succeeded());
    assert_eq!(
        data.plan().current_action(),
        Action::GoToStation {
            station: station('9')
        }
    );
    assert!(events.contains(&Event::ActionFailed {
        agent,
        action: Action::GoToStation {
            station: station('9')
        },
    }));
}

#[test]
fn unstack_from_a_block_not_directly_beneath_fails() {
    let mut environment = environment("A\nB\nC\n");
    let unstack = Action::Unstack {
        block: block('A'),
        from: block('C'),
    };
    let agent = environment.add_agent(scripted("*A", vec![unstack]), world("A\nB\nC\n"), None);

    assert_eq!(environment.step(), Ok(false));
    let mut events = Vec::new();
    assert_eq!(environment.step_with_events(&mut events), Ok(false));

    let data = environment.agent(agent).expect("agent joined");
    assert!(!data.previous_action_succeeded());
    assert_eq!(data.holding(), None);
    assert_eq!(data.plan().current_action(), unstack);
    assert!(events.contains(&Event::ActionFailed {
        agent,
        action: unstack
    }));
    assert_eq!(
        query::partition(environment.world()),
        query::partition(&world("A\nB\nC\n"))
    );
}

#[test]
fn stack_onto_a_covered_block_fails() {
    let mut environment = environment("A.\nB.\nCD\n");
    let stack = Action::Stack {
        block: block('D'),
        onto: block('B'),
    };
    let agent = environment.add_agent(
        scripted(
            "*A",
            vec![
                Action::GoToStation {
                    station: station('1'),
                },
                Action::PickUp { block: block('D') },
                stack,
            ],
        ),
        world("D\nA\nB\nC\n"),
        None,
    );

    for _ in 0..3 {
        assert_eq!(environment.step(), Ok(false));
    }
    let data = environment.agent(agent).expect("agent joined");
    assert_eq!(data.station(), Some(station('0')));
    assert_eq!(data.holding(), Some(block('D')));

    let mut events = Vec::new();
    assert_eq!(environment.step_with_events(&mut events), Ok(false));

    let data = environment.agent(agent).expect("agent joined");
    assert!(!data.previous_action_succeeded());
    assert_eq!(data.holding(), Some(block('D')));
    assert_eq!(data.plan().current_action(), stack);
    assert!(events.contains(&Event::ActionFailed {
        agent,
        action: stack
    }));
    assert!(!environment.world().contains(block('D')));
}

#[test]
fn corrected_plan_reaches_the_goal() {
    let mut environment = environment("A.\nBC\n");
    let goal = world("A\nB\nC\n");
    let _ = environment.add_agent(
        scripted(
            "*A",
            vec![
                Action::Unstack {
                    block: block('A'),
                    from: block('B'),
                },
                Action::PutDown { block: block('A') },
                Action::NextStation,
                Action::PickUp { block: block('B') },
                Action::Stack {
                    block: block('B'),
                    onto: block('C'),
                },
                Action::NextStation,
                Action::PickUp { block: block('A') },
                Action::Stack {
                    block: block('A'),
                    onto: block('B'),
                },
            ],
        ),
        goal.clone(),
        None,
    );

    let mut finished_after = None;
    for cycle in 1..=20 {
        let finished = environment.step().expect("protocol holds");
        assert_stations_match_stacks(&environment);
        if finished {
            finished_after = Some(cycle);
            break;
        }
    }

    assert_eq!(finished_after, Some(10));
    assert_eq!(
        query::partition(environment.world()),
        query::partition(&goal)
    );
    assert!(environment
        .agents()
        .iter()
        .all(|data| data.previous_action_succeeded()));
}

#[test]
fn pick_up_while_holding_is_fatal() {
    let mut environment = environment("A.\nBC\n");
    let _ = environment.add_agent(
        scripted(
            "*A",
            vec![
                Action::Unstack {
                    block: block('A'),
                    from: block('B'),
                },
                Action::PickUp { block: block('B') },
            ],
        ),
        world("A\nB\nC\n"),
        None,
    );

    assert_eq!(environment.step(), Ok(false));
    assert_eq!(environment.step(), Ok(false));
    assert!(matches!(
        environment.step(),
        Err(ProtocolError::AlreadyHolding { holding, .. }) if holding == block('A')
    ));
}

#[test]
fn put_down_without_holding_is_fatal() {
    let mut environment = environment("AB\n");
    let _ = environment.add_agent(
        scripted("*A", vec![Action::PutDown { block: block('A') }]),
        world("AB\n"),
        None,
    );

    assert_eq!(environment.step(), Ok(false));
    assert!(matches!(
        environment.step(),
        Err(ProtocolError::HoldingMismatch { holding: None, .. })
    ));
}

#[test]
fn next_station_cycles_back_to_start() {
    let mut environment = environment("ABC\n");
    let agent = environment.add_agent(
        scripted(
            "*A",
            vec![Action::NextStation, Action::NextStation, Action::NextStation],
        ),
        world("ABC\n"),
        None,
    );

    let mut visited = Vec::new();
    for _ in 0..4 {
        let _ = environment.step().expect("protocol holds");
        visited.push(environment.agent(agent).and_then(|data| data.station()));
    }

    assert_eq!(
        visited,
        vec![
            Some(station('0')),
            Some(station('1')),
            Some(station('2')),
            Some(station('0'))
        ]
    );
}

#[test]
fn pick_up_relocates_every_observer_and_removes_the_station() {
    let mut environment = environment("AB\n");
    let actor = environment.add_agent(
        scripted("*A", vec![Action::PickUp { block: block('A') }]),
        world("AB\n"),
        None,
    );
    let bystander = environment.add_agent(scripted("*B", Vec::new()), world("AB\n"), None);

    let _ = environment.step().expect("protocol holds");
    let mut events = Vec::new();
    let _ = environment
        .step_with_events(&mut events)
        .expect("protocol holds");

    for id in [actor, bystander] {
        assert_eq!(
            environment.agent(id).and_then(|data| data.station()),
            Some(station('1'))
        );
    }
    assert_eq!(
        environment.agent(actor).and_then(|data| data.holding()),
        Some(block('A'))
    );
    assert!(!environment.stations().contains(station('0')));
    assert!(events.iter().any(|event| matches!(
        event,
        Event::StationRemoved { station: s, .. } if *s == station('0')
    )));
    assert_stations_match_stacks(&environment);
}

#[test]
fn picking_up_the_last_stack_leaves_the_agent_without_station() {
    let mut environment = environment("A\n");
    let agent = environment.add_agent(
        scripted(
            "*A",
            vec![
                Action::PickUp { block: block('A') },
                Action::NextStation,
                Action::PutDown { block: block('A') },
            ],
        ),
        world("A\n"),
        None,
    );

    let _ = environment.step().expect("protocol holds");
    let _ = environment.step().expect("protocol holds");
    assert_eq!(environment.agent(agent).and_then(|data| data.station()), None);
    assert!(environment.world().stacks().is_empty());

    let _ = environment.step().expect("protocol holds");
    assert_eq!(environment.agent(agent).and_then(|data| data.station()), None);

    let _ = environment.step().expect("protocol holds");
    assert_eq!(
        environment.agent(agent).and_then(|data| data.station()),
        Some(station('0'))
    );
    assert_stations_match_stacks(&environment);
}

#[test]
fn lock_requires_the_block_beneath_to_be_locked() {
    let mut environment = environment("A\nB\n");
    let agent = environment.add_agent(
        scripted("*A", vec![Action::Lock { block: block('A') }]),
        world("A\nB\n"),
        None,
    );

    let _ = environment.step().expect("protocol holds");
    let _ = environment.step().expect("protocol holds");
    assert!(!environment
        .agent(agent)
        .expect("agent joined")
        .previous_action_succeeded());
    assert!(!environment.world().stacks()[0].is_locked(block('A')));
}

#[test]
fn locked_blocks_never_move_again() {
    let mut environment = environment("A\nB\n");
    let agent = environment.add_agent(
        scripted(
            "*A",
            vec![
                Action::Lock { block: block('B') },
                Action::Lock { block: block('A') },
                Action::Unstack {
                    block: block('A'),
                    from: block('B'),
                },
            ],
        ),
        world("A\nB\n"),
        None,
    );

    for _ in 0..3 {
        let _ = environment.step().expect("protocol holds");
        assert!(environment
            .agent(agent)
            .expect("agent joined")
            .previous_action_succeeded());
    }
    let _ = environment.step().expect("protocol holds");
    assert!(!environment
        .agent(agent)
        .expect("agent joined")
        .previous_action_succeeded());
    let stack = &environment.world().stacks()[0];
    assert!(stack.is_locked(block('A')) && stack.is_locked(block('B')));
}

#[test]
fn modify_plan_never_removes_the_last_action() {
    let mut environment = environment("AB\n");
    let agent = environment.add_agent(
        Replay::boxed(vec![
            PlanUpdate::NewPlan {
                actions: vec![Action::Idle],
            },
            PlanUpdate::ModifyPlan {
                actions: vec![Action::NextStation],
                remove: 1,
            },
        ]),
        world("AB\n"),
        None,
    );

    let _ = environment.step().expect("protocol holds");
    assert_eq!(
        environment.agent(agent).expect("agent joined").plan().to_vec(),
        vec![Action::Idle]
    );

    let _ = environment.step().expect("protocol holds");
    let data = environment.agent(agent).expect("agent joined");
    assert_eq!(data.station(), Some(station('1')));
    assert_eq!(data.plan().to_vec(), vec![Action::Marker, Action::Idle]);
}

#[test]
fn cancel_plan_idles_the_agent() {
    let mut environment = environment("AB\n");
    let agent = environment.add_agent(
        Replay::boxed(vec![
            PlanUpdate::NewPlan {
                actions: vec![Action::NextStation],
            },
            PlanUpdate::CancelPlan,
        ]),
        world("AB\n"),
        None,
    );

    let _ = environment.step().expect("protocol holds");
    let mut events = Vec::new();
    let _ = environment
        .step_with_events(&mut events)
        .expect("protocol holds");

    let data = environment.agent(agent).expect("agent joined");
    assert_eq!(data.station(), Some(station('0')));
    assert!(data.plan().is_empty());
    assert!(events.contains(&Event::ActionPerformed {
        agent,
        action: Action::Idle
    }));
}

#[test]
fn competing_agents_fail_under_pass_through() {
    let mut environment = environment("A\nB\n");
    let unstack = Action::Unstack {
        block: block('A'),
        from: block('B'),
    };
    let first = environment.add_agent(scripted("*A", vec![unstack]), world("A\nB\n"), None);
    let second = environment.add_agent(scripted("*B", vec![unstack]), world("A\nB\n"), None);

    let _ = environment.step().expect("protocol holds");
    let mut events = Vec::new();
    let _ = environment
        .step_with_events(&mut events)
        .expect("protocol holds");

    assert!(events.contains(&Event::ActionPerformed {
        agent: first,
        action: unstack
    }));
    assert!(events.contains(&Event::ActionFailed {
        agent: second,
        action: unstack
    }));
}

#[test]
fn first_come_first_served_defers_conflicting_agents() {
    let mut environment = Environment::new(world("A\nB\n"))
        .expect("stations fit")
        .with_conflict_policy(Box::new(FirstComeFirstServed));
    let unstack = Action::Unstack {
        block: block('A'),
        from: block('B'),
    };
    let first = environment.add_agent(scripted("*A", vec![unstack]), world("A\nB\n"), None);
    let second = environment.add_agent(scripted("*B", vec![unstack]), world("A\nB\n"), None);

    let _ = environment.step().expect("protocol holds");
    let mut events = Vec::new();
    let _ = environment
        .step_with_events(&mut events)
        .expect("protocol holds");

    assert!(events.contains(&Event::ActionPerformed {
        agent: first,
        action: unstack
    }));
    assert!(events.contains(&Event::ActionDeferred {
        agent: second,
        action: unstack
    }));
    let data = environment.agent(second).expect("agent joined");
    assert!(!data.previous_action_succeeded());
    assert_eq!(data.plan().current_action(), unstack);
}

#[test]
fn run_completes_only_when_every_agent_completes() {
    let mut environment = environment("AB\n");
    let _ = environment.add_agent(scripted("*A", Vec::new()), world("AB\n"), None);
    let _ = environment.add_agent(
        scripted("*B", vec![Action::NextStation]),
        world("AB\n"),
        None,
    );

    assert_eq!(environment.step(), Ok(false));
    assert_eq!(environment.step(), Ok(false));

    let mut events = Vec::new();
    assert_eq!(environment.step_with_events(&mut events), Ok(true));
    assert_eq!(events.last(), Some(&Event::AllAgentsCompleted));
    assert_eq!(environment.cycle(), 3);
}

#[test]
fn placement_falls_back_to_first_station() {
    let mut environment = environment("ABC\n");
    let placed = environment.add_agent(
        scripted("*A", Vec::new()),
        world("ABC\n"),
        Some(station('2')),
    );
    let unknown = environment.add_agent(
        scripted("*B", Vec::new()),
        world("ABC\n"),
        Some(station('7')),
    );

    assert_eq!(
        environment.agent(placed).and_then(|data| data.station()),
        Some(station('2'))
    );
    assert_eq!(
        environment.agent(unknown).and_then(|data| data.station()),
        Some(station('0'))
    );
}

#[test]
fn rendering_shows_agents_stations_and_plans() {
    let mut environment = environment("A.\nBC\n");
    let _ = environment.add_agent(scripted("*A", vec![Action::NextStation]), world("ABC\n"), None);
    let _ = environment.step().expect("protocol holds");

    let rendered = environment.to_string();
    assert!(rendered.contains(" *A"));
    assert!(rendered.contains(" #0"));
    assert!(rendered.contains(" #1"));
    assert!(rendered.contains("[A]"));
    assert!(rendered.contains("Agent *A at #0 holds: nothing; prev action: OK; plan (2)"));
}
