use std::time::Duration;

use rand::prelude::*;
use rand_pcg::Pcg64;

use dslab_reconf::config::EngineConfig;
use dslab_reconf::element::{NodeState, VmState};
use dslab_reconf::engine::SearchPass;
use dslab_reconf::objective::Objective;
use dslab_reconf::plan::{Action, ActionKind};
use dslab_reconf::rules::{rule_resolver, Ban, Fence, Gather, Offline, Run, Spread};
use dslab_reconf::{Configuration, ReconfigurationEngine, ReconfigurationRequest, SolveError};

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn plan_lines(plan: &dslab_reconf::plan::ActionGraph) -> Vec<String> {
    plan.iter().map(|action| action.to_string()).collect()
}

#[test]
fn test_run_waiting_vm() {
    let mut cfg = Configuration::new();
    cfg.add_online("n1", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm1", None, &[("cpu", 4)]).unwrap();

    let engine = ReconfigurationEngine::default();
    let request = ReconfigurationRequest::new(cfg).rule(Run::new(names(&["vm1"])));
    let result = engine.solve(&request).unwrap();
    let dst = result.destination.unwrap();
    assert_eq!(dst.vm_state("vm1"), Some(&VmState::Running("n1".to_string())));
    assert_eq!(plan_lines(&result.plan), vec!["run(vm1, n1)"]);
    assert!(!result.statistics.timed_out);
}

#[test]
fn test_overloaded_node_is_infeasible() {
    let mut cfg = Configuration::new();
    cfg.add_online("n1", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm1", Some("n1"), &[("cpu", 6)]).unwrap();
    cfg.add_vm("vm2", Some("n1"), &[("cpu", 6)]).unwrap();

    let engine = ReconfigurationEngine::default();
    let result = engine.solve(&ReconfigurationRequest::new(cfg)).unwrap();
    assert!(!result.is_feasible());
    assert!(result.plan.is_empty());
    assert!(!result.statistics.timed_out);
    assert_eq!(result.into_destination(), Err(SolveError::Infeasible));
}

#[test]
fn test_ban_migrates_vm() {
    let mut cfg = Configuration::new();
    cfg.add_online("a", &[("cpu", 10)]).unwrap();
    cfg.add_online("b", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm", Some("a"), &[("cpu", 4)]).unwrap();
    cfg.add_vm("vm2", Some("b"), &[("cpu", 4)]).unwrap();

    let engine = ReconfigurationEngine::default();
    let request = ReconfigurationRequest::new(cfg).rule(Ban::new(names(&["vm"]), names(&["a"])));
    let result = engine.solve(&request).unwrap();
    assert_eq!(
        result.plan.iter().cloned().collect::<Vec<_>>(),
        vec![Action::Migrate {
            vm: "vm".to_string(),
            from: "a".to_string(),
            to: "b".to_string()
        }]
    );
    // the source placement is almost kept, the cheap pass is enough
    assert_eq!(result.statistics.pass, Some(SearchPass::Find));
}

#[test]
fn test_many_waiting_vms_skip_find_pass() {
    let mut cfg = Configuration::new();
    cfg.add_online("n1", &[("cpu", 100)]).unwrap();
    let vms = (0..6).map(|i| format!("vm{}", i)).collect::<Vec<_>>();
    for vm in vms.iter() {
        cfg.add_vm(vm, None, &[("cpu", 1)]).unwrap();
    }
    let request = ReconfigurationRequest::new(cfg).rule(Run::new(vms));

    let result = ReconfigurationEngine::default().solve(&request).unwrap();
    assert_eq!(result.statistics.pass, Some(SearchPass::Prove));
    assert_eq!(result.plan.count(ActionKind::Run), 6);

    let config = EngineConfig {
        find_pass_max_waiting: 6,
        ..EngineConfig::default()
    };
    let result = ReconfigurationEngine::new(config).solve(&request).unwrap();
    assert_eq!(result.statistics.pass, Some(SearchPass::Find));
    assert_eq!(result.plan.count(ActionKind::Run), 6);
}

#[test]
fn test_offline_single_node_stops_vm() {
    let mut cfg = Configuration::new();
    cfg.add_online("a", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm", Some("a"), &[("cpu", 4)]).unwrap();

    let engine = ReconfigurationEngine::default();
    let request = ReconfigurationRequest::new(cfg).rule(Offline::new(names(&["a"])));
    let result = engine.solve(&request).unwrap();
    let dst = result.destination.as_ref().unwrap();
    assert_eq!(dst.vm_state("vm"), Some(&VmState::Waiting));
    assert_eq!(dst.node_state("a"), Some(NodeState::Offline));
    let lines = result.plan.actions().iter().map(|a| a.to_string()).collect::<Vec<_>>();
    assert_eq!(lines, vec!["0:1 stop(vm, a)", "1:2 shutdown(a)"]);
}

#[test]
fn test_offline_node_is_vacated() {
    let mut cfg = Configuration::new();
    cfg.add_online("a", &[("cpu", 10)]).unwrap();
    cfg.add_online("b", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm", Some("a"), &[("cpu", 4)]).unwrap();

    let engine = ReconfigurationEngine::default();
    let request = ReconfigurationRequest::new(cfg).rule(Offline::new(names(&["a"])));
    let result = engine.solve(&request).unwrap();
    let dst = result.destination.as_ref().unwrap();
    assert_eq!(dst.vm_state("vm"), Some(&VmState::Running("b".to_string())));
    assert_eq!(dst.node_state("b"), Some(NodeState::Online));
    let lines = result.plan.actions().iter().map(|a| a.to_string()).collect::<Vec<_>>();
    assert_eq!(lines, vec!["0:1 migrate(vm, a, b)", "1:2 shutdown(a)"]);
}

#[test]
fn test_frozen_vm_pins_node() {
    let mut cfg = Configuration::new();
    cfg.add_online("a", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm", Some("a"), &[("cpu", 4)]).unwrap();
    cfg.set_sleeping("vm", "a").unwrap();

    let engine = ReconfigurationEngine::default();
    let request = ReconfigurationRequest::new(cfg.clone()).rule(Offline::new(names(&["a"])));
    assert!(!engine.solve(&request).unwrap().is_feasible());

    let result = engine.solve(&ReconfigurationRequest::new(cfg.clone())).unwrap();
    assert_eq!(result.destination, Some(cfg));
    assert!(result.plan.is_empty());
}

#[test]
fn test_rules_on_frozen_vms() {
    let mut cfg = Configuration::new();
    cfg.add_online("a", &[("cpu", 10)]).unwrap();
    cfg.add_online("b", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm1", Some("a"), &[("cpu", 2)]).unwrap();
    cfg.set_sleeping("vm1", "a").unwrap();
    cfg.add_vm("vm2", Some("a"), &[("cpu", 2)]).unwrap();
    cfg.set_paused("vm2", "a").unwrap();
    cfg.add_vm("vm3", Some("b"), &[("cpu", 2)]).unwrap();
    let engine = ReconfigurationEngine::default();

    // frozen VMs keep their state, so these rules can not hold
    let infeasible = [
        ReconfigurationRequest::new(cfg.clone()).rule(Run::new(names(&["vm1"]))),
        ReconfigurationRequest::new(cfg.clone()).rule(Ban::new(names(&["vm2"]), names(&["a"]))),
        ReconfigurationRequest::new(cfg.clone()).rule(Fence::new(names(&["vm2"]), names(&["b"]))),
    ];
    for request in infeasible.iter() {
        let result = engine.solve(request).unwrap();
        assert!(!result.is_feasible(), "{} is satisfied", request.rules()[0].name());
        assert!(!result.statistics.timed_out);
        assert_eq!(result.into_destination(), Err(SolveError::Infeasible));
    }

    // a sleeping VM does not run on its host
    let request = ReconfigurationRequest::new(cfg.clone()).rule(Ban::new(names(&["vm1"]), names(&["a"])));
    let result = engine.solve(&request).unwrap();
    assert_eq!(result.destination, Some(cfg.clone()));

    // the paused VM fixes the host of the group
    let request = ReconfigurationRequest::new(cfg).rule(Gather::new(names(&["vm2", "vm3"])));
    let result = engine.solve(&request).unwrap();
    let dst = result.destination.as_ref().unwrap();
    assert_eq!(dst.vm_state("vm2"), Some(&VmState::Paused("a".to_string())));
    assert_eq!(dst.vm_state("vm3"), Some(&VmState::Running("a".to_string())));
    assert!(request.rules()[0].is_satisfied(dst));
    assert_eq!(plan_lines(&result.plan), vec!["migrate(vm3, b, a)"]);
}

#[test]
fn test_spread_and_gather() {
    let mut cfg = Configuration::new();
    for node in ["n1", "n2", "n3"] {
        cfg.add_online(node, &[("cpu", 10)]).unwrap();
    }
    cfg.add_vm("vm1", Some("n1"), &[("cpu", 2)]).unwrap();
    cfg.add_vm("vm2", Some("n1"), &[("cpu", 2)]).unwrap();
    cfg.add_vm("vm3", Some("n2"), &[("cpu", 2)]).unwrap();
    let engine = ReconfigurationEngine::default();

    let spread = Spread::new(names(&["vm1", "vm2"]));
    let request = ReconfigurationRequest::new(cfg.clone()).rule(spread);
    let result = engine.solve(&request).unwrap();
    let dst = result.destination.unwrap();
    assert_ne!(dst.vm_state("vm1"), dst.vm_state("vm2"));
    assert!(request.rules()[0].is_satisfied(&dst));
    assert_eq!(result.plan.count(ActionKind::Migrate), 1);

    let request = ReconfigurationRequest::new(cfg).rule(Gather::new(names(&["vm1", "vm3"])));
    let result = engine.solve(&request).unwrap();
    let dst = result.destination.unwrap();
    assert_eq!(dst.vm_state("vm1"), dst.vm_state("vm3"));
    assert_eq!(result.plan.count(ActionKind::Migrate), 1);
}

#[test]
fn test_rules_from_config_strings() {
    let mut cfg = Configuration::new();
    for node in ["n1", "n2", "n3"] {
        cfg.add_online(node, &[("cpu", 8)]).unwrap();
    }
    cfg.add_vm("vm1", Some("n1"), &[("cpu", 4)]).unwrap();
    cfg.add_vm("vm2", Some("n2"), &[("cpu", 4)]).unwrap();
    cfg.add_vm("vm3", None, &[("cpu", 4)]).unwrap();

    let request = ReconfigurationRequest::new(cfg)
        .rule_boxed(rule_resolver("Fence[vms=vm1;vm3,hosts=n2;n3]").unwrap())
        .rule_boxed(rule_resolver("Run[vms=vm3]").unwrap())
        .rule_boxed(rule_resolver("MaxOnline[nodes=n1;n2;n3,max=2]").unwrap());
    let result = ReconfigurationEngine::default().solve(&request).unwrap();
    let dst = result.destination.unwrap();
    for rule in request.rules() {
        assert!(rule.is_satisfied(&dst), "{} is not satisfied", rule.name());
    }
    assert_eq!(dst.online_nodes().count(), 2);
    assert_eq!(dst.node_state("n1"), Some(NodeState::Offline));
    assert_eq!(result.plan.count(ActionKind::Shutdown), 1);
    assert!(dst.resources().overloaded_hosts(&dst).is_empty());
}

#[test]
fn test_tags_and_externs() {
    let mut cfg = Configuration::new();
    cfg.add_online("n1", &[("cpu", 4)]).unwrap();
    cfg.add_online("n2", &[("cpu", 8)]).unwrap();
    cfg.add_extern("cloud", &[("cpu", 100)]).unwrap();
    cfg.tag_host("n2", "gpu").unwrap();
    cfg.add_vm("vm1", Some("n1"), &[("cpu", 4)]).unwrap();
    cfg.add_vm("vm2", None, &[("cpu", 4)]).unwrap();
    cfg.add_vm("vm3", None, &[("cpu", 6)]).unwrap();
    cfg.require_tag("vm3", "gpu").unwrap();

    let request = ReconfigurationRequest::new(cfg).rule(Run::new(names(&["vm2", "vm3"])));
    let result = ReconfigurationEngine::default().solve(&request).unwrap();
    let dst = result.destination.unwrap();
    assert_eq!(dst.vm_state("vm1"), Some(&VmState::Running("n1".to_string())));
    assert_eq!(dst.vm_state("vm2"), Some(&VmState::Running("cloud".to_string())));
    assert_eq!(dst.vm_state("vm3"), Some(&VmState::Running("n2".to_string())));
    assert_eq!(result.plan.count(ActionKind::Run), 2);
}

#[test]
fn test_migration_target() {
    let mut cfg = Configuration::new();
    cfg.add_online("n1", &[("cpu", 4)]).unwrap();
    cfg.add_offline("n2", &[("cpu", 4)]).unwrap();
    cfg.add_vm("vm1", Some("n1"), &[("cpu", 4)]).unwrap();
    cfg.set_online("n2").unwrap();
    cfg.set_migration_target("vm1", Some("n2")).unwrap();

    let result = ReconfigurationEngine::default()
        .solve(&ReconfigurationRequest::new(cfg))
        .unwrap();
    let dst = result.destination.unwrap();
    assert_eq!(dst.vm_state("vm1"), Some(&VmState::Running("n2".to_string())));
    assert_eq!(dst.migration_target("vm1"), None);
    assert_eq!(plan_lines(&result.plan), vec!["migrate(vm1, n1, n2)"]);
}

#[test]
fn test_allow_stop() {
    let mut cfg = Configuration::new();
    cfg.add_online("n1", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm1", Some("n1"), &[("cpu", 6)]).unwrap();
    cfg.add_vm("vm2", Some("n1"), &[("cpu", 6)]).unwrap();

    let request = ReconfigurationRequest::new(cfg).allow_stop("vm2");
    let result = ReconfigurationEngine::default().solve(&request).unwrap();
    let dst = result.destination.unwrap();
    assert_eq!(dst.vm_state("vm2"), Some(&VmState::Waiting));
    assert_eq!(plan_lines(&result.plan), vec!["stop(vm2, n1)"]);
}

#[test]
fn test_minimize_migrations() {
    let mut cfg = Configuration::new();
    cfg.add_online("n1", &[("cpu", 10)]).unwrap();
    cfg.add_online("n2", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm1", Some("n1"), &[("cpu", 6)]).unwrap();
    cfg.add_vm("vm2", Some("n1"), &[("cpu", 6)]).unwrap();
    cfg.add_vm("vm3", Some("n2"), &[("cpu", 2)]).unwrap();

    let request = ReconfigurationRequest::new(cfg).objective(Objective::MinimizeMigrations { weight: 1 });
    let result = ReconfigurationEngine::default().solve(&request).unwrap();
    assert!(result.is_feasible());
    assert_eq!(result.statistics.objective, Some(1));
    assert_eq!(result.plan.count(ActionKind::Migrate), 1);
    assert_eq!(result.plan.len(), 1);
}

#[test]
fn test_minimize_online_nodes() {
    let mut cfg = Configuration::new();
    for (node, vm) in [("n1", "vm1"), ("n2", "vm2"), ("n3", "vm3")] {
        cfg.add_online(node, &[("cpu", 10)]).unwrap();
        cfg.add_vm(vm, Some(node), &[("cpu", 3)]).unwrap();
    }

    let request = ReconfigurationRequest::new(cfg).objective(Objective::MinimizeOnlineNodes { weight: 1 });
    let result = ReconfigurationEngine::default().solve(&request).unwrap();
    assert_eq!(result.statistics.objective, Some(1));
    assert!(!result.statistics.timed_out);
    let dst = result.destination.as_ref().unwrap();
    assert_eq!(dst.online_nodes().count(), 1);
    assert_eq!(result.plan.count(ActionKind::Migrate), 2);
    assert_eq!(result.plan.count(ActionKind::Shutdown), 2);
    let last_migration = (0..result.plan.len())
        .filter(|&i| result.plan.actions()[i].action.kind() == ActionKind::Migrate)
        .max()
        .unwrap();
    let first_shutdown = (0..result.plan.len())
        .find(|&i| result.plan.actions()[i].action.kind() == ActionKind::Shutdown)
        .unwrap();
    assert!(last_migration < first_shutdown);
}

#[test]
fn test_timeout() {
    let mut cfg = Configuration::new();
    for i in 0..11 {
        cfg.add_online(&format!("n{}", i), &[("cpu", 100)]).unwrap();
    }
    let mut vms = Vec::new();
    for i in 0..12 {
        let vm = format!("vm{}", i);
        cfg.add_vm(&vm, Some(&format!("n{}", i % 11)), &[("cpu", 1)]).unwrap();
        vms.push(vm);
    }

    let request = ReconfigurationRequest::new(cfg)
        .rule(Spread::new(vms))
        .time_limit(Duration::from_millis(50));
    let result = ReconfigurationEngine::default().solve(&request).unwrap();
    assert!(!result.is_feasible());
    assert!(result.statistics.timed_out);
    assert_eq!(result.into_destination(), Err(SolveError::Timeout));
}

#[test]
fn test_invalid_inputs() {
    let mut cfg = Configuration::new();
    cfg.add_online("n1", &[("cpu", 10)]).unwrap();
    cfg.add_vm("vm1", Some("n1"), &[("cpu", 1)]).unwrap();
    let engine = ReconfigurationEngine::default();

    let request = ReconfigurationRequest::new(cfg.clone()).rule(Ban::new(names(&["vm9"]), names(&["n1"])));
    assert_eq!(
        engine.solve(&request).err(),
        Some(SolveError::UnknownElement("vm9".to_string()))
    );

    let mut missing = cfg;
    missing.register_resource("mem");
    assert_eq!(
        engine.solve(&ReconfigurationRequest::new(missing)).err(),
        Some(SolveError::MissingSpecification {
            resource: "mem".to_string(),
            element: "n1".to_string(),
        })
    );
}

#[test]
fn test_engine_config_from_file() {
    let config = EngineConfig::from_file(&name_wrapper("engine.yaml")).unwrap();
    assert_eq!(config.time_limit, Some(Duration::from_secs(5)));
    assert_eq!(config.find_pass_max_waiting, 3);
    assert_eq!(config.sort_resource.as_deref(), Some("mem"));
    assert_eq!(config.objective, Some(Objective::MinimizeMigrations { weight: 2 }));

    let mut cfg = Configuration::new();
    cfg.add_online("a", &[("cpu", 10), ("mem", 10)]).unwrap();
    cfg.add_online("b", &[("cpu", 10), ("mem", 10)]).unwrap();
    cfg.add_vm("vm", Some("a"), &[("cpu", 4), ("mem", 4)]).unwrap();
    let request = ReconfigurationRequest::new(cfg).rule(Ban::new(names(&["vm"]), names(&["a"])));
    let result = ReconfigurationEngine::new(config).solve(&request).unwrap();
    let lines = result.plan.actions().iter().map(|a| a.to_string()).collect::<Vec<_>>();
    assert_eq!(lines, vec!["0:3 migrate(vm, a, b)"]);
    assert_eq!(result.statistics.objective, Some(2));
}

////////////////////////////////////////////////////////////////////////////////

fn random_configuration(rng: &mut Pcg64) -> Configuration {
    let mut cfg = Configuration::new();
    let node_count = rng.gen_range(2..6);
    let nodes = (0..node_count).map(|i| format!("n{}", i)).collect::<Vec<_>>();
    let mut free = Vec::new();
    for node in nodes.iter() {
        let cpu = rng.gen_range(8..16);
        let mem = rng.gen_range(8..32);
        cfg.add_online(node, &[("cpu", cpu), ("mem", mem)]).unwrap();
        free.push((cpu, mem));
    }
    for i in 0..rng.gen_range(3..10) {
        let cpu = rng.gen_range(1..5);
        let mem = rng.gen_range(1..8);
        let n = rng.gen_range(0..node_count);
        let host = if rng.gen_bool(0.8) && free[n].0 >= cpu && free[n].1 >= mem {
            free[n] = (free[n].0 - cpu, free[n].1 - mem);
            Some(nodes[n].as_str())
        } else {
            None
        };
        cfg.add_vm(&format!("vm{}", i), host, &[("cpu", cpu), ("mem", mem)]).unwrap();
    }
    cfg
}

#[test]
fn test_random_configurations() {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = ReconfigurationEngine::default();
    let mut rng = Pcg64::seed_from_u64(123);
    let mut solved = 0;
    for _ in 0..30 {
        let cfg = random_configuration(&mut rng);
        let vms = cfg.vms().map(|vm| vm.to_string()).collect::<Vec<_>>();
        let nodes = cfg.nodes().map(|node| node.to_string()).collect::<Vec<_>>();
        let banned_vm = vms[rng.gen_range(0..vms.len())].clone();
        let banned_node = nodes[rng.gen_range(0..nodes.len())].clone();
        let mut request = ReconfigurationRequest::new(cfg.clone())
            .rule(Ban::new(vec![banned_vm], vec![banned_node]))
            .time_limit(Duration::from_secs(1));
        if rng.gen_bool(0.5) {
            request = request.rule(Offline::new(vec![nodes[0].clone()]));
        }
        if rng.gen_bool(0.5) {
            let waiting = cfg.waiting_vms().map(|vm| vm.to_string()).collect::<Vec<_>>();
            request = request.rule(Run::new(waiting));
        }

        let result = engine.solve(&request).unwrap();
        if result.statistics.timed_out {
            continue;
        }
        let Some(dst) = result.destination.as_ref() else {
            continue;
        };
        solved += 1;
        assert!(dst.check_invariants().is_ok());
        assert!(dst.same_elements(&cfg));
        assert!(dst.resources().overloaded_hosts(dst).is_empty());
        for rule in request.rules() {
            assert!(rule.is_satisfied(dst), "{} is not satisfied", rule.name());
        }

        let moved = cfg
            .vms()
            .filter(|vm| match (cfg.vm_state(vm), dst.vm_state(vm)) {
                (Some(VmState::Running(a)), Some(VmState::Running(b))) => a != b,
                _ => false,
            })
            .count();
        assert_eq!(result.plan.count(ActionKind::Migrate), moved);

        for (pos, planned) in result.plan.actions().iter().enumerate() {
            if let Action::Shutdown { node } = &planned.action {
                for (other, departure) in result.plan.actions().iter().enumerate() {
                    let leaves_node = match &departure.action {
                        Action::Stop { host, .. } => host == node,
                        Action::Migrate { from, .. } => from == node,
                        _ => false,
                    };
                    if leaves_node {
                        assert!(other < pos);
                        assert!(departure.end <= planned.start);
                    }
                }
            }
        }
    }
    assert!(solved > 0);
}
