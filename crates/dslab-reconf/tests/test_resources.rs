use dslab_reconf::resources::{ResourceLedger, ResourceSpecification};
use dslab_reconf::{Configuration, SolveError};

fn configuration() -> Configuration {
    let mut cfg = Configuration::new();
    cfg.add_online("n1", &[("cpu", 10), ("mem", 8)]).unwrap();
    cfg.add_online("n2", &[("cpu", 6), ("mem", 8)]).unwrap();
    cfg.add_vm("vm1", Some("n1"), &[("cpu", 4), ("mem", 2)]).unwrap();
    cfg.add_vm("vm2", Some("n1"), &[("cpu", 4), ("mem", 2)]).unwrap();
    cfg.add_vm("vm3", Some("n2"), &[("cpu", 2), ("mem", 6)]).unwrap();
    cfg.add_vm("vm4", None, &[("cpu", 3), ("mem", 1)]).unwrap();
    cfg
}

#[test]
fn test_loads() {
    let cfg = configuration();
    let ledger = cfg.resources();
    assert_eq!(ledger.resource_types().collect::<Vec<_>>(), vec!["cpu", "mem"]);
    assert_eq!(ledger.load(&cfg, "cpu", "n1"), 8);
    assert_eq!(ledger.load(&cfg, "mem", "n2"), 6);
    assert!((ledger.total_load(&cfg, "cpu") - 10. / 16.).abs() < 1e-9);
    assert!(ledger.fits(&cfg, "n1"));
    assert!(ledger.overloaded_hosts(&cfg).is_empty());
}

#[test]
fn test_overloaded_hosts() {
    let mut cfg = configuration();
    cfg.set_host("vm4", "n1").unwrap();
    assert_eq!(cfg.resources().overloaded_hosts(&cfg), vec!["n1".to_string()]);

    cfg.set_paused("vm4", "n2").unwrap();
    assert_eq!(cfg.resources().load(&cfg, "cpu", "n2"), 5);
    cfg.set_sleeping("vm3", "n2").unwrap();
    assert_eq!(cfg.resources().load(&cfg, "cpu", "n2"), 3);
    assert!(cfg.resources().overloaded_hosts(&cfg).is_empty());
}

#[test]
fn test_max_vms_per_node() {
    let cfg = configuration();
    let ledger = cfg.resources();
    assert_eq!(ledger.max_vms_per_node("n1", "vm1"), 2);
    assert_eq!(ledger.max_vms_per_node("n2", "vm3"), 1);
    assert_eq!(ledger.max_vms_per_node("n1", "vm4"), 3);

    let mut ledger = ResourceLedger::new();
    let mut cpu = ResourceSpecification::new("cpu");
    cpu.set_capacity("n1", 8);
    cpu.set_usage("idle", 0);
    ledger.register(cpu);
    assert_eq!(ledger.max_vms_per_node("n1", "idle"), u64::MAX);
}

#[test]
fn test_missing_specification() {
    let mut cfg = configuration();
    assert!(cfg.resources().validate(&cfg).is_ok());

    cfg.add_vm("vm5", None, &[("cpu", 1)]).unwrap();
    assert_eq!(
        cfg.resources().validate(&cfg),
        Err(SolveError::MissingSpecification {
            resource: "mem".to_string(),
            element: "vm5".to_string(),
        })
    );
    cfg.set_usage("mem", "vm5", 1).unwrap();
    assert!(cfg.resources().validate(&cfg).is_ok());

    cfg.add_online("n3", &[("cpu", 4)]).unwrap();
    assert_eq!(
        cfg.resources().validate(&cfg),
        Err(SolveError::MissingSpecification {
            resource: "mem".to_string(),
            element: "n3".to_string(),
        })
    );

    cfg.set_capacity("mem", "n3", 4).unwrap();
    cfg.register_resource("disk");
    assert!(matches!(
        cfg.resources().validate(&cfg),
        Err(SolveError::MissingSpecification { resource, .. }) if resource == "disk"
    ));
}
