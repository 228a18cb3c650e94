use super::{DefaultOptions, OptionError, OptionResolver, OptionSet, OptionValue};

fn resolver() -> OptionResolver {
    OptionResolver::new(&DefaultOptions::new("eth0"))
}

#[test]
pub fn empty_overrides_return_defaults() {
    let resolver = resolver();
    let resolved = resolver.resolve("").unwrap();

    assert_eq!(&resolved.known, resolver.defaults());
    assert!(resolved.unknown.is_empty());
    assert_eq!(resolved.get("map-by"), Some(&OptionValue::text("slot")));
    assert_eq!(resolved.get("NCCL_SOCKET_IFNAME"), Some(&OptionValue::text("eth0")));
    assert_eq!(resolved.get("tag-output"), Some(&OptionValue::Absent));

    let whitespace = resolver.resolve("  \t \n").unwrap();
    assert_eq!(whitespace, resolved);
}

#[test]
pub fn known_and_unknown_are_split() {
    let resolved = resolver().resolve("--map-by node --bogus-flag").unwrap();

    assert_eq!(resolved.get("map-by"), Some(&OptionValue::text("node")));
    assert_eq!(resolved.get("bind-to"), Some(&OptionValue::text("none")));
    assert_eq!(resolved.unknown, vec!["--bogus-flag".to_owned()]);
    assert!(resolved.get("bogus-flag").is_none());
}

#[test]
pub fn unknown_tokens_keep_their_order() {
    let resolved = resolver()
        .resolve("-x FOO --bogus 3 --NCCL_DEBUG WARN --other=1 stray")
        .unwrap();

    assert_eq!(
        resolved.unknown,
        vec!["-x", "FOO", "--bogus", "3", "--other=1", "stray"]
    );
    assert_eq!(resolved.unknown_args(), "-x FOO --bogus 3 --other=1 stray");
    assert_eq!(resolved.get("NCCL_DEBUG"), Some(&OptionValue::text("WARN")));
}

#[test]
pub fn last_override_wins() {
    let resolved = resolver()
        .resolve("--map-by node --NCCL_MIN_RINGS 8 --map-by=socket --NCCL_MIN_RINGS 2")
        .unwrap();

    assert_eq!(resolved.get("map-by"), Some(&OptionValue::text("socket")));
    assert_eq!(resolved.get("NCCL_MIN_RINGS"), Some(&OptionValue::Integer(2)));
    assert!(resolved.unknown.is_empty());
}

#[test]
pub fn integers_are_coerced() {
    let resolved = resolver()
        .resolve("--FI_EFA_USE_DEVICE_RDMA 0 --NCCL_MIN_RINGS -3")
        .unwrap();

    assert_eq!(
        resolved.get("FI_EFA_USE_DEVICE_RDMA"),
        Some(&OptionValue::Integer(0))
    );
    assert_eq!(resolved.get("NCCL_MIN_RINGS"), Some(&OptionValue::Integer(-3)));
}

#[test]
pub fn integer_type_mismatch_is_reported() {
    let errors = resolver()
        .resolve("--NCCL_MIN_RINGS many --map-by node --FI_EFA_USE_DEVICE_RDMA")
        .unwrap_err();

    assert_eq!(
        errors,
        vec![
            OptionError::TypeMismatch {
                name: "NCCL_MIN_RINGS".to_owned(),
                value: "many".to_owned(),
                expected: "an integer",
            },
            OptionError::MissingValue {
                name: "FI_EFA_USE_DEVICE_RDMA".to_owned(),
            },
        ]
    );
}

#[test]
pub fn flags_are_not_coerced() {
    let resolved = resolver()
        .resolve("--allow-run-as-root --LD_LIBRARY_PATH /opt/lib:/usr/lib --tag-output")
        .unwrap();

    assert_eq!(resolved.get("allow-run-as-root"), Some(&OptionValue::Present));
    assert_eq!(resolved.get("tag-output"), Some(&OptionValue::Present));
    assert_eq!(
        resolved.get("LD_LIBRARY_PATH"),
        Some(&OptionValue::text("/opt/lib:/usr/lib"))
    );
    assert_eq!(resolved.get("PATH"), Some(&OptionValue::Absent));
}

#[test]
pub fn text_options_require_a_value() {
    let errors = resolver().resolve("--map-by --bind-to core").unwrap_err();

    assert_eq!(
        errors,
        vec![OptionError::MissingValue {
            name: "map-by".to_owned()
        }]
    );
}

#[test]
pub fn preload_library_sets_default() {
    let defaults = DefaultOptions::new("ens5").with_preload(Some("/opt/shim.so".into()));
    let resolved = OptionResolver::new(&defaults).resolve("").unwrap();

    assert_eq!(resolved.get("LD_PRELOAD"), Some(&OptionValue::text("/opt/shim.so")));
}

#[test]
pub fn later_sets_shadow_earlier_defaults() {
    let mut defaults = DefaultOptions::new("eth0");
    defaults.interconnect = defaults
        .interconnect
        .clone()
        .with("map-by", OptionValue::Integer(-1));

    let resolver = OptionResolver::new(&defaults);
    assert_eq!(
        resolver.resolve("").unwrap().get("map-by"),
        Some(&OptionValue::Integer(-1))
    );

    // the shadowing default decides the coercion
    assert!(resolver.resolve("--map-by node").is_err());
    assert_eq!(
        resolver.resolve("--map-by 0").unwrap().get("map-by"),
        Some(&OptionValue::Integer(0))
    );
}

#[test]
pub fn option_set_keeps_names_unique() {
    let set = OptionSet::new("test")
        .with("a", OptionValue::Integer(1))
        .with("b", OptionValue::Absent)
        .with("a", OptionValue::Integer(0));

    assert_eq!(set.len(), 2);
    assert_eq!(set.get("a"), Some(&OptionValue::Integer(0)));
    assert_eq!(
        set.iter().map(|(name, _)| name).collect::<Vec<_>>(),
        vec!["a", "b"]
    );
}

#[test]
pub fn short_options_after_flags_stay_unknown() {
    let resolved = resolver()
        .resolve("--tag-output -x NCCL_DEBUG=INFO --allow-run-as-root -x FOO")
        .unwrap();

    assert_eq!(resolved.get("tag-output"), Some(&OptionValue::Present));
    assert_eq!(resolved.get("allow-run-as-root"), Some(&OptionValue::Present));
    assert_eq!(resolved.unknown, vec!["-x", "NCCL_DEBUG=INFO", "-x", "FOO"]);
}

#[test]
pub fn text_options_do_not_swallow_short_options() {
    let errors = resolver().resolve("--map-by -x FOO").unwrap_err();

    assert_eq!(
        errors,
        vec![OptionError::MissingValue {
            name: "map-by".to_owned()
        }]
    );

    // numbers are still values
    let resolved = resolver().resolve("--NCCL_DEBUG -1 --bind-to -0.5").unwrap();
    assert_eq!(resolved.get("NCCL_DEBUG"), Some(&OptionValue::text("-1")));
    assert_eq!(resolved.get("bind-to"), Some(&OptionValue::text("-0.5")));
    assert!(resolved.unknown.is_empty());
}
