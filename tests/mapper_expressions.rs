use beamkd::catalog::{DEFAULT_RULE_SET, RuleSetCatalog};
use beamkd::mapper::{MapperRule, RuleKind};

fn cutoffs(attribute: &str, thresholds: &[f64]) -> MapperRule {
    MapperRule::targeting(RuleKind::Cutoffs { thresholds: thresholds.to_vec() }, attribute)
}

fn catalog() -> RuleSetCatalog {
    let mut catalog = RuleSetCatalog::default();
    catalog.register("X_LOW", vec![cutoffs("x", &[10.0])]).expect("register X_LOW");
    catalog.register("X_HIGH", vec![cutoffs("x", &[20.0])]).expect("register X_HIGH");
    catalog.register("Y_CUTS", vec![cutoffs("y", &[1.0, 2.0])]).expect("register Y_CUTS");
    catalog
}

fn identities(rules: &[MapperRule]) -> Vec<String> {
    let mut ids: Vec<String> = rules.iter().map(|r| r.to_string()).collect();
    ids.sort();
    ids
}

#[test]
fn default_rule_set_resolves_in_order() {
    let rules = RuleSetCatalog::default().resolve(DEFAULT_RULE_SET).expect("default resolves");
    let names: Vec<String> = rules.iter().map(MapperRule::name).collect();
    assert_eq!(
        names,
        [
            "CATEGORIC_EQUALITY",
            "SMART_DISCRETE_ORDINAL",
            "IRREGULAR_4_CUTOFFS_CLUSTERING",
            "POSITIVE_AND_NEGATIVE",
            "YEAR_MONTH_WEEKDAY"
        ]
    );
}

#[test]
fn every_builtin_rule_is_a_rule_set() {
    let catalog = RuleSetCatalog::default();
    for name in ["CATEGORIC_INEQUALITY", "STDEV_BANDS", "IRREGULAR_2_CUTOFFS_CLUSTERING", "EVEN_ODD", "ABOVE_MEDIAN"] {
        let rules = catalog.resolve(name).expect(name);
        assert_eq!(rules.len(), 1, "{name} is a singleton");
        assert_eq!(rules[0].name(), name);
    }
    assert!(catalog.resolve("NONE").expect("empty set").is_empty());
}

#[test]
fn unknown_names_are_reported() {
    let catalog = catalog();
    let e = catalog.resolve("NO_SUCH_BASE").expect_err("unknown base");
    assert!(e.to_string().contains("NO_SUCH_BASE"), "{e}");
    let e = catalog.resolve("DFT_ATTR_TO_STMNT_MAPS|{X_LOW}|{MISSING_SET}").expect_err("unknown modifier");
    assert!(e.to_string().contains("MISSING_SET"), "{e}");
    assert!(e.to_string().starts_with("Configuration error"), "{e}");
}

#[test]
fn disjoint_modifiers_commute() {
    let catalog = catalog();
    let ab = catalog.resolve("DFT_ATTR_TO_STMNT_MAPS|{X_LOW}|{Y_CUTS}").expect("ab");
    let ba = catalog.resolve("DFT_ATTR_TO_STMNT_MAPS|{Y_CUTS}|{X_LOW}").expect("ba");
    assert_eq!(identities(&ab), identities(&ba));
    let ab = catalog.resolve("DFT_ATTR_TO_STMNT_MAPS-{CATEGORIC_EQUALITY}-{YEAR_MONTH_WEEKDAY}").expect("ab");
    let ba = catalog.resolve("DFT_ATTR_TO_STMNT_MAPS-{YEAR_MONTH_WEEKDAY}-{CATEGORIC_EQUALITY}").expect("ba");
    assert_eq!(identities(&ab), identities(&ba));
}

#[test]
fn repeating_a_modifier_is_idempotent() {
    let catalog = catalog();
    assert_eq!(
        catalog.resolve("DFT_ATTR_TO_STMNT_MAPS|{X_LOW}").expect("once"),
        catalog.resolve("DFT_ATTR_TO_STMNT_MAPS|{X_LOW}|{X_LOW}").expect("twice")
    );
    assert_eq!(
        catalog.resolve("DFT_ATTR_TO_STMNT_MAPS-{EVEN_ODD}").expect("absent removal"),
        catalog.resolve(DEFAULT_RULE_SET).expect("base")
    );
    assert_eq!(
        catalog.resolve("DFT_ATTR_TO_STMNT_MAPS-{POSITIVE_AND_NEGATIVE}").expect("once"),
        catalog.resolve("DFT_ATTR_TO_STMNT_MAPS-{POSITIVE_AND_NEGATIVE}-{POSITIVE_AND_NEGATIVE}").expect("twice")
    );
}

#[test]
fn later_modifier_replaces_rule_on_same_attribute() {
    let catalog = catalog();
    let rules = catalog.resolve("X_LOW|{Y_CUTS}|{X_HIGH}").expect("resolves");
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0], cutoffs("x", &[20.0]), "replaced in place");
    assert_eq!(rules[1], cutoffs("y", &[1.0, 2.0]));
    let rules = catalog.resolve("X_LOW-{X_HIGH}").expect("resolves");
    assert!(rules.is_empty(), "removal matches by rule and attribute");
}

#[test]
fn conflicting_rules_in_one_group_fail() {
    let catalog = catalog();
    let e = catalog.resolve("NONE|{X_LOW,X_HIGH}").expect_err("conflict");
    assert!(e.to_string().contains("conflicting"), "{e}");
    assert!(e.to_string().contains("CUTOFFS@x"), "{e}");
    // the same set twice in one group is not a conflict
    assert_eq!(catalog.resolve("NONE|{X_LOW,X_LOW}").expect("dedup").len(), 1);
}

#[test]
fn registration_is_checked() {
    let mut catalog = catalog();
    assert!(catalog.register("bad-name", vec![]).is_err(), "dash is an operator");
    assert!(catalog.register("X_LOW", vec![]).is_err(), "duplicate name");
    assert!(catalog.register("EVEN_ODD", vec![]).is_err(), "built-in name");
    let e = catalog
        .register("UNTARGETED", vec![MapperRule::new(RuleKind::Cutoffs { thresholds: vec![1.0] })])
        .expect_err("cutoffs need a target");
    assert!(e.to_string().contains("UNTARGETED"), "{e}");
    let e = catalog
        .register("TWICE", vec![cutoffs("z", &[1.0]), cutoffs("z", &[2.0])])
        .expect_err("conflict inside a set");
    assert!(e.to_string().contains("conflicting"), "{e}");
    assert!(catalog.names().any(|n| n == "Y_CUTS"));
}

#[test]
fn named_sets_on_one_attribute_coexist() {
    let in_set = |name: &str, values: &[&str]| {
        MapperRule::targeting(
            RuleKind::InSet { name: name.into(), values: values.iter().map(|v| v.to_string()).collect() },
            "color",
        )
    };
    let mut catalog = RuleSetCatalog::default();
    catalog.register("WARM", vec![in_set("warm", &["red", "orange"])]).expect("register WARM");
    catalog.register("COOL", vec![in_set("cool", &["blue", "green"])]).expect("register COOL");
    catalog.register("WARMER", vec![in_set("warm", &["red"])]).expect("register WARMER");

    let rules = catalog.resolve("NONE|{WARM}|{COOL}").expect("resolves");
    assert_eq!(rules.iter().map(|r| r.to_string()).collect::<Vec<_>>(), ["IN_SET:warm@color", "IN_SET:cool@color"]);
    assert_eq!(catalog.resolve("NONE|{WARM,COOL}").expect("different sets").len(), 2);

    let rules = catalog.resolve("NONE|{WARM}|{COOL}|{WARMER}").expect("resolves");
    assert_eq!(rules[0], in_set("warm", &["red"]), "same set name replaces in place");
    assert_eq!(rules.len(), 2);
    let e = catalog.resolve("NONE|{WARM,WARMER}").expect_err("conflict");
    assert!(e.to_string().contains("conflicting"), "{e}");
    assert_eq!(catalog.resolve("NONE|{WARM}|{COOL}-{WARMER}").expect("removal").len(), 1);
}
