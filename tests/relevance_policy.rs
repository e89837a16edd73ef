// tests/relevance_policy.rs
// Relevance policies: simple location match and the four-criteria strict match.

use wildfire_watch::relevance::{MatchMode, PolicyKind, RelevanceCfg, RelevancePolicy};

fn strict() -> RelevanceCfg {
    RelevanceCfg {
        policy: PolicyKind::Strict,
        match_mode: MatchMode::Substring,
        keywords: vec!["fire".into()],
        exclude: vec!["prescribed".into()],
        locations: vec!["klickitat".into()],
        agencies: vec!["usfs".into()],
    }
}

const MATCHING: &str = "Line Fire USFS Klickitat County  2024-07-01";

#[test]
fn strict_matches_when_all_criteria_hold() {
    let p = RelevancePolicy::from_cfg(&strict()).unwrap();
    assert!(p.is_relevant(MATCHING));
}

#[test]
fn removing_the_only_term_of_any_criterion_flips_the_result() {
    let mut no_kw = strict();
    no_kw.keywords = vec!["smoke".into()];
    let mut no_loc = strict();
    no_loc.locations = vec!["yakima".into()];
    let mut no_agency = strict();
    no_agency.agencies = vec!["blm".into()];

    for cfg in [no_kw, no_loc, no_agency] {
        let p = RelevancePolicy::from_cfg(&cfg).unwrap();
        assert!(!p.is_relevant(MATCHING), "cfg {cfg:?} should not match");
    }

    // Adding an exclusion that appears flips it as well.
    let mut excl = strict();
    excl.exclude.push("usfs".into());
    assert!(!RelevancePolicy::from_cfg(&excl).unwrap().is_relevant(MATCHING));
}

#[test]
fn strict_exclusion_anywhere_in_text() {
    let p = RelevancePolicy::from_cfg(&strict()).unwrap();
    for text in [
        "Line Fire (prescribed) USFS Klickitat County",
        "Line Fire USFS-PRESCRIBED Klickitat County",
        "Line Fire USFS Klickitat County prescribed 2024-07-01",
    ] {
        assert!(!p.is_relevant(text), "{text}");
    }
}

#[test]
fn simple_policy_scenario() {
    let p = RelevancePolicy::simple(&["Oregon", "Washington"]);
    assert!(p.is_relevant("Evergreen Fire near Mt Hood, Oregon"));
    assert!(!p.is_relevant("City Council Meeting"));
    // Simple policy ignores keywords entirely.
    assert!(p.is_relevant("Oregon state fair opens"));
}

#[test]
fn policy_from_toml_section() {
    #[derive(serde::Deserialize)]
    struct Wrap {
        relevance: RelevanceCfg,
    }
    let w: Wrap = toml::from_str(
        r#"
[relevance]
policy = "strict"
match_mode = "word"
keywords = ["fire"]
locations = ["Klickitat"]
agencies = ["USFS"]
"#,
    )
    .unwrap();
    let p = RelevancePolicy::from_cfg(&w.relevance).unwrap();
    assert_eq!(p.kind(), PolicyKind::Strict);
    assert!(p.is_relevant(MATCHING));
    // Word mode: "fireworks" is not "fire".
    assert!(!p.is_relevant("Fireworks show USFS Klickitat"));
}
