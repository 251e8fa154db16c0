#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use wlfuzz_proxy::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
session:
  capture: "run.cap"
  tick_interval: 5 # typo should fail
passes:
  - name: trace
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIGURATION");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
session:
  capture: "run.cap"
passes:
  - name: trace
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.session.output, "-");
    assert_eq!(cfg.session.tick_interval_ms, 5);
    assert_eq!(cfg.session.linger_ms, 0);
    assert!(cfg.session.program.is_none());
    assert_eq!(cfg.passes[0].name, "trace");
    assert!(cfg.passes[0].args.is_empty());
}

#[test]
fn full_pipeline_config() {
    let ok = r#"
version: 1
session:
  capture: "run.cap"
  output: "out.cap"
  program: "weston-terminal"
  tick_interval_ms: 2
  linger_ms: 500
passes:
  - name: fuzz
    args: ["block", "delay_max=200", "42"]
  - name: interactive
    args: ["skip-first"]
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.session.program.as_deref(), Some("weston-terminal"));
    assert_eq!(cfg.passes.len(), 2);
    assert_eq!(cfg.passes[0].args, vec!["block", "delay_max=200", "42"]);
}

#[test]
fn rejects_bad_values() {
    let cases = [
        // wrong version
        "version: 2\nsession: { capture: a }\npasses: [{ name: trace }]\n",
        // no passes
        "version: 1\nsession: { capture: a }\npasses: []\n",
        // unknown pass
        "version: 1\nsession: { capture: a }\npasses: [{ name: replay }]\n",
        // tick out of range
        "version: 1\nsession: { capture: a, tick_interval_ms: 0 }\npasses: [{ name: trace }]\n",
        // two interactive passes
        "version: 1\nsession: { capture: a }\npasses: [{ name: interactive }, { name: interactive }]\n",
        // missing session
        "version: 1\npasses: [{ name: trace }]\n",
    ];
    for case in cases {
        let err = config::load_from_str(case).expect_err(case);
        assert_eq!(err.code().as_str(), "CONFIGURATION", "{case}");
    }
}
