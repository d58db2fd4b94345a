//! Policy validation through the public API.
//!
//! Each case is a statement a generator might plausibly produce, run against
//! both presets and both scan modes.

use pretty_assertions::assert_eq;
use sqlgate::safety::{
    normalize, DeclaredIntent, Policy, PolicyConfig, PolicyPreset, ReasonCode, ScanMode,
    ValidationOutcome, Verb,
};

fn policies() -> Vec<Policy> {
    vec![
        Policy::read_only(),
        Policy::read_only().with_scan_mode(ScanMode::TokenAware),
        Policy::limited_write(),
        Policy::limited_write().with_scan_mode(ScanMode::TokenAware),
    ]
}

fn reason(policy: &Policy, sql: &str, op: Option<&str>) -> Option<ReasonCode> {
    let intent = DeclaredIntent::parse_optional(op).unwrap();
    policy.validate(sql, intent).reason()
}

#[test]
fn test_injection_attempts_rejected_everywhere() {
    let cases = [
        ("SELECT * FROM Patient; DROP TABLE Patient", ReasonCode::MultiStatement),
        ("SELECT 1;\nDELETE FROM patient WHERE 1 = 1", ReasonCode::MultiStatement),
        ("SELECT 1;;", ReasonCode::MultiStatement),
        ("DROP TABLE patient", ReasonCode::WrongVerb),
        ("TRUNCATE patient", ReasonCode::WrongVerb),
        ("   ", ReasonCode::WrongVerb),
        ("SELECT * FROM (DROP TABLE x) t", ReasonCode::ForbiddenVerb),
        ("SELECT * FROM patient WHERE id = 1 OR 1 = (TRUNCATE patient)", ReasonCode::ForbiddenVerb),
    ];

    for policy in policies() {
        for (sql, expected) in cases {
            assert_eq!(
                reason(&policy, sql, None),
                Some(expected),
                "policy {} ({:?}) on {sql:?}",
                policy.name(),
                policy.scan_mode()
            );
        }
    }
}

#[test]
fn test_plain_select_approved_everywhere() {
    for policy in policies() {
        let outcome = policy.validate(
            "SELECT first_name, last_name\n  FROM patient\n  WHERE last_name = 'Smith';\n",
            DeclaredIntent::Auto,
        );
        let ValidationOutcome::Approved(statement) = outcome else {
            panic!("{} rejected a plain SELECT: {outcome:?}", policy.name());
        };
        assert_eq!(
            statement.as_str(),
            "SELECT first_name, last_name FROM patient WHERE last_name = 'Smith'"
        );
        assert_eq!(statement.verb(), Verb::Select);
    }
}

#[test]
fn test_approved_text_is_normalized_body() {
    let raw = "\tSELECT   COUNT(*)\r\nFROM patient ;";
    let approved = Policy::read_only()
        .validate(raw, DeclaredIntent::Auto)
        .into_result()
        .unwrap();

    assert_eq!(approved.as_str(), "SELECT COUNT(*) FROM patient");
    assert_eq!(normalize(approved.as_str()), approved.as_str());
}

#[test]
fn test_literal_semicolon_depends_on_scan_mode() {
    let sql = "SELECT * FROM patient WHERE notes = 'see chart; follow up'";

    assert_eq!(
        reason(&Policy::read_only(), sql, None),
        Some(ReasonCode::MultiStatement)
    );
    assert_eq!(
        reason(&Policy::read_only().with_scan_mode(ScanMode::TokenAware), sql, None),
        None
    );
}

#[test]
fn test_read_only_refuses_every_write() {
    let policy = Policy::read_only();

    for op in ["insert", "update", "delete"] {
        assert_eq!(
            reason(&policy, "SELECT 1", Some(op)),
            Some(ReasonCode::UnsupportedOperation),
            "op {op}"
        );
    }

    for sql in [
        "INSERT INTO patient (first_name) VALUES ('Ann')",
        "UPDATE patient SET last_name = 'Jones' WHERE patient_id = 1",
        "DELETE FROM patient WHERE patient_id = 1",
    ] {
        assert_eq!(reason(&policy, sql, None), Some(ReasonCode::WrongVerb), "{sql}");
    }
}

#[test]
fn test_limited_write_guards() {
    let policy = Policy::limited_write();

    assert_eq!(
        reason(&policy, "UPDATE patient SET last_name = 'Jones'", Some("update")),
        Some(ReasonCode::MissingWhere)
    );
    assert_eq!(
        reason(&policy, "DELETE FROM patient", Some("delete")),
        Some(ReasonCode::MissingWhere)
    );
    assert_eq!(
        reason(&policy, "SELECT * FROM patient", Some("delete")),
        Some(ReasonCode::WrongVerb)
    );
    assert_eq!(
        reason(
            &policy,
            "INSERT INTO patient (first_name, last_name) VALUES ('Ann', 'Lee')",
            Some("insert")
        ),
        None
    );
    assert_eq!(
        reason(
            &policy,
            "UPDATE patient SET last_name = 'Jones' WHERE patient_id = 7",
            Some("update")
        ),
        None
    );
}

#[test]
fn test_where_outside_code_never_satisfies_mandatory_clause() {
    let cases = [
        ("UPDATE patient SET notes = 'where'", "update"),
        ("DELETE FROM patient -- WHERE patient_id = 1", "delete"),
        ("DELETE FROM patient /* where */", "delete"),
    ];

    for policy in [
        Policy::limited_write(),
        Policy::limited_write().with_scan_mode(ScanMode::TokenAware),
    ] {
        for (sql, op) in cases {
            assert_eq!(
                reason(&policy, sql, Some(op)),
                Some(ReasonCode::MissingWhere),
                "{:?} on {sql:?}",
                policy.scan_mode()
            );
        }
    }
}

#[test]
fn test_cross_mutation_scanning_is_configurable() {
    let audit = "SELECT * FROM audit_log WHERE action = 'delete'";
    let upsert = "INSERT INTO counter (a) VALUES (1) ON CONFLICT (a) DO UPDATE SET a = 2";

    let limited_write = Policy::limited_write();
    assert_eq!(reason(&limited_write, audit, None), Some(ReasonCode::ForbiddenVerb));
    assert_eq!(
        reason(&limited_write.clone().with_cross_mutation(false), audit, None),
        None
    );

    let config: PolicyConfig = toml::from_str(
        r#"
        preset = "limited_write"
        permitted = ["select", "insert"]
        forbidden = ["DROP", "TRUNCATE", "ALTER"]
        scan = "token_aware"
        "#,
    )
    .unwrap();
    let strict = Policy::from_config(&config).unwrap();
    assert_eq!(
        reason(&strict, upsert, Some("insert")),
        Some(ReasonCode::ForbiddenVerb)
    );

    let relaxed = Policy::from_config(&PolicyConfig {
        forbid_cross_mutation: Some(false),
        ..config
    })
    .unwrap();
    assert!(!relaxed.forbids_cross_mutation());
    assert_eq!(reason(&relaxed, upsert, Some("insert")), None);
    assert_eq!(
        reason(&relaxed, "INSERT INTO t (a) VALUES (1) RETURNING (DROP)", Some("insert")),
        Some(ReasonCode::ForbiddenVerb)
    );
}

#[test]
fn test_unknown_intent_string_is_rejected() {
    let err = DeclaredIntent::parse_optional(Some("merge")).unwrap_err();
    assert_eq!(err.code, ReasonCode::UnsupportedOperation);
}

#[test]
fn test_custom_policy_from_config() {
    let config: PolicyConfig = toml::from_str(
        r#"
        preset = "limited_write"
        permitted = ["select", "insert"]
        scan = "token_aware"
        "#,
    )
    .unwrap();
    assert_eq!(config.preset, PolicyPreset::LimitedWrite);

    let policy = Policy::from_config(&config).unwrap();
    assert!(policy.permits(Verb::Insert));
    assert!(!policy.permits(Verb::Delete));
    assert_eq!(policy.scan_mode(), ScanMode::TokenAware);
    assert_eq!(
        reason(&policy, "DELETE FROM patient WHERE patient_id = 1", Some("delete")),
        Some(ReasonCode::UnsupportedOperation)
    );
}

#[test]
fn test_validation_is_deterministic() {
    let policy = Policy::limited_write();
    let sql = "DELETE FROM patient WHERE patient_id = 3";
    let first = policy.validate(sql, DeclaredIntent::Verb(Verb::Delete));
    for _ in 0..20 {
        assert_eq!(policy.validate(sql, DeclaredIntent::Verb(Verb::Delete)), first);
    }
}
