use lontar::{
    statement::{Statement, error::StatementError, prepare},
    types::row::Row,
};

#[test]
fn test_prepare_insert() {
    let statement = prepare("insert 1 alice alice@example.com").unwrap();
    let expected = Row::new(1, "alice", "alice@example.com").unwrap();
    assert_eq!(statement, Statement::Insert(expected));
}

#[test]
fn test_prepare_insert_tolerates_extra_whitespace() {
    let statement = prepare("  insert   1   alice   alice@example.com ").unwrap();
    assert!(matches!(statement, Statement::Insert(_)));
}

#[test]
fn test_prepare_select_full_scan() {
    assert_eq!(prepare("select").unwrap(), Statement::Select { key: None });
}

#[test]
fn test_prepare_select_with_key() {
    assert_eq!(
        prepare("select 42").unwrap(),
        Statement::Select { key: Some(42) }
    );
}

#[test]
fn test_prepare_update() {
    let statement = prepare("update 3 bob bob@example.com").unwrap();
    let row = Row::new(3, "bob", "bob@example.com").unwrap();
    assert_eq!(statement, Statement::Update { key: 3, row });
}

#[test]
fn test_prepare_delete() {
    assert_eq!(prepare("delete 9").unwrap(), Statement::Delete { key: 9 });
}

#[test]
fn test_prepare_rejects_wrong_arity() {
    assert!(matches!(
        prepare("insert 1 alice"),
        Err(StatementError::SyntaxError { .. })
    ));
    assert!(matches!(
        prepare("insert 1 alice alice@example.com extra"),
        Err(StatementError::SyntaxError { .. })
    ));
    assert!(matches!(
        prepare("delete"),
        Err(StatementError::SyntaxError { .. })
    ));
    assert!(matches!(
        prepare("select 1 2"),
        Err(StatementError::SyntaxError { .. })
    ));
}

#[test]
fn test_prepare_rejects_negative_id() {
    assert_eq!(
        prepare("insert -1 alice alice@example.com"),
        Err(StatementError::NegativeId)
    );
    assert_eq!(prepare("delete -5"), Err(StatementError::NegativeId));
}

#[test]
fn test_prepare_rejects_non_numeric_id() {
    assert!(matches!(
        prepare("insert abc alice alice@example.com"),
        Err(StatementError::InvalidId { .. })
    ));
}

#[test]
fn test_prepare_rejects_id_above_u32_range() {
    assert!(matches!(
        prepare("select 4294967296"),
        Err(StatementError::InvalidId { .. })
    ));
}

#[test]
fn test_prepare_rejects_overlong_strings() {
    let long_username = "u".repeat(33);
    let result = prepare(&format!("insert 1 {long_username} a@example.com"));
    assert_eq!(
        result,
        Err(StatementError::StringTooLong {
            field: "username",
            max: 32
        })
    );

    let long_email = "e".repeat(256);
    let result = prepare(&format!("insert 1 alice {long_email}"));
    assert_eq!(
        result,
        Err(StatementError::StringTooLong {
            field: "email",
            max: 255
        })
    );
}

#[test]
fn test_prepare_rejects_unknown_keyword() {
    assert!(matches!(
        prepare("upsert 1 alice a@example.com"),
        Err(StatementError::Unrecognized { .. })
    ));
    assert!(matches!(
        prepare(""),
        Err(StatementError::Unrecognized { .. })
    ));
}
