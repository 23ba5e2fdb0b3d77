use lontar::{
    types::{Key, error::DatabaseError, row::Row},
    utils::mock::TempDatabase,
};

fn user_row(id: Key) -> Row {
    Row::new(id, &format!("user{id}"), &format!("user{id}@example.com")).unwrap()
}

#[test]
fn test_rows_survive_close_and_reopen() {
    let mut db = TempDatabase::with_prefix("table_reopen");
    {
        let table = db.open_table().unwrap();
        for id in 1..=30 {
            table.insert(&user_row(id)).unwrap();
        }
    }
    db.close_table().unwrap();

    let table = db.open_table().unwrap();
    let ids: Vec<Key> = table.select(None).unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=30).collect::<Vec<Key>>());
}

#[test]
fn test_boundary_length_fields_survive_reopen() {
    let mut db = TempDatabase::with_prefix("table_boundary");
    let username = "u".repeat(32);
    let email = "e".repeat(255);
    let row = Row::new(1, &username, &email).unwrap();
    {
        let table = db.open_table().unwrap();
        table.insert(&row).unwrap();
    }
    db.close_table().unwrap();

    let table = db.open_table().unwrap();
    assert_eq!(table.select(Some(1)).unwrap(), vec![row]);
}

#[test]
fn test_update_overwrites_row_in_place() {
    let mut db = TempDatabase::with_prefix("table_update");
    let table = db.open_table().unwrap();
    for id in 1..=20 {
        table.insert(&user_row(id)).unwrap();
    }
    let shape_before = table.tree_display().unwrap();

    let replacement = Row::new(7, "renamed", "renamed@example.com").unwrap();
    table.update(7, &replacement).unwrap();

    assert_eq!(table.select(Some(7)).unwrap(), vec![replacement]);
    assert_eq!(table.select(None).unwrap().len(), 20);
    assert_eq!(table.tree_display().unwrap(), shape_before);
}

#[test]
fn test_update_of_missing_key_fails() {
    let mut db = TempDatabase::with_prefix("table_update_missing");
    let table = db.open_table().unwrap();
    table.insert(&user_row(1)).unwrap();
    let result = table.update(2, &user_row(2));
    assert!(matches!(result, Err(DatabaseError::KeyNotFound { key: 2 })));
}

#[test]
fn test_delete_from_empty_table_fails() {
    let mut db = TempDatabase::with_prefix("table_delete_empty");
    let table = db.open_table().unwrap();
    assert!(matches!(table.delete(1), Err(DatabaseError::TableEmpty)));
}

#[test]
fn test_delete_of_missing_key_fails() {
    let mut db = TempDatabase::with_prefix("table_delete_missing");
    let table = db.open_table().unwrap();
    table.insert(&user_row(1)).unwrap();
    let result = table.delete(9);
    assert!(matches!(result, Err(DatabaseError::KeyNotFound { key: 9 })));
}

#[test]
fn test_delete_in_root_leaf_down_to_empty() {
    let mut db = TempDatabase::with_prefix("table_delete_root");
    let table = db.open_table().unwrap();
    for id in 1..=5 {
        table.insert(&user_row(id)).unwrap();
    }
    // A root leaf may drain completely; the underflow floor only applies
    // to leaves with siblings.
    for id in 1..=5 {
        table.delete(id).unwrap();
    }
    assert!(table.select(None).unwrap().is_empty());
    assert!(matches!(table.delete(1), Err(DatabaseError::TableEmpty)));
}

#[test]
fn test_delete_refuses_leaf_underflow() {
    let mut db = TempDatabase::with_prefix("table_underflow");
    let table = db.open_table().unwrap();
    // 20 rows split into leaves of 7 and 13 cells; the left leaf holds
    // keys 1..=7, and deletes are refused once it is below 6 cells.
    for id in 1..=20 {
        table.insert(&user_row(id)).unwrap();
    }
    table.delete(1).unwrap();
    table.delete(2).unwrap();
    let result = table.delete(3);
    assert!(matches!(result, Err(DatabaseError::WouldUnderflow { .. })));

    // The refused delete leaves the row in place.
    assert_eq!(table.select(Some(3)).unwrap(), vec![user_row(3)]);
    let ids: Vec<Key> = table.select(None).unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, (3..=20).collect::<Vec<Key>>());
}

#[test]
fn test_select_with_key_filters_scan() {
    let mut db = TempDatabase::with_prefix("table_select_key");
    let table = db.open_table().unwrap();
    for id in 1..=40 {
        table.insert(&user_row(id)).unwrap();
    }
    assert_eq!(table.select(Some(25)).unwrap(), vec![user_row(25)]);
    assert!(table.select(Some(99)).unwrap().is_empty());
}

#[test]
fn test_insert_after_reopen_continues_tree() {
    let mut db = TempDatabase::with_prefix("table_reopen_insert");
    {
        let table = db.open_table().unwrap();
        for id in 1..=14 {
            table.insert(&user_row(id)).unwrap();
        }
    }
    db.close_table().unwrap();

    let table = db.open_table().unwrap();
    for id in 15..=28 {
        table.insert(&user_row(id)).unwrap();
    }
    let ids: Vec<Key> = table.select(None).unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=28).collect::<Vec<Key>>());
}
