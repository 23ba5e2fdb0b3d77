//! Miniature statement layer: tokenizes one line of input into a
//! `Statement` and validates ids and field lengths. The storage core never
//! parses text; everything textual stops here.

pub mod error;

use crate::{
    statement::error::StatementError,
    types::{Key, error::DatabaseError, row::Row},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select { key: Option<Key> },
    Update { key: Key, row: Row },
    Delete { key: Key },
}

/// Recognized forms:
///
/// ```text
/// insert <id> <username> <email>
/// select [<id>]
/// update <id> <username> <email>
/// delete <id>
/// ```
pub fn prepare(input: &str) -> Result<Statement, StatementError> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    match tokens.first() {
        Some(&"insert") => prepare_row(&tokens, input).map(Statement::Insert),
        Some(&"select") => prepare_select(&tokens, input),
        Some(&"update") => {
            let row = prepare_row(&tokens, input)?;
            Ok(Statement::Update { key: row.id, row })
        }
        Some(&"delete") => prepare_delete(&tokens, input),
        _ => Err(StatementError::Unrecognized {
            input: input.trim().to_string(),
        }),
    }
}

fn prepare_row(tokens: &[&str], input: &str) -> Result<Row, StatementError> {
    let [_, id, username, email] = tokens else {
        return Err(StatementError::SyntaxError {
            input: input.trim().to_string(),
        });
    };
    let id = parse_id(id)?;
    Row::new(id, username, email).map_err(|err| match err {
        DatabaseError::ValueTooLong { field, max } => StatementError::StringTooLong { field, max },
        _ => StatementError::SyntaxError {
            input: input.trim().to_string(),
        },
    })
}

fn prepare_select(tokens: &[&str], input: &str) -> Result<Statement, StatementError> {
    match tokens {
        [_] => Ok(Statement::Select { key: None }),
        [_, id] => Ok(Statement::Select {
            key: Some(parse_id(id)?),
        }),
        _ => Err(StatementError::SyntaxError {
            input: input.trim().to_string(),
        }),
    }
}

fn prepare_delete(tokens: &[&str], input: &str) -> Result<Statement, StatementError> {
    let [_, id] = tokens else {
        return Err(StatementError::SyntaxError {
            input: input.trim().to_string(),
        });
    };
    Ok(Statement::Delete { key: parse_id(id)? })
}

fn parse_id(token: &str) -> Result<Key, StatementError> {
    let id: i64 = token.parse().map_err(|_| StatementError::InvalidId {
        input: token.to_string(),
    })?;
    if id < 0 {
        return Err(StatementError::NegativeId);
    }
    Key::try_from(id).map_err(|_| StatementError::InvalidId {
        input: token.to_string(),
    })
}
