use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{
    Key,
    error::{DatabaseError, Result},
};

pub const COLUMN_USERNAME_SIZE: usize = 32;
pub const COLUMN_EMAIL_SIZE: usize = 255;

// Serialized form: the three fields concatenated at fixed offsets, text
// fields NUL-padded to their capacity.
pub const ID_SIZE: usize = size_of::<Key>();
pub const USERNAME_SIZE: usize = COLUMN_USERNAME_SIZE;
pub const EMAIL_SIZE: usize = COLUMN_EMAIL_SIZE;
pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// Fixed-schema record. Row identity and sort key are both `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: Key,
    pub username: String,
    pub email: String,
}

impl Row {
    pub fn new(id: Key, username: &str, email: &str) -> Result<Self> {
        if username.len() > COLUMN_USERNAME_SIZE {
            return Err(DatabaseError::ValueTooLong {
                field: "username",
                max: COLUMN_USERNAME_SIZE,
            });
        }
        if email.len() > COLUMN_EMAIL_SIZE {
            return Err(DatabaseError::ValueTooLong {
                field: "email",
                max: COLUMN_EMAIL_SIZE,
            });
        }
        Ok(Self {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    /// Writes the fixed-width form into `destination`, which must be exactly
    /// `ROW_SIZE` bytes. Text fields shorter than their capacity are
    /// NUL-padded.
    pub fn serialize_into(&self, destination: &mut [u8]) {
        debug_assert_eq!(destination.len(), ROW_SIZE);
        destination.fill(0);
        destination[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        let username = self.username.as_bytes();
        destination[USERNAME_OFFSET..USERNAME_OFFSET + username.len()].copy_from_slice(username);
        let email = self.email.as_bytes();
        destination[EMAIL_OFFSET..EMAIL_OFFSET + email.len()].copy_from_slice(email);
    }

    /// Reads a row back from its fixed-width form, trimming the NUL padding.
    pub fn deserialize(source: &[u8]) -> Self {
        debug_assert_eq!(source.len(), ROW_SIZE);
        let id = Key::from_le_bytes(
            source[ID_OFFSET..ID_OFFSET + ID_SIZE]
                .try_into()
                .expect("id field is 4 bytes"),
        );
        let username = read_padded_text(&source[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let email = read_padded_text(&source[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);
        Self {
            id,
            username,
            email,
        }
    }
}

fn read_padded_text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}
