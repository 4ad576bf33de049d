//! Defines the chat transcript model and its database queries.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId, dates};

/// One turn of the assistant conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sequential id assigned by the database.
    pub id: DatabaseId,
    /// The message text.
    pub text: String,
    /// `true` if the user wrote the message, `false` for the assistant.
    pub from_user: bool,
    /// Epoch milliseconds, used for transcript ordering.
    pub timestamp: i64,
}

/// A chat message before the database has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    /// The message text.
    pub text: String,
    /// `true` if the user wrote the message.
    pub from_user: bool,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl NewChatMessage {
    /// A message authored by the user, stamped with the current time.
    pub fn from_user(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            from_user: true,
            timestamp: dates::now_millis(),
        }
    }

    /// A message authored by the assistant, stamped with the current time.
    pub fn from_assistant(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            from_user: false,
            timestamp: dates::now_millis(),
        }
    }
}

/// Create the chat message table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created.
pub fn create_chat_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS chat_message (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                from_user INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [ChatMessage].
pub fn map_row_to_chat_message(row: &Row) -> Result<ChatMessage, rusqlite::Error> {
    Ok(ChatMessage {
        id: row.get(0)?,
        text: row.get(1)?,
        from_user: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

/// Insert a chat message and return it with its assigned id.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn insert_chat_message(
    message: NewChatMessage,
    connection: &Connection,
) -> Result<ChatMessage, Error> {
    let message = connection
        .prepare(
            "INSERT INTO chat_message (text, from_user, timestamp)
             VALUES (?1, ?2, ?3)
             RETURNING id, text, from_user, timestamp",
        )?
        .query_row(
            (message.text, message.from_user, message.timestamp),
            map_row_to_chat_message,
        )?;

    Ok(message)
}

/// Retrieve the whole transcript, oldest first.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn get_all_chat_messages(connection: &Connection) -> Result<Vec<ChatMessage>, Error> {
    connection
        .prepare(
            "SELECT id, text, from_user, timestamp FROM chat_message ORDER BY timestamp ASC",
        )?
        .query_map([], map_row_to_chat_message)?
        .map(|maybe_message| maybe_message.map_err(Error::from))
        .collect()
}

/// Delete the entire transcript.
///
/// # Errors
/// This function will return a [Error::Sql] if there is an SQL error.
pub fn clear_chat_history(connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM chat_message", ())?;

    Ok(())
}
