//! Types shared by the roster client and the record store server.

pub mod domain;
pub mod error;
pub mod protocol;
