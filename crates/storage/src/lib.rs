#![forbid(unsafe_code)]

pub mod repository;
pub mod rest;
pub mod sqlite;

pub use repository::{
    InMemoryRemote, InMemorySlot, LocalSlot, RemoteProgressRow, RemoteProgressStore, Storage,
    StorageError,
};
