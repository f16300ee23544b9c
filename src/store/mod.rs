// Key Store Module

pub mod key_store;

pub use key_store::{
    read_private_key, read_public_key, KeyStore, KeyStoreError, KeyStoreResult, StoreConfig,
};
