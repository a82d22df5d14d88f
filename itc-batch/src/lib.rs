pub mod batch;
pub mod csv_parser;
pub mod dispatch;
pub mod passphrase;
pub mod sanity;
pub mod settings;
pub mod tool;
pub mod transaction;
