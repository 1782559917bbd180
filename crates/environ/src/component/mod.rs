//! Instantiated components of an environment

pub mod database;
pub mod resource;
pub mod server;
pub mod source;

pub use database::Database;
pub use resource::Resource;
pub use server::Server;
pub use source::SourceSet;

/// A pre-existing system database, referenced by name and never managed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysDatabase {
    pub name: String,
}

/// Reference from a database or a server to a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbRef {
    /// Index in the environment's database list
    Managed(usize),
    System(SysDatabase),
    /// The referencing database itself
    Myself,
}
