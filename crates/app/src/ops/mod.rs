pub mod init;
pub mod team;
pub mod version;

pub use init::Init;
pub use team::Team;
pub use version::Version;
