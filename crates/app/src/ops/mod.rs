pub mod decrypt;
pub mod history;
pub mod init;
pub mod upload;
pub mod version;

pub use decrypt::Decrypt;
pub use history::History;
pub use init::Init;
pub use upload::Upload;
pub use version::Version;
