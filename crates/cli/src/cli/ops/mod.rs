pub mod access;
pub mod ext;
pub mod git;
pub mod identity;
pub mod init;
pub mod key;
pub mod lock;
pub mod status;
pub mod unlock;
pub mod version;

pub use access::Access;
pub use ext::Ext;
pub use git::Git;
pub use identity::Identity;
pub use init::Init;
pub use key::Key;
pub use lock::Lock;
pub use status::Status;
pub use unlock::Unlock;
pub use version::Version;
