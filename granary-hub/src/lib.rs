mod client;
mod error;
mod session;
mod transport;
mod types;


pub use client::{HubClient, UPLOAD_CHUNK_SIZE};
pub use error::{HubError, LoginFaultKind};
pub use session::{Session, SessionAuth};
pub use transport::{CONNECT_TIMEOUT, HttpTransport, RpcTransport};
pub use types::{BuildInfo, BuildRequest, BuildState, BuildTarget, RepoInfo, SourceLocations, TaskId};
