mod accumulator;
mod host;

pub use accumulator::{SanAccumulator, SubjectIdentity};
pub use host::{HostKind, IpMask, IpSan, classify_host, strip_port};
