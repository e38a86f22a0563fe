// Utility functions and helpers for the bridge's callers

pub mod deprecation;
pub mod path;
pub mod process;
pub mod url;
pub mod version;

pub use deprecation::{Deprecated, DeprecationBehavior, DeprecationError};
pub use path::{samefile_simple, to_api_path, to_os_path};
pub use process::check_pid;
pub use url::{path2url, url2path, url_escape, url_is_absolute, url_path_join, url_unescape};
pub use version::{VersionComponent, check_version, compare_loose_versions, parse_loose_version};
