// Output tables
pub const SCALAR_HEADER: [&str; 2] = ["id", "level"];
pub const DETAIL_HEADER: [&str; 2] = ["id", "object_name"];
pub const DEFAULT_SCALAR_FILE: &str = "levels.csv";
pub const DEFAULT_DETAIL_FILE: &str = "obj_names.csv";

// Record layout
pub const VAR_TAG: &[u8] = b"var";
pub const OBJECTS_TAG: &[u8] = b"objects";
pub const OBJECT_TAG: &[u8] = b"object";
pub const ID_VAR: &str = "id";
pub const LEVEL_VAR: &str = "level";

/// Documented range of the `level` attribute. Values outside it pass through unchanged.
pub const MIN_LEVEL: i64 = 1;
pub const MAX_LEVEL: i64 = 100;

// Input discovery
pub const ARCHIVE_EXTENSION: &str = "zip";
pub const XML_EXTENSIONS: &[&str] = &["xml"];

// Hand-off queue sizing when not configured
pub const MIN_QUEUE_DEPTH: usize = 16;
pub const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Upper bound on the buffer reserved from a member's declared size.
pub const MAX_MEMBER_PREALLOC: u64 = 1 << 20;

/// Failures kept verbatim in the run summary; the rest are only counted.
pub const MAX_FAILURE_SAMPLES: usize = 100;
