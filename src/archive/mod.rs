//! Archive handling for waydroid-backup
//!
//! Every `.tar.gz` that crosses a trust boundary (restore of a stored backup,
//! import of an external file) is inspected here before a single byte is
//! written to disk.
//!
//! - `member`: allow-list tokenizer for member paths and backup names
//! - `validator`: whole-archive checks built on the tokenizer
//! - `codec`: tar + gzip packing, listing and unpacking

pub mod codec;
pub mod member;
pub mod validator;

pub use codec::{list_members, pack_dir, unpack, ArchiveMember};
pub use member::{MemberPath, PathViolation, FORBIDDEN_CHARS};
pub use validator::{validate, ArchiveReport, Rejected};
