use serde::{Deserialize, Serialize};

use crate::domain::request::ThreadRef;

/// A file shared inside a request thread, after its download reference was resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub file_id: String,
    pub file_name: String,
    pub download_url: String,
    pub thread: ThreadRef,
}
