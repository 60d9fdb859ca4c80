//! Logical request methods, including the upload/download pseudo-methods

use serde::{Deserialize, Serialize};

/// Logical method requested by the caller.
///
/// `Upload` and `Download` are pseudo-methods: they are rewritten to
/// `POST` and `GET` respectively before dispatch, with a [`CustomType`]
/// marker recording the original intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
    /// Multipart upload; dispatched as POST.
    Upload,
    /// Binary download; dispatched as GET.
    Download,
}

/// Marker distinguishing pseudo-methods after they are rewritten to real
/// verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CustomType {
    /// Plain request.
    #[default]
    None,
    /// Request started life as [`Method::Upload`].
    Upload,
    /// Request started life as [`Method::Download`].
    Download,
}

impl Method {
    /// Wire verb and custom-type marker this method dispatches as.
    pub fn dispatch(&self) -> (&'static str, CustomType) {
        match self {
            Method::Get => ("GET", CustomType::None),
            Method::Post => ("POST", CustomType::None),
            Method::Put => ("PUT", CustomType::None),
            Method::Delete => ("DELETE", CustomType::None),
            Method::Upload => ("POST", CustomType::Upload),
            Method::Download => ("GET", CustomType::Download),
        }
    }

    /// Lowercase name, matching the verb methods on the client facade.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
            Method::Upload => "upload",
            Method::Download => "download",
        }
    }

    /// All methods, in facade order. This is the default allow list.
    pub fn all() -> Vec<Method> {
        vec![
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Upload,
            Method::Download,
        ]
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Soft methods carry their params in the URL query string, never in a
/// body.
pub(crate) fn is_soft_verb(verb: &str) -> bool {
    verb == "GET" || verb == "DELETE"
}
