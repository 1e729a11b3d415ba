//! Request bodies for methods that carry a payload.
//!
//! Bodies are held in memory, so a follow-up request can replay them.

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    content_type: Option<String>,
    content: Bytes,
}

impl RequestBody {
    pub fn new(content_type: Option<&str>, content: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            content: content.into(),
        }
    }

    pub fn bytes(content: impl Into<Bytes>) -> Self {
        Self::new(Some("application/octet-stream"), content)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(Some("text/plain; charset=utf-8"), content.into())
    }

    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(
        value: &T,
    ) -> Result<Self, crate::base::neterror::NetError> {
        let content = serde_json::to_vec(value).map_err(|e| crate::base::neterror::NetError::Io {
            kind: std::io::ErrorKind::InvalidData,
            message: e.to_string(),
        })?;
        Ok(Self::new(Some("application/json"), content))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::text(s)
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::text(s)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::bytes(v)
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::bytes(b)
    }
}

impl From<FormBody> for RequestBody {
    fn from(form: FormBody) -> Self {
        form.build()
    }
}

/// `application/x-www-form-urlencoded` body builder.
#[derive(Debug, Clone, Default)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> RequestBody {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish();
        RequestBody::new(Some("application/x-www-form-urlencoded"), encoded)
    }
}
