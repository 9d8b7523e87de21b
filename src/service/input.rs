//! Raw submitted form data: ordered, possibly repeated keys, text or uploaded files.

use axum::body::Bytes;

#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Clone, Debug)]
pub enum RawValue {
    Text(String),
    File(UploadedFile),
}

#[derive(Clone, Debug, Default)]
pub struct FormInput {
    entries: Vec<(String, RawValue)>,
}

impl FormInput {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        FormInput {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), RawValue::Text(v.into())))
                .collect(),
        }
    }

    pub fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), RawValue::Text(value.into())));
    }

    pub fn push_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.entries.push((name.into(), RawValue::File(file)));
    }

    pub fn first(&self, name: &str) -> Option<&RawValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// First text value under `name`.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|(k, v)| match v {
            RawValue::Text(s) if k == name => Some(s.as_str()),
            _ => None,
        })
    }

    /// Every text value under `name`, in submission order.
    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|(k, v)| match v {
                RawValue::Text(s) if k == name => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn text_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(k, v)| match v {
            RawValue::Text(s) => Some((k.as_str(), s.as_str())),
            RawValue::File(_) => None,
        })
    }
}
