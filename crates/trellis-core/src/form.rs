//! Form submissions and the decoder that turns them into a key/value map.
//!
//! A [`FormSubmission`] keeps every submitted `(name, value)` pair in the
//! order the client sent it. [`decode`] collapses it: array fields keep all
//! of their values, every other field keeps only its first value.

use std::collections::BTreeMap;

use bytes::Bytes;

/// An uploaded file part, passed through the decoder untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl FileBlob {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Browsers send an empty, nameless part when no file was chosen.
    pub fn is_empty_selection(&self) -> bool {
        self.filename.is_empty() && self.data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FileBlob),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            FormValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileBlob> {
        match self {
            FormValue::File(f) => Some(f),
            FormValue::Text(_) => None,
        }
    }
}

impl From<&str> for FormValue {
    fn from(s: &str) -> Self {
        FormValue::Text(s.to_string())
    }
}

impl From<String> for FormValue {
    fn from(s: String) -> Self {
        FormValue::Text(s)
    }
}

impl From<FileBlob> for FormValue {
    fn from(f: FileBlob) -> Self {
        FormValue::File(f)
    }
}

/// The raw, ordered pairs of one form POST.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    entries: Vec<(String, FormValue)>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<FormValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Builder form of [`append`](Self::append), handy in tests.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.append(name, value);
        self
    }

    pub fn entries(&self) -> &[(String, FormValue)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value submitted under `name`, if it is text.
    pub fn first_text(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_text())
    }
}

impl<K, V> FromIterator<(K, V)> for FormSubmission
where
    K: Into<String>,
    V: Into<FormValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Single(FormValue),
    List(Vec<FormValue>),
}

impl Decoded {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Decoded::Single(v) => v.as_text(),
            Decoded::List(_) => None,
        }
    }
}

/// Decoder output: one entry per distinct submitted name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedForm {
    fields: BTreeMap<String, Decoded>,
}

impl DecodedForm {
    pub fn get(&self, name: &str) -> Option<&Decoded> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Decoded::as_text)
    }

    pub fn list(&self, name: &str) -> Option<&[FormValue]> {
        match self.get(name)? {
            Decoded::List(values) => Some(values),
            Decoded::Single(_) => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Decoded)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Collapse a submission into a [`DecodedForm`].
///
/// Names listed in `array_fields` collect every value in submission order.
/// Any other name keeps its first value and silently drops the rest. Absent
/// names are absent from the output, array fields included. No coercion.
pub fn decode(submission: &FormSubmission, array_fields: &[&str]) -> DecodedForm {
    let mut fields: BTreeMap<String, Decoded> = BTreeMap::new();
    for (name, value) in submission.entries() {
        if array_fields.contains(&name.as_str()) {
            if let Decoded::List(values) = fields
                .entry(name.clone())
                .or_insert_with(|| Decoded::List(Vec::new()))
            {
                values.push(value.clone());
            }
        } else if !fields.contains_key(name) {
            fields.insert(name.clone(), Decoded::Single(value.clone()));
        }
    }
    DecodedForm { fields }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(values: &[FormValue]) -> Vec<&str> {
        values.iter().filter_map(FormValue::as_text).collect()
    }

    #[test]
    fn single_values() {
        let form = FormSubmission::new()
            .with("name", "John")
            .with("email", "john@example.com");
        let decoded = decode(&form, &[]);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.text("name"), Some("John"));
        assert_eq!(decoded.text("email"), Some("john@example.com"));
    }

    #[test]
    fn array_field_keeps_submission_order() {
        let form = FormSubmission::new()
            .with("roles", "admin")
            .with("name", "John")
            .with("roles", "user");
        let decoded = decode(&form, &["roles"]);
        assert_eq!(decoded.text("name"), Some("John"));
        assert_eq!(texts(decoded.list("roles").unwrap()), vec!["admin", "user"]);
    }

    #[test]
    fn array_field_with_single_value_is_still_a_list() {
        let form = FormSubmission::new().with("roles", "admin");
        let decoded = decode(&form, &["roles"]);
        assert_eq!(texts(decoded.list("roles").unwrap()), vec!["admin"]);
    }

    #[test]
    fn absent_array_field_is_omitted() {
        let form = FormSubmission::new().with("name", "John");
        let decoded = decode(&form, &["roles"]);
        assert!(!decoded.contains("roles"));
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn empty_submission_decodes_empty() {
        assert!(decode(&FormSubmission::new(), &[]).is_empty());
    }

    #[test]
    fn duplicate_non_array_key_keeps_first_value() {
        let form = FormSubmission::new()
            .with("name", "John")
            .with("name", "Jane");
        let decoded = decode(&form, &[]);
        assert_eq!(decoded.text("name"), Some("John"));
    }

    #[test]
    fn empty_strings_are_preserved() {
        let form = FormSubmission::new()
            .with("name", "")
            .with("email", "test@example.com");
        let decoded = decode(&form, &[]);
        assert_eq!(decoded.text("name"), Some(""));
    }

    #[test]
    fn mixed_single_and_array_fields() {
        let form = FormSubmission::new()
            .with("name", "John")
            .with("tags", "typescript")
            .with("tags", "react")
            .with("permissions", "read")
            .with("permissions", "write")
            .with("permissions", "delete");
        let decoded = decode(&form, &["tags", "permissions"]);
        assert_eq!(texts(decoded.list("tags").unwrap()), vec!["typescript", "react"]);
        assert_eq!(
            texts(decoded.list("permissions").unwrap()),
            vec!["read", "write", "delete"]
        );
    }

    #[test]
    fn files_pass_through() {
        let file = FileBlob::new("test.txt", "text/plain", &b"content"[..]);
        let form = FormSubmission::new()
            .with("document", file.clone())
            .with("name", "John");
        let decoded = decode(&form, &[]);
        match decoded.get("document") {
            Some(Decoded::Single(FormValue::File(f))) => assert_eq!(f, &file),
            other => panic!("expected a file, got {other:?}"),
        }
    }

    #[test]
    fn multiple_files_as_list() {
        let form = FormSubmission::new()
            .with("documents", FileBlob::new("a.txt", "text/plain", &b"1"[..]))
            .with("documents", FileBlob::new("b.txt", "text/plain", &b"2"[..]));
        let decoded = decode(&form, &["documents"]);
        let files: Vec<_> = decoded
            .list("documents")
            .unwrap()
            .iter()
            .filter_map(FormValue::as_file)
            .map(|f| f.filename.as_str())
            .collect();
        assert_eq!(files, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn first_text_reads_raw_submission() {
        let form = FormSubmission::new()
            .with("intent", "createTodo")
            .with("intent", "deleteTodo");
        assert_eq!(form.first_text("intent"), Some("createTodo"));
        assert_eq!(form.first_text("missing"), None);
    }
}
