use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// archive entry name reserved for the serialized content items
pub const INDEX_ENTRY_NAME: &str = "data.json";

/// field name carrying a content item's key
const ID_FIELD: &str = "id";

const TYPES_PREFIX: &str = "/contentTypes/";
const ITEMS_SEGMENT: &str = "/contentItems/";

/// the fields of a content item, without its id
pub type ContentFields = Map<String, Value>;

/// a schema-less content record keyed by its `id` field
///
/// serializes as a plain json object, so an index is just a json array of these.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentItem(ContentFields);

impl ContentItem {
    /// build an item from its id and remaining fields
    pub fn new(id: impl Into<String>, fields: ContentFields) -> Self {
        let mut fields = fields;
        fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
        Self(fields)
    }

    /// wrap a raw json object as-is
    pub fn from_fields(fields: ContentFields) -> Self {
        Self(fields)
    }

    /// the item id, if present and a string
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// all fields, including the id
    pub fn fields(&self) -> &ContentFields {
        &self.0
    }

    /// content type named by the id, if the id is canonical
    pub fn content_type(&self) -> Option<&str> {
        self.id().and_then(parse_content_id).map(|(ty, _)| ty)
    }

    /// strip the id, returning it alongside the remaining fields
    ///
    /// `position` is only used to describe the item in the error.
    pub fn into_parts(self, position: usize) -> Result<(String, ContentFields)> {
        let mut fields = self.0;
        match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => Ok((id, fields)),
            _ => Err(Error::MissingContentId(position)),
        }
    }
}

impl From<ContentFields> for ContentItem {
    fn from(fields: ContentFields) -> Self {
        Self::from_fields(fields)
    }
}

/// build a canonical content id: `/contentTypes/{type}/contentItems/{key}`
pub fn content_id(content_type: &str, key: &str) -> String {
    format!("{}{}{}{}", TYPES_PREFIX, content_type, ITEMS_SEGMENT, key)
}

/// split a canonical content id into (type, key)
pub fn parse_content_id(id: &str) -> Option<(&str, &str)> {
    let rest = id.strip_prefix(TYPES_PREFIX)?;
    let (content_type, key) = rest.split_once(ITEMS_SEGMENT)?;
    if !valid_segment(content_type) || !valid_segment(key) {
        return None;
    }
    Some((content_type, key))
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains('/') && !s.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> ContentFields {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_content_id_roundtrip() {
        let id = content_id("page", "home");
        assert_eq!(id, "/contentTypes/page/contentItems/home");
        assert_eq!(parse_content_id(&id), Some(("page", "home")));
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        assert_eq!(parse_content_id("home"), None);
        assert_eq!(parse_content_id("/contentTypes/page"), None);
        assert_eq!(parse_content_id("/contentTypes//contentItems/x"), None);
        assert_eq!(parse_content_id("/contentTypes/page/contentItems/"), None);
        assert_eq!(parse_content_id("/contentTypes/page/contentItems/a/b"), None);
        assert_eq!(parse_content_id("/contentTypes/page/contentItems/.."), None);
    }

    #[test]
    fn test_into_parts_strips_id() {
        let item = ContentItem::new("/contentTypes/page/contentItems/a", fields(json!({"title": "A"})));
        assert_eq!(item.content_type(), Some("page"));

        let (id, rest) = item.into_parts(0).unwrap();
        assert_eq!(id, "/contentTypes/page/contentItems/a");
        assert_eq!(rest, fields(json!({"title": "A"})));
    }

    #[test]
    fn test_into_parts_requires_string_id() {
        let missing = ContentItem::from_fields(fields(json!({"title": "A"})));
        assert!(matches!(missing.into_parts(3), Err(Error::MissingContentId(3))));

        let numeric = ContentItem::from_fields(fields(json!({"id": 7})));
        assert!(matches!(numeric.into_parts(1), Err(Error::MissingContentId(1))));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let item = ContentItem::new("/contentTypes/page/contentItems/a", fields(json!({"n": 1})));
        let text = serde_json::to_string(&vec![item.clone()]).unwrap();
        assert_eq!(text, r#"[{"id":"/contentTypes/page/contentItems/a","n":1}]"#);

        let parsed: Vec<ContentItem> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, vec![item]);
    }
}
