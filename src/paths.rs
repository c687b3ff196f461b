// Dotted-path access to JSON documents (e.g. "team.id" on an entity)
use serde_json::{Map, Value};

/// Get the value at a dotted path, if present.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(doc);
    }
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set the value at a dotted path, creating intermediate objects as needed.
/// Non-object intermediate values are replaced by objects.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    if path.is_empty() {
        *doc = value;
        return;
    }
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    let mut current = doc;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        let map = current.as_object_mut().unwrap();
        if i == segments.len() - 1 {
            map.insert((*segment).to_string(), value);
            return;
        }
        let next = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !next.is_object() {
            *next = Value::Object(Map::new());
        }
        current = next;
    }
}

/// Remove the value at a dotted path, returning it if present.
pub fn remove_path(doc: &mut Value, path: &str) -> Option<Value> {
    let (parent_path, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    };
    let parent = if parent_path.is_empty() {
        doc
    } else {
        get_path_mut(doc, parent_path)?
    };
    parent.as_object_mut()?.remove(leaf)
}

/// Mutable access to the value at a dotted path.
pub fn get_path_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    if path.is_empty() {
        return Some(doc);
    }
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

/// True when the value at the path is absent, null, or a blank string.
pub fn is_blank_at(doc: &Value, path: &str) -> bool {
    match get_path(doc, path) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}
