// Maps a caller-supplied identifier onto a store filter
use serde_json::{Map, Value};

use crate::error::{CrudError, CrudResult};
use crate::ids::ObjectId;
use crate::metadata::EntityMetadata;

/// Build the store filter for a caller-supplied identifier: the primary
/// id field for object-id-shaped values, the declared secondary string
/// identifier for other strings. Ambiguous or invalid inputs are
/// validation failures, never silent scans.
pub fn build_identifier_filter(
    metadata: &EntityMetadata,
    id_value: &Value,
) -> CrudResult<Map<String, Value>> {
    let primary_field = &metadata.identifier.path_to_id;

    match id_value {
        Value::Null => Err(CrudError::validation(format!(
            "{} {} identifier is required",
            metadata.a_or_an, metadata.name
        ))),
        Value::Number(n) => Err(CrudError::validation(format!(
            "Numbers are not valid {} identifiers: {n}",
            metadata.name
        ))),
        Value::String(s) if ObjectId::is_valid(s) => {
            let mut filter = Map::new();
            filter.insert(primary_field.clone(), Value::String(s.clone()));
            Ok(filter)
        }
        Value::Object(_) => Err(CrudError::validation(format!(
            "Objects that are not valid ids cannot identify {}: {id_value}",
            metadata.name_plural
        ))),
        Value::String(s) => match &metadata.string_identifier {
            Some(string_id) => {
                let mut filter = Map::new();
                filter.insert(string_id.path_to_id.clone(), Value::String(s.clone()));
                Ok(filter)
            }
            None => Err(CrudError::validation(format!(
                "'{s}' is neither a valid '{primary_field}' id nor is a string identifier declared for {}",
                metadata.name_plural
            ))),
        },
        other => {
            let secondary = metadata
                .string_identifier
                .as_ref()
                .map(|s| s.path_to_id.as_str())
                .unwrap_or("<none declared>");
            Err(CrudError::validation(format!(
                "Cannot identify {} by '{other}': expected '{primary_field}' (object id) or '{secondary}' (string)",
                metadata.name_plural
            )))
        }
    }
}
