//! Projection: reshaping documents by inclusion or exclusion
//!
//! A projection is either inclusive (`{a: 1, b: 1}`: keep only the listed
//! fields) or exclusive (`{a: 0}`: keep everything else). The identity field
//! is kept in both modes unless it is listed with `0`/`false`. Inclusive
//! projections may also compute fields from expressions (`{total: "$price"}`).

use crate::document::ID_FIELD;
use crate::error::{MemDocError, Result};
use crate::expression::Expression;
use crate::path::{get_path, set_path, unset_path};
use bson::{Bson, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    Inclusive,
    Exclusive,
}

#[derive(Debug, Clone, PartialEq)]
enum FieldAction {
    Include,
    Exclude,
    Computed(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    mode: ProjectionMode,
    include_id: bool,
    computed_id: Option<Expression>,
    fields: Vec<(String, FieldAction)>,
}

impl Default for Projection {
    /// The empty projection, which leaves documents unchanged
    fn default() -> Self {
        Projection {
            mode: ProjectionMode::Exclusive,
            include_id: true,
            computed_id: None,
            fields: Vec::new(),
        }
    }
}

/// `Some(true)` for an inclusion marker, `Some(false)` for an exclusion
/// marker, `None` for anything else.
fn marker(value: &Bson) -> Option<bool> {
    match value {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(n) => Some(*n != 0),
        Bson::Int64(n) => Some(*n != 0),
        Bson::Double(n) => Some(*n != 0.0),
        _ => None,
    }
}

fn parse_action(field: &str, value: &Bson) -> Result<FieldAction> {
    if let Some(include) = marker(value) {
        return Ok(if include {
            FieldAction::Include
        } else {
            FieldAction::Exclude
        });
    }
    match value {
        Bson::String(s) if s.starts_with('$') => Ok(FieldAction::Computed(Expression::parse(value)?)),
        Bson::Document(_) => Ok(FieldAction::Computed(Expression::parse(value)?)),
        other => Err(MemDocError::InvalidProjection(format!(
            "unsupported projection value for '{}': {}",
            field, other
        ))),
    }
}

impl Projection {
    pub fn parse(spec: &Document) -> Result<Self> {
        let mut projection = Projection::default();
        let mut has_inclusion = false;
        let mut has_exclusion = false;

        for (field, value) in spec {
            let action = parse_action(field, value)?;
            if field == ID_FIELD {
                match action {
                    FieldAction::Include => projection.include_id = true,
                    FieldAction::Exclude => projection.include_id = false,
                    FieldAction::Computed(expr) => projection.computed_id = Some(expr),
                }
                continue;
            }
            match action {
                FieldAction::Exclude => has_exclusion = true,
                FieldAction::Include | FieldAction::Computed(_) => has_inclusion = true,
            }
            projection.fields.push((field.clone(), action));
        }

        if has_inclusion && has_exclusion {
            return Err(MemDocError::InvalidProjection(
                "cannot mix inclusion and exclusion in one projection".to_string(),
            ));
        }
        if has_inclusion || (projection.fields.is_empty() && spec.contains_key(ID_FIELD) && projection.include_id) {
            projection.mode = ProjectionMode::Inclusive;
        }
        Ok(projection)
    }

    pub fn mode(&self) -> ProjectionMode {
        self.mode
    }

    /// True when applying this projection returns documents unchanged.
    pub fn is_identity(&self) -> bool {
        self.mode == ProjectionMode::Exclusive
            && self.fields.is_empty()
            && self.include_id
            && self.computed_id.is_none()
    }

    /// Reshaped copy of `doc`.
    pub fn apply(&self, doc: &Document) -> Result<Document> {
        match self.mode {
            ProjectionMode::Inclusive => self.apply_inclusive(doc),
            ProjectionMode::Exclusive => self.apply_exclusive(doc),
        }
    }

    fn apply_id(&self, doc: &Document, result: &mut Document) -> Result<()> {
        if let Some(expr) = &self.computed_id {
            if let Some(value) = expr.evaluate(doc)? {
                result.insert(ID_FIELD, value);
            }
        } else if self.include_id {
            if let Some(id) = doc.get(ID_FIELD) {
                result.insert(ID_FIELD, id.clone());
            }
        }
        Ok(())
    }

    fn apply_inclusive(&self, doc: &Document) -> Result<Document> {
        let mut result = Document::new();
        self.apply_id(doc, &mut result)?;
        for (path, action) in &self.fields {
            let value = match action {
                FieldAction::Include => get_path(doc, path).cloned(),
                FieldAction::Computed(expr) => expr.evaluate(doc)?,
                FieldAction::Exclude => None,
            };
            if let Some(value) = value {
                set_path(&mut result, path, value)?;
            }
        }
        Ok(result)
    }

    fn apply_exclusive(&self, doc: &Document) -> Result<Document> {
        let mut result = doc.clone();
        for (path, _) in &self.fields {
            unset_path(&mut result, path);
        }
        if self.computed_id.is_some() {
            let mut with_id = Document::new();
            self.apply_id(doc, &mut with_id)?;
            result.remove(ID_FIELD);
            for (key, value) in result {
                with_id.insert(key, value);
            }
            return Ok(with_id);
        }
        if !self.include_id {
            result.remove(ID_FIELD);
        }
        Ok(result)
    }
}

/// One-shot helper: parse `spec` and apply it to `doc`.
pub fn project(doc: &Document, spec: &Document) -> Result<Document> {
    if spec.is_empty() {
        return Ok(doc.clone());
    }
    Projection::parse(spec)?.apply(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn sample() -> Document {
        doc! {
            "_id": 1,
            "name": "Alice",
            "age": 30,
            "address": {"city": "Szeged", "zip": "6720"},
        }
    }

    // ========== Mode detection tests ==========

    #[test]
    fn test_empty_spec_is_identity() {
        assert_eq!(project(&sample(), &doc! {}).unwrap(), sample());
        assert!(Projection::parse(&doc! {}).unwrap().is_identity());
    }

    #[test]
    fn test_mixing_fails() {
        let err = Projection::parse(&doc! {"name": 1, "age": 0}).unwrap_err();
        assert!(matches!(err, MemDocError::InvalidProjection(_)));
    }

    #[test]
    fn test_id_exclusion_allowed_in_inclusive_mode() {
        let projection = Projection::parse(&doc! {"name": 1, "_id": 0}).unwrap();
        assert_eq!(projection.mode(), ProjectionMode::Inclusive);
        assert_eq!(projection.apply(&sample()).unwrap(), doc! {"name": "Alice"});
    }

    #[test]
    fn test_invalid_value() {
        let err = Projection::parse(&doc! {"name": "yes"}).unwrap_err();
        assert!(err.to_string().contains("unsupported projection value"));
    }

    // ========== Inclusive tests ==========

    #[test]
    fn test_inclusive_keeps_listed_and_id() {
        let result = project(&sample(), &doc! {"age": 1}).unwrap();
        assert_eq!(result, doc! {"_id": 1, "age": 30});
        let keys: Vec<&String> = result.keys().collect();
        assert_eq!(keys, vec!["_id", "age"]);
    }

    #[test]
    fn test_inclusive_missing_field_omitted() {
        let result = project(&sample(), &doc! {"nickname": true}).unwrap();
        assert_eq!(result, doc! {"_id": 1});
    }

    #[test]
    fn test_inclusive_dotted_path_builds_nested() {
        let result = project(&sample(), &doc! {"address.city": 1, "_id": false}).unwrap();
        assert_eq!(result, doc! {"address": {"city": "Szeged"}});
    }

    #[test]
    fn test_only_id_included() {
        let result = project(&sample(), &doc! {"_id": 1}).unwrap();
        assert_eq!(result, doc! {"_id": 1});
    }

    #[test]
    fn test_computed_fields() {
        let result = project(
            &sample(),
            &doc! {"who": "$name", "later": {"$add": ["$age", 5]}, "_id": 0},
        )
        .unwrap();
        assert_eq!(result, doc! {"who": "Alice", "later": 35});
    }

    // ========== Exclusive tests ==========

    #[test]
    fn test_exclusive_drops_listed() {
        let result = project(&sample(), &doc! {"age": 0, "address.zip": 0}).unwrap();
        assert_eq!(
            result,
            doc! {"_id": 1, "name": "Alice", "address": {"city": "Szeged"}}
        );
    }

    #[test]
    fn test_exclusive_id_only() {
        let result = project(&sample(), &doc! {"_id": 0}).unwrap();
        assert!(!result.contains_key("_id"));
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_projection_is_a_copy() {
        let original = sample();
        let mut result = project(&original, &doc! {"age": 0}).unwrap();
        result.insert("name", "Changed");
        assert_eq!(original.get_str("name").unwrap(), "Alice");
    }
}
