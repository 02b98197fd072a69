// src/aggregation/mod.rs
// Aggregation pipeline implementation

pub mod accumulator;

pub use accumulator::Accumulator;

use crate::document::ID_FIELD;
use crate::error::{MemDocError, Result};
use crate::expression::Expression;
use crate::options::{DivideByZeroPolicy, EngineOptions};
use crate::path::{get_path, set_path, unset_path};
use crate::projection::Projection;
use crate::query::{Matcher, Query};
use crate::sort::SortSpec;
use crate::value_utils::{as_integer, canonical_key, count_value};
use crate::{log_trace, log_warn};
use ahash::AHashMap;
use bson::{Bson, Document};

/// Stages the engine recognizes but does not run.
const UNSUPPORTED_STAGES: &[&str] = &[
    "$lookup",
    "$graphLookup",
    "$facet",
    "$bucket",
    "$bucketAuto",
    "$unionWith",
    "$out",
    "$merge",
];

/// Aggregation pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
    divide_by_zero: DivideByZeroPolicy,
}

/// Pipeline stage
#[derive(Debug, Clone)]
pub enum Stage {
    Match(Query),
    Group(GroupStage),
    Project(Projection),
    AddFields(AddFieldsStage),
    Sort(SortSpec),
    Limit(usize),
    Skip(usize),
    Unwind(UnwindStage),
    Count(String),
}

/// $group stage - group documents and compute aggregates
#[derive(Debug, Clone)]
pub struct GroupStage {
    id: Expression,
    accumulators: Vec<(String, Accumulator)>,
}

/// $unwind stage - one output document per array element
#[derive(Debug, Clone, PartialEq)]
pub struct UnwindStage {
    path: String,
    include_array_index: Option<String>,
    preserve_null_and_empty_arrays: bool,
}

/// $addFields / $set stage
#[derive(Debug, Clone)]
pub struct AddFieldsStage {
    fields: Vec<(String, Expression)>,
}

impl Pipeline {
    /// Parse a pipeline given as an array of stage documents.
    pub fn parse(pipeline: &Bson, options: &EngineOptions) -> Result<Self> {
        match pipeline {
            Bson::Array(stages) => {
                let mut parsed = Vec::with_capacity(stages.len());
                for stage in stages {
                    let stage = stage.as_document().ok_or_else(|| {
                        MemDocError::InvalidPipeline("Stage must be an object".to_string())
                    })?;
                    if let Some(stage) = Stage::parse(stage, options.strict_stages)? {
                        parsed.push(stage);
                    }
                }
                Ok(Pipeline {
                    stages: parsed,
                    divide_by_zero: options.divide_by_zero,
                })
            }
            _ => Err(MemDocError::InvalidPipeline(
                "Pipeline must be an array".to_string(),
            )),
        }
    }

    /// Parse from a slice of stage documents.
    pub fn from_stages(stages: &[Document], options: &EngineOptions) -> Result<Self> {
        let array = stages.iter().cloned().map(Bson::Document).collect();
        Pipeline::parse(&Bson::Array(array), options)
    }

    /// Parse from JSON, e.g. `[{"$match": {...}}, {"$group": {...}}]`
    pub fn from_json(pipeline_json: &serde_json::Value, options: &EngineOptions) -> Result<Self> {
        let pipeline = Bson::try_from(pipeline_json.clone())
            .map_err(|e| MemDocError::InvalidPipeline(e.to_string()))?;
        Pipeline::parse(&pipeline, options)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Execute pipeline on documents
    pub fn execute(&self, mut docs: Vec<Document>) -> Result<Vec<Document>> {
        for stage in &self.stages {
            let input = docs.len();
            docs = stage.execute(docs, self.divide_by_zero)?;
            log_trace!("{} stage: {} -> {} documents", stage.name(), input, docs.len());
        }
        Ok(docs)
    }
}

/// Run `pipeline` over `documents` with default options.
pub fn run(documents: Vec<Document>, pipeline: &Bson) -> Result<Vec<Document>> {
    run_with_options(documents, pipeline, &EngineOptions::default())
}

pub fn run_with_options(
    documents: Vec<Document>,
    pipeline: &Bson,
    options: &EngineOptions,
) -> Result<Vec<Document>> {
    Pipeline::parse(pipeline, options)?.execute(documents)
}

impl Stage {
    /// Parse one `{$stage: spec}` document. Unknown stages are an error in
    /// strict mode and are dropped (`Ok(None)`) otherwise.
    pub fn parse(stage: &Document, strict: bool) -> Result<Option<Self>> {
        let (stage_name, stage_spec) = match stage.iter().next() {
            Some(entry) if stage.len() == 1 => entry,
            _ => {
                return Err(MemDocError::InvalidPipeline(
                    "Each stage must have exactly one operator".to_string(),
                ))
            }
        };

        let stage = match stage_name.as_str() {
            "$match" => Stage::Match(Query::new(stage_object(stage_name, stage_spec)?.clone())?),
            "$group" => Stage::Group(GroupStage::parse(stage_object(stage_name, stage_spec)?)?),
            "$project" => Stage::Project(Projection::parse(stage_object(stage_name, stage_spec)?)?),
            "$addFields" | "$set" => {
                Stage::AddFields(AddFieldsStage::parse(stage_object(stage_name, stage_spec)?)?)
            }
            "$sort" => Stage::Sort(SortSpec::from_bson(stage_spec)?),
            "$limit" => Stage::Limit(non_negative(stage_name, stage_spec)?),
            "$skip" => Stage::Skip(non_negative(stage_name, stage_spec)?),
            "$unwind" => Stage::Unwind(UnwindStage::parse(stage_spec)?),
            "$count" => Stage::Count(parse_count(stage_spec)?),
            name if UNSUPPORTED_STAGES.contains(&name) => {
                return Err(MemDocError::UnsupportedStage(name.to_string()))
            }
            name if strict => {
                return Err(MemDocError::InvalidPipeline(format!(
                    "Unknown pipeline stage: {}",
                    name
                )))
            }
            name => {
                log_warn!("skipping unknown pipeline stage {}", name);
                return Ok(None);
            }
        };
        Ok(Some(stage))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Group(_) => "$group",
            Stage::Project(_) => "$project",
            Stage::AddFields(_) => "$addFields",
            Stage::Sort(_) => "$sort",
            Stage::Limit(_) => "$limit",
            Stage::Skip(_) => "$skip",
            Stage::Unwind(_) => "$unwind",
            Stage::Count(_) => "$count",
        }
    }

    /// Execute this stage
    fn execute(&self, docs: Vec<Document>, policy: DivideByZeroPolicy) -> Result<Vec<Document>> {
        match self {
            Stage::Match(query) => {
                let mut results = Vec::new();
                for doc in docs {
                    if query.matches(&doc)? {
                        results.push(doc);
                    }
                }
                Ok(results)
            }
            Stage::Group(stage) => stage.execute(docs, policy),
            Stage::Project(projection) => docs.iter().map(|doc| projection.apply(doc)).collect(),
            Stage::AddFields(stage) => docs.into_iter().map(|doc| stage.apply(doc)).collect(),
            Stage::Sort(spec) => {
                let mut docs = docs;
                spec.sort_documents(&mut docs);
                Ok(docs)
            }
            Stage::Limit(limit) => Ok(docs.into_iter().take(*limit).collect()),
            Stage::Skip(skip) => Ok(docs.into_iter().skip(*skip).collect()),
            Stage::Unwind(stage) => stage.execute(docs),
            Stage::Count(field) => {
                if docs.is_empty() {
                    return Ok(Vec::new());
                }
                let mut result = Document::new();
                result.insert(field.clone(), count_value(docs.len()));
                Ok(vec![result])
            }
        }
    }
}

fn stage_object<'a>(stage_name: &str, spec: &'a Bson) -> Result<&'a Document> {
    spec.as_document().ok_or_else(|| {
        MemDocError::InvalidPipeline(format!("{} must be an object", stage_name))
    })
}

fn non_negative(stage_name: &str, spec: &Bson) -> Result<usize> {
    match as_integer(spec) {
        Some(n) if n >= 0 => Ok(n as usize),
        _ => Err(MemDocError::InvalidPipeline(format!(
            "{} must be a non-negative integer",
            stage_name
        ))),
    }
}

fn parse_count(spec: &Bson) -> Result<String> {
    match spec {
        Bson::String(name) if !name.is_empty() && !name.starts_with('$') && !name.contains('.') => {
            Ok(name.clone())
        }
        _ => Err(MemDocError::InvalidPipeline(
            "$count requires a non-empty field name without '$' or '.'".to_string(),
        )),
    }
}

impl GroupStage {
    fn parse(spec: &Document) -> Result<Self> {
        // A group without _id collects every document under null
        let id = match spec.get(ID_FIELD) {
            Some(id) => Expression::parse(id)?,
            None => Expression::Literal(Bson::Null),
        };

        let mut accumulators = Vec::new();
        for (field, value) in spec {
            if field == ID_FIELD {
                continue;
            }
            if field.contains('.') || field.starts_with('$') {
                return Err(MemDocError::InvalidPipeline(format!(
                    "$group field name '{}' may not contain '.' or start with '$'",
                    field
                )));
            }
            accumulators.push((field.clone(), Accumulator::parse(value)?));
        }

        Ok(GroupStage { id, accumulators })
    }

    fn execute(&self, docs: Vec<Document>, policy: DivideByZeroPolicy) -> Result<Vec<Document>> {
        // Groups in first-encounter order
        let mut groups: Vec<(Bson, Vec<usize>)> = Vec::new();
        let mut positions: AHashMap<String, usize> = AHashMap::new();

        for (i, doc) in docs.iter().enumerate() {
            let key = self.id.evaluate(doc)?.unwrap_or(Bson::Null);
            let slot = *positions.entry(canonical_key(&key)).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(i);
        }

        let mut results = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let members: Vec<&Document> = members.iter().map(|&i| &docs[i]).collect();
            let mut result = Document::new();
            result.insert(ID_FIELD, key);
            for (field, accumulator) in &self.accumulators {
                result.insert(field.clone(), accumulator.compute(&members, policy)?);
            }
            results.push(result);
        }
        Ok(results)
    }
}

impl UnwindStage {
    fn parse(spec: &Bson) -> Result<Self> {
        let (path, include_array_index, preserve) = match spec {
            Bson::String(path) => (path.as_str(), None, false),
            Bson::Document(options) => {
                let path = match options.get("path") {
                    Some(Bson::String(path)) => path.as_str(),
                    _ => "",
                };
                let include_array_index = match options.get("includeArrayIndex") {
                    None => None,
                    Some(Bson::String(name)) if !name.is_empty() && !name.starts_with('$') => {
                        Some(name.clone())
                    }
                    Some(_) => {
                        return Err(MemDocError::InvalidPipeline(
                            "$unwind includeArrayIndex must be a field name".to_string(),
                        ))
                    }
                };
                let preserve = match options.get("preserveNullAndEmptyArrays") {
                    None => false,
                    Some(Bson::Boolean(b)) => *b,
                    Some(_) => {
                        return Err(MemDocError::InvalidPipeline(
                            "$unwind preserveNullAndEmptyArrays must be a boolean".to_string(),
                        ))
                    }
                };
                (path, include_array_index, preserve)
            }
            _ => {
                return Err(MemDocError::InvalidPipeline(
                    "$unwind requires a path or an options object".to_string(),
                ))
            }
        };

        let path = match path.strip_prefix('$') {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => {
                return Err(MemDocError::InvalidPipeline(
                    "$unwind path must be a non-empty field path prefixed with '$'".to_string(),
                ))
            }
        };

        Ok(UnwindStage {
            path,
            include_array_index,
            preserve_null_and_empty_arrays: preserve,
        })
    }

    fn execute(&self, docs: Vec<Document>) -> Result<Vec<Document>> {
        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            match get_path(&doc, &self.path).cloned() {
                Some(Bson::Array(items)) if !items.is_empty() => {
                    for (index, item) in items.into_iter().enumerate() {
                        let mut out = doc.clone();
                        set_path(&mut out, &self.path, item)?;
                        if let Some(field) = &self.include_array_index {
                            set_path(&mut out, field, Bson::Int64(index as i64))?;
                        }
                        results.push(out);
                    }
                }
                Some(Bson::Array(_)) | Some(Bson::Null) | None => {
                    if self.preserve_null_and_empty_arrays {
                        let mut out = doc;
                        // an empty array is cleared, null and missing stay as they are
                        if matches!(get_path(&out, &self.path), Some(Bson::Array(_))) {
                            unset_path(&mut out, &self.path);
                        }
                        results.push(out);
                    }
                }
                // an empty string unwinds like an empty array
                Some(Bson::String(s)) if s.is_empty() => {
                    if self.preserve_null_and_empty_arrays {
                        let mut out = doc;
                        unset_path(&mut out, &self.path);
                        results.push(out);
                    }
                }
                Some(_) => {
                    let mut out = doc;
                    if let Some(field) = &self.include_array_index {
                        set_path(&mut out, field, Bson::Null)?;
                    }
                    results.push(out);
                }
            }
        }
        Ok(results)
    }
}

impl AddFieldsStage {
    fn parse(spec: &Document) -> Result<Self> {
        let mut fields = Vec::with_capacity(spec.len());
        for (field, value) in spec {
            if field.starts_with('$') {
                return Err(MemDocError::InvalidPipeline(format!(
                    "$addFields field name '{}' may not start with '$'",
                    field
                )));
            }
            fields.push((field.clone(), Expression::parse(value)?));
        }
        Ok(AddFieldsStage { fields })
    }

    /// Expressions see the incoming document, not the partially updated one.
    fn apply(&self, doc: Document) -> Result<Document> {
        let mut out = doc.clone();
        for (field, expr) in &self.fields {
            if let Some(value) = expr.evaluate(&doc)? {
                set_path(&mut out, field, value)?;
            }
        }
        Ok(out)
    }
}
