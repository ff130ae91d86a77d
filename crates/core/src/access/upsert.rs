use crate::codec::{encode_value, AttributeMap};
use crate::error::{AccessError, Result};
use crate::retry::{RetryPolicy, Sleeper};
use crate::storage::{ReturnValues, TableStore, UpdateRequest};
use crate::value::Record;

use super::expression::{update_expression, ConditionBinding, KeyNames, Placeholders};
use super::Item;

/// Parameters of an upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertParams {
    pub table_name: String,
    /// Flat attributes to write, including the key attributes.
    pub values: Record,
    pub key_names: KeyNames,
    pub condition_expression: Option<String>,
    pub condition_bindings: Vec<ConditionBinding>,
    /// Attributes to remove. Key attributes and repeats are ignored.
    pub remove: Vec<String>,
    pub return_values: ReturnValues,
    pub decode: bool,
}

impl UpsertParams {
    pub fn new(table_name: impl Into<String>, values: Record) -> Self {
        Self {
            table_name: table_name.into(),
            values,
            key_names: KeyNames::default(),
            condition_expression: None,
            condition_bindings: Vec::new(),
            remove: Vec::new(),
            return_values: ReturnValues::default(),
            decode: true,
        }
    }

    pub fn key_names(mut self, key_names: KeyNames) -> Self {
        self.key_names = key_names;
        self
    }

    pub fn condition(
        mut self,
        expression: impl Into<String>,
        bindings: Vec<ConditionBinding>,
    ) -> Self {
        self.condition_expression = Some(expression.into());
        self.condition_bindings = bindings;
        self
    }

    pub fn remove(mut self, attributes: Vec<String>) -> Self {
        self.remove = attributes;
        self
    }

    pub fn return_values(mut self, return_values: ReturnValues) -> Self {
        self.return_values = return_values;
        self
    }

    pub fn raw(mut self) -> Self {
        self.decode = false;
        self
    }
}

/// Builds the conditional update for `params`.
///
/// Every non-key attribute gets a `SET #a = :a` assignment and every removed
/// non-key attribute a `REMOVE #a` path. Key attributes only appear in the key.
pub fn build_update_request(params: &UpsertParams) -> Result<UpdateRequest> {
    let keys = &params.key_names;
    let partition_value = params.values.get(&keys.partition).ok_or_else(|| {
        AccessError::InvalidRequest(format!(
            "Missing partition key attribute {}",
            keys.partition
        ))
    })?;

    let mut key = AttributeMap::new();
    key.insert(keys.partition.clone(), encode_value(partition_value)?);
    if let Some(sort_key) = &keys.sort {
        if let Some(sort_value) = params.values.get(sort_key) {
            key.insert(sort_key.clone(), encode_value(sort_value)?);
        }
    }

    let mut placeholders = Placeholders::default();
    let mut assignments = Vec::new();
    for (attribute, value) in &params.values {
        if keys.is_key(attribute) {
            continue;
        }
        let (name, value) = placeholders.bind_attribute(attribute, encode_value(value)?)?;
        assignments.push(format!("{name} = {value}"));
    }

    for binding in &params.condition_bindings {
        placeholders.apply(binding)?;
    }

    let mut removals = Vec::new();
    for attribute in &params.remove {
        if keys.is_key(attribute) {
            continue;
        }
        if params.values.contains_key(attribute) {
            return Err(AccessError::InvalidRequest(format!(
                "Attribute {attribute} cannot be both set and removed"
            )));
        }
        let name = format!("#{}", super::placeholder_token(attribute));
        if removals.contains(&name) {
            continue;
        }
        placeholders.bind_name(&name, attribute)?;
        removals.push(name);
    }

    let (names, values) = placeholders.into_parts();

    Ok(UpdateRequest {
        table_name: params.table_name.clone(),
        key,
        update_expression: update_expression(&assignments, &removals),
        condition_expression: params.condition_expression.clone(),
        expression_attribute_names: names,
        expression_attribute_values: values,
        return_values: Some(params.return_values),
    })
}

/// Writes the non-key attributes of a record, creating it if needed.
///
/// Returns the attributes selected by `return_values`, or `None` when the
/// mode is `ReturnValues::None` or the store returned nothing.
pub async fn upsert_rec<S: TableStore + ?Sized>(
    store: &S,
    params: &UpsertParams,
) -> Result<Option<Item>> {
    let request = build_update_request(params)?;
    tracing::debug!(
        table = %request.table_name,
        update = request.update_expression.as_deref().unwrap_or_default(),
        "Upserting record"
    );

    let output = store.update_item(&request).await?;
    returned_item(output.attributes, params)
}

/// Like [`upsert_rec`], retrying transient store errors per `policy`.
pub async fn upsert_rec_robust<S: TableStore + ?Sized>(
    store: &S,
    params: &UpsertParams,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Result<Option<Item>> {
    let request = build_update_request(params)?;
    tracing::debug!(
        table = %request.table_name,
        update = request.update_expression.as_deref().unwrap_or_default(),
        "Upserting record with retries"
    );

    let request = &request;
    let output = policy
        .run(sleeper, || store.update_item(request))
        .await?;
    returned_item(output.attributes, params)
}

fn returned_item(attributes: Option<AttributeMap>, params: &UpsertParams) -> Result<Option<Item>> {
    if params.return_values == ReturnValues::None {
        return Ok(None);
    }
    attributes
        .map(|attributes| Item::from_attributes(attributes, params.decode))
        .transpose()
}
