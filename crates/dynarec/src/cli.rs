//! CLI command definitions.

use clap::{Args, Parser, Subcommand};
use dynarec_core::access::{ConditionBinding, KeyNames, DEFAULT_PARTITION_KEY, DEFAULT_SORT_KEY};
use dynarec_core::storage::ReturnValues;
use dynarec_core::value::Value;

/// dynarec - Query, upsert and delete records in DynamoDB tables
#[derive(Debug, Parser)]
#[command(name = "dynarec")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Custom DynamoDB endpoint URL (for local DynamoDB).
    #[arg(long, global = true, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// AWS region.
    #[arg(long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Query one page of a partition.
    Query(QueryArgs),
    /// Fetch a single record.
    Get(GetArgs),
    /// Create or update a record.
    Upsert(UpsertArgs),
    /// Delete a record.
    Delete(DeleteArgs),
    /// Upsert a JSON array of records using the table's own key names.
    Write(WriteArgs),
}

/// Key attribute names.
#[derive(Debug, Clone, Args)]
pub struct KeyArgs {
    /// Partition key attribute name.
    #[arg(long, default_value = DEFAULT_PARTITION_KEY)]
    pub pkey_name: String,

    /// Sort key attribute name.
    #[arg(long, default_value = DEFAULT_SORT_KEY)]
    pub skey_name: String,

    /// The table has no sort key.
    #[arg(long, conflicts_with = "skey_name")]
    pub no_skey: bool,
}

impl KeyArgs {
    pub fn key_names(&self) -> KeyNames {
        let sort = (!self.no_skey).then(|| self.skey_name.clone());
        KeyNames::new(self.pkey_name.clone(), sort)
    }
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Table name.
    #[arg(long, short)]
    pub table: String,

    #[command(flatten)]
    pub keys: KeyArgs,

    /// Partition key value (JSON, or a plain string).
    #[arg(long, value_parser = parse_value)]
    pub pkey: Value,

    /// Exact sort key value (JSON, or a plain string).
    #[arg(long, value_parser = parse_value, conflicts_with = "prefix")]
    pub skey: Option<Value>,

    /// Sort key prefix.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Page size. Defaults to `DYNAREC_PAGE_SIZE`.
    #[arg(long, short)]
    pub limit: Option<i32>,

    /// Cursor returned by a previous page.
    #[arg(long)]
    pub cursor: Option<String>,

    /// Use strongly consistent reads.
    #[arg(long)]
    pub consistent: bool,

    /// Return items in descending sort key order.
    #[arg(long)]
    pub descending: bool,

    /// Query a secondary index.
    #[arg(long)]
    pub index: Option<String>,

    /// Print items in the tagged wire form.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Table name.
    #[arg(long, short)]
    pub table: String,

    #[command(flatten)]
    pub keys: KeyArgs,

    /// Partition key value (JSON, or a plain string).
    #[arg(long, value_parser = parse_value)]
    pub pkey: Value,

    /// Sort key value (JSON, or a plain string).
    #[arg(long, value_parser = parse_value)]
    pub skey: Option<Value>,

    /// Use strongly consistent reads.
    #[arg(long)]
    pub consistent: bool,

    /// Print the item in the tagged wire form.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct UpsertArgs {
    /// Table name.
    #[arg(long, short)]
    pub table: String,

    #[command(flatten)]
    pub keys: KeyArgs,

    /// Record as a JSON object, including its key attributes.
    #[arg(long, value_parser = parse_record)]
    pub item: Value,

    /// Condition expression.
    #[arg(long)]
    pub condition: Option<String>,

    /// Condition binding as TOKEN=JSON (`:v=1`, `#n=name`, `attr=2`).
    #[arg(long = "bind", value_parser = parse_binding)]
    pub bindings: Vec<ConditionBinding>,

    /// Attribute to remove. Can be repeated.
    #[arg(long)]
    pub remove: Vec<String>,

    /// Which attributes to return.
    #[arg(long, default_value = "ALL_NEW", value_parser = parse_return_values)]
    pub return_values: ReturnValues,

    /// Fail on the first transient error instead of retrying.
    #[arg(long)]
    pub no_retry: bool,

    /// Print the result in the tagged wire form.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Table name.
    #[arg(long, short)]
    pub table: String,

    #[command(flatten)]
    pub keys: KeyArgs,

    /// Partition key value (JSON, or a plain string).
    #[arg(long, value_parser = parse_value)]
    pub pkey: Value,

    /// Sort key value (JSON, or a plain string).
    #[arg(long, value_parser = parse_value)]
    pub skey: Option<Value>,

    /// Condition expression.
    #[arg(long)]
    pub condition: Option<String>,

    /// Condition binding as TOKEN=JSON (`:v=1`, `#n=name`, `attr=2`).
    #[arg(long = "bind", value_parser = parse_binding)]
    pub bindings: Vec<ConditionBinding>,

    /// Print the old item in the tagged wire form.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Table name.
    #[arg(long, short)]
    pub table: String,

    /// JSON array of records, or `@path` to read it from a file.
    #[arg(long)]
    pub items: String,
}

/// Parse a value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Result<Value, String> {
    Ok(serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string())))
}

/// Parse a JSON object.
pub fn parse_record(raw: &str) -> Result<Value, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json @ serde_json::Value::Object(_)) => Ok(Value::from(json)),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

/// Parse a `TOKEN=VALUE` condition binding.
pub fn parse_binding(raw: &str) -> Result<ConditionBinding, String> {
    let (token, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TOKEN=VALUE, got {raw:?}"))?;
    if token.is_empty() {
        return Err("binding token must not be empty".to_string());
    }
    Ok(ConditionBinding::parse(token, parse_value(value)?))
}

pub fn parse_return_values(raw: &str) -> Result<ReturnValues, String> {
    raw.parse()
}
