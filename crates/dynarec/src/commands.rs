//! Command handlers.
//!
//! Each handler runs one access operation and returns its JSON output. They
//! are generic over the store so the in-memory store can stand in for
//! DynamoDB in tests.

use std::path::Path;

use anyhow::{bail, Context, Result};
use dynarec_core::access::{DeleteParams, Item, QueryParams, TableAccess, UpsertParams};
use dynarec_core::cursor::Cursor;
use dynarec_core::storage::TableStore;
use dynarec_core::value::{Record, Value};
use serde_json::json;

use crate::cli::{DeleteArgs, GetArgs, QueryArgs, UpsertArgs, WriteArgs};

fn item_json(item: Option<Item>) -> serde_json::Value {
    item.map(|item| item.to_json())
        .unwrap_or(serde_json::Value::Null)
}

fn into_record(value: Value) -> Result<Record> {
    match value {
        Value::Map(record) => Ok(record),
        other => bail!("expected a JSON object, got {}", other.type_name()),
    }
}

pub async fn query<S: TableStore>(
    access: &TableAccess<S>,
    args: QueryArgs,
    default_page_size: i32,
) -> Result<serde_json::Value> {
    let mut params = QueryParams::new(args.table, args.keys.pkey_name, args.pkey)
        .page_size(args.limit.unwrap_or(default_page_size))
        .cursor(args.cursor.map(Cursor::from))
        .consistent_read(args.consistent)
        .ascending(!args.descending);
    if !args.keys.no_skey {
        params = params.sort_key(args.keys.skey_name);
    }
    if let Some(skey) = args.skey {
        params = params.sort_value(skey);
    }
    if let Some(prefix) = args.prefix {
        params = params.sort_prefix(prefix);
    }
    if let Some(index) = args.index {
        params = params.index_name(index);
    }
    if args.raw {
        params = params.raw();
    }

    let page = access.get_recs_and_token(&params).await?;
    Ok(json!({
        "records": page.records.to_json(),
        "cursor": page.cursor.map(|cursor| cursor.to_string()),
    }))
}

pub async fn get<S: TableStore>(
    access: &TableAccess<S>,
    args: GetArgs,
) -> Result<serde_json::Value> {
    let mut params = QueryParams::new(args.table, args.keys.pkey_name, args.pkey)
        .consistent_read(args.consistent);
    if let Some(skey) = args.skey {
        if args.keys.no_skey {
            bail!("--skey cannot be used with --no-skey");
        }
        params = params.sort_key(args.keys.skey_name).sort_value(skey);
    }
    if args.raw {
        params = params.raw();
    }

    Ok(item_json(access.get_rec(&params).await?))
}

pub async fn upsert<S: TableStore>(
    access: &TableAccess<S>,
    args: UpsertArgs,
) -> Result<serde_json::Value> {
    let key_names = args.keys.key_names();
    let mut params = UpsertParams::new(args.table, into_record(args.item)?)
        .key_names(key_names)
        .remove(args.remove)
        .return_values(args.return_values);
    if let Some(condition) = args.condition {
        params = params.condition(condition, args.bindings);
    } else if !args.bindings.is_empty() {
        bail!("--bind requires --condition");
    }
    if args.raw {
        params = params.raw();
    }

    let item = if args.no_retry {
        access.upsert_rec(&params).await?
    } else {
        access.upsert_rec_robust(&params).await?
    };
    Ok(item_json(item))
}

pub async fn delete<S: TableStore>(
    access: &TableAccess<S>,
    args: DeleteArgs,
) -> Result<serde_json::Value> {
    let mut params = DeleteParams::new(args.table, args.pkey).key_names(args.keys.key_names());
    if let Some(skey) = args.skey {
        params = params.sort_value(skey);
    }
    if let Some(condition) = args.condition {
        params = params.condition(condition, args.bindings);
    } else if !args.bindings.is_empty() {
        bail!("--bind requires --condition");
    }
    if args.raw {
        params = params.raw();
    }

    Ok(item_json(access.delete_rec(&params).await?))
}

/// Reads the records for `write`, inline or from an `@path` file.
fn load_items(source: &str) -> Result<Vec<Record>> {
    let raw = match source.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read {path}"))?,
        None => source.to_string(),
    };
    let json: serde_json::Value = serde_json::from_str(&raw).context("Invalid JSON items")?;
    let serde_json::Value::Array(items) = json else {
        bail!("items must be a JSON array");
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            into_record(Value::from(item)).with_context(|| format!("Invalid item at index {index}"))
        })
        .collect()
}

pub async fn write<S: TableStore>(
    access: &TableAccess<S>,
    args: WriteArgs,
) -> Result<serde_json::Value> {
    let items = load_items(&args.items)?;
    let report = access.write_recs(&args.table, &items).await?;

    let failures: Vec<_> = report
        .failures
        .iter()
        .map(|failure| {
            json!({
                "index": failure.index,
                "error": failure.error.to_string(),
                "code": failure.error.code(),
                "progress": failure.progress,
            })
        })
        .collect();

    Ok(json!({
        "success": report.is_success(),
        "written": report.written,
        "failures": failures,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use clap::Parser;
    use dynarec_core::retry::Sleeper;
    use dynarec_core::storage::{InMemoryStore, KeySchema, StoreError};

    use super::*;
    use crate::cli::{Cli, Commands};

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    async fn access() -> TableAccess<InMemoryStore> {
        let store = InMemoryStore::new();
        store
            .create_table("events", KeySchema::new("pkey", Some("skey".to_string())))
            .await;
        TableAccess::new(store).with_sleeper(Arc::new(NoSleep))
    }

    fn command(args: &[&str]) -> Commands {
        let mut argv = vec!["dynarec"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    async fn run(access: &TableAccess<InMemoryStore>, args: &[&str]) -> Result<serde_json::Value> {
        match command(args) {
            Commands::Query(args) => query(access, args, 20).await,
            Commands::Get(args) => get(access, args).await,
            Commands::Upsert(args) => upsert(access, args).await,
            Commands::Delete(args) => delete(access, args).await,
            Commands::Write(args) => write(access, args).await,
        }
    }

    #[tokio::test]
    async fn test_upsert_get_delete() {
        let access = access().await;

        let created = run(
            &access,
            &["upsert", "-t", "events", "--item", r#"{"pkey": "s", "skey": "e1", "n": 1}"#],
        )
        .await
        .unwrap();
        assert_eq!(created, json!({"pkey": "s", "skey": "e1", "n": 1}));

        let fetched = run(&access, &["get", "-t", "events", "--pkey", "s", "--skey", "e1"])
            .await
            .unwrap();
        assert_eq!(fetched["n"], json!(1));

        let deleted = run(&access, &["delete", "-t", "events", "--pkey", "s", "--skey", "e1"])
            .await
            .unwrap();
        assert_eq!(deleted["skey"], json!("e1"));

        let missing = run(&access, &["get", "-t", "events", "--pkey", "s", "--skey", "e1"])
            .await
            .unwrap();
        assert_eq!(missing, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_query_pages_with_cursor() {
        let access = access().await;
        run(
            &access,
            &[
                "write",
                "-t",
                "events",
                "--items",
                r#"[{"pkey": "s", "skey": "a"}, {"pkey": "s", "skey": "b"}, {"pkey": "s", "skey": "c"}]"#,
            ],
        )
        .await
        .unwrap();

        let first = run(&access, &["query", "-t", "events", "--pkey", "s", "--limit", "2"])
            .await
            .unwrap();
        assert_eq!(first["records"].as_array().unwrap().len(), 2);
        let cursor = first["cursor"].as_str().unwrap().to_string();

        let second = run(
            &access,
            &["query", "-t", "events", "--pkey", "s", "--limit", "2", "--cursor", &cursor],
        )
        .await
        .unwrap();
        assert_eq!(second["records"], json!([{"pkey": "s", "skey": "c"}]));
        assert_eq!(second["cursor"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_write_reports_failures() {
        let access = access().await;

        let report = run(
            &access,
            &["write", "-t", "events", "--items", r#"[{"skey": "a"}, {"pkey": "s", "skey": "b"}]"#],
        )
        .await
        .unwrap();

        assert_eq!(report["success"], json!(false));
        assert_eq!(report["written"], json!(1));
        assert_eq!(report["failures"][0]["index"], json!(0));
        assert_eq!(report["failures"][0]["progress"], json!(33));
    }

    #[tokio::test]
    async fn test_upsert_no_retry_surfaces_transient_error() {
        let access = access().await;
        access
            .store()
            .fail_next(StoreError::new("RequestLimitExceeded", "slow down"))
            .await;

        let err = run(
            &access,
            &["upsert", "-t", "events", "--no-retry", "--item", r#"{"pkey": "s", "skey": "x"}"#],
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("RequestLimitExceeded"));
    }

    #[test]
    fn test_load_items_rejects_non_array() {
        assert!(load_items(r#"{"pkey": "a"}"#).is_err());
        assert!(load_items(r#"[1]"#).is_err());
        assert_eq!(load_items("[]").unwrap(), Vec::<Record>::new());
    }
}
