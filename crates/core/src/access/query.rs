use crate::codec::{encode_value, TaggedValue};
use crate::cursor::Cursor;
use crate::error::{AccessError, Result};
use crate::storage::{QueryRequest, TableStore};
use crate::value::Value;

use super::expression::Placeholders;
use super::{Item, Page, RecordSet};

pub const DEFAULT_PAGE_SIZE: i32 = 20;

/// Parameters of a partition query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub table_name: String,
    pub partition_key: String,
    pub partition_value: Value,
    pub sort_key: Option<String>,
    pub sort_value: Option<Value>,
    pub sort_prefix: Option<String>,
    pub page_size: i32,
    pub cursor: Option<Cursor>,
    pub consistent_read: bool,
    pub ascending: bool,
    pub index_name: Option<String>,
    pub decode: bool,
}

impl QueryParams {
    pub fn new(
        table_name: impl Into<String>,
        partition_key: impl Into<String>,
        partition_value: impl Into<Value>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            partition_key: partition_key.into(),
            partition_value: partition_value.into(),
            sort_key: None,
            sort_value: None,
            sort_prefix: None,
            page_size: DEFAULT_PAGE_SIZE,
            cursor: None,
            consistent_read: false,
            ascending: true,
            index_name: None,
            decode: true,
        }
    }

    pub fn sort_key(mut self, name: impl Into<String>) -> Self {
        self.sort_key = Some(name.into());
        self
    }

    /// Restricts the query to the item with this sort key value.
    pub fn sort_value(mut self, value: impl Into<Value>) -> Self {
        self.sort_value = Some(value.into());
        self
    }

    /// Restricts the query to sort keys starting with `prefix`.
    pub fn sort_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sort_prefix = Some(prefix.into());
        self
    }

    pub fn page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }

    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    pub fn index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Keep items in the tagged form.
    pub fn raw(mut self) -> Self {
        self.decode = false;
        self
    }
}

/// Builds the store query for `params`.
pub fn build_query_request(params: &QueryParams) -> Result<QueryRequest> {
    let sort_value = params.sort_value.as_ref().filter(|value| !value.is_null());

    if sort_value.is_some() && params.sort_prefix.is_some() {
        return Err(AccessError::InvalidRequest(
            "A sort key prefix and an exact sort key value cannot be combined".to_string(),
        ));
    }

    let mut placeholders = Placeholders::default();
    placeholders.bind_name("#pkey", &params.partition_key)?;
    placeholders.bind_value(":pkey", encode_value(&params.partition_value)?)?;
    let mut key_condition = String::from("#pkey = :pkey");

    if sort_value.is_some() || params.sort_prefix.is_some() {
        let sort_key = params.sort_key.as_deref().ok_or_else(|| {
            AccessError::InvalidRequest(
                "A sort key condition needs a sort key name".to_string(),
            )
        })?;
        placeholders.bind_name("#skey", sort_key)?;

        if let Some(prefix) = &params.sort_prefix {
            placeholders.bind_value(":skeyprefix", TaggedValue::S(prefix.clone()))?;
            key_condition.push_str(" AND begins_with(#skey, :skeyprefix)");
        }
        if let Some(value) = sort_value {
            placeholders.bind_value(":skey", encode_value(value)?)?;
            key_condition.push_str(" AND #skey = :skey");
        }
    }

    let exclusive_start_key = params.cursor.as_ref().map(Cursor::decode).transpose()?;
    let (names, values) = placeholders.into_parts();

    Ok(QueryRequest {
        table_name: params.table_name.clone(),
        index_name: params.index_name.clone(),
        limit: Some(params.page_size),
        consistent_read: Some(params.consistent_read),
        key_condition_expression: Some(key_condition),
        expression_attribute_names: names,
        expression_attribute_values: values,
        scan_index_forward: Some(params.ascending),
        exclusive_start_key,
    })
}

/// Queries one page of a partition.
///
/// The returned cursor is `None` once the store reports no more items.
pub async fn get_recs_and_token<S: TableStore + ?Sized>(
    store: &S,
    params: &QueryParams,
) -> Result<Page> {
    let request = build_query_request(params)?;
    tracing::debug!(
        table = %request.table_name,
        condition = request.key_condition_expression.as_deref().unwrap_or_default(),
        limit = params.page_size,
        "Querying records"
    );

    let output = store.query(&request).await?;
    let cursor = output
        .last_evaluated_key
        .as_ref()
        .map(Cursor::encode)
        .transpose()?;
    let records = RecordSet::from_items(output.items, params.decode)?;

    Ok(Page { records, cursor })
}

/// Fetches the first matching record.
pub async fn get_rec<S: TableStore + ?Sized>(
    store: &S,
    params: &QueryParams,
) -> Result<Option<Item>> {
    let params = QueryParams {
        page_size: 1,
        cursor: None,
        ..params.clone()
    };
    let page = get_recs_and_token(store, &params).await?;
    Ok(page.records.into_first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStore, KeySchema};
    use crate::value::Record;

    async fn store_with(count: usize) -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .create_table("events", KeySchema::new("pkey", Some("skey".to_string())))
            .await;
        for i in 0..count {
            let mut item = crate::codec::AttributeMap::new();
            item.insert("pkey".to_string(), TaggedValue::S("stream#1".to_string()));
            item.insert("skey".to_string(), TaggedValue::S(format!("event#{i:03}")));
            item.insert("seq".to_string(), TaggedValue::N(i.to_string()));
            store.put_item("events", item).await.unwrap();
        }
        store
    }

    fn params() -> QueryParams {
        QueryParams::new("events", "pkey", "stream#1").sort_key("skey")
    }

    fn records(page: &Page) -> Vec<Record> {
        match &page.records {
            RecordSet::Decoded(records) => records.clone(),
            RecordSet::Raw(_) => panic!("expected decoded records"),
        }
    }

    #[test]
    fn test_key_condition_partition_only() {
        let request = build_query_request(&QueryParams::new("t", "id", "a")).unwrap();

        assert_eq!(request.key_condition_expression.as_deref(), Some("#pkey = :pkey"));
        assert_eq!(request.expression_attribute_names.unwrap()["#pkey"], "id");
        assert_eq!(request.limit, Some(DEFAULT_PAGE_SIZE));
        assert_eq!(request.scan_index_forward, Some(true));
        assert!(request.index_name.is_none());
        assert!(request.exclusive_start_key.is_none());
    }

    #[test]
    fn test_key_condition_with_prefix() {
        let request = build_query_request(&params().sort_prefix("event#00")).unwrap();

        assert_eq!(
            request.key_condition_expression.as_deref(),
            Some("#pkey = :pkey AND begins_with(#skey, :skeyprefix)")
        );
        assert_eq!(
            request.expression_attribute_values.unwrap()[":skeyprefix"],
            TaggedValue::S("event#00".to_string())
        );
    }

    #[test]
    fn test_key_condition_with_exact_sort_value() {
        let request = build_query_request(&params().sort_value("event#001")).unwrap();

        assert_eq!(
            request.key_condition_expression.as_deref(),
            Some("#pkey = :pkey AND #skey = :skey")
        );
    }

    #[test]
    fn test_prefix_and_exact_value_rejected() {
        let err =
            build_query_request(&params().sort_prefix("event").sort_value("event#1")).unwrap_err();
        assert!(matches!(err, AccessError::InvalidRequest(_)));
    }

    #[test]
    fn test_sort_condition_without_sort_key_name_rejected() {
        let err = build_query_request(&QueryParams::new("t", "pkey", "a").sort_value("b"))
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidRequest(_)));
    }

    #[test]
    fn test_bad_cursor_rejected_before_query() {
        let err = build_query_request(&params().cursor(Some(Cursor::from("!!!")))).unwrap_err();
        assert!(matches!(err, AccessError::BadCursor(_)));
    }

    #[tokio::test]
    async fn test_pagination_visits_every_record_once() {
        let store = store_with(7).await;

        let mut pages = 0;
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = get_recs_and_token(&store, &params().page_size(3).cursor(cursor))
                .await
                .unwrap();
            pages += 1;
            seen.extend(records(&page));
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        let all = get_recs_and_token(&store, &params().page_size(100))
            .await
            .unwrap();
        assert_eq!(pages, 3);
        assert_eq!(seen, records(&all));
        assert!(all.cursor.is_none());
    }

    #[tokio::test]
    async fn test_exact_page_size_ends_without_cursor() {
        let store = store_with(3).await;

        let page = get_recs_and_token(&store, &params().page_size(3))
            .await
            .unwrap();

        assert_eq!(page.records.len(), 3);
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn test_descending_raw_query() {
        let store = store_with(3).await;

        let page = get_recs_and_token(&store, &params().ascending(false).raw())
            .await
            .unwrap();

        match page.records {
            RecordSet::Raw(items) => {
                assert_eq!(items[0]["skey"], TaggedValue::S("event#002".to_string()))
            }
            RecordSet::Decoded(_) => panic!("expected raw items"),
        }
    }

    #[tokio::test]
    async fn test_get_rec() {
        let store = store_with(3).await;

        let found = get_rec(&store, &params().sort_value("event#001"))
            .await
            .unwrap()
            .and_then(Item::into_record)
            .unwrap();
        assert_eq!(found["seq"], Value::from(1));

        let missing = get_rec(&store, &params().sort_value("event#999"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
