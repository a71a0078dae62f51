//! Typed wrappers for the API endpoints.
//!
//! Each function is a thin call through [`ApiClient`] and returns the decoded
//! JSON unchanged; interpretation is left to the caller. `lang` is the
//! two-letter language segment (`"en"`, `"fr"`, ...).

use serde::Serialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::api::{ApiClient, ApiError};

/// Default language segment.
pub const DEFAULT_LANG: &str = "en";

/// Row filters shared by the data and size-estimate endpoints.
///
/// Each field is a comma-separated code list (`"2018,2019"`); the `*_cs`
/// variants name a server-side code set instead. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filters {
    /// Area codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    /// Element codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    /// Item codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    /// Year codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// Area code set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_cs: Option<String>,
    /// Element code set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_cs: Option<String>,
    /// Item code set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_cs: Option<String>,
    /// Year code set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_cs: Option<String>,
}

impl Filters {
    /// Set filters as `(name, value)` query pairs, in a fixed order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("area", &self.area),
            ("element", &self.element),
            ("item", &self.item),
            ("year", &self.year),
            ("area_cs", &self.area_cs),
            ("element_cs", &self.element_cs),
            ("item_cs", &self.item_cs),
            ("year_cs", &self.year_cs),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.clone().map(|value| (name, value)))
        .collect()
    }

    /// True when no filter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }
}

/// Parameters for [`data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataQuery {
    /// Row filters.
    pub filters: Filters,
    /// Include code columns next to labels.
    pub show_codes: bool,
    /// Include the unit column.
    pub show_unit: bool,
    /// Include flag columns.
    pub show_flags: bool,
    /// Include rows with null values.
    pub null_values: bool,
    /// Response layout; `"objects"` yields one JSON object per row.
    pub output_type: String,
}

impl Default for DataQuery {
    fn default() -> Self {
        Self {
            filters: Filters::default(),
            show_codes: true,
            show_unit: true,
            show_flags: true,
            null_values: false,
            output_type: "objects".to_string(),
        }
    }
}

impl DataQuery {
    /// Default display options with the given filters.
    #[must_use]
    pub fn with_filters(filters: Filters) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// Query pairs: display flags first, then set filters.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("show_codes", self.show_codes.to_string()),
            ("show_unit", self.show_unit.to_string()),
            ("show_flags", self.show_flags.to_string()),
            ("null_values", self.null_values.to_string()),
            ("output_type", self.output_type.clone()),
        ];
        params.extend(self.filters.pairs());
        params
    }
}

/// Body for [`datasize`]: the domain code plus the set filters.
#[must_use]
pub fn datasize_payload(domain_code: &str, filters: &Filters) -> Value {
    let mut payload = json!({ "domain_code": domain_code });
    if let (Some(body), Ok(Value::Object(extra))) = (payload.as_object_mut(), serde_json::to_value(filters)) {
        body.extend(extra);
    }
    payload
}

/// Reads a row-count estimate from a [`datasize`] response.
///
/// Looks at `count`, then `size`; accepts numbers and numeric strings.
#[must_use]
pub fn estimated_rows(response: &Value) -> Option<u64> {
    let field = response
        .get("count")
        .filter(|v| !v.is_null())
        .or_else(|| response.get("size"))?;
    match field {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `GET /ping`: API health.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn ping(client: &ApiClient) -> Result<Value, ApiError> {
    client.get("/ping", &[]).await
}

/// `GET /{lang}/groups/`: top-level data groups.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn groups(client: &ApiClient, lang: &str) -> Result<Value, ApiError> {
    client.get(&format!("/{lang}/groups/"), &[]).await
}

/// `GET /{lang}/groupsanddomains`: the full group and domain tree.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn groups_and_domains(client: &ApiClient, lang: &str) -> Result<Value, ApiError> {
    client.get(&format!("/{lang}/groupsanddomains"), &[]).await
}

/// `GET /{lang}/domains/{group}/`: domains within one group.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn domains(client: &ApiClient, group_code: &str, lang: &str) -> Result<Value, ApiError> {
    client.get(&format!("/{lang}/domains/{group_code}/"), &[]).await
}

/// `GET /{lang}/dimensions/{domain}/`: filters available for a domain.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn dimensions(client: &ApiClient, domain_code: &str, lang: &str) -> Result<Value, ApiError> {
    client.get(&format!("/{lang}/dimensions/{domain_code}/"), &[]).await
}

/// `GET /{lang}/codes/{dimension}/{domain}`: codes for one dimension.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn codes(
    client: &ApiClient,
    dimension_id: &str,
    domain_code: &str,
    lang: &str,
) -> Result<Value, ApiError> {
    client
        .get(&format!("/{lang}/codes/{dimension_id}/{domain_code}"), &[])
        .await
}

/// `GET /{lang}/data/{domain}`: the statistical data itself.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
#[instrument(skip(client, query), fields(filters = query.filters.pairs().len()))]
pub async fn data(
    client: &ApiClient,
    domain_code: &str,
    lang: &str,
    query: &DataQuery,
) -> Result<Value, ApiError> {
    client
        .get(&format!("/{lang}/data/{domain_code}"), &query.params())
        .await
}

/// `POST /{lang}/datasize/`: row-count estimate for a query.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn datasize(client: &ApiClient, payload: &Value, lang: &str) -> Result<Value, ApiError> {
    client.post(&format!("/{lang}/datasize/"), payload).await
}

/// `GET /{lang}/definitions/domain/{domain}`: definitions for a domain.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn definitions(client: &ApiClient, domain_code: &str, lang: &str) -> Result<Value, ApiError> {
    client
        .get(&format!("/{lang}/definitions/domain/{domain_code}"), &[])
        .await
}

/// `GET /{lang}/definitions/domain/{domain}/{type}`: definitions of one type.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn definitions_by_type(
    client: &ApiClient,
    domain_code: &str,
    definition_type: &str,
    lang: &str,
) -> Result<Value, ApiError> {
    client
        .get(
            &format!("/{lang}/definitions/domain/{domain_code}/{definition_type}"),
            &[],
        )
        .await
}

/// `GET /{lang}/definitions/types`: available definition types.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn definition_types(client: &ApiClient, lang: &str) -> Result<Value, ApiError> {
    client.get(&format!("/{lang}/definitions/types"), &[]).await
}

/// `GET /{lang}/metadata/{domain}`: full domain metadata.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn metadata(client: &ApiClient, domain_code: &str, lang: &str) -> Result<Value, ApiError> {
    client.get(&format!("/{lang}/metadata/{domain_code}"), &[]).await
}

/// `GET /{lang}/metadata_print/{domain}`: printable domain metadata.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn metadata_print(client: &ApiClient, domain_code: &str, lang: &str) -> Result<Value, ApiError> {
    client
        .get(&format!("/{lang}/metadata_print/{domain_code}"), &[])
        .await
}

/// `GET /{lang}/bulkdownloads/{domain}/`: bulk download files.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn bulk_downloads(client: &ApiClient, domain_code: &str, lang: &str) -> Result<Value, ApiError> {
    client
        .get(&format!("/{lang}/bulkdownloads/{domain_code}/"), &[])
        .await
}

/// `GET /{lang}/documents/{domain}/`: related documents.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn documents(client: &ApiClient, domain_code: &str, lang: &str) -> Result<Value, ApiError> {
    client
        .get(&format!("/{lang}/documents/{domain_code}/"), &[])
        .await
}

/// `POST /{lang}/rankings/`.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn rankings(client: &ApiClient, payload: &Value, lang: &str) -> Result<Value, ApiError> {
    client.post(&format!("/{lang}/rankings/"), payload).await
}

/// `POST /{lang}/report/data/`.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn report_data(client: &ApiClient, payload: &Value, lang: &str) -> Result<Value, ApiError> {
    client.post(&format!("/{lang}/report/data/"), payload).await
}

/// `POST /{lang}/report/headers/`.
///
/// # Errors
///
/// Propagates the client's [`ApiError`].
pub async fn report_headers(client: &ApiClient, payload: &Value, lang: &str) -> Result<Value, ApiError> {
    client.post(&format!("/{lang}/report/headers/"), payload).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_query_defaults() {
        let query = DataQuery::default();
        assert_eq!(
            query.params(),
            vec![
                ("show_codes", "true".to_string()),
                ("show_unit", "true".to_string()),
                ("show_flags", "true".to_string()),
                ("null_values", "false".to_string()),
                ("output_type", "objects".to_string()),
            ]
        );
    }

    #[test]
    fn test_data_query_sends_only_set_filters() {
        let query = DataQuery::with_filters(Filters {
            area: Some("231".into()),
            year_cs: Some("recent".into()),
            ..Filters::default()
        });
        let params = query.params();
        assert!(params.contains(&("area", "231".to_string())));
        assert!(params.contains(&("year_cs", "recent".to_string())));
        assert!(!params.iter().any(|(name, _)| *name == "element"));
        assert_eq!(params.len(), 7);
    }

    #[test]
    fn test_datasize_payload() {
        let filters = Filters {
            item: Some("56".into()),
            ..Filters::default()
        };
        assert_eq!(
            datasize_payload("QCL", &filters),
            json!({"domain_code": "QCL", "item": "56"})
        );
        assert_eq!(
            datasize_payload("QCL", &Filters::default()),
            json!({"domain_code": "QCL"})
        );
    }

    #[test]
    fn test_estimated_rows() {
        assert_eq!(estimated_rows(&json!({"count": 120})), Some(120));
        assert_eq!(estimated_rows(&json!({"size": "42"})), Some(42));
        assert_eq!(estimated_rows(&json!({"count": null, "size": 7})), Some(7));
        assert_eq!(estimated_rows(&json!({"status": 200})), None);
        assert_eq!(estimated_rows(&json!([1, 2])), None);
    }

    #[test]
    fn test_filters_is_empty() {
        assert!(Filters::default().is_empty());
        assert!(
            !Filters {
                element: Some("5510".into()),
                ..Filters::default()
            }
            .is_empty()
        );
    }
}
