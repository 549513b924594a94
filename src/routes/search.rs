use super::BackendData;
use crate::error::AppError;
use crate::models::{validate_index_uid, SearchParams};
use crate::views;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

/// Words with a meaning of their own in a filter expression.
const FILTER_KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "TO", "EXISTS", "IN", "IS", "NULL", "EMPTY", "CONTAINS", "STARTS",
];

/// One element of a legacy `facetFilters` list: a single `attr:value`
/// condition, or a group of conditions of which any may match.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum FacetFilter {
    Single(String),
    AnyOf(Vec<String>),
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub uid: String,
    #[serde(default, alias = "q")]
    pub query: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub filter: Option<Value>,
    pub facet_filters: Option<Vec<FacetFilter>>,
    #[serde(alias = "facetsDistribution")]
    pub facets: Option<Vec<String>>,
    pub attributes_to_retrieve: Option<Vec<String>>,
    pub attributes_to_crop: Option<Vec<String>>,
    pub crop_length: Option<usize>,
    pub attributes_to_highlight: Option<Vec<String>>,
    pub sort: Option<Vec<String>>,
    pub highlight_pre_tag: Option<String>,
    pub highlight_post_tag: Option<String>,
}

impl SearchRequest {
    /// Splits the request into the target index and the engine-side query.
    pub fn into_query(self) -> Result<(String, SearchParams), AppError> {
        validate_index_uid(&self.uid)?;
        let filter = merge_filters(self.filter, self.facet_filters)?;
        let params = SearchParams {
            query: self.query.unwrap_or_default(),
            offset: self.offset,
            limit: self.limit,
            filter,
            facets: self.facets,
            attributes_to_retrieve: self.attributes_to_retrieve,
            attributes_to_crop: self.attributes_to_crop,
            crop_length: self.crop_length,
            attributes_to_highlight: self.attributes_to_highlight,
            sort: self.sort,
            highlight_pre_tag: self.highlight_pre_tag,
            highlight_post_tag: self.highlight_post_tag,
        };
        Ok((self.uid, params))
    }
}

/// A facet attribute is a plain, possibly dotted, field name.
fn check_attribute(attribute: &str, raw: &str) -> Result<(), AppError> {
    if attribute.is_empty() {
        return Err(AppError::validation(format!(
            "facet filter `{}` has no attribute",
            raw
        )));
    }
    let plain = attribute
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
    let keyword = FILTER_KEYWORDS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(attribute));
    if !plain || keyword {
        return Err(AppError::validation(format!(
            "facet filter `{}` has an invalid attribute `{}`",
            raw, attribute
        )));
    }
    Ok(())
}

/// `genre:sci fi` becomes `genre = "sci fi"`.
fn facet_condition(raw: &str) -> Result<String, AppError> {
    let (attribute, value) = raw.split_once(':').ok_or_else(|| {
        AppError::validation(format!("facet filter `{}` must look like attribute:value", raw))
    })?;
    let attribute = attribute.trim();
    check_attribute(attribute, raw)?;
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(format!("{} = \"{}\"", attribute, escaped))
}

fn any_of(conditions: Vec<String>) -> String {
    if conditions.len() == 1 {
        conditions.concat()
    } else {
        format!("({})", conditions.join(" OR "))
    }
}

/// Explicit filter in array form: outer elements ANDed, inner arrays ORed.
fn array_filter(items: Vec<Value>) -> Result<Vec<String>, AppError> {
    let invalid = || AppError::validation("filter arrays may only hold strings and arrays of strings");
    items
        .into_iter()
        .map(|item| match item {
            Value::String(expr) => Ok(format!("({})", expr)),
            Value::Array(group) if !group.is_empty() => group
                .into_iter()
                .map(|expr| match expr {
                    Value::String(expr) => Ok(expr),
                    _ => Err(invalid()),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|group| format!("({})", group.join(" OR "))),
            _ => Err(invalid()),
        })
        .collect()
}

/// ANDs the explicit filter with the translated facet filters into a single
/// filter expression.
fn merge_filters(
    filter: Option<Value>,
    facet_filters: Option<Vec<FacetFilter>>,
) -> Result<Option<String>, AppError> {
    let facet_filters = facet_filters.unwrap_or_default();
    let mut clauses = match filter {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(expr)) if facet_filters.is_empty() => return Ok(Some(expr)),
        Some(Value::String(expr)) => vec![format!("({})", expr)],
        Some(Value::Array(items)) => array_filter(items)?,
        Some(_) => {
            return Err(AppError::validation(
                "filter must be a string or an array of conditions",
            ))
        }
    };

    for facet_filter in facet_filters {
        let clause = match facet_filter {
            FacetFilter::Single(raw) => facet_condition(&raw)?,
            FacetFilter::AnyOf(group) => {
                if group.is_empty() {
                    return Err(AppError::validation("facet filter groups must not be empty"));
                }
                any_of(
                    group
                        .iter()
                        .map(|raw| facet_condition(raw))
                        .collect::<Result<Vec<_>, _>>()?,
                )
            }
        };
        clauses.push(clause);
    }

    Ok(if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    })
}

async fn search(
    backend: BackendData,
    body: web::Json<SearchRequest>,
) -> Result<HttpResponse, AppError> {
    let (uid, params) = body.into_inner().into_query()?;
    let results = backend.search(&uid, &params).await?;
    Ok(HttpResponse::Ok().json(views::search(&results)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::post().to(search)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web_server::{configure, test_state, test_state_for_addr};
    use actix_web::test::{
        call_and_read_body_json, call_service, init_service, read_body_json, TestRequest,
    };
    use actix_web::{http::StatusCode, App};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(body: Value) -> SearchRequest {
        serde_json::from_value(body).unwrap()
    }

    fn filter_of(body: Value) -> Option<String> {
        request(body).into_query().unwrap().1.filter
    }

    #[test]
    fn empty_query_is_a_placeholder_search() {
        let (uid, params) = request(json!({ "uid": "indexUID" })).into_query().unwrap();
        assert_eq!(uid, "indexUID");
        assert_eq!(params.query, "");
        assert_eq!(params.filter, None);
    }

    #[test]
    fn legacy_facet_filters_become_one_expression() {
        let (_, params) = request(json!({
            "uid": "indexUID",
            "query": "world",
            "facetFilters": ["genre:action", ["genre:action", "genre:sci fi"]]
        }))
        .into_query()
        .unwrap();

        assert_eq!(
            params.filter.as_deref(),
            Some("genre = \"action\" AND (genre = \"action\" OR genre = \"sci fi\")")
        );
        assert_eq!(params.facets, None);
    }

    #[test]
    fn facet_filters_are_anded_with_explicit_filter() {
        let filter = filter_of(json!({
            "uid": "indexUID",
            "filter": "release_date > 1500000000 OR genre = drama",
            "facetFilters": [["genre:action"]]
        }));
        assert_eq!(
            filter.as_deref(),
            Some("(release_date > 1500000000 OR genre = drama) AND genre = \"action\"")
        );
    }

    #[test]
    fn explicit_filter_passes_through_untouched() {
        assert_eq!(
            filter_of(json!({ "uid": "indexUID", "filter": "genre = action" })).as_deref(),
            Some("genre = action")
        );
        assert!(request(json!({ "uid": "indexUID", "filter": 3 }))
            .into_query()
            .is_err());
    }

    #[test]
    fn explicit_filter_arrays_are_flattened() {
        let filter = filter_of(json!({
            "uid": "indexUID",
            "filter": ["release_date > 1500000000", ["genre = action", "genre = drama"]]
        }));
        assert_eq!(
            filter.as_deref(),
            Some("(release_date > 1500000000) AND (genre = action OR genre = drama)")
        );
        assert!(request(json!({ "uid": "indexUID", "filter": [[1]] }))
            .into_query()
            .is_err());
    }

    #[test]
    fn quotes_in_facet_values_are_escaped() {
        assert_eq!(
            facet_condition("title:The \"Hobbit\"").unwrap(),
            "title = \"The \\\"Hobbit\\\"\""
        );
        assert_eq!(
            facet_condition("author.name:Tolkien").unwrap(),
            "author.name = \"Tolkien\""
        );
    }

    #[test]
    fn malformed_facet_filters_are_rejected() {
        for bad in [
            json!(["genre"]),
            json!([":action"]),
            json!([[]]),
            json!(["genre = \"action\" OR genre EXISTS OR genre:action"]),
            json!(["genre) OR (id:1"]),
            json!(["NOT:action"]),
            json!(["ge\"nre:action"]),
        ] {
            let err = request(json!({ "uid": "indexUID", "facetFilters": bad }))
                .into_query()
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[test]
    fn legacy_aliases_are_accepted() {
        let (_, params) = request(json!({
            "uid": "indexUID",
            "q": "dragon",
            "facetsDistribution": ["genre"]
        }))
        .into_query()
        .unwrap();
        assert_eq!(params.query, "dragon");
        assert_eq!(params.facets, Some(vec!["genre".to_string()]));
    }

    fn movie(id: &str, title: &str) -> Value {
        json!({ "id": id, "title": title, "poster": format!("https://image.tmdb.org/{}.jpg", id) })
    }

    #[actix_web::test]
    async fn facet_filter_narrows_hits_without_distribution() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes/indexUID/search"))
            .and(body_partial_json(json!({
                "q": "world",
                "filter": "genre = \"action\"",
                "attributesToRetrieve": ["title", "poster"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": [
                    movie("299536", "Avengers: Infinity War"),
                    movie("299534", "Avengers: Endgame"),
                    movie("287947", "Shazam!")
                ],
                "query": "world",
                "processingTimeMs": 1,
                "limit": 20,
                "offset": 0,
                "estimatedTotalHits": 3
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (backend, config) = test_state(&server);
        let app = init_service(App::new().app_data(backend).app_data(config).configure(configure)).await;

        let req = TestRequest::post()
            .uri("/search")
            .set_json(json!({
                "uid": "indexUID",
                "query": "world",
                "facetFilters": [["genre:action"]],
                "attributesToRetrieve": ["title", "poster"]
            }))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = read_body_json(resp).await;
        let hits = body["hits"].as_array().unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0]["title"], "Avengers: Infinity War");
        assert!(hits[0].get("overview").is_none());
        assert!(body["facetDistribution"].is_null());
    }

    #[actix_web::test]
    async fn facets_distribution_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes/indexUID/search"))
            .and(body_partial_json(json!({ "q": "world", "facets": ["genre"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": [],
                "query": "world",
                "processingTimeMs": 1,
                "limit": 20,
                "offset": 0,
                "estimatedTotalHits": 12,
                "facetDistribution": { "genre": { "action": 3, "cartoon": 1, "fantasy": 1 } }
            })))
            .mount(&server)
            .await;
        let (backend, config) = test_state(&server);
        let app = init_service(App::new().app_data(backend).app_data(config).configure(configure)).await;

        let req = TestRequest::post()
            .uri("/search")
            .set_json(json!({ "uid": "indexUID", "query": "world", "facetsDistribution": ["genre"] }))
            .to_request();
        let body: Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body["facetDistribution"]["genre"]["action"], 3);
        assert_eq!(body["estimatedTotalHits"], 12);
    }

    #[actix_web::test]
    async fn unreachable_engine_is_a_bad_gateway() {
        let (backend, config) = test_state_for_addr("127.0.0.1:1");
        let app = init_service(App::new().app_data(backend).app_data(config).configure(configure)).await;

        let req = TestRequest::post()
            .uri("/search")
            .set_json(json!({ "uid": "indexUID", "query": "" }))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::BAD_GATEWAY);
    }
}
