use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{dev::Server, get, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::application::{IngestUseCase, QueryUseCase};
use crate::domain::error::{AppError, Result};
use crate::domain::query::{FilterClause, FilterOp, QuerySpec, Shape, Sort, SortDirection};
use crate::infrastructure::db::store::TableStore;
use crate::infrastructure::report;

pub struct AppState {
    pub ingest: IngestUseCase,
    pub query: QueryUseCase,
    pub store: Arc<TableStore>,
}

#[derive(Deserialize)]
struct ApifyParams {
    url: Option<String>,
}

#[get("/apify")]
async fn apify(data: web::Data<AppState>, params: web::Query<ApifyParams>) -> impl Responder {
    let Some(url) = params.url.as_deref() else {
        return error_response(&AppError::InvalidQuery(
            "missing 'url' parameter".to_string(),
        ));
    };

    match data.ingest.execute(url).await {
        Ok(identity) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "endpoint": format!("/api/{}", identity),
        })),
        Err(err) => {
            error!(url, error = %err, "Ingestion failed");
            error_response(&err)
        }
    }
}

#[get("/api/{identity}")]
async fn table_view(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> impl Responder {
    let identity = path.into_inner();

    let spec = match parse_query_spec(req.query_string()) {
        Ok(spec) => spec,
        Err(err) => return error_response(&err),
    };

    match data.query.execute(&identity, &spec).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err) => error_response(&err),
    }
}

#[get("/profile/{identity}")]
async fn profile_view(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let identity = path.into_inner();

    let schema = match data.store.load_schema(&identity).await {
        Ok(schema) => schema,
        Err(err) => return error_response(&err),
    };

    match report::cached_profile(&data.store, &identity, &schema).await {
        Ok(html) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(html),
        Err(err) => error_response(&err),
    }
}

/// Map the request query string onto a QuerySpec.
///
/// `_size`→limit, `_offset`→offset, `_shape`, `_sort`/`_sort_desc`,
/// `_rowid=hide`, `_total=hide`, `<col>__exact` / `<col>__contains`.
/// Unknown underscore parameters are ignored; clause order is preserved.
fn parse_query_spec(query_string: &str) -> Result<QuerySpec> {
    let mut spec = QuerySpec::default();

    for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
        match key.as_ref() {
            "_size" => {
                let limit = value.parse::<u32>().map_err(|_| {
                    AppError::InvalidQuery("_size must be a non-negative integer".to_string())
                })?;
                spec.limit = Some(limit);
            }
            "_offset" => {
                let offset = value.parse::<u32>().map_err(|_| {
                    AppError::InvalidQuery("_offset must be a non-negative integer".to_string())
                })?;
                spec.offset = Some(offset);
            }
            "_shape" => {
                spec.shape = Shape::parse(&value).ok_or_else(|| {
                    AppError::InvalidQuery(format!("unknown _shape '{}'", value))
                })?;
            }
            "_sort" => {
                spec.sort = Some(Sort {
                    column: value.into_owned(),
                    direction: SortDirection::Ascending,
                });
            }
            "_sort_desc" => {
                spec.sort = Some(Sort {
                    column: value.into_owned(),
                    direction: SortDirection::Descending,
                });
            }
            "_rowid" => {
                if value == "hide" {
                    spec.show_row_id = false;
                }
            }
            "_total" => {
                if value == "hide" {
                    spec.show_total = false;
                }
            }
            key if key.ends_with("__exact") => {
                spec.filters.push(FilterClause {
                    column: key.trim_end_matches("__exact").to_string(),
                    op: FilterOp::Exact,
                    operand: value.into_owned(),
                });
            }
            key if key.ends_with("__contains") => {
                spec.filters.push(FilterClause {
                    column: key.trim_end_matches("__contains").to_string(),
                    op: FilterOp::Contains,
                    operand: value.into_owned(),
                });
            }
            // Unknown reserved parameters and bare column names carry no
            // recognized operator; skip them
            _ => {}
        }
    }

    Ok(spec)
}

fn error_response(err: &AppError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(serde_json::json!({
        "ok": false,
        "error": err.to_string(),
        "kind": err.kind(),
    }))
}

pub fn start_server(state: Arc<AppState>, host: &str, port: u16) -> std::io::Result<Server> {
    let data = web::Data::from(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // local tool, every origin may read

        App::new()
            .wrap(cors)
            .app_data(data.clone())
            .service(apify)
            .service(table_view)
            .service(profile_view)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fetch::ResourceFetcher;
    use actix_web::test;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    const CSV: &str = "col a;col b;col c\ndata à1;data b1;z\ndata ª2;data b2;a\n";
    const CSV_FILTERS: &str = "id,hour,value\nfirst,12:30,1\nsecond,9:15,2\nthird,09:45,3\n";
    const CSV_URL: &str = "http://domain.com/file.csv";

    struct StaticFetcher {
        body: Vec<u8>,
    }

    #[async_trait]
    impl ResourceFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str, max_bytes: u64) -> Result<Vec<u8>> {
            if self.body.len() as u64 > max_bytes {
                return Err(AppError::SizeExceeded(format!(
                    "download exceeded the {} byte limit",
                    max_bytes
                )));
            }
            Ok(self.body.clone())
        }
    }

    fn state(dir: &TempDir, body: &[u8], max_file_size: u64) -> web::Data<AppState> {
        let store = Arc::new(TableStore::new(dir.path()));
        web::Data::from(Arc::new(AppState {
            ingest: IngestUseCase::new(
                store.clone(),
                Arc::new(StaticFetcher { body: body.to_vec() }),
                max_file_size,
            ),
            query: QueryUseCase::new(store.clone(), 100, 500, 100_000),
            store,
        }))
    }

    macro_rules! app {
        ($data:expr) => {
            test::init_service(
                App::new()
                    .app_data($data.clone())
                    .service(apify)
                    .service(table_view)
                    .service(profile_view),
            )
            .await
        };
    }

    macro_rules! get_json {
        ($app:expr, $uri:expr) => {{
            let req = test::TestRequest::get().uri($uri).to_request();
            let res = test::call_service(&$app, req).await;
            let status = res.status();
            let body = test::read_body(res).await;
            let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            (status, value)
        }};
    }

    fn identity(url: &str) -> String {
        crate::application::ingest::identity_for(url)
    }

    #[actix_web::test]
    async fn test_apify_requires_url() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV.as_bytes(), 1 << 20);
        let app = app!(data);

        let (status, _) = get_json!(app, "/apify");
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get_json!(app, "/apify?url=notanurl");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["kind"], json!("invalid_query"));
    }

    #[actix_web::test]
    async fn test_apify_then_query() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV.as_bytes(), 1 << 20);
        let app = app!(data);

        let (status, body) = get_json!(app, &format!("/apify?url={}", CSV_URL));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        let endpoint = body["endpoint"].as_str().unwrap().to_string();
        assert_eq!(endpoint, format!("/api/{}", identity(CSV_URL)));

        let (status, body) = get_json!(app, &endpoint);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["columns"],
            json!(["rowid", "col a", "col b", "col c"])
        );
        assert_eq!(body["total"], json!(2));
        assert_eq!(
            body["rows"],
            json!([
                [1, "data à1", "data b1", "z"],
                [2, "data ª2", "data b2", "a"],
            ])
        );
    }

    #[actix_web::test]
    async fn test_apify_latin1_content() {
        let dir = TempDir::new().unwrap();
        // Same fixture encoded as ISO-8859-1
        let (latin1, _, _) = encoding_rs::WINDOWS_1252.encode(CSV);
        let data = state(&dir, &latin1, 1 << 20);
        let app = app!(data);

        get_json!(app, &format!("/apify?url={}", CSV_URL));
        let (status, body) = get_json!(app, &format!("/api/{}", identity(CSV_URL)));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"][0][1], json!("data à1"));
    }

    #[actix_web::test]
    async fn test_api_limit_and_offset() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV.as_bytes(), 1 << 20);
        let app = app!(data);
        get_json!(app, &format!("/apify?url={}", CSV_URL));
        let endpoint = format!("/api/{}", identity(CSV_URL));

        let (_, body) = get_json!(app, &format!("{}?_size=1", endpoint));
        assert_eq!(body["rows"], json!([[1, "data à1", "data b1", "z"]]));

        let (_, body) = get_json!(app, &format!("{}?_size=1&_offset=1", endpoint));
        assert_eq!(body["rows"], json!([[2, "data ª2", "data b2", "a"]]));
    }

    #[actix_web::test]
    async fn test_api_rejects_bad_params() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV.as_bytes(), 1 << 20);
        let app = app!(data);
        get_json!(app, &format!("/apify?url={}", CSV_URL));
        let endpoint = format!("/api/{}", identity(CSV_URL));

        let (status, _) = get_json!(app, &format!("{}?_size=toto", endpoint));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json!(app, &format!("{}?_shape=toto", endpoint));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get_json!(app, &format!("{}?nope__exact=1", endpoint));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("invalid_query"));
    }

    #[actix_web::test]
    async fn test_api_objects_shape_and_rowid_hide() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV.as_bytes(), 1 << 20);
        let app = app!(data);
        get_json!(app, &format!("/apify?url={}", CSV_URL));
        let endpoint = format!("/api/{}", identity(CSV_URL));

        let (_, body) = get_json!(app, &format!("{}?_shape=objects", endpoint));
        assert_eq!(
            body["rows"],
            json!([
                {"rowid": 1, "col a": "data à1", "col b": "data b1", "col c": "z"},
                {"rowid": 2, "col a": "data ª2", "col b": "data b2", "col c": "a"},
            ])
        );

        let (_, body) = get_json!(app, &format!("{}?_shape=objects&_rowid=hide", endpoint));
        assert_eq!(
            body["rows"],
            json!([
                {"col a": "data à1", "col b": "data b1", "col c": "z"},
                {"col a": "data ª2", "col b": "data b2", "col c": "a"},
            ])
        );
    }

    #[actix_web::test]
    async fn test_api_total_hide() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV.as_bytes(), 1 << 20);
        let app = app!(data);
        get_json!(app, &format!("/apify?url={}", CSV_URL));

        let (_, body) = get_json!(app, &format!("/api/{}?_total=hide", identity(CSV_URL)));
        assert!(body.get("total").is_none());
    }

    #[actix_web::test]
    async fn test_api_sort() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV.as_bytes(), 1 << 20);
        let app = app!(data);
        get_json!(app, &format!("/apify?url={}", CSV_URL));
        let endpoint = format!("/api/{}", identity(CSV_URL));

        let (_, body) = get_json!(app, &format!("{}?_sort=col%20c", endpoint));
        assert_eq!(
            body["rows"],
            json!([
                [2, "data ª2", "data b2", "a"],
                [1, "data à1", "data b1", "z"],
            ])
        );

        let (_, body) = get_json!(app, &format!("{}?_sort_desc=col%20b", endpoint));
        assert_eq!(
            body["rows"],
            json!([
                [2, "data ª2", "data b2", "a"],
                [1, "data à1", "data b1", "z"],
            ])
        );
    }

    #[actix_web::test]
    async fn test_api_filters() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV_FILTERS.as_bytes(), 1 << 20);
        let app = app!(data);
        let url = "http://domain.com/filters.csv";
        get_json!(app, &format!("/apify?url={}", url));
        let endpoint = format!("/api/{}", identity(url));

        let (_, body) = get_json!(app, &format!("{}?hour__exact=12:30", endpoint));
        assert_eq!(body["total"], json!(1));
        assert_eq!(body["rows"], json!([[1, "first", "12:30", 1]]));

        let (_, body) = get_json!(app, &format!("{}?id__contains=fir", endpoint));
        assert_eq!(body["total"], json!(1));
        assert_eq!(body["rows"], json!([[1, "first", "12:30", 1]]));

        for operand in ["1", "1.0"] {
            let (_, body) = get_json!(app, &format!("{}?value__exact={}", endpoint, operand));
            assert_eq!(body["total"], json!(1), "operand {:?}", operand);
            assert_eq!(body["rows"], json!([[1, "first", "12:30", 1]]));
        }
    }

    #[actix_web::test]
    async fn test_apify_file_too_big() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV.as_bytes(), 1);
        let app = app!(data);

        let (status, body) = get_json!(app, &format!("/apify?url={}", CSV_URL));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], json!("size_exceeded"));
        assert!(body["error"].as_str().unwrap().contains("File too big"));
        assert!(!dir.path().join(format!("{}.db", identity(CSV_URL))).exists());
    }

    #[actix_web::test]
    async fn test_api_unknown_identity() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV.as_bytes(), 1 << 20);
        let app = app!(data);

        let (status, body) = get_json!(app, "/api/deadbeef");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], json!("not_found"));
    }

    #[actix_web::test]
    async fn test_profile_view() {
        let dir = TempDir::new().unwrap();
        let data = state(&dir, CSV_FILTERS.as_bytes(), 1 << 20);
        let app = app!(data);
        let url = "http://domain.com/filters.csv";
        get_json!(app, &format!("/apify?url={}", url));

        let req = test::TestRequest::get()
            .uri(&format!("/profile/{}", identity(url)))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = test::read_body(res).await;
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("3 rows, 3 columns"));

        let (status, _) = get_json!(app, "/profile/deadbeef");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[::core::prelude::v1::test]
    fn test_parse_query_spec_mapping() {
        let spec = parse_query_spec(
            "_size=5&_offset=2&_shape=objects&_sort_desc=a&_rowid=hide&_total=hide&b__exact=1&c__contains=x",
        )
        .unwrap();
        assert_eq!(spec.limit, Some(5));
        assert_eq!(spec.offset, Some(2));
        assert_eq!(spec.shape, Shape::Objects);
        let sort = spec.sort.unwrap();
        assert_eq!(sort.column, "a");
        assert_eq!(sort.direction, SortDirection::Descending);
        assert!(!spec.show_row_id);
        assert!(!spec.show_total);
        assert_eq!(spec.filters.len(), 2);
        assert_eq!(spec.filters[0].column, "b");
        assert_eq!(spec.filters[0].op, FilterOp::Exact);
        assert_eq!(spec.filters[1].column, "c");
        assert_eq!(spec.filters[1].op, FilterOp::Contains);
    }

    #[::core::prelude::v1::test]
    fn test_parse_query_spec_rejects_bad_values() {
        assert!(parse_query_spec("_size=toto").is_err());
        assert!(parse_query_spec("_offset=-1").is_err());
        assert!(parse_query_spec("_shape=csv").is_err());
        // unknown reserved params are ignored
        assert!(parse_query_spec("_unknown=1&plain=2").is_ok());
    }
}
