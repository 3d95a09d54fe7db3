//! 라우트 해석 -- 플래그 → [`LogRoute`]
//!
//! 라우팅 테이블은 카테고리 → 라우트 엔트리 목록 형태의 JSON입니다.
//!
//! ```json
//! {
//!   "auth": [
//!     { "flag": "USER_LOGIN", "path": "auth/{date:yyyy-MM-dd}.log", "retention": "30d" }
//!   ]
//! }
//! ```
//!
//! 테이블은 관대하게 읽습니다. 형식이 잘못된 카테고리나 엔트리는 건너뛰고 기록만
//! 남기며, 해석은 항상 라우트를 돌려줍니다. 테이블에 없는 플래그는
//! `missingLogRoutes/<정제된 플래그>/{date:yyyy-MM-dd}.log` 폴백 라우트가 됩니다.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use serde_json::{Map, Value};

use logroute_core::metrics as m;
use logroute_core::sanitize::{DefaultSanitizer, Sanitizer};
use logroute_core::types::LogRoute;

use crate::context::PipelineContext;
use crate::error::DeliveryError;
use crate::template::sanitize_segment;

/// 폴백 라우트 경로 접두어
pub const MISSING_ROUTES_PREFIX: &str = "missingLogRoutes";

/// 폴백 라우트의 파일명 템플릿
const FALLBACK_FILE_TEMPLATE: &str = "{date:yyyy-MM-dd}.log";

/// 파싱된 라우팅 테이블
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    /// 소문자 플래그 -> 라우트
    routes: HashMap<String, LogRoute>,
    /// 읽는 중 건너뛴 항목 설명
    issues: Vec<String>,
}

impl RoutingTable {
    /// 빈 테이블
    pub fn empty() -> Self {
        Self::default()
    }

    /// JSON 텍스트를 파싱합니다. 최상위 JSON 문법 오류만 에러입니다.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }

    /// JSON 값을 관대하게 순회하여 테이블을 만듭니다.
    ///
    /// `{"categories": {...}}` 래퍼도 허용합니다. 같은 플래그가 여러 번 나오면
    /// 먼저 나온 엔트리가 우선합니다.
    pub fn from_value(value: &Value) -> Self {
        let mut table = Self::default();

        let categories = match value.get("categories").unwrap_or(value) {
            Value::Object(categories) => categories,
            other => {
                table
                    .issues
                    .push(format!("routing table root must be an object, got {}", kind(other)));
                return table;
            }
        };

        for (category, entries) in categories {
            let Value::Array(entries) = entries else {
                table.issues.push(format!(
                    "category '{category}' must be an array, got {}",
                    kind(entries)
                ));
                continue;
            };
            for (index, entry) in entries.iter().enumerate() {
                match parse_entry(category, entry) {
                    Ok(route) => {
                        table
                            .routes
                            .entry(route.flag.to_lowercase())
                            .or_insert(route);
                    }
                    Err(reason) => table
                        .issues
                        .push(format!("{category}[{index}]: {reason}")),
                }
            }
        }
        table
    }

    /// 플래그로 라우트를 찾습니다 (대소문자 무시).
    pub fn get(&self, flag: &str) -> Option<&LogRoute> {
        self.routes.get(&flag.to_lowercase())
    }

    /// 등록된 라우트 수
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 건너뛴 항목 설명
    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    /// 등록된 라우트 (플래그 순)
    pub fn routes(&self) -> Vec<&LogRoute> {
        let mut routes: Vec<&LogRoute> = self.routes.values().collect();
        routes.sort_by(|a, b| a.flag.cmp(&b.flag));
        routes
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_entry(category: &str, entry: &Value) -> Result<LogRoute, String> {
    let Value::Object(obj) = entry else {
        return Err(format!("entry must be an object, got {}", kind(entry)));
    };
    let flag = non_empty_str(obj, "flag").ok_or("missing 'flag'")?;
    let path = non_empty_str(obj, "path")
        .or_else(|| non_empty_str(obj, "pathTemplate"))
        .ok_or_else(|| format!("route '{flag}' is missing 'path'"))?;

    let retention = match obj.get("retention") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let encrypt_fields = match obj.get("encryptFields") {
        Some(Value::Array(fields)) => fields
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    };

    Ok(LogRoute {
        flag: flag.to_owned(),
        path_template: path.to_owned(),
        retention,
        category: non_empty_str(obj, "category").unwrap_or(category).to_owned(),
        description: non_empty_str(obj, "description").unwrap_or_default().to_owned(),
        is_pci_relevant: obj.get("isPciRelevant").and_then(Value::as_bool).unwrap_or(false),
        critical: obj.get("critical").and_then(Value::as_bool).unwrap_or(false),
        encrypt_fields,
    })
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 라우트 해석기
///
/// 해석 결과(설정 라우트와 합성된 폴백 라우트 모두)는 소문자 플래그로
/// 컨텍스트의 라우트 캐시에 들어갑니다.
pub struct RouteResolver {
    table: RwLock<Arc<RoutingTable>>,
    context: Arc<PipelineContext>,
    sanitizer: Arc<dyn Sanitizer>,
}

impl RouteResolver {
    /// 해석기를 생성하고 테이블의 문제 항목을 기록합니다.
    pub fn new(table: impl Into<Arc<RoutingTable>>, context: Arc<PipelineContext>) -> Self {
        let resolver = Self {
            table: RwLock::new(Arc::new(RoutingTable::empty())),
            context,
            sanitizer: Arc::new(DefaultSanitizer),
        };
        resolver.replace_table(table);
        resolver
    }

    /// 정제기를 지정합니다.
    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// 현재 테이블
    pub fn table(&self) -> Arc<RoutingTable> {
        Arc::clone(&self.table.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// 테이블을 교체하고 라우트 캐시를 비웁니다. 같은 테이블이면 아무 것도 하지 않습니다.
    pub fn replace_table(&self, table: impl Into<Arc<RoutingTable>>) {
        let table = table.into();
        if Arc::ptr_eq(&table, &self.table()) {
            return;
        }
        for issue in table.issues() {
            self.record_failure(issue);
        }
        tracing::debug!(routes = table.len(), "routing table installed");
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = table;
        self.context.clear_routes();
    }

    /// 테이블을 읽지 못했을 때 기록합니다. 해석은 폴백으로 계속됩니다.
    pub fn record_failure(&self, reason: &str) {
        tracing::warn!(reason = %reason, "routing table problem, continuing with fallback routes");
        metrics::counter!(m::ROUTING_TABLE_FAILURES_TOTAL).increment(1);
        self.context.stats().record_routing_table_failure();
    }

    /// 플래그의 라우트를 돌려줍니다. 실패하지 않습니다.
    pub fn route_for(&self, flag: &str) -> Arc<LogRoute> {
        let key = flag.to_lowercase();
        if let Some(hit) = self.context.cached_route(&key) {
            tracing::trace!(flag = %flag, "route cache hit");
            return hit;
        }

        let route = match self.table().get(&key) {
            Some(route) => Arc::new(route.clone()),
            None => {
                tracing::debug!(flag = %flag, "no route configured, using fallback route");
                Arc::new(self.fallback_route(flag))
            }
        };
        self.context.cache_route(key, Arc::clone(&route));
        route
    }

    fn fallback_route(&self, flag: &str) -> LogRoute {
        let mut segment = sanitize_segment(self.sanitizer.as_ref(), flag);
        if segment.is_empty() || segment.chars().all(|c| c == '.') {
            segment = "unknown".to_owned();
        }
        LogRoute::fallback(
            flag,
            format!("{MISSING_ROUTES_PREFIX}/{segment}/{FALLBACK_FILE_TEMPLATE}"),
        )
    }
}

/// 파일 식별용 (수정 시각, 크기)
type Fingerprint = (Option<SystemTime>, u64);

/// 라우팅 테이블 파일 로더
///
/// 파싱 결과를 (수정 시각, 크기)로 캐시하여 파일이 바뀌지 않았으면 다시 읽지 않습니다.
#[derive(Debug)]
pub struct RoutingTableLoader {
    path: PathBuf,
    cached: Mutex<Option<(Fingerprint, Arc<RoutingTable>)>>,
}

impl RoutingTableLoader {
    /// 로더를 생성합니다. `..` 세그먼트나 `.json`이 아닌 경로는 거부합니다.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DeliveryError> {
        let path = path.into();
        let reject = |reason: &str| DeliveryError::RoutingTable {
            path: path.display().to_string(),
            reason: reason.to_owned(),
        };

        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(reject("path must not contain '..'"));
        }
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            return Err(reject("routing table must be a .json file"));
        }

        Ok(Self {
            path,
            cached: Mutex::new(None),
        })
    }

    /// 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 테이블을 읽습니다. 파일이 바뀌지 않았으면 캐시된 결과를 돌려줍니다.
    pub async fn load(&self) -> Result<Arc<RoutingTable>, DeliveryError> {
        let meta = tokio::fs::metadata(&self.path).await.map_err(|e| self.error(e))?;
        let fingerprint: Fingerprint = (meta.modified().ok(), meta.len());

        if let Some((cached_fp, table)) = self.cached().as_ref()
            && *cached_fp == fingerprint
        {
            tracing::trace!(path = %self.path.display(), "routing table unchanged");
            return Ok(Arc::clone(table));
        }

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.error(e))?;
        let table = Arc::new(RoutingTable::parse(&text).map_err(|e| self.error(e))?);

        tracing::info!(
            path = %self.path.display(),
            routes = table.len(),
            issues = table.issues().len(),
            "routing table loaded"
        );
        *self.cached() = Some((fingerprint, Arc::clone(&table)));
        Ok(table)
    }

    fn cached(&self) -> std::sync::MutexGuard<'_, Option<(Fingerprint, Arc<RoutingTable>)>> {
        self.cached.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn error(&self, err: impl std::fmt::Display) -> DeliveryError {
        DeliveryError::RoutingTable {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> RoutingTable {
        RoutingTable::from_value(&json!({
            "auth": [
                {
                    "flag": "USER_LOGIN",
                    "path": "auth/{date:yyyy-MM-dd}.log",
                    "retention": "30d",
                    "description": "user login"
                },
                { "flag": "NO_PATH" },
                "not an object"
            ],
            "payments": [
                {
                    "flag": "PAYMENT_FAILED",
                    "path": "payments/{merchant}/{date:yyyy-MM-dd}.log",
                    "critical": true,
                    "isPciRelevant": true,
                    "encryptFields": ["cardHolder", 7]
                }
            ],
            "broken": { "flag": "X" }
        }))
    }

    #[test]
    fn lenient_parse_keeps_good_entries() {
        let table = table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.issues().len(), 3);

        let route = table.get("payment_failed").unwrap();
        assert_eq!(route.category, "payments");
        assert!(route.critical);
        assert!(route.is_pci_relevant);
        assert_eq!(route.encrypt_fields, vec!["cardHolder".to_owned()]);
    }

    #[test]
    fn non_object_root_is_an_issue() {
        let table = RoutingTable::from_value(&json!([1, 2]));
        assert!(table.is_empty());
        assert_eq!(table.issues().len(), 1);
    }

    #[test]
    fn categories_wrapper_is_accepted() {
        let table = RoutingTable::from_value(&json!({
            "categories": { "auth": [ { "flag": "A", "path": "a.log" } ] }
        }));
        assert!(table.get("a").is_some());
    }

    #[test]
    fn resolution_is_case_insensitive_and_cached() {
        let ctx = Arc::new(PipelineContext::default());
        let resolver = RouteResolver::new(table(), Arc::clone(&ctx));

        let first = resolver.route_for("user_login");
        let second = resolver.route_for("USER_LOGIN");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.retention.as_deref(), Some("30d"));
        assert_eq!(ctx.cache_sizes().routes, 1);
    }

    #[test]
    fn malformed_entries_are_counted() {
        let ctx = Arc::new(PipelineContext::default());
        let _resolver = RouteResolver::new(table(), Arc::clone(&ctx));
        assert_eq!(ctx.stats().snapshot().routing_table_failures, 3);
    }

    #[test]
    fn unknown_flag_gets_fallback_route() {
        let ctx = Arc::new(PipelineContext::default());
        let resolver = RouteResolver::new(RoutingTable::empty(), Arc::clone(&ctx));

        let route = resolver.route_for("New Flag/../x");
        assert!(route.is_fallback());
        assert!(!route.critical);
        assert_eq!(route.flag, "New Flag/../x");
        assert_eq!(
            route.path_template,
            "missingLogRoutes/New_Flag_.._x/{date:yyyy-MM-dd}.log"
        );
        // 같은 플래그는 캐시된 폴백을 재사용
        assert!(Arc::ptr_eq(&route, &resolver.route_for("new flag/../X")));
    }

    #[test]
    fn replacing_table_clears_route_cache() {
        let ctx = Arc::new(PipelineContext::default());
        let resolver = RouteResolver::new(RoutingTable::empty(), Arc::clone(&ctx));
        assert!(resolver.route_for("USER_LOGIN").is_fallback());

        resolver.replace_table(table());
        assert!(!resolver.route_for("USER_LOGIN").is_fallback());
    }

    #[test]
    fn loader_rejects_unsafe_paths() {
        assert!(matches!(
            RoutingTableLoader::new("../routes.json"),
            Err(DeliveryError::RoutingTable { .. })
        ));
        assert!(RoutingTableLoader::new("config/routes.yaml").is_err());
        assert!(RoutingTableLoader::new("config/routes.JSON").is_ok());
    }

    #[tokio::test]
    async fn loader_caches_until_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        std::fs::write(&path, r#"{"auth":[{"flag":"A","path":"a.log"}]}"#).unwrap();

        let loader = RoutingTableLoader::new(&path).unwrap();
        let first = loader.load().await.unwrap();
        let second = loader.load().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // 크기가 달라지면 다시 읽음
        std::fs::write(
            &path,
            r#"{"auth":[{"flag":"A","path":"a.log"},{"flag":"B","path":"b.log"}]}"#,
        )
        .unwrap();
        let third = loader.load().await.unwrap();
        assert_eq!(third.len(), 2);
    }

    #[tokio::test]
    async fn loader_reports_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let loader = RoutingTableLoader::new(dir.path().join("absent.json")).unwrap();
        assert!(loader.load().await.is_err());

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let loader = RoutingTableLoader::new(&path).unwrap();
        assert!(matches!(
            loader.load().await,
            Err(DeliveryError::RoutingTable { .. })
        ));
    }
}
