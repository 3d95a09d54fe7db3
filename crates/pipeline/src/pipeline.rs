//! 라우터 오케스트레이션 -- 제출부터 알림까지의 전체 흐름
//!
//! [`LogRouter`]는 공개 진입점 [`write_log`](LogRouter::write_log)와
//! [`write_logs`](LogRouter::write_logs)를 제공합니다.
//!
//! # 처리 흐름
//! ```text
//! LogRequest -> 검증 -> RouteResolver -> TemplateEngine -> FieldEncryptor
//!            -> DurableWriter(primary | missing_path)
//!            -> (크리티컬) CriticalReplicator -> NotificationDispatcher
//! ```
//!
//! 배치에서는 이벤트마다 독립적으로 해석하고, 같은 파일로 가는 이벤트를 하나의
//! NDJSON 쓰기로 묶어 모든 쓰기가 끝날 때까지 기다립니다. 크리티컬 복제와 알림은
//! 기본 쓰기가 모두 끝난 뒤에 실행됩니다. 플레이스홀더 누락은
//! (정제된 플래그, 누락 키 목록)별로 묶여 원인마다 하나의 폴백 기록만 남습니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::SecondsFormat;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value, json};

use logroute_core::clock::{Clock, DateFormatter, PatternFormatter, SystemClock};
use logroute_core::event::{LogEvent, LogRequest};
use logroute_core::metrics as m;
use logroute_core::sanitize::{DefaultSanitizer, Sanitizer};
use logroute_core::types::LogRoute;

use crate::breaker::NotificationDispatcher;
use crate::config::{RouterConfig, Secret};
use crate::context::{PipelineContext, StatsSnapshot};
use crate::encrypt::FieldEncryptor;
use crate::error::{DeliveryError, EventError};
use crate::notify::{Notifier, WebhookNotifier};
use crate::replicate::CriticalReplicator;
use crate::routes::{RouteResolver, RoutingTable, RoutingTableLoader};
use crate::store::{FileStore, TokioFileStore};
use crate::template::{Expansion, RESERVED_KEYS, TemplateEngine, sanitize_segment};
use crate::writer::{DurableWriter, Payload, PersistOutcome};

/// 플래그/액션 최대 길이 (문자 수)
pub const MAX_NAME_LEN: usize = 128;

/// 이벤트가 기록된 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Delivery {
    /// 요청한 경로에 기록됨
    Written {
        /// 파일 경로
        path: PathBuf,
    },
    /// 쓰기 실패로 write_errors에 기록됨
    Fallback {
        /// 파일 경로
        path: PathBuf,
    },
    /// 플레이스홀더 누락으로 missing_path 저장소에 기록됨
    MissingPath {
        /// 파일 경로
        path: PathBuf,
        /// 누락된 키
        missing: Vec<String>,
    },
    /// 권한 오류로 버려짐
    Dropped,
    /// 로깅 비활성화
    Disabled,
}

impl Delivery {
    /// 어딘가에 기록되었는지 여부
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            Self::Written { .. } | Self::Fallback { .. } | Self::MissingPath { .. }
        )
    }

    /// 기록된 파일 경로
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written { path } | Self::Fallback { path } | Self::MissingPath { path, .. } => {
                Some(path.as_path())
            }
            Self::Dropped | Self::Disabled => None,
        }
    }
}

impl From<PersistOutcome> for Delivery {
    fn from(outcome: PersistOutcome) -> Self {
        match outcome {
            PersistOutcome::Written(path) => Self::Written { path },
            PersistOutcome::Fallback(path) => Self::Fallback { path },
            PersistOutcome::Dropped => Self::Dropped,
        }
    }
}

/// 단일 이벤트 처리 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReport {
    /// 플래그
    pub flag: String,
    /// 기본 기록 결과
    pub delivery: Delivery,
    /// 크리티컬 복제 결과
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica: Option<Delivery>,
    /// 외부 알림이 예약되었는지 여부
    pub notified: bool,
}

impl WriteReport {
    fn new(flag: &str, delivery: Delivery) -> Self {
        Self {
            flag: flag.to_owned(),
            delivery,
            replica: None,
            notified: false,
        }
    }

    fn disabled(flag: &str) -> Self {
        Self::new(flag, Delivery::Disabled)
    }
}

/// 배치 처리 결과 (요청 순서 유지)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// 요청별 결과
    pub results: Vec<Result<WriteReport, EventError>>,
}

impl BatchReport {
    /// 요청 수
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// 성공한 결과
    pub fn succeeded(&self) -> impl Iterator<Item = &WriteReport> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    /// 실패한 결과
    pub fn failed(&self) -> impl Iterator<Item = &EventError> {
        self.results.iter().filter_map(|r| r.as_ref().err())
    }
}

/// 해석까지 끝난 이벤트
struct Prepared {
    event: LogEvent,
    target: Target,
}

enum Target {
    Path(String),
    Missing {
        flag_segment: String,
        template: String,
        missing: Vec<String>,
    },
}

impl Target {
    fn group_key(&self) -> GroupKey {
        match self {
            Self::Path(relative) => GroupKey::Path(relative.clone()),
            Self::Missing {
                flag_segment,
                missing,
                ..
            } => {
                let mut signature = missing.clone();
                signature.sort();
                GroupKey::Missing {
                    flag_segment: flag_segment.clone(),
                    signature: signature.join(","),
                }
            }
        }
    }
}

/// 같은 쓰기로 묶는 기준
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Path(String),
    Missing {
        flag_segment: String,
        signature: String,
    },
}

/// 기본 쓰기 결과와 그때 사용한 상대 경로
#[derive(Debug, Clone)]
struct Landing {
    delivery: Delivery,
    relative: String,
}

/// 로그 라우터
///
/// # 사용 예시
/// ```ignore
/// use logroute_core::event::LogRequest;
/// use logroute_pipeline::{LogRouter, RouterConfig};
///
/// let router = LogRouter::from_config(RouterConfig::default()).await?;
/// let report = router
///     .write_log(LogRequest::new("USER_LOGIN", "login", "ok").field("userId", "u-1"))
///     .await?;
/// router.drain().await;
/// ```
pub struct LogRouter<S: FileStore = TokioFileStore, N: Notifier = WebhookNotifier> {
    config: RouterConfig,
    context: Arc<PipelineContext>,
    clock: Arc<dyn Clock>,
    resolver: RouteResolver,
    loader: Option<RoutingTableLoader>,
    templates: TemplateEngine,
    encryptor: FieldEncryptor,
    primary: Arc<DurableWriter<S>>,
    missing: Arc<DurableWriter<S>>,
    replicator: CriticalReplicator<S>,
    dispatcher: Arc<NotificationDispatcher<S, N>>,
}

impl LogRouter<TokioFileStore, WebhookNotifier> {
    /// 설정만으로 운영용 라우터를 만듭니다.
    pub async fn from_config(config: RouterConfig) -> Result<Self, DeliveryError> {
        LogRouterBuilder::new()
            .config(config)
            .webhook_from_config()?
            .build()
            .await
    }
}

impl<S: FileStore, N: Notifier> LogRouter<S, N> {
    /// 라우터 설정
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// 파이프라인 컨텍스트
    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.context
    }

    /// 처리 통계 스냅샷
    pub fn stats(&self) -> StatsSnapshot {
        self.context.stats().snapshot()
    }

    /// 필드 암호화기
    pub fn encryptor(&self) -> &FieldEncryptor {
        &self.encryptor
    }

    /// 플래그의 라우트를 돌려줍니다.
    pub fn route_for(&self, flag: &str) -> Arc<LogRoute> {
        self.resolver.route_for(flag)
    }

    /// 요청이 기록될 경로를 미리 계산합니다. 디스크는 건드리지 않습니다.
    pub fn preview(&self, request: &LogRequest) -> (Arc<LogRoute>, Expansion) {
        let route = self.resolver.route_for(&request.flag);
        let event = LogEvent::build(request, &route, self.clock.now(), &self.config.env);
        let expansion = self
            .templates
            .expand(&route.path_template, &template_scope(&request.data, &event, &route));
        (route, expansion)
    }

    /// 라우팅 테이블 파일을 다시 읽습니다. 바뀌지 않았으면 아무 것도 하지 않습니다.
    ///
    /// 읽기에 실패하면 기존 테이블을 유지하고 에러를 돌려줍니다.
    pub async fn reload_routes(&self) -> Result<usize, DeliveryError> {
        let Some(loader) = &self.loader else {
            return Ok(self.resolver.table().len());
        };
        match loader.load().await {
            Ok(table) => {
                let routes = table.len();
                self.resolver.replace_table(table);
                Ok(routes)
            }
            Err(e) => {
                self.resolver.record_failure(&e.to_string());
                Err(e)
            }
        }
    }

    /// 대기 중인 알림과 재시도가 끝날 때까지 기다립니다.
    pub async fn drain(&self) {
        self.dispatcher.drain().await;
    }

    /// 로그 이벤트 하나를 기록합니다.
    ///
    /// 잘못된 요청과 최후의 폴백 실패만 에러입니다. 알림 실패는 결과에 영향을 주지 않습니다.
    pub async fn write_log(&self, request: LogRequest) -> Result<WriteReport, DeliveryError> {
        if !self.config.enabled {
            return Ok(WriteReport::disabled(&request.flag));
        }

        let prepared = self.prepare(&request)?;
        let key = prepared.target.group_key();
        let landing = self
            .persist_group(&prepared.target, vec![prepared.event.clone()])
            .await?;

        let mut report = WriteReport::new(&prepared.event.flag, landing.delivery.clone());
        if prepared.event.critical {
            if let GroupKey::Path(relative) = &key {
                let payload = Payload::Entry(Box::new(prepared.event.clone()));
                let outcome = self.replicator.replicate(relative, &payload).await?;
                report.replica = Some(Delivery::from(outcome));
            }
            report.notified = self.notify_if_persisted(&report, &landing.relative, prepared.event);
        }
        Ok(report)
    }

    /// 여러 이벤트를 기록합니다.
    ///
    /// 각 이벤트는 독립적으로 처리되며 결과는 요청 순서를 따릅니다.
    pub async fn write_logs(&self, requests: Vec<LogRequest>) -> BatchReport {
        if !self.config.enabled {
            return BatchReport {
                results: requests
                    .iter()
                    .map(|r| Ok(WriteReport::disabled(&r.flag)))
                    .collect(),
            };
        }

        let count = requests.len();
        let mut results: Vec<Option<Result<WriteReport, EventError>>> =
            (0..count).map(|_| None).collect();
        let mut prepared: Vec<Option<Prepared>> = (0..count).map(|_| None).collect();

        // 1. 해석 + 묶기
        let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();
        let mut group_index: HashMap<GroupKey, usize> = HashMap::new();
        for (i, request) in requests.iter().enumerate() {
            match self.prepare(request) {
                Ok(p) => {
                    let key = p.target.group_key();
                    let slot = *group_index.entry(key.clone()).or_insert_with(|| {
                        groups.push((key, Vec::new()));
                        groups.len() - 1
                    });
                    groups[slot].1.push(i);
                    prepared[i] = Some(p);
                }
                Err(e) => results[i] = Some(Err(EventError::from(&e))),
            }
        }

        // 2. 기본 쓰기, 모두 끝날 때까지 대기
        let writes = groups.iter().filter_map(|(_, members)| {
            let first = prepared[*members.first()?].as_ref()?;
            let events = members
                .iter()
                .filter_map(|&i| prepared[i].as_ref().map(|p| p.event.clone()))
                .collect();
            Some(self.persist_group(&first.target, events))
        });
        let outcomes = join_all(writes).await;

        let mut landed: Vec<Option<Landing>> = (0..count).map(|_| None).collect();
        for ((_, members), outcome) in groups.iter().zip(outcomes) {
            match outcome {
                Ok(landing) => {
                    for &i in members {
                        landed[i] = Some(landing.clone());
                    }
                }
                Err(e) => {
                    let err = EventError::from(&e);
                    for &i in members {
                        results[i] = Some(Err(err.clone()));
                    }
                }
            }
        }

        // 3. 크리티컬 복제 (기본 쓰기가 모두 끝난 뒤)
        let mut critical_groups: Vec<(String, Vec<usize>)> = Vec::new();
        let mut critical_index: HashMap<String, usize> = HashMap::new();
        for (key, members) in &groups {
            let GroupKey::Path(relative) = key else {
                continue;
            };
            for &i in members {
                let is_critical = prepared[i].as_ref().is_some_and(|p| p.event.critical);
                if !is_critical || landed[i].is_none() {
                    continue;
                }
                let slot = *critical_index.entry(relative.clone()).or_insert_with(|| {
                    critical_groups.push((relative.clone(), Vec::new()));
                    critical_groups.len() - 1
                });
                critical_groups[slot].1.push(i);
            }
        }

        let replications = critical_groups.iter().map(|(relative, members)| {
            let events: Vec<LogEvent> = members
                .iter()
                .filter_map(|&i| prepared[i].as_ref().map(|p| p.event.clone()))
                .collect();
            async move {
                let payload = group_payload(events);
                self.replicator.replicate(relative, &payload).await
            }
        });
        let replicas = join_all(replications).await;

        let mut replica_of: Vec<Option<Result<Delivery, EventError>>> =
            (0..count).map(|_| None).collect();
        for ((_, members), outcome) in critical_groups.iter().zip(replicas) {
            let outcome = outcome
                .map(Delivery::from)
                .map_err(|e| EventError::from(&e));
            for &i in members {
                replica_of[i] = Some(outcome.clone());
            }
        }

        // 4. 보고서 + 알림
        for i in 0..count {
            if results[i].is_some() {
                continue;
            }
            let (Some(p), Some(landing)) = (prepared[i].take(), landed[i].take()) else {
                continue;
            };
            let mut report = WriteReport::new(&p.event.flag, landing.delivery);
            match replica_of[i].take() {
                Some(Err(e)) => {
                    results[i] = Some(Err(e));
                    continue;
                }
                Some(Ok(replica)) => report.replica = Some(replica),
                None => {}
            }
            if p.event.critical {
                report.notified = self.notify_if_persisted(&report, &landing.relative, p.event);
            }
            results[i] = Some(Ok(report));
        }

        BatchReport {
            results: results
                .into_iter()
                .map(|r| {
                    r.unwrap_or_else(|| {
                        Err(EventError {
                            caller_error: false,
                            message: "event was not processed".to_owned(),
                        })
                    })
                })
                .collect(),
        }
    }

    /// 검증 → 라우트 → 경로 확장 → 암호화
    fn prepare(&self, request: &LogRequest) -> Result<Prepared, DeliveryError> {
        validate_request(request)?;

        let route = self.resolver.route_for(&request.flag);
        let event = LogEvent::build(request, &route, self.clock.now(), &self.config.env);

        let expansion = self
            .templates
            .expand(&route.path_template, &template_scope(&request.data, &event, &route));

        let targets = FieldEncryptor::targets(request, &route);
        let event = self.encryptor.encrypt(event, &targets);

        let target = match expansion.path {
            Some(path) => Target::Path(path),
            None => {
                tracing::warn!(
                    flag = %request.flag,
                    template = %route.path_template,
                    missing = ?expansion.missing,
                    "path placeholders missing, redirecting to missing_path store"
                );
                Target::Missing {
                    flag_segment: self.flag_segment(&request.flag),
                    template: route.path_template.clone(),
                    missing: expansion.missing,
                }
            }
        };

        Ok(Prepared { event, target })
    }

    async fn persist_group(
        &self,
        target: &Target,
        events: Vec<LogEvent>,
    ) -> Result<Landing, DeliveryError> {
        match target {
            Target::Path(relative) => {
                let outcome = self.primary.persist(relative, &group_payload(events)).await?;
                Ok(Landing {
                    delivery: Delivery::from(outcome),
                    relative: relative.clone(),
                })
            }
            Target::Missing {
                flag_segment,
                template,
                missing,
            } => {
                self.persist_missing(flag_segment, template, missing, events)
                    .await
            }
        }
    }

    /// `<flag>/<yyyy-MM-dd>.log`에 누락 정보와 엔트리를 묶어 기록합니다.
    async fn persist_missing(
        &self,
        flag_segment: &str,
        template: &str,
        missing: &[String],
        events: Vec<LogEvent>,
    ) -> Result<Landing, DeliveryError> {
        let now = self.clock.now();
        let relative = format!("{flag_segment}/{}.log", now.format("%Y-%m-%d"));
        let count = events.len();

        let envelope = json!({
            "flag": flag_segment,
            "template": template,
            "missing": missing,
            "timestamp": now.to_rfc3339_opts(SecondsFormat::Millis, true),
            "entryCount": count,
            "entries": events,
        });
        let payload = Payload::Line(serde_json::to_string(&envelope)?);
        let outcome = self.missing.persist(&relative, &payload).await?;

        metrics::counter!(m::MISSING_PATH_REDIRECTS_TOTAL).increment(count as u64);
        for _ in 0..count {
            self.context.stats().record_missing_path();
        }

        let delivery = match outcome {
            PersistOutcome::Written(path) | PersistOutcome::Fallback(path) => {
                Delivery::MissingPath {
                    path,
                    missing: missing.to_vec(),
                }
            }
            PersistOutcome::Dropped => Delivery::Dropped,
        };
        Ok(Landing { delivery, relative })
    }

    fn notify_if_persisted(&self, report: &WriteReport, relative: &str, event: LogEvent) -> bool {
        let persisted = report.delivery.is_persisted()
            || report.replica.as_ref().is_some_and(Delivery::is_persisted);
        if !persisted {
            tracing::debug!(flag = %event.flag, "critical event not persisted, skipping notification");
            return false;
        }
        self.dispatcher.dispatch(relative, Arc::new(event));
        true
    }

    fn flag_segment(&self, flag: &str) -> String {
        let segment = sanitize_segment(self.templates.sanitizer(), flag);
        if segment.is_empty() || segment.chars().all(|c| c == '.') {
            "unknown".to_owned()
        } else {
            segment
        }
    }
}

fn group_payload(mut events: Vec<LogEvent>) -> Payload {
    if events.len() == 1
        && let Some(event) = events.pop()
    {
        return Payload::Entry(Box::new(event));
    }
    Payload::Batch(events)
}

/// 템플릿 확장에 쓰는 데이터
///
/// 호출자 데이터에 없으면 이벤트의 `flag`, `level`, `env`, `date`, `timestamp`를 더합니다.
/// 폴백 라우트의 `date`는 항상 이벤트 시각입니다.
fn template_scope(
    data: &Map<String, Value>,
    event: &LogEvent,
    route: &LogRoute,
) -> Map<String, Value> {
    let mut scope = data.clone();
    let ambient = [
        ("flag", event.flag.as_str()),
        ("level", event.level.as_str()),
        ("env", event.env.as_str()),
        ("date", event.timestamp.as_str()),
        ("timestamp", event.timestamp.as_str()),
    ];
    for (key, value) in ambient {
        if !scope.keys().any(|k| k.eq_ignore_ascii_case(key)) {
            scope.insert(key.to_owned(), Value::String(value.to_owned()));
        }
    }
    if route.is_fallback() {
        scope.insert("date".to_owned(), Value::String(event.timestamp.clone()));
    }
    scope
}

fn validate_request(request: &LogRequest) -> Result<(), DeliveryError> {
    validate_name("flag", &request.flag)?;
    validate_name("action", &request.action)?;
    if let Some(key) = request
        .data
        .keys()
        .find(|k| RESERVED_KEYS.contains(&k.as_str()))
    {
        return Err(DeliveryError::InvalidRequest {
            field: "data".to_owned(),
            reason: format!("reserved key '{key}'"),
        });
    }
    Ok(())
}

fn validate_name(field: &str, value: &str) -> Result<(), DeliveryError> {
    let reject = |reason: &str| DeliveryError::InvalidRequest {
        field: field.to_owned(),
        reason: reason.to_owned(),
    };
    if value.trim().is_empty() {
        return Err(reject("must not be empty"));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(reject(&format!("must be at most {MAX_NAME_LEN} characters")));
    }
    if value.chars().any(char::is_control) {
        return Err(reject("must not contain control characters"));
    }
    Ok(())
}

/// 라우터 빌더
pub struct LogRouterBuilder<S: FileStore = TokioFileStore, N: Notifier = WebhookNotifier> {
    config: RouterConfig,
    store: Arc<S>,
    notifier: Option<Arc<N>>,
    clock: Arc<dyn Clock>,
    formatter: Arc<dyn DateFormatter>,
    sanitizer: Arc<dyn Sanitizer>,
    context: Option<Arc<PipelineContext>>,
    table: Option<RoutingTable>,
}

impl LogRouterBuilder<TokioFileStore, WebhookNotifier> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: RouterConfig::default(),
            store: Arc::new(TokioFileStore),
            notifier: None,
            clock: Arc::new(SystemClock),
            formatter: Arc::new(PatternFormatter),
            sanitizer: Arc::new(DefaultSanitizer),
            context: None,
            table: None,
        }
    }
}

impl Default for LogRouterBuilder<TokioFileStore, WebhookNotifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FileStore> LogRouterBuilder<S, WebhookNotifier> {
    /// 현재 설정의 웹훅 URL로 전송자를 만듭니다.
    pub fn webhook_from_config(mut self) -> Result<Self, DeliveryError> {
        let notifier = WebhookNotifier::from_url(
            self.config.webhook_url.as_deref(),
            self.config.breaker_policy().timeout,
        )
        .map_err(|e| DeliveryError::Config {
            field: "webhook_url".to_owned(),
            reason: e.to_string(),
        })?;
        self.notifier = Some(Arc::new(notifier));
        Ok(self)
    }
}

impl<S: FileStore, N: Notifier> LogRouterBuilder<S, N> {
    /// 라우터 설정을 지정합니다.
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// 시계를 지정합니다.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 날짜 포맷터를 지정합니다.
    pub fn formatter(mut self, formatter: Arc<dyn DateFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// 문자열 정제기를 지정합니다.
    pub fn sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// 공유 컨텍스트를 지정합니다. 없으면 설정의 캐시 용량으로 새로 만듭니다.
    pub fn context(mut self, context: Arc<PipelineContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// 라우팅 테이블을 직접 지정합니다. 지정하면 `routes_file`은 읽지 않습니다.
    pub fn routing_table(mut self, table: RoutingTable) -> Self {
        self.table = Some(table);
        self
    }

    /// 파일 저장소를 바꿉니다.
    pub fn store<S2: FileStore>(self, store: Arc<S2>) -> LogRouterBuilder<S2, N> {
        LogRouterBuilder {
            config: self.config,
            store,
            notifier: self.notifier,
            clock: self.clock,
            formatter: self.formatter,
            sanitizer: self.sanitizer,
            context: self.context,
            table: self.table,
        }
    }

    /// 알림 전송자를 바꿉니다.
    pub fn notifier<N2: Notifier>(self, notifier: Arc<N2>) -> LogRouterBuilder<S, N2> {
        LogRouterBuilder {
            config: self.config,
            store: self.store,
            notifier: Some(notifier),
            clock: self.clock,
            formatter: self.formatter,
            sanitizer: self.sanitizer,
            context: self.context,
            table: self.table,
        }
    }

    /// 설정을 검증하고 라우터를 생성합니다.
    ///
    /// 라우팅 테이블 파일을 읽지 못해도 실패하지 않습니다. 실패를 기록하고 모든
    /// 플래그를 폴백 라우트로 처리합니다.
    pub async fn build(self) -> Result<LogRouter<S, N>, DeliveryError> {
        let Self {
            config,
            store,
            notifier,
            clock,
            formatter,
            sanitizer,
            context,
            table,
        } = self;

        config.validate()?;
        let notifier = notifier.ok_or_else(|| DeliveryError::Config {
            field: "notifier".to_owned(),
            reason: "no notifier configured".to_owned(),
        })?;
        let context =
            context.unwrap_or_else(|| Arc::new(PipelineContext::new(config.cache_capacity)));

        let policy = config.write_policy();
        let writer = |root: &Path, label: &'static str| {
            DurableWriter::new(
                Arc::clone(&store),
                Arc::clone(&context),
                Arc::clone(&clock),
                root,
                label,
                policy,
            )
        };
        let write_errors = Arc::new(writer(&config.write_errors_root, "write_errors"));
        let with_fallback = |root: &Path, label: &'static str| {
            Arc::new(writer(root, label).with_fallback(Arc::clone(&write_errors)))
        };
        let primary = with_fallback(&config.root, "primary");
        let critical = with_fallback(&config.critical_root, "critical");
        let missing = with_fallback(&config.missing_path_root, "missing_path");
        let slack_fallback = with_fallback(&config.slack_fallback_root, "slack_fallback");

        let replicator = CriticalReplicator::new(Arc::clone(&primary), critical, Arc::clone(&context));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifier,
            slack_fallback,
            Arc::clone(&context),
            config.breaker_policy(),
        ));

        let templates = TemplateEngine::new(Arc::clone(&context), formatter, Arc::clone(&sanitizer))?;
        let encryptor = FieldEncryptor::new(
            config.encryption_key.as_ref().map(Secret::expose),
            Arc::clone(&context),
        );

        let resolver =
            RouteResolver::new(RoutingTable::empty(), Arc::clone(&context)).with_sanitizer(sanitizer);
        let loader = match (table, &config.routes_file) {
            (Some(table), _) => {
                resolver.replace_table(table);
                None
            }
            (None, Some(path)) => {
                let loader = RoutingTableLoader::new(path)?;
                match loader.load().await {
                    Ok(table) => resolver.replace_table(table),
                    Err(e) => resolver.record_failure(&e.to_string()),
                }
                Some(loader)
            }
            (None, None) => {
                tracing::debug!("no routing table configured, every flag uses its fallback route");
                None
            }
        };

        tracing::info!(
            enabled = config.enabled,
            root = %config.root.display(),
            critical_nested = replicator.is_nested(),
            encryption = encryptor.has_key(),
            routes = resolver.table().len(),
            "log router ready"
        );

        Ok(LogRouter {
            config,
            context,
            clock,
            resolver,
            loader,
            templates,
            encryptor,
            primary,
            missing,
            replicator,
            dispatcher,
        })
    }
}
