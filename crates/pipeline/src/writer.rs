//! 내구성 쓰기 -- 재시도, 로테이션, 폴백 캐스케이드
//!
//! [`DurableWriter`]는 하나의 루트 디렉토리에 대한 쓰기를 담당합니다.
//!
//! # 쓰기 절차
//! 1. 페이로드 검증 (빈 줄, 빈 배치, 플래그 없는 엔트리는 호출자 에러)
//! 2. 상대 경로 해석 (절대 경로, `..` 거부)
//! 3. 디렉토리 생성 → 크기 초과 시 로테이션 → 덧붙이기, 최대 `attempts`회
//!    (시도 사이에 `backoff_base * 2^attempt` 대기)
//! 4. 시도를 모두 소진하면:
//!    - 권한 오류: 조용히 버림 (카운터만 증가)
//!    - 그 외: write_errors 폴백 루트에 에러 코드, 원래 경로, 엔트리 수와 함께 기록
//!    - 폴백 쓰기의 권한 오류도 조용히 버리고, 그 외 실패는 호출자에게 전파

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use serde_json::json;

use logroute_core::clock::Clock;
use logroute_core::config::DEFAULT_MAX_FILE_SIZE_BYTES;
use logroute_core::event::{FILE_TIMESTAMP_FORMAT, LogEvent};
use logroute_core::metrics as m;

use crate::context::PipelineContext;
use crate::error::DeliveryError;
use crate::store::{FileStore, ResolvedPath, resolve_relative};

/// 기록할 페이로드
#[derive(Debug, Clone)]
pub enum Payload {
    /// 이미 직렬화된 한 줄
    Line(String),
    /// 단일 로그 엔트리
    Entry(Box<LogEvent>),
    /// 같은 파일로 가는 엔트리 묶음 (NDJSON)
    Batch(Vec<LogEvent>),
}

impl Payload {
    /// 엔트리 수
    pub fn entry_count(&self) -> usize {
        match self {
            Self::Line(_) | Self::Entry(_) => 1,
            Self::Batch(entries) => entries.len(),
        }
    }

    /// 페이로드 형식을 검증합니다.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        match self {
            Self::Line(line) if line.trim().is_empty() => Err(DeliveryError::InvalidPayload(
                "line payload must not be empty".to_owned(),
            )),
            Self::Entry(entry) if entry.flag.is_empty() => Err(DeliveryError::InvalidPayload(
                "log entry must carry a flag".to_owned(),
            )),
            Self::Batch(entries) if entries.is_empty() => Err(DeliveryError::InvalidPayload(
                "batch payload must not be empty".to_owned(),
            )),
            Self::Batch(entries) if entries.iter().any(|e| e.flag.is_empty()) => Err(
                DeliveryError::InvalidPayload("every batch entry must carry a flag".to_owned()),
            ),
            _ => Ok(()),
        }
    }

    /// 개행으로 끝나는 바이트열로 직렬화합니다.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeliveryError> {
        let mut out = String::new();
        match self {
            Self::Line(line) => {
                out.push_str(line.trim_end_matches(['\r', '\n']));
                out.push('\n');
            }
            Self::Entry(entry) => {
                out.push_str(&entry.to_json_line()?);
                out.push('\n');
            }
            Self::Batch(entries) => {
                for entry in entries {
                    out.push_str(&entry.to_json_line()?);
                    out.push('\n');
                }
            }
        }
        Ok(out.into_bytes())
    }

    fn to_value(&self) -> Result<serde_json::Value, DeliveryError> {
        Ok(match self {
            Self::Line(line) => serde_json::Value::String(line.clone()),
            Self::Entry(entry) => serde_json::to_value(entry)?,
            Self::Batch(entries) => serde_json::to_value(entries)?,
        })
    }
}

/// 쓰기 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// 요청한 경로에 기록됨
    Written(PathBuf),
    /// write_errors 폴백에 기록됨
    Fallback(PathBuf),
    /// 권한 오류로 버려짐
    Dropped,
}

impl PersistOutcome {
    /// 어딘가에 기록되었는지 여부
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Self::Dropped)
    }

    /// 기록된 파일 경로
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written(path) | Self::Fallback(path) => Some(path),
            Self::Dropped => None,
        }
    }
}

/// 단일 루트 쓰기 결과 (폴백 적용 전)
enum LocalOutcome {
    Done(PersistOutcome),
    Failed { relative: String, error: io::Error },
}

/// 쓰기 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    /// 이 크기를 넘은 파일은 다음 쓰기 전에 로테이션
    pub max_file_size: u64,
    /// 쓰기 시도 횟수
    pub attempts: u32,
    /// 백오프 기본 간격
    pub backoff_base: Duration,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE_BYTES,
            attempts: 2,
            backoff_base: Duration::from_millis(50),
        }
    }
}

/// 루트 하나에 대한 내구성 쓰기기
pub struct DurableWriter<S: FileStore> {
    store: Arc<S>,
    context: Arc<PipelineContext>,
    clock: Arc<dyn Clock>,
    root: PathBuf,
    /// 메트릭 레이블 (primary, critical, write_errors ...)
    label: &'static str,
    policy: WritePolicy,
    /// 시도 소진 시 사용할 폴백 쓰기기
    fallback: Option<Arc<DurableWriter<S>>>,
}

impl<S: FileStore> DurableWriter<S> {
    /// 폴백 없는 쓰기기를 생성합니다.
    pub fn new(
        store: Arc<S>,
        context: Arc<PipelineContext>,
        clock: Arc<dyn Clock>,
        root: impl Into<PathBuf>,
        label: &'static str,
        policy: WritePolicy,
    ) -> Self {
        Self {
            store,
            context,
            clock,
            root: root.into(),
            label,
            policy,
            fallback: None,
        }
    }

    /// 폴백 쓰기기를 지정합니다.
    pub fn with_fallback(mut self, fallback: Arc<DurableWriter<S>>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// 루트 디렉토리
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 메트릭 레이블
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// 상대 경로를 해석합니다 (경로 캐시 사용).
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, DeliveryError> {
        let key = (self.root.clone(), relative.to_owned());
        if let Some(hit) = self.context.cached_path(&key) {
            return Ok(hit);
        }
        let resolved = resolve_relative(&self.root, relative)?;
        self.context.cache_path(key, resolved.clone());
        Ok(resolved)
    }

    /// 페이로드를 기록합니다.
    ///
    /// 잘못된 입력에만 즉시 에러를 반환합니다. 환경 실패는 폴백으로 흡수하며,
    /// 폴백 쓰기까지 권한 외 이유로 실패한 경우에만 에러가 전파됩니다.
    pub async fn persist(
        &self,
        relative: &str,
        payload: &Payload,
    ) -> Result<PersistOutcome, DeliveryError> {
        match self.persist_local(relative, payload).await? {
            LocalOutcome::Done(outcome) => Ok(outcome),
            LocalOutcome::Failed { relative, error } => match &self.fallback {
                Some(fallback) => {
                    self.write_fallback(fallback, &relative, payload, &error)
                        .await
                }
                None => Err(DeliveryError::Io(error)),
            },
        }
    }

    /// 폴백 없이 이 루트에만 기록합니다.
    async fn persist_local(
        &self,
        relative: &str,
        payload: &Payload,
    ) -> Result<LocalOutcome, DeliveryError> {
        payload.validate()?;
        let resolved = self.resolve(relative)?;
        let bytes = payload.to_bytes()?;

        match self.write_with_retry(&resolved, &bytes).await {
            Ok(()) => {
                metrics::counter!(m::EVENTS_WRITTEN_TOTAL, m::LABEL_STORE => self.label)
                    .increment(payload.entry_count() as u64);
                self.context.stats().record_written();
                Ok(LocalOutcome::Done(PersistOutcome::Written(resolved.full)))
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                self.record_permission_drop(&resolved.relative, &e);
                Ok(LocalOutcome::Done(PersistOutcome::Dropped))
            }
            Err(error) => Ok(LocalOutcome::Failed {
                relative: resolved.relative,
                error,
            }),
        }
    }

    /// 디렉토리 생성 → 로테이션 → 덧붙이기를 백오프와 함께 재시도합니다.
    async fn write_with_retry(&self, resolved: &ResolvedPath, bytes: &[u8]) -> io::Result<()> {
        let attempts = self.policy.attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.policy.backoff_base * 2u32.saturating_pow(attempt - 1);
                tracing::debug!(
                    store = self.label,
                    path = %resolved.relative,
                    attempt = attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "retrying log write"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.write_once(resolved, bytes).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| io::Error::other("no write attempt made")))
    }

    async fn write_once(&self, resolved: &ResolvedPath, bytes: &[u8]) -> io::Result<()> {
        self.store.create_dir_all(&resolved.dir).await?;
        self.rotate_if_needed(&resolved.full).await?;
        self.store.append(&resolved.full, bytes).await
    }

    /// 파일이 임계치를 넘었으면 타임스탬프를 붙여 이름을 바꿉니다.
    ///
    /// 다른 쓰기기가 먼저 로테이션해서 파일이 사라진 경우는 에러가 아닙니다.
    async fn rotate_if_needed(&self, full: &Path) -> io::Result<()> {
        let Some(len) = self.store.file_len(full).await? else {
            return Ok(());
        };
        if len <= self.policy.max_file_size {
            return Ok(());
        }

        let stamp = self.clock.now().format(FILE_TIMESTAMP_FORMAT).to_string();
        let rotated = rotated_path(full, &stamp);
        match self.store.rename(full, &rotated).await {
            Ok(()) => {
                tracing::info!(
                    store = self.label,
                    from = %full.display(),
                    to = %rotated.display(),
                    size = len,
                    "rotated log file"
                );
                metrics::counter!(m::ROTATIONS_TOTAL).increment(1);
                self.context.stats().record_rotation();
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %full.display(), "log file vanished during rotation");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn write_fallback(
        &self,
        fallback: &DurableWriter<S>,
        relative: &str,
        payload: &Payload,
        err: &io::Error,
    ) -> Result<PersistOutcome, DeliveryError> {
        let now = self.clock.now();
        let fallback_relative =
            fallback_relative_path(relative, &now.format(FILE_TIMESTAMP_FORMAT).to_string());

        let mut envelope = json!({
            "errorCode": error_code(err),
            "errorMessage": err.to_string(),
            "attemptedPath": relative,
            "store": self.label,
            "timestamp": now.to_rfc3339_opts(SecondsFormat::Millis, true),
            "payload": payload.to_value()?,
        });
        if let Payload::Batch(entries) = payload {
            envelope["entryCount"] = json!(entries.len());
        }

        tracing::warn!(
            store = self.label,
            path = relative,
            error = %err,
            fallback = %fallback_relative,
            "log write failed, redirecting to write_errors"
        );

        let line = Payload::Line(serde_json::to_string(&envelope)?);
        match fallback.persist_local(&fallback_relative, &line).await? {
            LocalOutcome::Done(PersistOutcome::Written(path)) => {
                metrics::counter!(m::FALLBACK_WRITES_TOTAL).increment(1);
                self.context.stats().record_fallback_write();
                Ok(PersistOutcome::Fallback(path))
            }
            LocalOutcome::Done(other) => Ok(other),
            LocalOutcome::Failed { error, .. } => {
                tracing::error!(
                    path = relative,
                    error = %error,
                    "fallback write failed, giving up"
                );
                Err(DeliveryError::FallbackFailed {
                    attempted: relative.to_owned(),
                    source: error,
                })
            }
        }
    }

    fn record_permission_drop(&self, relative: &str, err: &io::Error) {
        tracing::debug!(
            store = self.label,
            path = relative,
            error = %err,
            "permission denied, dropping log write"
        );
        metrics::counter!(m::EVENTS_DROPPED_PERMISSION_TOTAL, m::LABEL_STORE => self.label)
            .increment(1);
        self.context.stats().record_dropped_permission();
    }
}

/// `dir/name.ext` → `dir/name.<stamp>.ext`
fn rotated_path(full: &Path, stamp: &str) -> PathBuf {
    let stem = full
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match full.extension() {
        Some(ext) => format!("{stem}.{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{stamp}"),
    };
    full.with_file_name(name)
}

/// `dir/name.ext` → `dir/name.<uuid8>.<stamp>.log`
fn fallback_relative_path(relative: &str, stamp: &str) -> String {
    let (dir, file) = match relative.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, relative),
    };
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    let stem = if stem.is_empty() { "entry" } else { stem };
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let name = format!("{stem}.{}.{stamp}.log", &suffix[..8]);
    match dir {
        Some(dir) => format!("{dir}/{name}"),
        None => name,
    }
}

/// io 에러를 errno 형식의 짧은 코드로 바꿉니다.
pub(crate) fn error_code(err: &io::Error) -> String {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => "EACCES",
        io::ErrorKind::NotFound => "ENOENT",
        io::ErrorKind::AlreadyExists => "EEXIST",
        io::ErrorKind::StorageFull => "ENOSPC",
        io::ErrorKind::ReadOnlyFilesystem => "EROFS",
        io::ErrorKind::IsADirectory => "EISDIR",
        io::ErrorKind::NotADirectory => "ENOTDIR",
        io::ErrorKind::TimedOut => "ETIMEDOUT",
        io::ErrorKind::Interrupted => "EINTR",
        _ => "EIO",
    };
    code.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FaultyFileStore, TokioFileStore};
    use chrono::TimeZone;
    use logroute_core::clock::FixedClock;
    use logroute_core::event::LogRequest;
    use logroute_core::types::LogRoute;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(
            chrono::Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap(),
        ))
    }

    fn policy() -> WritePolicy {
        WritePolicy {
            max_file_size: 64,
            attempts: 2,
            backoff_base: Duration::from_millis(1),
        }
    }

    fn event(flag: &str) -> LogEvent {
        let route = LogRoute::fallback(flag, "missingLogRoutes/x/{date:yyyy-MM-dd}.log");
        LogEvent::build(
            &LogRequest::new(flag, "act", "msg"),
            &route,
            chrono::Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap(),
            "test",
        )
    }

    fn writers<S: FileStore>(
        store: Arc<S>,
        dir: &Path,
    ) -> (DurableWriter<S>, Arc<PipelineContext>) {
        let ctx = Arc::new(PipelineContext::default());
        let fallback = Arc::new(DurableWriter::new(
            Arc::clone(&store),
            Arc::clone(&ctx),
            clock(),
            dir.join("write_errors"),
            "write_errors",
            policy(),
        ));
        let primary = DurableWriter::new(
            store,
            Arc::clone(&ctx),
            clock(),
            dir.join("primary"),
            "primary",
            policy(),
        )
        .with_fallback(fallback);
        (primary, ctx)
    }

    #[tokio::test]
    async fn writes_line_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, ctx) = writers(Arc::new(TokioFileStore), dir.path());

        let outcome = writer
            .persist("a/b.log", &Payload::Line("hello".to_owned()))
            .await
            .unwrap();

        let path = dir.path().join("primary/a/b.log");
        assert_eq!(outcome, PersistOutcome::Written(path.clone()));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello\n");
        assert_eq!(ctx.stats().snapshot().events_written, 1);
    }

    #[tokio::test]
    async fn batch_is_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, _) = writers(Arc::new(TokioFileStore), dir.path());

        writer
            .persist("batch.log", &Payload::Batch(vec![event("A"), event("B")]))
            .await
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("primary/batch.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: LogEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.flag, "B");
    }

    #[tokio::test]
    async fn rejects_invalid_input_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FaultyFileStore::new());
        let (writer, _) = writers(Arc::clone(&store), dir.path());

        let err = writer
            .persist("../escape.log", &Payload::Line("x".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::PathTraversal(_)));

        let err = writer
            .persist("a.log", &Payload::Line("  ".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidPayload(_)));

        let err = writer
            .persist("a.log", &Payload::Batch(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidPayload(_)));

        assert_eq!(store.append_calls(), 0);
    }

    #[tokio::test]
    async fn rotates_when_file_exceeds_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, ctx) = writers(Arc::new(TokioFileStore), dir.path());
        let big = "x".repeat(100);

        writer
            .persist("r.log", &Payload::Line(big.clone()))
            .await
            .unwrap();
        writer
            .persist("r.log", &Payload::Line("small".to_owned()))
            .await
            .unwrap();

        let current = std::fs::read_to_string(dir.path().join("primary/r.log")).unwrap();
        assert_eq!(current, "small\n");
        let rotated = dir.path().join("primary/r.2024-02-03T04-05-06-000Z.log");
        assert_eq!(
            std::fs::read_to_string(rotated).unwrap(),
            format!("{big}\n")
        );
        assert_eq!(ctx.stats().snapshot().rotations, 1);
    }

    #[tokio::test]
    async fn file_vanishing_during_rotation_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(FaultyFileStore::new().fail_rename_on("r.log", io::ErrorKind::NotFound));
        let (writer, ctx) = writers(Arc::clone(&store), dir.path());
        let big = "x".repeat(100);

        writer
            .persist("r.log", &Payload::Line(big.clone()))
            .await
            .unwrap();
        let outcome = writer
            .persist("r.log", &Payload::Line("small".to_owned()))
            .await
            .unwrap();

        let current = dir.path().join("primary/r.log");
        assert_eq!(outcome, PersistOutcome::Written(current.clone()));
        assert_eq!(
            std::fs::read_to_string(current).unwrap(),
            format!("{big}\nsmall\n")
        );
        assert!(!dir.path().join("write_errors").exists());
        let stats = ctx.stats().snapshot();
        assert_eq!(stats.rotations, 0);
        assert_eq!(stats.fallback_writes, 0);
    }

    #[tokio::test]
    async fn permission_error_is_dropped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(FaultyFileStore::new().fail_on("primary", io::ErrorKind::PermissionDenied));
        let (writer, ctx) = writers(Arc::clone(&store), dir.path());

        let outcome = writer
            .persist("a.log", &Payload::Line("x".to_owned()))
            .await
            .unwrap();

        assert_eq!(outcome, PersistOutcome::Dropped);
        assert!(!dir.path().join("write_errors").exists());
        assert_eq!(ctx.stats().snapshot().events_dropped_permission, 1);
    }

    #[tokio::test]
    async fn other_errors_go_to_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FaultyFileStore::new().fail_on("primary", io::ErrorKind::Other));
        let (writer, ctx) = writers(Arc::clone(&store), dir.path());

        let outcome = writer
            .persist("auth/login.log", &Payload::Batch(vec![event("A"), event("B")]))
            .await
            .unwrap();

        let PersistOutcome::Fallback(path) = outcome else {
            panic!("expected fallback, got {outcome:?}");
        };
        assert!(path.starts_with(dir.path().join("write_errors/auth")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("login."));
        assert!(name.ends_with(".2024-02-03T04-05-06-000Z.log"));

        let envelope: serde_json::Value =
            serde_json::from_str(std::fs::read_to_string(&path).unwrap().trim()).unwrap();
        assert_eq!(envelope["errorCode"], "EIO");
        assert_eq!(envelope["attemptedPath"], "auth/login.log");
        assert_eq!(envelope["entryCount"], 2);
        assert_eq!(envelope["payload"].as_array().unwrap().len(), 2);

        // 기본 루트 시도는 디렉토리 생성에서 실패하므로 append는 폴백 1회뿐
        assert_eq!(store.append_calls(), 1);
        assert_eq!(ctx.stats().snapshot().fallback_writes, 1);
    }

    #[tokio::test]
    async fn fallback_permission_error_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            FaultyFileStore::new()
                .fail_on("primary", io::ErrorKind::Other)
                .fail_on("write_errors", io::ErrorKind::PermissionDenied),
        );
        let (writer, _) = writers(store, dir.path());

        let outcome = writer
            .persist("a.log", &Payload::Line("x".to_owned()))
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Dropped);
    }

    #[tokio::test]
    async fn fallback_other_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            FaultyFileStore::new()
                .fail_on("primary", io::ErrorKind::Other)
                .fail_on("write_errors", io::ErrorKind::StorageFull),
        );
        let (writer, _) = writers(store, dir.path());

        let err = writer
            .persist("a.log", &Payload::Line("x".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::FallbackFailed { .. }));
    }

    #[test]
    fn rotated_path_keeps_extension() {
        let p = rotated_path(Path::new("/l/app.log"), "STAMP");
        assert_eq!(p, PathBuf::from("/l/app.STAMP.log"));
        let p = rotated_path(Path::new("/l/app"), "STAMP");
        assert_eq!(p, PathBuf::from("/l/app.STAMP"));
    }

    #[test]
    fn fallback_path_shape() {
        let p = fallback_relative_path("a/b/c.log", "STAMP");
        assert!(p.starts_with("a/b/c."));
        assert!(p.ends_with(".STAMP.log"));
        // stem + uuid8 + stamp + ext
        assert_eq!(p.rsplit('/').next().unwrap().split('.').count(), 4);

        let p = fallback_relative_path("plain", "S");
        assert!(p.starts_with("plain."));
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            error_code(&io::Error::from(io::ErrorKind::PermissionDenied)),
            "EACCES"
        );
        assert_eq!(error_code(&io::Error::other("x")), "EIO");
    }
}
