//! 크리티컬 복제 -- 크리티컬 이벤트를 별도 저장소에 한 번 더 기록
//!
//! 복제본 경로는 확장자 앞에 `.critical` 표식을 넣어 만듭니다
//! (`auth/2024-01-01.log` → `auth/2024-01-01.critical.log`).
//!
//! 크리티컬 루트가 기본 루트 아래에 있으면 기본 쓰기기를 통해 접두 경로를 붙여
//! 기록합니다. 같은 물리 트리에 대해 쓰기기를 둘 두지 않기 위함입니다.
//! 실패 정책(권한 오류는 조용히, 그 외는 폴백)은 기본 쓰기와 같습니다.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use logroute_core::metrics as m;

use crate::context::PipelineContext;
use crate::error::DeliveryError;
use crate::store::FileStore;
use crate::writer::{DurableWriter, Payload, PersistOutcome};

/// 크리티컬 표식이 들어간 상대 경로를 만듭니다.
pub fn critical_path(relative: &str) -> String {
    match relative.strip_suffix(".log") {
        Some(stem) if !stem.is_empty() && !stem.ends_with('/') => format!("{stem}.critical.log"),
        _ => format!("{relative}.critical.log"),
    }
}

/// 크리티컬 복제기
pub struct CriticalReplicator<S: FileStore> {
    primary: Arc<DurableWriter<S>>,
    critical: Arc<DurableWriter<S>>,
    /// 크리티컬 루트가 기본 루트 아래에 있을 때 기본 루트 기준 접두 경로
    nested_prefix: Option<String>,
    context: Arc<PipelineContext>,
}

impl<S: FileStore> CriticalReplicator<S> {
    /// 복제기를 생성합니다.
    pub fn new(
        primary: Arc<DurableWriter<S>>,
        critical: Arc<DurableWriter<S>>,
        context: Arc<PipelineContext>,
    ) -> Self {
        let nested_prefix = nested_prefix(primary.root(), critical.root());
        if let Some(prefix) = &nested_prefix {
            tracing::debug!(
                prefix = %prefix,
                "critical root is nested in primary root, replicas go through the primary writer"
            );
        }
        Self {
            primary,
            critical,
            nested_prefix,
            context,
        }
    }

    /// 크리티컬 루트가 기본 루트 아래에 있는지 여부
    pub fn is_nested(&self) -> bool {
        self.nested_prefix.is_some()
    }

    /// 크리티컬 복제본을 기록합니다.
    pub async fn replicate(
        &self,
        relative: &str,
        payload: &Payload,
    ) -> Result<PersistOutcome, DeliveryError> {
        let target = critical_path(relative);

        let outcome = match &self.nested_prefix {
            Some(prefix) if !prefix.is_empty() => {
                self.primary
                    .persist(&format!("{prefix}/{target}"), payload)
                    .await?
            }
            Some(_) => self.primary.persist(&target, payload).await?,
            None => self.critical.persist(&target, payload).await?,
        };

        if outcome.is_persisted() {
            metrics::counter!(m::CRITICAL_REPLICAS_TOTAL).increment(1);
            self.context.stats().record_critical_replica();
        }
        Ok(outcome)
    }
}

/// `critical`이 `primary` 아래에 있으면 상대 접두 경로를 돌려줍니다.
fn nested_prefix(primary: &Path, critical: &Path) -> Option<String> {
    let primary = lexical_absolute(primary)?;
    let critical = lexical_absolute(critical)?;
    let rest = critical.strip_prefix(&primary).ok()?;
    let parts: Vec<String> = rest
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// 파일시스템을 건드리지 않고 절대 경로로 바꾸고 `.`/`..`를 정리합니다.
fn lexical_absolute(path: &Path) -> Option<PathBuf> {
    let absolute = std::path::absolute(path).ok()?;
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}
