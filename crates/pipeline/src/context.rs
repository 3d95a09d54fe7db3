//! 파이프라인 컨텍스트 -- 캐시, 서킷 상태, 통계의 소유자
//!
//! [`PipelineContext`]는 라우트/경로/템플릿 캐시와 알림 서킷 상태를 하나로 묶어
//! 각 컴포넌트에 `Arc`로 주입됩니다. 전역 싱글턴 대신 명시적으로 생성되므로
//! 테스트마다 독립된 인스턴스를 만들거나 [`reset`](PipelineContext::reset)으로
//! 초기화할 수 있습니다.
//!
//! 모든 잠금은 `std::sync::Mutex`이며, 잠금을 쥔 채로 `.await`하지 않습니다.
//! 각 변경(삽입+트리밍, 카운터 증가+비교)은 잠금 안에서 한 번에 끝납니다.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use logroute_core::types::LogRoute;

use crate::breaker::CircuitState;
use crate::cache::BoundedCache;
use crate::store::ResolvedPath;

/// 경로 캐시 키: (루트, 상대 경로 입력)
pub type PathKey = (PathBuf, String);

/// 파이프라인 컨텍스트
#[derive(Debug)]
pub struct PipelineContext {
    /// 소문자 플래그 -> 라우트
    routes: Mutex<BoundedCache<String, Arc<LogRoute>>>,
    /// (루트, 상대 경로) -> 해석된 경로
    paths: Mutex<BoundedCache<PathKey, ResolvedPath>>,
    /// 템플릿 + 참조 값 -> 확장된 경로
    templates: Mutex<BoundedCache<String, String>>,
    /// 알림 서킷 상태
    circuit: Mutex<CircuitState>,
    /// 처리 통계
    stats: PipelineStats,
}

impl PipelineContext {
    /// 지정한 캐시 용량으로 컨텍스트를 생성합니다.
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            routes: Mutex::new(BoundedCache::new(cache_capacity)),
            paths: Mutex::new(BoundedCache::new(cache_capacity)),
            templates: Mutex::new(BoundedCache::new(cache_capacity)),
            circuit: Mutex::new(CircuitState::default()),
            stats: PipelineStats::default(),
        }
    }

    /// 캐시된 라우트를 조회합니다.
    pub fn cached_route(&self, key: &str) -> Option<Arc<LogRoute>> {
        lock(&self.routes).get(key).cloned()
    }

    /// 라우트를 캐시에 넣습니다.
    pub fn cache_route(&self, key: String, route: Arc<LogRoute>) {
        lock(&self.routes).insert(key, route);
    }

    /// 라우트 캐시를 비웁니다 (라우팅 테이블 교체 시).
    pub fn clear_routes(&self) {
        lock(&self.routes).clear();
    }

    /// 캐시된 경로 해석 결과를 조회합니다.
    pub fn cached_path(&self, key: &PathKey) -> Option<ResolvedPath> {
        lock(&self.paths).get(key).cloned()
    }

    /// 경로 해석 결과를 캐시에 넣습니다.
    pub fn cache_path(&self, key: PathKey, resolved: ResolvedPath) {
        lock(&self.paths).insert(key, resolved);
    }

    /// 캐시된 템플릿 확장 결과를 조회합니다.
    pub fn cached_template(&self, key: &str) -> Option<String> {
        lock(&self.templates).get(key).cloned()
    }

    /// 템플릿 확장 결과를 캐시에 넣습니다.
    pub fn cache_template(&self, key: String, path: String) {
        lock(&self.templates).insert(key, path);
    }

    /// 서킷 상태 잠금을 얻습니다.
    pub(crate) fn circuit(&self) -> MutexGuard<'_, CircuitState> {
        lock(&self.circuit)
    }

    /// 처리 통계
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// 캐시 크기 스냅샷
    pub fn cache_sizes(&self) -> CacheSizes {
        let routes = lock(&self.routes);
        let paths = lock(&self.paths);
        let templates = lock(&self.templates);
        CacheSizes {
            routes: routes.len(),
            paths: paths.len(),
            templates: templates.len(),
            evicted: routes.evicted() + paths.evicted() + templates.evicted(),
        }
    }

    /// 모든 캐시, 서킷 상태, 통계를 초기화합니다.
    pub fn reset(&self) {
        lock(&self.routes).clear();
        lock(&self.paths).clear();
        lock(&self.templates).clear();
        *lock(&self.circuit) = CircuitState::default();
        self.stats.reset();
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// 캐시 크기 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheSizes {
    /// 라우트 캐시 엔트리 수
    pub routes: usize,
    /// 경로 캐시 엔트리 수
    pub paths: usize,
    /// 템플릿 캐시 엔트리 수
    pub templates: usize,
    /// 세 캐시에서 용량 초과로 축출된 엔트리 수
    pub evicted: u64,
}

/// 잠금을 얻습니다. 보호 대상은 문장 사이에서 항상 일관되므로 poison은 무시합니다.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// 처리 통계 카운터
///
/// 메트릭 레코더가 없어도 읽을 수 있도록 핫 패스 밖에서 원자적으로 누적합니다.
#[derive(Debug, Default)]
pub struct PipelineStats {
    events_written: AtomicU64,
    events_dropped_permission: AtomicU64,
    fallback_writes: AtomicU64,
    missing_path_redirects: AtomicU64,
    rotations: AtomicU64,
    critical_replicas: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
    notifications_skipped: AtomicU64,
    breaker_opens: AtomicU64,
    encryption_skipped: AtomicU64,
    encryption_failures: AtomicU64,
    decryption_failures: AtomicU64,
    routing_table_failures: AtomicU64,
}

macro_rules! stat_incrementers {
    ($($name:ident => $field:ident),* $(,)?) => {
        impl PipelineStats {
            $(
                pub(crate) fn $name(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

stat_incrementers! {
    record_written => events_written,
    record_dropped_permission => events_dropped_permission,
    record_fallback_write => fallback_writes,
    record_missing_path => missing_path_redirects,
    record_rotation => rotations,
    record_critical_replica => critical_replicas,
    record_notification_sent => notifications_sent,
    record_notification_failed => notifications_failed,
    record_notification_skipped => notifications_skipped,
    record_breaker_open => breaker_opens,
    record_encryption_skipped => encryption_skipped,
    record_encryption_failure => encryption_failures,
    record_decryption_failure => decryption_failures,
    record_routing_table_failure => routing_table_failures,
}

impl PipelineStats {
    /// 현재 값의 스냅샷
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            events_written: load(&self.events_written),
            events_dropped_permission: load(&self.events_dropped_permission),
            fallback_writes: load(&self.fallback_writes),
            missing_path_redirects: load(&self.missing_path_redirects),
            rotations: load(&self.rotations),
            critical_replicas: load(&self.critical_replicas),
            notifications_sent: load(&self.notifications_sent),
            notifications_failed: load(&self.notifications_failed),
            notifications_skipped: load(&self.notifications_skipped),
            breaker_opens: load(&self.breaker_opens),
            encryption_skipped: load(&self.encryption_skipped),
            encryption_failures: load(&self.encryption_failures),
            decryption_failures: load(&self.decryption_failures),
            routing_table_failures: load(&self.routing_table_failures),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.events_written,
            &self.events_dropped_permission,
            &self.fallback_writes,
            &self.missing_path_redirects,
            &self.rotations,
            &self.critical_replicas,
            &self.notifications_sent,
            &self.notifications_failed,
            &self.notifications_skipped,
            &self.breaker_opens,
            &self.encryption_skipped,
            &self.encryption_failures,
            &self.decryption_failures,
            &self.routing_table_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// 성공한 쓰기 호출 수 (모든 저장소 합계)
    pub events_written: u64,
    /// 권한 오류로 버려진 쓰기 수
    pub events_dropped_permission: u64,
    /// write_errors 폴백 쓰기 수
    pub fallback_writes: u64,
    /// 플레이스홀더 누락으로 우회한 이벤트 수
    pub missing_path_redirects: u64,
    /// 파일 로테이션 수
    pub rotations: u64,
    /// 크리티컬 복제 수
    pub critical_replicas: u64,
    /// 알림 전송 성공 수
    pub notifications_sent: u64,
    /// 알림 전송 실패 수
    pub notifications_failed: u64,
    /// 서킷 오픈으로 생략된 알림 수
    pub notifications_skipped: u64,
    /// 서킷 오픈 횟수
    pub breaker_opens: u64,
    /// 키 부재로 암호화를 생략한 이벤트 수
    pub encryption_skipped: u64,
    /// 필드 암호화 실패 수
    pub encryption_failures: u64,
    /// 필드 복호화 실패 수
    pub decryption_failures: u64,
    /// 라우팅 테이블 순회 실패 수
    pub routing_table_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(flag: &str) -> Arc<LogRoute> {
        Arc::new(LogRoute {
            flag: flag.to_owned(),
            path_template: "a/{date:yyyy-MM-dd}.log".to_owned(),
            retention: None,
            category: "a".to_owned(),
            description: String::new(),
            is_pci_relevant: false,
            critical: false,
            encrypt_fields: Vec::new(),
        })
    }

    #[test]
    fn route_cache_is_bounded() {
        let ctx = PipelineContext::new(2);
        ctx.cache_route("a".to_owned(), route("A"));
        ctx.cache_route("b".to_owned(), route("B"));
        ctx.cache_route("c".to_owned(), route("C"));
        assert!(ctx.cached_route("a").is_none());
        assert!(ctx.cached_route("c").is_some());
        assert_eq!(ctx.cache_sizes().routes, 2);
        assert_eq!(ctx.cache_sizes().evicted, 1);
    }

    #[test]
    fn reset_clears_everything() {
        let ctx = PipelineContext::new(8);
        ctx.cache_route("a".to_owned(), route("A"));
        ctx.cache_template("t".to_owned(), "p".to_owned());
        ctx.stats().record_written();
        ctx.circuit().failure_count = 2;

        ctx.reset();

        assert_eq!(
            ctx.cache_sizes(),
            CacheSizes {
                routes: 0,
                paths: 0,
                templates: 0,
                evicted: 0,
            }
        );
        assert_eq!(ctx.stats().snapshot(), StatsSnapshot::default());
        assert_eq!(ctx.circuit().failure_count, 0);
    }

    #[test]
    fn stats_snapshot_counts() {
        let ctx = PipelineContext::default();
        ctx.stats().record_written();
        ctx.stats().record_written();
        ctx.stats().record_dropped_permission();
        let snap = ctx.stats().snapshot();
        assert_eq!(snap.events_written, 2);
        assert_eq!(snap.events_dropped_permission, 1);
        assert_eq!(snap.fallback_writes, 0);
    }
}
