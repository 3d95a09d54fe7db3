//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 파이프라인은 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logroute_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logroute_core::metrics::EVENTS_WRITTEN_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 저장소 레이블 키 (primary, critical, write_errors, missing_path, slack_fallback)
pub const LABEL_STORE: &str = "store";

/// 결과 레이블 키 (sent, failed, skipped)
pub const LABEL_RESULT: &str = "result";

// ─── 쓰기 파이프라인 메트릭 ─────────────────────────────────────────

/// 기록된 이벤트 수 (counter, label: store)
pub const EVENTS_WRITTEN_TOTAL: &str = "logroute_events_written_total";

/// 권한 오류로 조용히 버려진 쓰기 수 (counter, label: store)
pub const EVENTS_DROPPED_PERMISSION_TOTAL: &str = "logroute_events_dropped_permission_total";

/// 폴백 저장소로 우회한 쓰기 수 (counter)
pub const FALLBACK_WRITES_TOTAL: &str = "logroute_fallback_writes_total";

/// 경로 플레이스홀더 누락으로 우회한 이벤트 수 (counter)
pub const MISSING_PATH_REDIRECTS_TOTAL: &str = "logroute_missing_path_redirects_total";

/// 파일 로테이션 수 (counter)
pub const ROTATIONS_TOTAL: &str = "logroute_rotations_total";

/// 크리티컬 복제 수 (counter)
pub const CRITICAL_REPLICAS_TOTAL: &str = "logroute_critical_replicas_total";

// ─── 알림 메트릭 ────────────────────────────────────────────────────

/// 외부 알림 시도 결과 (counter, label: result)
pub const NOTIFICATIONS_TOTAL: &str = "logroute_notifications_total";

/// 서킷 오픈 횟수 (counter)
pub const BREAKER_OPENS_TOTAL: &str = "logroute_breaker_opens_total";

// ─── 기타 ───────────────────────────────────────────────────────────

/// 키 부재로 암호화를 생략한 이벤트 수 (counter)
pub const ENCRYPTION_SKIPPED_TOTAL: &str = "logroute_encryption_skipped_total";

/// 라우팅 테이블 순회 실패 수 (counter)
pub const ROUTING_TABLE_FAILURES_TOTAL: &str = "logroute_routing_table_failures_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        EVENTS_WRITTEN_TOTAL,
        "Log events durably written, per store"
    );
    describe_counter!(
        EVENTS_DROPPED_PERMISSION_TOTAL,
        "Writes dropped because of permission errors, per store"
    );
    describe_counter!(
        FALLBACK_WRITES_TOTAL,
        "Writes redirected to the write_errors fallback store"
    );
    describe_counter!(
        MISSING_PATH_REDIRECTS_TOTAL,
        "Events redirected because a path placeholder was missing"
    );
    describe_counter!(ROTATIONS_TOTAL, "Log files rotated for size");
    describe_counter!(
        CRITICAL_REPLICAS_TOTAL,
        "Critical events replicated to the critical store"
    );
    describe_counter!(
        NOTIFICATIONS_TOTAL,
        "External notification attempts by result (success, failure, skipped)"
    );
    describe_counter!(
        BREAKER_OPENS_TOTAL,
        "Times the notification circuit breaker opened"
    );
    describe_counter!(
        ENCRYPTION_SKIPPED_TOTAL,
        "Events written without field encryption because no key was configured"
    );
    describe_counter!(
        ROUTING_TABLE_FAILURES_TOTAL,
        "Malformed routing table entries encountered during route resolution"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_use_prefix() {
        for name in [
            EVENTS_WRITTEN_TOTAL,
            EVENTS_DROPPED_PERMISSION_TOTAL,
            FALLBACK_WRITES_TOTAL,
            MISSING_PATH_REDIRECTS_TOTAL,
            ROTATIONS_TOTAL,
            CRITICAL_REPLICAS_TOTAL,
            NOTIFICATIONS_TOTAL,
            BREAKER_OPENS_TOTAL,
            ENCRYPTION_SKIPPED_TOTAL,
            ROUTING_TABLE_FAILURES_TOTAL,
        ] {
            assert!(name.starts_with("logroute_"), "{name}");
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn describe_all_without_recorder_does_not_panic() {
        describe_all();
    }
}
