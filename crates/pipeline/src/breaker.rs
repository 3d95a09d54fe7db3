//! 알림 서킷 브레이커 -- 실패 계수, 쿨다운, 지연 재시도
//!
//! 크리티컬 이벤트는 로컬에 기록된 뒤 [`NotificationDispatcher`]를 통해 외부로
//! 알려집니다.
//!
//! # 상태 전이
//! - Closed: 전송 실패마다 `failure_count` 증가, 성공하면 0으로 초기화
//! - `failure_count`가 임계치에 닿으면 Open: 카운터를 0으로 되돌리고 쿨다운 동안
//!   네트워크 시도 없이 건너뜀. 폴백 억제 쿨다운도 이때 시작
//! - 쿨다운이 지나면 다음 시도에서 Closed로 복귀
//!
//! 전송 실패 시 억제 쿨다운이 아니면 이벤트를 slack_fallback 저장소에 기록하고,
//! 억제 간격 뒤에 재시도합니다. 재시도 횟수는 재시도 태스크가 들고 있으며
//! 이벤트에는 기록되지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::task::TaskTracker;

use logroute_core::event::LogEvent;
use logroute_core::metrics as m;

use crate::context::PipelineContext;
use crate::notify::{Notifier, NotifyError};
use crate::store::FileStore;
use crate::writer::{DurableWriter, Payload};

/// 서킷 상태
///
/// [`PipelineContext`]가 소유하며 이 모듈만 변경합니다.
#[derive(Debug, Clone, Default)]
pub struct CircuitState {
    /// 연속 실패 횟수
    pub(crate) failure_count: u32,
    /// 이 시각까지 Open
    pub(crate) cooldown_until: Option<Instant>,
    /// 이 시각까지 폴백 기록 억제
    pub(crate) fallback_cooldown_until: Option<Instant>,
}

impl CircuitState {
    /// 연속 실패 횟수
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// `now` 기준 Open 여부
    pub fn is_open(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// `now` 기준 폴백 억제 여부
    pub fn fallback_suppressed(&self, now: Instant) -> bool {
        self.fallback_cooldown_until.is_some_and(|until| now < until)
    }
}

/// 브레이커 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    /// Open 전환 임계 실패 횟수
    pub threshold: u32,
    /// Open 유지 시간
    pub cooldown: Duration,
    /// 폴백 억제 시간 (재시도 간격으로도 사용)
    pub fallback_cooldown: Duration,
    /// 전송 타임아웃
    pub timeout: Duration,
    /// 최초 시도 이후 재시도 상한
    pub max_retry_attempts: u32,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            threshold: 3,
            cooldown: Duration::from_secs(60),
            fallback_cooldown: Duration::from_secs(60),
            timeout: Duration::from_millis(3000),
            max_retry_attempts: 2,
        }
    }
}

/// 알림 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    /// 전송 성공
    Delivered,
    /// 전송 실패 (폴백/재시도 처리됨)
    Failed,
    /// 서킷 Open으로 건너뜀
    Skipped,
}

/// 단일 시도 결과. 폴백 억제 여부는 시도 시작 시점 기준
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Delivered,
    Failed { suppress_fallback: bool },
    Skipped { suppress_fallback: bool },
}

/// 알림 디스패처
pub struct NotificationDispatcher<S: FileStore, N: Notifier> {
    notifier: Arc<N>,
    /// slack_fallback 저장소 쓰기기
    fallback: Arc<DurableWriter<S>>,
    context: Arc<PipelineContext>,
    policy: BreakerPolicy,
    tracker: TaskTracker,
}

impl<S: FileStore, N: Notifier> NotificationDispatcher<S, N> {
    /// 디스패처를 생성합니다.
    pub fn new(
        notifier: Arc<N>,
        fallback: Arc<DurableWriter<S>>,
        context: Arc<PipelineContext>,
        policy: BreakerPolicy,
    ) -> Self {
        Self {
            notifier,
            fallback,
            context,
            policy,
            tracker: TaskTracker::new(),
        }
    }

    /// 브레이커 정책
    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// 대기 중인 알림/재시도 태스크 수
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// 알림을 백그라운드 태스크로 보냅니다.
    ///
    /// 로그 호출은 알림 결과를 기다리지 않습니다.
    pub fn dispatch(self: &Arc<Self>, relative: &str, event: Arc<LogEvent>) {
        let this = Arc::clone(self);
        let relative = relative.to_owned();
        self.tracker.spawn(async move {
            this.notify(&relative, event).await;
        });
    }

    /// 알림을 한 번 시도하고 실패 처리(폴백 기록, 재시도 예약)까지 수행합니다.
    pub async fn notify(self: &Arc<Self>, relative: &str, event: Arc<LogEvent>) -> NotificationStatus {
        match self.attempt(&event).await {
            Attempt::Delivered => NotificationStatus::Delivered,
            Attempt::Skipped { suppress_fallback } => {
                if !suppress_fallback {
                    self.write_fallback(relative, &event).await;
                }
                NotificationStatus::Skipped
            }
            Attempt::Failed { suppress_fallback } => {
                if !suppress_fallback {
                    self.write_fallback(relative, &event).await;
                }
                if self.policy.max_retry_attempts > 0 {
                    let this = Arc::clone(self);
                    self.tracker.spawn(async move {
                        this.retry_chain(event).await;
                    });
                }
                NotificationStatus::Failed
            }
        }
    }

    /// 대기 중인 태스크가 모두 끝날 때까지 기다립니다.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// 억제 간격마다 재시도합니다. 시도 횟수는 이 태스크의 지역 변수입니다.
    async fn retry_chain(&self, event: Arc<LogEvent>) {
        for attempt in 1..=self.policy.max_retry_attempts {
            tokio::time::sleep(self.policy.fallback_cooldown).await;
            match self.attempt(&event).await {
                Attempt::Delivered => {
                    tracing::info!(flag = %event.flag, attempt = attempt, "deferred notification delivered");
                    return;
                }
                Attempt::Failed { .. } | Attempt::Skipped { .. } => {
                    tracing::debug!(flag = %event.flag, attempt = attempt, "deferred notification not delivered");
                }
            }
        }
        tracing::warn!(
            flag = %event.flag,
            attempts = self.policy.max_retry_attempts,
            "giving up on notification"
        );
    }

    async fn attempt(&self, event: &LogEvent) -> Attempt {
        let suppress_fallback = {
            let now = Instant::now();
            let mut state = self.context.circuit();
            if state.is_open(now) {
                let suppress_fallback = state.fallback_suppressed(now);
                drop(state);
                tracing::debug!(flag = %event.flag, "circuit open, skipping notification");
                metrics::counter!(m::NOTIFICATIONS_TOTAL, m::LABEL_RESULT => "skipped").increment(1);
                self.context.stats().record_notification_skipped();
                return Attempt::Skipped { suppress_fallback };
            }
            if state.cooldown_until.take().is_some() {
                tracing::info!("notification circuit closed");
            }
            state.fallback_suppressed(now)
        };

        let result = match tokio::time::timeout(self.policy.timeout, self.notifier.send(event)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(
                u64::try_from(self.policy.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };

        match result {
            Ok(()) => {
                self.context.circuit().failure_count = 0;
                metrics::counter!(m::NOTIFICATIONS_TOTAL, m::LABEL_RESULT => "sent").increment(1);
                self.context.stats().record_notification_sent();
                Attempt::Delivered
            }
            Err(e) => {
                let opened = self.record_failure();
                tracing::warn!(flag = %event.flag, error = %e, opened = opened, "notification failed");
                metrics::counter!(m::NOTIFICATIONS_TOTAL, m::LABEL_RESULT => "failed").increment(1);
                self.context.stats().record_notification_failed();
                Attempt::Failed { suppress_fallback }
            }
        }
    }

    /// 실패를 기록하고 임계치에 닿으면 Open으로 전환합니다. 전환 여부를 반환합니다.
    fn record_failure(&self) -> bool {
        let now = Instant::now();
        let mut state = self.context.circuit();
        state.failure_count += 1;
        if state.failure_count < self.policy.threshold.max(1) {
            return false;
        }
        state.failure_count = 0;
        state.cooldown_until = Some(now + self.policy.cooldown);
        state.fallback_cooldown_until = Some(now + self.policy.fallback_cooldown);
        drop(state);

        tracing::info!(
            cooldown_secs = self.policy.cooldown.as_secs(),
            "notification circuit opened"
        );
        metrics::counter!(m::BREAKER_OPENS_TOTAL).increment(1);
        self.context.stats().record_breaker_open();
        true
    }

    async fn write_fallback(&self, relative: &str, event: &LogEvent) {
        let payload = Payload::Entry(Box::new(event.clone()));
        match self.fallback.persist(relative, &payload).await {
            Ok(outcome) => {
                tracing::debug!(flag = %event.flag, ?outcome, "notification fallback recorded");
            }
            Err(e) => {
                tracing::error!(flag = %event.flag, error = %e, "notification fallback write failed");
            }
        }
    }
}
