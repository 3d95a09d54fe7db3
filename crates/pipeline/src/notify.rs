//! 외부 알림 전송자
//!
//! [`Notifier`]는 크리티컬 이벤트를 외부 채널로 보내는 경계입니다.
//! 타임아웃은 호출 측(서킷 브레이커)에서 `tokio::time::timeout`으로 적용하며,
//! 타임아웃으로 future가 드롭되면 진행 중인 요청도 함께 취소됩니다.

use std::future::Future;
use std::time::Duration;

use serde_json::json;

use logroute_core::event::LogEvent;

/// 알림 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// 전송 계층 실패 (연결, DNS 등)
    #[error("transport error: {0}")]
    Transport(String),

    /// 원격이 실패 상태 코드를 반환
    #[error("remote returned status {0}")]
    Status(u16),

    /// 제한 시간 초과
    #[error("notification timed out after {0}ms")]
    Timeout(u64),
}

/// 외부 알림 전송자
pub trait Notifier: Send + Sync + 'static {
    /// 이벤트를 전송합니다.
    fn send(&self, event: &LogEvent) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Slack 웹훅 전송자
///
/// `{"text": ...}` 형태의 JSON을 웹훅 URL로 POST 합니다.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    /// 새 전송자를 생성합니다.
    ///
    /// `timeout`은 HTTP 클라이언트 수준의 상한이며, 브레이커의 타임아웃과 별개입니다.
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }
}

impl Notifier for SlackNotifier {
    async fn send(&self, event: &LogEvent) -> Result<(), NotifyError> {
        let body = json!({ "text": format_message(event) });
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout(0)
                } else {
                    NotifyError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// 아무 것도 보내지 않는 전송자 (웹훅 미설정 시)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    async fn send(&self, event: &LogEvent) -> Result<(), NotifyError> {
        tracing::debug!(flag = %event.flag, "no notifier configured, skipping");
        Ok(())
    }
}

/// 설정으로 고르는 전송자
///
/// 웹훅 URL이 있으면 Slack, 없으면 아무 것도 보내지 않습니다.
#[derive(Debug, Clone)]
pub enum WebhookNotifier {
    /// Slack 웹훅
    Slack(SlackNotifier),
    /// 비활성
    Disabled(NoopNotifier),
}

impl WebhookNotifier {
    /// 웹훅 URL로 전송자를 고릅니다.
    pub fn from_url(webhook_url: Option<&str>, timeout: Duration) -> Result<Self, NotifyError> {
        match webhook_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Ok(Self::Slack(SlackNotifier::new(url, timeout)?)),
            None => Ok(Self::Disabled(NoopNotifier)),
        }
    }

    /// 실제로 전송하는지 여부
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Slack(_))
    }
}

impl Notifier for WebhookNotifier {
    async fn send(&self, event: &LogEvent) -> Result<(), NotifyError> {
        match self {
            Self::Slack(notifier) => notifier.send(event).await,
            Self::Disabled(notifier) => notifier.send(event).await,
        }
    }
}

/// 알림 본문
pub fn format_message(event: &LogEvent) -> String {
    format!(
        ":rotating_light: *[{env}] {level} {flag}* ({category})\n{action}: {message}\n{timestamp}",
        env = event.env,
        level = event.level.as_str().to_uppercase(),
        flag = event.flag,
        category = event.category,
        action = event.action,
        message = event.message,
        timestamp = event.timestamp,
    )
}

/// 테스트용 스크립트 전송자
///
/// 미리 정한 결과를 순서대로 돌려주고, 스크립트가 끝나면 `default_ok`를 따릅니다.
#[cfg(test)]
#[derive(Debug)]
pub struct ScriptedNotifier {
    script: std::sync::Mutex<std::collections::VecDeque<bool>>,
    default_ok: bool,
    delay: Option<Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedNotifier {
    /// 항상 성공하는 전송자
    pub fn succeeding() -> Self {
        Self::with_script(Vec::new(), true)
    }

    /// 항상 실패하는 전송자
    pub fn failing() -> Self {
        Self::with_script(Vec::new(), false)
    }

    /// 결과 스크립트를 지정합니다 (`true` = 성공).
    pub fn with_script(script: Vec<bool>, default_ok: bool) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            default_ok,
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// 전송마다 지연을 둡니다 (타임아웃 테스트용).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 실제 전송 시도 횟수
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Notifier for ScriptedNotifier {
    async fn send(&self, _event: &LogEvent) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let ok = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_ok);
        if ok {
            Ok(())
        } else {
            Err(NotifyError::Transport("scripted failure".to_owned()))
        }
    }
}
