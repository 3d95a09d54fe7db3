#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`routes`]: 라우팅 테이블 파싱, 플래그 → 라우트 해석, 테이블 파일 로더
//! - [`template`]: 경로 템플릿 확장 및 세그먼트 정제
//! - [`encrypt`]: 필드 단위 AES-256-GCM 암호화/복호화
//! - [`store`]: 파일 시스템 경계와 루트 기준 경로 해석
//! - [`writer`]: 재시도/로테이션/폴백을 갖춘 내구성 쓰기
//! - [`replicate`]: 크리티컬 이벤트 복제
//! - [`notify`]: 외부 알림 전송자 (Slack 웹훅)
//! - [`breaker`]: 알림 서킷 브레이커와 지연 재시도
//! - [`context`]: 공유 캐시, 브레이커 상태, 처리 통계
//! - [`cache`]: 용량 제한 캐시
//! - [`pipeline`]: 전체 흐름 오케스트레이션 ([`LogRouter`])
//! - [`config`]: 라우터 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! LogRequest -> RouteResolver -> TemplateEngine -> FieldEncryptor -> DurableWriter
//!                                                                      |
//!                                     CriticalReplicator <- critical --+
//!                                             |
//!                                  NotificationDispatcher -> Notifier
//! ```

pub mod breaker;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;

pub mod encrypt;
pub mod notify;
pub mod replicate;
pub mod routes;
pub mod store;
pub mod template;
pub mod writer;

// --- 주요 타입 re-export ---

// 라우터
pub use pipeline::{BatchReport, Delivery, LogRouter, LogRouterBuilder, WriteReport};

// 설정
pub use config::{RouterConfig, RouterConfigBuilder, Secret};

// 에러
pub use error::{DeliveryError, EventError};

// 라우팅
pub use routes::{RouteResolver, RoutingTable, RoutingTableLoader};

// 템플릿
pub use template::{Expansion, TemplateEngine};

// 암호화
pub use encrypt::{EncryptedSegment, FieldEncryptor, log_entries};

// 쓰기
pub use store::{FileStore, TokioFileStore};
pub use writer::{DurableWriter, Payload, PersistOutcome, WritePolicy};

// 알림
pub use breaker::{BreakerPolicy, NotificationDispatcher, NotificationStatus};
pub use notify::{Notifier, NotifyError, SlackNotifier, WebhookNotifier};

// 컨텍스트
pub use context::{PipelineContext, StatsSnapshot};
