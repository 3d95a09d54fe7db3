//! logroute 공통 크레이트
//!
//! 파이프라인과 CLI가 공유하는 에러, 설정, 도메인 타입, 그리고 파이프라인이
//! 좁은 인터페이스로 소비하는 협력자(시계/날짜 포맷터, 문자열 정제기)를 정의합니다.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod sanitize;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogrouteError};

// 설정
pub use config::LogrouteConfig;

// 이벤트
pub use event::{EncryptSelection, LogEvent, LogRequest};

// 협력자 trait
pub use clock::{Clock, DateFormatter, FixedClock, PatternFormatter, SystemClock};
pub use sanitize::{DefaultSanitizer, Sanitizer};

// 도메인 타입
pub use types::{LogLevel, LogRoute};
