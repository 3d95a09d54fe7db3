//! 문자열 정제 협력자
//!
//! 경로 세그먼트 정제 이전에 적용되는 1차 정제입니다.
//! 제어 문자를 제거하고 앞뒤 공백을 자르며 길이를 제한합니다.

/// 1차 정제 결과의 최대 길이 (문자 수)
pub const MAX_SANITIZED_LEN: usize = 1024;

/// 문자열 정제기
pub trait Sanitizer: Send + Sync {
    /// 입력 문자열을 정제합니다.
    fn sanitize_string(&self, input: &str) -> String;
}

/// 기본 정제기
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSanitizer;

impl Sanitizer for DefaultSanitizer {
    fn sanitize_string(&self, input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_control())
            .take(MAX_SANITIZED_LEN)
            .collect::<String>()
            .trim()
            .to_owned()
    }
}
