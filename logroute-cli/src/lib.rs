//! logroute CLI 라이브러리
//!
//! 바이너리(`logroute`)와 통합 테스트가 공유하는 인자 정의, 명령 핸들러, 출력 형식을 담습니다.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
