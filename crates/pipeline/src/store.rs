//! 파일 저장소 추상화 및 경로 해석
//!
//! [`FileStore`]는 내구성 쓰기가 사용하는 파일시스템 연산의 경계입니다.
//! 운영 환경에서는 [`TokioFileStore`]를 쓰고, 테스트에서는 특정 경로에 특정
//! `io::ErrorKind`를 주입하는 대역을 사용합니다. root 권한으로 실행되는 테스트에서는
//! 파일 권한만으로 권한 오류를 재현할 수 없기 때문입니다.
//!
//! [`resolve_relative`]는 상대 경로를 루트 아래로 해석하며, 디스크를 건드리기 전에
//! 절대 경로와 `..` 세그먼트를 거부합니다.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::DeliveryError;

/// 파일 저장소
///
/// 모든 메서드는 `Send` future를 반환하여 `tokio::spawn`된 재시도 태스크에서도
/// 사용할 수 있습니다.
pub trait FileStore: Send + Sync + 'static {
    /// 디렉토리를 재귀적으로 생성합니다.
    fn create_dir_all(&self, dir: &Path) -> impl Future<Output = io::Result<()>> + Send;

    /// 파일 크기를 조회합니다. 파일이 없으면 `None`.
    fn file_len(&self, path: &Path) -> impl Future<Output = io::Result<Option<u64>>> + Send;

    /// 파일 이름을 바꿉니다.
    fn rename(&self, from: &Path, to: &Path) -> impl Future<Output = io::Result<()>> + Send;

    /// 파일 끝에 바이트를 덧붙입니다 (없으면 생성).
    fn append(&self, path: &Path, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;
}

/// tokio 기반 운영용 파일 저장소
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileStore;

impl FileStore for TokioFileStore {
    async fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(dir).await
    }

    async fn file_len(&self, path: &Path) -> io::Result<Option<u64>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn append(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        // O_APPEND + 단일 write_all로 한 번에 기록
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

/// 루트 아래로 해석된 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// 전체 경로
    pub full: PathBuf,
    /// 상위 디렉토리
    pub dir: PathBuf,
    /// 정규화된 상대 경로 (`/` 구분)
    pub relative: String,
}

/// 상대 경로를 루트 아래로 해석합니다.
///
/// # 거부 규칙
/// - 빈 경로, NUL 문자: [`DeliveryError::InvalidPath`]
/// - 절대 경로, `..` 세그먼트: [`DeliveryError::PathTraversal`]
/// - 점으로만 이루어진 세그먼트(`.`, `...`): [`DeliveryError::InvalidPath`]
pub fn resolve_relative(root: &Path, relative: &str) -> Result<ResolvedPath, DeliveryError> {
    let invalid = |reason: &str| DeliveryError::InvalidPath {
        path: relative.to_owned(),
        reason: reason.to_owned(),
    };

    if relative.trim().is_empty() {
        return Err(invalid("path must not be empty"));
    }
    if relative.contains('\0') {
        return Err(invalid("path must not contain NUL"));
    }
    if relative.starts_with('/')
        || relative.starts_with('\\')
        || Path::new(relative).is_absolute()
        || has_drive_prefix(relative)
    {
        return Err(DeliveryError::PathTraversal(relative.to_owned()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in relative.split(['/', '\\']) {
        if segment.is_empty() {
            continue;
        }
        if segment == ".." {
            return Err(DeliveryError::PathTraversal(relative.to_owned()));
        }
        if segment.chars().all(|c| c == '.') {
            return Err(invalid("dot-only path segment"));
        }
        segments.push(segment);
    }

    let Some((file_name, parents)) = segments.split_last() else {
        return Err(invalid("path has no file name"));
    };

    let mut dir = root.to_path_buf();
    for parent in parents {
        dir.push(parent);
    }
    let full = dir.join(file_name);

    Ok(ResolvedPath {
        full,
        dir,
        relative: segments.join("/"),
    })
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// 테스트용 장애 주입 저장소
///
/// 경로에 지정한 문자열이 포함되면 해당 `io::ErrorKind`로 실패하고,
/// 그 외에는 [`TokioFileStore`]에 위임합니다.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FaultyFileStore {
    /// (경로 부분 문자열, 에러 종류)
    pub faults: Vec<(String, io::ErrorKind)>,
    /// rename 전용 장애 (원본 경로 기준)
    pub rename_faults: Vec<(String, io::ErrorKind)>,
    /// append 호출 횟수
    pub appends: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FaultyFileStore {
    /// 장애 없는 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 경로에 `needle`이 포함되면 `kind`로 실패하도록 설정합니다.
    pub fn fail_on(mut self, needle: impl Into<String>, kind: io::ErrorKind) -> Self {
        self.faults.push((needle.into(), kind));
        self
    }

    /// 원본 경로에 `needle`이 포함된 rename을 `kind`로 실패시킵니다.
    pub fn fail_rename_on(mut self, needle: impl Into<String>, kind: io::ErrorKind) -> Self {
        self.rename_faults.push((needle.into(), kind));
        self
    }

    /// append 호출 횟수
    pub fn append_calls(&self) -> usize {
        self.appends.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn check(&self, path: &Path) -> io::Result<()> {
        inject(&self.faults, path)
    }
}

#[cfg(test)]
fn inject(faults: &[(String, io::ErrorKind)], path: &Path) -> io::Result<()> {
    let shown = path.to_string_lossy();
    match faults.iter().find(|(needle, _)| shown.contains(needle.as_str())) {
        Some((_, kind)) => Err(io::Error::new(*kind, format!("injected fault: {shown}"))),
        None => Ok(()),
    }
}

#[cfg(test)]
impl FileStore for FaultyFileStore {
    async fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        self.check(dir)?;
        TokioFileStore.create_dir_all(dir).await
    }

    async fn file_len(&self, path: &Path) -> io::Result<Option<u64>> {
        TokioFileStore.file_len(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        inject(&self.rename_faults, from)?;
        TokioFileStore.rename(from, to).await
    }

    async fn append(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.appends
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.check(path)?;
        TokioFileStore.append(path, bytes).await
    }
}
