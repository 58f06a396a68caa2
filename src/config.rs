//! 워커 설정
//!
//! 기동 시 한 번 TOML 파일에서 읽고 이후에는 불변. 전역 없이 참조로
//! 워커 루프와 정책에 넘긴다. `--url` 플래그가 base URL을 덮어쓴다.

use std::path::Path;

use serde::Deserialize;

use crate::Result;

/// 전송 계층 자격 증명
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportCredentials {
    /// 서버 검증용 CA 번들 (PEM 파일 경로)
    pub cafile: Option<String>,

    /// 클라이언트 개인키 (PEM 파일 경로)
    pub sslkey: Option<String>,

    /// 클라이언트 인증서 (PEM 파일 경로)
    pub sslcert: Option<String>,

    /// cipher 목록 (현재 TLS 백엔드에서는 무시됨)
    pub ciphers: Option<String>,

    /// 프록시 URL
    pub proxy: Option<String>,

    /// 아웃바운드 네트워크 인터페이스 이름
    pub interface: Option<String>,

    /// 연결 타임아웃 (초, 0이면 무제한)
    pub connection_timeout_secs: u64,
}

/// 워커 전체 설정
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 상대 경로 요청 앞에 붙일 base URL
    pub url: Option<String>,

    /// 전송 자격 증명
    #[serde(flatten)]
    pub credentials: TransportCredentials,
}

impl WorkerConfig {
    /// TOML 파일에서 로드
    ///
    /// 설정 파일의 base URL에는 끝 슬래시가 없으면 붙여 준다.
    /// 상대 경로를 그대로 이어 붙이는 합성 규칙 때문.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: WorkerConfig = toml::from_str(&text)?;

        if let Some(url) = &mut config.url {
            if !url.is_empty() && !url.ends_with('/') {
                url.push('/');
            }
        }

        Ok(config)
    }

    /// 커맨드라인 `--url` 덮어쓰기
    ///
    /// 파일 경로와 달리 플래그 값은 그대로 쓴다 (슬래시 보정 없음).
    pub fn set_base_url(&mut self, url: String) {
        self.url = Some(url);
    }
}
