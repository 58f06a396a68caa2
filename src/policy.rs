//! 전송 정책
//!
//! - URL 합성: 설정된 base URL + 상대 경로, 절대 URL은 그대로
//! - 수락 판정: HTTP 206 (Partial Content)만 성공
//!
//! range 의미는 항상 명시적이어야 한다. 서버가 range를 무시하고 200으로
//! 전체 파일을 흘려보내는 경우를 조용히 받아들이면 안 되므로, 206이 아닌
//! 응답은 바디 소비 자체를 중단시킨다.

/// range 요청 성공으로 인정하는 유일한 상태 코드
pub const PARTIAL_CONTENT: u16 = 206;

/// 모든 전송에 싣는 Accept 헤더 값
pub const ACCEPT_ANY: &str = "*/*";

/// 수락 판정: 206만 성공
pub fn is_partial_content(status: u16) -> bool {
    status == PARTIAL_CONTENT
}

/// `scheme://` 마커 존재 여부 (콜론 바로 뒤에 슬래시 두 개)
pub fn is_absolute_url(s: &str) -> bool {
    match s.find(':') {
        Some(idx) => s[idx + 1..].starts_with("//"),
        None => false,
    }
}

/// 전송 하나에 대한 요청 형태
///
/// 메서드는 항상 GET, Range 헤더는 요청의 range 필드를 그대로 쓴다.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// 합성이 끝난 최종 URL
    pub url: String,

    /// Range 헤더 값 (예: `bytes=1000-2000`)
    pub range: String,
}

impl TransferRequest {
    pub fn new(url: String, range: String) -> Self {
        Self { url, range }
    }
}

/// URL 합성 정책
///
/// 요청 payload는 완전한 URL일 수도, 설정된 미러 기준의 상대 경로일 수도
/// 있다. base가 있고 요청 URL에 `scheme://` 마커가 없을 때만 이어 붙인다.
#[derive(Debug, Clone)]
pub struct TransferPolicy {
    base_url: Option<String>,
}

impl TransferPolicy {
    pub fn new(base_url: Option<String>) -> Self {
        Self { base_url }
    }

    /// 실제로 요청할 URL 결정
    pub fn resolve_url(&self, requested: &str) -> String {
        match &self.base_url {
            Some(base) if !is_absolute_url(requested) => format!("{}{}", base, requested),
            _ => requested.to_string(),
        }
    }
}
