//! 에러 타입 정의

use thiserror::Error;

/// RFW 워커 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP 에러: {0}")]
    Http(#[from] reqwest::Error),

    #[error("설정 파일 파싱 에러: {0}")]
    Config(#[from] toml::de::Error),

    #[error("잘못된 요청: id={id}, urllen={url_len} + rangelen={range_len} > {max}")]
    MalformedRequest {
        id: u32,
        url_len: u32,
        range_len: u32,
        max: usize,
    },

    #[error("요청 문자열이 UTF-8이 아님: id={id}")]
    InvalidRequestEncoding { id: u32 },

    #[error("Partial Content가 아님: HTTP {got}")]
    NotPartialContent { got: u16 },

    #[error("전송 중단됨")]
    TransferAborted,

    #[error("채널이 열리지 않음")]
    NotOpened,

    #[error("유효하지 않은 응답 타입: {kind}")]
    InvalidAnswerKind { kind: u8 },

    #[error("페이로드 길이 초과: {len} > {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
