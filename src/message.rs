//! IPC 프레임 정의 (Message Codec)
//!
//! 제어 프로세스와 워커 사이의 메시지는 전부 고정 크기 바이너리 프레임이다.
//! - Request: 제어 프로세스 → 워커, URL + NUL + range 지정자
//! - Answer: 워커 → 제어 프로세스, DATA / HEADERS / COMPLETED / ERROR
//!
//! 모든 정수 필드는 little-endian. 여기에는 레이아웃과 검증만 있고
//! 전송 정책은 들어가지 않는다.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result, ANSWER_FRAME_SIZE, ANSWER_PAYLOAD_SIZE, REQUEST_FRAME_SIZE, REQUEST_PAYLOAD_SIZE};

/// 응답 프레임 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AnswerKind {
    /// 응답 바디 청크
    Data = 1,

    /// HTTP 헤더 한 줄
    Headers = 2,

    /// 전송 성공 종료 (len = 0)
    Completed = 3,

    /// 전송 실패 종료 (len = 0)
    Error = 4,
}

impl AnswerKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(AnswerKind::Data),
            2 => Some(AnswerKind::Headers),
            3 => Some(AnswerKind::Completed),
            4 => Some(AnswerKind::Error),
            _ => None,
        }
    }

    /// 종료 프레임 여부 (요청 하나당 정확히 한 번)
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnswerKind::Completed | AnswerKind::Error)
    }
}

/// 범위 요청 프레임 (제어 프로세스 → 워커)
///
/// payload에는 URL, NUL 구분자 하나, range 지정자(예: `bytes=1000-2000`)가
/// 순서대로 들어간다. 선언된 길이가 payload 용량을 넘으면 malformed.
#[derive(Debug, Clone)]
pub struct RangeRequest {
    /// 상관 토큰, 응답에 그대로 반사됨
    pub id: u32,

    /// URL 바이트 수
    pub url_len: u32,

    /// range 지정자 바이트 수
    pub range_len: u32,

    /// URL + NUL + range
    pub payload: [u8; REQUEST_PAYLOAD_SIZE],
}

impl RangeRequest {
    /// 제어 프로세스측 생성자 (테스트 및 컨트롤러용)
    pub fn new(id: u32, url: &str, range: &str) -> Result<Self> {
        let needed = url.len() + 1 + range.len();
        if needed > REQUEST_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len: needed,
                max: REQUEST_PAYLOAD_SIZE,
            });
        }

        let mut payload = [0u8; REQUEST_PAYLOAD_SIZE];
        payload[..url.len()].copy_from_slice(url.as_bytes());
        payload[url.len()] = 0;
        payload[url.len() + 1..needed].copy_from_slice(range.as_bytes());

        Ok(Self {
            id,
            url_len: url.len() as u32,
            range_len: range.len() as u32,
            payload,
        })
    }

    /// 고정 레이아웃 디코딩 (길이 검증은 `parts`에서)
    pub fn decode(frame: &[u8; REQUEST_FRAME_SIZE]) -> Self {
        let mut payload = [0u8; REQUEST_PAYLOAD_SIZE];
        payload.copy_from_slice(&frame[12..]);

        Self {
            id: read_u32(frame, 0),
            url_len: read_u32(frame, 4),
            range_len: read_u32(frame, 8),
            payload,
        }
    }

    /// 고정 레이아웃 인코딩
    pub fn encode_into(&self, out: &mut [u8; REQUEST_FRAME_SIZE]) {
        out[0..4].copy_from_slice(&self.id.to_le_bytes());
        out[4..8].copy_from_slice(&self.url_len.to_le_bytes());
        out[8..12].copy_from_slice(&self.range_len.to_le_bytes());
        out[12..].copy_from_slice(&self.payload);
    }

    /// 프레임 바이트 반환 (컨트롤러 송신용)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = [0u8; REQUEST_FRAME_SIZE];
        self.encode_into(&mut frame);
        frame.to_vec()
    }

    /// URL과 range 지정자 추출
    ///
    /// 선언된 길이(구분자 포함)가 실제 전달된 payload를 넘거나 UTF-8이
    /// 아니면 malformed로 거부한다. malformed 요청에는 응답을 보내지 않는다.
    pub fn parts(&self) -> Result<(&str, &str)> {
        let url_len = self.url_len as usize;
        let range_len = self.range_len as usize;

        if url_len.saturating_add(1).saturating_add(range_len) > REQUEST_PAYLOAD_SIZE {
            return Err(Error::MalformedRequest {
                id: self.id,
                url_len: self.url_len,
                range_len: self.range_len,
                max: REQUEST_PAYLOAD_SIZE,
            });
        }

        let url = std::str::from_utf8(&self.payload[..url_len])
            .map_err(|_| Error::InvalidRequestEncoding { id: self.id })?;
        let range = std::str::from_utf8(&self.payload[url_len + 1..url_len + 1 + range_len])
            .map_err(|_| Error::InvalidRequestEncoding { id: self.id })?;

        Ok((url, range))
    }
}

/// 응답 프레임 (워커 → 제어 프로세스)
///
/// 워커는 기동 시 할당한 버퍼 하나를 모든 요청에 걸쳐 재사용한다.
#[derive(Debug, Clone)]
pub struct RangeAnswer {
    /// 요청 id 반사
    pub id: u32,

    /// 프레임 타입
    pub kind: AnswerKind,

    /// 사용된 페이로드 길이
    pub len: u32,

    /// payload[..len]의 CRC32 (DATA 프레임만, 나머지는 0)
    pub crc: u32,

    /// 고정 용량 페이로드
    pub payload: [u8; ANSWER_PAYLOAD_SIZE],
}

impl RangeAnswer {
    /// 재사용 버퍼 생성
    pub fn new() -> Self {
        Self {
            id: 0,
            kind: AnswerKind::Completed,
            len: 0,
            crc: 0,
            payload: [0u8; ANSWER_PAYLOAD_SIZE],
        }
    }

    /// DATA 프레임으로 채움, CRC는 복사된 구간에 대해서만 계산
    pub fn set_data(&mut self, id: u32, data: &[u8]) {
        debug_assert!(data.len() <= ANSWER_PAYLOAD_SIZE);
        let n = data.len().min(ANSWER_PAYLOAD_SIZE);
        self.payload[..n].copy_from_slice(&data[..n]);
        self.id = id;
        self.kind = AnswerKind::Data;
        self.len = n as u32;
        self.crc = crc32fast::hash(&self.payload[..n]);
    }

    /// HEADERS 프레임으로 채움
    ///
    /// 한 줄이 한 프레임. 용량 - 2까지만 복사하고 NUL 종결자를 붙이며
    /// len은 종결자를 포함한다.
    pub fn set_header_line(&mut self, id: u32, line: &[u8]) {
        let n = line.len().min(ANSWER_PAYLOAD_SIZE - 2);
        self.payload[..n].copy_from_slice(&line[..n]);
        self.payload[n] = 0;
        self.id = id;
        self.kind = AnswerKind::Headers;
        self.len = (n + 1) as u32;
        self.crc = 0;
    }

    /// 종료 프레임으로 채움 (COMPLETED / ERROR, len = 0)
    pub fn set_terminal(&mut self, id: u32, ok: bool) {
        self.id = id;
        self.kind = if ok { AnswerKind::Completed } else { AnswerKind::Error };
        self.len = 0;
        self.crc = 0;
    }

    /// 고정 레이아웃 인코딩 (스크래치 버퍼 재사용, 힙 할당 없음)
    pub fn encode_into(&self, out: &mut [u8; ANSWER_FRAME_SIZE]) {
        out[0..4].copy_from_slice(&self.id.to_le_bytes());
        out[4] = self.kind as u8;
        out[5..9].copy_from_slice(&self.len.to_le_bytes());
        out[9..13].copy_from_slice(&self.crc.to_le_bytes());
        out[13..].copy_from_slice(&self.payload);
    }

    /// 제어 프로세스측 디코딩
    pub fn decode(frame: &[u8; ANSWER_FRAME_SIZE]) -> Result<Self> {
        let kind = AnswerKind::from_byte(frame[4])
            .ok_or(Error::InvalidAnswerKind { kind: frame[4] })?;
        let len = read_u32(frame, 5);
        if len as usize > ANSWER_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len: len as usize,
                max: ANSWER_PAYLOAD_SIZE,
            });
        }

        let mut payload = [0u8; ANSWER_PAYLOAD_SIZE];
        payload.copy_from_slice(&frame[13..]);

        Ok(Self {
            id: read_u32(frame, 0),
            kind,
            len,
            crc: read_u32(frame, 9),
            payload,
        })
    }

    /// 사용 중인 페이로드 구간
    pub fn data(&self) -> &[u8] {
        &self.payload[..self.len as usize]
    }

    /// CRC 검증 (DATA 프레임)
    pub fn verify_crc(&self) -> bool {
        crc32fast::hash(self.data()) == self.crc
    }
}

impl Default for RangeAnswer {
    fn default() -> Self {
        Self::new()
    }
}

fn read_u32(frame: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]])
}

/// 제어 채널에서 요청 프레임 하나를 읽는다.
///
/// 프레임 크기만큼 정확히 읽는다. 깨끗한 EOF면 `Ok(None)`(제어 프로세스
/// 종료), 그 외 읽기 실패는 치명적 에러로 호출자에 그대로 올라간다.
pub async fn read_request<R>(
    reader: &mut R,
    frame: &mut [u8; REQUEST_FRAME_SIZE],
) -> Result<Option<RangeRequest>>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(frame).await {
        Ok(_) => Ok(Some(RangeRequest::decode(frame))),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// 응답 프레임 하나를 통째로 내보낸다.
///
/// short write는 하드 IO 에러. 호출자가 중단 신호로 변환한다.
pub async fn write_answer<W>(
    writer: &mut W,
    answer: &RangeAnswer,
    scratch: &mut [u8; ANSWER_FRAME_SIZE],
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    answer.encode_into(scratch);
    writer.write_all(scratch).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let req = RangeRequest::new(7, "http://mirror/images/a.bin", "bytes=1000-2000").unwrap();
        let mut frame = [0u8; REQUEST_FRAME_SIZE];
        req.encode_into(&mut frame);

        let restored = RangeRequest::decode(&frame);
        assert_eq!(restored.id, 7);

        let (url, range) = restored.parts().unwrap();
        assert_eq!(url, "http://mirror/images/a.bin");
        assert_eq!(range, "bytes=1000-2000");
    }

    #[test]
    fn test_nul_separator_between_url_and_range() {
        let req = RangeRequest::new(1, "a", "b").unwrap();
        assert_eq!(req.payload[0], b'a');
        assert_eq!(req.payload[1], 0);
        assert_eq!(req.payload[2], b'b');
    }

    #[test]
    fn test_malformed_lengths_rejected() {
        let mut req = RangeRequest::new(3, "http://x/y", "bytes=0-9").unwrap();
        req.url_len = REQUEST_PAYLOAD_SIZE as u32;
        req.range_len = 16;

        match req.parts() {
            Err(Error::MalformedRequest { id, .. }) => assert_eq!(id, 3),
            other => panic!("malformed 요청이 통과됨: {:?}", other),
        }
    }

    #[test]
    fn test_non_utf8_request_rejected() {
        let mut req = RangeRequest::new(4, "ok", "bytes=0-1").unwrap();
        req.payload[0] = 0xFF;
        req.payload[1] = 0xFE;

        assert!(matches!(
            req.parts(),
            Err(Error::InvalidRequestEncoding { id: 4 })
        ));
    }

    #[test]
    fn test_oversized_request_payload_rejected() {
        let url = "u".repeat(REQUEST_PAYLOAD_SIZE);
        assert!(matches!(
            RangeRequest::new(1, &url, "bytes=0-1"),
            Err(Error::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_data_answer_crc() {
        let mut answer = RangeAnswer::new();
        answer.set_data(11, &[1, 2, 3, 4, 5]);

        assert_eq!(answer.kind, AnswerKind::Data);
        assert_eq!(answer.len, 5);
        assert!(answer.verify_crc());
        assert_eq!(answer.crc, crc32fast::hash(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_answer_encode_decode() {
        let mut answer = RangeAnswer::new();
        answer.set_data(9, b"hello range");

        let mut frame = [0u8; ANSWER_FRAME_SIZE];
        answer.encode_into(&mut frame);

        let restored = RangeAnswer::decode(&frame).unwrap();
        assert_eq!(restored.id, 9);
        assert_eq!(restored.kind, AnswerKind::Data);
        assert_eq!(restored.data(), b"hello range");
        assert!(restored.verify_crc());
    }

    #[test]
    fn test_invalid_answer_kind_rejected() {
        let mut frame = [0u8; ANSWER_FRAME_SIZE];
        frame[4] = 99;
        assert!(matches!(
            RangeAnswer::decode(&frame),
            Err(Error::InvalidAnswerKind { kind: 99 })
        ));
    }

    #[test]
    fn test_terminal_has_zero_len() {
        let mut answer = RangeAnswer::new();
        answer.set_data(2, b"leftover");
        answer.set_terminal(2, false);

        assert_eq!(answer.kind, AnswerKind::Error);
        assert!(answer.kind.is_terminal());
        assert_eq!(answer.len, 0);
        assert_eq!(answer.crc, 0);
    }

    #[test]
    fn test_header_line_nul_terminated() {
        let mut answer = RangeAnswer::new();
        answer.set_header_line(5, b"Content-Range: bytes 0-99/1000\r\n");

        assert_eq!(answer.kind, AnswerKind::Headers);
        let data = answer.data();
        assert_eq!(data[data.len() - 1], 0);
        assert_eq!(&data[..data.len() - 1], b"Content-Range: bytes 0-99/1000\r\n");
    }

    #[test]
    fn test_header_line_capped_at_capacity() {
        let long_line = vec![b'H'; ANSWER_PAYLOAD_SIZE * 2];
        let mut answer = RangeAnswer::new();
        answer.set_header_line(5, &long_line);

        assert_eq!(answer.len as usize, ANSWER_PAYLOAD_SIZE - 1);
        assert_eq!(answer.payload[ANSWER_PAYLOAD_SIZE - 2], 0);
    }

    #[tokio::test]
    async fn test_read_request_from_stream() {
        let req = RangeRequest::new(21, "http://h/f.bin", "bytes=0-127").unwrap();
        let bytes = req.to_bytes();
        let mut reader = &bytes[..];
        let mut frame = [0u8; REQUEST_FRAME_SIZE];

        let got = read_request(&mut reader, &mut frame).await.unwrap().unwrap();
        assert_eq!(got.id, 21);

        // 스트림 소진 후에는 깨끗한 EOF
        let eof = read_request(&mut reader, &mut frame).await.unwrap();
        assert!(eof.is_none());
    }

    #[tokio::test]
    async fn test_write_answer_emits_full_frame() {
        let mut answer = RangeAnswer::new();
        answer.set_data(1, b"abc");
        let mut scratch = [0u8; ANSWER_FRAME_SIZE];
        let mut out: Vec<u8> = Vec::new();

        write_answer(&mut out, &answer, &mut scratch).await.unwrap();
        assert_eq!(out.len(), ANSWER_FRAME_SIZE);

        let frame: [u8; ANSWER_FRAME_SIZE] = out.as_slice().try_into().unwrap();
        let restored = RangeAnswer::decode(&frame).unwrap();
        assert_eq!(restored.data(), b"abc");
    }
}
