//! 청크 스트리머 (Chunk Streamer)
//!
//! 전송 계층이 임의 크기로 토막내 전달하는 응답 바이트와 헤더 줄을
//! 고정 크기 응답 프레임 열로 바꾼다. 프레임은 도착 순서 그대로 나간다.
//!
//! 콜백 실패는 절대 경계를 넘어 전파되지 않는다. 전송 계층에는
//! `SinkFlow::Abort` 신호 하나만 돌려주고, 워커 루프는 전송 전체의
//! 성공/실패 결과만 본다.

use tokio::io::AsyncWrite;
use tracing::{error, warn};

use crate::message::{write_answer, RangeAnswer};
use crate::policy::is_partial_content;
use crate::{ANSWER_FRAME_SIZE, ANSWER_PAYLOAD_SIZE};

/// 콜백 반환 신호
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFlow {
    /// 계속 소비
    Continue,

    /// 전송 중단 요청 (더 이상 바이트를 받지 않음)
    Abort,
}

/// 전송 계층이 호출하는 소비자 인터페이스
///
/// 전송 계층은 상태 코드를 먼저 알리고, 헤더 줄과 바디 바이트를
/// 도착하는 대로 넘긴다. 한 번의 호출에 임의 크기가 올 수 있다.
#[allow(async_fn_in_trait)]
pub trait ChunkSink {
    /// 응답 상태 코드 보고 (바디 이전에 한 번)
    fn on_status(&mut self, status: u16);

    /// 헤더 한 줄 도착
    async fn on_header_line(&mut self, line: &[u8]) -> SinkFlow;

    /// 바디 바이트 도착
    async fn on_body(&mut self, data: &[u8]) -> SinkFlow;
}

/// 응답 프레임을 IPC로 내보내는 ChunkSink 구현
///
/// 요청 하나의 수명 동안만 존재한다. 응답 버퍼와 스크래치 버퍼는
/// 워커 루프 소유이고 빌려서 재사용한다.
pub struct FrameStreamer<'a, W> {
    id: u32,
    writer: &'a mut W,
    answer: &'a mut RangeAnswer,
    scratch: &'a mut [u8; ANSWER_FRAME_SIZE],
    status: Option<u16>,
    aborted: bool,
}

impl<'a, W> FrameStreamer<'a, W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        id: u32,
        writer: &'a mut W,
        answer: &'a mut RangeAnswer,
        scratch: &'a mut [u8; ANSWER_FRAME_SIZE],
    ) -> Self {
        Self {
            id,
            writer,
            answer,
            scratch,
            status: None,
            aborted: false,
        }
    }

    /// 이 전송이 중단 신호를 보냈는지
    pub fn aborted(&self) -> bool {
        self.aborted
    }
}

impl<W> ChunkSink for FrameStreamer<'_, W>
where
    W: AsyncWrite + Unpin,
{
    fn on_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    async fn on_header_line(&mut self, line: &[u8]) -> SinkFlow {
        // 상태가 뭐든 헤더는 전달한다. 실패한 전송의 헤더는 종료 ERROR
        // 프레임을 본 제어 프로세스가 버린다.
        self.answer.set_header_line(self.id, line);
        if let Err(e) = write_answer(self.writer, self.answer, self.scratch).await {
            error!("IPC 헤더 전송 실패: {}", e);
            self.aborted = true;
            return SinkFlow::Abort;
        }
        SinkFlow::Continue
    }

    async fn on_body(&mut self, data: &[u8]) -> SinkFlow {
        // 206 확인 전이거나 다른 상태면 바디를 소비하지 않는다.
        // 서버가 range를 무시하고 전체 파일을 보내는 경우를 여기서 끊는다.
        match self.status {
            Some(status) if is_partial_content(status) => {}
            status => {
                warn!(
                    "range 요청이 거부됨: HTTP {}, 바디 소비 중단",
                    status.unwrap_or(0)
                );
                self.aborted = true;
                return SinkFlow::Abort;
            }
        }

        // 한 번에 넘어온 바이트가 프레임 용량보다 커도 잘리지 않고
        // 여러 DATA 프레임으로 나간다.
        for slice in data.chunks(ANSWER_PAYLOAD_SIZE) {
            self.answer.set_data(self.id, slice);
            if let Err(e) = write_answer(self.writer, self.answer, self.scratch).await {
                error!("IPC 데이터 전송 실패: {}", e);
                self.aborted = true;
                return SinkFlow::Abort;
            }
        }

        SinkFlow::Continue
    }
}
