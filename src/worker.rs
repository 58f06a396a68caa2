//! 워커 루프 (Worker Loop)
//!
//! 요청 수신 → 디스패치 → 요청 수신의 무한 루프. 엄격하게 순차적이라
//! 두 요청의 프레임이 섞이는 일은 없다.
//!
//! 실패 등급:
//! - 치명적: 제어 채널 읽기 에러 (루프 종료, 프로세스 종료로 이어짐)
//! - 요청 단위: malformed 요청 (응답 없이 건너뜀)
//! - 전송 단위: 206 아님 / 전송 에러 / IPC 실패 → ERROR 종료 프레임
//! - 종료 프레임 전송 실패: 로그만 남기고 루프 계속

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::message::{read_request, write_answer, RangeAnswer, RangeRequest};
use crate::policy::{TransferPolicy, TransferRequest};
use crate::stream::FrameStreamer;
use crate::transport::Transport;
use crate::{Result, ANSWER_FRAME_SIZE, REQUEST_FRAME_SIZE};

/// 범위 요청 디스패처
///
/// 요청/응답/스크래치 버퍼는 생성 시 한 번 할당하고 전 요청에 걸쳐
/// 재사용한다. 요청 중 힙 할당은 URL 합성 하나뿐이다.
pub struct Worker<R, W, T> {
    reader: R,
    writer: W,
    transport: T,
    policy: TransferPolicy,
    request_frame: [u8; REQUEST_FRAME_SIZE],
    answer: RangeAnswer,
    scratch: [u8; ANSWER_FRAME_SIZE],
}

impl<R, W, T> Worker<R, W, T>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    T: Transport,
{
    pub fn new(reader: R, writer: W, transport: T, policy: TransferPolicy) -> Self {
        Self {
            reader,
            writer,
            transport,
            policy,
            request_frame: [0u8; REQUEST_FRAME_SIZE],
            answer: RangeAnswer::new(),
            scratch: [0u8; ANSWER_FRAME_SIZE],
        }
    }

    /// 요청 루프. 제어 채널이 닫히면 Ok, 읽기 에러면 Err.
    pub async fn run(&mut self) -> Result<()> {
        info!("range 요청 대기 시작");

        loop {
            let request = match read_request(&mut self.reader, &mut self.request_frame).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    info!("제어 채널이 닫힘, 워커 종료");
                    return Ok(());
                }
                Err(e) => {
                    error!("제어 채널 읽기 실패: {}", e);
                    return Err(e);
                }
            };

            self.dispatch(request).await;
        }
    }

    /// 요청 하나를 끝까지 처리한다. 여기서 나가는 에러는 없다.
    async fn dispatch(&mut self, request: RangeRequest) {
        let id = request.id;

        let transfer_request = match request.parts() {
            Ok((url, range)) => {
                let effective = self.policy.resolve_url(url);
                TransferRequest::new(effective, range.to_string())
            }
            Err(e) => {
                // malformed 요청에는 응답을 보내지 않는다.
                warn!("잘못된 요청 무시: {}", e);
                return;
            }
        };

        debug!(
            "전송 시작: id={}, url={}, range={}",
            id, transfer_request.url, transfer_request.range
        );

        let outcome = match self.transport.open(&transfer_request).await {
            Ok(()) => {
                let mut sink = FrameStreamer::new(
                    id,
                    &mut self.writer,
                    &mut self.answer,
                    &mut self.scratch,
                );
                self.transport.transfer(&mut sink).await
            }
            Err(e) => {
                error!("채널 열기 실패: id={}, {}", id, e);
                Err(e)
            }
        };

        match &outcome {
            Ok(()) => debug!("전송 완료: id={}", id),
            Err(e) => warn!("전송 실패: id={}, {}", id, e),
        }

        // 요청 하나당 종료 프레임 정확히 하나. 여기서의 전송 실패는
        // 복구할 방법이 없으므로 로그만 남긴다. 제어 프로세스가 자체
        // 타임아웃으로 침묵을 감지한다.
        self.answer.set_terminal(id, outcome.is_ok());
        if let Err(e) = write_answer(&mut self.writer, &self.answer, &mut self.scratch).await {
            error!("종료 응답 전송 실패: id={}, {}", id, e);
        }

        self.transport.close().await;
    }
}
