//! # RFW (Range Fetch Worker)
//!
//! 권한 분리형 HTTP range 다운로드 워커
//!
//! 델타/패치 적용기 같은 상위 프로세스가 네트워크 코드를 자기 주소 공간에서
//! 돌리지 않도록, 누락된 청크의 range 요청을 별도 프로세스로 위임한다.
//! 제어 프로세스와는 고정 크기 바이너리 프레임 IPC로만 통신한다.
//!
//! ## 핵심 특징
//! - **206 전용**: Partial Content가 아닌 응답은 모두 전송 실패로 거부
//! - **고정 프레임 IPC**: 요청/응답 모두 고정 크기 바이너리 프레임
//! - **청크 CRC32**: DATA 프레임마다 페이로드 체크섬 포함
//! - **순차 처리**: 한 번에 하나의 요청만, 프레임 순서 보장
//! - **실패 격리**: 한 전송의 실패는 해당 요청 하나에만 국한

pub mod config;
pub mod error;
pub mod message;
pub mod policy;
pub mod stream;
pub mod transport;
pub mod worker;

pub use config::{TransportCredentials, WorkerConfig};
pub use error::{Error, Result};
pub use message::{AnswerKind, RangeAnswer, RangeRequest};
pub use policy::{TransferPolicy, TransferRequest};
pub use stream::{ChunkSink, FrameStreamer, SinkFlow};
pub use transport::{HttpTransport, Transport};
pub use worker::Worker;

/// 요청 프레임 페이로드 크기 (바이트)
///
/// URL, NUL 구분자, range 지정자가 이 안에 연속으로 들어간다.
pub const REQUEST_PAYLOAD_SIZE: usize = 2048;

/// 요청 프레임 전체 크기: id(4) + urllen(4) + rangelen(4) + payload
pub const REQUEST_FRAME_SIZE: usize = 12 + REQUEST_PAYLOAD_SIZE;

/// 응답 프레임 페이로드 크기 (바이트)
pub const ANSWER_PAYLOAD_SIZE: usize = 2048;

/// 응답 프레임 전체 크기: id(4) + type(1) + len(4) + crc(4) + payload
pub const ANSWER_FRAME_SIZE: usize = 13 + ANSWER_PAYLOAD_SIZE;
