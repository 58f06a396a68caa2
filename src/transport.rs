//! 전송 계층 (Transport collaborator)
//!
//! 워커는 HTTP 구현을 직접 알지 않고 open / transfer / close 계약으로만
//! 사용한다. 실제 구현은 reqwest 스트리밍 클라이언트 하나.
//!
//! transfer 중에는 ChunkSink 콜백이 0번 이상 불린다. 콜백이 Abort를
//! 돌려주면 transfer는 즉시 에러로 끝난다.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use reqwest::header;
use tracing::{debug, warn};

use crate::config::TransportCredentials;
use crate::policy::{is_partial_content, TransferRequest, ACCEPT_ANY};
use crate::stream::{ChunkSink, SinkFlow};
use crate::{Error, Result};

/// 전송 계약
///
/// 한 번의 open → transfer → close가 요청 하나의 전송 수명이다.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// 요청을 보내고 스트리밍 세션을 연다.
    async fn open(&mut self, request: &TransferRequest) -> Result<()>;

    /// 전송을 끝까지 몬다. 헤더와 바디를 sink 콜백으로 넘기고,
    /// 상태가 206이 아니거나 sink가 중단하면 에러를 돌려준다.
    async fn transfer(&mut self, sink: &mut impl ChunkSink) -> Result<()>;

    /// 세션 정리. 실패해도 워커 루프는 계속 돈다.
    async fn close(&mut self);
}

/// reqwest 기반 HTTP 전송
///
/// 클라이언트는 기동 시 한 번 만들고 (TLS/프록시/인터페이스 설정 포함)
/// 요청마다 재사용한다. 연결/리다이렉트/재시도는 전부 클라이언트 내부 일.
pub struct HttpTransport {
    client: reqwest::Client,
    response: Option<reqwest::Response>,
}

impl HttpTransport {
    /// 자격 증명으로 클라이언트 구성. 실패는 기동 단계의 치명적 에러.
    pub fn new(credentials: &TransportCredentials) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("rfw/", env!("CARGO_PKG_VERSION")));

        if credentials.connection_timeout_secs > 0 {
            builder = builder
                .connect_timeout(Duration::from_secs(credentials.connection_timeout_secs));
        }

        if let Some(path) = &credentials.cafile {
            let pem = std::fs::read(path)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        if let (Some(cert), Some(key)) = (&credentials.sslcert, &credentials.sslkey) {
            let cert_pem = std::fs::read(cert)?;
            let key_pem = std::fs::read(key)?;
            builder = builder.identity(reqwest::Identity::from_pkcs8_pem(&cert_pem, &key_pem)?);
        }

        if let Some(proxy) = &credentials.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        #[cfg(target_os = "linux")]
        {
            if let Some(iface) = &credentials.interface {
                builder = builder.interface(iface);
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            if credentials.interface.is_some() {
                warn!("이 플랫폼에서는 interface 바인딩을 지원하지 않음, 무시");
            }
        }

        if credentials.ciphers.is_some() {
            // reqwest에는 cipher 문자열 노브가 없다. TLS 백엔드 기본값 사용.
            warn!("ciphers 설정은 지원되지 않음, 무시");
        }

        Ok(Self {
            client: builder.build()?,
            response: None,
        })
    }
}

impl Transport for HttpTransport {
    async fn open(&mut self, request: &TransferRequest) -> Result<()> {
        let response = self
            .client
            .get(&request.url)
            .header(header::RANGE, request.range.as_str())
            .header(header::ACCEPT, ACCEPT_ANY)
            .send()
            .await?;

        debug!(
            "채널 열림: {} -> HTTP {}",
            request.url,
            response.status().as_u16()
        );
        self.response = Some(response);
        Ok(())
    }

    async fn transfer(&mut self, sink: &mut impl ChunkSink) -> Result<()> {
        let mut response = self.response.take().ok_or(Error::NotOpened)?;
        let status = response.status().as_u16();
        sink.on_status(status);

        // curl 헤더 콜백과 같은 모양으로 상태줄과 헤더를 한 줄씩 전달
        let status_line = format!("{:?} {}\r\n", response.version(), response.status());
        if sink.on_header_line(status_line.as_bytes()).await == SinkFlow::Abort {
            return Err(Error::TransferAborted);
        }

        for (name, value) in response.headers() {
            let mut line =
                BytesMut::with_capacity(name.as_str().len() + value.as_bytes().len() + 4);
            line.put_slice(name.as_str().as_bytes());
            line.put_slice(b": ");
            line.put_slice(value.as_bytes());
            line.put_slice(b"\r\n");

            if sink.on_header_line(&line).await == SinkFlow::Abort {
                return Err(Error::TransferAborted);
            }
        }

        while let Some(chunk) = response.chunk().await? {
            if chunk.is_empty() {
                continue;
            }
            if sink.on_body(&chunk).await == SinkFlow::Abort {
                return Err(Error::TransferAborted);
            }
        }

        // 바디가 비어 있어도 206이 아니면 실패다.
        if !is_partial_content(status) {
            return Err(Error::NotPartialContent { got: status });
        }

        Ok(())
    }

    async fn close(&mut self) {
        self.response = None;
    }
}
