//! RFW 워커 프로세스 - Range Fetch Worker
//!
//! 제어 프로세스가 띄우는 권한 분리형 다운로드 워커.
//! 제어 채널(상속받은 소켓 fd 또는 stdin/stdout)로 range 요청을 받아
//! HTTP로 가져온 바이트를 고정 프레임으로 되돌려 준다.
//!
//! 사용법:
//!   rfw-worker [OPTIONS]
//!
//! 예시:
//!   # 설정 파일 + 상속 fd
//!   rfw-worker --config /etc/rfw.toml --fd 3
//!
//!   # base URL 덮어쓰기, stdin/stdout 채널
//!   rfw-worker -u http://mirror.example.com/updates/

use std::os::unix::io::{FromRawFd, RawFd};
use std::path::PathBuf;
use std::process;

use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use rfw::{HttpTransport, TransferPolicy, Worker, WorkerConfig};

/// 기동 실패 (설정/전송 초기화) 종료 코드
const EXIT_INIT: i32 = 2;

/// 제어 채널 치명적 에러 종료 코드
const EXIT_FATAL: i32 = 1;

/// 워커 기동 인자
struct WorkerArgs {
    config_path: Option<PathBuf>,
    base_url: Option<String>,
    control_fd: Option<RawFd>,
    debug: bool,
}

impl Default for WorkerArgs {
    fn default() -> Self {
        Self {
            config_path: None,
            base_url: None,
            control_fd: None,
            debug: false,
        }
    }
}

fn parse_args() -> WorkerArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = WorkerArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--url" | "-u" => {
                if i + 1 < args.len() {
                    parsed.base_url = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--fd" => {
                if i + 1 < args.len() {
                    parsed.control_fd = Some(args[i + 1].parse().expect("유효한 fd 번호 필요"));
                    i += 1;
                }
            }
            "--debug" | "-d" => {
                parsed.debug = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"RFW Worker - 권한 분리형 HTTP range 다운로드 워커

제어 프로세스가 보낸 range 요청을 HTTP로 수행하고 결과 바이트를
고정 크기 바이너리 프레임으로 되돌려 준다. 206이 아닌 응답은 거부.

사용법:
  rfw-worker [OPTIONS]

옵션:
  -c, --config <FILE>   TOML 설정 파일 (base URL, TLS, 프록시)
  -u, --url <URL>       상대 경로 앞에 붙일 base URL (설정 파일보다 우선)
  --fd <N>              상속받은 제어 채널 소켓 fd (기본: stdin/stdout)
  -d, --debug           디버그 로그 활성화
  -h, --help            이 도움말 출력
"#
                );
                process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    parsed
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    // 로깅 설정
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("로깅 초기화 실패: {}", e);
    }

    info!("RFW worker starting...");

    // 설정은 기동 시 한 번 읽고 이후 불변
    let mut config = match &args.config_path {
        Some(path) => match WorkerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("설정 파일 로드 실패 ({}): {}", path.display(), e);
                process::exit(EXIT_INIT);
            }
        },
        None => WorkerConfig::default(),
    };
    if let Some(url) = args.base_url {
        config.set_base_url(url);
    }

    if let Some(url) = &config.url {
        info!("Base URL: {}", url);
    }

    let transport = match HttpTransport::new(&config.credentials) {
        Ok(transport) => transport,
        Err(e) => {
            error!("전송 계층 초기화 실패: {}", e);
            process::exit(EXIT_INIT);
        }
    };
    let policy = TransferPolicy::new(config.url.clone());

    let outcome = match args.control_fd {
        Some(fd) => {
            info!("제어 채널: 상속 fd {}", fd);
            // 부모가 넘겨준 fd. 이 프로세스가 유일한 소유자다.
            let std_stream = unsafe { std::os::unix::net::UnixStream::from_raw_fd(fd) };
            if let Err(e) = std_stream.set_nonblocking(true) {
                error!("제어 채널 설정 실패: {}", e);
                process::exit(EXIT_INIT);
            }
            let stream = match tokio::net::UnixStream::from_std(std_stream) {
                Ok(stream) => stream,
                Err(e) => {
                    error!("제어 채널 등록 실패: {}", e);
                    process::exit(EXIT_INIT);
                }
            };
            let (reader, writer) = stream.into_split();
            Worker::new(reader, writer, transport, policy).run().await
        }
        None => {
            info!("제어 채널: stdin/stdout");
            Worker::new(tokio::io::stdin(), tokio::io::stdout(), transport, policy)
                .run()
                .await
        }
    };

    if let Err(e) = outcome {
        error!("치명적 에러, 워커 종료: {}", e);
        process::exit(EXIT_FATAL);
    }
}
