//! RTMP endpoints on top of FFmpeg's network protocols.
//!
//! FFmpeg presents an RTMP play session as an FLV byte stream and accepts one
//! for publishing, so the framing in [`crate::flv`] runs unchanged on top of
//! it. Each endpoint owns a dedicated worker thread holding the FFmpeg I/O
//! context, since those contexts are neither `Send` nor async; bytes cross to
//! the async side through an in-memory pipe.

use crate::address::MediaAddress;
use crate::connector::{MediaConnector, DEFAULT_CONNECT_TIMEOUT};
use crate::endpoint::{FlvSink, FlvSource, MediaSink, MediaSource};
use crate::error::{MediaError, MediaResult};
use crate::packet::{Packet, StreamDescriptor};
use async_trait::async_trait;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::oneshot;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, error, trace, warn};

const PIPE_CAPACITY: usize = 256 * 1024;
const CHUNK_SIZE: usize = 32 * 1024;

/// Time a closing sink gets to hand buffered bytes to FFmpeg.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimal FFmpeg bindings for URL based I/O. Libraries are provided by the
/// `ac-ffmpeg` build.
mod ffi {
    #![allow(non_camel_case_types)]

    use std::os::raw::{c_char, c_int, c_uchar, c_void};

    pub const AVIO_FLAG_READ: c_int = 1;
    pub const AVIO_FLAG_WRITE: c_int = 2;

    pub const AVERROR_EOF: c_int = fferrtag(b'E', b'O', b'F', b' ');

    const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> c_int {
        -((a as c_int) | ((b as c_int) << 8) | ((c as c_int) << 16) | ((d as c_int) << 24))
    }

    pub enum AVDictionary {}

    // Leading fields of AVIOContext, up to the sticky `error` code.
    #[repr(C)]
    pub struct AVIOContext {
        pub av_class: *const c_void,
        pub buffer: *mut c_uchar,
        pub buffer_size: c_int,
        pub buf_ptr: *mut c_uchar,
        pub buf_end: *mut c_uchar,
        pub opaque: *mut c_void,
        pub read_packet: *const c_void,
        pub write_packet: *const c_void,
        pub seek: *const c_void,
        pub pos: i64,
        pub eof_reached: c_int,
        pub error: c_int,
    }

    #[repr(C)]
    pub struct AVIOInterruptCB {
        pub callback: Option<unsafe extern "C" fn(*mut c_void) -> c_int>,
        pub opaque: *mut c_void,
    }

    #[link(name = "avformat")]
    extern "C" {
        pub fn avformat_network_init() -> c_int;
        pub fn avio_open2(
            s: *mut *mut AVIOContext,
            url: *const c_char,
            flags: c_int,
            int_cb: *const AVIOInterruptCB,
            options: *mut *mut AVDictionary,
        ) -> c_int;
        pub fn avio_read(s: *mut AVIOContext, buf: *mut c_uchar, size: c_int) -> c_int;
        pub fn avio_write(s: *mut AVIOContext, buf: *const c_uchar, size: c_int);
        pub fn avio_flush(s: *mut AVIOContext);
        pub fn avio_closep(s: *mut *mut AVIOContext) -> c_int;
    }

    #[link(name = "avutil")]
    extern "C" {
        pub fn av_dict_set(
            pm: *mut *mut AVDictionary,
            key: *const c_char,
            value: *const c_char,
            flags: c_int,
        ) -> c_int;
        pub fn av_dict_free(m: *mut *mut AVDictionary);
        pub fn av_strerror(errnum: c_int, errbuf: *mut c_char, errbuf_size: usize) -> c_int;
    }

    pub fn av_err_str(errnum: c_int) -> String {
        let mut buf = [0 as c_char; 256];
        unsafe {
            av_strerror(errnum, buf.as_mut_ptr(), buf.len());
            std::ffi::CStr::from_ptr(buf.as_ptr())
                .to_string_lossy()
                .into_owned()
        }
    }
}

/// Route FFmpeg's own logging into `tracing` and set up its network layer, once per process.
fn init_ffmpeg() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        ac_ffmpeg::set_log_callback(|level, message| {
            let message = message.trim_end();
            match level {
                l if l <= 16 => error!(target: "ffmpeg", "{}", message),
                l if l <= 24 => warn!(target: "ffmpeg", "{}", message),
                l if l <= 40 => debug!(target: "ffmpeg", "{}", message),
                _ => trace!(target: "ffmpeg", "{}", message),
            }
        });
        unsafe {
            ffi::avformat_network_init();
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Play,
    Publish,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Play => f.write_str("play"),
            Direction::Publish => f.write_str("publish"),
        }
    }
}

unsafe extern "C" fn interrupted(opaque: *mut std::os::raw::c_void) -> std::os::raw::c_int {
    let flag = &*(opaque as *const AtomicBool);
    flag.load(Ordering::Relaxed) as std::os::raw::c_int
}

/// Open FFmpeg I/O context. Lives and dies on its worker thread.
struct AvioContext {
    ctx: *mut ffi::AVIOContext,
    // FFmpeg keeps a raw pointer to the flag until the context is closed.
    _interrupt: Arc<AtomicBool>,
}

impl AvioContext {
    fn open(
        url: &str,
        direction: Direction,
        rw_timeout: Duration,
        interrupt: Arc<AtomicBool>,
    ) -> Result<Self, String> {
        let c_url = std::ffi::CString::new(url).map_err(|_| "address contains a NUL byte".to_string())?;
        let c_timeout = std::ffi::CString::new(rw_timeout.as_micros().to_string())
            .map_err(|_| "invalid timeout".to_string())?;
        let flags = match direction {
            Direction::Play => ffi::AVIO_FLAG_READ,
            Direction::Publish => ffi::AVIO_FLAG_WRITE,
        };
        let callback = ffi::AVIOInterruptCB {
            callback: Some(interrupted),
            opaque: Arc::as_ptr(&interrupt) as *mut _,
        };

        let mut ctx = std::ptr::null_mut();
        let ret = unsafe {
            let mut options = std::ptr::null_mut();
            ffi::av_dict_set(
                &mut options,
                b"rw_timeout\0".as_ptr().cast(),
                c_timeout.as_ptr(),
                0,
            );
            let ret = ffi::avio_open2(&mut ctx, c_url.as_ptr(), flags, &callback, &mut options);
            ffi::av_dict_free(&mut options);
            ret
        };
        if ret < 0 || ctx.is_null() {
            return Err(ffi::av_err_str(ret));
        }

        Ok(Self {
            ctx,
            _interrupt: interrupt,
        })
    }

    /// Read into `buf`; `0` at the end of the session.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, String> {
        let len = buf.len().min(i32::MAX as usize) as i32;
        let ret = unsafe { ffi::avio_read(self.ctx, buf.as_mut_ptr(), len) };
        match ret {
            ffi::AVERROR_EOF => Ok(0),
            n if n < 0 => Err(ffi::av_err_str(n)),
            n => Ok(n as usize),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), String> {
        let len = buf.len().min(i32::MAX as usize) as i32;
        let error = unsafe {
            ffi::avio_write(self.ctx, buf.as_ptr(), len);
            ffi::avio_flush(self.ctx);
            (*self.ctx).error
        };
        if error < 0 {
            return Err(ffi::av_err_str(error));
        }
        Ok(())
    }
}

impl Drop for AvioContext {
    fn drop(&mut self) {
        if !self.ctx.is_null() {
            unsafe {
                ffi::avio_closep(&mut self.ctx);
            }
        }
    }
}

/// Handle on an endpoint's worker thread.
struct Worker {
    interrupt: Arc<AtomicBool>,
    finished: Option<oneshot::Receiver<()>>,
}

impl Worker {
    /// Abort any blocking FFmpeg call on the worker.
    fn stop(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// Wait for the worker to hand off what is left in the pipe, then stop it.
    async fn drain(&mut self) {
        if let Some(finished) = self.finished.take() {
            if tokio::time::timeout(DRAIN_TIMEOUT, finished).await.is_err() {
                warn!("RTMP publisher did not drain within {:?}", DRAIN_TIMEOUT);
            }
        }
        self.stop();
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open `url` on a new worker thread and return the async end of its byte pipe.
async fn open_session(
    address: &str,
    url: &str,
    direction: Direction,
    timeout: Duration,
) -> MediaResult<(DuplexStream, Worker)> {
    init_ffmpeg();

    let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
    let pipe = SyncIoBridge::new(remote);
    let interrupt = Arc::new(AtomicBool::new(false));
    let (opened_tx, opened_rx) = oneshot::channel();
    let (finished_tx, finished_rx) = oneshot::channel();

    let worker_url = url.to_string();
    let flag = interrupt.clone();
    thread::Builder::new()
        .name(format!("rtmp-{}", direction))
        .spawn(move || {
            run_worker(&worker_url, direction, timeout, flag, pipe, opened_tx);
            let _ = finished_tx.send(());
        })?;

    let worker = Worker {
        interrupt,
        finished: Some(finished_rx),
    };

    match tokio::time::timeout(timeout, opened_rx).await {
        Ok(Ok(Ok(()))) => Ok((local, worker)),
        Ok(Ok(Err(reason))) => Err(MediaError::ConnectFailed {
            address: address.to_string(),
            source: io::Error::other(reason),
        }),
        Ok(Err(_)) => Err(MediaError::ConnectFailed {
            address: address.to_string(),
            source: io::Error::other("RTMP worker exited while connecting"),
        }),
        // Dropping the worker interrupts the pending open.
        Err(_) => Err(MediaError::ConnectTimeout {
            address: address.to_string(),
        }),
    }
}

fn run_worker(
    url: &str,
    direction: Direction,
    rw_timeout: Duration,
    interrupt: Arc<AtomicBool>,
    pipe: SyncIoBridge<DuplexStream>,
    opened: oneshot::Sender<Result<(), String>>,
) {
    let mut context = match AvioContext::open(url, direction, rw_timeout, interrupt.clone()) {
        Ok(context) => context,
        Err(reason) => {
            let _ = opened.send(Err(reason));
            return;
        }
    };
    if opened.send(Ok(())).is_err() {
        debug!(%direction, "RTMP session abandoned while connecting");
        return;
    }

    let result = match direction {
        Direction::Play => pump_play(&mut context, pipe),
        Direction::Publish => pump_publish(&mut context, pipe),
    };
    match result {
        Ok(bytes) => debug!(%direction, bytes, "RTMP session ended"),
        Err(_) if interrupt.load(Ordering::Relaxed) => debug!(%direction, "RTMP session stopped"),
        Err(e) => warn!(%direction, "RTMP session failed: {}", e),
    }
}

/// FFmpeg -> pipe until the session ends or the reader goes away.
fn pump_play(context: &mut AvioContext, mut pipe: SyncIoBridge<DuplexStream>) -> Result<u64, String> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = context.read(&mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        match pipe.write_all(&buf[..n]) {
            Ok(()) => total += n as u64,
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(total),
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Pipe -> FFmpeg until the writer shuts the pipe down.
fn pump_publish(context: &mut AvioContext, mut pipe: SyncIoBridge<DuplexStream>) -> Result<u64, String> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = pipe.read(&mut buf).map_err(|e| e.to_string())?;
        if n == 0 {
            return Ok(total);
        }
        context.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// RTMP play session.
pub struct RtmpSource {
    inner: FlvSource,
    worker: Worker,
}

#[async_trait]
impl MediaSource for RtmpSource {
    async fn streams(&mut self) -> MediaResult<Vec<StreamDescriptor>> {
        self.inner.streams().await
    }

    async fn read_packet(&mut self) -> MediaResult<Option<Packet>> {
        self.inner.read_packet().await
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.worker.stop();
        self.inner.close().await
    }
}

/// RTMP publish session.
pub struct RtmpSink {
    inner: FlvSink,
    worker: Worker,
}

#[async_trait]
impl MediaSink for RtmpSink {
    async fn write_header(&mut self, streams: &[StreamDescriptor]) -> MediaResult<()> {
        self.inner.write_header(streams).await
    }

    async fn write_packet(&mut self, packet: &Packet) -> MediaResult<()> {
        self.inner.write_packet(packet).await
    }

    async fn close(&mut self) -> MediaResult<()> {
        let result = self.inner.close().await;
        self.worker.drain().await;
        result
    }
}

/// `rtmp://` and `rtmps://` endpoints through FFmpeg.
#[derive(Debug, Clone)]
pub struct RtmpConnector {
    connect_timeout: Duration,
}

impl Default for RtmpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl RtmpConnector {
    /// `connect_timeout` bounds the RTMP handshake and every later network read or write.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

fn rtmp_url(address: &str) -> MediaResult<String> {
    match address.parse::<MediaAddress>()? {
        MediaAddress::Rtmp { url } => Ok(url),
        _ => Err(MediaError::invalid_address(address, "not an RTMP address")),
    }
}

#[async_trait]
impl MediaConnector for RtmpConnector {
    async fn open_source(&self, address: &str) -> MediaResult<Box<dyn MediaSource>> {
        let url = rtmp_url(address)?;
        let (pipe, worker) = open_session(address, &url, Direction::Play, self.connect_timeout).await?;

        debug!(address, "Opened RTMP source");
        Ok(Box::new(RtmpSource {
            inner: FlvSource::new(Box::new(pipe)),
            worker,
        }))
    }

    async fn dial_sink(&self, address: &str) -> MediaResult<Box<dyn MediaSink>> {
        let url = rtmp_url(address)?;
        let (pipe, worker) =
            open_session(address, &url, Direction::Publish, self.connect_timeout).await?;

        debug!(address, "Dialed RTMP sink");
        Ok(Box::new(RtmpSink {
            inner: FlvSink::live(Box::new(pipe)),
            worker,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_eof_tag() {
        assert_eq!(ffi::AVERROR_EOF, -0x2046_4f45);
    }

    #[tokio::test]
    async fn test_non_rtmp_address_is_rejected() {
        let err = RtmpConnector::default()
            .dial_sink("tcp://relay.local:1936/live")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::InvalidAddress { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_refused_destination_is_connect_failure() {
        let port = closed_port().await;
        let address = format!("rtmp://127.0.0.1:{}/live/abc", port);

        let err = RtmpConnector::new(Duration::from_secs(5))
            .dial_sink(&address)
            .await
            .err()
            .unwrap();
        assert!(
            matches!(err, MediaError::ConnectFailed { .. } | MediaError::ConnectTimeout { .. }),
            "{}",
            err
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_silent_peer_times_out() {
        // Accepts the TCP connection but never answers the RTMP handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _peer = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let err = RtmpConnector::new(Duration::from_millis(300))
            .open_source(&format!("rtmp://127.0.0.1:{}/live/abc", port))
            .await
            .err()
            .unwrap();
        assert!(
            matches!(err, MediaError::ConnectTimeout { .. } | MediaError::ConnectFailed { .. }),
            "{}",
            err
        );
    }
}
