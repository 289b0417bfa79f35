use std::{
    io::ErrorKind,
    net::TcpStream,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use tungstenite::{HandshakeError, Message, WebSocket, stream::MaybeTlsStream};

use super::{
    auth::{TokenSource, socket_url},
    encoder, protocol,
    sink::VideoSink,
};
use crate::{
    config::{ConfigError, StreamConfig},
    error::StreamError,
    state::AnalysisStore,
};

/// Longest a blocked socket read may delay noticing a stop request.
const MAX_READ_WAIT: Duration = Duration::from_millis(25);
const MIN_READ_WAIT: Duration = Duration::from_millis(1);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Resolved per-session settings.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub endpoint: String,
    pub token_param: String,
    pub interval: Duration,
    pub jpeg_quality: u8,
}

impl SessionContext {
    pub fn from_config(stream: &StreamConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: stream.endpoint()?.to_string(),
            token_param: stream.token_param.clone(),
            interval: stream.sample_interval(),
            jpeg_quality: stream.jpeg_quality,
        })
    }
}

#[derive(Debug, Default)]
struct Counters {
    frames_sent: AtomicU64,
    messages_applied: AtomicU64,
    messages_discarded: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_sent: u64,
    pub messages_applied: u64,
    pub messages_discarded: u64,
}

/// Fixed-rate sampling clock. The first tick fires one period after start.
#[derive(Debug)]
struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    fn start(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next: now + period,
        }
    }

    /// Returns true once per elapsed period. Missed ticks are dropped, not replayed.
    fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.period;
        if self.next <= now {
            self.next = now + self.period;
        }
        true
    }

    fn remaining(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }
}

/// Socket plus ticker of an open session. Torn down exactly once.
struct OpenSession {
    socket: Socket,
    ticker: Option<Ticker>,
    closed: bool,
}

impl OpenSession {
    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.socket.close(None) {
            log::debug!("socket close: {err}");
        }
        let _ = self.socket.flush();
        self.ticker = None;
        log::debug!("session socket closed, ticker cleared");
    }
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Handle to a running live session. Stopping (or dropping) joins the worker.
#[derive(Debug)]
pub struct StreamSession {
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    counters: Arc<Counters>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamSession {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// True once the worker has exited, whether stopped or ended by the server.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_sent: self.counters.frames_sent.load(Ordering::Relaxed),
            messages_applied: self.counters.messages_applied.load(Ordering::Relaxed),
            messages_discarded: self.counters.messages_discarded.load(Ordering::Relaxed),
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn start_stream_session(
    context: SessionContext,
    tokens: Arc<dyn TokenSource>,
    sink: VideoSink,
    store: AnalysisStore,
) -> StreamSession {
    let stop = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let counters = Arc::new(Counters::default());

    let worker = Worker {
        context,
        sink,
        store,
        stop: stop.clone(),
        counters: counters.clone(),
    };
    let finished_flag = finished.clone();
    let handle = thread::spawn(move || {
        match worker.run(tokens.as_ref()) {
            Ok(()) => log::info!("stream session stopped"),
            Err(err) => log::error!("stream session ended: {err}"),
        }
        finished_flag.store(true, Ordering::SeqCst);
    });

    StreamSession {
        stop,
        finished,
        counters,
        handle: Some(handle),
    }
}

struct Worker {
    context: SessionContext,
    sink: VideoSink,
    store: AnalysisStore,
    stop: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl Worker {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn run(&self, tokens: &dyn TokenSource) -> Result<(), StreamError> {
        let token = tokens.fetch_token()?;
        let url = socket_url(&self.context.endpoint, &self.context.token_param, &token)?;
        if self.stopped() {
            return Ok(());
        }

        let Some(socket) = self.connect(&url)? else {
            return Ok(());
        };
        log::info!("inference socket open at {}", self.context.endpoint);

        let mut session = OpenSession {
            socket,
            ticker: Some(Ticker::start(self.context.interval, Instant::now())),
            closed: false,
        };
        let result = self.pump(&mut session);
        session.teardown();
        result
    }

    /// Opens the socket with bounded reads so the upgrade handshake keeps
    /// checking the stop flag. Returns `None` when stopped mid-handshake.
    fn connect(&self, url: &reqwest::Url) -> Result<Option<Socket>, StreamError> {
        let stream = self.dial(url)?;
        stream.set_read_timeout(Some(MAX_READ_WAIT))?;

        let mut attempt = tungstenite::client_tls(url.as_str(), stream);
        loop {
            match attempt {
                Ok((socket, _)) => return Ok(Some(socket)),
                Err(HandshakeError::Interrupted(pending)) => {
                    if self.stopped() {
                        log::debug!("stopped during socket handshake");
                        return Ok(None);
                    }
                    attempt = pending.handshake();
                }
                Err(HandshakeError::Failure(err)) => return Err(err.into()),
            }
        }
    }

    fn dial(&self, url: &reqwest::Url) -> Result<TcpStream, StreamError> {
        let addrs = url.socket_addrs(|| None)?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err
            .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "endpoint has no address"))
            .into())
    }

    fn pump(&self, session: &mut OpenSession) -> Result<(), StreamError> {
        while let Some(ticker) = session.ticker.as_mut() {
            if self.stopped() {
                break;
            }

            if ticker.poll(Instant::now()) {
                self.send_frame(&mut session.socket)?;
            }
            let wait = ticker.remaining(Instant::now());
            set_read_timeout(&mut session.socket, wait.clamp(MIN_READ_WAIT, MAX_READ_WAIT))?;

            match session.socket.read() {
                Ok(Message::Text(text)) => self.apply(&text),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.apply(text),
                    Err(_) => self.discard("binary message is not utf-8"),
                },
                Ok(Message::Close(frame)) => {
                    log::info!("server closed the socket: {frame:?}");
                    return Err(StreamError::Closed);
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Err(StreamError::Closed);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn send_frame(&self, socket: &mut Socket) -> Result<(), StreamError> {
        let Some(frame) = self.sink.latest() else {
            return Ok(());
        };
        let message = match encoder::frame_message(&frame, self.context.jpeg_quality) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("skipping frame that failed to encode: {err}");
                return Ok(());
            }
        };
        socket.send(Message::Text(message))?;
        log::trace!("sent frame captured {:?} ago", frame.timestamp.elapsed());
        self.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn apply(&self, text: &str) {
        let update = match protocol::parse_server_message(text) {
            Ok(update) => update,
            Err(err) => return self.discard(&err.to_string()),
        };
        if let Some(keypoints) = update.keypoints {
            self.store.replace_keypoints(keypoints);
        }
        if !update.scores.is_empty() {
            self.store.apply_scores(update.scores);
        }
        self.counters.messages_applied.fetch_add(1, Ordering::Relaxed);
    }

    fn discard(&self, reason: &str) {
        self.counters.messages_discarded.fetch_add(1, Ordering::Relaxed);
        log::warn!("discarding inference message: {reason}");
    }
}

fn set_read_timeout(socket: &mut Socket, wait: Duration) -> std::io::Result<()> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(wait)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::TcpListener,
        sync::Mutex,
        time::{Duration, Instant},
    };

    use tungstenite::handshake::server::{Request, Response};

    use super::*;
    use crate::types::Frame;

    struct FixedToken(&'static str);

    impl TokenSource for FixedToken {
        fn fetch_token(&self) -> Result<String, StreamError> {
            Ok(self.0.to_string())
        }
    }

    struct NoToken;

    impl TokenSource for NoToken {
        fn fetch_token(&self) -> Result<String, StreamError> {
            Err(StreamError::EmptyToken)
        }
    }

    fn context(port: u16) -> SessionContext {
        SessionContext {
            endpoint: format!("ws://127.0.0.1:{port}"),
            token_param: "token".to_string(),
            interval: Duration::from_millis(100),
            jpeg_quality: 80,
        }
    }

    fn sink_with_frame() -> VideoSink {
        let sink = VideoSink::new();
        sink.publish(Frame::new(vec![90; 16 * 12 * 4], 16, 12));
        sink
    }

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    /// Accepts one client, runs `script`, then drains the socket until it closes.
    /// Returns the request query and the number of frames received.
    fn serve_once<F>(script: F) -> (u16, thread::JoinHandle<(Option<String>, usize)>)
    where
        F: FnOnce(&mut WebSocket<TcpStream>) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let query = Arc::new(Mutex::new(None));
            let seen = query.clone();
            let mut ws = tungstenite::accept_hdr(stream, move |req: &Request, resp: Response| {
                *seen.lock().unwrap() = req.uri().query().map(str::to_string);
                Ok(resp)
            })
            .unwrap();

            script(&mut ws);

            let mut frames = 0;
            loop {
                match ws.read() {
                    Ok(Message::Text(text)) => {
                        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                        assert!(value["image"].is_string());
                        frames += 1;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            let query = query.lock().unwrap().clone();
            (query, frames)
        });
        (port, handle)
    }

    #[test]
    fn ticker_fires_once_per_period_and_skips_backlog() {
        let start = Instant::now();
        let period = Duration::from_millis(100);
        let mut ticker = Ticker::start(period, start);

        assert!(!ticker.poll(start + Duration::from_millis(50)));
        assert!(ticker.poll(start + period));
        assert!(!ticker.poll(start + period));

        // a long stall yields one tick, then the schedule restarts from now
        let late = start + Duration::from_millis(750);
        assert!(ticker.poll(late));
        assert!(!ticker.poll(late + Duration::from_millis(99)));
        assert_eq!(ticker.remaining(late), period);
    }

    #[test]
    fn sends_about_ten_frames_per_second() {
        let (port, server) = serve_once(|_| {});
        let store = AnalysisStore::new();
        let session = start_stream_session(
            context(port),
            Arc::new(FixedToken("secret")),
            sink_with_frame(),
            store,
        );

        thread::sleep(Duration::from_millis(2050));
        let sent = session.stats().frames_sent;
        session.stop();

        let (query, received) = server.join().unwrap();
        assert_eq!(query.as_deref(), Some("token=secret"));
        assert!((18..=22).contains(&sent), "sent {sent} frames");
        assert_eq!(received as u64, sent);
    }

    #[test]
    fn empty_sink_skips_ticks() {
        let (port, server) = serve_once(|_| {});
        let session = start_stream_session(
            context(port),
            Arc::new(FixedToken("t")),
            VideoSink::new(),
            AnalysisStore::new(),
        );
        thread::sleep(Duration::from_millis(350));
        assert_eq!(session.stats().frames_sent, 0);
        session.stop();
        assert_eq!(server.join().unwrap().1, 0);
    }

    #[test]
    fn malformed_message_is_discarded_and_session_continues() {
        let (port, server) = serve_once(|ws| {
            ws.send(Message::Text("not json".to_string())).unwrap();
            ws.send(Message::Text(
                r#"{"keypoints": [[10, 20, 0.9], [30, 40, 0.8]], "posture_score": {"overall": 77}}"#
                    .to_string(),
            ))
            .unwrap();
        });
        let store = AnalysisStore::new();
        let session = start_stream_session(
            context(port),
            Arc::new(FixedToken("t")),
            sink_with_frame(),
            store.clone(),
        );

        assert!(wait_until(Duration::from_secs(2), || {
            store.snapshot().keypoint_updates == 1
        }));
        let state = store.snapshot();
        assert_eq!(state.keypoints.len(), 2);
        assert_eq!(state.keypoints.get(1).unwrap().x, 30.0);
        assert!(state.scores.posture_score.is_some());

        let stats = session.stats();
        assert_eq!(stats.messages_discarded, 1);
        assert_eq!(stats.messages_applied, 1);
        assert!(!session.is_finished());

        session.stop();
        server.join().unwrap();
    }

    #[test]
    fn server_close_ends_session_and_stops_sampling() {
        let (port, server) = serve_once(|ws| {
            // wait for the first frame before hanging up
            while !matches!(ws.read(), Ok(Message::Text(_))) {}
            ws.close(None).unwrap();
        });
        let sink = sink_with_frame();
        let session = start_stream_session(
            context(port),
            Arc::new(FixedToken("t")),
            sink.clone(),
            AnalysisStore::new(),
        );

        assert!(wait_until(Duration::from_secs(2), || session.is_finished()));
        let sent = session.stats().frames_sent;
        sink.publish(Frame::new(vec![0; 16 * 12 * 4], 16, 12));
        thread::sleep(Duration::from_millis(300));
        assert_eq!(session.stats().frames_sent, sent);

        session.stop();
        server.join().unwrap();
    }

    #[test]
    fn stop_returns_while_upgrade_is_unanswered() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let session = start_stream_session(
            context(port),
            Arc::new(FixedToken("t")),
            sink_with_frame(),
            AnalysisStore::new(),
        );

        // accept the connection but never send the 101 response
        let (_silent, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_millis(150));
        assert!(!session.is_finished());

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            session.stop();
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn token_failure_never_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let session = start_stream_session(
            context(port),
            Arc::new(NoToken),
            sink_with_frame(),
            AnalysisStore::new(),
        );

        assert!(wait_until(Duration::from_secs(1), || session.is_finished()));
        listener.set_nonblocking(true).unwrap();
        let err = listener.accept().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
        assert_eq!(session.stats(), SessionStats::default());
    }
}
