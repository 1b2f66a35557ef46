//! The exchange pump: a single task owning the transport.
//!
//! The 9-pin link is half duplex with at most one outstanding request, so
//! all serialization lives here: one spawned task owns the
//! `Box<dyn Transport>` and processes requests from an mpsc channel one at
//! a time. Callers (host commands and the idle poller alike) go through a
//! cloneable [`IoHandle`] and get their response on a oneshot. A request
//! cannot interleave with another because nothing else can touch the
//! transport.

use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use vtr9pin_core::transport::Transport;
use vtr9pin_core::{Error, Result};

use crate::dispatch::EngineShared;
use crate::frame::{self, DecodeResult, Frame};

use std::sync::Arc;

/// Extra slack on top of the caller's timeout before the safety-net fires.
/// The IO task enforces the real deadline; this only catches a wedged task.
const REPLY_SAFETY_MARGIN: Duration = Duration::from_millis(500);

/// Read chunk size. Responses are at most a long-form frame, and the frame
/// assembler re-evaluates after every chunk, so small reads keep latency low
/// without a syscall per byte.
const READ_CHUNK: usize = 16;

/// Timing parameters for one request/response exchange.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IoConfig {
    /// How long the device may take to start and finish its response.
    pub response_budget: Duration,
    /// Extra slack for adapter and scheduler jitter on top of the budget.
    pub jitter_margin: Duration,
}

impl IoConfig {
    /// The receive deadline for one exchange.
    fn deadline(&self) -> Duration {
        self.response_budget + self.jitter_margin
    }
}

/// A request posted to the exchange pump.
pub(crate) enum Request {
    /// Send the encoded frame and await the device's response.
    Exchange {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<Frame>>,
    },
    /// Stop the pump and hand the transport back.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// Cloneable handle for submitting exchanges to the pump.
#[derive(Clone)]
pub(crate) struct IoHandle {
    cmd_tx: mpsc::Sender<Request>,
    shared: Arc<EngineShared>,
}

impl IoHandle {
    /// Submit one exchange and await its outcome.
    ///
    /// Accepting a request disarms the idle poll timer, and the timer stays
    /// down until the pump has drained every registered request, so a poll
    /// can never slip in ahead of a queued command. The `timeout` here is a
    /// safety net around the whole round trip; the per-byte receive deadline
    /// is the pump's [`IoConfig`].
    pub async fn exchange(&self, bytes: Vec<u8>, timeout: Duration) -> Result<Frame> {
        self.shared.begin_request();

        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Request::Exchange {
                bytes,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            // The pump never saw this request, so settle it here.
            self.shared.end_request();
            return Err(Error::NotConnected);
        }

        match tokio::time::timeout(timeout + REPLY_SAFETY_MARGIN, reply_rx).await {
            Ok(Ok(result)) => result,
            // The pump dropped our reply sender: it shut down mid-flight.
            Ok(Err(_)) => Err(Error::Cancelled),
            Err(_) => Err(Error::Timeout),
        }
    }
}

/// The spawned exchange pump and its control points.
pub(crate) struct MasterIo {
    pub handle: IoHandle,
    pub cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MasterIo {
    /// Stop the pump gracefully and take the transport back.
    ///
    /// A request already in flight completes first; requests queued behind
    /// the shutdown resolve as cancelled.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .handle
            .cmd_tx
            .send(Request::Shutdown { reply: reply_tx })
            .await
            .is_err()
        {
            // The pump already exited (fatal transport error). Nothing to
            // hand back.
            self.cancel.cancel();
            let _ = self.task.await;
            return Err(Error::NotConnected);
        }

        let transport = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = self.task.await;
        Ok(transport)
    }
}

/// Spawn the exchange pump over the given transport.
pub(crate) fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    shared: Arc<EngineShared>,
) -> MasterIo {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(io_loop(
        transport,
        config,
        shared.clone(),
        cmd_rx,
        cancel.clone(),
    ));

    MasterIo {
        handle: IoHandle { cmd_tx, shared },
        cancel,
        task,
    }
}

async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    shared: Arc<EngineShared>,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    debug!("exchange pump started");
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("exchange pump cancelled");
                break;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Request::Exchange { bytes, reply }) => {
                        let result = run_exchange(&mut *transport, &bytes, &config, &shared).await;
                        let fatal = matches!(
                            result,
                            Err(Error::ConnectionLost)
                                | Err(Error::Io(_))
                                | Err(Error::NotConnected)
                                | Err(Error::Transport(_))
                        );
                        let last_pending = shared.end_request();
                        if !fatal && last_pending {
                            // Re-arm after the queue drains, timeouts included,
                            // so polling resumes while the host idles. A request
                            // still queued keeps the timer down.
                            shared.arm_idle();
                        }
                        let _ = reply.send(result);
                        if fatal {
                            error!("transport error, exchange pump terminating");
                            shared.set_link_health(false);
                            shared.set_state(vtr9pin_core::types::ConnectionState::Disconnected).await;
                            break;
                        }
                    }
                    Some(Request::Shutdown { reply }) => {
                        debug!("exchange pump shutting down");
                        let _ = reply.send(transport);
                        return;
                    }
                    None => {
                        debug!("all handles dropped, exchange pump terminating");
                        break;
                    }
                }
            }
        }
    }
}

async fn run_exchange(
    transport: &mut dyn Transport,
    bytes: &[u8],
    config: &IoConfig,
    shared: &EngineShared,
) -> Result<Frame> {
    match execute_exchange(transport, bytes, config).await {
        Ok(frame) => {
            shared.set_link_health(true);
            shared.process_response(&frame).await?;
            Ok(frame)
        }
        Err(Error::Timeout) => {
            warn!(request = ?bytes, "no response within the timing budget");
            shared.set_link_health(false);
            Err(Error::Timeout)
        }
        Err(e) => Err(e),
    }
}

/// Run one send/receive cycle against the transport.
///
/// Stale receive buffers are discarded before the send, the response
/// deadline starts at the send, and bytes are fed to the frame assembler
/// as they arrive. An invalid frame start drops one byte and re-evaluates.
async fn execute_exchange(
    transport: &mut dyn Transport,
    bytes: &[u8],
    config: &IoConfig,
) -> Result<Frame> {
    transport.discard_buffers().await?;

    trace!(request = ?bytes, "sending");
    transport.send(bytes).await?;

    let deadline = Instant::now() + config.deadline();
    let mut acc = BytesMut::with_capacity(32);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout);
        }

        let n = transport.receive(&mut chunk, remaining).await?;
        if n == 0 {
            // End-of-file from the channel; the device side is gone.
            return Err(Error::ConnectionLost);
        }
        acc.put_slice(&chunk[..n]);

        loop {
            match frame::decode_frame(&acc) {
                DecodeResult::Frame(frame, consumed) => {
                    if acc.len() > consumed {
                        debug!(
                            leftover = acc.len() - consumed,
                            "dropping bytes received after a complete frame"
                        );
                    }
                    trace!(response = %frame, "received");
                    return Ok(frame);
                }
                DecodeResult::Incomplete => break,
                DecodeResult::Invalid => {
                    debug!("checksum mismatch, resynchronizing by one byte");
                    acc.advance(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;
    use vtr9pin_test_harness::MockTransport;

    fn test_config() -> IoConfig {
        // Wide budgets so scheduler hiccups cannot flake the tests; the
        // mock answers (or times out) immediately anyway.
        IoConfig {
            response_budget: Duration::from_millis(200),
            jitter_margin: Duration::from_millis(50),
        }
    }

    fn spawn(mock: MockTransport) -> (MasterIo, Arc<EngineShared>) {
        let (tx, _rx) = broadcast::channel(64);
        let shared = Arc::new(EngineShared::new(tx));
        let io = spawn_io_task(Box::new(mock), test_config(), shared.clone());
        (io, shared)
    }

    const CMD_TIMEOUT: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn exchange_resolves_with_decoded_frame() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x00, 0x11, 0x11], &[0x12, 0x11, 0x20, 0x25, 0x68]);
        let (io, _shared) = spawn(mock);

        let frame = io
            .handle
            .exchange(vec![0x00, 0x11, 0x11], CMD_TIMEOUT)
            .await
            .unwrap();
        assert!(frame.is_device_type());
        assert_eq!(frame.data, vec![0x20, 0x25]);

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn exchange_discards_buffers_before_sending() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x20, 0x00, 0x20], &[0x10, 0x01, 0x11]);
        let (io, _shared) = spawn(mock);

        io.handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await
            .unwrap();

        let transport = io.shutdown().await.unwrap();
        // Can't downcast through the trait object, but the mock's discard
        // already proved itself: a response armed by send() survives only
        // because discard runs before send, not after.
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn no_response_times_out_and_marks_link_unhealthy() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x20, 0x01, 0x21], &[]);
        let (io, shared) = spawn(mock);

        let result = io.handle.exchange(vec![0x20, 0x01, 0x21], CMD_TIMEOUT).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert!(!shared.link_healthy());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn successful_exchange_restores_link_health() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x20, 0x01, 0x21], &[]);
        mock.expect(&[0x20, 0x00, 0x20], &[0x10, 0x01, 0x11]);
        let (io, shared) = spawn(mock);

        let _ = io.handle.exchange(vec![0x20, 0x01, 0x21], CMD_TIMEOUT).await;
        assert!(!shared.link_healthy());

        io.handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await
            .unwrap();
        assert!(shared.link_healthy());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn garbage_prefix_resynchronizes_to_the_frame() {
        let mut mock = MockTransport::new();
        // 0x01 claims a 1-operand frame whose checksum fails; dropping it
        // leaves a clean ACK.
        mock.expect(&[0x20, 0x00, 0x20], &[0x01, 0x10, 0x01, 0x11]);
        let (io, _shared) = spawn(mock);

        let frame = io
            .handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await
            .unwrap();
        assert!(frame.is_ack());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn trailing_bytes_after_frame_are_dropped() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x20, 0x00, 0x20], &[0x10, 0x01, 0x11, 0xDE, 0xAD]);
        let (io, _shared) = spawn(mock);

        let frame = io
            .handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await
            .unwrap();
        assert!(frame.is_ack());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn nak_response_resolves_as_error() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x20, 0x02, 0x22], &[0x11, 0x12, 0x20, 0x43]);
        let (io, _shared) = spawn(mock);

        let result = io.handle.exchange(vec![0x20, 0x02, 0x22], CMD_TIMEOUT).await;
        match result {
            Err(Error::Nak(causes)) => assert!(causes.undefined_error()),
            other => panic!("expected Nak, got {other:?}"),
        }

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_exchanges_are_serialized() {
        let mut mock = MockTransport::new();
        // Two identical commands; the ordered expectation queue would
        // reject any split or interleaved write.
        mock.expect(&[0x20, 0x00, 0x20], &[0x10, 0x01, 0x11]);
        mock.expect(&[0x20, 0x00, 0x20], &[0x10, 0x01, 0x11]);
        let (io, _shared) = spawn(mock);

        let h1 = io.handle.clone();
        let h2 = io.handle.clone();
        let (r1, r2) = tokio::join!(
            h1.exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT),
            h2.exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT),
        );
        assert!(r1.unwrap().is_ack());
        assert!(r2.unwrap().is_ack());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn timed_out_exchange_does_not_consume_the_next_response() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x20, 0x01, 0x21], &[]);
        mock.expect(&[0x00, 0x11, 0x11], &[0x12, 0x11, 0x20, 0x25, 0x68]);
        let (io, _shared) = spawn(mock);

        let first = io.handle.exchange(vec![0x20, 0x01, 0x21], CMD_TIMEOUT).await;
        assert!(matches!(first, Err(Error::Timeout)));

        // The second exchange gets its own response, not a stale one, and
        // the first caller already resolved as Timeout.
        let second = io
            .handle
            .exchange(vec![0x00, 0x11, 0x11], CMD_TIMEOUT)
            .await
            .unwrap();
        assert!(second.is_device_type());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn exchange_disarms_idle_and_completion_rearms() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x20, 0x00, 0x20], &[0x10, 0x01, 0x11]);
        let (io, shared) = spawn(mock);

        assert!(!shared.idle_armed());
        io.handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await
            .unwrap();
        assert!(shared.idle_armed());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn queued_request_keeps_idle_disarmed() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x20, 0x00, 0x20], &[0x10, 0x01, 0x11]);
        mock.expect(&[0x20, 0x01, 0x21], &[0x10, 0x01, 0x11]);
        let (io, shared) = spawn(mock);

        // A second caller has been accepted but not yet served.
        shared.begin_request();

        io.handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await
            .unwrap();
        // The first exchange resolving must not arm the timer while the
        // other request is still outstanding.
        assert!(!shared.idle_armed());
        assert!(shared.end_request());

        // With the queue actually drained, the next exchange re-arms.
        io.handle
            .exchange(vec![0x20, 0x01, 0x21], CMD_TIMEOUT)
            .await
            .unwrap();
        assert!(shared.idle_armed());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn timeout_still_rearms_idle() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x20, 0x00, 0x20], &[]);
        let (io, shared) = spawn(mock);

        let _ = io.handle.exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT).await;
        assert!(shared.idle_armed());

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_returns_the_transport() {
        let mock = MockTransport::new();
        let (io, _shared) = spawn(mock);

        let transport = io.shutdown().await.unwrap();
        assert!(transport.is_connected());
    }

    /// A transport whose read side has hit end-of-file: sends succeed but
    /// every receive returns zero bytes.
    struct EofTransport;

    #[async_trait::async_trait]
    impl vtr9pin_core::Transport for EofTransport {
        async fn send(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        async fn receive(&mut self, _buf: &mut [u8], _timeout: Duration) -> Result<usize> {
            Ok(0)
        }

        async fn discard_buffers(&mut self) -> Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn zero_length_read_is_connection_lost() {
        let (tx, _rx) = broadcast::channel(64);
        let shared = Arc::new(EngineShared::new(tx));
        let io = spawn_io_task(Box::new(EofTransport), test_config(), shared.clone());

        let result = io
            .handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await;
        assert!(matches!(result, Err(Error::ConnectionLost)));

        // End-of-file is fatal: the pump terminates rather than spinning
        // until the deadline. Depending on when the send lands relative to
        // the pump winding down, the follow-up resolves as not-connected or
        // cancelled.
        let next = io
            .handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await;
        assert!(matches!(
            next,
            Err(Error::NotConnected) | Err(Error::Cancelled)
        ));
    }

    #[tokio::test]
    async fn exchange_after_fatal_error_reports_not_connected() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        let (io, _shared) = spawn(mock);

        // First exchange hits the dead transport; the pump terminates.
        let first = io
            .handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await;
        assert!(matches!(first, Err(Error::NotConnected)));

        // The pump is gone (or going); the request cannot be served.
        let second = io
            .handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await;
        assert!(matches!(
            second,
            Err(Error::NotConnected) | Err(Error::Cancelled)
        ));
    }

    #[tokio::test]
    async fn fatal_error_moves_state_to_disconnected() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        let (io, shared) = spawn(mock);
        shared
            .set_state(vtr9pin_core::types::ConnectionState::Connected)
            .await;

        let _ = io
            .handle
            .exchange(vec![0x20, 0x00, 0x20], CMD_TIMEOUT)
            .await;

        // Give the pump a beat to run its termination path.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            shared.connection_state().await,
            vtr9pin_core::types::ConnectionState::Disconnected
        );
    }
}
