//! Event loop driving a device over a bus client.
//!
//! [`HomieRuntime`] ties the pieces together: it owns the bus client, borrows
//! the device and a value-update receiver, and multiplexes three event
//! sources (bus events, the refresh ticker, application value pushes) onto
//! the device's synchronous handlers. Operations the handlers queue are
//! flushed to the bus in FIFO order after every dispatch, so the announcement
//! reaches the broker as one uninterrupted sequence.
//!
//! Bus errors are propagated out of [`HomieRuntime::run`]; reconnect policy
//! belongs to the caller, which typically rebuilds the bus client and a fresh
//! runtime around the same device.

use embassy_futures::select::{Either3, select3};
use embassy_time::{Duration, Instant, Ticker};

use crate::bus::{BusClient, BusEvent, BusOp, BusQueue};
use crate::device::HomieDevice;
use crate::publisher::ValueUpdateReceiver;

/// Drives a [`HomieDevice`] over a [`BusClient`].
///
/// # Type Parameters
///
/// - `MAX_NODES`: node capacity of the borrowed device.
/// - `QUEUE_DEPTH`: bus operation buffer; must hold one full announcement
///   (14 device-level operations plus 8 per sensor node and 9 per switch
///   node).
/// - `PAYLOAD_SIZE`: longest queued payload text. The `$nodes` list is the
///   longest payload a device publishes.
/// - `UPDATE_DEPTH`: depth of the value-update channel.
///
/// # Example
///
/// ```ignore
/// static UPDATES: ValueUpdateChannel<4> = Channel::new();
///
/// let mut runtime: HomieRuntime<'_, '_, _, 8, 96, 320, 4> =
///     HomieRuntime::new(bus, &mut device, UPDATES.receiver());
/// runtime.run().await?;
/// ```
pub struct HomieRuntime<
    'a,
    'n,
    B,
    const MAX_NODES: usize,
    const QUEUE_DEPTH: usize,
    const PAYLOAD_SIZE: usize,
    const UPDATE_DEPTH: usize,
> where
    B: BusClient,
{
    bus: B,
    device: &'a mut HomieDevice<'n, MAX_NODES>,
    updates: ValueUpdateReceiver<'a, UPDATE_DEPTH>,
    queue: BusQueue<QUEUE_DEPTH, PAYLOAD_SIZE>,
    started_at: Instant,
    tick_period: Duration,
}

impl<
    'a,
    'n,
    B,
    const MAX_NODES: usize,
    const QUEUE_DEPTH: usize,
    const PAYLOAD_SIZE: usize,
    const UPDATE_DEPTH: usize,
> HomieRuntime<'a, 'n, B, MAX_NODES, QUEUE_DEPTH, PAYLOAD_SIZE, UPDATE_DEPTH>
where
    B: BusClient,
{
    /// Creates a runtime around a bus client, a device and the receiving end
    /// of a value-update channel.
    ///
    /// Uptime starts counting here; the refresh ticker period is derived
    /// from the device's configured update interval.
    pub fn new(
        bus: B,
        device: &'a mut HomieDevice<'n, MAX_NODES>,
        updates: ValueUpdateReceiver<'a, UPDATE_DEPTH>,
    ) -> Self {
        let tick_period = tick_period(device.update_interval());
        Self {
            bus,
            device,
            updates,
            queue: BusQueue::new(),
            started_at: Instant::now(),
            tick_period,
        }
    }

    /// The bus client this runtime drives.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Runs the event loop until the bus reports an error.
    ///
    /// Each iteration waits for one event, dispatches it to the device and
    /// flushes the queued bus operations. Handlers run to completion before
    /// the next event is taken, so the announcement sequence is never
    /// interleaved with ticks or inbound messages.
    pub async fn run(&mut self) -> Result<(), B::Error> {
        let mut ticker = Ticker::every(self.tick_period);
        loop {
            match select3(self.bus.poll(), ticker.next(), self.updates.receive()).await {
                Either3::First(event) => match event? {
                    BusEvent::Connected => {
                        let uptime = round_secs(self.started_at.elapsed());
                        self.device.handle_connected(uptime, &mut self.queue);
                    }
                    BusEvent::Disconnected => {
                        self.queue.clear();
                        self.device.handle_disconnected();
                    }
                    BusEvent::Message { topic, payload } => {
                        self.device.handle_message(topic, payload);
                    }
                },
                Either3::Second(()) => {
                    if self.bus.is_connected() {
                        let uptime = round_secs(self.started_at.elapsed());
                        self.device.handle_tick(uptime, &mut self.queue);
                    }
                }
                Either3::Third(update) => {
                    if self.bus.is_connected() {
                        self.device
                            .handle_push(update.node, update.value, &mut self.queue);
                    } else {
                        debug!("bus disconnected, dropping value update");
                    }
                }
            }
            self.flush().await?;
        }
    }

    /// Delivers queued operations to the bus in the order they were queued.
    async fn flush(&mut self) -> Result<(), B::Error> {
        while let Some(op) = self.queue.pop_front() {
            match op {
                BusOp::Publish {
                    topic,
                    payload,
                    qos,
                    retain,
                } => {
                    self.bus
                        .publish(&topic, payload.as_bytes(), qos, retain)
                        .await?;
                }
                BusOp::Subscribe { topic } => {
                    self.bus.subscribe(&topic).await?;
                }
            }
        }
        Ok(())
    }
}

fn tick_period(interval_s: u32) -> Duration {
    Duration::from_millis(u64::from(interval_s) * 500)
}

fn round_secs(elapsed: Duration) -> u32 {
    ((elapsed.as_millis() + 500) / 1000) as u32
}
