//! The scheduler instance itself: owns every buffer, cursor and port, and
//! exposes the external interfaces enumerated in §6.
//!
//! Every public method here corresponds either to an inbound port callback
//! (`recv_*`, `get_address_ranges`) or to one of the two scheduled events the
//! scheduler owns (`fire_arbiter`, `fire_response_pump`). Per §5, a handler
//! may schedule future events but must never recursively invoke another
//! handler; the methods below only ever call out to ports directly or to
//! `EventScheduler::schedule`, never to each other.

use std::collections::BTreeMap;

use memsched_util::{debug, info, warn};

use crate::arbiter::Arbiter;
use crate::buffers::Buffers;
use crate::config::Config;
use crate::event::{EventScheduler, SchedulerEvent};
use crate::packet::{ChannelId, Kind, Packet, RequestorId, Tick};
use crate::port::{ChannelPortState, DownstreamPort, RequestorPortState, UpstreamPort};
use crate::range::{self, AddressRange, Router};
use crate::response_pump::{self, PumpOutcome};

/// The multi-requestor memory request scheduler.
///
/// Construct with [`Scheduler::new`], wire `nbr_cpus` upstream and
/// `nbr_channels` downstream port implementations, then drive it purely
/// through the `recv_*`/`fire_*` methods from the host simulator's port
/// callbacks and event loop.
pub struct Scheduler {
    config: Config,
    buffers: Buffers,
    router: Router,
    arbiter: Arbiter,
    requestors: BTreeMap<RequestorId, RequestorPortState>,
    channels: BTreeMap<ChannelId, ChannelPortState>,
    arbiter_scheduled: bool,
    pump_scheduled: bool,
}

impl Scheduler {
    /// Builds a scheduler with `config.nbr_cpus` upstream ports and
    /// `config.nbr_channels` downstream ports, populating the retry table
    /// (the requestor-id → port map) from the static port layout up front,
    /// per the design note on retry-table population timing — there is no
    /// lazy registration path.
    ///
    /// # Panics
    /// Panics if `upstreams.len() != config.nbr_cpus` or
    /// `downstreams.len() != config.nbr_channels`: a port-count mismatch
    /// between the configuration and the port list handed to the scheduler
    /// is a broken machine description, exactly like a zero buffer size.
    pub fn new(
        config: Config,
        upstreams: Vec<Box<dyn UpstreamPort>>,
        downstreams: Vec<Box<dyn DownstreamPort>>,
    ) -> Self {
        assert_eq!(
            upstreams.len(),
            config.nbr_cpus,
            "configuration error: nbr_cpus = {} but {} upstream ports were supplied",
            config.nbr_cpus,
            upstreams.len()
        );
        assert_eq!(
            downstreams.len(),
            config.nbr_channels,
            "configuration error: nbr_channels = {} but {} downstream ports were supplied",
            config.nbr_channels,
            downstreams.len()
        );

        let requestors: BTreeMap<RequestorId, RequestorPortState> = upstreams
            .into_iter()
            .enumerate()
            .map(|(id, upstream)| (id, RequestorPortState::new(id, upstream)))
            .collect();
        let channels: BTreeMap<ChannelId, ChannelPortState> = downstreams
            .into_iter()
            .enumerate()
            .map(|(id, downstream)| (id, ChannelPortState::new(id, downstream)))
            .collect();

        info!(
            "memsched: constructed with {} requestor port(s), {} channel port(s), read/write/resp buffers = {}/{}/{}",
            config.nbr_cpus,
            config.nbr_channels,
            config.read_buffer_size,
            config.write_buffer_size,
            config.resp_buffer_size,
        );

        let mut scheduler = Self {
            buffers: Buffers::new(
                config.read_buffer_size,
                config.write_buffer_size,
                config.resp_buffer_size,
            ),
            config,
            router: Router::new(),
            arbiter: Arbiter::new(),
            requestors,
            channels,
            arbiter_scheduled: false,
            pump_scheduled: false,
        };
        scheduler.rebuild_router();
        scheduler
    }

    fn rebuild_router(&mut self) {
        let ranges_by_channel: Vec<Vec<AddressRange>> = self
            .channels
            .values()
            .map(|channel| channel.address_ranges())
            .collect();
        self.router.rebuild(&ranges_by_channel);
    }

    /// §4.1 `receive_request` / §4.4 `ingress`, minus step 1 (the retry
    /// table is populated at construction, see [`Scheduler::new`]).
    pub fn recv_timing_request(
        &mut self,
        sink: &mut dyn EventScheduler,
        now: Tick,
        requestor_id: RequestorId,
        pkt: Packet,
    ) -> bool {
        debug_assert_eq!(pkt.requestor_id, requestor_id);

        if !self.buffers.try_enqueue(pkt) {
            if let Some(requestor) = self.requestors.get_mut(&requestor_id) {
                requestor.mark_needs_retry();
            }
            warn!(
                "requestor {}: ingress refused for {:?} at {:#x} (buffer full)",
                requestor_id,
                pkt.kind,
                pkt.address
            );
            return false;
        }

        debug!(
            "requestor {}: accepted {:?} at {:#x}",
            requestor_id,
            pkt.kind,
            pkt.address
        );

        if !self.arbiter_scheduled {
            self.arbiter.request_priming(pkt.kind, requestor_id);
            sink.schedule(now, SchedulerEvent::Arbiter);
            self.arbiter_scheduled = true;
        }

        true
    }

    /// §4.1 `receive_functional` / §6 functional pass-through (S6): routes
    /// and forwards without touching any queue or scheduling any event.
    pub fn recv_functional(&mut self, pkt: Packet) {
        let channel_id = self.router.route(pkt.address).unwrap_or_else(|| {
            panic!(
                "configuration error: functional access to {:#x} matches no channel's advertised range",
                pkt.address
            )
        });
        let channel = self
            .channels
            .get_mut(&channel_id)
            .expect("router referenced a channel id with no registered port");
        channel.send_functional(pkt);
    }

    /// §4.1/§6 `get_address_ranges`: the aggregate of every downstream
    /// channel's advertised ranges (C7).
    pub fn get_address_ranges(&self) -> Vec<AddressRange> {
        let ranges_by_channel: Vec<Vec<AddressRange>> = self
            .channels
            .values()
            .map(|channel| channel.address_ranges())
            .collect();
        range::aggregate_ranges(&ranges_by_channel)
    }

    /// §6 `recv_response_retry`: clears the requestor's response-side block
    /// and re-arms the response pump. Scheduling rather than calling the
    /// pump directly keeps this handler from recursively invoking another
    /// handler (§5).
    pub fn recv_response_retry(&mut self, sink: &mut dyn EventScheduler, now: Tick, requestor_id: RequestorId) {
        if let Some(requestor) = self.requestors.get_mut(&requestor_id) {
            requestor.clear_resp_blocked();
        }
        if !self.pump_scheduled {
            sink.schedule(now, SchedulerEvent::ResponsePump);
            self.pump_scheduled = true;
        }
    }

    /// §4.2 `receive_response` / §4.6 response ingress.
    pub fn recv_timing_response(
        &mut self,
        sink: &mut dyn EventScheduler,
        now: Tick,
        _channel_id: ChannelId,
        pkt: Packet,
    ) -> bool {
        if !self.buffers.try_enqueue_response(pkt) {
            warn!(
                "channel: response ingress refused for requestor {} at {:#x} (response buffer full)",
                pkt.requestor_id,
                pkt.address
            );
            return false;
        }
        if !self.pump_scheduled {
            sink.schedule(now, SchedulerEvent::ResponsePump);
            self.pump_scheduled = true;
        }
        true
    }

    /// §4.2 `on_downstream_retry`. The recorded source is peeked rather than
    /// popped up front and only popped once `send` actually succeeds, so a
    /// channel that signals retry but refuses again still leaves exactly one
    /// packet accounted for instead of being silently dropped.
    ///
    /// Per §4.5's re-dispatch policy ("Forward progress resumes when any
    /// `on_downstream_retry` ... happens and re-arms the event"), this also
    /// re-arms the arbiter if it was disarmed: the arbiter may have given up
    /// on a full cursor revolution while this channel was blocked, stranding
    /// every other requestor's queued packets (including ones enqueued after
    /// the arbiter gave up) until something re-schedules it.
    pub fn recv_request_retry(&mut self, sink: &mut dyn EventScheduler, now: Tick, channel_id: ChannelId) {
        let channel = self
            .channels
            .get_mut(&channel_id)
            .unwrap_or_else(|| panic!("recv_request_retry for unregistered channel {}", channel_id));
        let source = channel.take_blocked_source();

        let pkt = *self
            .buffers
            .peek_front(source.kind, source.requestor_id)
            .unwrap_or_else(|| {
                panic!(
                    "protocol invariant violation: channel {} retried but its recorded source ({:?}, requestor {}) has no queued packet",
                    channel_id, source.kind, source.requestor_id
                )
            });

        if channel.send(pkt, source) {
            let (_, cleared) = self
                .buffers
                .pop_for_dispatch(source.kind, source.requestor_id)
                .expect("packet just peeked must still be at the queue head");
            if cleared {
                if let Some(requestor) = self.requestors.get_mut(&source.requestor_id) {
                    requestor.try_send_retry();
                }
            }
        }

        if !self.arbiter_scheduled {
            sink.schedule(now, SchedulerEvent::Arbiter);
            self.arbiter_scheduled = true;
        }
    }

    /// §4.2 `on_range_change` / §4.7 `propagate_range_change`.
    pub fn recv_range_change(&mut self, _channel_id: ChannelId) {
        self.rebuild_router();
        for requestor in self.requestors.values_mut() {
            requestor.send_range_change();
        }
    }

    /// The arbiter's scheduled-event handler (§4.5). Services at most one
    /// read dispatch, then — only if the read class made no progress — at
    /// most one write dispatch, per firing (see the design note on writes
    /// vs. reads).
    pub fn fire_arbiter(&mut self, sink: &mut dyn EventScheduler, now: Tick) {
        self.arbiter_scheduled = false;

        let read_dispatched = self.arbiter.dispatch_class(
            Kind::Read,
            &mut self.buffers,
            &self.router,
            &mut self.channels,
            &mut self.requestors,
        );
        let dispatched = read_dispatched
            || self.arbiter.dispatch_class(
                Kind::Write,
                &mut self.buffers,
                &self.router,
                &mut self.channels,
                &mut self.requestors,
            );

        if dispatched {
            sink.schedule(now + self.config.service_interval, SchedulerEvent::Arbiter);
            self.arbiter_scheduled = true;
        }
    }

    /// The response pump's scheduled-event handler (§4.6).
    pub fn fire_response_pump(&mut self, sink: &mut dyn EventScheduler, now: Tick) {
        self.pump_scheduled = false;

        if let PumpOutcome::Dispatched = response_pump::fire(&mut self.buffers, &mut self.requestors) {
            if self.buffers.resp_len() > 0 {
                sink.schedule(now + self.config.response_interval, SchedulerEvent::ResponsePump);
                self.pump_scheduled = true;
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
