//! Address ranges, the router that maps a packet to its owning channel (C4),
//! and the aggregator that unions channel ranges for upstream advertisement
//! (C7).

use crate::packet::ChannelId;

/// A closed interval of addresses: `[start, end]`, both inclusive.
///
/// Both the timing router and the functional pass-through route through this
/// one `contains` implementation, so a boundary address can never be routed
/// one way by a timing request and a different way by a functional access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
}

impl AddressRange {
    /// Constructs a half-open `[start, end)` range, storing it internally as
    /// the inclusive `[start, end - 1]` this type works with.
    ///
    /// # Panics
    /// Panics if `end <= start`.
    pub fn new(start: u64, end: u64) -> Self {
        assert!(end > start, "address range end must be greater than start");
        Self {
            start,
            end: end - 1,
        }
    }

    /// Constructs a closed `[start, end]` range directly.
    pub fn inclusive(start: u64, end: u64) -> Self {
        assert!(end >= start, "address range end must not precede start");
        Self { start, end }
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr <= self.end
    }
}

/// Maps packet addresses to the channel that owns them (C4).
///
/// Built from the address ranges each channel advertises. Ties (overlapping
/// ranges) resolve to the lowest channel id, matching the aggregator's
/// tolerance for overlaps in §4.7.
#[derive(Debug, Default)]
pub struct Router {
    /// `(range, channel_id)` pairs kept in channel-id order so that ties
    /// resolve deterministically to the lowest index without an explicit
    /// stable-sort step.
    entries: Vec<(AddressRange, ChannelId)>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuilds the router from each channel's currently advertised ranges.
    /// `ranges_by_channel[i]` is the range list for channel id `i`.
    pub fn rebuild(&mut self, ranges_by_channel: &[Vec<AddressRange>]) {
        self.entries.clear();
        for (channel_id, ranges) in ranges_by_channel.iter().enumerate() {
            for range in ranges {
                self.entries.push((*range, channel_id));
            }
        }
    }

    /// Returns the channel owning `addr`, or `None` if no channel's
    /// advertised range contains it — a configuration error the caller must
    /// treat as fatal per the error handling design.
    pub fn route(&self, addr: u64) -> Option<ChannelId> {
        self.entries
            .iter()
            .filter(|(range, _)| range.contains(addr))
            .map(|(_, channel_id)| *channel_id)
            .min()
    }
}

/// Unions downstream channel ranges for upstream advertisement (C7).
///
/// Overlaps are permitted in the aggregate list; the router's determinism
/// handles arbitration between overlapping channels.
pub fn aggregate_ranges(ranges_by_channel: &[Vec<AddressRange>]) -> Vec<AddressRange> {
    ranges_by_channel.iter().flatten().copied().collect()
}
