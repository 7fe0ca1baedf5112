// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

//! Layout of the counter map shared by the XDP program and the loader.
//!
//! The map is a per-CPU array with a single slot. Every CPU increments its own
//! copy of slot [`COUNTER_KEY`], so the kernel side needs no atomic
//! instruction; the loader sums the copies when it reads.

#![no_std]

/// Name of the XDP program inside the compiled object.
pub const PROGRAM_NAME: &str = "count_packets";

/// Name of the counter map inside the compiled object.
pub const COUNTER_MAP: &str = "PKT_COUNT";

/// The only key of the counter map.
pub const COUNTER_KEY: u32 = 0;

/// The counter map holds exactly one entry and is never resized.
pub const COUNTER_ENTRIES: u32 = 1;

/// Value type stored per CPU under [`COUNTER_KEY`].
pub type PacketCount = u64;

/// What happens to a frame after it was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the frame to the regular receive path.
    Pass,
}

/// Bumps this CPU's copy of the counter, if the slot was found.
///
/// The frame is passed in every case; a missing slot never costs a packet.
#[inline(always)]
pub fn count_packet(slot: Option<&mut PacketCount>) -> Verdict {
    if let Some(count) = slot {
        *count = count.wrapping_add(1);
    }
    Verdict::Pass
}
