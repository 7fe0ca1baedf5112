// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only
#![no_std]
#![no_main]

use aya_ebpf::{
    bindings::xdp_action,
    macros::{map, xdp},
    maps::PerCpuArray,
    programs::XdpContext,
};
use aya_log_ebpf::error;
use pkt_counter_common::{COUNTER_ENTRIES, COUNTER_KEY, PacketCount, Verdict, count_packet};

#[map]
static PKT_COUNT: PerCpuArray<PacketCount> = PerCpuArray::with_max_entries(COUNTER_ENTRIES, 0);

/// Counts every frame received on the attached interface and passes it on.
///
/// The frame is never read. A missing counter slot is logged and the frame
/// still gets `XDP_PASS`.
#[xdp]
pub fn count_packets(ctx: XdpContext) -> u32 {
    // the slot belongs to the current CPU, and XDP runs with preemption off
    let slot = PKT_COUNT
        .get_ptr_mut(COUNTER_KEY)
        .map(|count| unsafe { &mut *count });
    if slot.is_none() {
        error!(&ctx, "xdp: PKT_COUNT slot missing");
    }

    match count_packet(slot) {
        Verdict::Pass => xdp_action::XDP_PASS,
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[unsafe(link_section = "license")]
#[unsafe(no_mangle)]
static LICENSE: [u8; 4] = *b"GPL\0";
