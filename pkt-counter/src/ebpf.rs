// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use aya::{
    Ebpf,
    maps::PerCpuArray,
    programs::{Xdp, XdpFlags, xdp::XdpLinkId},
};
use aya_log::EbpfLogger;
use log::{debug, info, warn};
use pkt_counter_common::{COUNTER_KEY, COUNTER_MAP, PROGRAM_NAME, PacketCount};
use pnet::datalink;

use crate::{
    config::XdpMode,
    datapath::{Datapath, Interface, sum_per_cpu},
    error::{Cause, CounterError, Hinted},
};

const SKB_MODE_HINT: &str = "the driver may lack native XDP support, try `--mode skb`";

impl From<XdpMode> for XdpFlags {
    fn from(mode: XdpMode) -> Self {
        match mode {
            XdpMode::Default => XdpFlags::default(),
            XdpMode::Skb => XdpFlags::SKB_MODE,
            XdpMode::Drv => XdpFlags::DRV_MODE,
            XdpMode::Hw => XdpFlags::HW_MODE,
        }
    }
}

/// [`Datapath`] backed by the real kernel through aya.
pub struct AyaDatapath {
    mode: XdpMode,
}

impl AyaDatapath {
    pub fn new(mode: XdpMode) -> Self {
        Self { mode }
    }
}

fn xdp_program(ebpf: &mut Ebpf) -> Result<&mut Xdp, Cause> {
    let program = ebpf
        .program_mut(PROGRAM_NAME)
        .ok_or_else(|| format!("program {PROGRAM_NAME} not found in object"))?;
    Ok(program.try_into()?)
}

impl Datapath for AyaDatapath {
    type Loaded = Ebpf;
    type Link = XdpLinkId;

    fn load(&mut self) -> Result<Ebpf, CounterError> {
        let mut ebpf = Ebpf::load(aya::include_bytes_aligned!(concat!(
            env!("OUT_DIR"),
            "/pkt-counter-xdp"
        )))
        .map_err(|e| CounterError::Load(e.into()))?;

        if let Err(e) = EbpfLogger::init(&mut ebpf) {
            warn!("failed to initialize XDP eBPF logger: {e}");
        }

        let program = xdp_program(&mut ebpf).map_err(CounterError::Load)?;
        program.load().map_err(|e| CounterError::Load(e.into()))?;
        Ok(ebpf)
    }

    fn resolve(&self, name: &str) -> Result<Interface, CounterError> {
        get_interface(name)
    }

    fn attach(&mut self, ebpf: &mut Ebpf, iface: &Interface) -> Result<XdpLinkId, CounterError> {
        let attach_error = |source: Cause| CounterError::Attach {
            iface: iface.name.clone(),
            source,
        };

        let program = xdp_program(ebpf).map_err(attach_error)?;
        let link = program
            .attach_to_if_index(iface.index, self.mode.into())
            .map_err(|e| attach_error(with_mode_hint(self.mode, e.into())))?;
        info!("XDP: Start");
        Ok(link)
    }

    fn read_counter(&self, ebpf: &Ebpf) -> Result<u64, CounterError> {
        let map = ebpf
            .map(COUNTER_MAP)
            .ok_or_else(|| CounterError::Lookup(format!("map {COUNTER_MAP} not found").into()))?;
        let counter: PerCpuArray<_, PacketCount> =
            PerCpuArray::try_from(map).map_err(|e| CounterError::Lookup(e.into()))?;
        let values = counter
            .get(&COUNTER_KEY, 0)
            .map_err(|e| CounterError::Lookup(e.into()))?;
        Ok(sum_per_cpu(&values))
    }

    fn detach(&mut self, ebpf: &mut Ebpf, link: XdpLinkId) -> Result<(), CounterError> {
        let teardown_error = |source: Cause| CounterError::Teardown {
            op: "detach",
            source,
        };
        let program = xdp_program(ebpf).map_err(teardown_error)?;
        program.detach(link).map_err(|e| teardown_error(e.into()))
    }

    fn unload(&mut self, mut ebpf: Ebpf) -> Result<(), CounterError> {
        let teardown_error = |source: Cause| CounterError::Teardown {
            op: "unload",
            source,
        };
        let program = xdp_program(&mut ebpf).map_err(teardown_error)?;
        program.unload().map_err(|e| teardown_error(e.into()))?;
        debug!("XDP: releasing {COUNTER_MAP}");
        drop(ebpf);
        Ok(())
    }
}

/// Non-skb attach failures usually mean the driver has no native XDP.
fn with_mode_hint(mode: XdpMode, source: Cause) -> Cause {
    match mode {
        XdpMode::Skb => source,
        _ => Box::new(Hinted {
            source,
            hint: SKB_MODE_HINT,
        }),
    }
}

pub fn get_interface(name: &str) -> Result<Interface, CounterError> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .map(|iface| Interface {
            name: iface.name,
            index: iface.index,
        })
        .ok_or_else(|| CounterError::Resolve {
            iface: name.to_string(),
            source: "no interface with this name".into(),
        })
}

/// Lifts the locked memory limit for kernels without memcg based accounting
/// (before 5.11). Failure is not fatal.
pub fn bump_memlock_rlimit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {ret}");
    }
}
