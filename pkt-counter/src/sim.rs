// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

//! In-memory stand-in for the kernel, used by the tests.
//!
//! The counter map is one slot per CPU. A CPU only ever writes its own slot,
//! with a plain load and store, the same way the XDP program bumps its
//! per-CPU copy.

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
};

use pkt_counter_common::{Verdict, count_packet};

use crate::{
    datapath::{Datapath, Interface, sum_per_cpu},
    error::CounterError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Load,
    Resolve,
    Attach,
    Detach,
    Unload,
}

type CounterMap = Arc<[AtomicU64]>;

/// Runs the XDP program's counting step against one simulated CPU slot.
pub fn run_on_slot(slot: Option<&AtomicU64>) -> Verdict {
    match slot {
        Some(slot) => {
            let mut count = slot.load(Ordering::Relaxed);
            let verdict = count_packet(Some(&mut count));
            slot.store(count, Ordering::Relaxed);
            verdict
        }
        None => count_packet(None),
    }
}

struct Inner {
    cpus: usize,
    map: Mutex<Option<CounterMap>>,
    attached: Mutex<Option<u32>>,
    journal: Mutex<Vec<Op>>,
}

#[derive(Clone)]
pub struct SimKernel(Arc<Inner>);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimKernel {
    pub fn new(cpus: usize) -> Self {
        SimKernel(Arc::new(Inner {
            cpus,
            map: Mutex::new(None),
            attached: Mutex::new(None),
            journal: Mutex::new(Vec::new()),
        }))
    }

    /// Delivers `packets` frames on `cpu` to whatever is attached.
    pub fn deliver(&self, cpu: usize, packets: u64) -> Vec<Verdict> {
        let map = match *lock(&self.0.attached) {
            Some(_) => lock(&self.0.map).clone(),
            None => None,
        };
        let slot = map.as_deref().and_then(|slots| slots.get(cpu));
        (0..packets).map(|_| run_on_slot(slot)).collect()
    }

    pub fn attached(&self) -> Option<u32> {
        *lock(&self.0.attached)
    }

    pub fn is_loaded(&self) -> bool {
        lock(&self.0.map).is_some()
    }

    pub fn journal(&self) -> Vec<Op> {
        lock(&self.0.journal).clone()
    }

    /// Someone else removed our XDP link.
    pub fn force_detach(&self) {
        *lock(&self.0.attached) = None;
    }

    /// The counter map disappeared underneath the loader.
    pub fn drop_map(&self) {
        *lock(&self.0.map) = None;
    }

    fn record(&self, op: Op) {
        lock(&self.0.journal).push(op);
    }
}

pub struct SimLink {
    ifindex: u32,
}

pub struct SimDatapath {
    kernel: SimKernel,
    interfaces: Vec<Interface>,
    fail_load: bool,
    fail_attach: bool,
}

impl SimDatapath {
    pub fn new(kernel: SimKernel) -> Self {
        SimDatapath {
            kernel,
            interfaces: Vec::new(),
            fail_load: false,
            fail_attach: false,
        }
    }

    pub fn with_interface(mut self, name: &str, index: u32) -> Self {
        self.interfaces.push(Interface {
            name: name.to_string(),
            index,
        });
        self
    }

    pub fn fail_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn fail_attach(mut self) -> Self {
        self.fail_attach = true;
        self
    }
}

impl Datapath for SimDatapath {
    type Loaded = CounterMap;
    type Link = SimLink;

    fn load(&mut self) -> Result<CounterMap, CounterError> {
        self.kernel.record(Op::Load);
        if self.fail_load {
            return Err(CounterError::Load("verifier rejected program".into()));
        }

        let map: CounterMap = (0..self.kernel.0.cpus).map(|_| AtomicU64::new(0)).collect();
        *lock(&self.kernel.0.map) = Some(map.clone());
        Ok(map)
    }

    fn resolve(&self, name: &str) -> Result<Interface, CounterError> {
        self.kernel.record(Op::Resolve);
        self.interfaces
            .iter()
            .find(|iface| iface.name == name)
            .cloned()
            .ok_or_else(|| CounterError::Resolve {
                iface: name.to_string(),
                source: "no such device".into(),
            })
    }

    fn attach(
        &mut self,
        _loaded: &mut CounterMap,
        iface: &Interface,
    ) -> Result<SimLink, CounterError> {
        self.kernel.record(Op::Attach);
        let mut attached = lock(&self.kernel.0.attached);
        if self.fail_attach || attached.is_some() {
            return Err(CounterError::Attach {
                iface: iface.name.clone(),
                source: "device or resource busy".into(),
            });
        }

        *attached = Some(iface.index);
        Ok(SimLink {
            ifindex: iface.index,
        })
    }

    fn read_counter(&self, loaded: &CounterMap) -> Result<u64, CounterError> {
        match lock(&self.kernel.0.map).as_ref() {
            Some(map) if Arc::ptr_eq(map, loaded) => {
                let values: Vec<u64> = map.iter().map(|v| v.load(Ordering::Relaxed)).collect();
                Ok(sum_per_cpu(&values))
            }
            _ => Err(CounterError::Lookup("no such map".into())),
        }
    }

    fn detach(&mut self, _loaded: &mut CounterMap, link: SimLink) -> Result<(), CounterError> {
        self.kernel.record(Op::Detach);
        let mut attached = lock(&self.kernel.0.attached);
        if *attached != Some(link.ifindex) {
            return Err(CounterError::Teardown {
                op: "detach",
                source: "link not found".into(),
            });
        }

        *attached = None;
        Ok(())
    }

    fn unload(&mut self, loaded: CounterMap) -> Result<(), CounterError> {
        self.kernel.record(Op::Unload);
        let mut map = lock(&self.kernel.0.map);
        match map.as_ref() {
            Some(current) if Arc::ptr_eq(current, &loaded) => {
                *map = None;
                Ok(())
            }
            _ => Err(CounterError::Teardown {
                op: "unload",
                source: "map already released".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_always_passes_the_frame() {
        let slot = AtomicU64::new(0);
        assert_eq!(run_on_slot(Some(&slot)), Verdict::Pass);
        assert_eq!(slot.load(Ordering::Relaxed), 1);
        assert_eq!(run_on_slot(None), Verdict::Pass);
    }

    #[test]
    fn nothing_is_counted_when_detached() {
        let kernel = SimKernel::new(1);
        let mut datapath = SimDatapath::new(kernel.clone()).with_interface("test0", 3);
        let mut map = datapath.load().unwrap();
        let iface = datapath.resolve("test0").unwrap();
        let link = datapath.attach(&mut map, &iface).unwrap();

        kernel.deliver(0, 4);
        datapath.detach(&mut map, link).unwrap();
        let verdicts = kernel.deliver(0, 4);

        assert!(verdicts.iter().all(|v| *v == Verdict::Pass));
        assert_eq!(datapath.read_counter(&map).unwrap(), 4);
    }

    #[test]
    fn second_attach_is_refused() {
        let kernel = SimKernel::new(1);
        let mut datapath = SimDatapath::new(kernel.clone()).with_interface("test0", 3);
        let mut map = datapath.load().unwrap();
        let iface = datapath.resolve("test0").unwrap();
        let _link = datapath.attach(&mut map, &iface).unwrap();

        assert!(matches!(
            datapath.attach(&mut map, &iface),
            Err(CounterError::Attach { .. })
        ));
    }

    #[test]
    fn repeated_release_reports_instead_of_panicking() {
        let kernel = SimKernel::new(1);
        let mut datapath = SimDatapath::new(kernel.clone()).with_interface("test0", 3);
        let mut map = datapath.load().unwrap();
        let iface = datapath.resolve("test0").unwrap();
        let link = datapath.attach(&mut map, &iface).unwrap();

        datapath.detach(&mut map, link).unwrap();
        let stale = SimLink { ifindex: 3 };
        assert!(datapath.detach(&mut map, stale).is_err());

        datapath.unload(map.clone()).unwrap();
        assert!(datapath.unload(map.clone()).is_err());
        assert!(matches!(
            datapath.read_counter(&map),
            Err(CounterError::Lookup(_))
        ));
    }
}
