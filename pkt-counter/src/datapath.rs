// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use crate::error::CounterError;

/// A network interface resolved from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub index: u32,
}

/// Kernel side of the counter: loading, attaching and reading.
///
/// `Loaded` owns the program and its counter map, `Link` is the attachment
/// of that program to one interface. A link must be handed back to
/// [`Datapath::detach`] before its program goes to [`Datapath::unload`];
/// [`Session`](crate::session::Session) keeps that order.
pub trait Datapath {
    type Loaded;
    type Link;

    /// Loads the counting program and allocates its counter map.
    fn load(&mut self) -> Result<Self::Loaded, CounterError>;

    /// Looks up the index of the interface called `name`.
    fn resolve(&self, name: &str) -> Result<Interface, CounterError>;

    /// Binds the loaded program to the receive hook of `iface`.
    fn attach(
        &mut self,
        loaded: &mut Self::Loaded,
        iface: &Interface,
    ) -> Result<Self::Link, CounterError>;

    /// Point-in-time total of the counter map's only entry.
    fn read_counter(&self, loaded: &Self::Loaded) -> Result<u64, CounterError>;

    fn detach(&mut self, loaded: &mut Self::Loaded, link: Self::Link) -> Result<(), CounterError>;

    fn unload(&mut self, loaded: Self::Loaded) -> Result<(), CounterError>;
}

/// Folds the per-CPU copies of the counter into one total.
pub fn sum_per_cpu(values: &[u64]) -> u64 {
    values.iter().fold(0, |total, v| total.wrapping_add(*v))
}
