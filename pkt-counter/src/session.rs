// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use log::{debug, info};

use crate::{
    datapath::{Datapath, Interface},
    error::CounterError,
};

/// The loaded counting program and its attachment to one interface.
///
/// Resources are released in reverse order of acquisition by
/// [`Session::teardown`], which also runs on drop. Teardown is idempotent.
pub struct Session<D: Datapath> {
    datapath: D,
    loaded: Option<D::Loaded>,
    link: Option<D::Link>,
    iface: Option<Interface>,
}

impl<D: Datapath> Session<D> {
    /// Loads the program, resolves `iface_name` and attaches to it.
    ///
    /// On failure whatever was already acquired is released before returning.
    pub fn open(datapath: D, iface_name: &str) -> Result<Self, CounterError> {
        let mut session = Session {
            datapath,
            loaded: None,
            link: None,
            iface: None,
        };

        info!("XDP: Load");
        let loaded = session.loaded.insert(session.datapath.load()?);

        let iface = session.datapath.resolve(iface_name)?;
        info!("XDP: Attach to {} (ifindex {})", iface.name, iface.index);
        let link = session.datapath.attach(loaded, &iface)?;

        session.link = Some(link);
        session.iface = Some(iface);
        Ok(session)
    }

    /// The attached interface, `None` once torn down.
    pub fn interface(&self) -> Option<&Interface> {
        self.link.as_ref().and(self.iface.as_ref())
    }

    pub fn read_counter(&self) -> Result<u64, CounterError> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| CounterError::Lookup("counting program already unloaded".into()))?;
        self.datapath.read_counter(loaded)
    }

    /// Detaches, then unloads. Failures on already released resources are
    /// logged and otherwise ignored.
    pub fn teardown(&mut self) {
        if let Some(link) = self.link.take() {
            if let Some(loaded) = self.loaded.as_mut() {
                match self.datapath.detach(loaded, link) {
                    Ok(()) => debug!("XDP: detached"),
                    Err(e) => debug!("ignoring teardown failure: {e}"),
                }
            }
        }

        if let Some(loaded) = self.loaded.take() {
            match self.datapath.unload(loaded) {
                Ok(()) => debug!("XDP: unloaded"),
                Err(e) => debug!("ignoring teardown failure: {e}"),
            }
        }
    }
}

impl<D: Datapath> Drop for Session<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
