// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use std::error::Error;

use pkt_counter_common::COUNTER_MAP;

/// Underlying cause reported by a [`Datapath`](crate::datapath::Datapath) backend.
pub type Cause = Box<dyn Error + Send + Sync + 'static>;

/// Every failure is fatal to the current run and is never retried.
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("failed to load the XDP counting program: {0}")]
    Load(#[source] Cause),

    #[error("failed to resolve interface {iface}: {source}")]
    Resolve {
        iface: String,
        #[source]
        source: Cause,
    },

    #[error("failed to attach XDP program to interface {iface}: {source}")]
    Attach {
        iface: String,
        #[source]
        source: Cause,
    },

    #[error("failed to look up {COUNTER_MAP}[0]: {0}")]
    Lookup(#[source] Cause),

    #[error("failed to {op} the XDP counting program: {source}")]
    Teardown {
        op: &'static str,
        #[source]
        source: Cause,
    },
}

/// A cause with advice for the operator appended to its message.
#[derive(Debug, thiserror::Error)]
#[error("{source} ({hint})")]
pub struct Hinted {
    #[source]
    pub source: Cause,
    pub hint: &'static str,
}
