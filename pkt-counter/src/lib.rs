// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

pub mod config;
pub mod datapath;
pub mod ebpf;
pub mod error;
pub mod session;
pub mod supervisor;

#[cfg(test)]
mod sim;
