// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Illustrative resource providers: general-purpose timers, auxiliary
// clocks, and DMA channels. Each keeps its grant state in memory and
// takes its hardware tables (timer ids, clock parents, channel
// capacity) as constructor configuration, so hosts and tests describe
// their board instead of patching the drivers.

pub mod auxclk;
pub mod gptimer;
pub mod sdma;

pub use auxclk::{AuxClkDesc, AuxClkDriver, AuxClkParent};
pub use gptimer::{GpTimerDesc, GpTimerDriver};
pub use sdma::SdmaDriver;
