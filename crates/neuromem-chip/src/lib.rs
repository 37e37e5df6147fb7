//! Silicon model for the NeuroMem PCIe pattern-matching accelerator.
//!
//! This crate has **no dependencies** and **no hardware access** — it is a
//! pure model of the card: PCIe identifiers, the BAR0 exchange window,
//! the status word, the opcode set, and the request/response wire frames.
//!
//! Every wire structure is encoded and decoded with explicit byte offsets
//! and shift-and-mask arithmetic (little-endian), never with native struct
//! packing, so the layout is byte-for-byte identical on every host.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`pcie`] | Vendor/device IDs, BAR0 window size |
//! | [`regs`] | Exchange-window addresses, reset magic, polling ceilings, neuron registers |
//! | [`status`] | 32-bit status word bit layout |
//! | [`wire`] | Opcodes, request frames, response frames, neuron record |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod pcie;
pub mod regs;
pub mod status;
pub mod wire;
